//! Deep-merges provider defaults, config files, environment variables, and
//! runtime overrides into a read-only [`Config`] snapshot.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::coerce::FromValue;
use crate::error::{Error, Result};
use crate::value::Value;

/// An immutable, resolved configuration snapshot. Built once by
/// [`ConfigResolver::resolve`] and shared read-only thereafter — `anvil-web`
/// wraps it in an `Arc` at `Engine::build` time.
#[derive(Clone)]
pub struct Config {
    root: Value,
    sensitive: HashSet<String>,
}

impl Config {
    pub fn get<T: FromValue>(&self, path: &str) -> Result<T> {
        let value = self.root.get_path(path).ok_or_else(|| Error::Missing(path.to_string()))?;
        T::from_value(path, value)
    }

    pub fn get_or<T: FromValue>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    /// Like [`Config::get`], but for a path tagged sensitive via
    /// [`ConfigResolver::mark_sensitive`] — wraps the resolved string so it
    /// cannot be `Display`ed or logged by accident.
    pub fn get_secret(&self, path: &str) -> Result<SecretString> {
        let raw: String = self.get(path)?;
        Ok(SecretString::from(raw))
    }

    pub fn is_sensitive(&self, path: &str) -> bool {
        self.sensitive.contains(path)
    }

    pub fn raw(&self) -> &Value {
        &self.root
    }
}

impl std::fmt::Debug for Config {
    /// Sensitive paths redact their value; everything else prints the
    /// resolved JSON projection.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut json = self.root.to_json();
        for path in &self.sensitive {
            if let Some(slot) = json_path_mut(&mut json, path) {
                *slot = serde_json::Value::String("<redacted>".to_string());
            }
        }
        write!(f, "Config({json})")
    }
}

fn json_path_mut<'a>(root: &'a mut serde_json::Value, path: &str) -> Option<&'a mut serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

enum Source {
    Defaults(Value),
    File(PathBuf),
    Env { prefix: Option<String> },
    Runtime(Value),
}

/// Builds a [`Config`] by layering sources in increasing precedence:
/// provider defaults, then config files, then environment variables, then
/// runtime overrides — each later layer wins on conflicting keys.
#[derive(Default)]
pub struct ConfigResolver {
    sources: Vec<Source>,
    sensitive: HashSet<String>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_defaults(mut self, defaults: Value) -> Self {
        self.sources.push(Source::Defaults(defaults));
        self
    }

    pub fn add_file(mut self, path: impl AsRef<Path>) -> Self {
        self.sources.push(Source::File(path.as_ref().to_path_buf()));
        self
    }

    /// Fold environment variables whose name contains `__` into dotted
    /// paths (`A__B__C` -> `a.b.c`). `prefix`, if given, additionally
    /// requires (and strips) a leading `PREFIX__` before folding the rest.
    pub fn add_env(mut self, prefix: Option<&str>) -> Self {
        self.sources.push(Source::Env { prefix: prefix.map(str::to_string) });
        self
    }

    pub fn add_runtime_overrides(mut self, overrides: Value) -> Self {
        self.sources.push(Source::Runtime(overrides));
        self
    }

    /// Tag a dotted path as sensitive: `Config::get_secret` is the
    /// intended accessor and `Config`'s `Debug` impl redacts it.
    pub fn mark_sensitive(mut self, path: impl Into<String>) -> Self {
        self.sensitive.insert(path.into());
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let mut root = Value::map();
        for source in self.sources {
            let layer = match source {
                Source::Defaults(v) => v,
                Source::File(path) => read_file(&path)?,
                Source::Env { prefix } => env_layer(prefix.as_deref()),
                Source::Runtime(v) => v,
            };
            root.merge(layer);
        }
        Ok(Config { root, sensitive: self.sensitive })
    }
}

fn read_file(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: toml::Value = toml::from_str(&contents).map_err(|source| Error::FileParse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Value::from(parsed))
}

fn env_layer(prefix: Option<&str>) -> Value {
    let mut layer = Value::map();
    for (key, raw_value) in std::env::vars() {
        let Some(folded) = fold_env_key(&key, prefix) else { continue };
        layer.set_path(&folded, Value::coerce_scalar(&raw_value));
    }
    layer
}

/// `A__B__C` -> `a.b.c`; requires at least one `__` so ordinary scalar env
/// vars (`PATH`, `HOME`) don't get folded in as single-segment config keys.
fn fold_env_key(key: &str, prefix: Option<&str>) -> Option<String> {
    let rest = match prefix {
        Some(prefix) => {
            let with_sep = format!("{prefix}__");
            key.strip_prefix(&with_sep)?
        }
        None => key,
    };
    if !rest.contains("__") {
        return None;
    }
    Some(rest.split("__").map(|segment| segment.to_lowercase()).collect::<Vec<_>>().join("."))
}

#[allow(dead_code)]
fn expose(secret: &SecretString) -> &str {
    secret.expose_secret()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_then_env_then_runtime_precedence() {
        std::env::set_var("ANVIL_TEST__RUNTIME__SHUTDOWN__GRACE_PERIOD", "5");

        let mut defaults = Value::map();
        defaults.set_path("runtime.shutdown.grace_period", Value::Int(20));
        defaults.set_path("runtime.shutdown.force_after", Value::Int(60));

        let mut runtime_override = Value::map();
        runtime_override.set_path("runtime.shutdown.force_after", Value::Int(90));

        let config = ConfigResolver::new()
            .add_defaults(defaults)
            .add_env(Some("ANVIL_TEST"))
            .add_runtime_overrides(runtime_override)
            .resolve()
            .unwrap();

        assert_eq!(config.get::<i64>("runtime.shutdown.grace_period").unwrap(), 5);
        assert_eq!(config.get::<i64>("runtime.shutdown.force_after").unwrap(), 90);

        std::env::remove_var("ANVIL_TEST__RUNTIME__SHUTDOWN__GRACE_PERIOD");
    }

    #[test]
    fn missing_path_errors() {
        let config = ConfigResolver::new().resolve().unwrap();
        assert!(matches!(config.get::<String>("nope.nope"), Err(Error::Missing(_))));
    }

    #[test]
    fn get_or_falls_back_to_default() {
        let config = ConfigResolver::new().resolve().unwrap();
        assert_eq!(config.get_or("runtime.shutdown.exit_code", 0i64), 0);
    }

    #[test]
    fn sensitive_path_is_redacted_in_debug_output() {
        let mut defaults = Value::map();
        defaults.set_path("security.csrf_cookie_name", Value::String("csrf".into()));
        defaults.set_path("throttle.api_key", Value::String("super-secret".into()));

        let config = ConfigResolver::new()
            .add_defaults(defaults)
            .mark_sensitive("throttle.api_key")
            .resolve()
            .unwrap();

        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("csrf"));
    }

    #[test]
    fn file_source_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anvil.toml");
        std::fs::write(&path, "[runtime.shutdown]\ngrace_period = 15\n").unwrap();

        let config = ConfigResolver::new().add_file(&path).resolve().unwrap();
        assert_eq!(config.get::<i64>("runtime.shutdown.grace_period").unwrap(), 15);
    }
}
