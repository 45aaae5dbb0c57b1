//! The config value tree: `Null/Bool/Int/Float/String/List/Map`, deep
//! merge, and dotted-path traversal.

use indexmap::IndexMap;

/// A dynamically-typed config node. `Map` preserves insertion order (via
/// `IndexMap`) so a dumped/serialized config reads the same way it was
/// declared.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn map() -> Self {
        Value::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Deep merge `overlay` onto `self`: maps merge key-by-key recursively,
    /// everything else is replaced wholesale by the overlay's value.
    /// `Value::Null` in the overlay is treated as "no override" and does
    /// not clobber a present base value.
    pub fn merge(&mut self, overlay: Value) {
        match (self.as_map_mut(), overlay) {
            (Some(base), Value::Map(over)) => {
                for (key, value) in over {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (_, Value::Null) => {}
            (_, overlay) => *self = overlay,
        }
    }

    /// Traverse a dotted path (`"runtime.shutdown.grace_period"`) through
    /// nested maps.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Insert a value at a dotted path, creating intermediate maps as
    /// needed. Used by the env-var and runtime-override layers.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.').peekable();
        let mut current = self;
        while let Some(segment) = segments.next() {
            if !matches!(current, Value::Map(_)) {
                *current = Value::map();
            }
            let map = match current {
                Value::Map(m) => m,
                _ => unreachable!(),
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return;
            }
            current = map.entry(segment.to_string()).or_insert_with(Value::map);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }

    /// Best-effort conversion from a bare string, used for env-var values
    /// (which always arrive as `String`) and CLI-style overrides: `"true"`/
    /// `"false"` become booleans, integers and floats parse if they look
    /// like one, everything else stays a string.
    pub fn coerce_scalar(raw: &str) -> Value {
        if let Ok(b) = raw.parse::<bool>() {
            return Value::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        Value::String(raw.to_string())
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => {
                Value::Map(table.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_recursively_without_clobbering_siblings() {
        let mut base = Value::map();
        base.set_path("runtime.shutdown.grace_period", Value::Int(20));
        base.set_path("runtime.shutdown.force_after", Value::Int(60));

        let mut overlay = Value::map();
        overlay.set_path("runtime.shutdown.grace_period", Value::Int(5));
        base.merge(overlay);

        assert_eq!(base.get_path("runtime.shutdown.grace_period"), Some(&Value::Int(5)));
        assert_eq!(base.get_path("runtime.shutdown.force_after"), Some(&Value::Int(60)));
    }

    #[test]
    fn null_overlay_does_not_clobber_base() {
        let mut base = Value::map();
        base.set_path("a.b", Value::Int(1));
        let mut overlay = Value::map();
        overlay.set_path("a.b", Value::Null);
        base.merge(overlay);
        assert_eq!(base.get_path("a.b"), Some(&Value::Int(1)));
    }

    #[test]
    fn coerce_scalar_recognizes_bool_and_numbers() {
        assert_eq!(Value::coerce_scalar("true"), Value::Bool(true));
        assert_eq!(Value::coerce_scalar("20"), Value::Int(20));
        assert_eq!(Value::coerce_scalar("1.5"), Value::Float(1.5));
        assert_eq!(Value::coerce_scalar("sigint"), Value::String("sigint".into()));
    }
}
