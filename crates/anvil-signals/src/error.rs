use std::fmt;

/// Republished whenever a subscriber's handler returns an error.
///
/// The bus never lets a handler failure propagate into the publisher — it
/// is caught, wrapped here, and published back onto the same bus as an
/// ordinary event so observability subscribers can see it.
#[derive(Debug, Clone)]
pub struct UnhandledSignalError {
    pub name: String,
    pub event_type: &'static str,
    pub key: Option<String>,
    pub sender: Option<String>,
    pub error: String,
}

impl fmt::Display for UnhandledSignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler for signal '{}' ({}) failed: {}",
            self.name, self.event_type, self.error
        )
    }
}

impl std::error::Error for UnhandledSignalError {}
