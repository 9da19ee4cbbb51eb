use log::Level;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Display impl for LogSeverity
impl Display for LogSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LogSeverity::Debug => write!(f, "DEBUG"),
            LogSeverity::Info => write!(f, "INFO"),
            LogSeverity::Warning => write!(f, "WARNING"),
            LogSeverity::Error => write!(f, "ERROR"),
        }
    }
}

impl From<Level> for LogSeverity {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace | Level::Debug => LogSeverity::Debug,
            Level::Info => LogSeverity::Info,
            Level::Warn => LogSeverity::Warning,
            Level::Error => LogSeverity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_severity_display() {
        assert_eq!(format!("{}", LogSeverity::Debug), "DEBUG");
        assert_eq!(format!("{}", LogSeverity::Info), "INFO");
        assert_eq!(format!("{}", LogSeverity::Warning), "WARNING");
        assert_eq!(format!("{}", LogSeverity::Error), "ERROR");
    }

    #[test]
    fn test_from_log_level() {
        assert_eq!(LogSeverity::from(Level::Trace), LogSeverity::Debug);
        assert_eq!(LogSeverity::from(Level::Warn), LogSeverity::Warning);
        assert_eq!(LogSeverity::from(Level::Error), LogSeverity::Error);
    }
}
