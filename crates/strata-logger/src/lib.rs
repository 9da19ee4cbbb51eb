pub mod log;
pub mod severity;
pub mod systime;

pub use self::log::{init, StrataLogger};
pub use severity::LogSeverity;
