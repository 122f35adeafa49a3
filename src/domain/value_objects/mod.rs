pub mod confidence;
pub mod severity;

pub use confidence::Confidence;
pub use severity::Severity;
