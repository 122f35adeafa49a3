pub mod collectors;
pub mod persistence;
pub mod sinks;
