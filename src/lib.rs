//! argus — OSINT correlation and monitoring engine.
//!
//! Ingests intelligence observations from heterogeneous collectors into a
//! typed entity-relationship graph with confidence scoring, answers
//! correlation queries over that graph, and runs long-lived monitoring
//! rules that re-poll sources and deliver deduplicated alerts.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
