pub mod correlate;
pub mod dispatch;
pub mod export;
pub mod ingest;
pub mod scheduler;

pub use correlate::{Correlation, CorrelationService};
pub use dispatch::{AlertDispatcher, AlertEnvelope, DispatchPolicy};
pub use export::{ExportFormat, ExportService};
pub use ingest::{IngestReport, IngestService};
pub use scheduler::{CollectorSet, MonitorAdmin, MonitorScheduler, SchedulerSettings};
