mod correlation_test;
mod export_test;
mod monitoring_test;
