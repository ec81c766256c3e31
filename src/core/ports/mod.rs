pub mod alert_source;
pub mod event_stream;
pub mod runner;
