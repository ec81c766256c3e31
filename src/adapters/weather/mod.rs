pub mod alert_parser;
pub mod noaa_client;
