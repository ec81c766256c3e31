pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod core;
pub mod messaging;
pub mod utils;
