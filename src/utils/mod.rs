pub mod error;
pub mod logger;
pub mod scheduler;
pub mod signals;
