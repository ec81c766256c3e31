pub mod stream;
pub mod weather;
