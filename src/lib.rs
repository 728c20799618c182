pub mod alert;
pub mod config;
pub mod drift;
pub mod output;
pub mod server;
pub mod snapshot;
