pub mod config;
pub mod feed;
pub mod market;
pub mod server;
pub mod sim;
pub mod telemetry;
