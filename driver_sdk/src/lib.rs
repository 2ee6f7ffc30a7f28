pub mod api;
pub mod config;
pub mod drivers;
pub mod logging;
pub mod poller;
pub mod sinks;
pub mod tags;
