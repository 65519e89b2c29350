pub mod automation;
pub mod config;
pub mod middleware;
pub mod shared;
