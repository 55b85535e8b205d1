pub mod config;
pub mod log;
pub mod managers;
pub mod server;
pub mod services;
pub mod span;
pub mod websocket;
