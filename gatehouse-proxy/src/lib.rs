pub mod connection;
pub mod engine;
pub mod error_handler;
pub mod headers;
pub mod path;
pub mod state;
pub mod websocket;
pub mod wire;

pub use engine::ProxyEngine;
pub use error_handler::ErrorHandler;
