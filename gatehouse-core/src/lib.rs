pub mod config;
pub mod error;
pub mod normalize;
pub mod route;
pub mod store;

pub use config::GatehouseConfig;
pub use error::GatehouseError;
pub use route::{Route, RouteUpdate};
pub use store::{RoutePatch, Store};
