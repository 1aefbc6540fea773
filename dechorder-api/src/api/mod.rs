//! HTTP API handlers

pub mod health;
pub mod recognize;

pub use health::health_routes;
pub use recognize::recognize_routes;
