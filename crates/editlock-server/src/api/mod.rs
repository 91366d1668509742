//! Lock HTTP surface

pub mod lock;
pub mod route;

pub use route::{configure, routes};
