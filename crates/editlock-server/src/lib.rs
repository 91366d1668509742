// Library module for the editlock server: HTTP surface, configuration and startup

pub mod api; // Lock HTTP handlers and routes
pub mod metrics; // Metrics and observability
pub mod model; // Configuration, app state, response envelope
pub mod startup; // Logging, store selection, HTTP server, shutdown

pub use model::{AppState, Configuration};
