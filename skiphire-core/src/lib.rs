//! Core types and service wiring for the skiphire skip selection wizard.

/// Query cache with deduplicated fetches, retries, and stale-while-revalidate reads.
pub mod cache;
/// Pagination state machine for the option carousel.
pub mod carousel;
/// Domain models shared by the gateway and the interface.
pub mod model;
/// Traits describing the pricing backend.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// Environment-driven runtime settings.
pub mod settings;
/// Booking steps for the progress indicator.
pub mod steps;

pub use cache::*;
pub use carousel::*;
pub use model::*;
pub use ports::*;
pub use service::*;
pub use settings::*;
pub use steps::*;
