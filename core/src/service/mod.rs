//! Sessions binding a service configuration to a leased sensor.

pub mod delivery;
pub mod measurement;
pub mod metadata;
pub mod producer;
pub mod session;
pub mod state;

pub use delivery::MeasurementHandler;
pub use measurement::{Measurement, MeasurementSummary, Payload, ResultInfo};
pub use metadata::Metadata;
pub use session::Session;
pub use state::SessionState;
