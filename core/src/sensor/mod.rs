//! Sensor access: the transport seam, exclusive leases and retrying links.

pub mod link;
pub mod registry;
pub mod scripted;
pub mod transport;

pub use link::SensorLink;
pub use registry::{RadarSystem, SensorLease};
pub use scripted::{ScriptedHandle, ScriptedSensor};
pub use transport::{
    RawFrame, Register, SensorId, SensorTransport, SweepRequest, TransportError, TransportResult,
};
