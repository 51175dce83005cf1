pub mod battle;
pub mod signal;
pub mod telemetry;

pub use telemetry::{compare_drivers, enrich, friction_envelope, FrictionEnvelope};
