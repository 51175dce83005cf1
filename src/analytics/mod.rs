pub mod corners;
pub mod driver;
pub mod session;

pub use corners::{align_corners, detect_corners, AlignedCorner, Corner};
pub use driver::{driver_radar, overtake_probability, DriverRadar};
pub use session::{analyze_stints, ideal_lap, StintSummary};
