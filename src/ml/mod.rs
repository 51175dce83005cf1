pub mod clustering;
pub mod tyre_model;

pub use clustering::{cluster_laps, profile_driver_styles, KMeans, StandardScaler};
pub use tyre_model::TyreDegradationModel;
