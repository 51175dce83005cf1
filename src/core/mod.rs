pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{DebriefBundle, Session};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use etl::DebriefEngine;
pub use pipeline::DebriefPipeline;
