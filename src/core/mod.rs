pub mod aggregate;
pub mod cleaner;
pub mod dedup;
pub mod dma;
pub mod etl;
pub mod pipeline;
pub mod tracker;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, Warehouse};
pub use crate::utils::error::Result;
