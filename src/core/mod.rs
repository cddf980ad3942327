pub mod etl;
pub mod pipeline;
pub mod runner;
pub mod scheduler;

pub use crate::domain::model::{DeliveryReport, DispatchBatch, Extracted, Record};
pub use crate::domain::ports::{Pipeline, RowSource, Storage};
pub use crate::utils::error::Result;
