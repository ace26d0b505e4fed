pub mod error;
pub mod labels;
pub mod config;
pub mod metadata;
pub mod dialect;
pub mod partition;
pub mod trajectory;
pub mod interleave;
pub mod projection;
pub mod noise;
pub mod scaling;
pub mod record;
pub mod pipeline;

pub use error::{ConvertError, Result};
