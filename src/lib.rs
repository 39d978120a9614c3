pub mod config;
pub mod constants;
pub mod error;
pub mod geocode;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod table;

pub use error::{EnricherError, Result};
pub use table::Table;
