pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;

pub use engine::{aggregate, AggregateQuery, Aggregation};
pub use error::ReportError;
pub use types::{Category, Dimension, ShipmentRecord, Status, StatusFilter};
