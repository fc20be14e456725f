pub mod clean;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod period;
pub mod registry;
pub mod stats;
pub mod trip;

pub use dataset::TripDataset;
pub use error::BiciMadError;
pub use period::{Period, WeekdayCode};
pub use registry::UrlRegistry;
