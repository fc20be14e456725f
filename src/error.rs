//! Error type shared by every stage of the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BiciMadError {
    #[error("invalid period: month must be 1-12 and year two digits, got month {month}, year {year}")]
    InvalidPeriod { month: u32, year: u32 },

    #[error("no valid link for month {month} of year {year}")]
    NotFound { month: u32, year: u32 },

    #[error("failed to connect to {url}, {reason}")]
    Download { url: String, reason: String },

    #[error("malformed trip data: {0}")]
    Parse(String),
}

impl BiciMadError {
    pub fn is_download(&self) -> bool {
        matches!(self, BiciMadError::Download { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, BiciMadError::Parse(_))
    }
}

impl From<zip::result::ZipError> for BiciMadError {
    fn from(e: zip::result::ZipError) -> Self {
        BiciMadError::Parse(format!("archive: {e}"))
    }
}

impl From<csv::Error> for BiciMadError {
    fn from(e: csv::Error) -> Self {
        BiciMadError::Parse(format!("csv: {e}"))
    }
}

impl From<std::io::Error> for BiciMadError {
    fn from(e: std::io::Error) -> Self {
        BiciMadError::Parse(format!("io: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, BiciMadError>;
