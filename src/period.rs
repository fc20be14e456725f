//! Calendar helpers: the (month, year) a dataset covers and weekday labels.

use std::fmt;

use chrono::Weekday;
use serde::Serialize;

use crate::error::{BiciMadError, Result};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A month of published trip data. `year` is two-digit (`23` for 2023).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    year: u32,
    month: u32,
}

impl Period {
    pub fn new(month: u32, year: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || year > 99 {
            return Err(BiciMadError::InvalidPeriod { month, year });
        }
        Ok(Self { year, month })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// `trips_YY_MM` prefix shared by the archive link and the CSV inside it.
    pub fn file_stem(&self) -> String {
        format!("trips_{:02}_{:02}", self.year, self.month)
    }

    /// Name of the record file inside the monthly archive.
    pub fn csv_name(&self) -> String {
        format!("{}_{}.csv", self.file_stem(), self.month_name())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Month: {}, Year: {}", self.month, self.year)
    }
}

/// Short weekday labels, ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WeekdayCode {
    M,
    T,
    W,
    Th,
    F,
    Sa,
    Su,
}

impl WeekdayCode {
    pub const ALL: [WeekdayCode; 7] = [
        WeekdayCode::M,
        WeekdayCode::T,
        WeekdayCode::W,
        WeekdayCode::Th,
        WeekdayCode::F,
        WeekdayCode::Sa,
        WeekdayCode::Su,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekdayCode::M => "M",
            WeekdayCode::T => "T",
            WeekdayCode::W => "W",
            WeekdayCode::Th => "Th",
            WeekdayCode::F => "F",
            WeekdayCode::Sa => "Sa",
            WeekdayCode::Su => "Su",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == label)
    }
}

impl From<Weekday> for WeekdayCode {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => WeekdayCode::M,
            Weekday::Tue => WeekdayCode::T,
            Weekday::Wed => WeekdayCode::W,
            Weekday::Thu => WeekdayCode::Th,
            Weekday::Fri => WeekdayCode::F,
            Weekday::Sat => WeekdayCode::Sa,
            Weekday::Sun => WeekdayCode::Su,
        }
    }
}

impl fmt::Display for WeekdayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
