//! Trip records as read from the monthly CSV and after cleaning.

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref COORDINATES_REGEX: Regex =
        Regex::new(r"coordinates['\x22]?\s*:\s*\[\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\]")
            .unwrap();
}

/// One CSV row exactly as published, every column optional text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTrip {
    pub fecha: Option<String>,
    #[serde(rename = "idBike")]
    pub id_bike: Option<String>,
    pub fleet: Option<String>,
    pub trip_minutes: Option<String>,
    pub geolocation_unlock: Option<String>,
    pub address_unlock: Option<String>,
    pub unlock_date: Option<String>,
    pub locktype: Option<String>,
    pub unlocktype: Option<String>,
    pub geolocation_lock: Option<String>,
    pub address_lock: Option<String>,
    pub lock_date: Option<String>,
    pub station_unlock: Option<String>,
    pub dock_unlock: Option<String>,
    pub unlock_station_name: Option<String>,
    pub station_lock: Option<String>,
    pub dock_lock: Option<String>,
    pub lock_station_name: Option<String>,
}

impl RawTrip {
    pub fn is_blank(&self) -> bool {
        [
            &self.fecha,
            &self.id_bike,
            &self.fleet,
            &self.trip_minutes,
            &self.geolocation_unlock,
            &self.address_unlock,
            &self.unlock_date,
            &self.locktype,
            &self.unlocktype,
            &self.geolocation_lock,
            &self.address_lock,
            &self.lock_date,
            &self.station_unlock,
            &self.dock_unlock,
            &self.unlock_station_name,
            &self.station_lock,
            &self.dock_lock,
            &self.lock_station_name,
        ]
        .iter()
        .all(|field| non_empty(field).is_none())
    }
}

/// A `[longitude, latitude]` point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geolocation {
    pub longitude: f64,
    pub latitude: f64,
}

impl Geolocation {
    /// Parses the GeoJSON-like point the portal publishes, e.g.
    /// `{'type': 'Point', 'coordinates': [-3.6985, 40.4247]}`.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = COORDINATES_REGEX.captures(value)?;
        Some(Self {
            longitude: caps[1].parse().ok()?,
            latitude: caps[2].parse().ok()?,
        })
    }
}

/// A cleaned rental event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    pub date: NaiveDate,
    pub id_bike: Option<String>,
    pub fleet: Option<String>,
    pub trip_minutes: f64,
    pub geolocation_unlock: Option<Geolocation>,
    pub address_unlock: Option<String>,
    pub unlock_date: Option<NaiveDateTime>,
    pub locktype: Option<String>,
    pub unlocktype: Option<String>,
    pub geolocation_lock: Option<Geolocation>,
    pub address_lock: Option<String>,
    pub lock_date: Option<NaiveDateTime>,
    pub station_unlock: Option<String>,
    pub dock_unlock: Option<String>,
    pub unlock_station_name: Option<String>,
    pub station_lock: Option<String>,
    pub dock_lock: Option<String>,
    pub lock_station_name: Option<String>,
}

impl TripRecord {
    pub fn trip_hours(&self) -> f64 {
        self.trip_minutes / 60.0
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_datetime(value).map(|dt| dt.date()))
}

pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    // Timezone suffixes are dropped; every timestamp is Madrid local time.
    let value = value
        .strip_suffix('Z')
        .or_else(|| value.strip_suffix("+00:00"))
        .unwrap_or(value);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub(crate) fn parse_minutes(value: &str) -> Option<f64> {
    value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite())
}
