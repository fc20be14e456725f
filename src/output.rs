//! Output formatting and persistence for trip statistics.
//!
//! Supports pretty-printing, JSON serialization, CSV append of monthly
//! summaries and a per-day CSV export (optionally gzip-compressed).

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::TripDataset;
use crate::stats::{DailyStats, MonthSummary};

/// Everything the CLI reports for one month.
#[derive(Debug, Serialize)]
pub struct Report {
    pub summary: MonthSummary,
    pub day_time: BTreeMap<String, f64>,
    pub weekday_time: BTreeMap<String, f64>,
    pub day_trip_count: BTreeMap<String, usize>,
    pub weekday_trip_count: BTreeMap<String, f64>,
    pub average_trip_duration_per_day: BTreeMap<String, f64>,
    pub average_trip_duration_per_weekday: BTreeMap<String, f64>,
}

fn keyed<K: Display, V>(series: BTreeMap<K, V>) -> BTreeMap<String, V> {
    series.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

impl Report {
    pub fn from_dataset(dataset: &TripDataset) -> Self {
        Self {
            summary: dataset.summary(),
            day_time: keyed(dataset.day_time()),
            weekday_time: keyed(dataset.weekday_time()),
            day_trip_count: keyed(dataset.day_trip_count()),
            weekday_trip_count: keyed(dataset.weekday_trip_count()),
            average_trip_duration_per_day: keyed(dataset.average_trip_duration_per_day()),
            average_trip_duration_per_weekday: keyed(dataset.average_trip_duration_per_weekday()),
        }
    }
}

/// Logs every aggregation of `dataset`, one line per group.
pub fn print_pretty(dataset: &TripDataset) {
    let summary = dataset.summary();
    info!(
        period = %dataset,
        total_uses = summary.total_uses,
        total_time = summary.total_time,
        most_popular_station = %summary.most_popular_station,
        uses_from_most_popular = summary.uses_from_most_popular,
        "Summary"
    );

    for row in dataset.daily_stats() {
        info!(
            date = %row.date,
            weekday = %row.weekday,
            trip_hours = row.trip_hours,
            trips = row.trips,
            avg_trip_minutes = row.avg_trip_minutes,
            "Day"
        );
    }

    let trips = dataset.weekday_trip_count();
    let durations = dataset.average_trip_duration_per_weekday();
    for (code, hours) in dataset.weekday_time() {
        info!(
            weekday = %code,
            avg_trip_hours = hours,
            avg_trips = trips.get(&code).copied().unwrap_or_default(),
            avg_trip_minutes = durations.get(&code).copied().unwrap_or_default(),
            "Weekday"
        );
    }

    debug!("{:#?}", dataset.clean_report());
}

/// Logs the full report as pretty-printed JSON.
pub fn print_json(dataset: &TripDataset) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&Report::from_dataset(dataset))?);
    Ok(())
}

/// Appends a [`MonthSummary`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, summary: &MonthSummary) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

/// Writes the per-day table to `path`, replacing any existing file. With
/// `gzip` the CSV is gzip-compressed.
pub fn write_daily(path: &str, rows: &[DailyStats], gzip: bool) -> Result<()> {
    let file = File::create(path)?;

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_rows(&mut encoder, rows)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        write_rows(&mut file, rows)?;
        file.flush()?;
    }

    info!(path, rows = rows.len(), gzip, "Daily export written");
    Ok(())
}

fn write_rows<W: Write>(out: W, rows: &[DailyStats]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
