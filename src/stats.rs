//! Read-only aggregations over a [`TripDataset`].
//!
//! Daily series are keyed by [`NaiveDate`] and weekday series by
//! [`WeekdayCode`]; both are `BTreeMap`s so iteration is date-ascending and
//! Monday-first respectively.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::dataset::TripDataset;
use crate::period::WeekdayCode;

/// Month-level summary of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub year: u32,
    pub month: u32,
    pub total_uses: usize,
    /// Hours.
    pub total_time: f64,
    /// Unlock addresses of the busiest stations, joined with `" | "`.
    pub most_popular_station: String,
    pub uses_from_most_popular: usize,
}

/// One row of the per-day export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub weekday: WeekdayCode,
    pub trip_hours: f64,
    pub trips: usize,
    pub avg_trip_minutes: f64,
}

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn weekday_of(date: NaiveDate) -> WeekdayCode {
    WeekdayCode::from(date.weekday())
}

/// Averages a daily series over the days of each weekday.
fn weekday_average(daily: &BTreeMap<NaiveDate, f64>) -> BTreeMap<WeekdayCode, f64> {
    let mut grouped: BTreeMap<WeekdayCode, Vec<f64>> = BTreeMap::new();
    for (date, value) in daily {
        grouped.entry(weekday_of(*date)).or_default().push(*value);
    }
    grouped
        .into_iter()
        .map(|(code, values)| (code, mean(&values)))
        .collect()
}

impl TripDataset {
    fn minutes_per_day(&self) -> BTreeMap<NaiveDate, (f64, usize)> {
        let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for trip in self.records() {
            let entry = per_day.entry(trip.date).or_default();
            entry.0 += trip.trip_minutes;
            entry.1 += 1;
        }
        per_day
    }

    /// Total trip hours per calendar day.
    pub fn day_time(&self) -> BTreeMap<NaiveDate, f64> {
        self.minutes_per_day()
            .into_iter()
            .map(|(date, (minutes, _))| (date, minutes / 60.0))
            .collect()
    }

    /// Average daily trip hours per weekday.
    pub fn weekday_time(&self) -> BTreeMap<WeekdayCode, f64> {
        weekday_average(&self.day_time())
    }

    /// Number of trips per calendar day.
    pub fn day_trip_count(&self) -> BTreeMap<NaiveDate, usize> {
        self.minutes_per_day()
            .into_iter()
            .map(|(date, (_, trips))| (date, trips))
            .collect()
    }

    /// Average daily trip count per weekday.
    pub fn weekday_trip_count(&self) -> BTreeMap<WeekdayCode, f64> {
        let daily: BTreeMap<NaiveDate, f64> = self
            .day_trip_count()
            .into_iter()
            .map(|(date, trips)| (date, trips as f64))
            .collect();
        weekday_average(&daily)
    }

    /// Mean trip duration in minutes per calendar day.
    pub fn average_trip_duration_per_day(&self) -> BTreeMap<NaiveDate, f64> {
        self.minutes_per_day()
            .into_iter()
            .map(|(date, (minutes, trips))| (date, minutes / trips as f64))
            .collect()
    }

    /// Mean trip duration in minutes over all trips on each weekday.
    pub fn average_trip_duration_per_weekday(&self) -> BTreeMap<WeekdayCode, f64> {
        let mut per_weekday: BTreeMap<WeekdayCode, (f64, usize)> = BTreeMap::new();
        for (date, (minutes, trips)) in self.minutes_per_day() {
            let entry = per_weekday.entry(weekday_of(date)).or_default();
            entry.0 += minutes;
            entry.1 += trips;
        }
        per_weekday
            .into_iter()
            .map(|(code, (minutes, trips))| (code, minutes / trips as f64))
            .collect()
    }

    /// Trips per (day, unlock station). Rows without a station are skipped.
    pub fn day_station_trip_count(&self) -> BTreeMap<(NaiveDate, String), usize> {
        let mut counts = BTreeMap::new();
        for trip in self.records() {
            if let Some(station) = &trip.station_unlock {
                *counts.entry((trip.date, station.clone())).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Unlock addresses of the station(s) with the most departures. Ties are
    /// all returned.
    pub fn most_popular_stations(&self) -> BTreeSet<String> {
        let mut per_station: BTreeMap<&str, usize> = BTreeMap::new();
        for trip in self.records() {
            if let Some(station) = trip.station_unlock.as_deref() {
                *per_station.entry(station).or_insert(0) += 1;
            }
        }

        let Some(max) = per_station.values().copied().max() else {
            return BTreeSet::new();
        };
        let top: BTreeSet<&str> = per_station
            .into_iter()
            .filter(|(_, count)| *count == max)
            .map(|(station, _)| station)
            .collect();

        self.records()
            .iter()
            .filter(|t| t.station_unlock.as_deref().is_some_and(|s| top.contains(s)))
            .filter_map(|t| t.address_unlock.clone())
            .collect()
    }

    /// Trips that started at any of the [`most_popular_stations`] addresses.
    ///
    /// [`most_popular_stations`]: TripDataset::most_popular_stations
    pub fn uses_from_most_popular(&self) -> usize {
        let addresses = self.most_popular_stations();
        self.records()
            .iter()
            .filter(|t| {
                t.address_unlock
                    .as_ref()
                    .is_some_and(|a| addresses.contains(a))
            })
            .count()
    }

    pub fn total_hours(&self) -> f64 {
        self.records().iter().map(|t| t.trip_hours()).sum()
    }

    pub fn summary(&self) -> MonthSummary {
        let stations: Vec<String> = self.most_popular_stations().into_iter().collect();
        MonthSummary {
            year: self.year(),
            month: self.month(),
            total_uses: self.len(),
            total_time: self.total_hours(),
            most_popular_station: stations.join(" | "),
            uses_from_most_popular: self.uses_from_most_popular(),
        }
    }

    /// Per-day table combining hours, trip counts and mean duration.
    pub fn daily_stats(&self) -> Vec<DailyStats> {
        self.minutes_per_day()
            .into_iter()
            .map(|(date, (minutes, trips))| DailyStats {
                date,
                weekday: weekday_of(date),
                trip_hours: minutes / 60.0,
                trips,
                avg_trip_minutes: minutes / trips as f64,
            })
            .collect()
    }
}
