//! Row-level cleaning: turns [`RawTrip`]s into valid [`TripRecord`]s.
//!
//! Bad rows are dropped or repaired, never reported as errors.
//!
//! When both timestamps are present they are authoritative: a published
//! `trip_minutes` more than [`DURATION_TOLERANCE_MINUTES`] away from the
//! unlock/lock delta is replaced by the delta. Rows with a date and a valid
//! published duration but no timestamps are kept as they are, since older
//! exports ship without `unlock_date`/`lock_date` columns.

use tracing::{debug, info, warn};

use crate::trip::{
    Geolocation, RawTrip, TripRecord, non_empty, parse_date, parse_datetime, parse_minutes,
};

/// Allowed gap between a published duration and the timestamp delta. Covers
/// the two-decimal rounding of the export.
pub const DURATION_TOLERANCE_MINUTES: f64 = 1.0;

/// What happened to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Kept,
    /// `trip_minutes` was recomputed from the lock/unlock timestamps.
    Recomputed,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Blank,
    MissingDate,
    LockBeforeUnlock,
    InvalidDuration,
}

/// Counters describing one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: usize,
    pub recomputed: usize,
    pub blank: usize,
    pub missing_date: usize,
    pub lock_before_unlock: usize,
    pub invalid_duration: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.blank + self.missing_date + self.lock_before_unlock + self.invalid_duration
    }

    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Kept => self.kept += 1,
            RowOutcome::Recomputed => {
                self.kept += 1;
                self.recomputed += 1;
            }
            RowOutcome::Dropped(DropReason::Blank) => self.blank += 1,
            RowOutcome::Dropped(DropReason::MissingDate) => self.missing_date += 1,
            RowOutcome::Dropped(DropReason::LockBeforeUnlock) => self.lock_before_unlock += 1,
            RowOutcome::Dropped(DropReason::InvalidDuration) => self.invalid_duration += 1,
        }
    }
}

/// Cleans every row, preserving input order.
pub fn clean_trips<I>(rows: I) -> (Vec<TripRecord>, CleanReport)
where
    I: IntoIterator<Item = RawTrip>,
{
    let mut report = CleanReport::default();
    let mut records = Vec::new();

    for raw in rows {
        let (record, outcome) = clean_trip(&raw);
        report.record(outcome);
        if let Some(record) = record {
            records.push(record);
        }
    }

    let total = report.kept + report.dropped();
    if report.dropped() > 0 {
        debug!(?report, "Dropped malformed rows");
    }
    if total > 0 && report.dropped() * 10 > total {
        warn!(dropped = report.dropped(), total, "More than 10% of rows were dropped");
    }
    info!(
        kept = report.kept,
        dropped = report.dropped(),
        recomputed = report.recomputed,
        "Cleaning complete"
    );

    (records, report)
}

/// Cleans one row.
pub fn clean_trip(raw: &RawTrip) -> (Option<TripRecord>, RowOutcome) {
    if raw.is_blank() {
        return (None, RowOutcome::Dropped(DropReason::Blank));
    }

    let unlock_date = non_empty(&raw.unlock_date).and_then(parse_datetime);
    let lock_date = non_empty(&raw.lock_date).and_then(parse_datetime);

    let Some(date) = non_empty(&raw.fecha)
        .and_then(parse_date)
        .or_else(|| unlock_date.map(|dt| dt.date()))
    else {
        return (None, RowOutcome::Dropped(DropReason::MissingDate));
    };

    let elapsed_minutes = match (unlock_date, lock_date) {
        (Some(unlock), Some(lock)) if lock < unlock => {
            return (None, RowOutcome::Dropped(DropReason::LockBeforeUnlock));
        }
        (Some(unlock), Some(lock)) => Some((lock - unlock).num_milliseconds() as f64 / 60_000.0),
        _ => None,
    };

    let published = non_empty(&raw.trip_minutes)
        .and_then(parse_minutes)
        .filter(|m| *m >= 0.0);

    let (trip_minutes, outcome) = match (published, elapsed_minutes) {
        (Some(minutes), Some(elapsed))
            if (minutes - elapsed).abs() > DURATION_TOLERANCE_MINUTES =>
        {
            (round_minutes(elapsed), RowOutcome::Recomputed)
        }
        (Some(minutes), _) => (minutes, RowOutcome::Kept),
        (None, Some(minutes)) => (round_minutes(minutes), RowOutcome::Recomputed),
        (None, None) => return (None, RowOutcome::Dropped(DropReason::InvalidDuration)),
    };

    let record = TripRecord {
        date,
        id_bike: identifier(&raw.id_bike),
        fleet: identifier(&raw.fleet),
        trip_minutes,
        geolocation_unlock: non_empty(&raw.geolocation_unlock).and_then(Geolocation::parse),
        address_unlock: text(&raw.address_unlock),
        unlock_date,
        locktype: text(&raw.locktype),
        unlocktype: text(&raw.unlocktype),
        geolocation_lock: non_empty(&raw.geolocation_lock).and_then(Geolocation::parse),
        address_lock: text(&raw.address_lock),
        lock_date,
        station_unlock: identifier(&raw.station_unlock),
        dock_unlock: identifier(&raw.dock_unlock),
        unlock_station_name: text(&raw.unlock_station_name),
        station_lock: identifier(&raw.station_lock),
        dock_lock: identifier(&raw.dock_lock),
        lock_station_name: text(&raw.lock_station_name),
    };

    (Some(record), outcome)
}

/// Strips the `.0` float suffix that numeric ids pick up in the export.
pub fn normalize_identifier(value: &str) -> String {
    let value = value.trim();
    value.strip_suffix(".0").unwrap_or(value).to_string()
}

fn identifier(value: &Option<String>) -> Option<String> {
    non_empty(value).map(normalize_identifier)
}

fn text(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

// Published durations carry two decimals.
fn round_minutes(minutes: f64) -> f64 {
    (minutes * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(fecha: &str, minutes: &str, unlock: &str, lock: &str) -> RawTrip {
        let opt = |v: &str| (!v.is_empty()).then(|| v.to_string());
        RawTrip {
            fecha: opt(fecha),
            id_bike: Some("7337.0".to_string()),
            fleet: Some("1.0".to_string()),
            trip_minutes: opt(minutes),
            unlock_date: opt(unlock),
            lock_date: opt(lock),
            station_unlock: Some("12.0".to_string()),
            station_lock: Some("100".to_string()),
            address_unlock: Some(" Calle Alcala ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_row_is_kept_and_normalized() {
        let (record, outcome) = clean_trip(&raw(
            "2022-11-01",
            "6.5",
            "2022-11-01 07:00:00",
            "2022-11-01 07:06:30",
        ));
        let record = record.unwrap();

        assert_eq!(outcome, RowOutcome::Kept);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2022, 11, 1).unwrap());
        assert_eq!(record.trip_minutes, 6.5);
        assert_eq!(record.id_bike.as_deref(), Some("7337"));
        assert_eq!(record.fleet.as_deref(), Some("1"));
        assert_eq!(record.station_unlock.as_deref(), Some("12"));
        assert_eq!(record.station_lock.as_deref(), Some("100"));
        assert_eq!(record.address_unlock.as_deref(), Some("Calle Alcala"));
    }

    #[test]
    fn test_negative_duration_is_recomputed() {
        let (record, outcome) = clean_trip(&raw(
            "2022-11-01",
            "-3",
            "2022-11-01 07:00:00",
            "2022-11-01 07:10:15",
        ));
        assert_eq!(outcome, RowOutcome::Recomputed);
        assert_eq!(record.unwrap().trip_minutes, 10.25);
    }

    #[test]
    fn test_inconsistent_duration_is_replaced_by_timestamp_delta() {
        let (record, outcome) = clean_trip(&raw(
            "2022-11-01",
            "600",
            "2022-11-01 07:00:00",
            "2022-11-01 07:05:00",
        ));
        assert_eq!(outcome, RowOutcome::Recomputed);
        assert_eq!(record.unwrap().trip_minutes, 5.0);

        // Within tolerance the published value stands.
        let (record, outcome) = clean_trip(&raw(
            "2022-11-01",
            "5.4",
            "2022-11-01 07:00:00",
            "2022-11-01 07:05:00",
        ));
        assert_eq!(outcome, RowOutcome::Kept);
        assert_eq!(record.unwrap().trip_minutes, 5.4);
    }

    #[test]
    fn test_published_duration_without_timestamps_is_kept() {
        let (record, outcome) = clean_trip(&raw("2022-11-01", "42.5", "", ""));
        assert_eq!(outcome, RowOutcome::Kept);
        assert_eq!(record.unwrap().trip_minutes, 42.5);
    }

    #[test]
    fn test_missing_duration_without_timestamps_is_dropped() {
        let (record, outcome) = clean_trip(&raw("2022-11-01", "", "", ""));
        assert!(record.is_none());
        assert_eq!(outcome, RowOutcome::Dropped(DropReason::InvalidDuration));
    }

    #[test]
    fn test_missing_date_falls_back_to_unlock() {
        let (record, outcome) = clean_trip(&raw("", "2", "2022-11-02 23:59:00", ""));
        assert_eq!(outcome, RowOutcome::Kept);
        assert_eq!(
            record.unwrap().date,
            NaiveDate::from_ymd_opt(2022, 11, 2).unwrap()
        );

        let (record, outcome) = clean_trip(&raw("", "2", "", ""));
        assert!(record.is_none());
        assert_eq!(outcome, RowOutcome::Dropped(DropReason::MissingDate));
    }

    #[test]
    fn test_lock_before_unlock_is_dropped() {
        let (record, outcome) = clean_trip(&raw(
            "2022-11-01",
            "5",
            "2022-11-01 08:00:00",
            "2022-11-01 07:00:00",
        ));
        assert!(record.is_none());
        assert_eq!(outcome, RowOutcome::Dropped(DropReason::LockBeforeUnlock));
    }

    #[test]
    fn test_clean_trips_report() {
        let rows = vec![
            raw("2022-11-01", "1", "", ""),
            RawTrip::default(),
            raw("2022-11-01", "x", "2022-11-01 07:00:00", "2022-11-01 07:01:00"),
            raw("", "", "", ""),
        ];
        let (records, report) = clean_trips(rows);

        assert_eq!(records.len(), 2);
        assert_eq!(report.kept, 2);
        assert_eq!(report.recomputed, 1);
        assert_eq!(report.blank, 1);
        assert_eq!(report.missing_date, 1);
        assert_eq!(report.dropped(), 2);
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("2.0"), "2");
        assert_eq!(normalize_identifier("20"), "20");
        assert_eq!(normalize_identifier("10.05"), "10.05");
    }
}
