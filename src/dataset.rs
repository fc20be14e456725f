//! The cleaned trip table for one month.

use std::fmt;
use std::io::Read;

use tracing::info;

use crate::clean::{CleanReport, clean_trips};
use crate::config::Settings;
use crate::error::{BiciMadError, Result};
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::{extract_csv, read_trips};
use crate::period::Period;
use crate::registry::UrlRegistry;
use crate::trip::TripRecord;

/// Trips of one calendar month, cleaned once at construction and read-only
/// afterwards. Aggregations live in [`crate::stats`].
#[derive(Debug, Clone)]
pub struct TripDataset {
    period: Period,
    records: Vec<TripRecord>,
    report: CleanReport,
}

impl TripDataset {
    /// Downloads and loads `month`/`year` from the EMT portal using settings
    /// from the environment.
    pub fn load(month: u32, year: u32) -> Result<Self> {
        let settings = Settings::from_env();
        let client = BasicClient::new(settings.timeout).map_err(|e| BiciMadError::Download {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;
        Self::load_with(&client, &settings, month, year)
    }

    /// Resolves the archive through the portal index, then downloads it.
    pub fn load_with<C: HttpClient + ?Sized>(
        client: &C,
        settings: &Settings,
        month: u32,
        year: u32,
    ) -> Result<Self> {
        let period = Period::new(month, year)?;
        let registry = UrlRegistry::fetch(client, settings)?;
        Self::from_registry(client, &registry, period)
    }

    #[tracing::instrument(skip(client, registry))]
    pub fn from_registry<C: HttpClient + ?Sized>(
        client: &C,
        registry: &UrlRegistry,
        period: Period,
    ) -> Result<Self> {
        let url = registry.url_for(period)?;
        info!(url, "Downloading trip archive");
        let bytes = fetch_bytes(client, url)?;
        Self::from_archive(&bytes, period)
    }

    /// Builds the dataset from the bytes of a monthly ZIP archive.
    pub fn from_archive(bytes: &[u8], period: Period) -> Result<Self> {
        let csv = extract_csv(bytes, period)?;
        Self::from_reader(csv.as_slice(), period)
    }

    /// Builds the dataset from an already extracted CSV stream.
    pub fn from_reader<R: Read>(reader: R, period: Period) -> Result<Self> {
        let rows = read_trips(reader)?;
        let (records, report) = clean_trips(rows);
        info!(period = %period, trips = records.len(), "Trip dataset ready");
        Ok(Self {
            period,
            records,
            report,
        })
    }

    /// Wraps records that are already clean.
    #[cfg(test)]
    pub(crate) fn from_records(period: Period, records: Vec<TripRecord>) -> Self {
        let report = CleanReport {
            kept: records.len(),
            ..Default::default()
        };
        Self {
            period,
            records,
            report,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }

    pub fn year(&self) -> u32 {
        self.period.year()
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn clean_report(&self) -> CleanReport {
        self.report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Display for TripDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::FakeClient;
    use std::io::{Cursor, Write};
    use zip::CompressionMethod;
    use zip::write::FileOptions;

    const CSV: &str = "fecha;idBike;fleet;trip_minutes;unlock_date;lock_date;station_unlock;address_unlock\n\
2022-11-01;10.0;1.0;12;2022-11-01 07:00:00;2022-11-01 07:12:00;1.0;Calle Alcala\n\
;;;;;;;\n\
2022-11-02;11.0;1.0;-1;2022-11-02 09:00:00;2022-11-02 09:03:00;2.0;Calle Mayor\n";

    fn archive() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file("trips_22_11_November.csv", options).unwrap();
            zip.write_all(CSV.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_from_reader_cleans_rows() {
        let dataset = TripDataset::from_reader(CSV.as_bytes(), Period::new(11, 22).unwrap()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.clean_report().blank, 1);
        assert_eq!(dataset.clean_report().recomputed, 1);
        assert_eq!(dataset.records()[1].trip_minutes, 3.0);
        assert_eq!(dataset.records()[0].station_unlock.as_deref(), Some("1"));
    }

    #[test]
    fn test_load_with_downloads_index_and_archive() {
        let settings = Settings::default();
        let html = r#"<a href="/getattachment/abc/trips_22_11_November-csv.aspx">Nov</a>"#;
        let client = FakeClient::default()
            .with(&settings.index_url(), html)
            .with(
                "https://opendata.emtmadrid.es/getattachment/abc/trips_22_11_November-csv.aspx",
                archive(),
            );

        let dataset = TripDataset::load_with(&client, &settings, 11, 22).unwrap();
        assert_eq!(dataset.to_string(), "Month: 11, Year: 22");
        assert_eq!(dataset.month(), 11);
        assert_eq!(dataset.year(), 22);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_load_with_unknown_period() {
        let settings = Settings::default();
        let client = FakeClient::default().with(&settings.index_url(), "<html></html>");

        let err = TripDataset::load_with(&client, &settings, 4, 23).unwrap_err();
        assert!(matches!(err, BiciMadError::NotFound { month: 4, year: 23 }));
    }

    #[test]
    fn test_load_with_unreachable_archive() {
        let settings = Settings::default();
        let html = r#"<a href="/getattachment/trips_22_11_November-csv.aspx">Nov</a>"#;
        let client = FakeClient::default().with(&settings.index_url(), html);

        let err = TripDataset::load_with(&client, &settings, 11, 22).unwrap_err();
        assert!(err.is_download());
        assert!(err.to_string().ends_with("status code: 404"));
    }

    #[test]
    fn test_from_archive_rejects_garbage() {
        let err = TripDataset::from_archive(b"garbage", Period::new(11, 22).unwrap()).unwrap_err();
        assert!(err.is_parse());
    }
}
