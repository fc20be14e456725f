//! Catalog of monthly trip archives published on the EMT open-data portal.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{BiciMadError, Result};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::period::Period;

lazy_static! {
    static ref ARCHIVE_LINK_REGEX: Regex =
        Regex::new(r#"getattachment/[^"'\s<>]*?trips_\d{2}_\d{2}_[a-zA-Z]+-csv\.aspx"#).unwrap();
    static ref LINK_PERIOD_REGEX: Regex = Regex::new(r"trips_(\d{2})_(\d{2})_").unwrap();
}

/// Maps each published [`Period`] to the URL of its ZIP archive.
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    entries: BTreeMap<Period, String>,
}

impl UrlRegistry {
    /// Downloads the portal index page and collects every archive link on it.
    #[tracing::instrument(skip(client, settings), fields(index = %settings.index_url()))]
    pub fn fetch<C: HttpClient + ?Sized>(client: &C, settings: &Settings) -> Result<Self> {
        let bytes = fetch_bytes(client, &settings.index_url())?;
        let html = String::from_utf8_lossy(&bytes);
        let registry = Self::from_html(&html, &settings.base_url);
        info!(periods = registry.len(), "Archive index loaded");
        Ok(registry)
    }

    pub fn from_html(html: &str, base_url: &str) -> Self {
        Self::from_links(extract_links(html, base_url))
    }

    /// Builds a registry from absolute archive URLs. Links without a
    /// recognizable `trips_YY_MM_` marker are ignored; if two links name the
    /// same period the lexicographically smallest wins.
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = BTreeMap::new();

        for link in links {
            let link = link.into();
            let Some(period) = period_of_link(&link) else {
                debug!(link = %link, "Skipping link without a valid period");
                continue;
            };

            entries
                .entry(period)
                .and_modify(|existing: &mut String| {
                    if link < *existing {
                        *existing = link.clone();
                    }
                })
                .or_insert(link);
        }

        Self { entries }
    }

    /// Resolves the archive URL for `month`/`year` (two-digit year).
    ///
    /// # Errors
    ///
    /// [`BiciMadError::InvalidPeriod`] for out-of-range arguments and
    /// [`BiciMadError::NotFound`] when the portal has no archive for the period.
    pub fn get_url(&self, month: u32, year: u32) -> Result<&str> {
        let period = Period::new(month, year)?;
        self.url_for(period)
    }

    pub fn url_for(&self, period: Period) -> Result<&str> {
        self.entries
            .get(&period)
            .map(String::as_str)
            .ok_or(BiciMadError::NotFound {
                month: period.month(),
                year: period.year(),
            })
    }

    /// Published periods, oldest first.
    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, &str)> {
        self.entries.iter().map(|(p, url)| (*p, url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finds archive links in an HTML page and makes them absolute against
/// `base_url`. The result is sorted and free of duplicates.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let mut links: Vec<String> = ARCHIVE_LINK_REGEX
        .find_iter(html)
        .map(|m| format!("{}/{}", base, m.as_str()))
        .collect();
    links.sort();
    links.dedup();
    links
}

fn period_of_link(link: &str) -> Option<Period> {
    let caps = LINK_PERIOD_REGEX.captures(link)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    Period::new(month, year).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::FakeClient;

    const NOVEMBER_22: &str = "https://opendata.emtmadrid.es/getattachment/45f51cef-9296-4afe-b42e-d8d5bca3c548/trips_22_11_November-csv.aspx";
    const OCTOBER_21: &str = "https://opendata.emtmadrid.es/51ba4be6-596f-41d3-8bab-634c4be569c5/trips_21_10_October-csv.aspx";
    const MARCH_22: &str = "https://opendata.emtmadrid.es/getattachment/trips_22_03_march-csv.aspx";

    const INDEX_HTML: &str = r#"<html><body>
<ul>
<li><a href="/getattachment/45f51cef-9296-4afe-b42e-d8d5bca3c548/trips_22_11_November-csv.aspx">Noviembre 2022</a></li>
<li><a href="/getattachment/trips_22_03_march-csv.aspx">Marzo 2022</a> <a href="/getattachment/aa11/Manual.pdf">Manual</a></li>
<li><a href="/getattachment/51ba4be6-596f-41d3-8bab-634c4be569c5/trips_21_10_October-csv.aspx">Octubre 2021</a></li>
<li><a href="/getattachment/51ba4be6-596f-41d3-8bab-634c4be569c5/trips_21_10_October-csv.aspx">duplicate</a></li>
<li><a href="/getattachment/0c2d/Usos-bicimad-2019.aspx">2019</a></li>
</ul>
</body></html>"#;

    fn registry() -> UrlRegistry {
        UrlRegistry::from_links([NOVEMBER_22, OCTOBER_21, MARCH_22])
    }

    #[test]
    fn test_get_url_valid_cases() {
        let registry = registry();
        assert_eq!(registry.get_url(11, 22).unwrap(), NOVEMBER_22);
        assert_eq!(registry.get_url(10, 21).unwrap(), OCTOBER_21);
        assert_eq!(registry.get_url(3, 22).unwrap(), MARCH_22);
    }

    #[test]
    fn test_get_url_invalid_period() {
        let registry = registry();
        for (month, year) in [(0, 23), (13, 23), (1, 100)] {
            assert!(matches!(
                registry.get_url(month, year),
                Err(BiciMadError::InvalidPeriod { .. })
            ));
        }
    }

    #[test]
    fn test_get_url_not_found() {
        let registry = registry();
        for (month, year) in [(4, 23), (9, 23), (12, 22), (1, 20)] {
            let err = registry.get_url(month, year).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("no valid link for month {month} of year {year}")
            );
        }
    }

    #[test]
    fn test_extract_links() {
        let links = extract_links(INDEX_HTML, "https://opendata.emtmadrid.es/");
        assert_eq!(
            links,
            vec![
                "https://opendata.emtmadrid.es/getattachment/45f51cef-9296-4afe-b42e-d8d5bca3c548/trips_22_11_November-csv.aspx",
                "https://opendata.emtmadrid.es/getattachment/51ba4be6-596f-41d3-8bab-634c4be569c5/trips_21_10_October-csv.aspx",
                "https://opendata.emtmadrid.es/getattachment/trips_22_03_march-csv.aspx",
            ]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = UrlRegistry::from_html(INDEX_HTML, "https://opendata.emtmadrid.es/");
        let b = UrlRegistry::from_html(INDEX_HTML, "https://opendata.emtmadrid.es/");
        assert_eq!(a.len(), 3);
        for period in a.periods() {
            let url = a.url_for(period).unwrap();
            assert_eq!(url, b.url_for(period).unwrap());
            assert!(url.starts_with("https://opendata.emtmadrid.es/getattachment/"));
            assert!(url.contains(&period.file_stem()));
            assert!(url.ends_with("-csv.aspx"));
        }
    }

    #[test]
    fn test_fetch_reads_index_page() {
        let settings = Settings::default();
        let client = FakeClient::default().with(&settings.index_url(), INDEX_HTML);

        let registry = UrlRegistry::fetch(&client, &settings).unwrap();
        let periods: Vec<_> = registry.periods().collect();
        assert_eq!(
            periods,
            vec![
                Period::new(10, 21).unwrap(),
                Period::new(3, 22).unwrap(),
                Period::new(11, 22).unwrap(),
            ]
        );
    }

    #[test]
    fn test_fetch_error_status() {
        let settings = Settings::default();
        let err = UrlRegistry::fetch(&FakeClient::default(), &settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to connect to https://opendata.emtmadrid.es/Datos-estaticos/Datos-generales-(1), status code: 404"
        );
    }
}
