//! Runtime settings for reaching the EMT open-data portal.
//!
//! Values come from the environment (a `.env` file is loaded by the binary
//! through `dotenvy`):
//!
//! | Variable                    | Default                                |
//! |-----------------------------|----------------------------------------|
//! | `BICIMAD_BASE_URL`          | `https://opendata.emtmadrid.es/`       |
//! | `BICIMAD_INDEX_PATH`        | `Datos-estaticos/Datos-generales-(1)`  |
//! | `BICIMAD_HTTP_TIMEOUT_SECS` | `120`                                  |

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://opendata.emtmadrid.es/";
pub const DEFAULT_INDEX_PATH: &str = "Datos-estaticos/Datos-generales-(1)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Portal root; always ends with `/`.
    pub base_url: String,
    /// Page listing the monthly trip archives, relative to `base_url`.
    pub index_path: String,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, falling back to defaults
    /// for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(base) = lookup("BICIMAD_BASE_URL").filter(|v| !v.trim().is_empty()) {
            settings.base_url = with_trailing_slash(base.trim());
        }

        if let Some(path) = lookup("BICIMAD_INDEX_PATH").filter(|v| !v.trim().is_empty()) {
            settings.index_path = path.trim().trim_start_matches('/').to_string();
        }

        if let Some(raw) = lookup("BICIMAD_HTTP_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "Ignoring invalid BICIMAD_HTTP_TIMEOUT_SECS"),
            }
        }

        settings
    }

    /// Absolute URL of the archive index page.
    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url, self.index_path)
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
