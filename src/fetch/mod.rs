//! Blocking downloads from the open-data portal.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::{HttpClient, HttpResponse};

use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{BiciMadError, Result};

/// Fetches `url` and returns its body.
///
/// # Errors
///
/// Returns [`BiciMadError::Download`] when the request fails or the server
/// answers with anything other than `200`.
#[tracing::instrument(skip(client))]
pub fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let started = Instant::now();

    let resp = client.get(url).map_err(|e| BiciMadError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if resp.status != 200 {
        return Err(BiciMadError::Download {
            url: url.to_string(),
            reason: format!("status code: {}", resp.status),
        });
    }

    let elapsed = started.elapsed();
    if elapsed.as_secs() > 30 {
        warn!(elapsed_secs = elapsed.as_secs(), "Download was slow");
    }
    debug!(bytes = resp.body.len(), "Download complete");

    Ok(resp.body)
}
