//! Archive and CSV parsing for the monthly trip files.

use std::io::{Cursor, Read};

use csv::{ReaderBuilder, Trim};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{BiciMadError, Result};
use crate::period::Period;
use crate::trip::RawTrip;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Pulls the month's record file out of a downloaded ZIP archive.
///
/// The entry is looked up by its canonical name (see [`Period::csv_name`]),
/// then case-insensitively, and finally as the archive's only `.csv` entry.
///
/// # Errors
///
/// Returns [`BiciMadError::Parse`] if the bytes are not a ZIP archive or no
/// suitable entry exists.
pub fn extract_csv(bytes: &[u8], period: Period) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let wanted = period.csv_name();

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let csv_entries: Vec<&String> = names
        .iter()
        .filter(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .collect();

    let entry = names
        .iter()
        .find(|n| **n == wanted)
        .or_else(|| names.iter().find(|n| n.eq_ignore_ascii_case(&wanted)))
        .or_else(|| match csv_entries.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
        .ok_or_else(|| {
            BiciMadError::Parse(format!(
                "archive has no entry {wanted} (entries: {})",
                names.join(", ")
            ))
        })?
        .clone();

    debug!(entry = %entry, "Extracting record file");
    let mut file = archive.by_name(&entry)?;
    // The declared size comes from the archive header; let the buffer grow.
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Reads `;`-delimited trip rows.
///
/// # Errors
///
/// Returns [`BiciMadError::Parse`] if the header lacks `trip_minutes` or any
/// date column, or a row cannot be decoded.
pub fn read_trips<R: Read>(mut reader: R) -> Result<Vec<RawTrip>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    let body = buf.strip_prefix(UTF8_BOM).unwrap_or(&buf[..]);

    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(body);

    let headers = rdr.headers()?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);
    if !has("trip_minutes") {
        return Err(BiciMadError::Parse("missing column trip_minutes".to_string()));
    }
    if !has("fecha") && !has("unlock_date") {
        return Err(BiciMadError::Parse(
            "missing date columns fecha/unlock_date".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RawTrip = result?;
        rows.push(row);
    }

    debug!(rows = rows.len(), "Parsed trip rows");
    Ok(rows)
}
