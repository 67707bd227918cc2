//! JSON output for the downstream ingestion service.
//!
//! The consumer receives a plain JSON array of [`NormalizedContribution`]
//! objects, either on stdout or in a file. Only records that passed
//! validation reach this module; per-record failures are logged by the
//! caller and never written.

use std::error::Error;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

use crate::models::NormalizedContribution;

/// Serialize contributions as a pretty-printed JSON array.
///
/// # Arguments
///
/// * `records` - Normalized contributions, in output order
///
/// # Returns
///
/// The JSON text, or a serialization error.
pub fn to_json(records: &[NormalizedContribution]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Write contributions to a JSON file, creating parent directories as needed.
///
/// # Arguments
///
/// * `records` - Normalized contributions, in output order
/// * `path` - Destination file; an existing file is overwritten
///
/// # Returns
///
/// `Ok(())` on success, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display(), count = records.len()))]
pub async fn write_records(
    records: &[NormalizedContribution],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let path = path.as_ref();
    let json = to_json(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote contributions JSON");
    Ok(())
}

/// Write contributions to stdout, followed by a newline.
///
/// # Returns
///
/// `Ok(())` on success, or an error if serialization or the write fails.
pub async fn print_records(records: &[NormalizedContribution]) -> Result<(), Box<dyn Error>> {
    let mut json = to_json(records)?;
    json.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(json.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
