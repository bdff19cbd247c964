// src/export.rs
//
// CSV export of the current run.

use crate::store::SampleStore;
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct Row {
    reading: u32,
    voltage_v: Option<f64>,
    current_a: Option<f64>,
    time_s: f64,
    timestamp: String,
}

/// Write every sample as a CSV row. Missing fields become empty cells.
pub fn csv_to_writer<W: Write>(store: &SampleStore, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for (s, t) in store.samples().iter().zip(store.elapsed_secs()) {
        wtr.serialize(Row {
            reading: s.index,
            voltage_v: s.voltage,
            current_a: s.current,
            time_s: t,
            timestamp: s.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        })
        .with_context(|| format!("Failed to write row {}", s.index))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write the store to `<folder>/vi_run_<date>_<time>.csv` and return the path.
pub fn write_csv(store: &SampleStore, folder: &Path) -> Result<PathBuf> {
    create_dir_all(folder)
        .with_context(|| format!("Failed to create export folder {}", folder.display()))?;

    let name = format!("vi_run_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
    let path = folder.join(name);

    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    csv_to_writer(store, file)?;

    log::info!("exported {} samples to {}", store.len(), path.display());
    Ok(path)
}
