//! Persists merged records as a fixed-schema Parquet artifact.
//!
//! Schema: `centroid_id`, `date` (ISO-8601), one column per canonical
//! variable, `sources_present`. The schema is identical across runs so
//! downstream consumers can append and diff. Writes go through a temp file
//! in the target directory and are moved into place atomically; a cancelled
//! run never leaves a partial artifact.

use crate::output::error::OutputError;
use crate::types::observation::MergedRecord;
use crate::types::variable::Variable;
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;

/// Builds the fixed-schema frame for a record batch.
fn to_dataframe(records: &[MergedRecord]) -> Result<DataFrame, OutputError> {
    let centroid_ids: Vec<&str> = records.iter().map(|r| r.centroid_id.as_str()).collect();
    let dates: Vec<String> = records
        .iter()
        .map(|r| r.date.format("%Y-%m-%d").to_string())
        .collect();
    let sources: Vec<String> = records.iter().map(|r| r.sources_label()).collect();

    let mut columns = vec![
        Column::new("centroid_id".into(), centroid_ids),
        Column::new("date".into(), dates),
    ];
    for variable in Variable::ALL {
        let values: Vec<Option<f64>> = records
            .iter()
            .map(|r| r.values.get(&variable).copied())
            .collect();
        columns.push(Column::new(variable.column_name().into(), values));
    }
    columns.push(Column::new("sources_present".into(), sources));

    DataFrame::new(columns).map_err(OutputError::Frame)
}

/// Writes `records` to `path`, returning the artifact's location.
///
/// With `append` set and an existing artifact present, the old records are
/// folded in; new records win on duplicate (centroid_id, date) keys and the
/// union is re-sorted before writing.
pub async fn write_records(
    records: Vec<MergedRecord>,
    path: &Path,
    append: bool,
) -> Result<PathBuf, OutputError> {
    let path = path.to_path_buf();
    let row_count = records.len();

    task::spawn_blocking(move || {
        let new_frame = to_dataframe(&records)?;

        let mut frame = if append && path.exists() {
            let existing = LazyFrame::scan_parquet(&path, Default::default())
                .map_err(|e| OutputError::ParquetScan(path.clone(), e))?;
            // New records first so `keep first` resolves duplicates to them.
            concat([new_frame.lazy(), existing], UnionArgs::default())
                .and_then(|combined| {
                    combined
                        .unique_stable(
                            Some(vec!["centroid_id".into(), "date".into()]),
                            UniqueKeepStrategy::First,
                        )
                        .sort(["date", "centroid_id"], SortMultipleOptions::default())
                        .collect()
                })
                .map_err(OutputError::Frame)?
        } else {
            new_frame
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| OutputError::Io(path.clone(), e))?;
        let temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| OutputError::Io(path.clone(), e))?;

        ParquetWriter::new(temp.as_file())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut frame)
            .map_err(|e| OutputError::ParquetWrite(path.clone(), e))?;

        temp.persist(&path)
            .map_err(|e| OutputError::Persist(path.clone(), e.error))?;

        info!(
            "Wrote {} record(s) ({} total rows) to {}",
            row_count,
            frame.height(),
            path.display()
        );
        Ok(path)
    })
    .await?
}
