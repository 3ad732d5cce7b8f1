use crate::types::observation::DataSource;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(
        "duplicate {source_kind} observation for centroid '{centroid_id}' on {date}"
    )]
    DataIntegrity {
        centroid_id: String,
        date: NaiveDate,
        source_kind: DataSource,
    },

    #[error("duplicate merged record for centroid '{centroid_id}' on {date}")]
    DuplicateMergedKey {
        centroid_id: String,
        date: NaiveDate,
    },

    #[error(
        "validation dropped {dropped} of {total} record(s) ({percent:.1}%), above the configured limit"
    )]
    Validation {
        dropped: usize,
        total: usize,
        percent: f64,
    },
}
