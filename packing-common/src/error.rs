use thiserror::Error;

/// Failures raised by the analysis core.
///
/// Near-zero denominators are not errors: they resolve to documented sentinel
/// values and are reported through `log::warn!` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A frame or metadata record is missing fields, has unexpected fields,
    /// non-finite values, or inconsistent array lengths.
    #[error("malformed {record} record: {details}")]
    MalformedRecord { record: &'static str, details: String },

    /// Triangulation input is too small or fully collinear.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

impl AnalysisError {
    pub fn malformed(record: &'static str, details: impl Into<String>) -> Self {
        Self::MalformedRecord { record, details: details.into() }
    }

    pub fn degenerate(details: impl Into<String>) -> Self {
        Self::DegenerateGeometry(details.into())
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
