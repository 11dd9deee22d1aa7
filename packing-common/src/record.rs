use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// One frame of a packing run, exactly as the simulation writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameRecord {
    pub id: i64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Long-axis orientation of each assembly, radians.
    pub a: Vec<f64>,
    /// Minor semi-axis of the confining ellipse at this frame.
    #[serde(rename = "scalar radius")]
    pub scalar_radius: f64,
    pub energy: f64,
    #[serde(rename = "energy curve")]
    pub energy_curve: Vec<f64>,
}

/// Per-run constants shared by every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunMetadata {
    /// Initial (uncompressed) major semi-axis.
    #[serde(rename = "boundary size a")]
    pub boundary_a: f64,
    /// Initial (uncompressed) minor semi-axis.
    #[serde(rename = "boundary size b")]
    pub boundary_b: f64,
    /// Sub-spheres per assembly (`m`).
    #[serde(rename = "assembly number")]
    pub assembly_number: u32,
    /// Pitch between neighbouring sub-spheres (`Rm`).
    #[serde(rename = "sphere distance")]
    pub sphere_distance: f64,
    /// Display only.
    #[serde(rename = "particle aspect ratio", default)]
    pub particle_aspect_ratio: Option<f64>,
}

fn ensure_finite(record: &'static str, field: &str, values: &[f64]) -> AnalysisResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(AnalysisError::malformed(
            record,
            format!("field '{}' has a non-finite value at index {}", field, i),
        )),
        None => Ok(()),
    }
}

impl FrameRecord {
    /// Parses and validates a single JSON frame record.
    pub fn from_json_str(text: &str) -> AnalysisResult<Self> {
        let record: FrameRecord = serde_json::from_str(text)
            .map_err(|e| AnalysisError::malformed("frame", e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Number of assemblies in this frame.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let n = self.x.len();
        if self.y.len() != n || self.a.len() != n {
            return Err(AnalysisError::malformed(
                "frame",
                format!(
                    "frame {} has inconsistent array lengths: x={}, y={}, a={}",
                    self.id,
                    n,
                    self.y.len(),
                    self.a.len()
                ),
            ));
        }
        ensure_finite("frame", "x", &self.x)?;
        ensure_finite("frame", "y", &self.y)?;
        ensure_finite("frame", "a", &self.a)?;
        if !self.scalar_radius.is_finite() || self.scalar_radius <= 0.0 {
            return Err(AnalysisError::malformed(
                "frame",
                format!("frame {} has invalid scalar radius {}", self.id, self.scalar_radius),
            ));
        }
        Ok(())
    }
}

impl RunMetadata {
    /// Parses and validates the run metadata document.
    pub fn from_json_str(text: &str) -> AnalysisResult<Self> {
        let metadata: RunMetadata = serde_json::from_str(text)
            .map_err(|e| AnalysisError::malformed("metadata", e.to_string()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.boundary_a.is_finite() && self.boundary_a > 0.0)
            || !(self.boundary_b.is_finite() && self.boundary_b > 0.0)
        {
            return Err(AnalysisError::malformed(
                "metadata",
                format!("boundary sizes must be positive, got a={} b={}", self.boundary_a, self.boundary_b),
            ));
        }
        if self.assembly_number == 0 {
            return Err(AnalysisError::malformed("metadata", "assembly number must be at least 1"));
        }
        if !self.sphere_distance.is_finite() || self.sphere_distance < 0.0 {
            return Err(AnalysisError::malformed(
                "metadata",
                format!("sphere distance must be non-negative, got {}", self.sphere_distance),
            ));
        }
        Ok(())
    }

    /// Aspect ratio of the confining ellipse, `Gamma = LaM / LbM`.
    pub fn gamma(&self) -> f64 {
        self.boundary_a / self.boundary_b
    }
}

/// Iterates the records of a multi-record run file, one JSON object per line.
/// Lines that do not start with `{` (blank or partial lines) are skipped; errors
/// carry the 1-based line number.
pub fn frame_record_lines(text: &str) -> impl Iterator<Item = AnalysisResult<FrameRecord>> + '_ {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.starts_with('{'))
        .map(|(line_no, line)| {
            FrameRecord::from_json_str(line).map_err(|e| match e {
                AnalysisError::MalformedRecord { record, details } => AnalysisError::malformed(
                    record,
                    format!("line {}: {}", line_no + 1, details),
                ),
                other => other,
            })
        })
}

/// Parses a whole run file, failing on the first malformed record.
pub fn parse_frame_records(text: &str) -> AnalysisResult<Vec<FrameRecord>> {
    frame_record_lines(text).collect()
}
