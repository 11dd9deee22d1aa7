use anyhow::{Context, Result};
use log::info;
use packing_common::{frame_record_lines, AnalysisConfig, RunMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::frame::Frame;

/// All frames of one simulation run, in file order.
#[derive(Debug)]
pub struct Run {
    pub name: String,
    /// Position of the run within the batch.
    pub index: usize,
    pub metadata: Arc<RunMetadata>,
    pub frames: Vec<Frame>,
}

pub fn metadata_path(src_dir: &Path, name: &str) -> PathBuf {
    src_dir.join(format!("{}.metadata.json", name))
}

pub fn data_path(src_dir: &Path, name: &str) -> PathBuf {
    src_dir.join(format!("{}.json", name))
}

pub fn load_metadata(path: &Path) -> Result<RunMetadata> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata file '{}'", path.display()))?;
    let metadata = RunMetadata::from_json_str(&text)
        .with_context(|| format!("Invalid metadata in '{}'", path.display()))?;
    Ok(metadata)
}

/// Loads `<src_dir>/<name>.metadata.json` and `<src_dir>/<name>.json`.
///
/// The first malformed metadata or frame record fails the whole run.
pub fn load_run(src_dir: &Path, name: &str, index: usize, config: &AnalysisConfig) -> Result<Run> {
    let metadata = Arc::new(load_metadata(&metadata_path(src_dir, name))?);
    let contact = config.contact_params(&metadata);

    let path = data_path(src_dir, name);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read run data '{}'", path.display()))?;

    let mut frames = Vec::new();
    for (record_no, result) in frame_record_lines(&text).enumerate() {
        let frame = result
            .and_then(|record| Frame::new(record, Arc::clone(&metadata), contact))
            .with_context(|| format!("Malformed frame record #{} in '{}'", record_no + 1, path.display()))?;
        frames.push(frame);
    }
    info!(
        "Loaded run #{} '{}': {} frames, m = {}, Gamma = {:.3}",
        index,
        name,
        frames.len(),
        metadata.assembly_number,
        metadata.gamma()
    );

    Ok(Run {
        name: name.to_string(),
        index,
        metadata,
        frames,
    })
}
