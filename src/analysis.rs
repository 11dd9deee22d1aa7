//! Frame and run analysis: turns loaded runs into summaries, curves and reports.

use anyhow::{Context, Result};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use packing_common::{AnalysisConfig, AnalysisResult, FrameSummary, ParticleFields, RunMetadata};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::interpolation::GridField;
use crate::loader::Run;
use crate::scale::ScaleHelper;
use crate::series::{self, RunCurves};

/// Bond order stored per particle when particle fields are requested.
const PARTICLE_FIELD_BOND_ORDER: u32 = 6;

/// An interpolated orientation field of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInterpolation {
    pub frame_id: i64,
    pub fold: u32,
    pub field: GridField,
}

/// Everything computed for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub index: usize,
    pub metadata: RunMetadata,
    /// Raster mapping against the initial boundary.
    pub scale: ScaleHelper,
    pub frames_loaded: usize,
    /// Frames whose analysis failed. Every per-frame field below covers only the others.
    pub frames_skipped: usize,
    /// Frames dropped by the density cutoff.
    pub frames_truncated: usize,
    pub summaries: Vec<FrameSummary>,
    pub curves: RunCurves,
    /// `(frame id, e / e0 - 1)` for every analyzed frame with a usable energy curve.
    pub energy_split: Vec<(i64, Vec<f64>)>,
    /// Orientation histograms, one column per entry of `curves.frame_ids`.
    pub angle_distribution: Vec<Vec<u32>>,
    pub square_scalar_correlation: Option<f64>,
    pub interpolations: Vec<FrameInterpolation>,
}

/// Computes the scalar summary of one frame.
pub fn analyze_frame(frame: &Frame, config: &AnalysisConfig) -> AnalysisResult<FrameSummary> {
    let graph = frame.neighbor_graph()?;
    let bond_order_averages = config
        .order
        .bond_orders
        .iter()
        .map(|&k| Ok((k, frame.average_bond_order(k)?)))
        .collect::<AnalysisResult<Vec<_>>>()?;

    let particle_fields = if config.output.save_particle_fields {
        Some(ParticleFields {
            coordination: graph.coordination_numbers(),
            hexatic: frame.hexatic(PARTICLE_FIELD_BOND_ORDER)?,
            square: frame.square_order(config.order.square_order),
            scalar_order: frame.scalar_order_field()?.to_vec(),
        })
    } else {
        None
    };

    Ok(FrameSummary {
        id: frame.id,
        particle_count: frame.len(),
        energy: frame.energy,
        scalar_radius: frame.scalar_radius(),
        number_density: frame.number_density(),
        ideal_packing_density: frame.ideal_packing_density(),
        bond_order_averages,
        square_order_average: frame.average_square_order(config.order.square_order),
        scalar_order_average: frame.average_scalar_order()?,
        overall_scalar_order: frame.overall_scalar_order(),
        overall_scalar_order_normalized: frame.overall_scalar_order_normalized(),
        overall_best_angle: frame.overall_best_angle(),
        expected_cluster_size: frame.expected_cluster_size()?,
        coordination: graph.coordination_histogram(),
        mean_coordination: graph.mean_coordination(),
        particle_fields,
    })
}

/// Interpolated orientation fields of one frame for every configured fold.
pub fn interpolate_frame(frame: &Frame, config: &AnalysisConfig) -> AnalysisResult<Vec<FrameInterpolation>> {
    config
        .interpolation
        .folds
        .iter()
        .map(|&fold| {
            let field = frame.angle_interpolation(fold, config.interpolation.grid_rows)?;
            Ok(FrameInterpolation { frame_id: frame.id, fold, field })
        })
        .collect()
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(len as u64);
    match ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]") {
        Ok(style) => progress_bar.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Invalid progress bar template: {}", e),
    }
    progress_bar
}

/// Analyzes every frame of a run in parallel. Frames that fail are logged and left out of every per-frame output.
pub fn analyze_run(run: &Run, config: &AnalysisConfig) -> RunReport {
    let frames: &[Frame] = match config.series.max_density {
        Some(max_density) => series::frames_up_to(&run.frames, max_density),
        None => &run.frames,
    };
    let frames_truncated = run.frames.len() - frames.len();
    if frames_truncated > 0 {
        info!(
            "Run '{}': density cutoff keeps {} of {} frames.",
            run.name,
            frames.len(),
            run.frames.len()
        );
    }

    let progress = progress_bar(frames.len());
    let outputs: Vec<Option<(FrameSummary, Vec<FrameInterpolation>)>> = frames
        .par_iter()
        .progress_with(progress.clone())
        .map(|frame| {
            let summary = match analyze_frame(frame, config) {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Run '{}', frame {}: {}", run.name, frame.id, e);
                    return None;
                }
            };
            let interpolations = if config.interpolation.enabled {
                interpolate_frame(frame, config).unwrap_or_else(|e| {
                    error!("Run '{}', frame {}: interpolation failed: {}", run.name, frame.id, e);
                    Vec::new()
                })
            } else {
                Vec::new()
            };
            debug!("Run '{}', frame {} analyzed.", run.name, frame.id);
            Some((summary, interpolations))
        })
        .collect();
    progress.finish_with_message(format!("Analyzed {} frames", frames.len()));

    let failed = outputs.iter().filter(|o| o.is_none()).count();
    let mut analyzed: Vec<&Frame> = Vec::with_capacity(frames.len() - failed);
    let mut summaries = Vec::with_capacity(frames.len() - failed);
    let mut interpolations = Vec::new();
    for (frame, output) in frames.iter().zip(outputs) {
        if let Some((summary, fields)) = output {
            analyzed.push(frame);
            summaries.push(summary);
            interpolations.extend(fields);
        }
    }

    let curves = RunCurves::from_summaries(&summaries);
    let energy_split: Vec<(i64, Vec<f64>)> = analyzed
        .iter()
        .filter_map(|f| series::relative_energy(&f.energy_curve).map(|curve| (f.id, curve)))
        .collect();
    let square_scalar_correlation = curves.square_scalar_correlation();
    match square_scalar_correlation {
        Some(r) => info!("Run '{}': square order / scalar order correlation r = {:.4}", run.name, r),
        None => warn!("Run '{}': square order / scalar order correlation undefined.", run.name),
    }

    RunReport {
        name: run.name.clone(),
        index: run.index,
        metadata: (*run.metadata).clone(),
        scale: ScaleHelper::for_boundary(config.scale.height, run.metadata.boundary_a, run.metadata.boundary_b),
        frames_loaded: run.frames.len(),
        frames_skipped: failed,
        frames_truncated,
        summaries,
        curves,
        energy_split,
        angle_distribution: series::angle_distribution_matrix(analyzed),
        square_scalar_correlation,
        interpolations,
    }
}

fn report_path(output_dir: &Path, config: &AnalysisConfig, run_name: &str, suffix: &str) -> PathBuf {
    output_dir.join(format!("{}_{}{}", config.output.base_filename, run_name, suffix))
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Error creating output file '{}'", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Writes the report in the configured format and, if enabled, a CSV of its curves.
/// Returns the paths written.
pub fn write_report(report: &RunReport, output_dir: &Path, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    let output_format = config.output.format.as_deref().unwrap_or("json");
    let mut written = Vec::new();

    let path = match output_format {
        "bincode" => {
            let path = report_path(output_dir, config, &report.name, ".bin");
            let mut writer = create_file(&path)?;
            bincode::serialize_into(&mut writer, report).context("Error serializing report to bincode")?;
            writer.flush()?;
            path
        }
        "messagepack" => {
            let path = report_path(output_dir, config, &report.name, ".msgpack");
            let mut writer = create_file(&path)?;
            rmp_serde::encode::write(&mut writer, report).context("Error serializing report to MessagePack")?;
            writer.flush()?;
            path
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let path = report_path(output_dir, config, &report.name, ".json");
            let mut writer = create_file(&path)?;
            serde_json::to_writer(&mut writer, report).context("Error serializing report to JSON")?;
            writer.flush()?;
            path
        }
    };
    written.push(path);

    if config.output.save_curves_csv {
        let path = report_path(output_dir, config, &report.name, "_curves.csv");
        let writer = create_file(&path)?;
        report
            .curves
            .write_csv(writer)
            .with_context(|| format!("Error writing CSV file '{}'", path.display()))?;
        written.push(path);
    }

    for path in &written {
        info!("Run '{}' written to {}", report.name, path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::{frame_from, lattice, metadata};
    use tempfile::tempdir;

    fn run_of(frames: Vec<Frame>) -> Run {
        Run {
            name: "disk".to_string(),
            index: 0,
            metadata: metadata(2, 1.5),
            frames,
        }
    }

    fn compressing_frames(count: usize) -> Vec<Frame> {
        let points = lattice(4, 4);
        (0..count)
            .map(|i| {
                let thetas: Vec<f64> = (0..16).map(|j| 0.1 * (i + j) as f64).collect();
                frame_from(i as i64, &points, &thetas, 20.0 - i as f64, metadata(2, 1.5))
            })
            .collect()
    }

    #[test]
    fn frame_summary_collects_configured_orders() {
        let frames = compressing_frames(1);
        let config = AnalysisConfig::default();
        let summary = analyze_frame(&frames[0], &config).unwrap();
        assert_eq!(summary.particle_count, 16);
        assert_eq!(
            summary.bond_order_averages.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![4, 6]
        );
        assert_eq!(summary.coordination.total(), 16);
        assert!(summary.particle_fields.is_none());
        assert!(summary.overall_scalar_order_normalized.is_some());
    }

    #[test]
    fn particle_fields_are_kept_on_request() {
        let frames = compressing_frames(1);
        let mut config = AnalysisConfig::default();
        config.output.save_particle_fields = true;
        let fields = analyze_frame(&frames[0], &config).unwrap().particle_fields.unwrap();
        assert_eq!(fields.coordination.len(), 16);
        assert_eq!(fields.hexatic.len(), 16);
        assert_eq!(fields.square.len(), 16);
        assert_eq!(fields.scalar_order.len(), 16);
    }

    #[test]
    fn failing_frames_are_skipped() {
        let mut frames = compressing_frames(3);
        let collinear = frame_from(99, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)], &[0.0; 3], 10.0, metadata(2, 1.5));
        frames.insert(1, collinear);
        let run = run_of(frames);
        let report = analyze_run(&run, &AnalysisConfig::default());
        assert_eq!(report.frames_loaded, 4);
        assert_eq!(report.frames_skipped, 1);
        assert_eq!(report.curves.frame_ids, vec![0, 1, 2]);
        // per-frame columns stay aligned with the analyzed frames
        assert!(report.angle_distribution.iter().all(|row| row.len() == 3));
        assert_eq!(
            report.energy_split.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            report.curves.frame_ids
        );
        for (col, &index) in [0usize, 2, 3].iter().enumerate() {
            let histogram = run.frames[index].angle_distribution();
            for (row, &count) in histogram.iter().enumerate() {
                assert_eq!(report.angle_distribution[row][col], count);
            }
        }
    }

    #[test]
    fn density_cutoff_truncates_run() {
        let frames = compressing_frames(5);
        let cutoff = 0.5 * (frames[1].ideal_packing_density() + frames[2].ideal_packing_density());
        let mut config = AnalysisConfig::default();
        config.series.max_density = Some(cutoff);
        config.interpolation.enabled = true;
        config.interpolation.grid_rows = 10;
        let report = analyze_run(&run_of(frames), &config);
        assert_eq!(report.frames_truncated, 3);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.interpolations.len(), 4);
        assert!(report.square_scalar_correlation.map_or(true, |r| (-1.0..=1.0).contains(&r)));
    }

    #[test]
    fn reports_are_written_in_every_format() {
        let report = analyze_run(&run_of(compressing_frames(3)), &AnalysisConfig::default());
        let dir = tempdir().unwrap();
        for (format, extension) in [("json", "json"), ("bincode", "bin"), ("messagepack", "msgpack"), ("yaml", "json")] {
            let mut config = AnalysisConfig::default();
            config.output.format = Some(format.to_string());
            config.output.base_filename = format!("out_{}", format);
            let written = write_report(&report, dir.path(), &config).unwrap();
            assert_eq!(written.len(), 2);
            assert_eq!(written[0].extension().unwrap(), extension);
            assert!(written.iter().all(|p| p.exists()));
        }

        let json = std::fs::read_to_string(dir.path().join("out_json_disk.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summaries"].as_array().unwrap().len(), 3);

        let bytes = std::fs::read(dir.path().join("out_bincode_disk.bin")).unwrap();
        let decoded: RunReport = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.summaries, report.summaries);
    }
}
