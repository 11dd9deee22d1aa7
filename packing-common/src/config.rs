use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::params::ContactParams;
use crate::record::RunMetadata;

// Contact detection settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ContactConfig {
    /// Radius `a` of the brief (center distance) contact test used by the square-phase order.
    #[serde(default = "default_sphere_contact_radius")]
    pub sphere_contact_radius: f64,
    /// Half-width tolerance `r` of the oriented rectangles in the fine contact test.
    #[serde(default = "default_fine_tolerance")]
    pub fine_tolerance: f64,
}

// Order parameter settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OrderConfig {
    /// Symmetry orders k for which <Psi_k> is reported.
    #[serde(default = "default_bond_orders")]
    pub bond_orders: Vec<u32>,
    /// Order of the nearest-contact square-phase parameter.
    #[serde(default = "default_square_order")]
    pub square_order: u32,
}

// Director field interpolation settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct InterpolationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Grid rows `sz`; columns are `round(sz * Gamma)`.
    #[serde(default = "default_grid_rows")]
    pub grid_rows: usize,
    #[serde(default = "default_folds")]
    pub folds: Vec<u32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SeriesConfig {
    /// Frames from the first one whose ideal density exceeds this value are dropped.
    #[serde(default)]
    pub max_density: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScaleConfig {
    /// Raster height in pixels used by the boundary-normalized scaling.
    #[serde(default = "default_scale_height")]
    pub height: u32,
}

// Configuration for output settings, loaded from analysis.toml
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    /// Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_true")]
    pub save_curves_csv: bool,
    /// Store per-particle order fields in every frame summary (large).
    #[serde(default)]
    pub save_particle_fields: bool,
}

/// Main analysis configuration structure, loaded from analysis.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub interpolation: InterpolationConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ContactConfig {
    fn default() -> Self {
        ContactConfig {
            sphere_contact_radius: default_sphere_contact_radius(),
            fine_tolerance: default_fine_tolerance(),
        }
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig { bond_orders: default_bond_orders(), square_order: default_square_order() }
    }
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        InterpolationConfig { enabled: false, grid_rows: default_grid_rows(), folds: default_folds() }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig { height: default_scale_height() }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            format: None,
            save_curves_csv: true,
            save_particle_fields: false,
        }
    }
}

impl AnalysisConfig {
    /// Loads the analysis configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contact.sphere_contact_radius > 0.0) {
            anyhow::bail!("contact.sphere_contact_radius must be positive.");
        }
        if !(self.contact.fine_tolerance > 0.0) {
            anyhow::bail!("contact.fine_tolerance must be positive.");
        }
        if self.order.bond_orders.is_empty() || self.order.bond_orders.contains(&0) {
            anyhow::bail!("order.bond_orders must be a non-empty list of positive orders.");
        }
        if self.order.square_order == 0 {
            anyhow::bail!("order.square_order must be positive.");
        }
        if self.interpolation.grid_rows < 2 {
            anyhow::bail!("interpolation.grid_rows must be at least 2.");
        }
        if self.interpolation.folds.contains(&0) {
            anyhow::bail!("interpolation.folds must be positive.");
        }
        if self.scale.height == 0 {
            anyhow::bail!("scale.height must be positive.");
        }
        Ok(())
    }

    /// Converts the contact configuration into run-specific geometric parameters.
    pub fn contact_params(&self, metadata: &RunMetadata) -> ContactParams {
        ContactParams::new(
            metadata.assembly_number,
            metadata.sphere_distance,
            self.contact.fine_tolerance,
            self.contact.sphere_contact_radius,
        )
    }
}

fn default_sphere_contact_radius() -> f64 {
    1.5
}

fn default_fine_tolerance() -> f64 {
    1.2
}

fn default_bond_orders() -> Vec<u32> {
    vec![4, 6]
}

fn default_square_order() -> u32 {
    4
}

fn default_grid_rows() -> usize {
    200
}

fn default_folds() -> Vec<u32> {
    vec![2, 4]
}

fn default_scale_height() -> u32 {
    500
}

fn default_base_filename() -> String {
    "packing_analysis".to_string()
}

fn default_true() -> bool {
    true
}
