use serde::{Deserialize, Serialize};

/// Contact geometry derived from the run metadata and the contact configuration,
/// used by every brief and fine contact query of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    /// Half-length of an assembly's bounding rectangle: `(m - 1) / 2 * Rm + r`.
    pub half_length: f64,
    /// Half-width of an assembly's bounding rectangle: the tolerance `r`.
    pub half_width: f64,
    /// Brief-test radius used as the fine-test prefilter. Two rectangles can only
    /// intersect when their centers are at most twice this value apart.
    pub prefilter_radius: f64,
    /// Brief-test radius used for nearest-contact (square phase) neighbourhoods.
    pub sphere_contact_radius: f64,
}

impl ContactParams {
    pub fn new(assembly_number: u32, sphere_distance: f64, tolerance: f64, sphere_contact_radius: f64) -> Self {
        let half_length = (assembly_number.saturating_sub(1)) as f64 / 2.0 * sphere_distance + tolerance;
        let half_width = tolerance;
        // circumradius of the rectangle, never below the half-length
        let prefilter_radius = half_length.hypot(half_width);
        ContactParams { half_length, half_width, prefilter_radius, sphere_contact_radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn prefilter_covers_rectangle_diagonal() {
        let p = ContactParams::new(3, 2.0, 1.2, 1.5);
        assert_relative_eq!(p.half_length, 3.2);
        assert_relative_eq!(p.half_width, 1.2);
        assert!(p.prefilter_radius >= p.half_length);
        assert_relative_eq!(p.prefilter_radius, (3.2f64 * 3.2 + 1.2 * 1.2).sqrt());
    }

    #[test]
    fn single_sphere_is_a_square() {
        let p = ContactParams::new(1, 2.0, 1.0, 1.5);
        assert_relative_eq!(p.half_length, 1.0);
        assert_relative_eq!(p.half_width, 1.0);
    }
}
