//! Tunable parameters of point location and interpolation.
//!
//! # Examples
//!
//! ```rust
//! use simplicial_interp::config::{InterpolationConfig, InterpolationConfigBuilder};
//!
//! let config = InterpolationConfigBuilder::default()
//!     .threads(Some(2))
//!     .grain_size(16)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.threads, Some(2));
//! assert_eq!(config.vertex_epsilon, InterpolationConfig::default().vertex_epsilon);
//!
//! assert!(InterpolationConfigBuilder::default().barycentric_epsilon(-1.0).build().is_err());
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::core::algorithms::bin_grid::DEFAULT_TARGET_BINS;
use crate::core::algorithms::enclosing_simplex::DEFAULT_BARYCENTRIC_EPSILON;
use crate::core::mesh::DEFAULT_VERTEX_EPSILON;
use crate::core::parallel::DEFAULT_GRAIN_SIZE;

/// Resource defaults shared by meshes, locators and executors.
///
/// Missing fields take their default when deserializing, so configurations
/// written by older versions still load.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct InterpolationConfig {
    /// Barycentric tolerance of [`Mesh`](crate::core::mesh::Mesh) containment tests.
    #[builder(default = "DEFAULT_VERTEX_EPSILON")]
    pub vertex_epsilon: f64,
    /// Barycentric tolerance of enclosing-simplex queries.
    #[builder(default = "DEFAULT_BARYCENTRIC_EPSILON")]
    pub barycentric_epsilon: f64,
    /// Worker threads; `None` uses the global rayon pool.
    #[builder(default)]
    pub threads: Option<usize>,
    /// Minimum number of points handled by one parallel task.
    #[builder(default = "DEFAULT_GRAIN_SIZE")]
    pub grain_size: usize,
    /// Approximate number of bins of a bin-grid locator.
    #[builder(default = "DEFAULT_TARGET_BINS")]
    pub bin_grid_target_bins: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            vertex_epsilon: DEFAULT_VERTEX_EPSILON,
            barycentric_epsilon: DEFAULT_BARYCENTRIC_EPSILON,
            threads: None,
            grain_size: DEFAULT_GRAIN_SIZE,
            bin_grid_target_bins: DEFAULT_TARGET_BINS,
        }
    }
}

impl InterpolationConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        for (name, epsilon) in [
            ("vertex_epsilon", self.vertex_epsilon),
            ("barycentric_epsilon", self.barycentric_epsilon),
        ] {
            if let Some(epsilon) = epsilon.filter(|e| e.is_nan() || *e < 0.0) {
                return Err(format!("{name} must be non-negative, got {epsilon}"));
            }
        }
        if let Some(Some(0)) = self.threads {
            return Err("threads must be positive".to_string());
        }
        if let Some(0) = self.grain_size {
            return Err("grain_size must be positive".to_string());
        }
        if let Some(0) = self.bin_grid_target_bins {
            return Err("bin_grid_target_bins must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let built = InterpolationConfigBuilder::default().build().unwrap();
        assert_eq!(built, InterpolationConfig::default());
        assert_eq!(built.grain_size, 64);
        assert_eq!(built.bin_grid_target_bins, 4096);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let err = InterpolationConfigBuilder::default()
            .vertex_epsilon(-1e-9)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("vertex_epsilon"));
        assert!(
            InterpolationConfigBuilder::default()
                .threads(Some(0))
                .build()
                .is_err()
        );
        assert!(
            InterpolationConfigBuilder::default()
                .grain_size(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: InterpolationConfig = serde_json::from_str(r#"{"threads": 3}"#).unwrap();
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.vertex_epsilon, DEFAULT_VERTEX_EPSILON);
        assert_eq!(config.grain_size, DEFAULT_GRAIN_SIZE);
    }
}
