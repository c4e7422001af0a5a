//! Cutting plane altitudes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlicerError};

/// How the cutting plane altitudes are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Planes {
    /// An explicit list, sliced in the given order.
    Explicit {
        /// Plane altitudes.
        altitudes: Vec<f64>,
    },
    /// `count` planes at `start`, `start + pitch`, ...
    Uniform {
        /// First altitude.
        start: f64,
        /// Spacing between planes.
        pitch: f64,
        /// Number of planes.
        count: usize,
    },
    /// Layers through the mesh's z-range, each plane at the middle of its
    /// layer.
    FromBounds {
        /// Thickness of the first layer.
        first_layer_height: f64,
        /// Thickness of every other layer.
        layer_height: f64,
    },
}

impl Default for Planes {
    fn default() -> Self {
        Planes::FromBounds {
            first_layer_height: 0.3,
            layer_height: 0.2,
        }
    }
}

fn positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(SlicerError::InvalidSettings(format!(
            "{name} must be finite and positive, got {v}"
        )))
    }
}

impl Planes {
    /// Resolve to concrete altitudes.
    ///
    /// `z_range` is the mesh's `(z_min, z_max)`; only
    /// [`Planes::FromBounds`] needs it.
    pub fn altitudes(&self, z_range: Option<(f64, f64)>) -> Result<Vec<f64>> {
        let altitudes = match self {
            Planes::Explicit { altitudes } => altitudes.clone(),
            Planes::Uniform {
                start,
                pitch,
                count,
            } => {
                positive("pitch", *pitch)?;
                (0..*count).map(|i| start + pitch * i as f64).collect()
            }
            Planes::FromBounds {
                first_layer_height,
                layer_height,
            } => {
                positive("first_layer_height", *first_layer_height)?;
                positive("layer_height", *layer_height)?;
                let (z_min, z_max) = z_range.ok_or_else(|| {
                    SlicerError::InvalidSettings("layer planes need mesh bounds".into())
                })?;
                generate_layer_heights(z_min, z_max, *first_layer_height, *layer_height)
            }
        };

        if let Some(bad) = altitudes.iter().find(|z| !z.is_finite()) {
            return Err(SlicerError::InvalidSettings(format!(
                "plane altitude {bad} is not finite"
            )));
        }
        Ok(altitudes)
    }
}

/// Altitudes for layered slicing of the range `[z_min, z_max]`.
///
/// The first plane sits in the middle of the first layer, every following
/// plane in the middle of its `layer_height` layer.
pub fn generate_layer_heights(
    z_min: f64,
    z_max: f64,
    first_layer_height: f64,
    layer_height: f64,
) -> Vec<f64> {
    let mut heights = Vec::new();

    if z_max <= z_min || first_layer_height <= 0.0 || layer_height <= 0.0 {
        return heights;
    }

    let first_z = z_min + first_layer_height / 2.0;
    if first_z <= z_max {
        heights.push(first_z);
    }

    // Indexed rather than accumulated so long stacks don't drift
    let base = z_min + first_layer_height + layer_height / 2.0;
    let mut i = 0usize;
    loop {
        let z = base + layer_height * i as f64;
        if z > z_max {
            break;
        }
        heights.push(z);
        i += 1;
    }

    heights
}
