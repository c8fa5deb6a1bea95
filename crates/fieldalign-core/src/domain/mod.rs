pub mod errors;

pub use errors::{AlignError, AlignErrorCategory, AlignResult, ExitCodeMapping};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Absolute hardware limit in tesla. Above this the mu-metal shields saturate.
pub const HARDWARE_FIELD_CEILING: f64 = 1.5;

/// Offset added to each measured component before converting to spherical
/// coordinates so the origin never produces an undefined angle.
pub const CARTESIAN_EPSILON: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for Axis {
    type Err = AlignError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            other => Err(AlignError::configuration(
                "CONFIG.UNKNOWN_AXIS",
                format!("unknown axis '{}'; expected one of x, y, z", other),
            )),
        }
    }
}

/// Snapshot of the Cartesian field in tesla. Updates build a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl FieldVector {
    pub const ZERO: FieldVector = FieldVector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn from_array(components: [f64; 3]) -> Self {
        Self::new(components[0], components[1], components[2])
    }

    pub const fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub const fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub const fn with_component(self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::X => Self::new(value, self.y, self.z),
            Axis::Y => Self::new(self.x, value, self.z),
            Axis::Z => Self::new(self.x, self.y, value),
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &FieldVector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Per-axis `|self - other|`, indexed like [`Axis::index`].
    pub fn abs_deviation(&self, other: &FieldVector) -> [f64; 3] {
        [
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.z - other.z).abs(),
        ]
    }
}

/// ISO 80000-2 spherical field: `r` in tesla, `theta` from +z and `phi` from
/// +x toward +y, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SphericalField {
    pub r: f64,
    pub theta: f64,
    pub phi: f64,
}

impl SphericalField {
    pub const fn new(r: f64, theta: f64, phi: f64) -> Self {
        Self { r, theta, phi }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RampStatus {
    Holding,
    Ramping,
}
