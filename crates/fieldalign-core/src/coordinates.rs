//! Conversions between Cartesian field vectors and the ISO 80000-2 physics
//! convention `(r, theta, phi)`.
//!
//! Angles are exchanged in degrees: `theta` in `[0, 180]` measured from +z,
//! `phi` in `[0, 360)` measured from +x toward +y.

use crate::domain::{CARTESIAN_EPSILON, FieldVector, SphericalField};

/// Undefined at the true origin; measured inputs go through
/// [`spherical_from_measured`] which applies the epsilon offset.
pub fn to_spherical(x: f64, y: f64, z: f64) -> SphericalField {
    let r = (x * x + y * y + z * z).sqrt();

    let mut phi = y.atan2(x).to_degrees();
    if phi < 0.0 {
        phi += 360.0;
    }
    if phi >= 360.0 {
        phi -= 360.0;
    }

    let theta = (z / r).clamp(-1.0, 1.0).acos().to_degrees();

    SphericalField::new(r, theta, phi)
}

pub fn to_cartesian(r: f64, theta: f64, phi: f64) -> FieldVector {
    let theta = theta.to_radians();
    let phi = phi.to_radians();
    FieldVector::new(
        r * theta.sin() * phi.cos(),
        r * theta.sin() * phi.sin(),
        r * theta.cos(),
    )
}

pub fn spherical_from_measured(field: FieldVector) -> SphericalField {
    to_spherical(
        field.x + CARTESIAN_EPSILON,
        field.y + CARTESIAN_EPSILON,
        field.z + CARTESIAN_EPSILON,
    )
}
