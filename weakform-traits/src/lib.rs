//! Scalar traits shared between the `weakform` crates.
use nalgebra::RealField;

pub use nalgebra;

/// Real scalar type used for geometry, basis values and assembled entries.
pub trait Real: RealField + Copy {
    /// Converts a tabulated `f64` constant (quadrature points, weights, reference coordinates).
    ///
    /// # Panics
    ///
    /// Panics if the constant is not representable in the target type.
    fn from_tabulated(value: f64) -> Self {
        Self::from_f64(value).expect("Tabulated constant must be representable in the scalar type")
    }
}

impl<T: RealField + Copy> Real for T {}
