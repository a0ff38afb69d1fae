//! The library-wide error type.
use crate::element::FEType;
use crate::evaluate::DiffOperator;
use crate::geometry::ReferenceGeometry;
use crate::transform::MapType;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors raised while building spaces, evaluating bases or assembling forms.
///
/// Configuration errors are raised before any heavy computation starts. Numerical
/// degeneracies carry the index of the offending item.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The element family is not defined on the given geometry.
    UnsupportedElement { fe: FEType, geometry: ReferenceGeometry },
    /// The differential operator cannot be applied to the element family on the given geometry.
    UnsupportedOperator {
        operator: DiffOperator,
        fe: FEType,
        geometry: ReferenceGeometry,
        ambient_dim: usize,
    },
    /// The requested map is not defined for the (geometry, ambient dimension) pair.
    UnsupportedTransformation {
        geometry: ReferenceGeometry,
        ambient_dim: usize,
        map: MapType,
    },
    /// The declared output length of an action does not match what the form requires.
    ActionLengthMismatch { declared: usize, required: usize },
    /// The input length an action was built for does not match the operator values fed to it.
    ActionInputMismatch { expected: usize, provided: usize },
    /// Orientation data for an element with several dofs per face could not be determined.
    MissingOrientation { fe: FEType, cell: usize, face: usize },
    /// No quadrature rule is available for the requested order.
    QuadratureUnavailable { geometry: ReferenceGeometry, order: usize },
    /// Two spaces or vectors that must agree in size do not.
    IncompatibleDimensions { expected: usize, actual: usize },
    /// A block index exceeds the number of blocks of the system.
    InvalidBlock { block: usize, num_blocks: usize },
    /// The mesh description is inconsistent.
    InvalidMesh { message: String },
    /// The geometric map of an item is degenerate (zero or inverted volume).
    DegenerateItem { item: usize },
    /// A local system (e.g. a local projection) is singular.
    SingularLocalSystem { item: usize },
    /// The global linear solve failed, including the dense fallback if enabled.
    SolveFailed { reason: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedElement { fe, geometry } => {
                write!(f, "Element {fe} is not supported on geometry {geometry}")
            }
            Self::UnsupportedOperator {
                operator,
                fe,
                geometry,
                ambient_dim,
            } => {
                write!(
                    f,
                    "Operator {operator:?} is not supported for element {fe} on geometry {geometry} \
                     in {ambient_dim}D"
                )
            }
            Self::UnsupportedTransformation {
                geometry,
                ambient_dim,
                map,
            } => {
                write!(
                    f,
                    "Map {map:?} is not supported for geometry {geometry} in {ambient_dim}D ambient space"
                )
            }
            Self::ActionLengthMismatch { declared, required } => {
                write!(
                    f,
                    "Action declares output length {declared}, but the form requires length {required}"
                )
            }
            Self::ActionInputMismatch { expected, provided } => {
                write!(
                    f,
                    "Action expects input length {expected}, but the operators provide length {provided}"
                )
            }
            Self::MissingOrientation { fe, cell, face } => {
                write!(
                    f,
                    "Missing orientation data for element {fe} on local face {face} of cell {cell}"
                )
            }
            Self::QuadratureUnavailable { geometry, order } => {
                write!(f, "No quadrature rule of order {order} available for geometry {geometry}")
            }
            Self::IncompatibleDimensions { expected, actual } => {
                write!(f, "Incompatible dimensions: expected {expected}, got {actual}")
            }
            Self::InvalidBlock { block, num_blocks } => {
                write!(f, "Block {block} out of bounds for system with {num_blocks} blocks")
            }
            Self::InvalidMesh { message } => write!(f, "Invalid mesh: {message}"),
            Self::DegenerateItem { item } => write!(f, "Item {item} has a degenerate geometric map"),
            Self::SingularLocalSystem { item } => write!(f, "Local system of item {item} is singular"),
            Self::SolveFailed { reason } => write!(f, "Linear solve failed: {reason}"),
        }
    }
}

impl std::error::Error for Error {}
