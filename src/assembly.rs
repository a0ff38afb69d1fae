//! Assembly of weak forms over mesh items.
//!
//! A form produces local contributions per mesh item through one of the local assembler
//! traits ([`ItemMatrixAssembler`], [`ItemVectorAssembler`], [`ItemIntegralAssembler`]). The
//! drivers in this module visit the items of a form sequentially and hand every local
//! contribution to a scatter closure; [`parallel`] offers the same passes over disjoint item
//! groups.
use crate::error::Error;
use crate::evaluate::DiffOperator;
use crate::mesh::{ItemKind, Mesh};
use crate::space::FESpace;
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorViewMut};
use serde::{Deserialize, Serialize};

mod bilinear;
mod integrate;
mod linear;
mod nonlinear;
pub mod parallel;
mod sparse;
mod trilinear;

pub use bilinear::*;
pub use integrate::*;
pub use linear::*;
pub use nonlinear::*;
pub use sparse::*;
pub use trilinear::*;

/// Selection of the quadrature order of a form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuadratureOrder {
    /// The action degree plus the polynomial degrees of all operator values in the integrand.
    #[default]
    Auto,
    Exact(usize),
}

impl QuadratureOrder {
    /// Resolves the order for an integrand made of the given operators applied to functions
    /// of the given spaces, multiplied by an action of degree `action_degree`.
    pub fn resolve<T: Real>(&self, action_degree: usize, operators: &[(&FESpace<T>, DiffOperator)]) -> usize {
        match *self {
            Self::Exact(order) => order,
            Self::Auto => {
                action_degree
                    + operators
                        .iter()
                        .map(|(space, op)| {
                            space
                                .polynomial_order()
                                .saturating_sub(op.derivative_order())
                        })
                        .sum::<usize>()
            }
        }
    }
}

/// The mesh items a form is integrated over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRegions {
    kind: ItemKind,
    regions: Option<Vec<usize>>,
}

impl Default for AssemblyRegions {
    fn default() -> Self {
        Self::cells()
    }
}

impl AssemblyRegions {
    pub fn cells() -> Self {
        Self {
            kind: ItemKind::Cells,
            regions: None,
        }
    }

    pub fn faces() -> Self {
        Self {
            kind: ItemKind::Faces,
            regions: None,
        }
    }

    pub fn boundary_faces() -> Self {
        Self {
            kind: ItemKind::BoundaryFaces,
            regions: None,
        }
    }

    /// Restricts the items to the given region tags.
    pub fn with_regions(mut self, regions: impl Into<Vec<usize>>) -> Self {
        self.regions = Some(regions.into());
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn regions(&self) -> Option<&[usize]> {
        self.regions.as_deref()
    }

    /// The selected items of the mesh, in increasing order.
    pub fn items<T: Real>(&self, mesh: &Mesh<T>) -> Vec<usize> {
        mesh.items(self.kind, self.regions())
    }
}

/// The region tag of an item of the given kind.
pub fn item_region<T: Real>(mesh: &Mesh<T>, kind: ItemKind, item: usize) -> usize {
    match kind {
        ItemKind::Cells => mesh.cell_region(item),
        ItemKind::Faces | ItemKind::BoundaryFaces => mesh.face_region(item),
    }
}

/// The cell whose basis functions are used on an item (the first neighbour of a face).
pub fn item_cell<T: Real>(mesh: &Mesh<T>, kind: ItemKind, item: usize) -> usize {
    match kind {
        ItemKind::Cells => item,
        ItemKind::Faces | ItemKind::BoundaryFaces => mesh.face_cells(item).0,
    }
}

/// A local matrix together with the global (block-local) indices of its rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatrix<T> {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub matrix: DMatrix<T>,
}

impl<T: Real> Default for LocalMatrix<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            matrix: DMatrix::zeros(0, 0),
        }
    }
}

impl<T: Real> LocalMatrix<T> {
    /// Sets the row and column indices and zeroes a matrix of matching shape.
    pub fn reset(&mut self, rows: &[usize], cols: &[usize]) {
        self.rows.clear();
        self.rows.extend_from_slice(rows);
        self.cols.clear();
        self.cols.extend_from_slice(cols);
        if self.matrix.shape() != (rows.len(), cols.len()) {
            self.matrix = DMatrix::zeros(rows.len(), cols.len());
        } else {
            self.matrix.fill(T::zero());
        }
    }
}

/// A local vector together with the global (block-local) indices of its entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVector<T> {
    pub rows: Vec<usize>,
    pub vector: DVector<T>,
}

impl<T: Real> Default for LocalVector<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            vector: DVector::zeros(0),
        }
    }
}

impl<T: Real> LocalVector<T> {
    pub fn reset(&mut self, rows: &[usize]) {
        self.rows.clear();
        self.rows.extend_from_slice(rows);
        if self.vector.len() != rows.len() {
            self.vector = DVector::zeros(rows.len());
        } else {
            self.vector.fill(T::zero());
        }
    }
}

/// Common interface of local assemblers: the items to visit and a worker-private workspace.
///
/// Workspaces hold the evaluators (and thereby the geometric transformers) of a form, so
/// that every worker owns its own mutable evaluation state.
pub trait ItemAssembler: Sync {
    type Workspace: Send;

    /// A short name used in log messages.
    fn name(&self) -> &str;

    fn item_kind(&self) -> ItemKind;

    /// The items visited by an assembly pass, in visiting order.
    fn items(&self) -> &[usize];

    /// Global indices written by the contribution of the given item.
    fn populate_item_dofs(&self, item: usize, dofs: &mut Vec<usize>);

    fn create_workspace(&self) -> eyre::Result<Self::Workspace>;
}

pub trait ItemMatrixAssembler<T: Real>: ItemAssembler {
    fn assemble_item_matrix(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalMatrix<T>,
    ) -> eyre::Result<()>;
}

pub trait ItemVectorAssembler<T: Real>: ItemAssembler {
    fn assemble_item_vector(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalVector<T>,
    ) -> eyre::Result<()>;
}

/// Computes a fixed number of integrated quantities per item.
pub trait ItemIntegralAssembler<T: Real>: ItemAssembler {
    fn integral_length(&self) -> usize;

    fn assemble_item_integral(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: DVectorViewMut<T>,
    ) -> eyre::Result<()>;
}

/// Visits all items of the assembler in order, passing each local matrix to `scatter`.
pub fn assemble_matrix<T, A>(
    assembler: &A,
    mut scatter: impl FnMut(&LocalMatrix<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ?Sized + ItemMatrixAssembler<T>,
{
    debug!(
        "Assembling matrix of {} over {} {:?}",
        assembler.name(),
        assembler.items().len(),
        assembler.item_kind()
    );
    let mut workspace = assembler.create_workspace()?;
    let mut local = LocalMatrix::default();
    for &item in assembler.items() {
        assembler.assemble_item_matrix(&mut workspace, item, &mut local)?;
        scatter(&local)?;
    }
    debug!("Finished matrix assembly of {}", assembler.name());
    Ok(())
}

/// Visits all items of the assembler in order, passing each local vector to `scatter`.
pub fn assemble_vector<T, A>(
    assembler: &A,
    mut scatter: impl FnMut(&LocalVector<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ?Sized + ItemVectorAssembler<T>,
{
    debug!(
        "Assembling vector of {} over {} {:?}",
        assembler.name(),
        assembler.items().len(),
        assembler.item_kind()
    );
    let mut workspace = assembler.create_workspace()?;
    let mut local = LocalVector::default();
    for &item in assembler.items() {
        assembler.assemble_item_vector(&mut workspace, item, &mut local)?;
        scatter(&local)?;
    }
    debug!("Finished vector assembly of {}", assembler.name());
    Ok(())
}

/// Computes the integrals of every item, one column per item in visiting order.
pub fn assemble_integrals<T, A>(assembler: &A) -> eyre::Result<DMatrix<T>>
where
    T: Real,
    A: ?Sized + ItemIntegralAssembler<T>,
{
    debug!(
        "Integrating {} over {} {:?}",
        assembler.name(),
        assembler.items().len(),
        assembler.item_kind()
    );
    let mut workspace = assembler.create_workspace()?;
    let mut integrals = DMatrix::zeros(assembler.integral_length(), assembler.items().len());
    for (i, &item) in assembler.items().iter().enumerate() {
        assembler.assemble_item_integral(&mut workspace, item, integrals.column_mut(i))?;
    }
    Ok(integrals)
}

/// Checks that an action written for `expected` inputs is fed `provided` values.
pub(crate) fn check_action_input(expected: Option<usize>, provided: usize) -> Result<(), Error> {
    match expected {
        Some(expected) if expected != provided => Err(Error::ActionInputMismatch { expected, provided }),
        _ => Ok(()),
    }
}

/// Checks that an action declares the output length a form requires.
pub(crate) fn check_action_output(declared: usize, required: usize) -> Result<(), Error> {
    if declared == required {
        Ok(())
    } else {
        Err(Error::ActionLengthMismatch { declared, required })
    }
}
