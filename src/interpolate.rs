//! Interpolation of functions into finite element spaces by local L2 projection.
use crate::assembly::QuadratureOrder;
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::{FESpace, FEVector};
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Interpolates functions into a finite element space.
///
/// The function is projected in L2 onto the local space of every cell independently. Since
/// cells only share dofs in their closure, the local problems are solved concurrently and the
/// values of shared dofs are averaged in a sequential reduction afterwards. Functions that lie
/// in the space are reproduced exactly (up to round-off).
#[derive(Debug, Clone)]
pub struct Interpolator<'a, 'm, T: Real> {
    space: &'a FESpace<'m, T>,
    order: QuadratureOrder,
    parallel: bool,
}

impl<'a, 'm, T: Real> Interpolator<'a, 'm, T> {
    pub fn new(space: &'a FESpace<'m, T>) -> Self {
        Self {
            space,
            order: QuadratureOrder::Auto,
            parallel: true,
        }
    }

    /// The quadrature order of the local problems. `Auto` integrates the local mass matrices
    /// exactly.
    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn quadrature_order(&self) -> usize {
        self.order.resolve(
            0,
            &[
                (self.space, DiffOperator::Identity),
                (self.space, DiffOperator::Identity),
            ],
        )
    }

    /// Interpolates `function`, which writes the value at a physical point into its second
    /// argument (one entry per component of the space).
    pub fn interpolate<F>(&self, function: F) -> eyre::Result<FEVector<'a, 'm, T>>
    where
        F: Fn(DVectorView<T>, DVectorViewMut<T>) + Sync,
    {
        let mesh = self.space.mesh();
        let order = self.quadrature_order();
        // Check the configuration once up front
        let evaluator = BasisEvaluator::new(self.space, DiffOperator::Identity, ItemKind::Cells, order)?;
        debug!(
            "Interpolating into {} over {} cells",
            self.space.fe(),
            mesh.num_cells()
        );

        let local_solutions: Vec<DVector<T>> = if self.parallel {
            let evaluators = ThreadLocal::new();
            (0..mesh.num_cells())
                .into_par_iter()
                .map(|cell| {
                    let evaluator = evaluators.get_or(|| RefCell::new(evaluator.clone()));
                    project_locally(&mut evaluator.borrow_mut(), cell, &function)
                })
                .collect::<Result<_, _>>()?
        } else {
            let mut evaluator = evaluator;
            (0..mesh.num_cells())
                .map(|cell| project_locally(&mut evaluator, cell, &function))
                .collect::<Result<_, _>>()?
        };

        let mut sums = DVector::zeros(self.space.ndofs());
        let mut counts = DVector::<T>::zeros(self.space.ndofs());
        for (cell, local) in local_solutions.iter().enumerate() {
            for (&dof, &value) in self.space.cell_dofs(cell).iter().zip(local.iter()) {
                sums[dof] += value;
                counts[dof] += T::one();
            }
        }
        for (sum, &count) in sums.iter_mut().zip(counts.iter()) {
            if count > T::one() {
                *sum /= count;
            }
        }
        Ok(FEVector::from_coefficients(self.space, sums)?)
    }
}

/// Interpolates `function` into the space with default settings.
pub fn interpolate<'a, 'm, T, F>(space: &'a FESpace<'m, T>, function: F) -> eyre::Result<FEVector<'a, 'm, T>>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>) + Sync,
{
    Interpolator::new(space).interpolate(function)
}

fn project_locally<T, F>(evaluator: &mut BasisEvaluator<T>, cell: usize, function: &F) -> Result<DVector<T>, Error>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>),
{
    evaluator.update(cell)?;
    let num_dofs = evaluator.dofs().len();
    let ncomponents = evaluator.output_length();
    let mut mass = DMatrix::zeros(num_dofs, num_dofs);
    let mut rhs = DVector::zeros(num_dofs);
    let mut value = DVector::zeros(ncomponents);
    let mut x = DVector::zeros(evaluator.space().mesh().dim());
    for q in 0..evaluator.num_points() {
        evaluator.evaluate(q)?;
        let weight = evaluator.weights()[q] * evaluator.integration_scaling();
        evaluator.populate_physical_point(q, &mut x);
        value.fill(T::zero());
        function(DVectorView::from(&x), DVectorViewMut::from(&mut value));
        let phi = evaluator.values();
        // M += w phi phi^T, one component at a time
        for c in 0..ncomponents {
            mass.ger(weight, &phi.column(c), &phi.column(c), T::one());
        }
        rhs.gemv(weight, &phi, &value, T::one());
    }
    let cholesky = mass
        .cholesky()
        .ok_or(Error::SingularLocalSystem { item: cell })?;
    Ok(cholesky.solve(&rhs))
}
