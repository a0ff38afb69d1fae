//! Error norms of finite element functions against reference functions.
use crate::action::{Action, QpInfo};
use crate::assembly::{AssemblyRegions, ItemIntegrator};
use crate::evaluate::DiffOperator;
use crate::space::FEVector;
use crate::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Pointwise squared distance `|op(u_h)(x) - g(x)|^2` between operator values and a reference.
struct SquaredErrorAction<T: Real, F> {
    reference: F,
    length: usize,
    degree: usize,
    values: ThreadLocal<RefCell<DVector<T>>>,
}

impl<T, F> Action<T> for SquaredErrorAction<T, F>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>) + Send + Sync,
{
    fn input_length(&self) -> Option<usize> {
        Some(self.length)
    }

    fn output_length(&self) -> usize {
        1
    }

    fn degree(&self) -> usize {
        self.degree
    }

    fn depends_on_x(&self) -> bool {
        true
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>) {
        let mut reference = self
            .values
            .get_or(|| RefCell::new(DVector::zeros(self.length)))
            .borrow_mut();
        (self.reference)(DVectorView::from(&info.x), DVectorViewMut::from(&mut *reference));
        result[0] = input
            .iter()
            .zip(reference.iter())
            .fold(T::zero(), |sum, (&a, &b)| sum + (a - b) * (a - b));
    }
}

/// Squared L2 norms of `op(u_h) - reference` per cell.
///
/// The reference writes its value at a physical point into the second argument, with the
/// output length of `op`. The quadrature order is raised by `extra_order` above what the
/// finite element function alone needs, to account for a non-polynomial reference.
pub fn error_squared_per_cell<T, F>(
    u: &FEVector<T>,
    operator: DiffOperator,
    reference: F,
    extra_order: usize,
) -> eyre::Result<DVector<T>>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>) + Send + Sync,
{
    let space = u.space();
    let length = operator.output_length(space.ncomponents(), space.mesh().dim());
    let action = SquaredErrorAction {
        reference,
        length,
        degree: space.polynomial_order() + extra_order,
        values: ThreadLocal::new(),
    };
    let integrals = ItemIntegrator::new(u, operator, &action)
        .with_regions(AssemblyRegions::cells())
        .integrate_items()?;
    Ok(integrals.row(0).transpose())
}

/// The squared L2 error `||u_h - u||^2` over the whole mesh.
pub fn l2_error_squared<T, F>(u: &FEVector<T>, exact: F) -> eyre::Result<T>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>) + Send + Sync,
{
    Ok(error_squared_per_cell(u, DiffOperator::Identity, exact, 2)?.sum())
}

/// The squared H1 seminorm error `||grad u_h - grad u||^2`, with the gradient flattened as in
/// [`DiffOperator::Gradient`].
pub fn h1_seminorm_error_squared<T, F>(u: &FEVector<T>, exact_gradient: F) -> eyre::Result<T>
where
    T: Real,
    F: Fn(DVectorView<T>, DVectorViewMut<T>) + Send + Sync,
{
    Ok(error_squared_per_cell(u, DiffOperator::Gradient, exact_gradient, 2)?.sum())
}

/// The L2 norm of a finite element function.
pub fn l2_norm<T: Real>(u: &FEVector<T>) -> eyre::Result<T> {
    let squared = error_squared_per_cell(u, DiffOperator::Identity, |_, _| {}, 0)?;
    Ok(squared.sum().sqrt())
}
