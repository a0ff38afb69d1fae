//! Pointwise actions turning operator values into integrands.
//!
//! An action maps the concatenated operator values at a quadrature point to the vector that
//! is paired with the test function values. Linear forms of actions (e.g. a diffusion
//! coefficient) are used by bilinear forms; nonlinear actions are linearized through
//! [`DifferentiableAction`].
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use std::fmt;
use std::fmt::{Debug, Formatter};
use weakform_optimize::calculus::{approximate_jacobian_into, VectorFunctionBuilder};

/// Data of the current quadrature point available to actions.
#[derive(Debug, Clone, PartialEq)]
pub struct QpInfo<T: Real> {
    /// Physical coordinates. Only populated for actions that depend on `x`.
    pub x: DVector<T>,
    pub time: T,
    /// The mesh item (cell or face) being integrated over.
    pub item: usize,
    /// The region tag of the item.
    pub region: usize,
}

impl<T: Real> QpInfo<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            x: DVector::zeros(dim),
            time: T::zero(),
            item: 0,
            region: 0,
        }
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.time = time;
        self
    }
}

/// A pointwise map from operator values to an integrand.
pub trait Action<T: Real>: Send + Sync {
    /// The number of inputs the action is written for, if fixed.
    fn input_length(&self) -> Option<usize> {
        None
    }

    /// The number of values written by [`Action::evaluate`].
    fn output_length(&self) -> usize;

    /// Bound on the polynomial degree the action adds to the integrand.
    fn degree(&self) -> usize {
        0
    }

    fn depends_on_x(&self) -> bool {
        false
    }

    fn depends_on_time(&self) -> bool {
        false
    }

    /// Whether the action is a symmetric linear map.
    fn is_symmetric(&self) -> bool {
        false
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>);
}

/// An action that can also evaluate its Jacobian with respect to the input.
pub trait DifferentiableAction<T: Real>: Action<T> {
    /// Writes `d result / d input` into `jacobian` (`output_length x input.len()`).
    fn evaluate_jacobian(&self, jacobian: DMatrixViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>);
}

/// Multiplies the input by a constant factor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingAction<T> {
    factor: T,
    length: usize,
}

impl<T: Real> ScalingAction<T> {
    pub fn new(factor: T, length: usize) -> Self {
        Self { factor, length }
    }

    /// The identity on inputs of the given length.
    pub fn identity(length: usize) -> Self {
        Self::new(T::one(), length)
    }

    pub fn factor(&self) -> T {
        self.factor
    }
}

impl<T: Real> Action<T> for ScalingAction<T> {
    fn input_length(&self) -> Option<usize> {
        Some(self.length)
    }

    fn output_length(&self) -> usize {
        self.length
    }

    fn is_symmetric(&self) -> bool {
        true
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, _: &QpInfo<T>) {
        result.copy_from(input);
        if self.factor != T::one() {
            *result *= self.factor;
        }
    }
}

impl<T: Real> DifferentiableAction<T> for ScalingAction<T> {
    fn evaluate_jacobian(&self, mut jacobian: DMatrixViewMut<T>, _: &DVectorView<T>, _: &QpInfo<T>) {
        jacobian.fill_with_identity();
        jacobian *= self.factor;
    }
}

/// Multiplies the input by a constant matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixAction<T: Real> {
    matrix: DMatrix<T>,
    symmetric: bool,
}

impl<T: Real> MatrixAction<T> {
    pub fn new(matrix: DMatrix<T>) -> Self {
        let symmetric = matrix.is_square() && matrix == matrix.transpose();
        Self { matrix, symmetric }
    }

    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }
}

impl<T: Real> Action<T> for MatrixAction<T> {
    fn input_length(&self) -> Option<usize> {
        Some(self.matrix.ncols())
    }

    fn output_length(&self) -> usize {
        self.matrix.nrows()
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, _: &QpInfo<T>) {
        self.matrix.mul_to(input, result);
    }
}

impl<T: Real> DifferentiableAction<T> for MatrixAction<T> {
    fn evaluate_jacobian(&self, mut jacobian: DMatrixViewMut<T>, _: &DVectorView<T>, _: &QpInfo<T>) {
        jacobian.copy_from(&self.matrix);
    }
}

type JacobianFn<T> = dyn Fn(DMatrixViewMut<T>, &DVectorView<T>, &QpInfo<T>) + Send + Sync;

/// Resolution of the finite difference approximation of action Jacobians.
const FINITE_DIFFERENCE_STEP: f64 = 1e-6;

/// An action defined by a closure, optionally with a hand-written Jacobian.
///
/// Without a Jacobian, [`DifferentiableAction::evaluate_jacobian`] falls back to central
/// finite differences.
pub struct FunctionAction<T: Real, F> {
    function: F,
    input_length: usize,
    output_length: usize,
    degree: usize,
    depends_on_x: bool,
    depends_on_time: bool,
    jacobian: Option<Box<JacobianFn<T>>>,
}

impl<T: Real, F> Debug for FunctionAction<T, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionAction")
            .field("input_length", &self.input_length)
            .field("output_length", &self.output_length)
            .field("degree", &self.degree)
            .field("depends_on_x", &self.depends_on_x)
            .field("depends_on_time", &self.depends_on_time)
            .field("has_jacobian", &self.jacobian.is_some())
            .finish()
    }
}

impl<T, F> FunctionAction<T, F>
where
    T: Real,
    F: Fn(&mut DVectorViewMut<T>, &DVectorView<T>, &QpInfo<T>) + Send + Sync,
{
    pub fn new(input_length: usize, output_length: usize, function: F) -> Self {
        Self {
            function,
            input_length,
            output_length,
            degree: 0,
            depends_on_x: false,
            depends_on_time: false,
            jacobian: None,
        }
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_x_dependence(mut self) -> Self {
        self.depends_on_x = true;
        self
    }

    pub fn with_time_dependence(mut self) -> Self {
        self.depends_on_time = true;
        self
    }

    pub fn with_jacobian(
        mut self,
        jacobian: impl Fn(DMatrixViewMut<T>, &DVectorView<T>, &QpInfo<T>) + Send + Sync + 'static,
    ) -> Self {
        self.jacobian = Some(Box::new(jacobian));
        self
    }
}

impl<T, F> Action<T> for FunctionAction<T, F>
where
    T: Real,
    F: Fn(&mut DVectorViewMut<T>, &DVectorView<T>, &QpInfo<T>) + Send + Sync,
{
    fn input_length(&self) -> Option<usize> {
        Some(self.input_length)
    }

    fn output_length(&self) -> usize {
        self.output_length
    }

    fn degree(&self) -> usize {
        self.degree
    }

    fn depends_on_x(&self) -> bool {
        self.depends_on_x
    }

    fn depends_on_time(&self) -> bool {
        self.depends_on_time
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>) {
        (self.function)(result, input, info)
    }
}

impl<T, F> DifferentiableAction<T> for FunctionAction<T, F>
where
    T: Real,
    F: Fn(&mut DVectorViewMut<T>, &DVectorView<T>, &QpInfo<T>) + Send + Sync,
{
    fn evaluate_jacobian(&self, jacobian: DMatrixViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>) {
        match &self.jacobian {
            Some(j) => j(jacobian, input, info),
            None => finite_difference_jacobian(self, jacobian, input, info),
        }
    }
}

fn finite_difference_jacobian<T: Real, A: Action<T>>(
    action: &A,
    jacobian: DMatrixViewMut<T>,
    input: &DVectorView<T>,
    info: &QpInfo<T>,
) {
    let f = VectorFunctionBuilder::with_dimension(action.output_length())
        .with_function::<_, T>(|result, x| action.evaluate(result, x, info));
    approximate_jacobian_into(jacobian, f, *input, T::from_tabulated(FINITE_DIFFERENCE_STEP));
}

/// Makes any action differentiable by central finite differences.
#[derive(Debug, Clone)]
pub struct FiniteDifferenceLinearization<A> {
    action: A,
}

impl<A> FiniteDifferenceLinearization<A> {
    pub fn new(action: A) -> Self {
        Self { action }
    }

    pub fn inner(&self) -> &A {
        &self.action
    }
}

impl<T: Real, A: Action<T>> Action<T> for FiniteDifferenceLinearization<A> {
    fn input_length(&self) -> Option<usize> {
        self.action.input_length()
    }

    fn output_length(&self) -> usize {
        self.action.output_length()
    }

    fn degree(&self) -> usize {
        self.action.degree()
    }

    fn depends_on_x(&self) -> bool {
        self.action.depends_on_x()
    }

    fn depends_on_time(&self) -> bool {
        self.action.depends_on_time()
    }

    fn is_symmetric(&self) -> bool {
        self.action.is_symmetric()
    }

    fn evaluate(&self, result: &mut DVectorViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>) {
        self.action.evaluate(result, input, info)
    }
}

impl<T: Real, A: Action<T>> DifferentiableAction<T> for FiniteDifferenceLinearization<A> {
    fn evaluate_jacobian(&self, jacobian: DMatrixViewMut<T>, input: &DVectorView<T>, info: &QpInfo<T>) {
        finite_difference_jacobian(&self.action, jacobian, input, info)
    }
}
