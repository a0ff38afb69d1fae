use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use weakform_traits::Real;

/// A function `f: R^n -> R^m`.
pub trait VectorFunction<T>
where
    T: Scalar,
{
    /// The output dimension `m`.
    fn dimension(&self) -> usize;

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>);
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        X::eval_into(self, f, x)
    }
}

#[derive(Debug, Clone)]
pub struct VectorFunctionBuilder {
    dimension: usize,
}

/// A vector function defined by a closure.
#[derive(Debug, Clone)]
pub struct ConcreteVectorFunction<F> {
    dimension: usize,
    function: F,
}

impl VectorFunctionBuilder {
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn with_function<F, T>(self, function: F) -> ConcreteVectorFunction<F>
    where
        T: Scalar,
        F: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>),
    {
        ConcreteVectorFunction {
            dimension: self.dimension,
            function,
        }
    }
}

impl<F, T> VectorFunction<T> for ConcreteVectorFunction<F>
where
    T: Scalar,
    F: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        let func = &mut self.function;
        func(f, x)
    }
}

/// Approximates the Jacobian of a vector function evaluated at `x`, using
/// central finite differences with resolution `h`.
pub fn approximate_jacobian<T>(f: impl VectorFunction<T>, x: &DVector<T>, h: &T) -> DMatrix<T>
where
    T: Real,
{
    let mut result = DMatrix::zeros(f.dimension(), x.len());
    approximate_jacobian_into(DMatrixViewMut::from(&mut result), f, DVectorView::from(x), *h);
    result
}

/// Approximates the Jacobian of a vector function evaluated at `x` and stores it in `jacobian`.
///
/// The step in direction `j` is `h * max(1, |x_j|)`, so that the resolution adapts to the
/// magnitude of the input.
///
/// # Panics
///
/// Panics if `jacobian` is not of size `m x n`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn approximate_jacobian_into<T>(
    mut jacobian: DMatrixViewMut<T>,
    mut f: impl VectorFunction<T>,
    x: DVectorView<T>,
    h: T,
) where
    T: Real,
{
    let out_dim = f.dimension();
    let in_dim = x.len();
    assert_eq!(jacobian.nrows(), out_dim, "Jacobian must have one row per output");
    assert_eq!(jacobian.ncols(), in_dim, "Jacobian must have one column per input");

    // x+ := x + h_j e_j, x- := x - h_j e_j
    let mut x_perturbed = x.clone_owned();
    let mut f_plus = DVector::zeros(out_dim);
    let mut f_minus = DVector::zeros(out_dim);

    for j in 0..in_dim {
        let x_j = x[j];
        let h_j = h * T::max(1.0, x_j.abs());

        x_perturbed[j] = x_j + h_j;
        f.eval_into(&mut DVectorViewMut::from(&mut f_plus), &DVectorView::from(&x_perturbed));
        x_perturbed[j] = x_j - h_j;
        f.eval_into(&mut DVectorViewMut::from(&mut f_minus), &DVectorView::from(&x_perturbed));
        x_perturbed[j] = x_j;

        // J[.., j] := (f+ - f-) / 2h_j
        let mut column_j = jacobian.column_mut(j);
        column_j.copy_from(&f_plus);
        column_j -= &f_minus;
        column_j /= 2.0 * h_j;
    }
}

/// Approximates the derivative of the function `f: R^n -> R` with finite differences.
///
/// The parameter `h` determines the step size of the finite difference approximation.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_gradient_fd<T>(mut f: impl FnMut(DVectorView<T>) -> T, x: &DVector<T>, h: T) -> DVector<T>
where
    T: Real,
{
    let mut x = x.clone();
    let mut df = DVector::zeros(x.len());
    for i in 0..x.len() {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(DVectorView::from(&x));
        x[i] = x_i - h;
        let f_minus = f(DVectorView::from(&x));
        df[i] = (f_plus - f_minus) / (2.0 * h);
        x[i] = x_i;
    }
    df
}
