use crate::action::{DifferentiableAction, QpInfo};
use crate::assembly::{
    assemble_matrix, assemble_vector, check_action_input, check_action_output, item_cell, item_region,
    AssemblyRegions, BlockSystem, ItemAssembler, ItemMatrixAssembler, ItemVectorAssembler, LocalMatrix,
    LocalVector, QuadratureOrder,
};
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::{FESpace, FEVector};
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView};
use std::ptr;

/// A nonlinear form `n(u; v) = ∫ A(op_1(u), ..., op_k(u)) · op_test(v)`, linearized by
/// Newton's method around the current iterate `u`.
///
/// With `DA` the Jacobian of the action, the linearized system for the next iterate `w` is
///
/// ```text
/// ∫ (DA(u) ops(w)) · op_test(v) = ∫ (DA(u) ops(u) - A(u)) · op_test(v),
/// ```
///
/// whose left-hand side is assembled by [`ItemMatrixAssembler`] and whose right-hand side is
/// assembled by [`ItemVectorAssembler`].
pub struct NonlinearForm<'a, 'm, T: Real> {
    test_space: &'a FESpace<'m, T>,
    test_operator: DiffOperator,
    iterate: &'a FEVector<'a, 'm, T>,
    operators: Vec<DiffOperator>,
    action: &'a dyn DifferentiableAction<T>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    time: T,
    items: Vec<usize>,
}

impl<'a, 'm, T: Real> NonlinearForm<'a, 'm, T> {
    pub fn new(
        test_space: &'a FESpace<'m, T>,
        test_operator: DiffOperator,
        iterate: &'a FEVector<'a, 'm, T>,
        operators: Vec<DiffOperator>,
        action: &'a dyn DifferentiableAction<T>,
    ) -> Self {
        let regions = AssemblyRegions::cells();
        Self {
            items: regions.items(test_space.mesh()),
            test_space,
            test_operator,
            iterate,
            operators,
            action,
            regions,
            order: QuadratureOrder::Auto,
            time: T::zero(),
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.items = regions.items(self.test_space.mesh());
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.time = time;
        self
    }

    pub fn quadrature_order(&self) -> usize {
        let mut operators = vec![(self.test_space, self.test_operator)];
        operators.extend(self.operators.iter().map(|&op| (self.iterate.space(), op)));
        self.order.resolve(self.action.degree(), &operators)
    }

    fn input_length(&self) -> usize {
        let space = self.iterate.space();
        self.operators
            .iter()
            .map(|op| op.output_length(space.ncomponents(), space.mesh().dim()))
            .sum()
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mesh = self.test_space.mesh();
        if !ptr::eq(mesh, self.iterate.space().mesh()) {
            return Err(Error::InvalidMesh {
                message: "test space and iterate of a nonlinear form are defined on different meshes".to_string(),
            });
        }
        let test_length = self
            .test_operator
            .output_length(self.test_space.ncomponents(), mesh.dim());
        check_action_output(self.action.output_length(), test_length)?;
        check_action_input(self.action.input_length(), self.input_length())?;
        Ok(())
    }

    /// Assembles the linearized system into matrix block `(p, q)` and right-hand side block `p`,
    /// where block `q` holds the unknown.
    pub fn assemble_into(&self, system: &mut BlockSystem<T>, p: usize, q: usize) -> eyre::Result<()> {
        system.check_block_size(p, self.test_space.ndofs())?;
        system.check_block_size(q, self.iterate.space().ndofs())?;
        assemble_matrix(self, |local| Ok(system.add_local_matrix(p, q, local)?))?;
        assemble_vector(self, |local| Ok(system.add_local_vector(p, local)?))
    }

    /// Evaluates operator values of the iterate and of the trial basis functions, the action
    /// and its Jacobian at quadrature point `q`. Returns the scaled quadrature weight.
    fn evaluate_point(&self, workspace: &mut NonlinearWorkspace<'a, 'm, T>, q: usize) -> eyre::Result<T> {
        let NonlinearWorkspace {
            test,
            evaluators,
            coefficients,
            input,
            trial_values,
            action_value,
            jacobian,
            info,
            ..
        } = workspace;
        test.evaluate(q)?;
        let mut offset = 0;
        for evaluator in evaluators.iter_mut() {
            evaluator.evaluate(q)?;
            let length = evaluator.output_length();
            evaluator.evaluate_function(&coefficients[..], input.rows_mut(offset, length));
            trial_values
                .rows_mut(offset, length)
                .tr_copy_from(&evaluator.values());
            offset += length;
        }
        if self.action.depends_on_x() {
            test.populate_physical_point(q, &mut info.x);
        }
        let input = DVectorView::from(&*input);
        self.action
            .evaluate(&mut action_value.column_mut(0), &input, info);
        self.action
            .evaluate_jacobian(DMatrixViewMut::from(&mut *jacobian), &input, info);
        Ok(test.weights()[q] * test.integration_scaling())
    }

    fn update(&self, workspace: &mut NonlinearWorkspace<'a, 'm, T>, item: usize) -> eyre::Result<()> {
        workspace.test.update(item)?;
        for evaluator in &mut workspace.evaluators {
            evaluator.update(item)?;
        }
        // All evaluators share the iterate's space
        let cell = workspace
            .evaluators
            .first()
            .map(|e| e.cell())
            .unwrap_or_else(|| item_cell(self.test_space.mesh(), self.regions.kind(), item));
        self.iterate
            .gather_cell(cell, &mut workspace.coefficients);
        let num_trial = self.iterate.space().cell_dofs(cell).len();
        if workspace.trial_values.ncols() != num_trial {
            workspace.trial_values = DMatrix::zeros(self.input_length(), num_trial);
            workspace.linearized = DMatrix::zeros(self.action.output_length(), num_trial);
        }
        workspace.info.item = item;
        workspace.info.region = item_region(self.test_space.mesh(), self.regions.kind(), item);
        Ok(())
    }
}

pub struct NonlinearWorkspace<'a, 'm, T: Real> {
    test: BasisEvaluator<'a, 'm, T>,
    evaluators: Vec<BasisEvaluator<'a, 'm, T>>,
    coefficients: Vec<T>,
    input: DVector<T>,
    trial_values: DMatrix<T>,
    action_value: DVector<T>,
    jacobian: DMatrix<T>,
    /// Linearized action applied to the trial basis functions (output length x trial dofs).
    linearized: DMatrix<T>,
    residual: DVector<T>,
    info: QpInfo<T>,
}

impl<'a, 'm, T: Real> ItemAssembler for NonlinearForm<'a, 'm, T> {
    type Workspace = NonlinearWorkspace<'a, 'm, T>;

    fn name(&self) -> &str {
        "nonlinear form"
    }

    fn item_kind(&self) -> ItemKind {
        self.regions.kind()
    }

    fn items(&self) -> &[usize] {
        &self.items
    }

    fn populate_item_dofs(&self, item: usize, dofs: &mut Vec<usize>) {
        let cell = item_cell(self.test_space.mesh(), self.regions.kind(), item);
        dofs.clear();
        dofs.extend_from_slice(self.test_space.cell_dofs(cell));
        dofs.extend_from_slice(self.iterate.space().cell_dofs(cell));
    }

    fn create_workspace(&self) -> eyre::Result<Self::Workspace> {
        self.validate()?;
        let order = self.quadrature_order();
        let kind = self.regions.kind();
        let test = BasisEvaluator::new(self.test_space, self.test_operator, kind, order)?;
        let evaluators = self
            .operators
            .iter()
            .map(|&op| BasisEvaluator::new(self.iterate.space(), op, kind, order))
            .collect::<Result<Vec<_>, _>>()?;
        let input_length = self.input_length();
        let output_length = self.action.output_length();
        Ok(NonlinearWorkspace {
            test,
            evaluators,
            coefficients: Vec::new(),
            input: DVector::zeros(input_length),
            trial_values: DMatrix::zeros(input_length, 0),
            action_value: DVector::zeros(output_length),
            jacobian: DMatrix::zeros(output_length, input_length),
            linearized: DMatrix::zeros(output_length, 0),
            residual: DVector::zeros(output_length),
            info: QpInfo::new(self.test_space.mesh().dim()).with_time(self.time),
        })
    }
}

impl<'a, 'm, T: Real> ItemMatrixAssembler<T> for NonlinearForm<'a, 'm, T> {
    fn assemble_item_matrix(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalMatrix<T>,
    ) -> eyre::Result<()> {
        self.update(workspace, item)?;
        let cell = item_cell(self.test_space.mesh(), self.regions.kind(), item);
        output.reset(workspace.test.dofs(), self.iterate.space().cell_dofs(cell));
        for q in 0..workspace.test.num_points() {
            let weight = self.evaluate_point(workspace, q)?;
            workspace
                .linearized
                .gemm(T::one(), &workspace.jacobian, &workspace.trial_values, T::zero());
            output
                .matrix
                .gemm(weight, &workspace.test.values(), &workspace.linearized, T::one());
        }
        Ok(())
    }
}

impl<'a, 'm, T: Real> ItemVectorAssembler<T> for NonlinearForm<'a, 'm, T> {
    fn assemble_item_vector(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalVector<T>,
    ) -> eyre::Result<()> {
        self.update(workspace, item)?;
        output.reset(workspace.test.dofs());
        for q in 0..workspace.test.num_points() {
            let weight = self.evaluate_point(workspace, q)?;
            workspace
                .residual
                .copy_from(&workspace.action_value);
            workspace
                .residual
                .gemv(T::one(), &workspace.jacobian, &workspace.input, -T::one());
            output
                .vector
                .gemv(weight, &workspace.test.values(), &workspace.residual, T::one());
        }
        Ok(())
    }
}
