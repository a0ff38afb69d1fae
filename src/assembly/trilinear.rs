use crate::action::{Action, QpInfo};
use crate::assembly::{
    assemble_matrix, check_action_input, check_action_output, item_cell, item_region, AssemblyRegions, BlockSystem,
    ItemAssembler, ItemMatrixAssembler, LocalMatrix, QuadratureOrder,
};
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::{FESpace, FEVector};
use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView};
use std::ptr;

/// A bilinear form with an additional fixed finite element function `a`:
/// `c(a; u, v) = ∫ A(op_a(a), op_trial(u)) · op_test(v)`.
///
/// The action input is the concatenation of the operator values of `a` followed by the trial
/// operator values. A typical use is a convection term with a given velocity `a`.
pub struct TrilinearForm<'a, 'm, T: Real> {
    test_space: &'a FESpace<'m, T>,
    test_operator: DiffOperator,
    trial_space: &'a FESpace<'m, T>,
    trial_operator: DiffOperator,
    argument: &'a FEVector<'a, 'm, T>,
    argument_operator: DiffOperator,
    action: &'a dyn Action<T>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    time: T,
    items: Vec<usize>,
}

impl<'a, 'm, T: Real> TrilinearForm<'a, 'm, T> {
    pub fn new(
        test_space: &'a FESpace<'m, T>,
        test_operator: DiffOperator,
        trial_space: &'a FESpace<'m, T>,
        trial_operator: DiffOperator,
        argument: &'a FEVector<'a, 'm, T>,
        argument_operator: DiffOperator,
        action: &'a dyn Action<T>,
    ) -> Self {
        let regions = AssemblyRegions::cells();
        Self {
            items: regions.items(test_space.mesh()),
            test_space,
            test_operator,
            trial_space,
            trial_operator,
            argument,
            argument_operator,
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
        self.order.resolve(
            self.action.degree(),
            &[
                (self.test_space, self.test_operator),
                (self.trial_space, self.trial_operator),
                (self.argument.space(), self.argument_operator),
            ],
        )
    }

    fn shares_evaluator(&self) -> bool {
        ptr::eq(self.test_space, self.trial_space) && self.test_operator == self.trial_operator
    }

    fn argument_length(&self) -> usize {
        let space = self.argument.space();
        self.argument_operator
            .output_length(space.ncomponents(), space.mesh().dim())
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mesh = self.test_space.mesh();
        if !ptr::eq(mesh, self.trial_space.mesh()) || !ptr::eq(mesh, self.argument.space().mesh()) {
            return Err(Error::InvalidMesh {
                message: "spaces of a trilinear form are defined on different meshes".to_string(),
            });
        }
        let test_length = self
            .test_operator
            .output_length(self.test_space.ncomponents(), mesh.dim());
        let trial_length = self
            .trial_operator
            .output_length(self.trial_space.ncomponents(), mesh.dim());
        check_action_output(self.action.output_length(), test_length)?;
        check_action_input(self.action.input_length(), self.argument_length() + trial_length)?;
        Ok(())
    }

    /// Assembles the form into block `(p, q)` of the system.
    pub fn assemble_into(&self, system: &mut BlockSystem<T>, p: usize, q: usize) -> eyre::Result<()> {
        system.check_block_size(p, self.test_space.ndofs())?;
        system.check_block_size(q, self.trial_space.ndofs())?;
        assemble_matrix(self, |local| Ok(system.add_local_matrix(p, q, local)?))
    }
}

pub struct TrilinearWorkspace<'a, 'm, T: Real> {
    test: BasisEvaluator<'a, 'm, T>,
    trial: Option<BasisEvaluator<'a, 'm, T>>,
    argument: BasisEvaluator<'a, 'm, T>,
    argument_coefficients: Vec<T>,
    input: DVector<T>,
    action_values: DMatrix<T>,
    info: QpInfo<T>,
}

impl<'a, 'm, T: Real> ItemAssembler for TrilinearForm<'a, 'm, T> {
    type Workspace = TrilinearWorkspace<'a, 'm, T>;

    fn name(&self) -> &str {
        "trilinear form"
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
        dofs.extend_from_slice(self.trial_space.cell_dofs(cell));
    }

    fn create_workspace(&self) -> eyre::Result<Self::Workspace> {
        self.validate()?;
        let order = self.quadrature_order();
        let kind = self.regions.kind();
        let test = BasisEvaluator::new(self.test_space, self.test_operator, kind, order)?;
        let trial = if self.shares_evaluator() {
            None
        } else {
            Some(BasisEvaluator::new(self.trial_space, self.trial_operator, kind, order)?)
        };
        let argument = BasisEvaluator::new(self.argument.space(), self.argument_operator, kind, order)?;
        let input_length = argument.output_length() + trial.as_ref().unwrap_or(&test).output_length();
        Ok(TrilinearWorkspace {
            input: DVector::zeros(input_length),
            action_values: DMatrix::zeros(self.action.output_length(), 0),
            info: QpInfo::new(self.test_space.mesh().dim()).with_time(self.time),
            argument_coefficients: Vec::new(),
            test,
            trial,
            argument,
        })
    }
}

impl<'a, 'm, T: Real> ItemMatrixAssembler<T> for TrilinearForm<'a, 'm, T> {
    fn assemble_item_matrix(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalMatrix<T>,
    ) -> eyre::Result<()> {
        let TrilinearWorkspace {
            test,
            trial,
            argument,
            argument_coefficients,
            input,
            action_values,
            info,
        } = workspace;

        test.update(item)?;
        if let Some(trial) = trial.as_mut() {
            trial.update(item)?;
        }
        argument.update(item)?;
        self.argument
            .gather_cell(argument.cell(), argument_coefficients);
        output.reset(test.dofs(), trial.as_ref().unwrap_or(&*test).dofs());
        info.item = item;
        info.region = item_region(self.test_space.mesh(), self.regions.kind(), item);

        let num_trial = output.cols.len();
        if action_values.ncols() != num_trial {
            *action_values = DMatrix::zeros(self.action.output_length(), num_trial);
        }
        let argument_length = argument.output_length();
        let trial_length = input.len() - argument_length;

        for q in 0..test.num_points() {
            test.evaluate(q)?;
            if let Some(trial) = trial.as_mut() {
                trial.evaluate(q)?;
            }
            argument.evaluate(q)?;
            argument.evaluate_function(&argument_coefficients[..], input.rows_mut(0, argument_length));
            let weight = test.weights()[q] * test.integration_scaling();
            if self.action.depends_on_x() {
                test.populate_physical_point(q, &mut info.x);
            }

            let test_values = test.values();
            let trial_values = trial.as_ref().unwrap_or(&*test).values();
            for j in 0..num_trial {
                input
                    .rows_mut(argument_length, trial_length)
                    .tr_copy_from(&trial_values.row(j));
                self.action
                    .evaluate(&mut action_values.column_mut(j), &DVectorView::from(&*input), info);
            }
            output
                .matrix
                .gemm(weight, &test_values, &*action_values, T::one());
        }
        Ok(())
    }
}
