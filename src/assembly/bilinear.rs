use crate::action::{Action, QpInfo};
use crate::assembly::{
    assemble_matrix, check_action_input, check_action_output, item_cell, item_region, AssemblyRegions, BlockSystem,
    ItemAssembler, ItemMatrixAssembler, LocalMatrix, QuadratureOrder, SparseBuilder,
};
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::FESpace;
use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView};
use nalgebra_sparse::CsrMatrix;
use std::ptr;

/// A bilinear form `a(u, v) = ∫ A(op_trial(u)) · op_test(v)`.
///
/// Rows of the assembled matrix belong to the test space, columns to the trial space. The
/// action is applied to the trial operator values and must produce as many values as the
/// test operator.
pub struct BilinearForm<'a, 'm, T: Real> {
    test_space: &'a FESpace<'m, T>,
    test_operator: DiffOperator,
    trial_space: &'a FESpace<'m, T>,
    trial_operator: DiffOperator,
    action: &'a dyn Action<T>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    symmetric: bool,
    time: T,
    items: Vec<usize>,
}

impl<'a, 'm, T: Real> BilinearForm<'a, 'm, T> {
    pub fn new(
        test_space: &'a FESpace<'m, T>,
        test_operator: DiffOperator,
        trial_space: &'a FESpace<'m, T>,
        trial_operator: DiffOperator,
        action: &'a dyn Action<T>,
    ) -> Self {
        let regions = AssemblyRegions::cells();
        Self {
            items: regions.items(test_space.mesh()),
            test_space,
            test_operator,
            trial_space,
            trial_operator,
            action,
            regions,
            order: QuadratureOrder::Auto,
            symmetric: false,
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

    /// Allows computing only the upper triangle of local matrices and mirroring it.
    ///
    /// Only takes effect if the test and trial spaces and operators coincide and the action
    /// is symmetric.
    pub fn with_symmetry(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.time = time;
        self
    }

    pub fn test_space(&self) -> &'a FESpace<'m, T> {
        self.test_space
    }

    pub fn trial_space(&self) -> &'a FESpace<'m, T> {
        self.trial_space
    }

    pub fn regions(&self) -> &AssemblyRegions {
        &self.regions
    }

    /// The resolved quadrature order.
    pub fn quadrature_order(&self) -> usize {
        self.order.resolve(
            self.action.degree(),
            &[
                (self.test_space, self.test_operator),
                (self.trial_space, self.trial_operator),
            ],
        )
    }

    fn shares_evaluator(&self) -> bool {
        ptr::eq(self.test_space, self.trial_space) && self.test_operator == self.trial_operator
    }

    /// Whether local matrices are computed as upper triangles and mirrored.
    pub fn uses_symmetric_path(&self) -> bool {
        self.symmetric && self.shares_evaluator() && self.action.is_symmetric()
    }

    /// Checks spaces, operators and the action lengths.
    pub fn validate(&self) -> Result<(), Error> {
        if !ptr::eq(self.test_space.mesh(), self.trial_space.mesh()) {
            return Err(Error::InvalidMesh {
                message: "test and trial spaces are defined on different meshes".to_string(),
            });
        }
        let dim = self.test_space.mesh().dim();
        let test_length = self
            .test_operator
            .output_length(self.test_space.ncomponents(), dim);
        let trial_length = self
            .trial_operator
            .output_length(self.trial_space.ncomponents(), dim);
        check_action_output(self.action.output_length(), test_length)?;
        check_action_input(self.action.input_length(), trial_length)?;
        Ok(())
    }

    /// Assembles the form into block `(p, q)` of the system. With `transposed_copy`, the
    /// transpose of every local matrix is also added to block `(q, p)`.
    pub fn assemble_into(
        &self,
        system: &mut BlockSystem<T>,
        p: usize,
        q: usize,
        transposed_copy: bool,
    ) -> eyre::Result<()> {
        system.check_block_size(p, self.test_space.ndofs())?;
        system.check_block_size(q, self.trial_space.ndofs())?;
        assemble_matrix(self, |local| {
            system.add_local_matrix(p, q, local)?;
            if transposed_copy {
                system.add_local_matrix_transposed(p, q, local)?;
            }
            Ok(())
        })
    }

    /// Assembles the form into a standalone matrix.
    pub fn assemble_csr(&self) -> eyre::Result<CsrMatrix<T>> {
        let mut builder = SparseBuilder::new(self.test_space.ndofs(), self.trial_space.ndofs());
        assemble_matrix(self, |local| {
            for (a, &i) in local.rows.iter().enumerate() {
                for (b, &j) in local.cols.iter().enumerate() {
                    builder.add(i, j, local.matrix[(a, b)]);
                }
            }
            Ok(())
        })?;
        Ok(builder.to_csr())
    }
}

pub struct BilinearWorkspace<'a, 'm, T: Real> {
    test: BasisEvaluator<'a, 'm, T>,
    // None if the trial values coincide with the test values
    trial: Option<BasisEvaluator<'a, 'm, T>>,
    input: DVector<T>,
    action_values: DMatrix<T>,
    info: QpInfo<T>,
}

impl<'a, 'm, T: Real> ItemAssembler for BilinearForm<'a, 'm, T> {
    type Workspace = BilinearWorkspace<'a, 'm, T>;

    fn name(&self) -> &str {
        "bilinear form"
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
        let trial_length = trial.as_ref().unwrap_or(&test).output_length();
        Ok(BilinearWorkspace {
            input: DVector::zeros(trial_length),
            action_values: DMatrix::zeros(self.action.output_length(), 0),
            info: QpInfo::new(self.test_space.mesh().dim()).with_time(self.time),
            test,
            trial,
        })
    }
}

impl<'a, 'm, T: Real> ItemMatrixAssembler<T> for BilinearForm<'a, 'm, T> {
    fn assemble_item_matrix(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalMatrix<T>,
    ) -> eyre::Result<()> {
        let BilinearWorkspace {
            test,
            trial,
            input,
            action_values,
            info,
        } = workspace;
        let symmetric = self.uses_symmetric_path();

        test.update(item)?;
        if let Some(trial) = trial.as_mut() {
            trial.update(item)?;
        }
        output.reset(test.dofs(), trial.as_ref().unwrap_or(&*test).dofs());
        info.item = item;
        info.region = item_region(self.test_space.mesh(), self.regions.kind(), item);

        let num_trial = output.cols.len();
        if action_values.ncols() != num_trial {
            *action_values = DMatrix::zeros(self.action.output_length(), num_trial);
        }

        for q in 0..test.num_points() {
            test.evaluate(q)?;
            if let Some(trial) = trial.as_mut() {
                trial.evaluate(q)?;
            }
            let weight = test.weights()[q] * test.integration_scaling();
            if self.action.depends_on_x() {
                test.populate_physical_point(q, &mut info.x);
            }

            let test_values = test.values();
            let trial_values = trial.as_ref().unwrap_or(&*test).values();
            for j in 0..num_trial {
                input.tr_copy_from(&trial_values.row(j));
                self.action
                    .evaluate(&mut action_values.column_mut(j), &DVectorView::from(&*input), info);
            }

            if symmetric {
                for j in 0..num_trial {
                    for i in 0..=j {
                        output.matrix[(i, j)] += weight * test_values.row(i).tr_dot(&action_values.column(j));
                    }
                }
            } else {
                output
                    .matrix
                    .gemm(weight, &test_values, &*action_values, T::one());
            }
        }

        if symmetric {
            for j in 0..num_trial {
                for i in 0..j {
                    output.matrix[(j, i)] = output.matrix[(i, j)];
                }
            }
        }
        Ok(())
    }
}
