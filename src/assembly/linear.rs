use crate::action::{Action, QpInfo};
use crate::assembly::{
    assemble_vector, check_action_input, check_action_output, item_cell, item_region, AssemblyRegions, BlockSystem,
    ItemAssembler, ItemVectorAssembler, LocalVector, QuadratureOrder,
};
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::{FESpace, FEVector};
use crate::Real;
use nalgebra::{DVector, DVectorView};
use std::ptr;

/// A linear form `l(v) = ∫ A(op_1(a_1), ..., op_k(a_k)) · op_test(v)`.
///
/// The arguments `a_i` are fixed finite element functions; without arguments the action
/// receives an empty input and acts as pointwise data (e.g. a source term `f(x)`).
pub struct LinearForm<'a, 'm, T: Real> {
    test_space: &'a FESpace<'m, T>,
    test_operator: DiffOperator,
    arguments: Vec<(&'a FEVector<'a, 'm, T>, DiffOperator)>,
    action: &'a dyn Action<T>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    factor: T,
    time: T,
    items: Vec<usize>,
}

impl<'a, 'm, T: Real> LinearForm<'a, 'm, T> {
    pub fn new(test_space: &'a FESpace<'m, T>, test_operator: DiffOperator, action: &'a dyn Action<T>) -> Self {
        let regions = AssemblyRegions::cells();
        Self {
            items: regions.items(test_space.mesh()),
            test_space,
            test_operator,
            arguments: Vec::new(),
            action,
            regions,
            order: QuadratureOrder::Auto,
            factor: T::one(),
            time: T::zero(),
        }
    }

    /// Appends a fixed finite element function whose operator values are fed to the action.
    pub fn with_argument(mut self, argument: &'a FEVector<'a, 'm, T>, operator: DiffOperator) -> Self {
        self.arguments.push((argument, operator));
        self
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

    /// Scales all contributions.
    pub fn with_factor(mut self, factor: T) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.time = time;
        self
    }

    pub fn quadrature_order(&self) -> usize {
        let mut operators = vec![(self.test_space, self.test_operator)];
        operators.extend(self.arguments.iter().map(|(a, op)| (a.space(), *op)));
        self.order.resolve(self.action.degree(), &operators)
    }

    fn input_length(&self) -> usize {
        self.arguments
            .iter()
            .map(|(a, op)| op.output_length(a.space().ncomponents(), a.space().mesh().dim()))
            .sum()
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mesh = self.test_space.mesh();
        if self
            .arguments
            .iter()
            .any(|(a, _)| !ptr::eq(a.space().mesh(), mesh))
        {
            return Err(Error::InvalidMesh {
                message: "arguments of a linear form are defined on a different mesh".to_string(),
            });
        }
        let test_length = self
            .test_operator
            .output_length(self.test_space.ncomponents(), mesh.dim());
        check_action_output(self.action.output_length(), test_length)?;
        check_action_input(self.action.input_length(), self.input_length())?;
        Ok(())
    }

    /// Assembles the form into block `p` of the right-hand side.
    pub fn assemble_into(&self, system: &mut BlockSystem<T>, p: usize) -> eyre::Result<()> {
        system.check_block_size(p, self.test_space.ndofs())?;
        assemble_vector(self, |local| Ok(system.add_local_vector(p, local)?))
    }

    /// Assembles the form into a standalone vector.
    pub fn assemble_vector(&self) -> eyre::Result<DVector<T>> {
        let mut vector = DVector::zeros(self.test_space.ndofs());
        assemble_vector(self, |local| {
            for (a, &i) in local.rows.iter().enumerate() {
                vector[i] += local.vector[a];
            }
            Ok(())
        })?;
        Ok(vector)
    }
}

pub struct LinearWorkspace<'a, 'm, T: Real> {
    test: BasisEvaluator<'a, 'm, T>,
    arguments: Vec<BasisEvaluator<'a, 'm, T>>,
    argument_coefficients: Vec<Vec<T>>,
    input: DVector<T>,
    action_value: DVector<T>,
    info: QpInfo<T>,
}

impl<'a, 'm, T: Real> ItemAssembler for LinearForm<'a, 'm, T> {
    type Workspace = LinearWorkspace<'a, 'm, T>;

    fn name(&self) -> &str {
        "linear form"
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
    }

    fn create_workspace(&self) -> eyre::Result<Self::Workspace> {
        self.validate()?;
        let order = self.quadrature_order();
        let kind = self.regions.kind();
        let test = BasisEvaluator::new(self.test_space, self.test_operator, kind, order)?;
        let arguments = self
            .arguments
            .iter()
            .map(|(a, op)| BasisEvaluator::new(a.space(), *op, kind, order))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LinearWorkspace {
            test,
            arguments,
            argument_coefficients: vec![Vec::new(); self.arguments.len()],
            input: DVector::zeros(self.input_length()),
            action_value: DVector::zeros(self.action.output_length()),
            info: QpInfo::new(self.test_space.mesh().dim()).with_time(self.time),
        })
    }
}

impl<'a, 'm, T: Real> ItemVectorAssembler<T> for LinearForm<'a, 'm, T> {
    fn assemble_item_vector(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        output: &mut LocalVector<T>,
    ) -> eyre::Result<()> {
        let LinearWorkspace {
            test,
            arguments,
            argument_coefficients,
            input,
            action_value,
            info,
        } = workspace;

        test.update(item)?;
        for (((argument, _), evaluator), coefficients) in self
            .arguments
            .iter()
            .zip(arguments.iter_mut())
            .zip(argument_coefficients.iter_mut())
        {
            evaluator.update(item)?;
            argument.gather_cell(evaluator.cell(), coefficients);
        }
        output.reset(test.dofs());
        info.item = item;
        info.region = item_region(self.test_space.mesh(), self.regions.kind(), item);

        for q in 0..test.num_points() {
            test.evaluate(q)?;
            let mut offset = 0;
            for (evaluator, coefficients) in arguments.iter_mut().zip(argument_coefficients.iter()) {
                evaluator.evaluate(q)?;
                let length = evaluator.output_length();
                evaluator.evaluate_function(&coefficients[..], input.rows_mut(offset, length));
                offset += length;
            }
            if self.action.depends_on_x() {
                test.populate_physical_point(q, &mut info.x);
            }
            self.action
                .evaluate(&mut action_value.column_mut(0), &DVectorView::from(&*input), info);
            let weight = self.factor * test.weights()[q] * test.integration_scaling();
            output.vector.gemv(weight, &test.values(), &*action_value, T::one());
        }
        Ok(())
    }
}
