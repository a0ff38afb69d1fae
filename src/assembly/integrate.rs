use crate::action::{Action, QpInfo};
use crate::assembly::{
    assemble_integrals, check_action_input, item_cell, item_region, AssemblyRegions, ItemAssembler,
    ItemIntegralAssembler, QuadratureOrder,
};
use crate::error::Error;
use crate::evaluate::{BasisEvaluator, DiffOperator};
use crate::mesh::ItemKind;
use crate::space::FEVector;
use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use std::ptr;

/// Integrates an action of operator values of finite element functions over mesh items.
///
/// The integrand at a quadrature point is `A(op_1(a_1), ..., op_k(a_k))`, a vector of the
/// action's output length. Integrals are available per item and in total.
pub struct ItemIntegrator<'a, 'm, T: Real> {
    arguments: Vec<(&'a FEVector<'a, 'm, T>, DiffOperator)>,
    action: &'a dyn Action<T>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    time: T,
    items: Vec<usize>,
}

impl<'a, 'm, T: Real> ItemIntegrator<'a, 'm, T> {
    pub fn new(argument: &'a FEVector<'a, 'm, T>, operator: DiffOperator, action: &'a dyn Action<T>) -> Self {
        let regions = AssemblyRegions::cells();
        Self {
            items: regions.items(argument.space().mesh()),
            arguments: vec![(argument, operator)],
            action,
            regions,
            order: QuadratureOrder::Auto,
            time: T::zero(),
        }
    }

    pub fn with_argument(mut self, argument: &'a FEVector<'a, 'm, T>, operator: DiffOperator) -> Self {
        self.arguments.push((argument, operator));
        self
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.items = regions.items(self.arguments[0].0.space().mesh());
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
        let operators: Vec<_> = self
            .arguments
            .iter()
            .map(|(a, op)| (a.space(), *op))
            .collect();
        self.order.resolve(self.action.degree(), &operators)
    }

    fn input_length(&self) -> usize {
        self.arguments
            .iter()
            .map(|(a, op)| op.output_length(a.space().ncomponents(), a.space().mesh().dim()))
            .sum()
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mesh = self.arguments[0].0.space().mesh();
        if self
            .arguments
            .iter()
            .any(|(a, _)| !ptr::eq(a.space().mesh(), mesh))
        {
            return Err(Error::InvalidMesh {
                message: "arguments of an integrator are defined on different meshes".to_string(),
            });
        }
        check_action_input(self.action.input_length(), self.input_length())
    }

    /// Integrals of all selected items, one column per item.
    pub fn integrate_items(&self) -> eyre::Result<DMatrix<T>> {
        assemble_integrals(self)
    }

    /// The sum of the integrals over all selected items.
    pub fn integrate(&self) -> eyre::Result<DVector<T>> {
        let integrals = self.integrate_items()?;
        let mut total = DVector::zeros(integrals.nrows());
        for column in integrals.column_iter() {
            total += column;
        }
        Ok(total)
    }
}

pub struct IntegratorWorkspace<'a, 'm, T: Real> {
    evaluators: Vec<BasisEvaluator<'a, 'm, T>>,
    coefficients: Vec<Vec<T>>,
    input: DVector<T>,
    action_value: DVector<T>,
    info: QpInfo<T>,
}

impl<'a, 'm, T: Real> ItemAssembler for ItemIntegrator<'a, 'm, T> {
    type Workspace = IntegratorWorkspace<'a, 'm, T>;

    fn name(&self) -> &str {
        "item integrator"
    }

    fn item_kind(&self) -> ItemKind {
        self.regions.kind()
    }

    fn items(&self) -> &[usize] {
        &self.items
    }

    fn populate_item_dofs(&self, item: usize, dofs: &mut Vec<usize>) {
        dofs.clear();
        for (argument, _) in &self.arguments {
            let space = argument.space();
            let cell = item_cell(space.mesh(), self.regions.kind(), item);
            dofs.extend_from_slice(space.cell_dofs(cell));
        }
    }

    fn create_workspace(&self) -> eyre::Result<Self::Workspace> {
        self.validate()?;
        let order = self.quadrature_order();
        let kind = self.regions.kind();
        let evaluators = self
            .arguments
            .iter()
            .map(|(a, op)| BasisEvaluator::new(a.space(), *op, kind, order))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IntegratorWorkspace {
            evaluators,
            coefficients: vec![Vec::new(); self.arguments.len()],
            input: DVector::zeros(self.input_length()),
            action_value: DVector::zeros(self.action.output_length()),
            info: QpInfo::new(self.arguments[0].0.space().mesh().dim()).with_time(self.time),
        })
    }
}

impl<'a, 'm, T: Real> ItemIntegralAssembler<T> for ItemIntegrator<'a, 'm, T> {
    fn integral_length(&self) -> usize {
        self.action.output_length()
    }

    fn assemble_item_integral(
        &self,
        workspace: &mut Self::Workspace,
        item: usize,
        mut output: DVectorViewMut<T>,
    ) -> eyre::Result<()> {
        let IntegratorWorkspace {
            evaluators,
            coefficients,
            input,
            action_value,
            info,
        } = workspace;
        for (((argument, _), evaluator), local) in self
            .arguments
            .iter()
            .zip(evaluators.iter_mut())
            .zip(coefficients.iter_mut())
        {
            evaluator.update(item)?;
            argument.gather_cell(evaluator.cell(), local);
        }
        info.item = item;
        info.region = item_region(self.arguments[0].0.space().mesh(), self.regions.kind(), item);

        output.fill(T::zero());
        for q in 0..evaluators[0].num_points() {
            let mut offset = 0;
            for (evaluator, local) in evaluators.iter_mut().zip(coefficients.iter()) {
                evaluator.evaluate(q)?;
                let length = evaluator.output_length();
                evaluator.evaluate_function(&local[..], input.rows_mut(offset, length));
                offset += length;
            }
            let first = &evaluators[0];
            if self.action.depends_on_x() {
                first.populate_physical_point(q, &mut info.x);
            }
            self.action
                .evaluate(&mut action_value.column_mut(0), &DVectorView::from(&*input), info);
            let weight = first.weights()[q] * first.integration_scaling();
            output.axpy(weight, &*action_value, T::one());
        }
        Ok(())
    }
}
