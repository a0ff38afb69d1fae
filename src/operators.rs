//! PDE operators: a closed set of operator kinds, each mapped onto one assembly pass.
//!
//! Operators refer to unknowns by block index. An [`AssemblyContext`] provides the current
//! iterate (and thereby the space) of every block, as well as the time and whether passes
//! should run in parallel.
use crate::action::{Action, DifferentiableAction};
use crate::assembly::parallel::{color_items, par_assemble_matrix, par_assemble_vector};
use crate::assembly::{
    assemble_matrix, assemble_vector, AssemblyRegions, BilinearForm, BlockSystem, ItemMatrixAssembler,
    ItemVectorAssembler, LinearForm, LocalMatrix, LocalVector, NonlinearForm, QuadratureOrder, TrilinearForm,
};
use crate::error::Error;
use crate::evaluate::DiffOperator;
use crate::mesh::ItemKind;
use crate::space::{FESpace, FEVector};
use crate::Real;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod fv;

pub use fv::*;

/// When an operator has to be (re)assembled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyTrigger {
    Never,
    /// Once during setup; the contribution is kept afterwards.
    Once,
    EveryIteration,
    EveryTimeStep,
    AfterFinalSolve,
}

/// Events of an outer solver loop at which assembly may happen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyEvent {
    Setup,
    TimeStep,
    Iteration,
    FinalSolve,
}

impl AssemblyTrigger {
    pub fn requires_assembly(&self, event: AssemblyEvent) -> bool {
        use AssemblyEvent::*;
        match self {
            Self::Never => false,
            Self::Once => event == Setup,
            Self::EveryTimeStep => matches!(event, Setup | TimeStep),
            Self::EveryIteration => matches!(event, Setup | TimeStep | Iteration),
            Self::AfterFinalSolve => event == FinalSolve,
        }
    }
}

/// Data shared by all operators of one assembly.
pub struct AssemblyContext<'a, 'm, T: Real> {
    iterates: &'a [FEVector<'a, 'm, T>],
    time: T,
    parallel: bool,
}

impl<'a, 'm, T: Real> AssemblyContext<'a, 'm, T> {
    /// Creates a context with one current iterate per block.
    pub fn new(iterates: &'a [FEVector<'a, 'm, T>]) -> Self {
        Self {
            iterates,
            time: T::zero(),
            parallel: false,
        }
    }

    pub fn with_time(mut self, time: T) -> Self {
        self.time = time;
        self
    }

    /// Runs cell and face passes over colored item groups in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn time(&self) -> T {
        self.time
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn num_blocks(&self) -> usize {
        self.iterates.len()
    }

    pub fn iterate(&self, block: usize) -> Result<&'a FEVector<'a, 'm, T>, Error> {
        self.iterates.get(block).ok_or(Error::InvalidBlock {
            block,
            num_blocks: self.iterates.len(),
        })
    }

    pub fn space(&self, block: usize) -> Result<&'a FESpace<'m, T>, Error> {
        Ok(self.iterate(block)?.space())
    }

    /// A block system with one block per iterate.
    pub fn create_system(&self) -> BlockSystem<T> {
        let sizes: Vec<_> = self
            .iterates
            .iter()
            .map(|u| u.space().ndofs())
            .collect();
        BlockSystem::new(&sizes)
    }
}

fn scatter_matrix<T, A>(
    assembler: &A,
    context: &AssemblyContext<T>,
    scatter: impl FnMut(&LocalMatrix<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ItemMatrixAssembler<T>,
{
    if context.is_parallel() {
        par_assemble_matrix(assembler, &color_items(assembler), scatter)
    } else {
        assemble_matrix(assembler, scatter)
    }
}

fn scatter_vector<T, A>(
    assembler: &A,
    context: &AssemblyContext<T>,
    scatter: impl FnMut(&LocalVector<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ItemVectorAssembler<T>,
{
    if context.is_parallel() {
        par_assemble_vector(assembler, &color_items(assembler), scatter)
    } else {
        assemble_vector(assembler, scatter)
    }
}

/// A bilinear form between the test block and the trial block.
#[derive(Clone)]
pub struct BilinearOperator<T: Real> {
    test: (usize, DiffOperator),
    trial: (usize, DiffOperator),
    action: Arc<dyn Action<T>>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    symmetric: bool,
    transposed_copy: bool,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> BilinearOperator<T> {
    pub fn new(
        test_block: usize,
        test_operator: DiffOperator,
        trial_block: usize,
        trial_operator: DiffOperator,
        action: Arc<dyn Action<T>>,
    ) -> Self {
        Self {
            test: (test_block, test_operator),
            trial: (trial_block, trial_operator),
            action,
            regions: AssemblyRegions::cells(),
            order: QuadratureOrder::Auto,
            symmetric: false,
            transposed_copy: false,
            trigger_override: None,
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_symmetry(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Also writes the transpose of the block into the mirrored block.
    pub fn with_transposed_copy(mut self, transposed_copy: bool) -> Self {
        self.transposed_copy = transposed_copy;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let (p, q) = (self.test.0, self.trial.0);
        let form = BilinearForm::new(
            context.space(p)?,
            self.test.1,
            context.space(q)?,
            self.trial.1,
            self.action.as_ref(),
        )
        .with_regions(self.regions.clone())
        .with_quadrature_order(self.order)
        .with_symmetry(self.symmetric)
        .with_time(context.time());
        scatter_bilinear(&form, system, context, p, q, self.transposed_copy)
    }
}

fn scatter_bilinear<T: Real>(
    form: &BilinearForm<T>,
    system: &mut BlockSystem<T>,
    context: &AssemblyContext<T>,
    p: usize,
    q: usize,
    transposed_copy: bool,
) -> eyre::Result<()> {
    system.check_block_size(p, form.test_space().ndofs())?;
    system.check_block_size(q, form.trial_space().ndofs())?;
    scatter_matrix(form, context, |local| {
        system.add_local_matrix(p, q, local)?;
        if transposed_copy {
            system.add_local_matrix_transposed(p, q, local)?;
        }
        Ok(())
    })
}

/// A bilinear form whose action additionally depends on the current iterate of another
/// block, e.g. convection by a computed velocity.
#[derive(Clone)]
pub struct TrilinearOperator<T: Real> {
    test: (usize, DiffOperator),
    trial: (usize, DiffOperator),
    argument: (usize, DiffOperator),
    action: Arc<dyn Action<T>>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> TrilinearOperator<T> {
    pub fn new(
        test: (usize, DiffOperator),
        trial: (usize, DiffOperator),
        argument: (usize, DiffOperator),
        action: Arc<dyn Action<T>>,
    ) -> Self {
        Self {
            test,
            trial,
            argument,
            action,
            regions: AssemblyRegions::cells(),
            order: QuadratureOrder::Auto,
            trigger_override: None,
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let (p, q) = (self.test.0, self.trial.0);
        system.check_block_size(p, context.space(p)?.ndofs())?;
        system.check_block_size(q, context.space(q)?.ndofs())?;
        let form = TrilinearForm::new(
            context.space(p)?,
            self.test.1,
            context.space(q)?,
            self.trial.1,
            context.iterate(self.argument.0)?,
            self.argument.1,
            self.action.as_ref(),
        )
        .with_regions(self.regions.clone())
        .with_quadrature_order(self.order)
        .with_time(context.time());
        scatter_matrix(&form, context, |local| Ok(system.add_local_matrix(p, q, local)?))
    }
}

/// A nonlinear form in one unknown, assembled as its Newton linearization.
#[derive(Clone)]
pub struct NonlinearOperator<T: Real> {
    test: (usize, DiffOperator),
    unknown: usize,
    operators: Vec<DiffOperator>,
    action: Arc<dyn DifferentiableAction<T>>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> NonlinearOperator<T> {
    pub fn new(
        test: (usize, DiffOperator),
        unknown: usize,
        operators: Vec<DiffOperator>,
        action: Arc<dyn DifferentiableAction<T>>,
    ) -> Self {
        Self {
            test,
            unknown,
            operators,
            action,
            regions: AssemblyRegions::cells(),
            order: QuadratureOrder::Auto,
            trigger_override: None,
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let (p, q) = (self.test.0, self.unknown);
        system.check_block_size(p, context.space(p)?.ndofs())?;
        system.check_block_size(q, context.space(q)?.ndofs())?;
        let form = NonlinearForm::new(
            context.space(p)?,
            self.test.1,
            context.iterate(q)?,
            self.operators.clone(),
            self.action.as_ref(),
        )
        .with_regions(self.regions.clone())
        .with_quadrature_order(self.order)
        .with_time(context.time());
        scatter_matrix(&form, context, |local| Ok(system.add_local_matrix(p, q, local)?))?;
        scatter_vector(&form, context, |local| Ok(system.add_local_vector(p, local)?))
    }
}

/// A right-hand side `∫ A(ops(args)) · op_test(v)`, where the optional arguments are current
/// iterates of other blocks.
#[derive(Clone)]
pub struct RhsOperator<T: Real> {
    test: (usize, DiffOperator),
    arguments: Vec<(usize, DiffOperator)>,
    action: Arc<dyn Action<T>>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    factor: T,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> RhsOperator<T> {
    pub fn new(test_block: usize, test_operator: DiffOperator, action: Arc<dyn Action<T>>) -> Self {
        Self {
            test: (test_block, test_operator),
            arguments: Vec::new(),
            action,
            regions: AssemblyRegions::cells(),
            order: QuadratureOrder::Auto,
            factor: T::one(),
            trigger_override: None,
        }
    }

    pub fn with_argument(mut self, block: usize, operator: DiffOperator) -> Self {
        self.arguments.push((block, operator));
        self
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_factor(mut self, factor: T) -> Self {
        self.factor = factor;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn default_trigger(&self) -> AssemblyTrigger {
        if !self.arguments.is_empty() {
            AssemblyTrigger::EveryIteration
        } else if self.action.depends_on_time() {
            AssemblyTrigger::EveryTimeStep
        } else {
            AssemblyTrigger::Once
        }
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let p = self.test.0;
        system.check_block_size(p, context.space(p)?.ndofs())?;
        let mut form = LinearForm::new(context.space(p)?, self.test.1, self.action.as_ref())
            .with_regions(self.regions.clone())
            .with_quadrature_order(self.order)
            .with_factor(self.factor)
            .with_time(context.time());
        for &(block, operator) in &self.arguments {
            form = form.with_argument(context.iterate(block)?, operator);
        }
        scatter_vector(&form, context, |local| Ok(system.add_local_vector(p, local)?))
    }
}

/// Couples a multiplier block to an unknown block through `∫ A(op_unknown(u)) · op_multiplier(λ)`
/// and writes the block and its exact transpose in one pass.
#[derive(Clone)]
pub struct LagrangeMultiplierOperator<T: Real> {
    multiplier: (usize, DiffOperator),
    unknown: (usize, DiffOperator),
    action: Arc<dyn Action<T>>,
    regions: AssemblyRegions,
    order: QuadratureOrder,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> LagrangeMultiplierOperator<T> {
    pub fn new(multiplier: (usize, DiffOperator), unknown: (usize, DiffOperator), action: Arc<dyn Action<T>>) -> Self {
        Self {
            multiplier,
            unknown,
            action,
            regions: AssemblyRegions::cells(),
            order: QuadratureOrder::Auto,
            trigger_override: None,
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_quadrature_order(mut self, order: QuadratureOrder) -> Self {
        self.order = order;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let (p, q) = (self.multiplier.0, self.unknown.0);
        let form = BilinearForm::new(
            context.space(p)?,
            self.multiplier.1,
            context.space(q)?,
            self.unknown.1,
            self.action.as_ref(),
        )
        .with_regions(self.regions.clone())
        .with_quadrature_order(self.order)
        .with_time(context.time());
        scatter_bilinear(&form, system, context, p, q, true)
    }
}

/// Adds a penalty to the diagonal entries of the dofs on the selected items, and
/// `penalty * data` to the right-hand side, which weakly enforces `u = data` on those dofs.
#[derive(Debug, Clone)]
pub struct DiagonalPenaltyOperator<T: Real> {
    block: usize,
    penalty: T,
    regions: AssemblyRegions,
    data: Option<Vec<T>>,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> DiagonalPenaltyOperator<T> {
    /// A penalty on all boundary faces with homogeneous data.
    pub fn new(block: usize, penalty: T) -> Self {
        Self {
            block,
            penalty,
            regions: AssemblyRegions::boundary_faces(),
            data: None,
            trigger_override: None,
        }
    }

    pub fn with_regions(mut self, regions: AssemblyRegions) -> Self {
        self.regions = regions;
        self
    }

    /// Target values, one per dof of the block.
    pub fn with_data(mut self, data: Vec<T>) -> Self {
        self.data = Some(data);
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    /// The dofs of the block on the selected items, in increasing order.
    pub fn penalized_dofs(&self, space: &FESpace<T>) -> Vec<usize> {
        let mesh = space.mesh();
        let mut dofs: Vec<usize> = self
            .regions
            .items(mesh)
            .into_iter()
            .flat_map(|item| match self.regions.kind() {
                ItemKind::Cells => space.cell_dofs(item),
                ItemKind::Faces | ItemKind::BoundaryFaces => space.face_dofs(item),
            })
            .copied()
            .collect();
        dofs.sort_unstable();
        dofs.dedup();
        dofs
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let space = context.space(self.block)?;
        system.check_block_size(self.block, space.ndofs())?;
        if let Some(data) = &self.data {
            if data.len() != space.ndofs() {
                return Err(Error::IncompatibleDimensions {
                    expected: space.ndofs(),
                    actual: data.len(),
                }
                .into());
            }
        }
        let dofs = self.penalized_dofs(space);
        debug!("Penalizing {} dofs of block {}", dofs.len(), self.block);
        for dof in dofs {
            system.add_entry(self.block, self.block, dof, dof, self.penalty)?;
            if let Some(data) = &self.data {
                system.rhs_block_mut(self.block)?[dof] += self.penalty * data[dof];
            }
        }
        Ok(())
    }
}

/// Adds `factor * u_source` to the right-hand side of the target block.
#[derive(Debug, Clone)]
pub struct CopyOperator<T: Real> {
    target: usize,
    source: usize,
    factor: T,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> CopyOperator<T> {
    pub fn new(target: usize, source: usize) -> Self {
        Self {
            target,
            source,
            factor: T::one(),
            trigger_override: None,
        }
    }

    pub fn with_factor(mut self, factor: T) -> Self {
        self.factor = factor;
        self
    }

    /// Overrides the default assembly trigger.
    pub fn with_trigger(mut self, trigger: AssemblyTrigger) -> Self {
        self.trigger_override = Some(trigger);
        self
    }

    fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let source = context.iterate(self.source)?;
        system.check_block_size(self.target, source.space().ndofs())?;
        system
            .rhs_block_mut(self.target)?
            .axpy(self.factor, source.coefficients(), T::one());
        Ok(())
    }
}

/// The closed set of PDE operators.
#[derive(Clone)]
pub enum PdeOperator<T: Real> {
    Bilinear(BilinearOperator<T>),
    Trilinear(TrilinearOperator<T>),
    Nonlinear(NonlinearOperator<T>),
    Rhs(RhsOperator<T>),
    LagrangeMultiplier(LagrangeMultiplierOperator<T>),
    DiagonalPenalty(DiagonalPenaltyOperator<T>),
    Copy(CopyOperator<T>),
    FvUpwindDivergence(FvUpwindDivergenceOperator<T>),
}

impl<T: Real> PdeOperator<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bilinear(_) => "bilinear operator",
            Self::Trilinear(_) => "trilinear operator",
            Self::Nonlinear(_) => "nonlinear operator",
            Self::Rhs(_) => "right-hand side operator",
            Self::LagrangeMultiplier(_) => "Lagrange multiplier operator",
            Self::DiagonalPenalty(_) => "diagonal penalty operator",
            Self::Copy(_) => "copy operator",
            Self::FvUpwindDivergence(_) => "finite volume upwind divergence operator",
        }
    }

    /// The matrix blocks `(row block, column block)` written by the operator. Blocks whose
    /// right-hand side is written are listed as `(p, p)` only if the matrix is written too;
    /// see [`Self::rhs_blocks`].
    pub fn target_blocks(&self) -> Vec<(usize, usize)> {
        match self {
            Self::Bilinear(op) => {
                let (p, q) = (op.test.0, op.trial.0);
                if op.transposed_copy && p != q {
                    vec![(p, q), (q, p)]
                } else {
                    vec![(p, q)]
                }
            }
            Self::Trilinear(op) => vec![(op.test.0, op.trial.0)],
            Self::Nonlinear(op) => vec![(op.test.0, op.unknown)],
            Self::Rhs(_) | Self::Copy(_) => Vec::new(),
            Self::LagrangeMultiplier(op) => {
                let (p, q) = (op.multiplier.0, op.unknown.0);
                vec![(p, q), (q, p)]
            }
            Self::DiagonalPenalty(op) => vec![(op.block, op.block)],
            Self::FvUpwindDivergence(op) => vec![(op.block(), op.block())],
        }
    }

    /// The right-hand side blocks written by the operator.
    pub fn rhs_blocks(&self) -> Vec<usize> {
        match self {
            Self::Nonlinear(op) => vec![op.test.0],
            Self::Rhs(op) => vec![op.test.0],
            Self::Copy(op) => vec![op.target],
            Self::DiagonalPenalty(op) if op.data.is_some() => vec![op.block],
            _ => Vec::new(),
        }
    }

    /// The trigger set with `with_trigger`, or else the default of the operator kind.
    pub fn trigger(&self) -> AssemblyTrigger {
        self.trigger_override()
            .unwrap_or_else(|| self.default_trigger())
    }

    fn trigger_override(&self) -> Option<AssemblyTrigger> {
        match self {
            Self::Bilinear(op) => op.trigger_override,
            Self::Trilinear(op) => op.trigger_override,
            Self::Nonlinear(op) => op.trigger_override,
            Self::Rhs(op) => op.trigger_override,
            Self::LagrangeMultiplier(op) => op.trigger_override,
            Self::DiagonalPenalty(op) => op.trigger_override,
            Self::Copy(op) => op.trigger_override,
            Self::FvUpwindDivergence(op) => op.trigger_override(),
        }
    }

    fn default_trigger(&self) -> AssemblyTrigger {
        let time_dependent = |depends_on_time: bool| {
            if depends_on_time {
                AssemblyTrigger::EveryTimeStep
            } else {
                AssemblyTrigger::Once
            }
        };
        match self {
            Self::Bilinear(op) => time_dependent(op.action.depends_on_time()),
            Self::Trilinear(_) | Self::Nonlinear(_) | Self::Copy(_) => AssemblyTrigger::EveryIteration,
            Self::Rhs(op) => op.default_trigger(),
            Self::LagrangeMultiplier(op) => time_dependent(op.action.depends_on_time()),
            Self::DiagonalPenalty(_) => AssemblyTrigger::Once,
            Self::FvUpwindDivergence(_) => AssemblyTrigger::EveryIteration,
        }
    }

    /// Whether the contribution depends on the iterate of a block it writes to.
    pub fn is_nonlinear(&self) -> bool {
        match self {
            Self::Nonlinear(_) => true,
            Self::Trilinear(op) => op.argument.0 == op.trial.0 || op.argument.0 == op.test.0,
            Self::FvUpwindDivergence(op) => op.velocity() == op.block(),
            _ => false,
        }
    }

    /// Whether the contribution depends explicitly on time.
    pub fn is_time_dependent(&self) -> bool {
        match self {
            Self::Bilinear(op) => op.action.depends_on_time(),
            Self::Trilinear(op) => op.action.depends_on_time(),
            Self::Nonlinear(op) => op.action.depends_on_time(),
            Self::Rhs(op) => op.action.depends_on_time(),
            Self::LagrangeMultiplier(op) => op.action.depends_on_time(),
            Self::DiagonalPenalty(_) | Self::Copy(_) | Self::FvUpwindDivergence(_) => false,
        }
    }

    /// Adds the contribution of the operator to the system.
    pub fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        debug!("Assembling {} into blocks {:?}", self.name(), self.target_blocks());
        match self {
            Self::Bilinear(op) => op.assemble(system, context),
            Self::Trilinear(op) => op.assemble(system, context),
            Self::Nonlinear(op) => op.assemble(system, context),
            Self::Rhs(op) => op.assemble(system, context),
            Self::LagrangeMultiplier(op) => op.assemble(system, context),
            Self::DiagonalPenalty(op) => op.assemble(system, context),
            Self::Copy(op) => op.assemble(system, context),
            Self::FvUpwindDivergence(op) => op.assemble(system, context),
        }
    }
}

macro_rules! impl_from_operator {
    ($($variant:ident($operator:ident)),*) => {
        $(
            impl<T: Real> From<$operator<T>> for PdeOperator<T> {
                fn from(operator: $operator<T>) -> Self {
                    Self::$variant(operator)
                }
            }
        )*
    };
}

impl_from_operator!(
    Bilinear(BilinearOperator),
    Trilinear(TrilinearOperator),
    Nonlinear(NonlinearOperator),
    Rhs(RhsOperator),
    LagrangeMultiplier(LagrangeMultiplierOperator),
    DiagonalPenalty(DiagonalPenaltyOperator),
    Copy(CopyOperator),
    FvUpwindDivergence(FvUpwindDivergenceOperator)
);
