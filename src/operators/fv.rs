use crate::action::ScalingAction;
use crate::assembly::{AssemblyRegions, BlockSystem, ItemIntegrator, QuadratureOrder};
use crate::element::FEType;
use crate::error::Error;
use crate::evaluate::DiffOperator;
use crate::operators::{AssemblyContext, AssemblyTrigger};
use crate::Real;
use log::debug;

/// First-order upwind discretization of `div(b u)` for a cellwise constant unknown `u`,
/// with the velocity `b` taken from the current iterate of another block.
///
/// The flux through a face is the integral of the velocity's normal component over the face,
/// oriented out of the face's first cell. Flux leaving a cell is taken from the cell's own
/// value. Outflow through the boundary leaves the domain; inflow through the boundary is
/// homogeneous.
#[derive(Debug, Clone)]
pub struct FvUpwindDivergenceOperator<T: Real> {
    block: usize,
    velocity: usize,
    factor: T,
    order: QuadratureOrder,
    trigger_override: Option<AssemblyTrigger>,
}

impl<T: Real> FvUpwindDivergenceOperator<T> {
    pub fn new(block: usize, velocity: usize) -> Self {
        Self {
            block,
            velocity,
            factor: T::one(),
            order: QuadratureOrder::Auto,
            trigger_override: None,
        }
    }

    pub fn with_factor(mut self, factor: T) -> Self {
        self.factor = factor;
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

    pub fn trigger_override(&self) -> Option<AssemblyTrigger> {
        self.trigger_override
    }

    pub fn block(&self) -> usize {
        self.block
    }

    pub fn velocity(&self) -> usize {
        self.velocity
    }

    pub(crate) fn assemble(&self, system: &mut BlockSystem<T>, context: &AssemblyContext<T>) -> eyre::Result<()> {
        let space = context.space(self.block)?;
        let mesh = space.mesh();
        if space.fe() != (FEType::L2P0 { ncomponents: 1 }) {
            return Err(Error::UnsupportedElement {
                fe: space.fe(),
                geometry: mesh.cell_geometry(0),
            }
            .into());
        }
        system.check_block_size(self.block, space.ndofs())?;

        let identity = ScalingAction::identity(1);
        let fluxes = ItemIntegrator::new(context.iterate(self.velocity)?, DiffOperator::NormalFlux, &identity)
            .with_regions(AssemblyRegions::faces())
            .with_quadrature_order(self.order)
            .with_time(context.time())
            .integrate_items()?;
        debug!("Computed upwind fluxes over {} faces", fluxes.ncols());

        let p = self.block;
        for face in 0..mesh.num_faces() {
            let flux = self.factor * fluxes[(0, face)];
            let (first, second) = mesh.face_cells(face);
            let k = space.cell_dofs(first)[0];
            match second.map(|cell| space.cell_dofs(cell)[0]) {
                Some(l) if flux > T::zero() => {
                    system.add_entry(p, p, k, k, flux)?;
                    system.add_entry(p, p, l, k, -flux)?;
                }
                Some(l) if flux < T::zero() => {
                    system.add_entry(p, p, l, l, -flux)?;
                    system.add_entry(p, p, k, l, flux)?;
                }
                None if flux > T::zero() => {
                    system.add_entry(p, p, k, k, flux)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
