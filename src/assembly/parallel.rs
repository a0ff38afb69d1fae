//! Parallel assembly over groups of items with pairwise disjoint dofs.
//!
//! Items are colored so that no two items of the same color write to a common global index.
//! Within a color, local contributions are computed concurrently with worker-private
//! workspaces; the scatter into global storage is a sequential reduction in item order after
//! each color.
use crate::assembly::{ItemAssembler, ItemMatrixAssembler, ItemVectorAssembler, LocalMatrix, LocalVector};
use crate::connectivity::NestedTable;
use crate::Real;
use log::{debug, info};
use rayon::prelude::*;
use std::cell::RefCell;
use std::mem;
use thread_local::ThreadLocal;

/// Greedily partitions subsets of indices into colors such that the subsets within a color
/// are pairwise disjoint.
///
/// Returns, for each color, the indices of its subsets in increasing order.
pub fn sequential_greedy_coloring(subsets: &NestedTable<usize>) -> Vec<Vec<usize>> {
    let mut colors = Vec::new();
    let mut current: Vec<usize> = (0..subsets.len()).collect();
    let mut postponed = Vec::new();

    // The last color that touched each index, resized as larger indices show up
    let mut last_visited_color: Vec<Option<usize>> = Vec::new();

    let mut color_index = 0;
    while !current.is_empty() {
        let mut color = Vec::new();
        for &subset_index in &current {
            let subset = subsets.row(subset_index);
            let is_blocked = subset
                .iter()
                .any(|&i| last_visited_color.get(i).copied().flatten() == Some(color_index));
            if is_blocked {
                postponed.push(subset_index);
            } else {
                for &i in subset {
                    if i >= last_visited_color.len() {
                        // Amortize resizes
                        last_visited_color.resize(2 * i + 1, None);
                    }
                    last_visited_color[i] = Some(color_index);
                }
                color.push(subset_index);
            }
        }
        colors.push(color);
        mem::swap(&mut postponed, &mut current);
        postponed.clear();
        color_index += 1;
    }
    colors
}

/// Colors the items of an assembler by the global indices they write to.
///
/// The colors contain item indices (not positions in [`ItemAssembler::items`]).
pub fn color_items<A: ?Sized + ItemAssembler>(assembler: &A) -> Vec<Vec<usize>> {
    let mut dofs = Vec::new();
    let mut subsets = NestedTable::new();
    for &item in assembler.items() {
        assembler.populate_item_dofs(item, &mut dofs);
        subsets.push(&dofs);
    }
    let items = assembler.items();
    let colors: Vec<Vec<usize>> = sequential_greedy_coloring(&subsets)
        .into_iter()
        .map(|color| color.into_iter().map(|i| items[i]).collect())
        .collect();
    info!(
        "Partitioned {} items of {} into {} colors",
        items.len(),
        assembler.name(),
        colors.len()
    );
    colors
}

/// Parallel counterpart of [`assemble_matrix`](crate::assembly::assemble_matrix).
///
/// The result equals the sequential pass up to the summation order of shared entries.
pub fn par_assemble_matrix<T, A>(
    assembler: &A,
    colors: &[Vec<usize>],
    mut scatter: impl FnMut(&LocalMatrix<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ?Sized + ItemMatrixAssembler<T>,
{
    debug!("Assembling matrix of {} in parallel over {} colors", assembler.name(), colors.len());
    let workspaces = ThreadLocal::new();
    // Configuration errors surface here, before any worker starts
    workspaces.get_or_try(|| assembler.create_workspace().map(RefCell::new))?;
    for color in colors {
        let locals = color
            .par_iter()
            .map(|&item| {
                let workspace = workspaces.get_or_try(|| assembler.create_workspace().map(RefCell::new))?;
                let mut local = LocalMatrix::default();
                assembler.assemble_item_matrix(&mut workspace.borrow_mut(), item, &mut local)?;
                Ok(local)
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        for local in &locals {
            scatter(local)?;
        }
    }
    debug!("Finished parallel matrix assembly of {}", assembler.name());
    Ok(())
}

/// Parallel counterpart of [`assemble_vector`](crate::assembly::assemble_vector).
pub fn par_assemble_vector<T, A>(
    assembler: &A,
    colors: &[Vec<usize>],
    mut scatter: impl FnMut(&LocalVector<T>) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    T: Real,
    A: ?Sized + ItemVectorAssembler<T>,
{
    debug!("Assembling vector of {} in parallel over {} colors", assembler.name(), colors.len());
    let workspaces = ThreadLocal::new();
    workspaces.get_or_try(|| assembler.create_workspace().map(RefCell::new))?;
    for color in colors {
        let locals = color
            .par_iter()
            .map(|&item| {
                let workspace = workspaces.get_or_try(|| assembler.create_workspace().map(RefCell::new))?;
                let mut local = LocalVector::default();
                assembler.assemble_item_vector(&mut workspace.borrow_mut(), item, &mut local)?;
                Ok(local)
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        for local in &locals {
            scatter(local)?;
        }
    }
    debug!("Finished parallel vector assembly of {}", assembler.name());
    Ok(())
}
