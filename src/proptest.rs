//! Strategies for property-based testing.
use crate::connectivity::NestedTable;
use crate::geometry::ReferenceGeometry;
use crate::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use crate::mesh::Mesh;
use ::proptest::collection::{btree_set, vec, SizeRange};
use ::proptest::prelude::*;
use nalgebra::{DMatrix, DVector, Point2};

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates in a moderate range so that element geometry stays well conditioned
    let range = -10.0..10.0;
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// A mesh consisting of a single counter-clockwise triangle with bounded aspect ratio.
pub fn affine_triangle_mesh() -> impl Strategy<Value = Mesh<f64>> {
    [point2(), point2(), point2()].prop_filter_map("degenerate triangle", |[a, b, c]| {
        let (ab, ac) = (b - a, c - a);
        let twice_area = ab.x * ac.y - ab.y * ac.x;
        let longest = ab.norm().max(ac.norm()).max((c - b).norm());
        if twice_area.abs() < 0.1 * longest * longest {
            return None;
        }
        let (b, c) = if twice_area > 0.0 { (b, c) } else { (c, b) };
        let coordinates = DMatrix::from_columns(&[a.coords, b.coords, c.coords].map(|v| DVector::from_column_slice(v.as_slice())));
        Mesh::try_new(
            coordinates,
            vec![ReferenceGeometry::Triangle],
            NestedTable::from(vec![vec![0, 1, 2]]),
        )
        .ok()
    })
}

/// A triangulation of the unit square with `1..=max_cells_per_dim` cells per side, with
/// interior nodes randomly displaced by at most a fifth of the grid spacing per coordinate.
/// All boundary faces carry the default region.
pub fn perturbed_unit_square_tri_mesh(max_cells_per_dim: usize) -> impl Strategy<Value = Mesh<f64>> {
    (1..=max_cells_per_dim.max(1))
        .prop_flat_map(|cells_per_dim| {
            let num_nodes = (cells_per_dim + 1) * (cells_per_dim + 1);
            (Just(cells_per_dim), vec([-0.2..0.2, -0.2..0.2], num_nodes))
        })
        .prop_map(|(cells_per_dim, displacements)| {
            let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(cells_per_dim)
                .expect("Uniform unit square mesh must be valid");
            let h = 1.0 / cells_per_dim as f64;
            let mut coordinates = mesh.coordinates().clone();
            for (mut x, [dx, dy]) in coordinates.column_iter_mut().zip(displacements) {
                let on_boundary = x
                    .iter()
                    .any(|&xi| xi.abs() < 1e-12 || (xi - 1.0).abs() < 1e-12);
                if !on_boundary {
                    x[0] += h * dx;
                    x[1] += h * dy;
                }
            }
            let cell_nodes = NestedTable::from(
                (0..mesh.num_cells())
                    .map(|cell| mesh.cell_nodes(cell).to_vec())
                    .collect::<Vec<_>>(),
            );
            Mesh::try_new(coordinates, mesh.cell_geometries(), cell_nodes)
                .expect("Small interior perturbations must keep the mesh valid")
        })
}

/// Tables of `num_rows` rows, each a set of distinct indices smaller than `max_index`.
pub fn index_sets(num_rows: impl Into<SizeRange>, max_index: usize, max_row_len: usize) -> impl Strategy<Value = NestedTable<usize>> {
    let max_index = max_index.max(1);
    vec(btree_set(0..max_index, 0..=max_row_len.min(max_index)), num_rows).prop_map(|rows| {
        let mut table = NestedTable::new();
        for row in rows {
            table.push_iter(row);
        }
        table
    })
}
