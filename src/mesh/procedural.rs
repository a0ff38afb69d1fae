//! Basic procedural mesh generation routines.
//!
//! Boundary faces are tagged with regions numbered from 1, interior faces with region 0.
use crate::connectivity::NestedTable;
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::mesh::Mesh;
use crate::Real;
use nalgebra::{DMatrix, DVectorView};
use numeric_literals::replace_float_literals;

fn grid_coordinate<T: Real>(i: usize, cells_per_dim: usize) -> T {
    let i = T::from_usize(i).expect("Must be able to fit usize in T");
    let n = T::from_usize(cells_per_dim).expect("Must be able to fit usize in T");
    i / n
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn is_close<T: Real>(a: T, b: T) -> bool {
    (a - b).abs() < 1e-10
}

/// Creates a uniform mesh of the unit interval. The left end is region 1, the right end region 2.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn create_unit_interval_uniform_mesh_1d<T: Real>(cells: usize) -> Result<Mesh<T>, Error> {
    let coordinates = DMatrix::from_fn(1, cells + 1, |_, i| grid_coordinate(i, cells));
    let connectivity: Vec<Vec<usize>> = (0..cells).map(|i| vec![i, i + 1]).collect();
    let mesh = Mesh::try_new(coordinates, vec![ReferenceGeometry::Edge; cells], connectivity.into())?;
    Ok(mesh.with_boundary_regions(|x| if is_close(x[0], 0.0) { 1 } else { 2 }))
}

fn unit_square_coordinates<T: Real>(cells_per_dim: usize) -> DMatrix<T> {
    let n = cells_per_dim + 1;
    DMatrix::from_fn(2, n * n, |d, v| {
        let (i, j) = (v % n, v / n);
        grid_coordinate(if d == 0 { i } else { j }, cells_per_dim)
    })
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn unit_square_boundary_region<T: Real>(x: DVectorView<T>) -> usize {
    if is_close(x[1], 0.0) {
        1
    } else if is_close(x[0], 1.0) {
        2
    } else if is_close(x[1], 1.0) {
        3
    } else {
        4
    }
}

/// Creates a uniform quadrilateral mesh of the unit square.
///
/// Boundary regions are numbered counter-clockwise starting at the bottom:
/// bottom 1, right 2, top 3, left 4.
pub fn create_unit_square_uniform_quad_mesh_2d<T: Real>(cells_per_dim: usize) -> Result<Mesh<T>, Error> {
    let n = cells_per_dim + 1;
    let mut connectivity = NestedTable::new();
    for j in 0..cells_per_dim {
        for i in 0..cells_per_dim {
            let v = |di: usize, dj: usize| (j + dj) * n + i + di;
            connectivity.push(&[v(0, 0), v(1, 0), v(1, 1), v(0, 1)]);
        }
    }
    let num_cells = connectivity.len();
    let mesh = Mesh::try_new(
        unit_square_coordinates(cells_per_dim),
        vec![ReferenceGeometry::Quadrilateral; num_cells],
        connectivity,
    )?;
    Ok(mesh.with_boundary_regions(unit_square_boundary_region))
}

/// Creates a uniform triangle mesh of the unit square, splitting each square along its diagonal.
///
/// Boundary regions are as for [`create_unit_square_uniform_quad_mesh_2d`].
pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> Result<Mesh<T>, Error> {
    let n = cells_per_dim + 1;
    let mut connectivity = NestedTable::new();
    for j in 0..cells_per_dim {
        for i in 0..cells_per_dim {
            let v = |di: usize, dj: usize| (j + dj) * n + i + di;
            connectivity.push(&[v(0, 0), v(1, 0), v(1, 1)]);
            connectivity.push(&[v(0, 0), v(1, 1), v(0, 1)]);
        }
    }
    let num_cells = connectivity.len();
    let mesh = Mesh::try_new(
        unit_square_coordinates(cells_per_dim),
        vec![ReferenceGeometry::Triangle; num_cells],
        connectivity,
    )?;
    Ok(mesh.with_boundary_regions(unit_square_boundary_region))
}

fn unit_box_coordinates<T: Real>(cells_per_dim: usize) -> DMatrix<T> {
    let n = cells_per_dim + 1;
    DMatrix::from_fn(3, n * n * n, |d, v| {
        let index = [v % n, (v / n) % n, v / (n * n)];
        grid_coordinate(index[d], cells_per_dim)
    })
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn unit_box_boundary_region<T: Real>(x: DVectorView<T>) -> usize {
    if is_close(x[2], 0.0) {
        1
    } else if is_close(x[1], 0.0) {
        2
    } else if is_close(x[0], 1.0) {
        3
    } else if is_close(x[1], 1.0) {
        4
    } else if is_close(x[0], 0.0) {
        5
    } else {
        6
    }
}

/// Creates a uniform hexahedral mesh of the unit cube.
///
/// Boundary regions: bottom (`z = 0`) 1, front (`y = 0`) 2, right (`x = 1`) 3,
/// back (`y = 1`) 4, left (`x = 0`) 5, top (`z = 1`) 6.
pub fn create_unit_box_uniform_hex_mesh_3d<T: Real>(cells_per_dim: usize) -> Result<Mesh<T>, Error> {
    let n = cells_per_dim + 1;
    let mut connectivity = NestedTable::new();
    for k in 0..cells_per_dim {
        for j in 0..cells_per_dim {
            for i in 0..cells_per_dim {
                let v = |di: usize, dj: usize, dk: usize| ((k + dk) * n + j + dj) * n + i + di;
                #[rustfmt::skip]
                let hex = [
                    v(0, 0, 0), v(1, 0, 0), v(1, 1, 0), v(0, 1, 0),
                    v(0, 0, 1), v(1, 0, 1), v(1, 1, 1), v(0, 1, 1),
                ];
                connectivity.push(&hex);
            }
        }
    }
    let num_cells = connectivity.len();
    let mesh = Mesh::try_new(
        unit_box_coordinates(cells_per_dim),
        vec![ReferenceGeometry::Hexahedron; num_cells],
        connectivity,
    )?;
    Ok(mesh.with_boundary_regions(unit_box_boundary_region))
}

/// Axis permutations of the Kuhn subdivision of the cube, with their parity.
const KUHN_PERMUTATIONS: [([usize; 3], bool); 6] = [
    ([0, 1, 2], true),
    ([1, 2, 0], true),
    ([2, 0, 1], true),
    ([0, 2, 1], false),
    ([2, 1, 0], false),
    ([1, 0, 2], false),
];

/// Creates a uniform tetrahedral mesh of the unit cube by splitting each cube into six
/// tetrahedra sharing the main diagonal.
///
/// Boundary regions are as for [`create_unit_box_uniform_hex_mesh_3d`].
pub fn create_unit_box_uniform_tet_mesh_3d<T: Real>(cells_per_dim: usize) -> Result<Mesh<T>, Error> {
    let n = cells_per_dim + 1;
    let mut connectivity = NestedTable::new();
    for k in 0..cells_per_dim {
        for j in 0..cells_per_dim {
            for i in 0..cells_per_dim {
                let v = |offset: [usize; 3]| ((k + offset[2]) * n + j + offset[1]) * n + i + offset[0];
                for (axes, even) in KUHN_PERMUTATIONS {
                    let mut offset = [0, 0, 0];
                    let mut tet = [v(offset), 0, 0, 0];
                    for (m, &axis) in axes.iter().enumerate() {
                        offset[axis] = 1;
                        tet[m + 1] = v(offset);
                    }
                    // Odd permutations yield negatively oriented tetrahedra
                    if !even {
                        tet.swap(2, 3);
                    }
                    connectivity.push(&tet);
                }
            }
        }
    }
    let num_cells = connectivity.len();
    let mesh = Mesh::try_new(
        unit_box_coordinates(cells_per_dim),
        vec![ReferenceGeometry::Tetrahedron; num_cells],
        connectivity,
    )?;
    Ok(mesh.with_boundary_regions(unit_box_boundary_region))
}

/// Creates a mesh consisting of the reference cell of the given geometry only.
pub fn create_reference_mesh<T: Real>(geometry: ReferenceGeometry) -> Result<Mesh<T>, Error> {
    let nodes = geometry.reference_nodes();
    let dim = geometry.dim().max(1);
    let coordinates = DMatrix::from_fn(dim, nodes.len(), |i, k| T::from_tabulated(nodes[k][i]));
    let connectivity = NestedTable::from(vec![(0..nodes.len()).collect::<Vec<_>>()]);
    Mesh::try_new(coordinates, vec![geometry], connectivity)
}
