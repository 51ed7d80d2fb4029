//! Triangulated vertex lattice over the photo plane.
//!
//! The lattice is a regular grid with every odd row shifted right by half a
//! cell and shortened by one vertex, giving alternating triangular
//! connectivity instead of a plain rectangular grid. Each vertex samples the
//! smoothed depth grid through a bilinear interpolant and is displaced along
//! the view axis, with its planar position scaled as a function of depth.

use anyhow::{bail, Result};

use crate::smooth::Grid;

/// Depth divisor for the view-axis displacement.
const Z_SCALE: f64 = 24.0;

/// Depth divisor for the radial (planar) scale.
const R_SCALE: f64 = 128.0;

/// Bilinear interpolant over a grid addressed by normalized coordinates in
/// `[0,1] x [0,1]` (row axis first, then column axis).
pub struct Interp<'a> {
    grid: &'a Grid,
}

impl<'a> Interp<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self { grid }
    }

    /// Sample between the four nearest grid values. Queries outside `[0,1]`
    /// mean the lattice and the grid disagree, which is a bug, not a
    /// recoverable condition.
    pub fn sample(&self, y: f64, x: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&y) || !(0.0..=1.0).contains(&x) {
            bail!("interpolation query ({y}, {x}) outside [0,1]x[0,1]");
        }

        let fy = y * (self.grid.rows - 1) as f64;
        let fx = x * (self.grid.columns - 1) as f64;

        let r0 = (fy as usize).min(self.grid.rows - 2);
        let c0 = (fx as usize).min(self.grid.columns - 2);
        let ry = fy - r0 as f64;
        let rx = fx - c0 as f64;

        let top = self.grid.get(r0, c0) * (1.0 - rx) + self.grid.get(r0, c0 + 1) * rx;
        let bottom = self.grid.get(r0 + 1, c0) * (1.0 - rx) + self.grid.get(r0 + 1, c0 + 1) * rx;

        Ok(top * (1.0 - ry) + bottom * ry)
    }
}

/// The vertex lattice plus the division counts needed for face emission.
#[derive(Debug)]
pub struct Lattice {
    /// Column divisions.
    pub vx: usize,
    /// Row divisions, always even.
    pub vy: usize,
    pub vertices: Vec<[f64; 3]>,
    pub uvs: Vec<[f64; 2]>,
}

/// Number of vertices in lattice row `j` (odd rows are one short).
#[inline]
pub fn row_len(vx: usize, j: usize) -> usize {
    vx + 1 - (j % 2)
}

/// 1-based index of the first vertex in lattice row `j`.
#[inline]
pub fn row_start(vx: usize, j: usize) -> usize {
    1 + j * (vx + 1) - j / 2
}

/// Total vertex count for `vx` column and `vy` row divisions.
#[inline]
pub fn vertex_count(vx: usize, vy: usize) -> usize {
    (vy + 1) * (vx + 1) - vy / 2
}

/// Build the lattice over the aspect-ratio-normalized plane.
///
/// The longer image dimension maps to the unit half-extent; the shorter one
/// scales proportionally, so aspect ratio is preserved for both landscape
/// and portrait input.
pub fn build_lattice(grid: &Grid, width: u32, height: u32, mesh: usize) -> Result<Lattice> {
    if mesh < 2 {
        bail!("mesh resolution must be at least 2, got {mesh}");
    }
    if grid.rows < 2 || grid.columns < 2 {
        bail!(
            "depth grid {}x{} too small to interpolate",
            grid.rows,
            grid.columns
        );
    }

    let xlim = (width as f64 / height as f64).max(1.0);
    let ylim = (height as f64 / width as f64).max(1.0);

    let vx = mesh;
    let vy = mesh - mesh % 2;

    let interp = Interp::new(grid);
    let mut vertices = Vec::with_capacity(vertex_count(vx, vy));
    let mut uvs = Vec::with_capacity(vertex_count(vx, vy));

    for j in 0..=vy {
        let odd = j % 2;
        let y = ylim - 2.0 * j as f64 * ylim / vy as f64;
        let ty = 1.0 - j as f64 / vy as f64;

        for i in 0..=(vx - odd) {
            let x = (2 * i + odd) as f64 * xlim / vx as f64 - xlim;
            let tx = (i as f64 + odd as f64 / 2.0) / vx as f64;

            let d = interp.sample(1.0 - ty, 1.0 - tx)?;
            let r = 1.0 + d / R_SCALE;

            vertices.push([x * r, y * r, -d / Z_SCALE]);
            uvs.push([tx, ty]);
        }
    }

    Ok(Lattice {
        vx,
        vy,
        vertices,
        uvs,
    })
}

/// Emit the triangle index list, 1-based.
///
/// Walks row pairs: one full row of `vx+1` vertices, the offset row of `vx`
/// below it, then the next full row. Two triangles per cell against the
/// offset row, plus two closing triangles per pair because adjacent row
/// lengths differ by one vertex.
pub fn faces(vx: usize, vy: usize) -> Vec<[usize; 3]> {
    let mut out = Vec::new();
    let mut full_top = 1usize;

    for _ in 0..vy / 2 {
        let offset_top = full_top + vx + 1;

        for i in 0..vx {
            out.push([full_top + i, full_top + i + 1, offset_top + i]);
            if i > 0 {
                out.push([offset_top + i - 1, offset_top + i, full_top + i]);
            }
        }

        // Stitch the row boundary on both ends.
        out.push([full_top, offset_top, offset_top + vx]);
        out.push([offset_top - 1, offset_top + vx - 1, offset_top + vx * 2]);

        full_top = offset_top + vx;

        for i in 0..vx {
            out.push([full_top + i, full_top + i + 1, offset_top + i]);
            if i > 0 {
                out.push([offset_top + i - 1, offset_top + i, full_top + i]);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(rows: usize, columns: usize, value: f64) -> Grid {
        Grid::new(rows, columns, vec![value; rows * columns])
    }

    #[test]
    fn row_indexing_is_consistent() {
        for vx in 2..=9 {
            for vy in (2..=8).step_by(2) {
                assert_eq!(row_start(vx, 0), 1);

                for j in 0..vy {
                    assert_eq!(row_start(vx, j) + row_len(vx, j), row_start(vx, j + 1));
                }

                let total: usize = (0..=vy).map(|j| row_len(vx, j)).sum();
                assert_eq!(total, vertex_count(vx, vy));
            }
        }
    }

    #[test]
    fn lattice_has_expected_vertex_count() {
        let grid = flat_grid(2, 2, 0.0);

        for mesh in [2, 3, 4, 5, 8] {
            let lattice = build_lattice(&grid, 100, 100, mesh).unwrap();
            let vy = mesh - mesh % 2;
            assert_eq!(lattice.vertices.len(), vertex_count(mesh, vy));
            assert_eq!(lattice.uvs.len(), lattice.vertices.len());
        }
    }

    #[test]
    fn uvs_stay_in_unit_square() {
        let grid = flat_grid(3, 4, 128.0);
        let lattice = build_lattice(&grid, 640, 480, 7).unwrap();

        for [tx, ty] in &lattice.uvs {
            assert!((0.0..=1.0).contains(tx), "tx = {tx}");
            assert!((0.0..=1.0).contains(ty), "ty = {ty}");
        }
    }

    #[test]
    fn zero_depth_gives_flat_unscaled_plane() {
        let grid = flat_grid(2, 2, 0.0);
        let lattice = build_lattice(&grid, 200, 100, 4).unwrap();

        // xlim = 2, ylim = 1 for a 2:1 landscape photo.
        for [x, y, z] in &lattice.vertices {
            assert_eq!(*z, 0.0);
            assert!((-2.0..=2.0).contains(x));
            assert!((-1.0..=1.0).contains(y));
        }

        // r = 1 means the corners sit exactly on the limits.
        assert_eq!(lattice.vertices[0], [-2.0, 1.0, 0.0]);
    }

    #[test]
    fn constant_depth_displaces_uniformly() {
        let grid = flat_grid(2, 2, 48.0);
        let lattice = build_lattice(&grid, 100, 100, 2).unwrap();

        for [_, _, z] in &lattice.vertices {
            assert!((z + 2.0).abs() < 1e-12); // -48/24
        }
    }

    #[test]
    fn bilinear_sample_matches_hand_computed_values() {
        let grid = Grid::new(2, 2, vec![0.0, 0.0, 10.0, 10.0]);
        let interp = Interp::new(&grid);

        assert!((interp.sample(0.0, 0.5).unwrap() - 0.0).abs() < 1e-12);
        assert!((interp.sample(1.0, 0.5).unwrap() - 10.0).abs() < 1e-12);
        assert!((interp.sample(0.5, 0.25).unwrap() - 5.0).abs() < 1e-12);
        assert!((interp.sample(0.25, 1.0).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_sample_is_an_error() {
        let grid = flat_grid(2, 2, 1.0);
        let interp = Interp::new(&grid);

        assert!(interp.sample(-0.01, 0.5).is_err());
        assert!(interp.sample(0.5, 1.01).is_err());
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let grid = flat_grid(1, 5, 0.0);
        assert!(build_lattice(&grid, 100, 100, 4).is_err());
    }

    #[test]
    fn face_indices_stay_in_bounds_for_small_meshes() {
        for vx in 2..=8 {
            let vy = vx - vx % 2;
            let count = vertex_count(vx, vy);

            let faces = faces(vx, vy);
            assert!(!faces.is_empty());

            for [a, b, c] in &faces {
                for &index in &[*a, *b, *c] {
                    assert!(
                        (1..=count).contains(&index),
                        "vx={vx}: face index {index} outside 1..={count}"
                    );
                }
                assert!(a != b && b != c && a != c);
            }
        }
    }

    #[test]
    fn face_count_matches_row_pair_walk() {
        // Per row pair: 2*(2*vx - 1) cell triangles + 2 closing triangles.
        for vx in [2usize, 3, 4, 7] {
            let vy = vx - vx % 2;
            let expected = (vy / 2) * (2 * (2 * vx - 1) + 2);
            assert_eq!(faces(vx, vy).len(), expected);
        }
    }
}
