//! Depth grid smoothing.
//!
//! The depth samples come out of the marker with visible block-encoding
//! artifacts. Two ways to suppress them: the default iterated box-ish
//! convolution with tolerance clipping after every pass, or a single
//! gaussian blur pass.

use edof::DepthMap;

/// A row-major grid of f64 depth values. Shape is fixed at construction;
/// smoothing always produces a same-shape grid.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: usize,
    pub columns: usize,
    data: Vec<f64>,
}

impl Grid {
    pub fn new(rows: usize, columns: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * columns);
        Self {
            rows,
            columns,
            data,
        }
    }

    /// Widen a decoded depth map's u8 samples to f64.
    pub fn from_depth_map(map: &DepthMap) -> Self {
        Self {
            rows: map.rows,
            columns: map.columns,
            data: map.samples().iter().map(|&s| s as f64).collect(),
        }
    }

    #[inline]
    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.data[row * self.columns + column]
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

/// Normalized 5x5 separable kernel [1,2,3,2,1] x [1,2,3,2,1] / 81.
const KERNEL_1D: [f64; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];
const KERNEL_NORM: f64 = 81.0;

/// One 5x5 weighted-average pass with toroidal (wrap) boundary handling.
fn convolve_wrap(grid: &Grid) -> Grid {
    let (rows, columns) = (grid.rows, grid.columns);
    let mut out = Vec::with_capacity(rows * columns);

    for row in 0..rows {
        for column in 0..columns {
            let mut sum = 0.0;

            for (dy, wy) in KERNEL_1D.iter().enumerate() {
                let r = (row as isize + dy as isize - 2).rem_euclid(rows as isize) as usize;

                for (dx, wx) in KERNEL_1D.iter().enumerate() {
                    let c = (column as isize + dx as isize - 2).rem_euclid(columns as isize)
                        as usize;
                    sum += wy * wx * grid.get(r, c);
                }
            }

            out.push(sum / KERNEL_NORM);
        }
    }

    Grid::new(rows, columns, out)
}

/// Iterated blur-then-clip smoothing.
///
/// After every pass each value is clipped back into
/// `[original - range, original + range]`, which keeps strong depth
/// discontinuities from diffusing away while the blur removes block noise.
pub fn convolve_clipped(original: &Grid, passes: u32, range: f64) -> Grid {
    let mut current = original.clone();

    for _ in 0..passes {
        let blurred = convolve_wrap(&current);
        let clipped = blurred
            .values()
            .iter()
            .zip(original.values())
            .map(|(&v, &orig)| v.clamp(orig - range, orig + range))
            .collect();
        current = Grid::new(original.rows, original.columns, clipped);
    }

    current
}

/// Reflected boundary index: (d c b a | a b c d | d c b a).
fn reflect(mut index: isize, len: isize) -> usize {
    loop {
        if index < 0 {
            index = -index - 1;
        } else if index >= len {
            index = 2 * len - 1 - index;
        } else {
            return index as usize;
        }
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    // Truncate at 4 sigma.
    let radius = (4.0 * sigma + 0.5) as isize;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);

    for k in -radius..=radius {
        let x = k as f64;
        kernel.push((-x * x / (2.0 * sigma * sigma)).exp());
    }

    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }

    kernel
}

/// One isotropic gaussian blur pass, separable, reflected boundaries.
/// No clipping afterward.
pub fn gaussian(grid: &Grid, sigma: f64) -> Grid {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let (rows, columns) = (grid.rows, grid.columns);

    // Along rows (vertical axis).
    let mut vertical = vec![0.0; rows * columns];
    for row in 0..rows {
        for column in 0..columns {
            let mut sum = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let r = reflect(row as isize + k as isize - radius, rows as isize);
                sum += w * grid.get(r, column);
            }
            vertical[row * columns + column] = sum;
        }
    }
    let vertical = Grid::new(rows, columns, vertical);

    // Along columns (horizontal axis).
    let mut out = Vec::with_capacity(rows * columns);
    for row in 0..rows {
        for column in 0..columns {
            let mut sum = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let c = reflect(column as isize + k as isize - radius, columns as isize);
                sum += w * vertical.get(row, c);
            }
            out.push(sum);
        }
    }

    Grid::new(rows, columns, out)
}
