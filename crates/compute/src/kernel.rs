//! Per-row escape-time computation.
//!
//! [`RowKernel`] is what the scheduler and the workers agree on: a grid of
//! `rows()` rows, `width()` values each, every value in `[0, max_value()]`.
//! [`EscapeTimeKernel`] is the Mandelbrot implementation used by the
//! binaries.

use mandelfarm_core::Geometry;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::ClusterError;

/// Escape radius squared.
const ESCAPE_NORM_SQ: f64 = 4.0;

/// Squared radius of the two convergent disks around `0` and `-1`.
const BULB_RADIUS_SQ: f64 = 0.0625;

/// A pure, deterministic computation of one grid row.
///
/// Implementations must be safe to call concurrently for different rows and
/// must return the same values every time they are called for a row.
pub trait RowKernel: Send + Sync + 'static {
    /// Number of rows in the grid.
    fn rows(&self) -> u32;

    /// Number of values in each row.
    fn width(&self) -> u32;

    /// Upper bound (inclusive) for every value.
    fn max_value(&self) -> u32;

    /// Compute row `row`, which is in `[0, rows())`.
    fn compute_row(&self, row: u32) -> Vec<u32>;

    /// Compute row `row` into `out`, which holds exactly `width()` cells.
    fn compute_row_into(&self, row: u32, out: &mut [u32]) {
        out.copy_from_slice(&self.compute_row(row));
    }
}

/// Mandelbrot escape counts over the fixed window `[-2, 1] x [-1.125, 1.125]`.
#[derive(Debug, Clone, Copy)]
pub struct EscapeTimeKernel {
    geometry: Geometry,
    shortcuts: bool,
}

impl EscapeTimeKernel {
    /// Kernel with the convergent-region shortcuts enabled.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            shortcuts: true,
        }
    }

    /// Kernel that iterates every pixel.
    pub fn brute_force(geometry: Geometry) -> Self {
        Self {
            geometry,
            shortcuts: false,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Escape count for the point `c = (re, im)`.
    pub fn escape_count(&self, re: f64, im: f64) -> u32 {
        let max_iter = self.geometry.max_iter();
        if self.shortcuts && in_convergent_region(re, im) {
            return max_iter;
        }
        iterate(re, im, max_iter)
    }
}

impl RowKernel for EscapeTimeKernel {
    fn rows(&self) -> u32 {
        self.geometry.height()
    }

    fn width(&self) -> u32 {
        self.geometry.width()
    }

    fn max_value(&self) -> u32 {
        self.geometry.max_iter()
    }

    fn compute_row(&self, row: u32) -> Vec<u32> {
        let mut out = vec![0; self.geometry.width() as usize];
        self.compute_row_into(row, &mut out);
        out
    }

    fn compute_row_into(&self, row: u32, out: &mut [u32]) {
        for (column, cell) in (0u32..).zip(out.iter_mut()) {
            let (re, im) = self.geometry.point(column, row);
            *cell = self.escape_count(re, im);
        }
    }
}

/// Whether `c` lies in the main cardioid or in one of the two disks of
/// radius 1/4 centred on `0` and `-1`. Points there never escape.
pub fn in_convergent_region(re: f64, im: f64) -> bool {
    if re * re + im * im < BULB_RADIUS_SQ {
        return true;
    }
    if (re + 1.0) * (re + 1.0) + im * im < BULB_RADIUS_SQ {
        return true;
    }
    if re > -0.75 && re < 0.5 {
        let ct_re = re - 0.25;
        let norm = (ct_re * ct_re + im * im).sqrt();
        if norm < 0.5 * (1.0 - ct_re / norm) {
            return true;
        }
    }
    false
}

/// Iterate `z <- z^2 + c` from `z = 0` while `|z|^2 < 4` and fewer than
/// `max_iter` steps were taken. Returns the step count.
pub fn iterate(re: f64, im: f64, max_iter: u32) -> u32 {
    let (mut zr, mut zi) = (0.0f64, 0.0f64);
    let mut steps = 0;
    while zr * zr + zi * zi < ESCAPE_NORM_SQ && steps < max_iter {
        let next_re = zr * zr - zi * zi + re;
        zi = 2.0 * zr * zi + im;
        zr = next_re;
        steps += 1;
    }
    steps
}

/// Compute every row of `kernel` on this process, splitting the grid into
/// disjoint rows across a rayon pool.
///
/// `threads == 0` means one thread per core. The returned buffer is in
/// computation order: row `r` occupies `[r * width, (r + 1) * width)`.
pub fn compute_all<K: RowKernel>(kernel: &K, threads: usize) -> Result<Vec<u32>, ClusterError> {
    let width = kernel.width() as usize;
    let rows = kernel.rows() as usize;
    let mut cells = vec![0u32; width * rows];
    if width == 0 {
        return Ok(cells);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ClusterError::Kernel(format!("failed to build thread pool: {e}")))?;
    info!(
        rows,
        width,
        threads = pool.current_num_threads(),
        "computing all rows locally"
    );

    pool.install(|| {
        cells
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, out)| kernel.compute_row_into(row as u32, out));
    });
    debug!(rows, "local computation finished");
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(w: u32, h: u32, k: u32) -> Geometry {
        Geometry::new(w, h, k).unwrap()
    }

    #[test]
    fn origin_never_escapes() {
        assert_eq!(iterate(0.0, 0.0, 100), 100);
        assert!(in_convergent_region(0.0, 0.0));
    }

    #[test]
    fn far_points_escape_immediately() {
        // |c|^2 = 8: one step takes z to c, which is already outside.
        assert_eq!(iterate(2.0, 2.0, 100), 1);
        assert!(!in_convergent_region(2.0, 2.0));
    }

    #[test]
    fn period_two_bulb_is_convergent() {
        assert!(in_convergent_region(-1.0, 0.0));
        assert_eq!(iterate(-1.0, 0.0, 500), 500);
    }

    #[test]
    fn cardioid_interior_is_convergent() {
        assert!(in_convergent_region(0.2, 0.3));
        assert!(!in_convergent_region(0.3, 0.6));
    }

    #[test]
    fn shortcuts_match_brute_force() {
        let g = geometry(96, 72, 256);
        let fast = EscapeTimeKernel::new(g);
        let slow = EscapeTimeKernel::brute_force(g);
        for row in 0..g.height() {
            assert_eq!(fast.compute_row(row), slow.compute_row(row), "row {row}");
        }
    }

    #[test]
    fn values_stay_within_budget() {
        let kernel = EscapeTimeKernel::new(geometry(4, 3, 50));
        for row in 0..3 {
            let values = kernel.compute_row(row);
            assert_eq!(values.len(), 4);
            assert!(values.iter().all(|&v| v <= 50));
        }
    }

    #[test]
    fn rows_are_idempotent() {
        let kernel = EscapeTimeKernel::new(geometry(32, 24, 100));
        assert_eq!(kernel.compute_row(11), kernel.compute_row(11));
    }

    #[test]
    fn window_is_symmetric_about_the_real_axis() {
        // Rows 0 and 2 sit at im = -1.125 and im = 1.125.
        let kernel = EscapeTimeKernel::new(geometry(17, 3, 64));
        assert_eq!(kernel.compute_row(0), kernel.compute_row(2));
    }

    #[test]
    fn parallel_matches_sequential() {
        let kernel = EscapeTimeKernel::new(geometry(40, 30, 128));
        let all = compute_all(&kernel, 3).unwrap();
        assert_eq!(all.len(), 40 * 30);
        for (row, chunk) in all.chunks(40).enumerate() {
            assert_eq!(chunk, kernel.compute_row(row as u32).as_slice());
        }
    }
}
