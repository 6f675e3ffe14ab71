//! Focus (sharpness) metric from the variance of the Laplacian

use ndarray::Array2;

/// Score written when focus scoring is disabled or an image falls back
pub const NEUTRAL_SHARPNESS: f64 = 1000.0;

/// What to do when an image cannot be scored
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FocusPolicy {
    /// Abort the run on the first unreadable image
    #[default]
    Strict,
    /// Substitute the given score for unreadable images and keep going
    Fallback(f64),
    /// Do not read images at all; every frame gets the neutral score
    Skip,
}

/// Aperture-3 Laplacian kernel
const KERNEL: [[f64; 3]; 3] = [[2.0, 0.0, 2.0], [0.0, -8.0, 0.0], [2.0, 0.0, 2.0]];

/// Mirror an out-of-range index back into `0..n` without repeating the edge sample
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * (n - 1) - i;
        }
    }
    i as usize
}

/// Second-derivative response of a single-channel image.
///
/// Borders are reflected without duplicating the edge row/column.
pub fn laplacian(image: &Array2<f32>) -> Array2<f64> {
    let (rows, cols) = image.dim();

    Array2::from_shape_fn((rows, cols), |(y, x)| {
        let mut acc = 0.0;
        for (ky, row) in KERNEL.iter().enumerate() {
            let sy = reflect101(y as isize + ky as isize - 1, rows);
            for (kx, &w) in row.iter().enumerate() {
                if w == 0.0 {
                    continue;
                }
                let sx = reflect101(x as isize + kx as isize - 1, cols);
                acc += w * image[[sy, sx]] as f64;
            }
        }
        acc
    })
}

/// Population variance of the Laplacian response. Higher is sharper.
pub fn laplacian_variance(image: &Array2<f32>) -> f64 {
    if image.is_empty() {
        return 0.0;
    }

    let response = laplacian(image);
    let n = response.len() as f64;
    let mean = response.sum() / n;
    let variance = response.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    variance.max(0.0)
}
