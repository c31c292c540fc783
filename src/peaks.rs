use ndarray::Array2;
use ordered_float::OrderedFloat;
use tracing::debug;

/// A prominent cell of the spectrogram: a local maximum over the diamond
/// neighborhood that also clears the amplitude threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub freq_idx: usize,
    pub time_idx: usize,
    pub amp_db: f64,
}

// Grayscale dilation by the L1 ball of the given radius, realized as that
// many passes of the 4-connected cross. Cells outside the matrix never
// contribute to the maximum.
fn dilate_max(spec: &Array2<f64>, radius: usize) -> Array2<f64> {
    let (rows, cols) = spec.dim();
    let mut cur = spec.clone();
    let mut next = spec.clone();

    for _ in 0..radius {
        for f in 0..rows {
            for t in 0..cols {
                let mut m = cur[[f, t]];
                if f > 0 {
                    m = m.max(cur[[f - 1, t]]);
                }
                if f + 1 < rows {
                    m = m.max(cur[[f + 1, t]]);
                }
                if t > 0 {
                    m = m.max(cur[[f, t - 1]]);
                }
                if t + 1 < cols {
                    m = m.max(cur[[f, t + 1]]);
                }
                next[[f, t]] = m;
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }
    cur
}

// Binary erosion by the same ball. Cells outside the matrix count as set,
// the border_value = true convention, so flat regions touching the edge
// still erode to true.
fn erode(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    let mut cur = mask.clone();
    let mut next = mask.clone();

    for _ in 0..radius {
        for f in 0..rows {
            for t in 0..cols {
                let mut all = cur[[f, t]];
                if f > 0 {
                    all &= cur[[f - 1, t]];
                }
                if f + 1 < rows {
                    all &= cur[[f + 1, t]];
                }
                if t > 0 {
                    all &= cur[[f, t - 1]];
                }
                if t + 1 < cols {
                    all &= cur[[f, t + 1]];
                }
                next[[f, t]] = all;
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }
    cur
}

// Percentile with linear interpolation between order statistics.
fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by_key(|v| OrderedFloat(*v));

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

/// Extracts constellation peaks from a dB spectrogram.
///
/// A cell is kept when it equals the dilated maximum of its neighborhood
/// (ties admitted), is not part of the eroded low-energy background, and
/// exceeds `amp_threshold_db`. Peaks are emitted row-major over
/// `(freq_idx, time_idx)`; the hasher pairs adjacent peaks in exactly this
/// order, so it must not change.
pub fn find(spec: &Array2<f64>, neighborhood_size: usize, amp_threshold_db: f64) -> Vec<Peak> {
    let (rows, cols) = spec.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let dilated = dilate_max(spec, neighborhood_size);

    let flat: Vec<f64> = spec.iter().copied().collect();
    let background_threshold = percentile(&flat, 5.0);
    let background = spec.map(|&v| v <= background_threshold);
    let eroded = erode(&background, neighborhood_size);

    let mut peaks = Vec::new();
    for f in 0..rows {
        for t in 0..cols {
            let local_max = spec[[f, t]] == dilated[[f, t]];
            // XOR knocks out flat-low regions that tie with their own
            // dilation.
            if (local_max ^ eroded[[f, t]]) && spec[[f, t]] > amp_threshold_db {
                peaks.push(Peak {
                    freq_idx: f,
                    time_idx: t,
                    amp_db: spec[[f, t]],
                });
            }
        }
    }

    debug!(
        count = peaks.len(),
        threshold = background_threshold,
        "peaks extracted"
    );
    peaks
}
