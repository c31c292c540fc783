use ndarray::Array2;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;
use tracing::debug;

use crate::config::DB_FLOOR;

/// Log-power time-frequency matrix plus its axes.
///
/// `data` is indexed `[freq_bin, frame]` and holds `10 * log10(power)` with
/// non-finite values clamped to `DB_FLOOR`. `freqs` and `times` carry the
/// physical coordinates of the rows and columns.
pub struct Spectrogram {
    pub data: Array2<f64>,
    pub freqs: Vec<f64>,
    pub times: Vec<f64>,
}

impl Spectrogram {
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }
}

// Symmetric Hann window, the np.hanning convention.
fn hann_window(window_size: usize) -> Vec<f64> {
    if window_size < 2 {
        return vec![1.0; window_size];
    }
    (0..window_size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (window_size - 1) as f64).cos()))
        .collect()
}

/// Builds the STFT magnitude spectrogram of a mono PCM signal.
///
/// Frames of `window_size` samples advance by `window_size - trunc(window_size
/// * overlap_ratio)`; a trailing partial frame is dropped. PCM shorter than a
/// single window yields a spectrogram with zero columns, which downstream
/// stages turn into an empty fingerprint.
pub fn build(pcm: &[f32], sample_rate: u32, window_size: usize, overlap_ratio: f64) -> Spectrogram {
    let hop = window_size - (window_size as f64 * overlap_ratio) as usize;
    let n_bins = window_size / 2 + 1;

    let freqs: Vec<f64> = (0..n_bins)
        .map(|f| f as f64 * sample_rate as f64 / window_size as f64)
        .collect();

    let n_frames = if pcm.len() >= window_size {
        (pcm.len() - window_size) / hop + 1
    } else {
        0
    };
    let times: Vec<f64> = (0..n_frames)
        .map(|t| (t * hop + window_size / 2) as f64 / sample_rate as f64)
        .collect();

    let mut data = Array2::from_elem((n_bins, n_frames), DB_FLOOR);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(window_size);
    let window = hann_window(window_size);
    let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); window_size];

    for t in 0..n_frames {
        let start = t * hop;
        for (j, &sample) in pcm[start..start + window_size].iter().enumerate() {
            buffer[j] = Complex::new(sample as f64 * window[j], 0.0);
        }

        fft.process(&mut buffer);

        for f in 0..n_bins {
            let power = buffer[f].norm_sqr();
            let db = 10.0 * power.log10();
            // 10*log10(0) is -inf; clamp so every cell stays comparable.
            data[[f, t]] = if db.is_finite() { db } else { DB_FLOOR };
        }
    }

    debug!(frames = n_frames, bins = n_bins, "spectrogram built");

    Spectrogram { data, freqs, times }
}
