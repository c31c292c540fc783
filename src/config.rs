//! Pipeline constants and parameter presets.
//!
//! Every fingerprint in one catalog must be produced with the same sampling
//! rate and spectrogram geometry; these values are frozen here rather than
//! read from the environment so that ingest and query can never drift apart.

/// Target sampling rate for all decoded audio, in Hz.
pub const SAMPLING_RATE: u32 = 22050;

/// FFT window length in samples. Fixes the frequency resolution of the
/// spectrogram at `SAMPLING_RATE / WINDOW_SIZE` Hz per bin.
pub const WINDOW_SIZE: usize = 4096;

/// Fraction of each window shared with the next one.
pub const OVERLAP_RATIO: f64 = 0.5;

/// Replacement for non-finite log-power values. Frozen: changing it changes
/// every hash computed from near-silent audio.
pub const DB_FLOOR: f64 = -160.0;

/// Minimum peak amplitude in dB. Anything quieter is treated as noise.
pub const AMP_THRESHOLD_DB: f64 = -50.0;

/// Longest admissible gap between the two peaks of a hash pair, in seconds.
pub const MAX_HASH_TIME_DELTA: f64 = 200.0;

/// Tunable parameters for one run of the fingerprinting pipeline.
///
/// Ingest and query deliberately differ: a query accepts sparser peaks and a
/// much wider fan so a noisy microphone clip still produces enough candidate
/// pairs, while ingest keeps the stored index small.
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    pub window_size: usize,
    pub overlap_ratio: f64,
    pub neighborhood_size: usize,
    pub amp_threshold_db: f64,
    pub fan_value: usize,
}

impl PipelineParams {
    pub fn ingest() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            overlap_ratio: OVERLAP_RATIO,
            neighborhood_size: 20,
            amp_threshold_db: AMP_THRESHOLD_DB,
            fan_value: 30,
        }
    }

    pub fn query() -> Self {
        Self {
            neighborhood_size: 100,
            fan_value: 150,
            ..Self::ingest()
        }
    }

    /// Samples advanced between consecutive frames. The overlap is truncated
    /// to whole samples before subtraction; stored hashes depend on it.
    pub fn hop(&self) -> usize {
        self.window_size - (self.window_size as f64 * self.overlap_ratio) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_sparsity_knobs() {
        let ingest = PipelineParams::ingest();
        let query = PipelineParams::query();

        assert_eq!(ingest.window_size, query.window_size);
        assert_eq!(ingest.overlap_ratio, query.overlap_ratio);
        assert_eq!(ingest.amp_threshold_db, query.amp_threshold_db);
        assert_eq!(ingest.neighborhood_size, 20);
        assert_eq!(query.neighborhood_size, 100);
        assert_eq!(ingest.fan_value, 30);
        assert_eq!(query.fan_value, 150);
    }

    #[test]
    fn hop_is_half_the_window_at_default_overlap() {
        assert_eq!(PipelineParams::ingest().hop(), WINDOW_SIZE / 2);
    }
}
