use tracing::debug;

use crate::config::{MAX_HASH_TIME_DELTA, PipelineParams};
use crate::matcher::SongId;
use crate::peaks::{self, Peak};
use crate::spectrogram;

/// One constellation landmark: the textual hash of a peak pair plus the
/// anchor peak's absolute time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub hash: String,
    pub offset: f64,
}

/// Ordered collection of hash pairs, optionally bound to a catalog song once
/// persisted. Iteration yields pairs in emission order.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    song_id: Option<SongId>,
    pairs: Vec<HashPair>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn push(&mut self, pair: HashPair) {
        self.pairs.push(pair);
    }

    pub fn bind_song(&mut self, song_id: SongId) {
        self.song_id = Some(song_id);
    }

    pub fn song_id(&self) -> Option<SongId> {
        self.song_id
    }

    pub fn pairs(&self) -> &[HashPair] {
        &self.pairs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HashPair> {
        self.pairs.iter()
    }
}

impl<'a> IntoIterator for &'a Fingerprint {
    type Item = &'a HashPair;
    type IntoIter = std::slice::Iter<'a, HashPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Pairs every peak with its `fan_value - 1` successors in peak-list order
/// and emits a hash for each pair whose time gap lies in
/// `[0, MAX_HASH_TIME_DELTA]`.
///
/// The hash is the frozen textual form `"{f1:.2}|{f2:.2}|{dt}"`: frequencies
/// in Hz at two decimals, the gap in seconds in its shortest decimal form.
/// Stored catalogs depend on this exact byte layout.
pub fn from_peaks(peaks: &[Peak], freqs: &[f64], times: &[f64], fan_value: usize) -> Fingerprint {
    let mut fingerprint = Fingerprint::new();

    for i in 0..peaks.len() {
        for j in 1..fan_value {
            let Some(target) = peaks.get(i + j) else {
                break;
            };
            let anchor = &peaks[i];

            let f1 = freqs[anchor.freq_idx];
            let f2 = freqs[target.freq_idx];
            let t1 = times[anchor.time_idx];
            let t2 = times[target.time_idx];

            let delta = t2 - t1;
            if (0.0..=MAX_HASH_TIME_DELTA).contains(&delta) {
                fingerprint.push(HashPair {
                    hash: format!("{f1:.2}|{f2:.2}|{delta}"),
                    offset: t1,
                });
            }
        }
    }

    debug!(pairs = fingerprint.len(), peaks = peaks.len(), "hashed peak pairs");
    fingerprint
}

/// Runs the whole pipeline on mono PCM: spectrogram, peak extraction, pair
/// hashing. Degenerate input (silence, or fewer samples than one window)
/// comes back as an empty fingerprint rather than an error.
pub fn from_pcm(pcm: &[f32], sample_rate: u32, params: &PipelineParams) -> Fingerprint {
    let spec = spectrogram::build(pcm, sample_rate, params.window_size, params.overlap_ratio);
    let peaks = peaks::find(&spec.data, params.neighborhood_size, params.amp_threshold_db);
    from_peaks(&peaks, &spec.freqs, &spec.times, params.fan_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SAMPLING_RATE;
    use std::f64::consts::PI;

    fn peak(freq_idx: usize, time_idx: usize) -> Peak {
        Peak {
            freq_idx,
            time_idx,
            amp_db: -10.0,
        }
    }

    #[test]
    fn hash_format_is_frozen() {
        let peaks = [peak(0, 0), peak(1, 1)];
        let freqs = [440.0, 880.0];
        let times = [0.0, 1.5];

        let fp = from_peaks(&peaks, &freqs, &times, 30);
        assert_eq!(fp.len(), 1);
        assert_eq!(fp.pairs()[0].hash, "440.00|880.00|1.5");
        assert_eq!(fp.pairs()[0].offset, 0.0);
    }

    #[test]
    fn hash_parses_back_to_its_triple() {
        let peaks = [peak(0, 0), peak(1, 1)];
        let freqs = [440.006, 880.0];
        let times = [0.25, 1.75];

        let fp = from_peaks(&peaks, &freqs, &times, 30);
        let parts: Vec<&str> = fp.pairs()[0].hash.split('|').collect();
        assert_eq!(parts.len(), 3);

        let f1: f64 = parts[0].parse().unwrap();
        let f2: f64 = parts[1].parse().unwrap();
        let dt: f64 = parts[2].parse().unwrap();
        assert_eq!(f1, 440.01); // two-decimal rounding is part of the format
        assert_eq!(f2, 880.0);
        assert_eq!(dt, 1.5);
    }

    #[test]
    fn negative_gaps_are_never_emitted() {
        // Row-major peak order can put a later row at an earlier time.
        let peaks = [peak(0, 5), peak(1, 2), peak(2, 9)];
        let freqs = [100.0, 200.0, 300.0];
        let times: Vec<f64> = (0..10).map(|t| t as f64 * 0.1).collect();

        let fp = from_peaks(&peaks, &freqs, &times, 30);
        for pair in &fp {
            let dt: f64 = pair.hash.split('|').nth(2).unwrap().parse().unwrap();
            assert!(dt >= 0.0, "emitted negative gap in {}", pair.hash);
        }
        // (0,5)->(1,2) is filtered; (0,5)->(2,9) and (1,2)->(2,9) survive.
        assert_eq!(fp.len(), 2);
    }

    #[test]
    fn gaps_beyond_the_window_are_dropped() {
        let peaks = [peak(0, 0), peak(1, 1)];
        let freqs = [100.0, 200.0];
        let times = [0.0, 200.5];

        assert!(from_peaks(&peaks, &freqs, &times, 30).is_empty());
    }

    #[test]
    fn fan_value_bounds_pairs_per_anchor() {
        let peaks: Vec<Peak> = (0..10).map(|i| peak(i, i)).collect();
        let freqs: Vec<f64> = (0..10).map(|i| 100.0 * (i + 1) as f64).collect();
        let times: Vec<f64> = (0..10).map(|t| t as f64 * 0.1).collect();

        let fp = from_peaks(&peaks, &freqs, &times, 3);
        // Anchors 0..=7 pair with 2 successors, anchor 8 with 1.
        assert_eq!(fp.len(), 8 * 2 + 1);
    }

    #[test]
    fn emission_order_is_stable_and_nested() {
        let peaks = [peak(0, 0), peak(1, 1), peak(2, 2)];
        let freqs = [100.0, 200.0, 300.0];
        let times = [0.0, 0.1, 0.2];

        let fp = from_peaks(&peaks, &freqs, &times, 30);
        let anchors: Vec<f64> = fp.iter().map(|p| p.offset).collect();
        assert_eq!(anchors, vec![0.0, 0.0, 0.1]);
    }

    #[test]
    fn value_type_tracks_binding_and_order() {
        let mut fp = Fingerprint::new();
        assert!(fp.is_empty());
        assert_eq!(fp.song_id(), None);

        fp.push(HashPair {
            hash: "1.00|2.00|0.5".into(),
            offset: 0.0,
        });
        fp.push(HashPair {
            hash: "3.00|4.00|0.5".into(),
            offset: 1.0,
        });
        fp.bind_song(7);

        assert_eq!(fp.len(), 2);
        assert_eq!(fp.song_id(), Some(7));
        let hashes: Vec<&str> = fp.iter().map(|p| p.hash.as_str()).collect();
        assert_eq!(hashes, vec!["1.00|2.00|0.5", "3.00|4.00|0.5"]);
    }

    #[test]
    fn silent_pcm_fingerprints_to_nothing() {
        let pcm = vec![0.0f32; 44100];
        let fp = from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::ingest());
        assert!(fp.is_empty());
    }

    #[test]
    fn short_pcm_fingerprints_to_nothing() {
        let pcm = vec![0.3f32; 1000];
        let fp = from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::ingest());
        assert!(fp.is_empty());
    }

    #[test]
    fn sinusoid_hashes_pair_the_tone_with_itself() {
        // A ~1 kHz tone sitting exactly on bin 186, synthesized from an
        // integer phase index so every analysis frame is bit-identical and
        // frames tie as local maxima instead of racing on rounding noise.
        let pcm: Vec<f32> = (0..5 * SAMPLING_RATE as usize)
            .map(|i| (2.0 * PI * ((186 * i) % 4096) as f64 / 4096.0).sin() as f32)
            .collect();

        let fp = from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::ingest());
        assert!(!fp.is_empty());

        for pair in &fp {
            let parts: Vec<&str> = pair.hash.split('|').collect();
            let f1: f64 = parts[0].parse().unwrap();
            assert_eq!(parts[0], parts[1]);
            assert!((f1 - 1000.0).abs() < 10.0, "far from the tone: {}", pair.hash);
        }
    }

    #[test]
    fn fingerprinting_is_deterministic() {
        let pcm: Vec<f32> = (0..2 * SAMPLING_RATE as usize)
            .map(|i| {
                let t = i as f64 / SAMPLING_RATE as f64;
                ((2.0 * PI * 523.25 * t).sin() + 0.5 * (2.0 * PI * 1318.51 * t).sin()) as f32
            })
            .collect();

        let a = from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::ingest());
        let b = from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::ingest());

        assert_eq!(a.pairs(), b.pairs());
    }
}
