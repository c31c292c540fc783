//! File decoding for the ingest and query drivers. The core pipeline only
//! ever sees the `(Vec<f32>, u32)` this module produces; swapping the decoder
//! for a microphone source does not touch fingerprinting.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Decodes an audio file to mono f32 samples at its native rate.
///
/// Channels are averaged into one. Corrupt packets are skipped; any other
/// decoder failure is surfaced unchanged.
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32), EngineError> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SymphoniaError::Unsupported("no audio track"))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SymphoniaError::Unsupported("track has no sample rate"))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let channels = decoded.spec().channels.count();
                let mut buffer =
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);

                for frame in buffer.samples().chunks_exact(channels) {
                    samples.push(frame.iter().sum::<f32>() / channels as f32);
                }
            }
            Err(SymphoniaError::DecodeError(err)) => {
                warn!(%err, "skipping undecodable packet");
            }
            Err(err) => return Err(err.into()),
        }
    }

    debug!(
        samples = samples.len(),
        sample_rate,
        path = %path.display(),
        "decoded audio file"
    );
    Ok((samples, sample_rate))
}

/// Linear-interpolation resampler. Good enough for fingerprinting, where the
/// peak picker only cares about dominant spectral energy.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let position = i as f64 * ratio;
        let index = position.floor() as usize;
        let frac = position.fract() as f32;

        if index + 1 < samples.len() {
            let a = samples[index];
            let b = samples[index + 1];
            resampled.push(a + frac * (b - a));
        } else if index < samples.len() {
            resampled.push(samples[index]);
        } else {
            break;
        }
    }
    resampled
}

/// Decodes a file and brings it to the catalog sampling rate.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>, EngineError> {
    let (samples, native_rate) = decode_file(path)?;
    Ok(resample_linear(&samples, native_rate, target_rate))
}
