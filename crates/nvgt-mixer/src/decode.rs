//! Decodes a compressed audio stream fully into an interleaved float PCM buffer.
//!
//! This crate decodes eagerly rather than maintaining a live symphonia decode
//! loop synchronized with the transport's play/pause/seek state; the preload
//! cache (§4.6) already requires this shape for its cached entries, so the normal
//! load path reuses the same decode function instead of carrying two audio
//! pipelines. Resampling to the mixer's nominal rate uses `rubato`.

use std::io::{Cursor, Read};
use std::sync::Arc;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::Result;
use crate::mixer::NOMINAL_SAMPLE_RATE;

/// Interleaved stereo float PCM at the mixer's nominal sample rate.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frame_count() as f64 * 1000.0 / self.sample_rate as f64
        }
    }
}

pub fn decode_all<R: Read + Send + 'static>(reader: R) -> Result<Arc<DecodedAudio>> {
    let source = Box::new(ReadOnlySource::new(reader));
    let mss = MediaSourceStream::new(source, Default::default());

    let mut probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let track = probed
        .format
        .default_track()
        .ok_or(symphonia::core::errors::Error::Unsupported("no default track"))?
        .clone();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2)
        .max(1);

    let mut interleaved = Vec::new();
    loop {
        let packet = match probed.format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet)? {
            AudioBufferRef::F32(buf) => push_planar(&buf, &mut interleaved),
            other => {
                let mut buf = other.make_equivalent::<f32>();
                other.convert(&mut buf);
                push_planar(&buf, &mut interleaved)
            }
        }
    }

    let resampled = if source_rate != NOMINAL_SAMPLE_RATE as u32 {
        resample(&interleaved, channels, source_rate, NOMINAL_SAMPLE_RATE as u32)
    } else {
        interleaved
    };

    Ok(Arc::new(DecodedAudio {
        samples: resampled,
        channels,
        sample_rate: NOMINAL_SAMPLE_RATE as u32,
    }))
}

pub fn decode_bytes(bytes: Vec<u8>) -> Result<Arc<DecodedAudio>> {
    decode_all(Cursor::new(bytes))
}

fn push_planar(buf: &symphonia::core::audio::AudioBuffer<f32>, out: &mut Vec<f32>) {
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let start = out.len();
    out.resize(start + frames * channels, 0.0);
    for ch in 0..channels {
        let plane = buf.chan(ch);
        for (i, sample) in plane.iter().enumerate() {
            out[start + i * channels + ch] = *sample;
        }
    }
}

fn resample(interleaved: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    if channels == 0 || interleaved.is_empty() {
        return Vec::new();
    }
    let frames = interleaved.len() / channels;
    let mut deinterleaved: Vec<Vec<f64>> = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            deinterleaved[ch].push(*sample as f64);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let Ok(mut resampler) = SincFixedIn::<f64>::new(ratio, 2.0, params, frames, channels) else {
        return interleaved.to_vec();
    };
    let Ok(output) = resampler.process(&deinterleaved, None) else {
        return interleaved.to_vec();
    };

    let out_frames = output.first().map(|c| c.len()).unwrap_or(0);
    let mut result = vec![0.0f32; out_frames * channels];
    for ch in 0..channels {
        for i in 0..out_frames {
            result[i * channels + ch] = output[ch][i] as f32;
        }
    }
    result
}
