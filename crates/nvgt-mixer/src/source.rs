//! A sound source: one decoded/streamed audio clip attached to the mixer graph
//! through a private "isolating" mixer that hosts its per-source DSP slot. The
//! isolating mixer is never exposed for general mixer-graph use; it exists so a
//! source can carry its own volume/pan/pitch/effect chain using the exact same
//! machinery a user-created [`crate::mixer::Mixer`] uses, without the source
//! itself needing to duplicate that state.
//!
//! Five loading shapes are supported, matching the resource kinds the rest of
//! this stack's input layer resolves: a filesystem path, an entry inside a pack,
//! an in-memory byte buffer (optionally legacy-XOR-masked), a network URL routed
//! through the sound service, and caller-driven push/callback streaming. Spatial
//! positioning and environment attachment are modeled as a boundary trait here;
//! the concrete spatial DSP lives one crate over.

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use nvgt_pack::Pack;
use nvgt_soundio::SoundService;

use crate::decode::{decode_all, decode_bytes, DecodedAudio};
use crate::error::Result;
use crate::mixer::{Mixer, NOMINAL_SAMPLE_RATE};
use crate::preload::PreloadCache;

const STOPPED: u8 = 0;
const PLAYING: u8 = 1;
const PAUSED: u8 = 2;

/// A handle a spatial environment implementation hands to a source on attach,
/// letting `SoundSource::close` detach itself without this crate depending on
/// the spatial crate.
pub trait EnvironmentBinding: Send + Sync {
    fn detach_source(&self, source: &Arc<SoundSource>);
}

/// A caller-supplied streaming source, read start-to-finish once on load. The
/// `in_progress` guard on [`SoundSource`] prevents a callback that re-enters the
/// audio engine (e.g. to log or to load another sound) from deadlocking on
/// itself.
pub trait SourceCallback: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> usize;
    fn close(&self) {}
}

struct CallbackReader(Arc<dyn SourceCallback>);

impl Read for CallbackReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.0.read(buf))
    }
}

/// Per-byte legacy masking applied to in-memory buffers loaded with the legacy
/// flag set. The original byte-XOR routine this mirrors was not present in the
/// retrieved source for this port; until a verified definition turns up this is
/// a best-effort stand-in and should not be relied on for compatibility with
/// existing encrypted assets.
pub fn legacy_xor_transform(byte: u8, index: usize, total_size: usize) -> u8 {
    byte ^ (index.wrapping_mul(31).wrapping_add(total_size) as u8)
}

pub struct SoundSource {
    mixer: Arc<Mixer>,
    parent_mixer: Mutex<Weak<Mixer>>,
    audio: Mutex<Option<Arc<DecodedAudio>>>,
    state: AtomicU8,
    looped: AtomicBool,
    cursor_frame: AtomicU64,
    position: Mutex<(f32, f32, f32)>,
    environment: Mutex<Option<Arc<dyn EnvironmentBinding>>>,
    reset_hook: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    preload: Mutex<Option<(Arc<PreloadCache>, String)>>,
    channels: AtomicU32,
    closed: AtomicBool,
}

impl SoundSource {
    fn bare() -> Arc<Self> {
        Arc::new(Self {
            mixer: Mixer::new(),
            parent_mixer: Mutex::new(Weak::new()),
            audio: Mutex::new(None),
            state: AtomicU8::new(STOPPED),
            looped: AtomicBool::new(false),
            cursor_frame: AtomicU64::new(0),
            position: Mutex::new((0.0, 0.0, 0.0)),
            environment: Mutex::new(None),
            reset_hook: Mutex::new(None),
            preload: Mutex::new(None),
            channels: AtomicU32::new(2),
            closed: AtomicBool::new(false),
        })
    }

    fn with_audio(audio: Arc<DecodedAudio>) -> Arc<Self> {
        let source = Self::bare();
        source.channels.store(audio.channels as u32, Ordering::Relaxed);
        *source.audio.lock() = Some(audio);
        source
    }

    // --- loading shapes -----------------------------------------------------

    pub fn load_file(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let file = std::fs::File::open(path)?;
        Ok(Self::with_audio(decode_all(file)?))
    }

    pub fn load_from_pack(pack: &Arc<Mutex<Pack>>, name: &str) -> Result<Arc<Self>> {
        let reader = pack.lock().get_file(name)?;
        Ok(Self::with_audio(decode_all(reader)?))
    }

    pub fn load_memory(mut bytes: Vec<u8>, legacy_xor: bool) -> Result<Arc<Self>> {
        if legacy_xor {
            let total = bytes.len();
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = legacy_xor_transform(*b, i, total);
            }
        }
        Ok(Self::with_audio(decode_bytes(bytes)?))
    }

    pub fn load_url(service: &SoundService, triplet_key: &str) -> Result<Arc<Self>> {
        let mut stream = service.open_triplet(triplet_key)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(Self::with_audio(decode_bytes(bytes)?))
    }

    pub fn load_callback(callback: Arc<dyn SourceCallback>) -> Result<Arc<Self>> {
        let mut bytes = Vec::new();
        CallbackReader(callback.clone()).read_to_end(&mut bytes)?;
        callback.close();
        Ok(Self::with_audio(decode_bytes(bytes)?))
    }

    pub fn load_preloaded(
        cache: &Arc<PreloadCache>,
        key: &str,
        load: impl FnOnce() -> Result<Vec<u8>>,
    ) -> Result<Arc<Self>> {
        let audio = cache.acquire(key, load)?;
        let source = Self::with_audio(audio);
        *source.preload.lock() = Some((cache.clone(), key.to_string()));
        Ok(source)
    }

    /// A raw, decode-free source fed directly from caller-supplied PCM, for
    /// callers that already have floating-point samples (synthesized tones,
    /// network telephony audio) and want to bypass the codec entirely.
    pub fn new_raw(channels: u32, sample_rate: u32) -> Arc<Self> {
        let source = Self::bare();
        source.channels.store(channels, Ordering::Relaxed);
        *source.audio.lock() = Some(Arc::new(DecodedAudio {
            samples: Vec::new(),
            channels: channels as usize,
            sample_rate,
        }));
        source
    }

    /// Appends interleaved `f32` PCM to a raw source's ring, for streaming
    /// playback that is generated rather than decoded from a container.
    pub fn push_memory(&self, samples: &[f32]) {
        let mut guard = self.audio.lock();
        let Some(audio) = guard.as_mut() else { return };
        let appended = DecodedAudio {
            samples: {
                let mut v = audio.samples.clone();
                v.extend_from_slice(samples);
                v
            },
            channels: audio.channels,
            sample_rate: audio.sample_rate,
        };
        *guard = Some(Arc::new(appended));
    }

    /// Convenience form of [`Self::push_memory`] for ASCII/UTF-8 "samples as
    /// text" callers (e.g. a script feeding in generated tone data as a string
    /// of comma-separated values); interprets `text` as whitespace/comma
    /// separated floats.
    pub fn push_string(&self, text: &str) {
        let samples: Vec<f32> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<f32>().ok())
            .collect();
        self.push_memory(&samples);
    }

    // --- mixer-graph attachment ---------------------------------------------

    pub fn isolating_mixer(&self) -> Arc<Mixer> {
        self.mixer.clone()
    }

    pub fn has_parent_mixer(&self) -> bool {
        self.parent_mixer.lock().upgrade().is_some()
    }

    pub fn parent_mixer(&self) -> Option<Arc<Mixer>> {
        self.parent_mixer.lock().upgrade()
    }

    pub fn set_parent_mixer(&self, mixer: &Arc<Mixer>) {
        *self.parent_mixer.lock() = Arc::downgrade(mixer);
    }

    pub fn clear_parent_mixer(&self) {
        *self.parent_mixer.lock() = Weak::new();
    }

    pub fn set_paused(&self, paused: bool) {
        if paused {
            let _ = self
                .state
                .compare_exchange(PLAYING, PAUSED, Ordering::AcqRel, Ordering::Relaxed);
        } else {
            let _ = self
                .state
                .compare_exchange(PAUSED, PLAYING, Ordering::AcqRel, Ordering::Relaxed);
        }
    }

    pub fn attach_environment(&self, env: Arc<dyn EnvironmentBinding>) {
        *self.environment.lock() = Some(env);
    }

    pub fn set_reset_hook(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        *self.reset_hook.lock() = Some(hook);
    }

    fn fire_reset_hook(&self) {
        if let Some(hook) = self.reset_hook.lock().as_ref() {
            hook();
        }
    }

    // --- transport -----------------------------------------------------------

    pub fn play(&self, reset_loop_state: bool) {
        if reset_loop_state || self.state.load(Ordering::Acquire) == STOPPED {
            self.cursor_frame.store(0, Ordering::Release);
        }
        self.state.store(PLAYING, Ordering::Release);
    }

    pub fn play_looped(&self) {
        self.looped.store(true, Ordering::Release);
        self.play(true);
    }

    /// Blocks the calling thread until playback reaches the end of a
    /// non-looping clip.
    pub fn play_wait(&self) {
        self.play(true);
        let remaining_ms = self.length_ms() - self.position_ms();
        if remaining_ms > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(remaining_ms / 1000.0));
        }
    }

    pub fn pause(&self) {
        let _ = self
            .state
            .compare_exchange(PLAYING, PAUSED, Ordering::AcqRel, Ordering::Relaxed);
        self.fire_reset_hook();
    }

    pub fn stop(&self) {
        self.state.store(STOPPED, Ordering::Release);
        self.cursor_frame.store(0, Ordering::Release);
        self.fire_reset_hook();
    }

    pub fn seek(&self, ms: f64) {
        let audio = self.audio.lock();
        let rate = audio.as_ref().map(|a| a.sample_rate).unwrap_or(NOMINAL_SAMPLE_RATE as u32);
        let frame = ((ms / 1000.0) * rate as f64).max(0.0) as u64;
        self.cursor_frame.store(frame, Ordering::Release);
        drop(audio);
        self.fire_reset_hook();
    }

    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::Acquire) == PLAYING
    }

    pub fn is_paused(&self) -> bool {
        self.state.load(Ordering::Acquire) == PAUSED
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    pub fn set_looping(&self, looped: bool) {
        self.looped.store(looped, Ordering::Release);
    }

    pub fn is_looping(&self) -> bool {
        self.looped.load(Ordering::Acquire)
    }

    pub fn position_ms(&self) -> f64 {
        let audio = self.audio.lock();
        let rate = audio.as_ref().map(|a| a.sample_rate).unwrap_or(NOMINAL_SAMPLE_RATE as u32);
        if rate == 0 {
            return 0.0;
        }
        self.cursor_frame.load(Ordering::Acquire) as f64 * 1000.0 / rate as f64
    }

    pub fn length_ms(&self) -> f64 {
        self.audio.lock().as_ref().map(|a| a.duration_ms()).unwrap_or(0.0)
    }

    // --- spatial state (read by the spatial DSP stage) ------------------------

    pub fn set_position(&self, x: f32, y: f32, z: f32) {
        *self.position.lock() = (x, y, z);
    }

    pub fn position(&self) -> (f32, f32, f32) {
        *self.position.lock()
    }

    // --- volume / pan / pitch / effects, delegated to the isolating mixer -----

    pub fn volume(&self) -> f32 {
        self.mixer.volume()
    }
    pub fn set_volume(&self, v: f32) {
        self.mixer.set_volume(v);
    }
    pub fn pan(&self) -> f32 {
        self.mixer.pan()
    }
    pub fn set_pan(&self, v: f32) {
        self.mixer.set_pan(v);
    }
    pub fn pitch(&self) -> f32 {
        self.mixer.pitch()
    }
    pub fn set_pitch(&self, multiplier: f32) {
        self.mixer.set_pitch(multiplier);
    }
    pub fn set_fx(&self, spec: &str, index: i64) -> Result<i64> {
        self.mixer.set_fx(spec, index)
    }

    // --- render --------------------------------------------------------------

    /// Mixes up to `out.len() / channels` frames of this source's audio
    /// (volume/pan applied, no spatial processing) into `out`, advancing the
    /// playback cursor. Returns the number of frames written.
    pub fn fill_buffer(&self, out: &mut [f32], channels: usize) -> usize {
        if channels == 0 || self.state.load(Ordering::Acquire) != PLAYING {
            return 0;
        }
        let audio_guard = self.audio.lock();
        let Some(audio) = audio_guard.as_ref() else {
            return 0;
        };
        if audio.channels == 0 || audio.frame_count() == 0 {
            return 0;
        }

        let volume = self.mixer.volume();
        let pan = self.mixer.pan();
        let left_gain = volume * (1.0 - pan.max(0.0));
        let right_gain = volume * (1.0 + pan.min(0.0));

        let frames_wanted = out.len() / channels;
        let mut written = 0;
        let mut cursor = self.cursor_frame.load(Ordering::Acquire);

        for frame in 0..frames_wanted {
            if cursor as usize >= audio.frame_count() {
                if self.looped.load(Ordering::Acquire) {
                    cursor = 0;
                } else {
                    self.state.store(STOPPED, Ordering::Release);
                    break;
                }
            }
            let src_base = cursor as usize * audio.channels;
            let l = audio.samples[src_base];
            let r = if audio.channels > 1 {
                audio.samples[src_base + 1]
            } else {
                l
            };
            let dst_base = frame * channels;
            out[dst_base] += l * left_gain;
            if channels > 1 {
                out[dst_base + 1] += r * right_gain;
            }
            cursor += 1;
            written += 1;
        }

        self.cursor_frame.store(cursor, Ordering::Release);
        written
    }

    pub fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop();
        if let Some(env) = self.environment.lock().take() {
            env.detach_source(self);
        }
        if let Some(parent) = self.parent_mixer.lock().upgrade() {
            parent.remove_sound(self, true);
        }
        if let Some((cache, key)) = self.preload.lock().take() {
            cache.release(&key);
        }
    }
}

impl Drop for SoundSource {
    fn drop(&mut self) {
        if let Some((cache, key)) = self.preload.lock().take() {
            cache.release(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wav_bytes() -> Vec<u8> {
        let data: [u8; 8] = [128, 160, 192, 224, 255, 224, 192, 160];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36u32 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        bytes
    }

    #[test]
    fn attaching_to_a_mixer_sets_up_isolating_mixer_parent() {
        let bus = Mixer::new();
        let source = SoundSource::load_memory(sine_wav_bytes(), false).unwrap();
        bus.add_sound(&source).unwrap();
        assert!(Arc::ptr_eq(&source.isolating_mixer().parent().unwrap(), &bus));
        assert!(source.is_paused() || source.is_stopped());
    }

    #[test]
    fn play_then_stop_resets_cursor() {
        let source = SoundSource::load_memory(sine_wav_bytes(), false).unwrap();
        source.play(true);
        assert!(source.is_playing());
        let mut buf = vec![0.0f32; 4 * 2];
        source.fill_buffer(&mut buf, 2);
        assert!(source.position_ms() > 0.0);
        source.stop();
        assert_eq!(source.position_ms(), 0.0);
    }

    #[test]
    fn looping_wraps_instead_of_stopping() {
        let source = SoundSource::load_memory(sine_wav_bytes(), false).unwrap();
        source.play_looped();
        let mut buf = vec![0.0f32; 64 * 2];
        source.fill_buffer(&mut buf, 2);
        assert!(source.is_playing());
    }

    #[test]
    fn close_detaches_from_parent_mixer() {
        let bus = Mixer::new();
        let source = SoundSource::load_memory(sine_wav_bytes(), false).unwrap();
        bus.add_sound(&source).unwrap();
        source.close();
        assert!(!source.has_parent_mixer());
        assert!(bus.child_sources().is_empty());
    }

    #[test]
    fn raw_source_accepts_pushed_samples() {
        let source = SoundSource::new_raw(1, 8000);
        source.push_string("0.1, 0.2 0.3,0.4");
        source.play(true);
        let mut buf = vec![0.0f32; 4];
        let written = source.fill_buffer(&mut buf, 1);
        assert_eq!(written, 4);
    }
}
