//! A cache of decoded audio buffers keyed by filename, so repeatedly loading
//! the same effect doesn't re-decode it. Entries are refcounted by the sources
//! that hold them and reclaimed by a periodic sweep rather than on every close,
//! mirroring the incremental-GC shape used for short-lived allocations in other
//! parts of this stack.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::decode::{decode_bytes, DecodedAudio};
use crate::error::Result;

/// Tunables for [`PreloadCache`]'s reclamation policy, broken out as a
/// `Default`-implementing struct (rather than bare constants) so tests can
/// shrink the eviction age and sweep interval instead of waiting on them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub eviction_age_secs: u64,
    pub sweep_every_n_closes: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self { eviction_age_secs: 120, sweep_every_n_closes: 32 }
    }
}

struct Entry {
    audio: Arc<DecodedAudio>,
    refcount: AtomicUsize,
    last_used: Instant,
}

pub struct PreloadCache {
    entries: DashMap<String, Entry>,
    closes_since_sweep: AtomicU64,
    config: PreloadConfig,
}

impl Default for PreloadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::with_config(PreloadConfig::default())
    }

    pub fn with_config(config: PreloadConfig) -> Self {
        Self {
            entries: DashMap::new(),
            closes_since_sweep: AtomicU64::new(0),
            config,
        }
    }

    /// Returns a cached decode for `key`, loading it with `load` on a miss.
    /// Bumps the entry's refcount; callers must pair this with [`Self::release`].
    pub fn acquire(&self, key: &str, load: impl FnOnce() -> Result<Vec<u8>>) -> Result<Arc<DecodedAudio>> {
        if let Some(entry) = self.entries.get(key) {
            entry.refcount.fetch_add(1, Ordering::AcqRel);
            return Ok(entry.audio.clone());
        }
        let bytes = load()?;
        let audio = decode_bytes(bytes)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                audio: audio.clone(),
                refcount: AtomicUsize::new(1),
                last_used: Instant::now(),
            },
        );
        Ok(audio)
    }

    /// Drops a reference acquired via [`Self::acquire`] and opportunistically
    /// sweeps stale zero-refcount entries.
    pub fn release(&self, key: &str) {
        if let Some(entry) = self.entries.get(key) {
            entry.refcount.fetch_sub(1, Ordering::AcqRel);
        }
        if self.closes_since_sweep.fetch_add(1, Ordering::AcqRel) + 1 >= self.config.sweep_every_n_closes {
            self.closes_since_sweep.store(0, Ordering::Release);
            self.sweep();
        }
    }

    fn sweep(&self) {
        let eviction_age = Duration::from_secs(self.config.eviction_age_secs);
        self.entries.retain(|_, entry| {
            entry.refcount.load(Ordering::Acquire) > 0 || entry.last_used.elapsed() < eviction_age
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wav() -> Vec<u8> {
        // A minimal 8-sample mono 8-bit PCM WAV, enough for symphonia to decode.
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
    fn second_acquire_for_same_key_does_not_reload() {
        let cache = PreloadCache::new();
        let mut loads = 0;
        let _a = cache
            .acquire("clip", || {
                loads += 1;
                Ok(sine_wav())
            })
            .unwrap();
        let _b = cache
            .acquire("clip", || {
                loads += 1;
                Ok(sine_wav())
            })
            .unwrap();
        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn release_never_panics_on_unknown_key() {
        let cache = PreloadCache::new();
        cache.release("nothing-here");
    }

    #[test]
    fn sweep_evicts_zero_refcount_entries_past_the_configured_age() {
        let cache = PreloadCache::with_config(PreloadConfig { eviction_age_secs: 0, sweep_every_n_closes: 1 });
        let audio = cache.acquire("clip", || Ok(sine_wav())).unwrap();
        drop(audio);
        cache.release("clip");
        assert!(cache.is_empty());
    }
}
