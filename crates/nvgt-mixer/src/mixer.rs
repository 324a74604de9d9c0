//! A mixer graph node: owns a bus, an effects chain, and child mixers/sources.
//! Relationships are explicit attach/detach APIs rather than reference counting on
//! the child-to-parent back-reference, which is a plain `Weak` and never an owning
//! edge (see module docs on [`crate::source::SoundSource`] for the same pattern).

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::error::{MixerError, Result};
use crate::fx::{Effect, EffectChain, EffectSlot};
use crate::slide::SlideAttribute;
use crate::source::SoundSource;

pub const NOMINAL_SAMPLE_RATE: f32 = 44100.0;

pub struct Mixer {
    parent: Mutex<Weak<Mixer>>,
    children_mixers: Mutex<Vec<Arc<Mixer>>>,
    children_sources: Mutex<Vec<Arc<SoundSource>>>,
    effects: Mutex<EffectChain>,
    volume: SlideAttribute,
    pan: SlideAttribute,
    pitch: SlideAttribute,
    is_root: bool,
}

static OUTPUT_MIXER: OnceLock<Arc<Mixer>> = OnceLock::new();

/// The process-wide root of the mixer tree, created on first access.
pub fn output_mixer() -> Arc<Mixer> {
    OUTPUT_MIXER
        .get_or_init(|| {
            Arc::new(Mixer {
                parent: Mutex::new(Weak::new()),
                children_mixers: Mutex::new(Vec::new()),
                children_sources: Mutex::new(Vec::new()),
                effects: Mutex::new(EffectChain::new()),
                volume: SlideAttribute::new(1.0),
                pan: SlideAttribute::new(0.0),
                pitch: SlideAttribute::new(NOMINAL_SAMPLE_RATE),
                is_root: true,
            })
        })
        .clone()
}

impl Mixer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: Mutex::new(Weak::new()),
            children_mixers: Mutex::new(Vec::new()),
            children_sources: Mutex::new(Vec::new()),
            effects: Mutex::new(EffectChain::new()),
            volume: SlideAttribute::new(1.0),
            pan: SlideAttribute::new(0.0),
            pitch: SlideAttribute::new(NOMINAL_SAMPLE_RATE),
            is_root: false,
        })
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn parent(&self) -> Option<Arc<Mixer>> {
        self.parent.lock().upgrade()
    }

    fn has_parent(&self) -> bool {
        self.parent.lock().upgrade().is_some()
    }

    pub fn add_mixer(self: &Arc<Self>, child: &Arc<Mixer>) -> Result<()> {
        if child.has_parent() {
            return Err(MixerError::AlreadyParented);
        }
        *child.parent.lock() = Arc::downgrade(self);
        self.children_mixers.lock().push(child.clone());
        Ok(())
    }

    /// Removes `child`. Unless `internal` (the caller is mid-reparent or the
    /// destructor), the child is re-attached to the output mixer so its
    /// back-pointer never dangles.
    pub fn remove_mixer(self: &Arc<Self>, child: &Arc<Mixer>, internal: bool) {
        self.children_mixers.lock().retain(|m| !Arc::ptr_eq(m, child));
        *child.parent.lock() = Weak::new();
        if !internal && !child.is_root {
            let root = output_mixer();
            if !Arc::ptr_eq(self, &root) {
                let _ = root.add_mixer(child);
            }
        }
    }

    /// Inserts `source`'s isolating mixer (its private DSP-slot host, see
    /// [`crate::source::SoundSource`]) as a child mixer of `self`, paused, so
    /// playback does not start immediately.
    pub fn add_sound(self: &Arc<Self>, source: &Arc<SoundSource>) -> Result<()> {
        if source.has_parent_mixer() {
            return Err(MixerError::AlreadyParented);
        }
        self.add_mixer(&source.isolating_mixer())?;
        source.set_paused(true);
        source.set_parent_mixer(self);
        self.children_sources.lock().push(source.clone());
        Ok(())
    }

    pub fn remove_sound(self: &Arc<Self>, source: &Arc<SoundSource>, internal: bool) {
        self.remove_mixer(&source.isolating_mixer(), internal);
        self.children_sources.lock().retain(|s| !Arc::ptr_eq(s, source));
        if !internal {
            source.clear_parent_mixer();
        }
    }

    pub fn child_mixers(&self) -> Vec<Arc<Mixer>> {
        self.children_mixers.lock().clone()
    }

    pub fn child_sources(&self) -> Vec<Arc<SoundSource>> {
        self.children_sources.lock().clone()
    }

    pub fn set_fx(&self, spec: &str, index: i64) -> Result<i64> {
        self.effects.lock().set_fx(spec, index)
    }

    pub fn effect(&self, index: usize) -> Option<Effect> {
        self.effects.lock().get(index).map(|s: &EffectSlot| s.effect.clone())
    }

    pub fn effect_count(&self) -> usize {
        self.effects.lock().len()
    }

    // --- volume / pan / pitch, each with a linear and an "alt" (human-facing)
    // form backed by the same underlying value; see SPEC_FULL.md.

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }
    pub fn set_volume(&self, v: f32) {
        self.volume.set(v);
    }
    pub fn volume_alt(&self) -> f32 {
        self.volume() * 100.0 - 100.0
    }
    pub fn set_volume_alt(&self, v: f32) {
        self.set_volume((v + 100.0) / 100.0);
    }
    pub fn slide_volume(&self, v: f32, ms: u32) {
        self.volume.slide_to(v, ms);
    }
    pub fn slide_volume_alt(&self, v: f32, ms: u32) {
        self.slide_volume((v + 100.0) / 100.0, ms);
    }
    pub fn is_volume_sliding(&self) -> bool {
        self.volume.is_sliding()
    }

    pub fn pan(&self) -> f32 {
        self.pan.get()
    }
    pub fn set_pan(&self, v: f32) {
        self.pan.set(v.clamp(-1.0, 1.0));
    }
    pub fn pan_alt(&self) -> f32 {
        self.pan() * 100.0
    }
    pub fn set_pan_alt(&self, v: f32) {
        self.set_pan(v / 100.0);
    }
    pub fn slide_pan(&self, v: f32, ms: u32) {
        self.pan.slide_to(v.clamp(-1.0, 1.0), ms);
    }
    pub fn slide_pan_alt(&self, v: f32, ms: u32) {
        self.slide_pan(v / 100.0, ms);
    }
    pub fn is_pan_sliding(&self) -> bool {
        self.pan.is_sliding()
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.get() / NOMINAL_SAMPLE_RATE
    }
    pub fn set_pitch(&self, multiplier: f32) {
        self.pitch.set(multiplier.clamp(0.05, 5.0) * NOMINAL_SAMPLE_RATE);
    }
    pub fn pitch_alt(&self) -> f32 {
        self.pitch() * 100.0
    }
    pub fn set_pitch_alt(&self, v: f32) {
        self.set_pitch(v / 100.0);
    }
    pub fn slide_pitch(&self, multiplier: f32, ms: u32) {
        self.pitch.slide_to(multiplier.clamp(0.05, 5.0) * NOMINAL_SAMPLE_RATE, ms);
    }
    pub fn slide_pitch_alt(&self, v: f32, ms: u32) {
        self.slide_pitch(v / 100.0, ms);
    }
    pub fn is_pitch_sliding(&self) -> bool {
        self.pitch.is_sliding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_a_mixer_reparents_to_output_unless_internal() {
        let parent = Mixer::new();
        let child = Mixer::new();
        parent.add_mixer(&child).unwrap();
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));

        parent.remove_mixer(&child, false);
        let new_parent = child.parent().unwrap();
        assert!(Arc::ptr_eq(&new_parent, &output_mixer()));
    }

    #[test]
    fn cannot_add_a_mixer_that_already_has_a_parent() {
        let a = Mixer::new();
        let b = Mixer::new();
        let child = Mixer::new();
        a.add_mixer(&child).unwrap();
        assert!(b.add_mixer(&child).is_err());
    }

    #[test]
    fn volume_alt_round_trips() {
        let m = Mixer::new();
        m.set_volume_alt(-20.0);
        assert!((m.volume() - 0.8).abs() < 1e-6);
        assert!((m.volume_alt() - (-20.0)).abs() < 1e-4);
    }

    #[test]
    fn pitch_exposes_the_multiplier_not_the_internal_rate() {
        let m = Mixer::new();
        m.set_pitch(1.5);
        assert!((m.pitch() - 1.5).abs() < 1e-4);
        assert!((m.pitch_alt() - 150.0).abs() < 1e-2);
    }
}
