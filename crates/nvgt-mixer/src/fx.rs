//! The closed effect-type enumeration `set_fx` parses from a `":"`-separated spec
//! string, and the ordered effect chain a mixer carries.

use crate::error::{MixerError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Reverb { wet: f32, dry: f32, decay: f32, damp: f32 },
    Echo { wet: f32, feedback: f32, delay: f32 },
    Chorus { wet: f32, rate: f32, depth: f32 },
    Compressor { threshold: f32, ratio: f32, attack: f32, release: f32, gain: f32 },
    Eq { bandwidth: f32, center_freq: f32, gain: f32 },
    Distortion { drive: f32, dry: f32, feedback: f32 },
    Gargle { rate: f32, waveform: f32 },
    Flanger { wet: f32, depth: f32, feedback: f32, rate: f32 },
    PitchShift { shift: f32, semitones: f32 },
    Rotate { rate: f32 },
    Volume { target: f32 },
    Limiter { release: f32 },
}

impl Effect {
    fn parse(keyword: &str, params: &[&str]) -> Result<Self> {
        fn f(params: &[&str], i: usize, keyword: &str) -> Result<f32> {
            params
                .get(i)
                .ok_or_else(|| MixerError::MalformedSpec(format!("{keyword}: missing parameter {i}")))?
                .parse::<f32>()
                .map_err(|_| MixerError::MalformedSpec(format!("{keyword}: parameter {i} is not a number")))
        }
        Ok(match keyword {
            "reverb" => Effect::Reverb {
                wet: f(params, 0, keyword)?,
                dry: f(params, 1, keyword)?,
                decay: f(params, 2, keyword)?,
                damp: f(params, 3, keyword)?,
            },
            "echo" => Effect::Echo {
                wet: f(params, 0, keyword)?,
                feedback: f(params, 1, keyword)?,
                delay: f(params, 2, keyword)?,
            },
            "chorus" => Effect::Chorus {
                wet: f(params, 0, keyword)?,
                rate: f(params, 1, keyword)?,
                depth: f(params, 2, keyword)?,
            },
            "compressor" => Effect::Compressor {
                threshold: f(params, 0, keyword)?,
                ratio: f(params, 1, keyword)?,
                attack: f(params, 2, keyword)?,
                release: f(params, 3, keyword)?,
                gain: f(params, 4, keyword)?,
            },
            "eq" => Effect::Eq {
                bandwidth: f(params, 0, keyword)?,
                center_freq: f(params, 1, keyword)?,
                gain: f(params, 2, keyword)?,
            },
            "distortion" => Effect::Distortion {
                drive: f(params, 0, keyword)?,
                dry: f(params, 1, keyword)?,
                feedback: f(params, 2, keyword)?,
            },
            "gargle" => Effect::Gargle {
                rate: f(params, 0, keyword)?,
                waveform: f(params, 1, keyword)?,
            },
            "flanger" => Effect::Flanger {
                wet: f(params, 0, keyword)?,
                depth: f(params, 1, keyword)?,
                feedback: f(params, 2, keyword)?,
                rate: f(params, 3, keyword)?,
            },
            "pitchshift" => Effect::PitchShift {
                shift: f(params, 0, keyword)?,
                semitones: f(params, 1, keyword)?,
            },
            "rotate" => Effect::Rotate { rate: f(params, 0, keyword)? },
            "volume" => Effect::Volume { target: f(params, 0, keyword)? },
            "limiter" => Effect::Limiter { release: f(params, 0, keyword)? },
            other => return Err(MixerError::UnknownEffectType(other.to_string())),
        })
    }
}

pub struct EffectSlot {
    pub id: String,
    pub effect: Effect,
}

/// A parsed `set_fx` spec: an optional `$id`, an effect keyword, and its ordered
/// parameters.
struct ParsedSpec {
    id: Option<String>,
    keyword: Option<String>,
    params: Vec<String>,
}

fn parse_spec(spec: &str) -> ParsedSpec {
    let mut parts = spec.split(':');
    let mut id = None;
    let mut first = parts.next().unwrap_or("");
    if let Some(stripped) = first.strip_prefix('$') {
        id = Some(stripped.to_string());
        first = parts.next().unwrap_or("");
    }
    let keyword = if first.is_empty() { None } else { Some(first.to_string()) };
    let params = parts.map(|s| s.to_string()).collect();
    ParsedSpec { id, keyword, params }
}

/// The ordered effect chain a mixer owns. Mirrors `mixer::set_fx`'s semantics:
/// empty spec clears or removes by index/id; otherwise inserts, updates in place
/// by `$id`, or appends.
#[derive(Default)]
pub struct EffectChain {
    slots: Vec<EffectSlot>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EffectSlot> {
        self.slots.get(index)
    }

    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id == id)
    }

    /// Returns the new index, or an error for a malformed/unknown spec.
    pub fn set_fx(&mut self, spec: &str, index: i64) -> Result<i64> {
        if spec.is_empty() {
            return if index < 0 {
                self.slots.clear();
                Ok(-1)
            } else {
                let i = index as usize;
                if i >= self.slots.len() {
                    return Err(MixerError::IndexOutOfRange(i));
                }
                self.slots.remove(i);
                Ok(-1)
            };
        }

        let parsed = parse_spec(spec);
        if parsed.keyword.is_none() {
            let id = parsed.id.ok_or_else(|| MixerError::MalformedSpec(spec.to_string()))?;
            let i = self.find_by_id(&id).ok_or(MixerError::NoSuchEffect(id))?;
            self.slots.remove(i);
            return Ok(-1);
        }
        let keyword = parsed.keyword.unwrap();
        let params: Vec<&str> = parsed.params.iter().map(|s| s.as_str()).collect();
        let effect = Effect::parse(&keyword, &params)?;
        let id = parsed.id.unwrap_or_default();

        if !id.is_empty() {
            if let Some(i) = self.find_by_id(&id) {
                self.slots[i].effect = effect;
                return Ok(i as i64);
            }
        }

        if index >= 0 {
            let i = (index as usize).min(self.slots.len());
            self.slots.insert(i, EffectSlot { id, effect });
            Ok(i as i64)
        } else {
            self.slots.push(EffectSlot { id, effect });
            Ok(self.slots.len() as i64 - 1)
        }
    }
}
