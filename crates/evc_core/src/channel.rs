//! Fixed-width named channel vectors
//!
//! Hormones and emotions are both 8-channel scalar states. They share one
//! storage type, `ChannelVector<C>`, parameterised by the channel enum so a
//! hormone vector can never be passed where an emotion vector is expected.
//!
//! Every `ChannelVector` holds values in [0, 1]. Construction clamps, and
//! non-finite inputs collapse to 0.0 instead of propagating.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::Index;

/// Number of channels in every hormone/emotion vector.
pub const CHANNELS: usize = 8;

/// A named channel of an 8-dimensional affective vector.
pub trait Channel: Copy + Eq + Debug + Send + Sync + 'static {
    /// All channels in canonical order (index order).
    const ALL: [Self; CHANNELS];

    /// Display / serialization name, e.g. `"Dopamine"`.
    fn name(self) -> &'static str;

    /// Position in the canonical order.
    fn index(self) -> usize;

    /// Case-insensitive lookup by name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Guard against NaN and Infinity: replace with `fallback`.
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Round to `places` decimals (used for outbound projections only).
#[inline]
pub fn round_to(v: f32, places: i32) -> f32 {
    let scale = 10f32.powi(places);
    (v * scale).round() / scale
}

/// Bounded [0, 1] vector over the channels of `C`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelVector<C: Channel> {
    values: [f32; CHANNELS],
    _channel: PhantomData<C>,
}

impl<C: Channel> Default for ChannelVector<C> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<C: Channel> ChannelVector<C> {
    pub fn zeros() -> Self {
        Self {
            values: [0.0; CHANNELS],
            _channel: PhantomData,
        }
    }

    /// Build from raw values, clamping each channel into [0, 1].
    pub fn from_array(values: [f32; CHANNELS]) -> Self {
        Self {
            values: values.map(|v| sanitize_f32(v, 0.0).clamp(0.0, 1.0)),
            _channel: PhantomData,
        }
    }

    pub fn get(&self, channel: C) -> f32 {
        self.values[channel.index()]
    }

    /// Set one channel (clamped).
    pub fn set(&mut self, channel: C, value: f32) {
        self.values[channel.index()] = sanitize_f32(value, 0.0).clamp(0.0, 1.0);
    }

    pub fn to_array(&self) -> [f32; CHANNELS] {
        self.values
    }

    /// Iterate `(channel, value)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (C, f32)> + '_ {
        C::ALL.into_iter().map(move |c| (c, self.values[c.index()]))
    }

    /// Interpolate toward `other` by `t` (clamped to [0, 1]).
    ///
    /// `memory.lerp(&emotions, alpha)` is the exponential moving average
    /// `alpha * emotions + (1 - alpha) * memory`.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let t = sanitize_f32(t, 0.0).clamp(0.0, 1.0);
        let mut out = [0.0; CHANNELS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.values[i] + (other.values[i] - self.values[i]) * t;
        }
        Self::from_array(out)
    }

    /// Signed per-channel difference `self - earlier`.
    pub fn delta_from(&self, earlier: &Self) -> ChannelDelta<C> {
        let mut out = [0.0; CHANNELS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.values[i] - earlier.values[i];
        }
        ChannelDelta::from_array(out)
    }

    /// Largest absolute per-channel difference.
    pub fn max_abs_diff(&self, other: &Self) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    /// Copy with every channel rounded to `places` decimals.
    pub fn rounded(&self, places: i32) -> Self {
        Self::from_array(self.values.map(|v| round_to(v, places)))
    }
}

impl<C: Channel> Index<C> for ChannelVector<C> {
    type Output = f32;

    fn index(&self, channel: C) -> &f32 {
        &self.values[channel.index()]
    }
}

fn serialize_channels<C: Channel, S: Serializer>(
    values: &[f32; CHANNELS],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(CHANNELS))?;
    for c in C::ALL {
        map.serialize_entry(c.name(), &values[c.index()])?;
    }
    map.end()
}

/// Serialized as `{"Dopamine": 0.35, ...}` in canonical order.
impl<C: Channel> Serialize for ChannelVector<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_channels::<C, S>(&self.values, serializer)
    }
}

/// Every channel must be present. `null` (how serde_json writes NaN) reads
/// back as 0.0; unknown keys are ignored.
impl<'de, C: Channel> Deserialize<'de> for ChannelVector<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: HashMap<String, Option<f32>> = HashMap::deserialize(deserializer)?;
        let mut values = [0.0; CHANNELS];
        for c in C::ALL {
            let entry = raw
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(c.name()))
                .map(|(_, v)| *v);
            match entry {
                Some(v) => values[c.index()] = v.unwrap_or(0.0),
                None => return Err(de::Error::missing_field(c.name())),
            }
        }
        Ok(Self::from_array(values))
    }
}

/// Signed per-channel change, e.g. hormone movement during one turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDelta<C: Channel> {
    values: [f32; CHANNELS],
    _channel: PhantomData<C>,
}

impl<C: Channel> Default for ChannelDelta<C> {
    fn default() -> Self {
        Self::from_array([0.0; CHANNELS])
    }
}

impl<C: Channel> ChannelDelta<C> {
    pub fn from_array(values: [f32; CHANNELS]) -> Self {
        Self {
            values: values.map(|v| sanitize_f32(v, 0.0)),
            _channel: PhantomData,
        }
    }

    pub fn get(&self, channel: C) -> f32 {
        self.values[channel.index()]
    }

    pub fn rounded(&self, places: i32) -> Self {
        Self::from_array(self.values.map(|v| round_to(v, places)))
    }
}

impl<C: Channel> Serialize for ChannelDelta<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_channels::<C, S>(&self.values, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::Emotion;
    use crate::hormone::Hormone;

    #[test]
    fn test_from_array_clamps_and_sanitizes() {
        let v: ChannelVector<Hormone> =
            ChannelVector::from_array([-1.0, 2.0, f32::NAN, f32::INFINITY, 0.5, 0.0, 1.0, 0.25]);
        assert_eq!(v[Hormone::Dopamine], 0.0);
        assert_eq!(v[Hormone::Serotonin], 1.0);
        assert_eq!(v[Hormone::Oxytocin], 0.0);
        assert_eq!(v[Hormone::Endorphin], 0.0);
        assert_eq!(v[Hormone::Cortisol], 0.5);
        assert_eq!(v[Hormone::Norepinephrine], 0.25);
    }

    #[test]
    fn test_lerp_is_ema() {
        let memory: ChannelVector<Emotion> = ChannelVector::from_array([0.0; CHANNELS]);
        let current: ChannelVector<Emotion> = ChannelVector::from_array([1.0; CHANNELS]);
        let next = memory.lerp(&current, 0.2);
        for (_, v) in next.iter() {
            assert!((v - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_serialize_uses_channel_names_in_order() {
        let mut v: ChannelVector<Hormone> = ChannelVector::zeros();
        v.set(Hormone::Dopamine, 0.35);
        v.set(Hormone::Gaba, 0.5);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with("{\"Dopamine\":0.35"), "got {json}");
        assert!(json.contains("\"GABA\":0.5"), "got {json}");
        assert!(json.ends_with("\"Norepinephrine\":0.0}"), "got {json}");
    }

    #[test]
    fn test_deserialize_missing_channel_fails() {
        let err = serde_json::from_str::<ChannelVector<Emotion>>(r#"{"Joy":0.1}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_deserialize_null_reads_as_zero() {
        let json = r#"{"Joy":null,"Serenity":0.3,"Love":0.2,"Excitement":0.1,
                       "Sadness":0.0,"Fear":0.0,"Anger":0.0,"Surprise":0.0}"#;
        let v: ChannelVector<Emotion> = serde_json::from_str(json).unwrap();
        assert_eq!(v[Emotion::Joy], 0.0);
        assert!((v[Emotion::Serenity] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_delta_is_signed() {
        let a: ChannelVector<Hormone> = ChannelVector::from_array([0.5; CHANNELS]);
        let mut b = a;
        b.set(Hormone::Cortisol, 0.8);
        b.set(Hormone::Gaba, 0.2);
        let d = b.delta_from(&a);
        assert!((d.get(Hormone::Cortisol) - 0.3).abs() < 1e-6);
        assert!((d.get(Hormone::Gaba) + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(Hormone::from_name("gaba"), Some(Hormone::Gaba));
        assert_eq!(Emotion::from_name(" fear "), Some(Emotion::Fear));
        assert_eq!(Emotion::from_name("boredom"), None);
    }
}
