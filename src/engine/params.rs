//! Declared engine parameters.

use crate::{Error, Result};

/// Describes one numeric control an engine accepts through `update()`.
///
/// Values are already in UI units (percent, milliseconds, semitones), so
/// `min`/`max` are the range the host may send and `default` is what the
/// engine starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub unit: &'static str,
}

impl ParamSpec {
    pub const fn new(
        key: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
        default: f64,
        unit: &'static str,
    ) -> Self {
        Self {
            key,
            label,
            min,
            max,
            default,
            unit,
        }
    }

    /// A 0..100 % control.
    pub const fn percent(key: &'static str, label: &'static str, default: f64) -> Self {
        Self::new(key, label, 0.0, 100.0, default, "%")
    }

    /// Clamps `value` into range. Non-finite values fall back to the default.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

/// Looks `key` up in `params` and clamps `value` into its range.
///
/// # Errors
///
/// Returns [`Error::UnknownParameter`] if no parameter is declared under `key`.
pub fn resolve(
    engine: &str,
    params: &'static [ParamSpec],
    key: &str,
    value: f64,
) -> Result<(&'static ParamSpec, f64)> {
    let Some(spec) = params.iter().find(|spec| spec.key == key) else {
        tracing::warn!(engine, key, "unknown parameter");
        return Err(Error::UnknownParameter(key.to_string()));
    };

    let clamped = spec.clamp(value);
    if clamped != value {
        tracing::warn!(
            engine,
            key,
            value,
            clamped,
            "parameter out of range, clamped"
        );
    }
    tracing::debug!(engine, key, value = clamped, unit = spec.unit, "parameter update");
    Ok((spec, clamped))
}
