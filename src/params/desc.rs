//! Described parameters.
//!
//! A [`ParamDesc`] carries its name, its range and its current value in one
//! atomic `i32`. Floats are stored scaled by [`FLOAT_SCALE`], so every kind
//! shares the same lock-free storage and presets can persist raw integers.
//! Any write that changes the value marks the parameter's dirty bit.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use super::callback::{CallbackProxy, ThreadSafeCallback};
use crate::error::{EngineError, EngineResult};

/// Fixed-point scale for float parameters.
pub const FLOAT_SCALE: i32 = 100_000;

#[inline]
fn scale(value: f32) -> i32 {
    (value * FLOAT_SCALE as f32).round() as i32
}

#[inline]
fn unscale(raw: i32) -> f32 {
    raw as f32 / FLOAT_SCALE as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Int {
        min: i32,
        max: i32,
        default: i32,
        alt_mul: i32,
    },
    /// Bounds, step and default are stored scaled.
    Float {
        min: i32,
        max: i32,
        step: i32,
        default: i32,
        alt_mul: i32,
    },
    Bool {
        default: bool,
    },
    Enum {
        labels: &'static [&'static str],
        default: i32,
    },
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Int { .. } => "int",
            ParamKind::Float { .. } => "float",
            ParamKind::Bool { .. } => "bool",
            ParamKind::Enum { .. } => "enum",
        }
    }

    /// Raw `(min, max)` bounds.
    pub fn raw_range(&self) -> (i32, i32) {
        match *self {
            ParamKind::Int { min, max, .. } | ParamKind::Float { min, max, .. } => (min, max),
            ParamKind::Bool { .. } => (0, 1),
            ParamKind::Enum { labels, .. } => (0, labels.len().saturating_sub(1) as i32),
        }
    }

    pub fn raw_default(&self) -> i32 {
        match *self {
            ParamKind::Int { default, .. }
            | ParamKind::Float { default, .. }
            | ParamKind::Enum { default, .. } => default,
            ParamKind::Bool { default } => default as i32,
        }
    }
}

pub struct ParamDesc {
    name: &'static str,
    kind: ParamKind,
    value: AtomicI32,
    proxy: CallbackProxy,
}

impl ParamDesc {
    fn with_kind(callbacks: &Arc<ThreadSafeCallback>, name: &'static str, kind: ParamKind) -> Self {
        let (min, max) = kind.raw_range();
        let initial = kind.raw_default().clamp(min, max);
        Self {
            name,
            kind,
            value: AtomicI32::new(initial),
            proxy: callbacks.new_proxy(),
        }
    }

    pub fn int(
        callbacks: &Arc<ThreadSafeCallback>,
        name: &'static str,
        min: i32,
        max: i32,
        default: i32,
        alt_mul: i32,
    ) -> Self {
        Self::with_kind(
            callbacks,
            name,
            ParamKind::Int {
                min,
                max,
                default,
                alt_mul,
            },
        )
    }

    pub fn float(
        callbacks: &Arc<ThreadSafeCallback>,
        name: &'static str,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
        alt_mul: i32,
    ) -> Self {
        Self::with_kind(
            callbacks,
            name,
            ParamKind::Float {
                min: scale(min),
                max: scale(max),
                step: scale(step).max(1),
                default: scale(default),
                alt_mul,
            },
        )
    }

    pub fn boolean(callbacks: &Arc<ThreadSafeCallback>, name: &'static str, default: bool) -> Self {
        Self::with_kind(callbacks, name, ParamKind::Bool { default })
    }

    pub fn enumeration(
        callbacks: &Arc<ThreadSafeCallback>,
        name: &'static str,
        labels: &'static [&'static str],
        default: i32,
    ) -> Self {
        Self::with_kind(callbacks, name, ParamKind::Enum { labels, default })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// Dirty-bit slot of this parameter
    pub fn slot(&self) -> usize {
        self.proxy.slot()
    }

    #[inline]
    pub fn raw(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn get_int(&self) -> i32 {
        self.raw()
    }

    /// Natural value: unscaled for floats, the integer itself otherwise.
    #[inline]
    pub fn get_float(&self) -> f32 {
        match self.kind {
            ParamKind::Float { .. } => unscale(self.raw()),
            _ => self.raw() as f32,
        }
    }

    #[inline]
    pub fn get_bool(&self) -> bool {
        self.raw() != 0
    }

    pub fn get_enum(&self) -> usize {
        self.raw().max(0) as usize
    }

    /// Label of the current enum variant.
    pub fn label(&self) -> Option<&'static str> {
        match self.kind {
            ParamKind::Enum { labels, .. } => labels.get(self.get_enum()).copied(),
            _ => None,
        }
    }

    /// Position within the range, 0 to 1.
    pub fn get_normalized(&self) -> f32 {
        let (min, max) = self.kind.raw_range();
        if max <= min {
            return 0.0;
        }
        (self.raw() - min) as f32 / (max - min) as f32
    }

    /// Apply `f` to the current raw value, clamp, store. Marks dirty on change.
    fn update(&self, f: impl Fn(i32) -> i32) -> bool {
        let (min, max) = self.kind.raw_range();
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = f(current).clamp(min, max);
                (next != current).then_some(next)
            });
        match previous {
            Ok(_) => {
                self.proxy.mark_dirty();
                true
            }
            Err(_) => false,
        }
    }

    /// Store a raw value (scaled for floats). Returns whether it changed.
    pub fn set_raw(&self, raw: i32) -> bool {
        self.update(|_| raw)
    }

    /// Store a natural value. Floats are scaled, bools compare against 0.5.
    pub fn set_float(&self, value: f32) -> bool {
        let raw = match self.kind {
            ParamKind::Float { .. } => scale(value),
            ParamKind::Bool { .. } => (value >= 0.5) as i32,
            _ => value.round() as i32,
        };
        self.set_raw(raw)
    }

    pub fn set_bool(&self, value: bool) -> bool {
        self.set_raw(value as i32)
    }

    pub fn set_normalized(&self, t: f32) -> bool {
        let (min, max) = self.kind.raw_range();
        let t = t.clamp(0.0, 1.0);
        self.set_raw(min + ((max - min) as f32 * t).round() as i32)
    }

    /// Step by `delta` increments; `alt` applies the coarse multiplier.
    pub fn add(&self, delta: i32, alt: bool) -> bool {
        match self.kind {
            ParamKind::Int { alt_mul, .. } => {
                let mul = if alt { alt_mul } else { 1 };
                self.update(|v| v.saturating_add(delta.saturating_mul(mul)))
            }
            ParamKind::Float { step, alt_mul, .. } => {
                let mul = if alt { alt_mul } else { 1 };
                self.update(|v| v.saturating_add(delta.saturating_mul(step).saturating_mul(mul)))
            }
            ParamKind::Bool { .. } => {
                if delta == 0 {
                    return false;
                }
                self.set_bool(delta > 0)
            }
            ParamKind::Enum { .. } => self.update(|v| v.saturating_add(delta)),
        }
    }

    pub fn reset(&self) -> bool {
        self.set_raw(self.kind.raw_default())
    }

    /// Fails unless this parameter is a float.
    pub fn expect_float(&self) -> EngineResult<&Self> {
        match self.kind {
            ParamKind::Float { .. } => Ok(self),
            _ => Err(EngineError::ParamKindMismatch {
                name: self.name.to_string(),
                expected: "float",
            }),
        }
    }
}

impl std::fmt::Debug for ParamDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamDesc")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("raw", &self.raw())
            .field("slot", &self.slot())
            .finish()
    }
}
