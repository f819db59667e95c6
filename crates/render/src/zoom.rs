//! Discrete zoom levels and their relation to the continuous display scale
//!
//! Tiles are only ever rendered at discrete zoom levels. A level encodes the
//! resolution of the tile grid:
//!
//! - 5 to 9: content is displayed smaller than native, factor = level / 10
//! - 10: native fit
//! - above 10: must be `10 + 2^k`, the grid doubles in resolution per step
//!
//! Between two levels the view keeps drawing the tiles of the current level
//! stretched by [`residual_scale`], so continuous pinch zoom does not cause a
//! re-render on every frame.

use crate::error::ZoomError;
use std::fmt;

/// Smallest zoom level that can be encoded
pub const MIN_ZOOM_LEVEL: u32 = 5;

/// Zoom level at which the content fits the view at scale 1
pub const NATIVE_ZOOM_LEVEL: u32 = 10;

/// Default maximum zoom level (`10 + 2^8`)
pub const MAX_ZOOM_LEVEL: u32 = 10 + (1 << 8);

/// Largest power of two used when deriving a level, keeps `10 + 2^k` in `u32`
const MAX_EXPONENT: f64 = 30.0;

/// A validated zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoomLevel(u32);

impl ZoomLevel {
    pub const NATIVE: ZoomLevel = ZoomLevel(NATIVE_ZOOM_LEVEL);
    pub const MIN: ZoomLevel = ZoomLevel(MIN_ZOOM_LEVEL);
    pub const MAX: ZoomLevel = ZoomLevel(MAX_ZOOM_LEVEL);

    /// Validate a raw zoom level
    pub fn new(level: u32) -> Result<Self, ZoomError> {
        if Self::is_valid(level) {
            Ok(Self(level))
        } else {
            Err(ZoomError::InvalidLevel(level))
        }
    }

    /// Check whether a raw value is a valid zoom level
    pub fn is_valid(level: u32) -> bool {
        match level {
            MIN_ZOOM_LEVEL..=NATIVE_ZOOM_LEVEL => true,
            l if l > NATIVE_ZOOM_LEVEL => (l - NATIVE_ZOOM_LEVEL).is_power_of_two(),
            _ => false,
        }
    }

    /// Raw encoded value
    pub fn get(self) -> u32 {
        self.0
    }

    /// Scale at which tiles of this level are rasterized (`level / 10`)
    pub fn factor(self) -> f32 {
        self.0 as f32 / 10.0
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self::NATIVE
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a continuous scale is snapped to a level above native
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingPolicy {
    /// Settle on the lower, already sharper level (pinch released while shrinking)
    Floor,

    /// Snap up to the sharper resolution (pinch released while growing)
    Ceil,

    /// Best visual match during continuous motion
    Round,
}

impl RoundingPolicy {
    fn apply(self, value: f64) -> f64 {
        match self {
            RoundingPolicy::Floor => value.floor(),
            RoundingPolicy::Ceil => value.ceil(),
            RoundingPolicy::Round => value.round(),
        }
    }
}

/// Inclusive range of zoom levels the user can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomBounds {
    min: ZoomLevel,
    max: ZoomLevel,
}

impl ZoomBounds {
    /// Build bounds from raw levels
    ///
    /// Both values must be valid levels and `min` must not exceed `max`.
    pub fn new(min: u32, max: u32) -> Result<Self, ZoomError> {
        let min = ZoomLevel::new(min)?;
        let max = ZoomLevel::new(max)?;
        Self::from_levels(min, max)
    }

    /// Build bounds from already validated levels
    pub fn from_levels(min: ZoomLevel, max: ZoomLevel) -> Result<Self, ZoomError> {
        if min > max {
            return Err(ZoomError::InvertedBounds {
                min: min.get(),
                max: max.get(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> ZoomLevel {
        self.min
    }

    pub fn max(&self) -> ZoomLevel {
        self.max
    }

    /// Clamp a level into the bounds
    pub fn clamp(&self, level: ZoomLevel) -> ZoomLevel {
        level.clamp(self.min, self.max)
    }

    /// Clamp a continuous scale to the factors of the bounding levels
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min.factor(), self.max.factor())
    }

    fn clamp_raw(&self, raw: u32) -> ZoomLevel {
        ZoomLevel(raw.clamp(self.min.get(), self.max.get()))
    }
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            min: ZoomLevel::MIN,
            max: ZoomLevel::MAX,
        }
    }
}

/// Return the zoom level whose tiles best serve the given scale
///
/// Below 1 the level is `round(scale * 10)`. From 1 upwards the exponent
/// `log2(round(scale * 10) - 10)` is snapped with `policy` and the level is
/// `10 + 2^exponent`. A scale of exactly 1 always maps to level 10. The
/// result is clamped to `bounds`.
pub fn zoom_level_for_scale(scale: f32, policy: RoundingPolicy, bounds: ZoomBounds) -> ZoomLevel {
    let tenths = (scale * 10.0).round();

    if scale < 1.0 {
        return bounds.clamp_raw(tenths.max(0.0) as u32);
    }

    let above_native = f64::from(tenths) - f64::from(NATIVE_ZOOM_LEVEL);
    if above_native <= 0.0 {
        return bounds.clamp_raw(NATIVE_ZOOM_LEVEL);
    }

    let exponent = policy.apply(above_native.log2()).clamp(0.0, MAX_EXPONENT) as u32;
    bounds.clamp_raw(NATIVE_ZOOM_LEVEL + (1u32 << exponent))
}

/// Extra stretch applied to tiles of `level` when drawn at `scale`
pub fn residual_scale(scale: f32, level: ZoomLevel) -> f32 {
    scale / level.factor()
}
