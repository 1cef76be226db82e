//! Frame time codes and loop arithmetic.
//!
//! Frame counts past 2^24 are not exactly representable in an `f32`, which is
//! what most host message fields carry. A [`FrameTimeCode`] splits the count
//! into a `{sign, epoch, frames}` triple whose components all stay exact.
//! Every operation rebuilds the native `i64`, works on it, and splits again.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

/// Frames per epoch (2^24).
pub const EPOCH_SIZE: i64 = 1 << 24;

/// Largest magnitude a time code can carry. The epoch is itself an `f32`
/// and therefore limited to 2^24 as well.
pub const MAX_FRAMES: i64 = EPOCH_SIZE * EPOCH_SIZE - 1;

/// Extended-precision frame count.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimeCode {
    sign: f32,
    epoch: f32,
    frames: f32,
}

impl FrameTimeCode {
    /// Zero frames.
    pub const ZERO: Self = Self {
        sign: 1.0,
        epoch: 0.0,
        frames: 0.0,
    };

    /// Split a frame count. Magnitudes above [`MAX_FRAMES`] saturate.
    pub fn from_frames(n: i64) -> Self {
        let sign = if n < 0 { -1.0 } else { 1.0 };
        let magnitude = n.unsigned_abs().min(MAX_FRAMES as u64) as i64;
        Self {
            sign,
            epoch: (magnitude / EPOCH_SIZE) as f32,
            frames: (magnitude % EPOCH_SIZE) as f32,
        }
    }

    /// Build from a host-supplied triple, validating each component.
    pub fn from_triple(sign: f32, epoch: f32, frames: f32) -> Result<Self> {
        if sign != 1.0 && sign != -1.0 && sign != 0.0 {
            return Err(Error::InvalidTimeCode(format!(
                "sign must be 1, -1 or 0, got {sign}"
            )));
        }
        for (label, value) in [("epoch", epoch), ("frames", frames)] {
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
                return Err(Error::InvalidTimeCode(format!(
                    "{label} must be a non-negative integer, got {value}"
                )));
            }
            if value >= EPOCH_SIZE as f32 {
                return Err(Error::InvalidTimeCode(format!(
                    "{label} must be < {EPOCH_SIZE}, got {value}"
                )));
            }
        }
        Ok(Self {
            sign,
            epoch,
            frames,
        })
    }

    /// Build from a slice of exactly three floats.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        match values {
            [sign, epoch, frames] => Self::from_triple(*sign, *epoch, *frames),
            _ => Err(Error::InvalidTimeCode(format!(
                "a frame time code must be three floats (1|-1, epoch, frames), got {}",
                values.len()
            ))),
        }
    }

    /// Rebuild the native frame count.
    #[inline]
    pub fn to_frames(&self) -> i64 {
        self.sign as i64 * (self.epoch as i64 * EPOCH_SIZE + self.frames as i64)
    }

    /// `{sign, epoch, frames}` for output through single-precision fields.
    #[inline]
    pub fn triple(&self) -> [f32; 3] {
        [self.sign, self.epoch, self.frames]
    }

    pub fn sign(&self) -> f32 {
        self.sign
    }

    pub fn epoch(&self) -> f32 {
        self.epoch
    }

    pub fn frames(&self) -> f32 {
        self.frames
    }

    pub fn is_negative(&self) -> bool {
        self.to_frames() < 0
    }

    /// Sum of both counts.
    pub fn add(self, other: Self) -> Self {
        Self::from_frames(self.to_frames().saturating_add(other.to_frames()))
    }

    /// `floor(self * s)`.
    pub fn mul(self, s: f64) -> Self {
        Self::from_frames((self.to_frames() as f64 * s).floor() as i64)
    }

    /// -1, 0 or 1 as `self` is less than, equal to or greater than `other`.
    pub fn compare(&self, other: &Self) -> i8 {
        match self.to_frames().cmp(&other.to_frames()) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

impl Default for FrameTimeCode {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for FrameTimeCode {
    fn from(n: i64) -> Self {
        Self::from_frames(n)
    }
}

impl From<FrameTimeCode> for i64 {
    fn from(ftc: FrameTimeCode) -> Self {
        ftc.to_frames()
    }
}

impl Add for FrameTimeCode {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        FrameTimeCode::add(self, rhs)
    }
}

impl PartialEq for FrameTimeCode {
    fn eq(&self, other: &Self) -> bool {
        self.to_frames() == other.to_frames()
    }
}

impl Eq for FrameTimeCode {}

impl PartialOrd for FrameTimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameTimeCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_frames().cmp(&other.to_frames())
    }
}

impl fmt::Display for FrameTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.sign, self.epoch, self.frames)
    }
}

/// Position of `clock` inside a loop of `loop_length` frames.
pub fn loop_position(clock: i64, loop_length: i64) -> Result<i64> {
    if loop_length <= 0 {
        return Err(Error::InvalidLoopLength(loop_length));
    }
    Ok(clock.rem_euclid(loop_length))
}

/// Next loop boundary at or after `clock`.
///
/// Boundaries sit at `offset + k * loop_length`. `extra_loops` whole loops and
/// a constant `safety` margin are added to the boundary. A zero loop length
/// has no boundaries and yields `clock - offset + safety`.
pub fn loop_start(
    clock: i64,
    offset: i64,
    loop_length: i64,
    extra_loops: i64,
    safety: i64,
) -> Result<i64> {
    if loop_length < 0 {
        return Err(Error::InvalidLoopLength(loop_length));
    }
    let local = clock - offset;
    if loop_length == 0 {
        return Ok(local + safety);
    }
    let into_loop = local.rem_euclid(loop_length);
    let boundary = if into_loop == 0 {
        clock
    } else {
        clock + loop_length - into_loop
    };
    Ok(boundary + extra_loops * loop_length + safety)
}

/// How many loops of `loop_length` frames fit in `duration`, fractional.
pub fn loops_containing(duration: i64, loop_length: i64) -> Result<f64> {
    if duration < 0 {
        return Err(Error::NegativeTime {
            what: "duration",
            value: duration,
        });
    }
    if loop_length <= 0 {
        return Err(Error::InvalidLoopLength(loop_length));
    }
    Ok(duration as f64 / loop_length as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_beyond_epoch() {
        let n = 3 * EPOCH_SIZE + 17;
        let ftc = FrameTimeCode::from_frames(n);
        assert_eq!(ftc.triple(), [1.0, 3.0, 17.0]);
        assert_eq!(ftc.to_frames(), n);
    }

    #[test]
    fn test_negative_sets_sign() {
        let ftc = FrameTimeCode::from_frames(-(EPOCH_SIZE + 5));
        assert_eq!(ftc.sign(), -1.0);
        assert_eq!(ftc.epoch(), 1.0);
        assert_eq!(ftc.frames(), 5.0);
        assert_eq!(ftc.to_frames(), -(EPOCH_SIZE + 5));
    }

    #[test]
    fn test_zero_is_positive() {
        assert_eq!(FrameTimeCode::from_frames(0).triple(), [1.0, 0.0, 0.0]);
        assert_eq!(FrameTimeCode::default(), FrameTimeCode::ZERO);
    }

    #[test]
    fn test_saturates_at_max() {
        let ftc = FrameTimeCode::from_frames(i64::MAX);
        assert_eq!(ftc.to_frames(), MAX_FRAMES);
        let ftc = FrameTimeCode::from_frames(i64::MIN);
        assert_eq!(ftc.to_frames(), -MAX_FRAMES);
    }

    #[test]
    fn test_triple_validation() {
        assert!(FrameTimeCode::from_triple(1.0, 2.0, 3.0).is_ok());
        assert!(FrameTimeCode::from_triple(2.0, 0.0, 0.0).is_err());
        assert!(FrameTimeCode::from_triple(1.0, -1.0, 0.0).is_err());
        assert!(FrameTimeCode::from_triple(1.0, 0.0, 0.5).is_err());
        assert!(FrameTimeCode::from_triple(1.0, 0.0, EPOCH_SIZE as f32).is_err());
        assert!(FrameTimeCode::from_slice(&[1.0, 0.0]).is_err());
        assert_eq!(
            FrameTimeCode::from_slice(&[-1.0, 0.0, 9.0]).unwrap().to_frames(),
            -9
        );
    }

    #[test]
    fn test_mul_floors() {
        let ftc = FrameTimeCode::from_frames(7);
        assert_eq!(ftc.mul(0.5).to_frames(), 3);
        assert_eq!(FrameTimeCode::from_frames(-7).mul(0.5).to_frames(), -4);
    }

    #[test]
    fn test_loop_position() {
        assert_eq!(loop_position(1050, 100).unwrap(), 50);
        assert_eq!(loop_position(-10, 100).unwrap(), 90);
        assert!(loop_position(10, 0).is_err());
        assert!(loop_position(10, -1).is_err());
    }

    #[test]
    fn test_loop_start_zero_length() {
        assert_eq!(loop_start(1000, 100, 0, 3, 7).unwrap(), 1000 - 100 + 7);
    }

    #[test]
    fn test_loop_start_boundaries() {
        // Between boundaries: next one is 1100.
        assert_eq!(loop_start(1050, 0, 100, 0, 0).unwrap(), 1100);
        // On a boundary: the clock itself.
        assert_eq!(loop_start(1000, 0, 100, 0, 0).unwrap(), 1000);
        // Offset shifts the grid.
        assert_eq!(loop_start(1050, 30, 100, 0, 0).unwrap(), 1130);
        assert_eq!(loop_start(1030, 30, 100, 0, 0).unwrap(), 1030);
        // Extra loops and safety.
        assert_eq!(loop_start(1050, 0, 100, 2, 5).unwrap(), 1305);
        assert!(loop_start(1050, 0, -1, 0, 0).is_err());
    }

    #[test]
    fn test_loops_containing() {
        assert_eq!(loops_containing(250, 100).unwrap(), 2.5);
        assert!(loops_containing(-1, 100).is_err());
        assert!(loops_containing(100, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(n in -MAX_FRAMES..=MAX_FRAMES) {
            prop_assert_eq!(FrameTimeCode::from_frames(n).to_frames(), n);
        }

        #[test]
        fn prop_triple_round_trip(n in -MAX_FRAMES..=MAX_FRAMES) {
            let [s, e, f] = FrameTimeCode::from_frames(n).triple();
            prop_assert_eq!(FrameTimeCode::from_triple(s, e, f).unwrap().to_frames(), n);
        }

        #[test]
        fn prop_add_matches_integers(a in -(1i64 << 40)..(1i64 << 40), b in -(1i64 << 40)..(1i64 << 40)) {
            let sum = FrameTimeCode::from_frames(a) + FrameTimeCode::from_frames(b);
            prop_assert_eq!(sum.to_frames(), a + b);
        }

        #[test]
        fn prop_mul_matches_floor(a in -(1i64 << 40)..(1i64 << 40), s in -4.0f64..4.0) {
            let product = FrameTimeCode::from_frames(a).mul(s);
            prop_assert_eq!(product.to_frames(), (a as f64 * s).floor() as i64);
        }

        #[test]
        fn prop_compare_matches_integers(a in -(1i64 << 40)..(1i64 << 40), b in -(1i64 << 40)..(1i64 << 40)) {
            let expected = match a.cmp(&b) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            prop_assert_eq!(
                FrameTimeCode::from_frames(a).compare(&FrameTimeCode::from_frames(b)),
                expected
            );
        }

        #[test]
        fn prop_loop_start_is_next_boundary(
            clock in 0i64..1_000_000,
            offset in 0i64..10_000,
            len in 1i64..50_000,
        ) {
            let start = loop_start(clock, offset, len, 0, 0).unwrap();
            prop_assert!(start >= clock);
            prop_assert!(start - clock < len);
            prop_assert_eq!((start - offset).rem_euclid(len), 0);
        }
    }
}
