//! Tolerance constants for comparing streamed audio.
//!
//! Float files round-trip bit for bit, so only integer widths need slack.

/// Exact transfers (float32 files, silence).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size. Encoding truncates, so allow two steps.
pub const INT16_EPSILON: f32 = 2.0 / 32768.0;

/// 24-bit quantization step size.
pub const INT24_EPSILON: f32 = 2.0 / 8388608.0;
