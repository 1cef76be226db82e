//! Sample codec: raw file bytes to and from `f32` sample vectors.
//!
//! Four on-disk widths are handled: 16 and 24-bit signed integers and 32 and
//! 64-bit IEEE floats, in either byte order. Integer samples are
//! left-justified into an `i32` and scaled by 1/2^31, so both integer widths
//! share one scale constant. Float samples are moved through their raw bit
//! patterns.

use crate::soundfile::{SampleLayout, SampleWidth};

/// 1 / 2^31, the scale of a left-justified integer sample.
const SCALE: f32 = 1.0 / 2_147_483_648.0;

const INT16_MAX: i32 = 32767;
const INT24_MAX: i32 = 8_388_607;

/// Decode one sample starting at `bytes[0]`.
#[inline]
pub fn decode_sample(bytes: &[u8], width: SampleWidth, big_endian: bool) -> f32 {
    match width {
        SampleWidth::Int16 => {
            let (hi, lo) = if big_endian {
                (bytes[0], bytes[1])
            } else {
                (bytes[1], bytes[0])
            };
            let justified = (u32::from(hi) << 24) | (u32::from(lo) << 16);
            SCALE * justified as i32 as f32
        }
        SampleWidth::Int24 => {
            let (hi, mid, lo) = if big_endian {
                (bytes[0], bytes[1], bytes[2])
            } else {
                (bytes[2], bytes[1], bytes[0])
            };
            let justified = (u32::from(hi) << 24) | (u32::from(mid) << 16) | (u32::from(lo) << 8);
            SCALE * justified as i32 as f32
        }
        SampleWidth::Float32 => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            let bits = if big_endian {
                u32::from_be_bytes(raw)
            } else {
                u32::from_le_bytes(raw)
            };
            f32::from_bits(bits)
        }
        SampleWidth::Float64 => {
            let raw = [
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ];
            let bits = if big_endian {
                u64::from_be_bytes(raw)
            } else {
                u64::from_le_bytes(raw)
            };
            f64::from_bits(bits) as f32
        }
    }
}

/// Encode one sample into `out[..width.bytes()]`.
///
/// Integer widths saturate at the symmetric range (±32767, ±8388607).
#[inline]
pub fn encode_sample(x: f32, normalization: f32, width: SampleWidth, big_endian: bool, out: &mut [u8]) {
    let scaled = f64::from(x) * f64::from(normalization);
    match width {
        SampleWidth::Int16 => {
            let v = ((32768.0 + scaled * 32768.0) as i32 - 32768).clamp(-INT16_MAX, INT16_MAX);
            let bytes = if big_endian {
                (v as i16).to_be_bytes()
            } else {
                (v as i16).to_le_bytes()
            };
            out[..2].copy_from_slice(&bytes);
        }
        SampleWidth::Int24 => {
            let v = ((8_388_608.0 + scaled * 8_388_608.0) as i32 - 8_388_608)
                .clamp(-INT24_MAX, INT24_MAX);
            let (hi, mid, lo) = ((v >> 16) as u8, (v >> 8) as u8, v as u8);
            if big_endian {
                out[..3].copy_from_slice(&[hi, mid, lo]);
            } else {
                out[..3].copy_from_slice(&[lo, mid, hi]);
            }
        }
        SampleWidth::Float32 => {
            let bits = (scaled as f32).to_bits();
            let bytes = if big_endian {
                bits.to_be_bytes()
            } else {
                bits.to_le_bytes()
            };
            out[..4].copy_from_slice(&bytes);
        }
        SampleWidth::Float64 => {
            let bits = scaled.to_bits();
            let bytes = if big_endian {
                bits.to_be_bytes()
            } else {
                bits.to_le_bytes()
            };
            out[..8].copy_from_slice(&bytes);
        }
    }
}

/// Decode `nframes` interleaved frames from `bytes` into
/// `outputs[ch][offset..offset + nframes]`.
///
/// Only `min(layout.channels, outputs.len())` channels are decoded; any
/// further output channels are zero-filled.
pub fn decode_frames(
    layout: SampleLayout,
    bytes: &[u8],
    outputs: &mut [&mut [f32]],
    offset: usize,
    nframes: usize,
) {
    let bps = layout.width.bytes();
    let bpf = layout.bytes_per_frame();
    let decoded = layout.channels.min(outputs.len());

    for (ch, output) in outputs.iter_mut().enumerate() {
        let dst = &mut output[offset..offset + nframes];
        if ch >= decoded {
            dst.fill(0.0);
            continue;
        }
        for (frame, sample) in dst.iter_mut().enumerate() {
            let at = frame * bpf + ch * bps;
            *sample = decode_sample(&bytes[at..at + bps], layout.width, layout.big_endian);
        }
    }
}

/// Encode `inputs[ch][offset..offset + nframes]` as interleaved frames into
/// `out`. Channels the layout has but `inputs` lacks are written as silence.
pub fn encode_frames(
    layout: SampleLayout,
    inputs: &[&[f32]],
    offset: usize,
    nframes: usize,
    normalization: f32,
    out: &mut [u8],
) {
    let bps = layout.width.bytes();
    let bpf = layout.bytes_per_frame();

    for ch in 0..layout.channels {
        let input = inputs.get(ch).map(|input| &input[offset..offset + nframes]);
        for frame in 0..nframes {
            let x = input.map_or(0.0, |input| input[frame]);
            let at = frame * bpf + ch * bps;
            encode_sample(
                x,
                normalization,
                layout.width,
                layout.big_endian,
                &mut out[at..at + bps],
            );
        }
    }
}

/// Earliest frame in `inputs[..][..nframes]` whose magnitude on any channel
/// reaches `threshold`.
pub fn find_threshold(inputs: &[&[f32]], nframes: usize, threshold: f32) -> Option<usize> {
    inputs
        .iter()
        .filter_map(|input| {
            input[..nframes.min(input.len())]
                .iter()
                .position(|x| x.abs() >= threshold)
        })
        .min()
}
