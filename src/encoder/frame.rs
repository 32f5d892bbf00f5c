//! Frame ingestion.
//!
//! Caller-supplied planes are validated against the encoder's dimensions and
//! bit depth, then packed row by row into owned `u16` planes so the caller can
//! reuse its buffers as soon as `submit` returns.

use super::{BitDepth, Dimensions, ResolvedConfig};
use crate::error::{FrameForgeError, Result};

/// Plane index of luma.
pub const PLANE_Y: usize = 0;
/// Plane index of the first chroma plane.
pub const PLANE_U: usize = 1;
/// Plane index of the second chroma plane.
pub const PLANE_V: usize = 2;

const PLANE_LABELS: [&str; 3] = ["y", "u", "v"];

/// Borrowed Y/U/V planes in their storage sample width.
#[derive(Debug, Clone, Copy)]
pub enum PlaneSamples<'a> {
    /// One byte per sample (8-bit content).
    U8([&'a [u8]; 3]),
    /// Two bytes per sample (10-bit content).
    U16([&'a [u16]; 3]),
}

impl PlaneSamples<'_> {
    fn sample_bits(&self) -> u8 {
        match self {
            Self::U8(_) => 8,
            Self::U16(_) => 16,
        }
    }
}

/// A raw 4:2:0 picture as handed to `submit`.
///
/// Strides are in samples, not bytes, and must be at least the plane's row width.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub planes: PlaneSamples<'a>,
    pub strides: [usize; 3],
    pub bit_depth: u8,
    pub pts: Option<u64>,
}

impl<'a> RawFrame<'a> {
    /// 8-bit planes with explicit luma and chroma strides.
    pub fn from_u8(
        y: &'a [u8],
        u: &'a [u8],
        v: &'a [u8],
        y_stride: usize,
        uv_stride: usize,
    ) -> Self {
        Self {
            planes: PlaneSamples::U8([y, u, v]),
            strides: [y_stride, uv_stride, uv_stride],
            bit_depth: 8,
            pts: None,
        }
    }

    /// 10-bit planes with explicit luma and chroma strides.
    pub fn from_u16(
        y: &'a [u16],
        u: &'a [u16],
        v: &'a [u16],
        y_stride: usize,
        uv_stride: usize,
    ) -> Self {
        Self {
            planes: PlaneSamples::U16([y, u, v]),
            strides: [y_stride, uv_stride, uv_stride],
            bit_depth: 10,
            pts: None,
        }
    }

    /// Attach a presentation timestamp.
    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }
}

/// An ingested picture owned by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    planes: [Vec<u16>; 3],
    dimensions: Dimensions,
    bit_depth: BitDepth,
    input_index: u64,
    pts: Option<u64>,
}

impl Frame {
    /// Tightly packed samples of one plane.
    pub fn plane(&self, index: usize) -> &[u16] {
        &self.planes[index]
    }

    /// Luma dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Sample bit depth.
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Gapless input sequence number.
    pub fn input_index(&self) -> u64 {
        self.input_index
    }

    /// Caller-supplied presentation timestamp.
    pub fn pts(&self) -> Option<u64> {
        self.pts
    }
}

/// Validate `raw` against `config` and copy it into an owned [`Frame`].
///
/// Nothing is allocated for the frame until every check has passed.
pub fn ingest(raw: &RawFrame<'_>, config: &ResolvedConfig, input_index: u64) -> Result<Frame> {
    let bit_depth = config.bit_depth;
    if raw.bit_depth != bit_depth.bits() {
        return Err(FrameForgeError::InvalidFrame(format!(
            "frame bit depth mismatch: expected {}-bit, got {}-bit",
            bit_depth.bits(),
            raw.bit_depth
        )));
    }

    let container_bits = match bit_depth {
        BitDepth::Eight => 8,
        BitDepth::Ten => 16,
    };
    if raw.planes.sample_bits() != container_bits {
        return Err(FrameForgeError::InvalidFrame(format!(
            "{}-bit content must be submitted as {}-bit samples, got {}-bit samples",
            bit_depth.bits(),
            container_bits,
            raw.planes.sample_bits()
        )));
    }

    let luma = config.dimensions;
    let chroma = luma.chroma();
    let plane_dims = [luma, chroma, chroma];

    for i in 0..3 {
        let len = match raw.planes {
            PlaneSamples::U8(p) => p[i].len(),
            PlaneSamples::U16(p) => p[i].len(),
        };
        validate_plane_layout(plane_dims[i], raw.strides[i], len, PLANE_LABELS[i])?;
    }

    let planes = match raw.planes {
        PlaneSamples::U8(p) => [0, 1, 2].map(|i| pack_plane(p[i], plane_dims[i], raw.strides[i])),
        PlaneSamples::U16(p) => {
            let max_value = bit_depth.max_value();
            for i in 0..3 {
                check_sample_range(
                    p[i],
                    plane_dims[i],
                    raw.strides[i],
                    max_value,
                    PLANE_LABELS[i],
                )?;
            }
            [0, 1, 2].map(|i| pack_plane(p[i], plane_dims[i], raw.strides[i]))
        }
    };

    Ok(Frame {
        planes,
        dimensions: luma,
        bit_depth,
        input_index,
        pts: raw.pts,
    })
}

/// Minimum sample count of a plane laid out with `stride`: every row but the
/// last spans a full stride, the last row only its width.
fn required_plane_len(dims: Dimensions, stride: usize) -> Option<usize> {
    (dims.height as usize - 1)
        .checked_mul(stride)?
        .checked_add(dims.width as usize)
}

fn validate_plane_layout(dims: Dimensions, stride: usize, len: usize, label: &str) -> Result<()> {
    let width = dims.width as usize;
    if stride < width {
        return Err(FrameForgeError::InvalidFrame(format!(
            "{label} stride ({stride}) must be >= plane width ({width})"
        )));
    }
    let required = required_plane_len(dims, stride).ok_or_else(|| {
        FrameForgeError::InvalidFrame(format!("{label} plane dimensions overflowed"))
    })?;
    if len < required {
        return Err(FrameForgeError::InvalidFrame(format!(
            "{label} plane too small: got {len} samples, need at least {required} for {}x{} with stride {stride}",
            dims.width, dims.height
        )));
    }
    Ok(())
}

fn check_sample_range(
    src: &[u16],
    dims: Dimensions,
    stride: usize,
    max_value: u16,
    label: &str,
) -> Result<()> {
    let width = dims.width as usize;
    let out_of_range = src
        .chunks(stride)
        .take(dims.height as usize)
        .flat_map(|row| &row[..width])
        .copied()
        .find(|&s| s > max_value);
    match out_of_range {
        Some(sample) => Err(FrameForgeError::InvalidFrame(format!(
            "{label} sample {sample} exceeds the maximum {max_value}"
        ))),
        None => Ok(()),
    }
}

fn pack_plane<T: Copy + Into<u16>>(src: &[T], dims: Dimensions, stride: usize) -> Vec<u16> {
    let width = dims.width as usize;
    let height = dims.height as usize;
    let mut packed = Vec::with_capacity(width * height);
    for row in src.chunks(stride).take(height) {
        packed.extend(row[..width].iter().map(|&s| s.into()));
    }
    packed
}
