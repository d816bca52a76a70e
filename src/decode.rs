//! Raw sample block decoding
//!
//! A row's `DATA` cell holds `NSBLK × NPOL × NCHAN` samples, channel fastest,
//! at 8, 16 or 32 bits each. Auto-power products are written unsigned and
//! the remaining (cross) products signed; which is which follows from the
//! polarization convention. [`DecodePlan`] resolves that once into a
//! per-polarization converter table so the inner loop carries no branches.
use crate::error::{Error, Result};
use crate::obs::ObservationParams;

/// Supported sample widths
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitWidth {
    /// 8-bit integers
    Eight,
    /// 16-bit integers
    Sixteen,
    /// 32-bit IEEE floats
    ThirtyTwo,
}

impl BitWidth {
    /// Map an `NBITS` value, failing with a format error for other widths
    pub fn from_bits(nbits: u32) -> Result<Self> {
        match nbits {
            8 => Ok(BitWidth::Eight),
            16 => Ok(BitWidth::Sixteen),
            32 => Ok(BitWidth::ThirtyTwo),
            other => Err(Error::format(format!(
                "NBITS = {other} is not supported (expected 8, 16 or 32)"
            ))),
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitWidth::Eight => 1,
            BitWidth::Sixteen => 2,
            BitWidth::ThirtyTwo => 4,
        }
    }
}

/// Byte order of multi-byte samples inside the `DATA` cell
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ByteOrder {
    /// FITS convention
    #[default]
    Big,
    Little,
}

/// Numeric interpretation of one polarization's samples
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleKind {
    Unsigned,
    Signed,
}

type Converter = fn(&[u8]) -> f32;

fn u8_sample(b: &[u8]) -> f32 {
    b[0] as f32
}

fn i8_sample(b: &[u8]) -> f32 {
    b[0] as i8 as f32
}

fn u16_be(b: &[u8]) -> f32 {
    u16::from_be_bytes([b[0], b[1]]) as f32
}

fn u16_le(b: &[u8]) -> f32 {
    u16::from_le_bytes([b[0], b[1]]) as f32
}

fn i16_be(b: &[u8]) -> f32 {
    i16::from_be_bytes([b[0], b[1]]) as f32
}

fn i16_le(b: &[u8]) -> f32 {
    i16::from_le_bytes([b[0], b[1]]) as f32
}

fn f32_be(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn f32_le(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn converter(width: BitWidth, order: ByteOrder, kind: SampleKind) -> Converter {
    match (width, order, kind) {
        (BitWidth::Eight, _, SampleKind::Unsigned) => u8_sample,
        (BitWidth::Eight, _, SampleKind::Signed) => i8_sample,
        (BitWidth::Sixteen, ByteOrder::Big, SampleKind::Unsigned) => u16_be,
        (BitWidth::Sixteen, ByteOrder::Big, SampleKind::Signed) => i16_be,
        (BitWidth::Sixteen, ByteOrder::Little, SampleKind::Unsigned) => u16_le,
        (BitWidth::Sixteen, ByteOrder::Little, SampleKind::Signed) => i16_le,
        // floats carry their own sign
        (BitWidth::ThirtyTwo, ByteOrder::Big, _) => f32_be,
        (BitWidth::ThirtyTwo, ByteOrder::Little, _) => f32_le,
    }
}

/// Everything needed to decode the rows of one observation
#[derive(Debug, Clone)]
pub struct DecodePlan {
    width: BitWidth,
    order: ByteOrder,
    kinds: Vec<SampleKind>,
    converters: Vec<Converter>,
    nsblk: usize,
    npol: usize,
    nchan: usize,
    block_bytes: usize,
}

impl DecodePlan {
    pub fn new(params: &ObservationParams, order: ByteOrder) -> Result<Self> {
        let width = BitWidth::from_bits(params.nbits)?;
        let unsigned = params.unsigned_pols();
        let kinds: Vec<SampleKind> = (0..params.npol)
            .map(|p| {
                if p < unsigned {
                    SampleKind::Unsigned
                } else {
                    SampleKind::Signed
                }
            })
            .collect();
        let converters = kinds.iter().map(|&k| converter(width, order, k)).collect();
        let block_bytes = [params.npol, params.nchan, width.bytes_per_sample()]
            .iter()
            .try_fold(params.nsblk, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                Error::format(format!(
                    "block of NSBLK={} NPOL={} NCHAN={} NBITS={} is too large",
                    params.nsblk, params.npol, params.nchan, params.nbits
                ))
            })?;
        Ok(Self {
            width,
            order,
            kinds,
            converters,
            nsblk: params.nsblk,
            npol: params.npol,
            nchan: params.nchan,
            block_bytes,
        })
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Interpretation of each polarization, by index
    pub fn kinds(&self) -> &[SampleKind] {
        &self.kinds
    }

    /// Size in bytes of one row's raw block
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Decode one raw block into a `[sample, pol, channel]` view.
    ///
    /// Trailing bytes beyond the declared block are ignored; a short block
    /// is a truncated row.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedBlock> {
        let needed = self.block_bytes();
        if raw.len() < needed {
            return Err(Error::truncated(format!(
                "DATA block holds {} bytes, expected {needed}",
                raw.len()
            )));
        }
        let mut values = Vec::with_capacity(self.nsblk * self.npol * self.nchan);
        let bps = self.width.bytes_per_sample();
        let spectrum_bytes = self.nchan * bps;
        if spectrum_bytes > 0 {
            for (i, spectrum) in raw[..needed].chunks_exact(spectrum_bytes).enumerate() {
                let convert = self.converters[i % self.npol];
                values.extend(spectrum.chunks_exact(bps).map(convert));
            }
        }
        Ok(DecodedBlock {
            values,
            nsblk: self.nsblk,
            npol: self.npol,
            nchan: self.nchan,
        })
    }
}

/// One decoded row, shaped `[sample, pol, channel]`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    values: Vec<f32>,
    nsblk: usize,
    npol: usize,
    nchan: usize,
}

impl DecodedBlock {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nsblk, self.npol, self.nchan)
    }

    pub fn get(&self, sample: usize, pol: usize, chan: usize) -> f32 {
        self.values[(sample * self.npol + pol) * self.nchan + chan]
    }

    /// Channels of one (sample, polarization) pair
    pub fn spectrum(&self, sample: usize, pol: usize) -> &[f32] {
        let start = (sample * self.npol + pol) * self.nchan;
        &self.values[start..start + self.nchan]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}
