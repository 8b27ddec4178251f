//! Constants and fixed-layout structures of the .spz container.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;
use std::fmt;

use crate::error::{Result, SpzError};

/// "NGSP" in little-endian byte order.
pub const MAGIC: u32 = 0x5053_474e;

pub const HEADER_SIZE: usize = 16;

/// Header flag bit 0.
pub const FLAG_ANTIALIASED: u8 = 1 << 0;

/// Upper bound on the fixed-point position precision.
pub const MAX_FRACTIONAL_BITS: u8 = 24;

/// Refuse headers declaring more points than this.
pub(crate) const MAX_POINTS: u32 = 10_000_000;

/// Color quantization scale shared by v2 and v3.
pub const COLOR_SCALE: f32 = 0.15;

/// Container format revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Version {
    V1,
    V2,
    V3,
}

impl Version {
    pub fn from_u32(raw: u32) -> Option<Version> {
        match raw {
            1 => Some(Version::V1),
            2 => Some(Version::V2),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
            Version::V3 => 3,
        }
    }

    /// Bytes per encoded rotation. v1 stores all four components.
    pub(crate) fn rotation_stride(self) -> usize {
        match self {
            Version::V1 => 4,
            Version::V2 | Version::V3 => 3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

/// Number of non-DC SH coefficients per channel for a degree.
pub fn sh_coefficients_for_degree(degree: u8) -> Option<usize> {
    match degree {
        0 => Some(0),
        1 => Some(3),
        2 => Some(8),
        3 => Some(15),
        _ => None,
    }
}

/// Inverse of [`sh_coefficients_for_degree`].
pub fn sh_degree_for_coefficients(coefficients: usize) -> Option<u8> {
    match coefficients {
        0 => Some(0),
        3 => Some(1),
        8 => Some(2),
        15 => Some(3),
        _ => None,
    }
}

/// The 16-byte fixed prefix of the decompressed stream.
///
/// Multi-byte fields are little-endian on the wire. `flags` bit 0 is the
/// antialiased marker; all other flag bits and the trailing byte are reserved
/// and must be zero.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable, Serialize)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub num_points: u32,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub flags: u8,
    pub reserved: u8,
}

impl Header {
    pub fn new(
        version: Version,
        num_points: u32,
        sh_degree: u8,
        fractional_bits: u8,
        antialiased: bool,
    ) -> Self {
        Self {
            magic: MAGIC,
            version: version.as_u32(),
            num_points,
            sh_degree,
            fractional_bits,
            flags: if antialiased { FLAG_ANTIALIASED } else { 0 },
            reserved: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SpzError::Decode(format!(
                "Failed to parse header: wanted {} bytes, got only {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            magic: u32::from_le_bytes(bytes[0..4].try_into().unwrap_or_default()),
            version: u32::from_le_bytes(bytes[4..8].try_into().unwrap_or_default()),
            num_points: u32::from_le_bytes(bytes[8..12].try_into().unwrap_or_default()),
            sh_degree: bytes[12],
            fractional_bits: bytes[13],
            flags: bytes[14],
            reserved: bytes[15],
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(bytemuck::bytes_of(self));
        bytes
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
            && Version::from_u32(self.version).is_some()
            && self.sh_degree <= 3
            && self.fractional_bits <= MAX_FRACTIONAL_BITS
            && self.flags & !FLAG_ANTIALIASED == 0
            && self.reserved == 0
    }

    pub fn antialiased(&self) -> bool {
        self.flags & FLAG_ANTIALIASED != 0
    }

    /// Decompressed payload size implied by the header fields, in bytes.
    pub fn payload_size(&self) -> Option<usize> {
        let version = Version::from_u32(self.version)?;
        let n = self.num_points as usize;
        let sh = sh_coefficients_for_degree(self.sh_degree)?;
        Some(n * 9 + n + n * 3 + n * 3 + n * version.rotation_stride() + n * sh * 3)
    }

    pub fn pretty_fmt(&self) -> String {
        format!(
            "Header(magic=NGSP, version={}, num_points={}, sh_degree={}, \
             fractional_bits={}, antialiased={})",
            Version::from_u32(self.version)
                .map(|v| v.to_string())
                .unwrap_or_else(|| format!("unknown({})", self.version)),
            self.num_points,
            self.sh_degree,
            self.fractional_bits,
            self.antialiased(),
        )
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_fmt())
    }
}
