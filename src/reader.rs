//! Decoding of the .spz container.
//!
//! The on-disk artifact is a gzip stream; the decompressed bytes are the
//! 16-byte header followed by the packed column arrays in a fixed order:
//! positions, alphas, colors, scales, rotations, spherical harmonics.

use flate2::read::GzDecoder;
use log::debug;
use std::io::Read;

use crate::error::{Result, SpzError};
use crate::format::{
    sh_coefficients_for_degree, Header, Version, HEADER_SIZE, MAGIC, MAX_POINTS,
};
use crate::quant::{
    decode_alpha, decode_color, decode_fixed24, decode_rotation, decode_rotation_v1, decode_scale,
    decode_sh,
};
use crate::splat::GaussianSplat;

pub(crate) trait ReadExt: Read {
    fn read_exact_or_fail(&mut self, buffer: &mut [u8], what: &str) -> Result<()> {
        let mut total_read = 0;
        while total_read < buffer.len() {
            let count = self
                .read(&mut buffer[total_read..])
                .map_err(|e| SpzError::Decode(format!("Failed to read {what}: {e}")))?;
            if count == 0 {
                return Err(SpzError::Decode(format!(
                    "Failed to read {what}: wanted {} bytes, got only {}",
                    buffer.len(),
                    total_read
                )));
            }
            total_read += count;
        }
        Ok(())
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Read and validate the 16-byte header from a decompressed stream.
pub fn read_header_from_stream(reader: &mut dyn Read) -> Result<Header> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact_or_fail(&mut header_bytes, "header")?;
    let header = Header::from_bytes(&header_bytes)?;

    if header.magic != MAGIC {
        return Err(SpzError::Decode(format!(
            "Failed to parse header: bad magic {:#010x}",
            header.magic
        )));
    }
    if Version::from_u32(header.version).is_none() {
        return Err(SpzError::UnsupportedVersion(header.version));
    }
    if !header.is_valid() {
        return Err(SpzError::Decode(format!(
            "Failed to parse header: invalid field (sh_degree={}, fractional_bits={}, \
             flags={:#04x}, reserved={})",
            header.sh_degree, header.fractional_bits, header.flags, header.reserved
        )));
    }
    if header.num_points > MAX_POINTS {
        return Err(SpzError::Decode(format!(
            "Failed to parse header: {} points exceeds the {} point limit",
            header.num_points, MAX_POINTS
        )));
    }
    Ok(header)
}

/// Decode a whole scene from a decompressed stream.
pub fn read_splat_from_stream(reader: &mut dyn Read) -> Result<GaussianSplat> {
    let header = read_header_from_stream(reader)?;
    let version = Version::from_u32(header.version)
        .ok_or(SpzError::UnsupportedVersion(header.version))?;
    let n = header.num_points as usize;
    debug!("decoding {} splat: {} points, sh degree {}", version, n, header.sh_degree);

    let mut position_data = vec![0u8; n * 9];
    reader.read_exact_or_fail(&mut position_data, "positions")?;
    let positions: Vec<f32> = position_data
        .chunks_exact(3)
        .map(|chunk| {
            decode_fixed24([chunk[0], chunk[1], chunk[2]], header.fractional_bits)
        })
        .collect();
    drop(position_data);

    let mut alpha_data = vec![0u8; n];
    reader.read_exact_or_fail(&mut alpha_data, "alphas")?;
    let alphas: Vec<f32> = alpha_data.iter().map(|&b| decode_alpha(b)).collect();
    drop(alpha_data);

    let mut color_data = vec![0u8; n * 3];
    reader.read_exact_or_fail(&mut color_data, "colors")?;
    let colors: Vec<f32> = color_data.iter().map(|&b| decode_color(b, version)).collect();
    drop(color_data);

    let mut scale_data = vec![0u8; n * 3];
    reader.read_exact_or_fail(&mut scale_data, "scales")?;
    let scales: Vec<f32> = scale_data.iter().map(|&b| decode_scale(b)).collect();
    drop(scale_data);

    let mut rotation_data = vec![0u8; n * version.rotation_stride()];
    reader.read_exact_or_fail(&mut rotation_data, "rotations")?;
    let mut rotations: Vec<f32> = Vec::with_capacity(n * 4);
    match version {
        Version::V1 => {
            for chunk in rotation_data.chunks_exact(4) {
                rotations
                    .extend_from_slice(&decode_rotation_v1([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
        }
        Version::V2 | Version::V3 => {
            for chunk in rotation_data.chunks_exact(3) {
                rotations.extend_from_slice(&decode_rotation([chunk[0], chunk[1], chunk[2]]));
            }
        }
    }
    drop(rotation_data);

    let sh_dim = sh_coefficients_for_degree(header.sh_degree)
        .ok_or_else(|| SpzError::Decode("Failed to parse header: bad SH degree".into()))?
        * 3;
    let mut sh_data = vec![0u8; n * sh_dim];
    reader.read_exact_or_fail(&mut sh_data, "spherical harmonics")?;
    let signed: &[i8] = bytemuck::cast_slice(&sh_data);
    let spherical_harmonics: Vec<f32> = signed
        .iter()
        .enumerate()
        .map(|(i, &b)| decode_sh(b, (i % sh_dim) / 3, version))
        .collect();
    drop(sh_data);

    // A well-formed stream ends exactly at the last payload block; this also
    // rejects a nonempty payload behind a zero-point header.
    let mut probe = [0u8; 1];
    let trailing = reader
        .read(&mut probe)
        .map_err(|e| SpzError::Decode(format!("Failed to read end of payload: {e}")))?;
    if trailing != 0 {
        return Err(SpzError::Decode(
            "Failed to decode payload: trailing data after the last block".into(),
        ));
    }

    let splat = GaussianSplat {
        version,
        num_points: n,
        sh_degree: header.sh_degree,
        antialiased: header.antialiased(),
        fractional_bits: header.fractional_bits,
        positions,
        scales,
        rotations,
        alphas,
        colors,
        spherical_harmonics,
    };
    splat.validate()?;
    Ok(splat)
}

/// Decode a gzip-framed .spz byte slice.
pub fn decode(bytes: &[u8]) -> Result<GaussianSplat> {
    let mut decoder = GzDecoder::new(bytes);
    read_splat_from_stream(&mut decoder)
}

/// Decode only the header of a gzip-framed .spz byte slice. Decompresses no
/// more than the first deflate blocks covering the 16-byte prefix.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    let mut decoder = GzDecoder::new(bytes);
    read_header_from_stream(&mut decoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn dehex(hex: &str) -> Vec<u8> {
        hex.replace(' ', "")
            .as_bytes()
            .chunks_exact(2)
            .map(|chunk| u8::from_str_radix(std::str::from_utf8(chunk).unwrap(), 16).unwrap())
            .collect()
    }

    // Single-point v2 splat from the official Niantic reference data:
    // position (100, 200, -100), color (1.0, 0.5, 0.25), opacity 0.95,
    // scales (1, -1, 1), rotation (x, y, z, w) = (0, 0, 1, 0).
    const KNOWN_GOOD_V2: &str =
        "4E475350 02000000 01000000 000C0000 00400600 800C00C0 F9B8A693 89B090B0 8080FF";

    #[test]
    fn test_known_good_v2_vector() {
        let bytes = dehex(KNOWN_GOOD_V2);
        let splat = read_splat_from_stream(&mut bytes.as_slice()).unwrap();

        assert_eq!(splat.num_points, 1);
        assert_eq!(splat.version, Version::V2);
        assert_eq!(splat.sh_degree, 0);
        assert_eq!(splat.fractional_bits, 12);
        assert_eq!(&splat.positions, &[100.0, 200.0, -100.0]);
        assert_eq!(&splat.scales, &[1.0, -1.0, 1.0]);
        // Memory order (w, x, y, z).
        assert_relative_eq!(splat.rotations[0], 0.0, epsilon = 1e-2);
        assert_relative_eq!(splat.rotations[1], 0.0, epsilon = 1e-2);
        assert_relative_eq!(splat.rotations[2], 0.0, epsilon = 1e-2);
        assert_relative_eq!(splat.rotations[3], 1.0, epsilon = 1e-2);
        assert_relative_eq!(splat.alphas[0], 0.95, epsilon = 1e-2);
        assert_relative_eq!(splat.colors[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(splat.colors[1], 0.5, epsilon = 1e-2);
        assert_relative_eq!(splat.colors[2], 0.25, epsilon = 1e-2);
    }

    #[test]
    fn test_header_only_read() {
        let bytes = dehex(KNOWN_GOOD_V2);
        let header = read_header_from_stream(&mut bytes.as_slice()).unwrap();
        assert_eq!(header.num_points, 1);
        assert_eq!(header.version, 2);
        assert!(header.is_valid());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = dehex(KNOWN_GOOD_V2);
        bytes[0] = b'X';
        let err = read_splat_from_stream(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = dehex(KNOWN_GOOD_V2);
        bytes[4] = 9;
        let err = read_splat_from_stream(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, SpzError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = dehex(KNOWN_GOOD_V2);
        let err = read_splat_from_stream(&mut bytes[..20].as_ref()).unwrap_err();
        assert!(err.to_string().contains("Failed"));
    }

    #[test]
    fn test_trailing_data_rejected() {
        let mut bytes = dehex(KNOWN_GOOD_V2);
        bytes.push(0);
        let err = read_splat_from_stream(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_zero_points_with_payload_rejected() {
        let header = Header::new(Version::V3, 0, 0, 12, false);
        let mut bytes = header.to_bytes().to_vec();
        bytes.push(7);
        let err = read_splat_from_stream(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_empty_scene_decodes() {
        let header = Header::new(Version::V3, 0, 0, 12, false);
        let bytes = header.to_bytes().to_vec();
        let splat = read_splat_from_stream(&mut bytes.as_slice()).unwrap();
        assert_eq!(splat.num_points, 0);
        assert!(splat.check_sizes());
    }

    #[test]
    fn test_gzip_framed_decode_rejects_garbage() {
        assert!(decode(b"").is_err());
        assert!(decode(b"not valid spz data").is_err());
        assert!(decode(b"").unwrap_err().to_string().contains("Failed"));
        assert!(decode(b"not valid spz data").unwrap_err().to_string().contains("Failed"));
    }
}
