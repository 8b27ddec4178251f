//! Encoding into the .spz container.

use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::io::Write;

use crate::error::{Result, SpzError};
use crate::format::{Version, HEADER_SIZE};
use crate::quant::{encode_alpha, encode_color, encode_fixed24, encode_rotation, encode_scale, encode_sh};
use crate::splat::{GaussianSplat, DEFAULT_FRACTIONAL_BITS};

/// Serialize the header and packed payload, without gzip framing.
pub fn write_splat_to_stream<W: Write>(splat: &GaussianSplat, stream: &mut W) -> Result<()> {
    splat.validate()?;
    match splat.version {
        Version::V1 => return Err(SpzError::UnsupportedVersion(1)),
        Version::V2 => {}
        Version::V3 => {
            if splat.fractional_bits != DEFAULT_FRACTIONAL_BITS {
                return Err(SpzError::Encode(format!(
                    "v3 requires {} fractional bits, scene has {}",
                    DEFAULT_FRACTIONAL_BITS, splat.fractional_bits
                )));
            }
        }
    }
    if let Some(i) = splat.positions.iter().position(|p| !p.is_finite()) {
        return Err(SpzError::Encode(format!(
            "non-finite position component at point {}",
            i / 3
        )));
    }
    debug!(
        "encoding {} splat: {} points, sh degree {}",
        splat.version, splat.num_points, splat.sh_degree
    );

    let header = splat.header();
    stream.write_all(bytemuck::bytes_of(&header))?;

    let mut position_data: Vec<u8> = Vec::with_capacity(splat.num_points * 9);
    for &p in &splat.positions {
        position_data.extend_from_slice(&encode_fixed24(p, splat.fractional_bits));
    }
    stream.write_all(&position_data)?;
    drop(position_data);

    let alpha_data: Vec<u8> = splat.alphas.iter().map(|&a| encode_alpha(a)).collect();
    stream.write_all(&alpha_data)?;
    drop(alpha_data);

    let color_data: Vec<u8> = splat.colors.iter().map(|&c| encode_color(c)).collect();
    stream.write_all(&color_data)?;
    drop(color_data);

    let scale_data: Vec<u8> = splat.scales.iter().map(|&s| encode_scale(s)).collect();
    stream.write_all(&scale_data)?;
    drop(scale_data);

    let mut rotation_data: Vec<u8> = Vec::with_capacity(splat.num_points * 3);
    for q in splat.rotations.chunks_exact(4) {
        rotation_data.extend_from_slice(&encode_rotation([q[0], q[1], q[2], q[3]]));
    }
    stream.write_all(&rotation_data)?;
    drop(rotation_data);

    let sh_dim = splat.sh_dim();
    if sh_dim > 0 {
        let sh_data: Vec<u8> = splat
            .spherical_harmonics
            .iter()
            .enumerate()
            .map(|(i, &v)| encode_sh(v, (i % sh_dim) / 3, splat.version))
            .collect();
        stream.write_all(&sh_data)?;
    }

    Ok(())
}

/// Encode a scene as a gzip-framed .spz byte buffer.
pub fn encode(splat: &GaussianSplat) -> Result<Vec<u8>> {
    let worst_case = HEADER_SIZE
        + splat.header().payload_size().unwrap_or(splat.num_points * 64);
    let mut bytes = Vec::with_capacity(worst_case);
    let mut encoder = GzEncoder::new(&mut bytes, Compression::best());
    write_splat_to_stream(splat, &mut encoder)?;
    encoder.finish()?;
    Ok(bytes)
}
