//! Reading and writing 3D Gaussian splat scenes in the `.spz` container
//! format.
//!
//! A scene is a point cloud of anisotropic Gaussians held as six parallel
//! arrays ([`GaussianSplat`]). The container is a gzip stream whose
//! decompressed form is a 16-byte header followed by the quantized column
//! arrays. Versions 1 through 3 are read; versions 2 and 3 are written, with
//! v3 as the default.
//!
//! ```no_run
//! use spz::{load, save, CoordinateSystem};
//!
//! let mut splat = load("scene.spz", CoordinateSystem::Unspecified)?;
//! splat.convert_coordinates(CoordinateSystem::Rub, CoordinateSystem::Rdf);
//! save(&splat, "converted.spz", CoordinateSystem::Unspecified)?;
//! # Ok::<(), spz::SpzError>(())
//! ```

pub mod coordinates;
pub mod error;
pub mod format;
mod quant;
pub mod reader;
pub mod splat;
pub mod writer;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

pub use coordinates::CoordinateSystem;
pub use error::{Result, SpzError};
pub use format::{Header, Version};
pub use splat::{BoundingBox, Gaussian, GaussianSplat};

/// The coordinate basis .spz payloads are stored in. Files carry no basis of
/// their own, so conversions on load/save are relative to this one.
pub const FILE_COORDINATE_SYSTEM: CoordinateSystem = CoordinateSystem::Rub;

/// Read a scene from a file. When `coordinate_system` is not `Unspecified`,
/// the scene is converted from the file basis ([`FILE_COORDINATE_SYSTEM`])
/// into it.
pub fn load(path: impl AsRef<Path>, coordinate_system: CoordinateSystem) -> Result<GaussianSplat> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut splat = reader::read_splat_from_stream(&mut decoder)?;
    splat.convert_coordinates(FILE_COORDINATE_SYSTEM, coordinate_system);
    Ok(splat)
}

/// Write a scene to a file. When `coordinate_system` is not `Unspecified`,
/// the scene is treated as being in that basis and converted to the file
/// basis before encoding; the caller's scene is left untouched.
pub fn save(
    splat: &GaussianSplat,
    path: impl AsRef<Path>,
    coordinate_system: CoordinateSystem,
) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    match converted_for_write(splat, coordinate_system) {
        Some(converted) => writer::write_splat_to_stream(&converted, &mut encoder)?,
        None => writer::write_splat_to_stream(splat, &mut encoder)?,
    }
    encoder.finish()?.flush()?;
    Ok(())
}

/// [`save`] without the filesystem: encode into a gzip-framed byte buffer.
pub fn to_bytes(splat: &GaussianSplat, coordinate_system: CoordinateSystem) -> Result<Vec<u8>> {
    match converted_for_write(splat, coordinate_system) {
        Some(converted) => writer::encode(&converted),
        None => writer::encode(splat),
    }
}

/// [`load`] without the filesystem: decode a gzip-framed byte slice.
pub fn from_bytes(bytes: &[u8], coordinate_system: CoordinateSystem) -> Result<GaussianSplat> {
    let mut splat = reader::decode(bytes)?;
    splat.convert_coordinates(FILE_COORDINATE_SYSTEM, coordinate_system);
    Ok(splat)
}

/// Read only the 16-byte header of a file, decompressing no more than needed.
pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    reader::read_header_from_stream(&mut decoder)
}

fn converted_for_write(
    splat: &GaussianSplat,
    coordinate_system: CoordinateSystem,
) -> Option<GaussianSplat> {
    if coordinate_system == CoordinateSystem::Unspecified
        || coordinate_system == FILE_COORDINATE_SYSTEM
    {
        return None;
    }
    let mut converted = splat.clone();
    converted.convert_coordinates(coordinate_system, FILE_COORDINATE_SYSTEM);
    Some(converted)
}
