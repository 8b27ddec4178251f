//! The in-memory Gaussian splat scene.

use itertools::izip;
use serde::Serialize;
use std::fmt;
use vek::Vec3;

use crate::coordinates::{CoordinateConverter, CoordinateSystem};
use crate::error::{Result, SpzError};
use crate::format::{sh_coefficients_for_degree, Header, Version, MAX_FRACTIONAL_BITS};

/// Position precision used by freshly constructed scenes and required by v3.
pub const DEFAULT_FRACTIONAL_BITS: u8 = 12;

/// A point cloud of anisotropic Gaussians stored as parallel arrays.
///
/// The in-memory layout mirrors the file layout: six column arrays rather
/// than an array of point records. Scales are natural-log radii, alphas are
/// logit opacities, rotations are `(w, x, y, z)` quaternions (not required
/// to be unit-norm in memory), and spherical harmonics are coefficient-major
/// with interleaved RGB channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaussianSplat {
    pub version: Version,
    pub num_points: usize,
    pub sh_degree: u8,
    pub antialiased: bool,
    pub fractional_bits: u8,
    pub positions: Vec<f32>,
    pub scales: Vec<f32>,
    pub rotations: Vec<f32>,
    pub alphas: Vec<f32>,
    pub colors: Vec<f32>,
    pub spherical_harmonics: Vec<f32>,
}

/// A borrowed per-point view, for iteration and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gaussian<'a> {
    pub position: Vec3<f32>,
    pub scales: Vec3<f32>,
    pub rotation: [f32; 4],
    pub alpha: f32,
    pub color: Vec3<f32>,
    pub spherical_harmonics: &'a [f32],
}

/// Axis-aligned bounds over the scene positions.
///
/// An empty scene keeps the fold sentinels: `min` at `+inf` and `max` at
/// `-inf`. `center` and `size` are meaningless in that case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Vec3<f32>,
    pub max: Vec3<f32>,
}

impl BoundingBox {
    pub fn center(&self) -> Vec3<f32> {
        (self.min + self.max) / 2.0
    }

    pub fn size(&self) -> Vec3<f32> {
        self.max - self.min
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingBox(x=[{}, {}], y=[{}, {}], z=[{}, {}])",
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z
        )
    }
}

impl GaussianSplat {
    /// Build a v3 scene from raw column arrays, validating all widths.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        positions: Vec<f32>,
        scales: Vec<f32>,
        rotations: Vec<f32>,
        alphas: Vec<f32>,
        colors: Vec<f32>,
        sh_degree: u8,
        spherical_harmonics: Vec<f32>,
        antialiased: bool,
    ) -> Result<Self> {
        let splat = Self {
            version: Version::V3,
            num_points: alphas.len(),
            sh_degree,
            antialiased,
            fractional_bits: DEFAULT_FRACTIONAL_BITS,
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

    /// Verify every invariant the encoder relies on.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_points;
        let sh_dim = sh_coefficients_for_degree(self.sh_degree).ok_or_else(|| {
            SpzError::Shape(format!("invalid spherical harmonics degree {}", self.sh_degree))
        })? * 3;

        let check = |name: &str, actual: usize, expected: usize| -> Result<()> {
            if actual != expected {
                return Err(SpzError::Shape(format!(
                    "{name} has {actual} values, expected {expected} for {n} points"
                )));
            }
            Ok(())
        };
        check("positions", self.positions.len(), n * 3)?;
        check("scales", self.scales.len(), n * 3)?;
        check("rotations", self.rotations.len(), n * 4)?;
        check("alphas", self.alphas.len(), n)?;
        check("colors", self.colors.len(), n * 3)?;
        check("spherical_harmonics", self.spherical_harmonics.len(), n * sh_dim)?;

        if self.fractional_bits > MAX_FRACTIONAL_BITS {
            return Err(SpzError::Shape(format!(
                "fractional_bits {} exceeds the 24-bit position format",
                self.fractional_bits
            )));
        }
        Ok(())
    }

    /// Boolean form of [`validate`](Self::validate).
    pub fn check_sizes(&self) -> bool {
        self.validate().is_ok()
    }

    /// Per-point SH scalar count (coefficients times three channels).
    pub fn sh_dim(&self) -> usize {
        sh_coefficients_for_degree(self.sh_degree).unwrap_or(0) * 3
    }

    /// The 16-byte header this scene would serialize with.
    pub fn header(&self) -> Header {
        Header::new(
            self.version,
            self.num_points as u32,
            self.sh_degree,
            self.fractional_bits,
            self.antialiased,
        )
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut min = Vec3::broadcast(f32::INFINITY);
        let mut max = Vec3::broadcast(f32::NEG_INFINITY);
        for p in self.positions.chunks_exact(3) {
            let p = Vec3::new(p[0], p[1], p[2]);
            min = Vec3::partial_min(min, p);
            max = Vec3::partial_max(max, p);
        }
        BoundingBox { min, max }
    }

    /// Median ellipsoid volume, `(4*pi/3) * median(exp(sx + sy + sz))`.
    /// Returns `0.0` for an empty scene.
    pub fn median_volume(&self) -> f32 {
        let mut products: Vec<f32> =
            self.scales.chunks_exact(3).map(|s| f32::exp(s[0] + s[1] + s[2])).collect();
        if products.is_empty() {
            return 0.0;
        }
        products.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = products.len() / 2;
        let median = if products.len() % 2 == 0 {
            (products[mid - 1] + products[mid]) / 2.0
        } else {
            products[mid]
        };
        4.0 * std::f32::consts::PI / 3.0 * median
    }

    /// Rewrite the scene from one coordinate system to another, in place.
    ///
    /// Positions and the quaternion vector parts flip per axis; SH bands pick
    /// up their basis-function parities. Scales, alphas, and base colors are
    /// invariant. Identity pairs leave every array bit-exact.
    pub fn convert_coordinates(&mut self, from: CoordinateSystem, to: CoordinateSystem) {
        let converter = CoordinateConverter::between(from, to);
        if converter.is_identity() {
            return;
        }
        log::debug!(
            "converting {} points from {} to {}",
            self.num_points,
            from.short_name(),
            to.short_name()
        );

        for p in self.positions.chunks_exact_mut(3) {
            for i in 0..3 {
                p[i] *= converter.flip_p[i];
            }
        }
        for q in self.rotations.chunks_exact_mut(4) {
            // Memory order is (w, x, y, z); w is untouched.
            for i in 0..3 {
                q[i + 1] *= converter.flip_q[i];
            }
        }
        let sh_dim = self.sh_dim();
        if sh_dim > 0 {
            for point in self.spherical_harmonics.chunks_exact_mut(sh_dim) {
                for (i, value) in point.iter_mut().enumerate() {
                    *value *= converter.flip_sh[i / 3];
                }
            }
        }
    }

    /// Iterate the columns as per-point views.
    pub fn gaussians(&self) -> impl Iterator<Item = Gaussian<'_>> {
        let sh_dim = self.sh_dim();
        izip!(
            self.positions.chunks_exact(3),
            self.scales.chunks_exact(3),
            self.rotations.chunks_exact(4),
            self.alphas.iter(),
            self.colors.chunks_exact(3),
        )
        .enumerate()
        .map(move |(i, (position, scales, rotation, &alpha, color))| Gaussian {
            position: Vec3::new(position[0], position[1], position[2]),
            scales: Vec3::new(scales[0], scales[1], scales[2]),
            rotation: [rotation[0], rotation[1], rotation[2], rotation[3]],
            alpha,
            color: Vec3::new(color[0], color[1], color[2]),
            spherical_harmonics: if sh_dim == 0 {
                &[]
            } else {
                &self.spherical_harmonics[i * sh_dim..(i + 1) * sh_dim]
            },
        })
    }

    pub fn pretty_fmt(&self) -> String {
        let bbox = self.bbox();
        format!(
            "GaussianSplat(num_points={}, sh_degree={}, antialiased={}, version={})\n  \
             {}\n  median_volume={}",
            self.num_points,
            self.sh_degree,
            self.antialiased,
            self.version,
            bbox,
            self.median_volume(),
        )
    }
}

impl fmt::Display for GaussianSplat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GaussianSplat(num_points={}, sh_degree={}, antialiased={}, version={})",
            self.num_points, self.sh_degree, self.antialiased, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    pub(crate) fn test_splat(num_points: usize) -> GaussianSplat {
        let mut positions = Vec::with_capacity(num_points * 3);
        for i in 0..num_points {
            let base = i as f32;
            positions.extend_from_slice(&[base, base * 0.5 - 1.0, -base * 0.25]);
        }
        GaussianSplat::new(
            positions,
            vec![-5.0; num_points * 3],
            [1.0, 0.0, 0.0, 0.0].repeat(num_points),
            vec![0.0; num_points],
            vec![0.0; num_points * 3],
            0,
            Vec::new(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates() {
        let splat = test_splat(10);
        assert_eq!(splat.num_points, 10);
        assert_eq!(splat.version, Version::V3);
        assert_eq!(splat.fractional_bits, DEFAULT_FRACTIONAL_BITS);
        assert!(splat.check_sizes());
    }

    #[test]
    fn test_sh_width_mismatch_is_shape_error() {
        // Degree 2 requires 8 * 3 scalars per point, not 3 * 3.
        let err = GaussianSplat::new(
            vec![0.0; 3],
            vec![-5.0; 3],
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0],
            vec![0.0; 3],
            2,
            vec![0.0; 9],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, SpzError::Shape(_)));
    }

    #[test]
    fn test_bad_degree_is_shape_error() {
        let mut splat = test_splat(2);
        splat.sh_degree = 7;
        assert!(matches!(splat.validate(), Err(SpzError::Shape(_))));
        assert!(!splat.check_sizes());
    }

    #[test]
    fn test_wrong_array_length_is_shape_error() {
        let mut splat = test_splat(4);
        splat.positions.pop();
        assert!(matches!(splat.validate(), Err(SpzError::Shape(_))));
    }

    #[test]
    fn test_bbox_single_point() {
        let splat = GaussianSplat::new(
            vec![5.0, 10.0, 15.0],
            vec![-5.0; 3],
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.5],
            vec![1.0, 0.0, 0.0],
            0,
            Vec::new(),
            false,
        )
        .unwrap();
        let center = splat.bbox().center();
        assert_abs_diff_eq!(center.x, 5.0, epsilon = 0.1);
        assert_abs_diff_eq!(center.y, 10.0, epsilon = 0.1);
        assert_abs_diff_eq!(center.z, 15.0, epsilon = 0.1);
    }

    #[test]
    fn test_bbox_fields_and_center() {
        let splat = GaussianSplat::new(
            vec![-1.0, -2.0, -3.0, 4.0, 5.0, 6.0],
            vec![-5.0; 6],
            [1.0, 0.0, 0.0, 0.0].repeat(2),
            vec![0.0; 2],
            vec![0.0; 6],
            0,
            Vec::new(),
            false,
        )
        .unwrap();
        let bbox = splat.bbox();
        assert_eq!(bbox.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(bbox.center(), Vec3::new(1.5, 1.5, 1.5));
        assert_eq!(bbox.size(), Vec3::new(5.0, 7.0, 9.0));
    }

    #[test]
    fn test_bbox_empty_scene_sentinels() {
        let splat = GaussianSplat::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            0,
            Vec::new(),
            false,
        )
        .unwrap();
        let bbox = splat.bbox();
        assert_eq!(bbox.min, Vec3::broadcast(f32::INFINITY));
        assert_eq!(bbox.max, Vec3::broadcast(f32::NEG_INFINITY));
    }

    #[test]
    fn test_median_volume() {
        let splat = test_splat(100);
        let volume = splat.median_volume();
        assert!(volume > 0.0);
        // All scales are -5 per axis, so the median is exp(-15).
        assert_abs_diff_eq!(
            volume,
            4.0 * std::f32::consts::PI / 3.0 * f32::exp(-15.0),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_identity_conversion_is_bit_exact() {
        let mut splat = test_splat(10);
        let original = splat.clone();
        splat.convert_coordinates(CoordinateSystem::Unspecified, CoordinateSystem::Unspecified);
        assert_eq!(splat, original);
        splat.convert_coordinates(CoordinateSystem::Rub, CoordinateSystem::Rub);
        assert_eq!(splat, original);
    }

    #[test]
    fn test_rub_to_rdf_moves_positions() {
        let mut splat = test_splat(10);
        let original = splat.clone();
        splat.convert_coordinates(CoordinateSystem::Rub, CoordinateSystem::Rdf);
        assert_ne!(splat.positions, original.positions);
        // x is shared between the two bases; y and z flip.
        assert_eq!(splat.positions[3], original.positions[3]);
        assert_eq!(splat.positions[4], -original.positions[4]);
        assert_eq!(splat.positions[5], -original.positions[5]);
        // Scales are axis magnitudes and never change.
        assert_eq!(splat.scales, original.scales);
    }

    #[test]
    fn test_conversion_roundtrip_restores_everything() {
        let mut splat = GaussianSplat::new(
            vec![1.0, 2.0, 3.0, -4.0, 5.0, -6.0],
            vec![-5.0, -4.0, -3.0, -2.0, -1.0, 0.0],
            vec![0.5, 0.5, 0.5, 0.5, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0],
            vec![0.5; 6],
            1,
            vec![0.25; 18],
            false,
        )
        .unwrap();
        let original = splat.clone();
        for a in CoordinateSystem::ALL {
            for b in CoordinateSystem::ALL {
                splat.convert_coordinates(a, b);
                splat.convert_coordinates(b, a);
                assert_eq!(splat, original, "roundtrip {a:?} -> {b:?} not exact");
            }
        }
    }

    #[test]
    fn test_gaussian_views() {
        let splat = test_splat(3);
        let gaussians: Vec<_> = splat.gaussians().collect();
        assert_eq!(gaussians.len(), 3);
        assert_eq!(gaussians[1].position, Vec3::new(1.0, -0.5, -0.25));
        assert_eq!(gaussians[1].rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(gaussians[1].spherical_harmonics.len(), 0);
    }

    #[test]
    fn test_header_matches_fields() {
        let splat = test_splat(42);
        let header = splat.header();
        assert_eq!(header.num_points, 42);
        assert_eq!(header.sh_degree, 0);
        assert_eq!(header.fractional_bits, 12);
        assert!(!header.antialiased());
        assert!(header.is_valid());
    }

    #[test]
    fn test_pretty_fmt() {
        let splat = test_splat(100);
        let fmt = splat.pretty_fmt();
        assert!(fmt.contains("GaussianSplat"));
        assert!(fmt.contains("100"));
    }
}
