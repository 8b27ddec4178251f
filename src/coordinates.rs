//! Signed-axis coordinate bases and the conversions between them.
//!
//! Every named basis uses the same axis order `(X, Y, Z)` and differs only in
//! per-axis sign, so any basis-to-basis transform is a signed diagonal matrix.
//! Conversion therefore reduces to three flip vectors: one for positions, one
//! for the quaternion vector part, and one per SH coefficient.

use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A signed-axis orientation triple: handedness (L/R), vertical direction
/// (U/D), and depth direction (F/B).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CoordinateSystem {
    Ldb,
    Rdb,
    Lub,
    Rub,
    Ldf,
    Rdf,
    Luf,
    Ruf,
    #[default]
    Unspecified,
}

impl CoordinateSystem {
    pub const ALL: [CoordinateSystem; 9] = [
        CoordinateSystem::Ldb,
        CoordinateSystem::Rdb,
        CoordinateSystem::Lub,
        CoordinateSystem::Rub,
        CoordinateSystem::Ldf,
        CoordinateSystem::Rdf,
        CoordinateSystem::Luf,
        CoordinateSystem::Ruf,
        CoordinateSystem::Unspecified,
    ];

    pub fn short_name(self) -> &'static str {
        match self {
            CoordinateSystem::Ldb => "LDB",
            CoordinateSystem::Rdb => "RDB",
            CoordinateSystem::Lub => "LUB",
            CoordinateSystem::Rub => "RUB",
            CoordinateSystem::Ldf => "LDF",
            CoordinateSystem::Rdf => "RDF",
            CoordinateSystem::Luf => "LUF",
            CoordinateSystem::Ruf => "RUF",
            CoordinateSystem::Unspecified => "UNSPECIFIED",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            CoordinateSystem::Ldb => "Left-Down-Back",
            CoordinateSystem::Rdb => "Right-Down-Back",
            CoordinateSystem::Lub => "Left-Up-Back",
            CoordinateSystem::Rub => "Right-Up-Back",
            CoordinateSystem::Ldf => "Left-Down-Front",
            CoordinateSystem::Rdf => "Right-Down-Front",
            CoordinateSystem::Luf => "Left-Up-Front",
            CoordinateSystem::Ruf => "Right-Up-Front",
            CoordinateSystem::Unspecified => "Unspecified",
        }
    }

    /// Parse 3-letter, dashed, or underscored forms, case-insensitively.
    /// Unknown strings map to `Unspecified`.
    pub fn parse(s: &str) -> CoordinateSystem {
        let cleaned = s.trim().to_ascii_uppercase();
        let parts: Vec<&str> = cleaned.split(['-', '_']).filter(|p| !p.is_empty()).collect();
        let key: String = if parts.len() == 3 {
            parts.iter().filter_map(|p| p.chars().next()).collect()
        } else {
            cleaned
        };
        match key.as_str() {
            "LDB" => CoordinateSystem::Ldb,
            "RDB" => CoordinateSystem::Rdb,
            "LUB" => CoordinateSystem::Lub,
            "RUB" => CoordinateSystem::Rub,
            "LDF" => CoordinateSystem::Ldf,
            "RDF" => CoordinateSystem::Rdf,
            "LUF" => CoordinateSystem::Luf,
            "RUF" => CoordinateSystem::Ruf,
            _ => CoordinateSystem::Unspecified,
        }
    }

    /// Per-axis signs, taking `(R, U, B)` as positive. `None` for
    /// `Unspecified`.
    fn axis_signs(self) -> Option<[f32; 3]> {
        match self {
            CoordinateSystem::Ldb => Some([-1.0, -1.0, 1.0]),
            CoordinateSystem::Rdb => Some([1.0, -1.0, 1.0]),
            CoordinateSystem::Lub => Some([-1.0, 1.0, 1.0]),
            CoordinateSystem::Rub => Some([1.0, 1.0, 1.0]),
            CoordinateSystem::Ldf => Some([-1.0, -1.0, -1.0]),
            CoordinateSystem::Rdf => Some([1.0, -1.0, -1.0]),
            CoordinateSystem::Luf => Some([-1.0, 1.0, -1.0]),
            CoordinateSystem::Ruf => Some([1.0, 1.0, -1.0]),
            CoordinateSystem::Unspecified => None,
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

impl FromStr for CoordinateSystem {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CoordinateSystem::parse(s))
    }
}

/// Sign flips rewriting a splat from one basis to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CoordinateConverter {
    /// Per-axis position flips.
    pub flip_p: [f32; 3],
    /// Flips for the quaternion vector part; `w` is untouched.
    pub flip_q: [f32; 3],
    /// Per-coefficient SH parities for bands 1..=3.
    pub flip_sh: [f32; 15],
}

impl CoordinateConverter {
    pub fn between(from: CoordinateSystem, to: CoordinateSystem) -> Self {
        let (Some(from), Some(to)) = (from.axis_signs(), to.axis_signs()) else {
            return Self::identity();
        };
        let flip_p = [from[0] * to[0], from[1] * to[1], from[2] * to[2]];
        Self::from_flips(flip_p)
    }

    fn identity() -> Self {
        Self::from_flips([1.0, 1.0, 1.0])
    }

    fn from_flips(flip_p: [f32; 3]) -> Self {
        let [x, y, z] = flip_p;
        // Conjugating a rotation by diag(x, y, z) flips each vector component
        // by the product of the other two axis signs; for reflections this is
        // the rotation-plus-conjugation decomposition.
        let flip_q = [y * z, x * z, x * y];
        // Real-SH basis function parities under per-axis inversion, bands
        // 1..=3 in coefficient order.
        let flip_sh = [
            y,
            z,
            x,
            x * y,
            y * z,
            1.0,
            x * z,
            1.0,
            y,
            x * y * z,
            y,
            z,
            x,
            z,
            x,
        ];
        Self { flip_p, flip_q, flip_sh }
    }

    pub fn is_identity(&self) -> bool {
        self.flip_p == [1.0, 1.0, 1.0]
    }
}
