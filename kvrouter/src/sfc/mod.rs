//! Space-filling-curve partitioning
//!
//! Keys are projected onto a point in a `dimensions`-dimensional grid of
//! `size` cells per side, the point is mapped to a scalar index along a
//! space-filling curve, and the index space is split into contiguous ranges
//! owned by nodes.
//!
//! ```text
//! key → Transform → [x0, x1, ...] → Curve → index → Space → node id
//!                                                     ↑
//!                                      Optimizer(weights) rebuilds ranges
//! ```

mod hilbert;
mod morton;
mod space;
mod transform;

pub use hilbert::HilbertCurve;
pub use morton::MortonCurve;
pub use space::{Group, Optimizer, RangeOptimizer, Space};
pub use transform::{KeyTransform, Transform};

use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest index width supported; keeps `length()` representable in a u64
pub const MAX_INDEX_BITS: u32 = 63;

/// Supported curve kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum CurveType {
    Morton,
    #[default]
    Hilbert,
}

impl FromStr for CurveType {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_matches('"').to_lowercase().as_str() {
            "morton" => Ok(CurveType::Morton),
            "hilbert" => Ok(CurveType::Hilbert),
            other => Err(RouterError::Config(format!("unknown curve type: {}", other))),
        }
    }
}

impl TryFrom<String> for CurveType {
    type Error = RouterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveType::Morton => write!(f, "morton"),
            CurveType::Hilbert => write!(f, "hilbert"),
        }
    }
}

/// Maps grid coordinates to a scalar index
pub trait Curve: Send + Sync + fmt::Debug {
    /// Number of dimensions
    fn dimensions(&self) -> u32;

    /// Cells per dimension
    fn size(&self) -> u64;

    /// Number of distinct indices (`size ^ dimensions`)
    fn length(&self) -> u64;

    /// Map a coordinate vector to its index along the curve
    fn encode(&self, coords: &[u64]) -> Result<u64>;
}

/// Build a curve of the given kind
pub fn new_curve(kind: CurveType, dimensions: u32, size: u64) -> Result<Box<dyn Curve>> {
    let params = CurveParams::new(dimensions, size)?;
    Ok(match kind {
        CurveType::Morton => Box::new(MortonCurve::from_params(params)),
        CurveType::Hilbert => Box::new(HilbertCurve::from_params(params)),
    })
}

/// Validated grid geometry shared by all curves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CurveParams {
    pub dimensions: u32,
    pub bits: u32,
}

impl CurveParams {
    pub fn new(dimensions: u32, size: u64) -> Result<Self> {
        if dimensions == 0 {
            return Err(RouterError::Config("curve needs at least one dimension".into()));
        }
        if size < 2 || !size.is_power_of_two() {
            return Err(RouterError::Config(format!(
                "curve size must be a power of two >= 2, got {}",
                size
            )));
        }
        let bits = size.trailing_zeros();
        if dimensions as u64 * bits as u64 > MAX_INDEX_BITS as u64 {
            return Err(RouterError::Config(format!(
                "{} dimensions of size {} exceed {} index bits",
                dimensions, size, MAX_INDEX_BITS
            )));
        }
        Ok(Self { dimensions, bits })
    }

    pub fn size(&self) -> u64 {
        1 << self.bits
    }

    pub fn length(&self) -> u64 {
        1 << (self.bits * self.dimensions)
    }

    pub fn check(&self, coords: &[u64]) -> Result<()> {
        if coords.len() != self.dimensions as usize {
            return Err(RouterError::Internal(format!(
                "expected {} coordinates, got {}",
                self.dimensions,
                coords.len()
            )));
        }
        if let Some(c) = coords.iter().find(|&&c| c >= self.size()) {
            return Err(RouterError::Internal(format!(
                "coordinate {} outside curve size {}",
                c,
                self.size()
            )));
        }
        Ok(())
    }
}

/// Interleave coordinate bits, most significant first, dimension 0 leading
pub(crate) fn interleave(coords: &[u64], bits: u32) -> u64 {
    let mut index = 0u64;
    for bit in (0..bits).rev() {
        for c in coords {
            index = (index << 1) | ((c >> bit) & 1);
        }
    }
    index
}
