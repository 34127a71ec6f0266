//! Morton (Z-order) curve

use super::{interleave, Curve, CurveParams};
use crate::error::Result;

/// Z-order curve: the index is the bit-interleaving of the coordinates
#[derive(Debug, Clone)]
pub struct MortonCurve {
    params: CurveParams,
}

impl MortonCurve {
    pub fn new(dimensions: u32, size: u64) -> Result<Self> {
        Ok(Self::from_params(CurveParams::new(dimensions, size)?))
    }

    pub(crate) fn from_params(params: CurveParams) -> Self {
        Self { params }
    }
}

impl Curve for MortonCurve {
    fn dimensions(&self) -> u32 {
        self.params.dimensions
    }

    fn size(&self) -> u64 {
        self.params.size()
    }

    fn length(&self) -> u64 {
        self.params.length()
    }

    fn encode(&self, coords: &[u64]) -> Result<u64> {
        self.params.check(coords)?;
        Ok(interleave(coords, self.params.bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_morton_2d_order() {
        let curve = MortonCurve::new(2, 4).unwrap();
        assert_eq!(curve.encode(&[0, 0]).unwrap(), 0);
        assert_eq!(curve.encode(&[0, 1]).unwrap(), 1);
        assert_eq!(curve.encode(&[1, 0]).unwrap(), 2);
        assert_eq!(curve.encode(&[1, 1]).unwrap(), 3);
        assert_eq!(curve.encode(&[2, 1]).unwrap(), 9);
        assert_eq!(curve.encode(&[3, 3]).unwrap(), 15);
    }

    #[test]
    fn test_morton_covers_whole_space() {
        let curve = MortonCurve::new(3, 4).unwrap();
        let mut seen = HashSet::new();
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let idx = curve.encode(&[x, y, z]).unwrap();
                    assert!(idx < curve.length());
                    assert!(seen.insert(idx));
                }
            }
        }
        assert_eq!(seen.len() as u64, curve.length());
    }

    #[test]
    fn test_morton_rejects_out_of_range() {
        let curve = MortonCurve::new(2, 4).unwrap();
        assert!(curve.encode(&[4, 0]).is_err());
        assert!(curve.encode(&[0, 0, 0]).is_err());
    }
}
