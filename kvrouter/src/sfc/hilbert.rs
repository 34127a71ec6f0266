//! N-dimensional Hilbert curve
//!
//! Uses Skilling's transpose ("Programming the Hilbert curve", 2004): the
//! coordinates are rewritten in place into the transposed Hilbert index,
//! whose bits are then interleaved into a scalar.

use super::{interleave, Curve, CurveParams};
use crate::error::Result;

/// Hilbert curve; consecutive indices are always adjacent grid cells
#[derive(Debug, Clone)]
pub struct HilbertCurve {
    params: CurveParams,
}

impl HilbertCurve {
    pub fn new(dimensions: u32, size: u64) -> Result<Self> {
        Ok(Self::from_params(CurveParams::new(dimensions, size)?))
    }

    pub(crate) fn from_params(params: CurveParams) -> Self {
        Self { params }
    }
}

impl Curve for HilbertCurve {
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
        let mut x = coords.to_vec();
        axes_to_transpose(&mut x, self.params.bits);
        Ok(interleave(&x, self.params.bits))
    }
}

fn axes_to_transpose(x: &mut [u64], bits: u32) {
    let n = x.len();
    if n == 0 || bits == 0 {
        return;
    }
    let m: u64 = 1 << (bits - 1);

    // Inverse undo
    let mut q = m;
    while q > 1 {
        let p = q - 1;
        for i in 0..n {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q >>= 1;
    }

    // Gray encode
    for i in 1..n {
        x[i] ^= x[i - 1];
    }
    let mut t = 0;
    q = m;
    while q > 1 {
        if x[n - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for v in x.iter_mut() {
        *v ^= t;
    }
}
