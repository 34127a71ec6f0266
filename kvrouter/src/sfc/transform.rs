//! Key to coordinate transforms

use sha2::{Digest, Sha256};
use std::fmt;

/// Projects a key onto a point of the curve's grid
pub trait Transform: Send + Sync + fmt::Debug {
    /// Return `dimensions` coordinates, each in `0..size`
    fn coordinates(&self, key: &str, dimensions: u32, size: u64) -> Vec<u64>;
}

/// Default transform for a flat key space.
///
/// Each coordinate is taken from 8 bytes of a SHA-256 digest of the key, so
/// keys spread uniformly over the grid. Dimensions beyond the first four are
/// fed from further digests salted with a block counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyTransform;

impl Transform for KeyTransform {
    fn coordinates(&self, key: &str, dimensions: u32, size: u64) -> Vec<u64> {
        let mut coords = Vec::with_capacity(dimensions as usize);
        let mut block: u32 = 0;
        while coords.len() < dimensions as usize {
            let digest = Sha256::new()
                .chain_update(key.as_bytes())
                .chain_update(block.to_be_bytes())
                .finalize();
            for chunk in digest.chunks_exact(8) {
                if coords.len() == dimensions as usize {
                    break;
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                coords.push(u64::from_be_bytes(bytes) % size);
            }
            block += 1;
        }
        coords
    }
}
