//! Index ranges and their assignment to nodes

use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous index range `[start, end)` owned by one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub node_id: String,
    pub start: u64,
    pub end: u64,
}

impl Group {
    /// Number of indices in the range
    pub fn width(&self) -> u64 {
        self.end - self.start
    }
}

/// Ordered, gap-free cover of `[0, length)` by node ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Space {
    groups: Vec<Group>,
    length: u64,
}

impl Space {
    /// An empty space; locates nothing
    pub fn empty(length: u64) -> Self {
        Self {
            groups: Vec::new(),
            length,
        }
    }

    /// Build a space from groups, checking that they tile `[0, length)`
    pub fn from_groups(groups: Vec<Group>, length: u64) -> Result<Self> {
        let mut expected = 0;
        for group in &groups {
            if group.start != expected || group.end < group.start {
                return Err(RouterError::Internal(format!(
                    "range [{}, {}) of node {} does not continue at {}",
                    group.start, group.end, group.node_id, expected
                )));
            }
            expected = group.end;
        }
        if !groups.is_empty() && expected != length {
            return Err(RouterError::Internal(format!(
                "ranges end at {} instead of {}",
                expected, length
            )));
        }
        Ok(Self { groups, length })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Node id owning `index`
    pub fn locate(&self, index: u64) -> Option<&str> {
        let pos = self.groups.partition_point(|g| g.end <= index);
        self.groups.get(pos).map(|g| g.node_id.as_str())
    }

    /// Total number of indices assigned to `node_id`
    pub fn share(&self, node_id: &str) -> u64 {
        self.groups
            .iter()
            .filter(|g| g.node_id == node_id)
            .map(Group::width)
            .sum()
    }
}

/// Recomputes range boundaries from node weights
pub trait Optimizer: Send + Sync + fmt::Debug {
    /// Assign `[0, length)` to the weighted nodes, in the given order
    fn optimize(&self, weights: &[(String, f64)], length: u64) -> Result<Space>;
}

/// One contiguous range per node, sized by power over total power.
///
/// Boundaries depend only on the ordered weight list, so the same membership
/// always yields the same partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeOptimizer;

impl Optimizer for RangeOptimizer {
    fn optimize(&self, weights: &[(String, f64)], length: u64) -> Result<Space> {
        if weights.is_empty() {
            return Ok(Space::empty(length));
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(RouterError::InvalidNode(format!(
                "total power must be positive, got {}",
                total
            )));
        }

        let mut groups = Vec::with_capacity(weights.len());
        let mut cumulative = 0.0;
        let mut start = 0u64;
        for (i, (node_id, weight)) in weights.iter().enumerate() {
            cumulative += weight;
            let end = if i + 1 == weights.len() {
                length
            } else {
                ((length as f64 * (cumulative / total)).floor() as u64).clamp(start, length)
            };
            groups.push(Group {
                node_id: node_id.clone(),
                start,
                end,
            });
            start = end;
        }
        Space::from_groups(groups, length)
    }
}
