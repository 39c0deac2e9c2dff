//! Unbalanced interval tree over disjoint address ranges.
//!
//! Nodes live in a `Vec` and refer to their children by index. The tree is
//! built once on a single thread and never mutated afterwards, which makes it
//! safe to share for concurrent reads.
//!
//! There is no rebalancing: inserting ranges with monotonically increasing or
//! decreasing starts degrades the tree into a list, and queries become O(n).
//! The number of input blocks is expected to stay in the tens, so this is
//! accepted in exchange for a very small implementation.

use crate::error::{ExpandError, Result};
use crate::lookup::RangeLookup;
use crate::range::AddressRange;

#[derive(Debug, Clone)]
struct Node {
    range: AddressRange,
    left: Option<usize>,
    right: Option<usize>,
}

/// Binary search tree keyed by disjoint intervals.
#[derive(Debug, Clone, Default)]
pub struct IntervalTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl IntervalTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every range in input order. Fails on the first overlap.
    pub fn build(ranges: &[AddressRange]) -> Result<Self> {
        let mut tree = Self::new();
        for range in ranges {
            tree.insert(*range)?;
        }
        Ok(tree)
    }

    /// Insert a range, descending left when it ends before the current node
    /// and right when it starts after it. Any other case is an overlap.
    pub fn insert(&mut self, range: AddressRange) -> Result<()> {
        let new_idx = self.nodes.len();

        let Some(mut curr) = self.root else {
            self.nodes.push(Node {
                range,
                left: None,
                right: None,
            });
            self.root = Some(new_idx);
            return Ok(());
        };

        loop {
            let node = &self.nodes[curr];
            let next = if range.end < node.range.start {
                node.left
            } else if range.start > node.range.end {
                node.right
            } else {
                return Err(ExpandError::Overlap {
                    new: range,
                    existing: node.range,
                });
            };

            match next {
                Some(child) => curr = child,
                None => {
                    let go_left = range.end < self.nodes[curr].range.start;
                    self.nodes.push(Node {
                        range,
                        left: None,
                        right: None,
                    });
                    let parent = &mut self.nodes[curr];
                    if go_left {
                        parent.left = Some(new_idx);
                    } else {
                        parent.right = Some(new_idx);
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Height of the tree (0 when empty).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();

        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[idx];
            stack.extend(node.left.map(|l| (l, depth + 1)));
            stack.extend(node.right.map(|r| (r, depth + 1)));
        }

        max_depth
    }
}

impl RangeLookup for IntervalTree {
    fn contains(&self, addr: u32) -> Option<&AddressRange> {
        let mut curr = self.root;

        while let Some(idx) = curr {
            let node = &self.nodes[idx];
            if addr < node.range.start {
                curr = node.left;
            } else if addr > node.range.end {
                curr = node.right;
            } else {
                return Some(&node.range);
            }
        }

        None
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::build_ranges;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> u32 {
        u32::from(s.parse::<Ipv4Addr>().unwrap())
    }

    #[test]
    fn test_empty_tree() {
        let tree = IntervalTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert!(tree.contains(0).is_none());
    }

    #[test]
    fn test_contains_descends_both_sides() {
        let ranges = build_ranges(&["10.0.1.0/24", "10.0.0.0/24", "10.0.2.0/24"]).unwrap();
        let tree = IntervalTree::build(&ranges).unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.contains(ip("10.0.0.17")).unwrap().block.to_string(), "10.0.0.0/24");
        assert_eq!(tree.contains(ip("10.0.1.0")).unwrap().block.to_string(), "10.0.1.0/24");
        assert_eq!(tree.contains(ip("10.0.2.255")).unwrap().block.to_string(), "10.0.2.0/24");
        assert!(tree.contains(ip("10.0.3.0")).is_none());
        assert!(tree.contains(ip("9.255.255.255")).is_none());
    }

    #[test]
    fn test_rejects_overlap_naming_both_ranges() {
        let ranges = build_ranges(&["10.0.0.0/24", "10.0.0.128/25"]).unwrap();
        let err = IntervalTree::build(&ranges).unwrap_err();

        match &err {
            ExpandError::Overlap { new, existing } => {
                assert_eq!(new.block.to_string(), "10.0.0.128/25");
                assert_eq!(existing.block.to_string(), "10.0.0.0/24");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            err.to_string(),
            "overlapping ranges are not supported: 10.0.0.128/25 [10.0.0.128, 10.0.0.255] \
             overlaps with 10.0.0.0/24 [10.0.0.0, 10.0.0.255]"
        );
    }

    #[test]
    fn test_rejects_overlap_deep_in_tree() {
        let ranges = build_ranges(&["10.0.1.0/24", "10.0.0.0/24", "10.0.3.0/24", "10.0.0.64/26"])
            .unwrap();
        let err = IntervalTree::build(&ranges).unwrap_err();
        assert!(matches!(
            err,
            ExpandError::Overlap { ref existing, .. } if existing.block.to_string() == "10.0.0.0/24"
        ));
    }

    #[test]
    fn test_rejects_enclosing_range() {
        let ranges = build_ranges(&["10.0.0.128/25", "10.0.0.0/16"]).unwrap();
        assert!(IntervalTree::build(&ranges).is_err());
    }

    #[test]
    fn test_sorted_insertion_degenerates_to_list() {
        let blocks: Vec<String> = (0..16).map(|i| format!("10.0.{i}.0/24")).collect();
        let ranges = build_ranges(&blocks).unwrap();
        let tree = IntervalTree::build(&ranges).unwrap();

        assert_eq!(tree.depth(), 16);
        for i in 0..16 {
            assert!(tree.contains(ip(&format!("10.0.{i}.99"))).is_some());
        }
        assert!(tree.contains(ip("10.0.16.0")).is_none());
    }
}
