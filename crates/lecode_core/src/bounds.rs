//! Turns an unordered set of pointers into non-overlapping byte ranges.
//!
//! The parameter block stores offsets to its arrays but no lengths. An
//! array therefore ends where the next pointed-to array begins, or at the
//! end of the region when nothing follows it. Candidates that point at 0
//! or past the region are treated as absent.

use std::collections::BTreeMap;

use crate::layout::ByteRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub offset: u32,
    pub range: ByteRange,
    pub present: bool,
}

impl ResolvedRange {
    fn absent(offset: u32) -> Self {
        Self {
            offset,
            range: ByteRange::default(),
            present: false,
        }
    }

    pub fn max_count(&self, elem_size: usize) -> usize {
        if !self.present || elem_size == 0 {
            return 0;
        }
        self.range.len() / elem_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsMap<K: Ord> {
    region_len: usize,
    ranges: BTreeMap<K, ResolvedRange>,
}

impl<K: Ord + Copy> BoundsMap<K> {
    pub fn region_len(&self) -> usize {
        self.region_len
    }

    pub fn get(&self, key: K) -> ResolvedRange {
        self.ranges
            .get(&key)
            .copied()
            .unwrap_or_else(|| ResolvedRange::absent(0))
    }

    pub fn range(&self, key: K) -> Option<ByteRange> {
        let resolved = self.get(key);
        resolved.present.then_some(resolved.range)
    }

    pub fn max_count(&self, key: K, elem_size: usize) -> usize {
        self.get(key).max_count(elem_size)
    }

    /// `[min(offsets), max(offsets)]` over the valid candidates.
    pub fn extent(&self) -> Option<ByteRange> {
        let mut offsets = self
            .ranges
            .values()
            .filter(|r| r.present)
            .map(|r| r.range.start);
        let first = offsets.next()?;
        let (min, max) = offsets.fold((first, first), |(lo, hi), o| (lo.min(o), hi.max(o)));
        Some(ByteRange::new(min, max))
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, ResolvedRange)> + '_ {
        self.ranges.iter().map(|(k, v)| (*k, *v))
    }
}

pub fn resolve<K: Ord + Copy>(candidates: &[(K, u32)], region_len: usize) -> BoundsMap<K> {
    let is_valid = |offset: u32| offset > 0 && (offset as usize) < region_len;

    let mut valid: Vec<usize> = candidates
        .iter()
        .filter(|&&(_, offset)| is_valid(offset))
        .map(|&(_, offset)| offset as usize)
        .collect();
    valid.sort_unstable();
    valid.dedup();

    let mut ranges = BTreeMap::new();
    for &(key, offset) in candidates {
        let resolved = if is_valid(offset) {
            let start = offset as usize;
            let idx = valid.partition_point(|&o| o <= start);
            let end = valid.get(idx).copied().unwrap_or(region_len);
            ResolvedRange {
                offset,
                range: ByteRange { start, end },
                present: true,
            }
        } else {
            ResolvedRange::absent(offset)
        };
        ranges.insert(key, resolved);
    }

    BoundsMap { region_len, ranges }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_end_at_next_pointer() {
        let map = resolve(&[("c", 0x80), ("a", 0x20), ("b", 0x40)], 0x100);
        assert_eq!(map.range("a"), Some(ByteRange::new(0x20, 0x40)));
        assert_eq!(map.range("b"), Some(ByteRange::new(0x40, 0x80)));
        assert_eq!(map.range("c"), Some(ByteRange::new(0x80, 0x100)));
        assert_eq!(map.max_count("a", 4), 8);
        assert_eq!(map.extent(), Some(ByteRange::new(0x20, 0x80)));
    }

    #[test]
    fn zero_and_out_of_region_pointers_are_absent() {
        let map = resolve(&[("a", 0), ("b", 0x200), ("c", 0x100), ("d", 0x10)], 0x100);
        assert_eq!(map.range("a"), None);
        assert_eq!(map.range("b"), None);
        assert_eq!(map.range("c"), None);
        assert_eq!(map.max_count("b", 1), 0);
        assert_eq!(map.range("d"), Some(ByteRange::new(0x10, 0x100)));
        assert_eq!(map.extent(), Some(ByteRange::new(0x10, 0x10)));
    }

    #[test]
    fn equal_pointers_share_a_range() {
        let map = resolve(&[("a", 0x30), ("b", 0x30), ("c", 0x50)], 0x60);
        assert_eq!(map.range("a"), Some(ByteRange::new(0x30, 0x50)));
        assert_eq!(map.range("b"), Some(ByteRange::new(0x30, 0x50)));
    }
}
