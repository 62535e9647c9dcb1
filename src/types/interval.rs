//! Closed time intervals over unix-millisecond timestamps.
//!
//! The scheduling core does all window arithmetic on these; timestamps are
//! epoch milliseconds throughout (`UnixMs`).

use serde::{Deserialize, Serialize};

/// Epoch milliseconds.
pub type UnixMs = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start_time: UnixMs,
    pub end_time: UnixMs,
}

impl Interval {
    pub fn new(start_time: UnixMs, end_time: UnixMs) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    pub fn size(&self) -> i64 {
        self.end_time - self.start_time
    }

    pub fn covers(&self, time: UnixMs) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start_time <= other.start_time && other.end_time <= self.end_time
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        if self.overlaps(other) {
            Some(Interval::new(
                self.start_time.max(other.start_time),
                self.end_time.min(other.end_time),
            ))
        } else {
            None
        }
    }

    /// Move the start later and the end earlier. `None` if nothing remains.
    pub fn shrink(&self, postpone_start: i64, prepone_end: i64) -> Option<Interval> {
        if self.size() < postpone_start + prepone_end {
            return None;
        }
        Some(Interval::new(
            self.start_time + postpone_start,
            self.end_time - prepone_end,
        ))
    }

    pub fn expand(&self, prepone_start: i64, postpone_end: i64) -> Interval {
        Interval::new(self.start_time - prepone_start, self.end_time + postpone_end)
    }

    pub fn shift(&self, offset: i64) -> Interval {
        Interval::new(self.start_time + offset, self.end_time + offset)
    }

    /// Expand to whole minutes (floor the start, ceil the end).
    pub fn expand_to_full_minutes(&self) -> Interval {
        const MINUTE: i64 = 60_000;
        Interval::new(
            self.start_time.div_euclid(MINUTE) * MINUTE,
            (self.end_time + MINUTE - 1).div_euclid(MINUTE) * MINUTE,
        )
    }

    /// Merge overlapping or touching intervals into a disjoint sorted list.
    pub fn merge_all(mut intervals: Vec<Interval>) -> Vec<Interval> {
        intervals.sort_by_key(|i| i.start_time);
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.end_time >= interval.start_time => {
                    last.end_time = last.end_time.max(interval.end_time);
                }
                _ => merged.push(interval),
            }
        }
        merged
    }

    /// Pairwise intersection of two interval lists.
    pub fn intersect_all(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
        let mut result = Vec::new();
        for x in a {
            for y in b {
                if let Some(i) = x.intersect(y) {
                    result.push(i);
                }
            }
        }
        Interval::merge_all(result)
    }

    /// Remove every part of `minus` from `from`.
    pub fn subtract_all(from: &[Interval], minus: &[Interval]) -> Vec<Interval> {
        let minus = Interval::merge_all(minus.to_vec());
        let mut result = Vec::new();
        for interval in from {
            let mut remaining = vec![*interval];
            for cut in &minus {
                let mut next = Vec::new();
                for piece in remaining {
                    if !piece.overlaps(cut) {
                        next.push(piece);
                        continue;
                    }
                    if piece.start_time < cut.start_time {
                        next.push(Interval::new(piece.start_time, cut.start_time));
                    }
                    if cut.end_time < piece.end_time {
                        next.push(Interval::new(cut.end_time, piece.end_time));
                    }
                }
                remaining = next;
            }
            result.extend(remaining);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_overlapping() {
        let a = Interval::new(0, 100);
        let b = Interval::new(50, 150);
        assert_eq!(a.intersect(&b), Some(Interval::new(50, 100)));
    }

    #[test]
    fn test_intersect_disjoint_is_none() {
        let a = Interval::new(0, 10);
        let b = Interval::new(20, 30);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn test_touching_does_not_overlap() {
        let a = Interval::new(0, 10);
        let b = Interval::new(10, 20);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_shrink_to_nothing() {
        let a = Interval::new(0, 10);
        assert_eq!(a.shrink(6, 6), None);
        assert_eq!(a.shrink(4, 6), Some(Interval::new(4, 4)));
    }

    #[test]
    fn test_merge_all_collapses_touching() {
        let merged = Interval::merge_all(vec![
            Interval::new(20, 30),
            Interval::new(0, 10),
            Interval::new(10, 20),
        ]);
        assert_eq!(merged, vec![Interval::new(0, 30)]);
    }

    #[test]
    fn test_merge_all_keeps_gaps() {
        let merged = Interval::merge_all(vec![Interval::new(0, 10), Interval::new(15, 20)]);
        assert_eq!(merged, vec![Interval::new(0, 10), Interval::new(15, 20)]);
    }

    #[test]
    fn test_subtract_all_splits() {
        let result =
            Interval::subtract_all(&[Interval::new(0, 100)], &[Interval::new(40, 60)]);
        assert_eq!(result, vec![Interval::new(0, 40), Interval::new(60, 100)]);
    }

    #[test]
    fn test_subtract_all_no_overlap() {
        let result =
            Interval::subtract_all(&[Interval::new(0, 10)], &[Interval::new(20, 30)]);
        assert_eq!(result, vec![Interval::new(0, 10)]);
    }

    #[test]
    fn test_intersect_all() {
        let a = vec![Interval::new(0, 50), Interval::new(100, 150)];
        let b = vec![Interval::new(25, 125)];
        assert_eq!(
            Interval::intersect_all(&a, &b),
            vec![Interval::new(25, 50), Interval::new(100, 125)]
        );
    }

    #[test]
    fn test_expand_to_full_minutes() {
        let i = Interval::new(61_000, 119_000);
        assert_eq!(i.expand_to_full_minutes(), Interval::new(60_000, 120_000));
    }
}
