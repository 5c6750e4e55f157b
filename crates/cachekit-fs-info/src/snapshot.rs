//! `Snapshot`: the six-map fact bundle a build records before doing work,
//! so it can later ask "is any of this still true?"

use std::collections::HashMap;
use std::hash::Hash;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::fact::{Fact, FsEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateSnapshotOptions {
    pub hash: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub start_time: Option<i64>,
    pub file_timestamps: HashMap<Utf8PathBuf, Fact<FsEntry>>,
    pub file_hashes: HashMap<Utf8PathBuf, Fact<String>>,
    pub context_timestamps: HashMap<Utf8PathBuf, Fact<FsEntry>>,
    pub context_hashes: HashMap<Utf8PathBuf, Fact<String>>,
    pub missing_timestamps: HashMap<Utf8PathBuf, Fact<FsEntry>>,
    pub managed_item_info: HashMap<Utf8PathBuf, Fact<String>>,
}

impl Snapshot {
    /// Total number of distinct paths recorded across all six fact maps,
    /// for diagnostics, as surfaced by the `inspect` CLI command.
    pub fn path_count(&self) -> usize {
        self.file_timestamps.len()
            + self.file_hashes.len()
            + self.context_timestamps.len()
            + self.context_hashes.len()
            + self.missing_timestamps.len()
            + self.managed_item_info.len()
    }
}

/// Union two snapshots: on a key collision `b` wins, and `start_time` is
/// whichever side has it, or the smaller of the two if both do (a merged
/// snapshot's validation window must never be wider than either input's).
pub fn merge_snapshots(a: &Snapshot, b: &Snapshot) -> Snapshot {
    let start_time = match (a.start_time, b.start_time) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    };

    Snapshot {
        start_time,
        file_timestamps: merge_map(&a.file_timestamps, &b.file_timestamps),
        file_hashes: merge_map(&a.file_hashes, &b.file_hashes),
        context_timestamps: merge_map(&a.context_timestamps, &b.context_timestamps),
        context_hashes: merge_map(&a.context_hashes, &b.context_hashes),
        missing_timestamps: merge_map(&a.missing_timestamps, &b.missing_timestamps),
        managed_item_info: merge_map(&a.managed_item_info, &b.managed_item_info),
    }
}

fn merge_map<K: Clone + Eq + Hash, V: Clone>(a: &HashMap<K, V>, b: &HashMap<K, V>) -> HashMap<K, V> {
    let mut merged = a.clone();
    merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap_with(path: &str, entry: FsEntry) -> Snapshot {
        let mut s = Snapshot { start_time: Some(100), ..Default::default() };
        s.file_timestamps.insert(Utf8PathBuf::from(path), Fact::Present(entry));
        s
    }

    #[test]
    fn merging_a_snapshot_with_itself_is_idempotent() {
        let s = snap_with("/a", FsEntry { safe_time: 10, timestamp: Some(5) });
        let merged = merge_snapshots(&s, &s);
        assert_eq!(merged, s);
    }

    #[test]
    fn merging_disjoint_snapshots_commutes() {
        let a = snap_with("/a", FsEntry { safe_time: 10, timestamp: Some(5) });
        let b = snap_with("/b", FsEntry { safe_time: 20, timestamp: Some(15) });
        let ab = merge_snapshots(&a, &b);
        let ba = merge_snapshots(&b, &a);
        assert_eq!(ab, ba);
        assert_eq!(ab.file_timestamps.len(), 2);
    }

    #[test]
    fn merging_overlapping_keys_keeps_the_second_arguments_value() {
        let a = snap_with("/a", FsEntry { safe_time: 10, timestamp: Some(5) });
        let b = snap_with("/a", FsEntry { safe_time: 999, timestamp: Some(900) });
        let merged = merge_snapshots(&a, &b);
        assert_eq!(
            merged.file_timestamps.get(&Utf8PathBuf::from("/a")),
            Some(&Fact::Present(FsEntry { safe_time: 999, timestamp: Some(900) }))
        );
    }

    #[test]
    fn start_time_takes_the_minimum_when_both_sides_have_one() {
        let mut a = snap_with("/a", FsEntry { safe_time: 1, timestamp: None });
        a.start_time = Some(500);
        let mut b = snap_with("/b", FsEntry { safe_time: 1, timestamp: None });
        b.start_time = Some(200);
        let merged = merge_snapshots(&a, &b);
        assert_eq!(merged.start_time, Some(200));
    }

    #[test]
    fn start_time_falls_back_to_whichever_side_has_one() {
        let mut a = snap_with("/a", FsEntry { safe_time: 1, timestamp: None });
        a.start_time = None;
        let mut b = snap_with("/b", FsEntry { safe_time: 1, timestamp: None });
        b.start_time = Some(42);
        let merged = merge_snapshots(&a, &b);
        assert_eq!(merged.start_time, Some(42));
    }

    proptest::proptest! {
        // Re-merging a snapshot's own merge result must not change it: a
        // validation window, once computed, stays fixed under repeated folding.
        #[test]
        fn merge_is_idempotent_for_any_pair_of_start_times(
            a_start in proptest::option::of(0i64..10_000),
            b_start in proptest::option::of(0i64..10_000),
        ) {
            let mut a = snap_with("/a", FsEntry { safe_time: 1, timestamp: Some(1) });
            a.start_time = a_start;
            let mut b = snap_with("/b", FsEntry { safe_time: 2, timestamp: Some(2) });
            b.start_time = b_start;

            let once = merge_snapshots(&a, &b);
            let twice = merge_snapshots(&once, &b);
            prop_assert_eq!(once.start_time, twice.start_time);
        }

        // start_time of a merge is never narrower than the true minimum of
        // whichever sides provided one.
        #[test]
        fn merged_start_time_is_never_later_than_either_known_side(
            a_start in proptest::option::of(0i64..10_000),
            b_start in proptest::option::of(0i64..10_000),
        ) {
            let mut a = snap_with("/a", FsEntry { safe_time: 1, timestamp: Some(1) });
            a.start_time = a_start;
            let mut b = snap_with("/b", FsEntry { safe_time: 2, timestamp: Some(2) });
            b.start_time = b_start;

            let merged = merge_snapshots(&a, &b);
            if let Some(known_min) = a_start.into_iter().chain(b_start).min() {
                prop_assert!(merged.start_time.unwrap() <= known_min);
            }
        }
    }
}
