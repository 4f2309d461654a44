//! Reconciliation planning.
//!
//! Given the current source items and a target sequence, the planner decides
//! which old item each target item keeps (if any) and which of the kept items
//! can stay where they are. Execution lives in the collection; this module is
//! pure and works on slices only.
//!
//! Matching pairs every target item, in target order, with the earliest
//! unmatched old item that is equal to it. The common prefix is paired
//! position by position first, which gives the same pairing. Among the matched items, the longest run whose old
//! order already agrees with the target order stays put; every other matched
//! item is moved.

use std::collections::{HashMap, VecDeque};

use crate::comparer::ItemComparer;

/// Outcome of matching old items against new ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconcilePlan {
    /// For each old index, the new index it is kept at.
    pub(crate) old_to_new: Vec<Option<usize>>,
    /// For each new index, the old index whose item is kept there.
    pub(crate) new_to_old: Vec<Option<usize>>,
    /// For each new index, whether its kept item keeps its relative position.
    pub(crate) stationary: Vec<bool>,
}

impl ReconcilePlan {
    pub(crate) fn removed(&self) -> usize {
        self.old_to_new.iter().filter(|m| m.is_none()).count()
    }

    pub(crate) fn inserted(&self) -> usize {
        self.new_to_old.iter().filter(|m| m.is_none()).count()
    }

    pub(crate) fn matched(&self) -> usize {
        self.new_to_old.len() - self.inserted()
    }

    pub(crate) fn moved(&self) -> usize {
        self.matched() - self.stationary.iter().filter(|&&s| s).count()
    }

    /// Returns `true` if applying the plan changes nothing structurally.
    pub(crate) fn is_identity(&self) -> bool {
        self.old_to_new.len() == self.new_to_old.len()
            && self
                .old_to_new
                .iter()
                .enumerate()
                .all(|(old, new)| *new == Some(old))
    }
}

struct Matcher<'a, T> {
    comparer: Option<&'a dyn ItemComparer<T>>,
}

impl<T: PartialEq> Matcher<'_, T> {
    fn equals(&self, a: &T, b: &T) -> bool {
        match self.comparer {
            Some(comparer) => comparer.equals(a, b),
            None => a == b,
        }
    }

    fn hash(&self, item: &T) -> Option<u64> {
        self.comparer.and_then(|comparer| comparer.item_hash(item))
    }
}

/// Matches `new` against `old`.
pub(crate) fn plan<T: PartialEq>(
    old: &[T],
    new: &[T],
    comparer: Option<&dyn ItemComparer<T>>,
) -> ReconcilePlan {
    let matcher = Matcher { comparer };
    let mut old_to_new = vec![None; old.len()];
    let mut new_to_old = vec![None; new.len()];

    let mut start = 0;
    while start < old.len() && start < new.len() && matcher.equals(&old[start], &new[start]) {
        old_to_new[start] = Some(start);
        new_to_old[start] = Some(start);
        start += 1;
    }

    // No suffix anchoring: with duplicates it would keep the latest equal
    // old item instead of the earliest one.
    match_rest(
        &matcher,
        old,
        new,
        start..old.len(),
        start..new.len(),
        &mut old_to_new,
        &mut new_to_old,
    );

    let stationary = stationary_items(&new_to_old);

    ReconcilePlan {
        old_to_new,
        new_to_old,
        stationary,
    }
}

fn match_rest<T: PartialEq>(
    matcher: &Matcher<'_, T>,
    old: &[T],
    new: &[T],
    old_range: std::ops::Range<usize>,
    new_range: std::ops::Range<usize>,
    old_to_new: &mut [Option<usize>],
    new_to_old: &mut [Option<usize>],
) {
    if old_range.is_empty() || new_range.is_empty() {
        return;
    }

    let old_hashes: Option<Vec<u64>> = old_range.clone().map(|i| matcher.hash(&old[i])).collect();
    let new_hashes: Option<Vec<u64>> = new_range.clone().map(|j| matcher.hash(&new[j])).collect();

    if let (Some(old_hashes), Some(new_hashes)) = (old_hashes, new_hashes) {
        let mut buckets: HashMap<u64, VecDeque<usize>> = HashMap::new();
        for (i, hash) in old_range.clone().zip(old_hashes) {
            buckets.entry(hash).or_default().push_back(i);
        }

        for (j, hash) in new_range.zip(new_hashes) {
            let Some(bucket) = buckets.get_mut(&hash) else {
                continue;
            };
            if let Some(slot) = bucket.iter().position(|&i| matcher.equals(&old[i], &new[j])) {
                if let Some(i) = bucket.remove(slot) {
                    old_to_new[i] = Some(j);
                    new_to_old[j] = Some(i);
                }
            }
        }
        return;
    }

    for j in new_range {
        let candidate = old_range
            .clone()
            .find(|&i| old_to_new[i].is_none() && matcher.equals(&old[i], &new[j]));
        if let Some(i) = candidate {
            old_to_new[i] = Some(j);
            new_to_old[j] = Some(i);
        }
    }
}

/// Marks the longest increasing subsequence of old indices, taken in new
/// order, as stationary.
fn stationary_items(new_to_old: &[Option<usize>]) -> Vec<bool> {
    let matched: Vec<(usize, usize)> = new_to_old
        .iter()
        .enumerate()
        .filter_map(|(j, old)| old.map(|i| (j, i)))
        .collect();

    // Patience sorting: `tails[k]` is the position in `matched` of the
    // smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; matched.len()];

    for (pos, &(_, old)) in matched.iter().enumerate() {
        let k = tails.partition_point(|&t| matched[t].1 < old);
        if k > 0 {
            predecessor[pos] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(pos);
        } else {
            tails[k] = pos;
        }
    }

    let mut stationary = vec![false; new_to_old.len()];
    let mut cursor = tails.last().copied();
    while let Some(pos) = cursor {
        stationary[matched[pos].0] = true;
        cursor = predecessor[pos];
    }
    stationary
}
