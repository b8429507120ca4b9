//! Longest Increasing Subsequence
//!
//! Used by the keyed diff to find the matched nodes that are already in the
//! right relative order and therefore never move.
//!
//! # Algorithm
//!
//! Patience sorting with predecessor links, O(n log n):
//!
//! 1. `tails[k]` holds the index of the smallest value that ends an
//!    increasing run of length `k + 1`
//! 2. Each value either extends the longest run or replaces the first tail
//!    that is not smaller (binary search)
//! 3. `predecessors[i]` remembers the tail before position `i` when it was
//!    placed; walking them back from the last tail rebuilds the sequence
//!
//! Zero entries mean "no old node" and are skipped entirely.

use smallvec::SmallVec;

/// Indices of a longest strictly increasing subsequence.
pub type Sequence = SmallVec<[usize; 16]>;

/// Compute the indices (ascending) of a longest strictly increasing
/// subsequence of `values`, ignoring zero entries.
pub fn longest_increasing_subsequence(values: &[usize]) -> Sequence {
    let mut tails: Sequence = SmallVec::new();
    let mut predecessors = vec![usize::MAX; values.len()];

    for (index, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }

        if let Some(&last) = tails.last() {
            if values[last] < value {
                predecessors[index] = last;
                tails.push(index);
                continue;
            }
        } else {
            tails.push(index);
            continue;
        }

        let position = tails.partition_point(|&tail| values[tail] < value);
        if value < values[tails[position]] {
            if position > 0 {
                predecessors[index] = tails[position - 1];
            }
            tails[position] = index;
        }
    }

    let mut cursor = tails.last().copied();
    for slot in tails.iter_mut().rev() {
        let Some(index) = cursor else { break };
        *slot = index;
        cursor = predecessors.get(index).copied().filter(|&p| p != usize::MAX);
    }

    tails
}
