// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Locating the first height at which two nodes disagree.

use crate::node::NodeView;

/// Find the smallest height in `[0, highest]` where `a` and `b` report
/// different hashes. The caller has already established that they differ
/// at `highest`.
///
/// Split points rarely move once established, so heights cached from the
/// previous round are replayed first: a cached height where the two nodes
/// differ while agreeing on its parent is the split, found without any
/// searching. Only when no cached height matches does a binary search
/// run, and it is bounded below by the highest cached height — anything
/// under it has been covered by the replay.
pub async fn find_split(fork_height_cache: &[u64], highest: u64, a: &NodeView, b: &NodeView) -> u64 {
    for &h in fork_height_cache {
        if a.hash_at(h, false).await != b.hash_at(h, false).await {
            // They differ at 'h'. It is the split if the parent of 'h' is
            // identical (or 'h' is genesis).
            if h == 0 || a.hash_at(h - 1, false).await == b.hash_at(h - 1, false).await {
                return h;
            }
        }
    }

    // The split has not been seen before; search the remaining space for
    // the smallest height where the hashes disagree.
    let left = fork_height_cache.first().copied().unwrap_or(0);
    let mut lo = 0u64;
    let mut hi = highest.saturating_sub(left);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if a.hash_at(left + mid, false).await != b.hash_at(left + mid, false).await {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    left + lo
}
