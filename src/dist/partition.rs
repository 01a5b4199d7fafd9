//! Cyclic (round-robin) assignment of frames to workers.
//!
//! Worker `r` of `P` owns frames `r, r + P, r + 2P, ...`. Every function here
//! is pure so any rank can compute any other rank's share without asking.

use std::ops::Range;

/// Number of frames in `0..n_frames` whose index is `rank` modulo `worker_count`.
pub fn assigned_frame_count(rank: usize, n_frames: usize, worker_count: usize) -> usize {
    if worker_count == 0 || rank >= n_frames {
        return 0;
    }
    (n_frames - rank).div_ceil(worker_count)
}

/// Frame indices owned by `rank`, ascending.
pub fn owned_frames(rank: usize, n_frames: usize, worker_count: usize) -> impl Iterator<Item = usize> {
    let step = worker_count.max(1);
    let start = if worker_count == 0 { n_frames } else { rank };
    (start..n_frames).step_by(step)
}

/// Rank that owns global frame `frame`.
pub fn owner_of(frame: usize, worker_count: usize) -> usize {
    frame % worker_count
}

/// Position of `frame` among its owner's frames.
pub fn round_of(frame: usize, worker_count: usize) -> usize {
    frame / worker_count
}

/// Shares of every rank, in rank order.
pub fn all_counts(n_frames: usize, worker_count: usize) -> Vec<usize> {
    (0..worker_count)
        .map(|rank| assigned_frame_count(rank, n_frames, worker_count))
        .collect()
}

/// Sample range covered by `frame`.
pub fn frame_span(frame: usize, frame_size: usize, hop: usize) -> Range<usize> {
    let start = frame * hop;
    start..start + frame_size
}
