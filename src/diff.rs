//! Line-level delta between two reads of the same log source.
//!
//! The log may be appended to, truncated, or rotated between reads, so
//! offsets are useless; lines are aligned with a Myers diff instead and every
//! line on the "current" side that has no partner on the "previous" side is
//! reported as new.

use std::time::{Duration, Instant};

use similar::{capture_diff_slices_deadline, Algorithm, DiffTag};

/// Upper bound on time spent aligning one pair of reads. Past it the diff
/// degrades to a coarser (never lossy) alignment.
const DIFF_DEADLINE: Duration = Duration::from_millis(500);

/// Return the lines of `current` that are not accounted for by `previous`,
/// in their order within `current`.
///
/// Repeated lines are reported once per unmatched occurrence. When the two
/// inputs share nothing, all of `current` is returned.
pub fn new_lines(current: &[String], previous: &[String]) -> Vec<String> {
    if current.is_empty() {
        return Vec::new();
    }

    // Common case: the file only grew since last time.
    if let Some(suffix) = current.strip_prefix(previous) {
        return suffix.to_vec();
    }

    let deadline = Instant::now().checked_add(DIFF_DEADLINE);
    let ops = capture_diff_slices_deadline(Algorithm::Myers, previous, current, deadline);

    let mut added = Vec::new();
    for op in &ops {
        match op.tag() {
            DiffTag::Insert | DiffTag::Replace => {
                if let Some(range) = current.get(op.new_range()) {
                    added.extend_from_slice(range);
                }
            }
            DiffTag::Equal | DiffTag::Delete => {}
        }
    }
    added
}
