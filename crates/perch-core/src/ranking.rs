//! Rank transforms with tie handling
//!
//! Both the rank-sum test and Spearman's rho work on average ranks: tied
//! values share the mean of the ranks they would otherwise occupy. Ranks are
//! 1-based and returned in the input order.

use std::cmp::Ordering;

/// Sort key that treats -0.0 and 0.0 as the same value
fn rank_key(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Average (fractional) ranks of `values`, in input order
///
/// NaN values sort last under `f64::total_cmp`; callers filter them first.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let keys: Vec<f64> = values.iter().copied().map(rank_key).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && keys[order[end]].total_cmp(&keys[order[start]]) == Ordering::Equal {
            end += 1;
        }
        // Positions start..end share ranks start+1 ..= end
        let shared = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// Sizes of each group of tied values (groups of one included)
pub fn tie_group_sizes(values: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.iter().copied().map(rank_key).collect();
    sorted.sort_by(f64::total_cmp);

    let mut sizes = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end].total_cmp(&sorted[start]) == Ordering::Equal {
            end += 1;
        }
        sizes.push(end - start);
        start = end;
    }
    sizes
}

/// Tie correction term Σ(t³ − t) over tie groups
pub fn tie_correction(values: &[f64]) -> f64 {
    tie_group_sizes(values)
        .into_iter()
        .filter(|&t| t > 1)
        .map(|t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum()
}

/// Whether any value occurs more than once
pub fn has_ties(values: &[f64]) -> bool {
    tie_group_sizes(values).iter().any(|&t| t > 1)
}
