//! `surjectiveMappings(k, values)` (§4.4): every length-`k` tuple over
//! `values` in which each element of `values` appears at least once.
//!
//! Generated by a "pick a still-required value, or reuse an
//! already-satisfied one, then recurse" walk over the remaining
//! positions, so each surjection is produced exactly once rather than
//! filtering `values.len()^k` candidate tuples. The split mirrors the
//! textbook argument for counting surjections: once a value's first
//! occurrence is fixed, every later occurrence of it is a free choice
//! among the values already "paid for".

use std::collections::BTreeSet;

/// All length-`k` tuples over `values` (values may repeat across
/// positions) in which every distinct element of `values` appears at
/// least once. Returns an empty vector when `k < values.len()` (not
/// enough room), and the single empty tuple when both `k` and
/// `values` are empty.
pub fn surjective_mappings(k: usize, values: &[usize]) -> Vec<Vec<usize>> {
    if values.is_empty() {
        return if k == 0 { vec![Vec::new()] } else { Vec::new() };
    }
    if k < values.len() {
        return Vec::new();
    }
    let required: BTreeSet<usize> = values.iter().copied().collect();
    walk(k, values, required)
}

fn walk(remaining: usize, values: &[usize], required: BTreeSet<usize>) -> Vec<Vec<usize>> {
    if remaining == 0 {
        return if required.is_empty() {
            vec![Vec::new()]
        } else {
            Vec::new()
        };
    }

    let mut results = Vec::new();

    if required.is_empty() {
        for &v in values {
            for suffix in walk(remaining - 1, values, required.clone()) {
                results.push(prepend(v, suffix));
            }
        }
        return results;
    }

    for &y in &required {
        let mut rest = required.clone();
        rest.remove(&y);
        for suffix in walk(remaining - 1, values, rest) {
            results.push(prepend(y, suffix));
        }
    }

    if remaining - 1 >= required.len() {
        for &v in values {
            if required.contains(&v) {
                continue;
            }
            for suffix in walk(remaining - 1, values, required.clone()) {
                results.push(prepend(v, suffix));
            }
        }
    }

    results
}

fn prepend(head: usize, mut tail: Vec<usize>) -> Vec<usize> {
    tail.insert(0, head);
    tail
}

/// The Stirling number of the second kind, `S(n, k)`: the number of
/// ways to partition an `n`-set into `k` nonempty, unlabeled subsets.
/// Used only by tests to cross-check [`surjective_mappings`]'s count
/// (testable property 8: `count == |V|! * S(k, |V|)`).
#[cfg(test)]
fn stirling2(n: usize, k: usize) -> u64 {
    if k == 0 {
        return if n == 0 { 1 } else { 0 };
    }
    if k > n {
        return 0;
    }
    let mut row = vec![0u64; k + 1];
    row[0] = 1;
    for _ in 1..=n {
        let mut next = vec![0u64; k + 1];
        for j in 1..=k {
            next[j] = row[j - 1] + (j as u64) * row[j];
        }
        row = next;
    }
    row[k]
}
