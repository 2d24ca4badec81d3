//! Per-variable domains with a hide/restore stack.
//!
//! Forward-checking needs to remove values from a variable's domain
//! when some other variable is assigned, and undo exactly that removal
//! when the search backtracks past the point it happened. Rather than
//! cloning the domain on every push (`soffit`'s Python `Domain` class
//! keeps a list and an index into a "hidden" stack), we record each
//! hidden value together with the depth at which it was hidden and pop
//! them off when that depth unwinds. `present` is a `FixedBitSet`
//! rather than a `Vec<bool>`, the same live-value bitset petgraph
//! keeps for visited-node tracking in its isomorphism search.

use fixedbitset::FixedBitSet;

/// The domain of one CSP variable: a set of candidate `usize` values
/// plus a record of which values are currently hidden (and at what
/// search depth), so they can be restored on backtrack.
#[derive(Debug, Clone)]
pub struct Domain {
    values: Vec<usize>,
    present: FixedBitSet,
    hidden_at: Vec<(usize, usize)>,
    live_count: usize,
}

impl Domain {
    pub fn new(values: impl IntoIterator<Item = usize>) -> Self {
        let values: Vec<usize> = values.into_iter().collect();
        let mut present = FixedBitSet::with_capacity(values.len());
        present.insert_range(..);
        let live_count = values.len();
        Domain {
            values,
            present,
            hidden_at: Vec::new(),
            live_count,
        }
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Iterate the currently-live values, in the domain's stable order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter_map(move |(i, v)| self.present.contains(i).then_some(v))
    }

    pub fn contains(&self, value: usize) -> bool {
        self.values
            .iter()
            .position(|&v| v == value)
            .is_some_and(|i| self.present.contains(i))
    }

    /// Hide `value`, recording it as hidden at `depth`. No-op if the
    /// value isn't present or is already hidden.
    pub fn hide_value(&mut self, value: usize, depth: usize) {
        if let Some(i) = self.values.iter().position(|&v| v == value) {
            if self.present.contains(i) {
                self.present.set(i, false);
                self.live_count -= 1;
                self.hidden_at.push((depth, i));
            }
        }
    }

    /// Restore every value hidden at or after `depth`. Called when the
    /// search backtracks to `depth`.
    pub fn restore_to(&mut self, depth: usize) {
        while let Some(&(d, i)) = self.hidden_at.last() {
            if d < depth {
                break;
            }
            self.hidden_at.pop();
            if !self.present.contains(i) {
                self.present.set(i, true);
                self.live_count += 1;
            }
        }
    }

    /// Replace the live values wholesale (used by `preProcess`-style
    /// restriction), discarding any hide/restore history since that
    /// history refers to the old value set.
    pub fn restrict_to(&mut self, values: impl IntoIterator<Item = usize>) {
        self.values = values.into_iter().collect();
        self.present = FixedBitSet::with_capacity(self.values.len());
        self.present.insert_range(..);
        self.live_count = self.values.len();
        self.hidden_at.clear();
    }

    pub fn intersect_with(&mut self, allowed: &std::collections::HashSet<usize>) {
        let kept: Vec<usize> = self.iter().filter(|v| allowed.contains(v)).collect();
        self.restrict_to(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_and_restore_round_trips() {
        let mut d = Domain::new([1, 2, 3]);
        assert_eq!(d.len(), 3);
        d.hide_value(2, 1);
        assert_eq!(d.len(), 2);
        assert!(!d.contains(2));
        d.hide_value(3, 2);
        assert_eq!(d.len(), 1);
        d.restore_to(2);
        assert_eq!(d.len(), 2);
        assert!(d.contains(3));
        assert!(!d.contains(2));
        d.restore_to(1);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn restrict_to_clears_history() {
        let mut d = Domain::new([1, 2, 3, 4]);
        d.hide_value(1, 1);
        d.restrict_to([2, 3]);
        assert_eq!(d.len(), 2);
        d.restore_to(0);
        assert_eq!(d.len(), 2);
    }
}
