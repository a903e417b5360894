//! Insert and delete operators of Greedy Equivalence Search (Chickering, 2002).
//!
//! ## Insert(y, x, T)
//!
//! For non-adjacent `x`, `y` and `T ⊆ {t : t -- y, t not adjacent to x}`, valid when
//! 1. `NA(y, x) ∪ T` is a clique, and
//! 2. `NA(y, x) ∪ T` blocks every semi-directed path from `y` to `x`.
//!
//! Applying it adds `x -> y` and turns every `t -- y` (`t ∈ T`) into `t -> y`.
//!
//! ## Delete(y, x, H)
//!
//! For `x -> y` or `x -- y` and `H ⊆ NA(y, x)`, valid when `NA(y, x) \ H` is a clique.
//! Applying it removes the `x`/`y` edge and orients `y -- h` and `x -- h` toward `h`.
//!
//! Generated operators own copies of their sets; nothing refers back into the enumerator's
//! working storage.

use smallvec::SmallVec;

use crate::engine::cliques::{blocks_semi_directed_paths, visit_clique_extensions};
use crate::engine::pdag::{NodeSet, Pdag};

/// Direction of a search move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatorKind {
    /// Adds one edge (forward phase).
    Insert,
    /// Removes one edge (backward phase).
    Delete,
}

/// A candidate single-edge modification of a CPDAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operator {
    /// Insert or delete.
    pub kind: OperatorKind,
    /// Endpoint whose parent set changes.
    pub y: usize,
    /// Other endpoint of the edge.
    pub x: usize,
    /// `T` for inserts, `H` for deletes. Sorted.
    pub set: NodeSet,
    /// `NA(y, x)` when the operator was generated. Sorted.
    pub na: NodeSet,
}

impl Operator {
    /// Parent sets of `y` whose local scores differ by this move, as `(before, after)`.
    ///
    /// - insert: `before = NA ∪ T ∪ Pa(y)`, `after = before ∪ {x}`
    /// - delete: `after = (NA \ H) ∪ Pa(y) \ {x}`, `before = after ∪ {x}`
    pub fn scored_parent_sets(&self, pdag: &Pdag) -> (NodeSet, NodeSet) {
        let parents = pdag.parents(self.y);
        match self.kind {
            OperatorKind::Insert => {
                let before =
                    sorted_union(&[self.na.as_slice(), self.set.as_slice(), parents.as_slice()]);
                let after = with_node(&before, self.x);
                (before, after)
            }
            OperatorKind::Delete => {
                let kept: NodeSet = self
                    .na
                    .iter()
                    .copied()
                    .filter(|v| !self.set.contains(v))
                    .collect();
                let after: NodeSet = sorted_union(&[kept.as_slice(), parents.as_slice()])
                    .into_iter()
                    .filter(|&v| v != self.x)
                    .collect();
                let before = with_node(&after, self.x);
                (before, after)
            }
        }
    }

    /// Mutates `pdag` in place. The result is a PDAG that still needs completion.
    pub fn apply(&self, pdag: &mut Pdag) {
        match self.kind {
            OperatorKind::Insert => {
                pdag.add_directed(self.x, self.y);
                for &t in &self.set {
                    pdag.clear_mark(self.y, t);
                }
            }
            OperatorKind::Delete => {
                pdag.remove_edge(self.x, self.y);
                for &h in &self.set {
                    pdag.clear_mark(h, self.y);
                    if pdag.is_undirected(self.x, h) {
                        pdag.clear_mark(h, self.x);
                    }
                }
            }
        }
    }
}

/// Every valid insert operator of `pdag`.
///
/// Once a wall is shown to block all semi-directed `y ~> x` paths, supersets explored below it
/// inherit that result instead of repeating the search.
pub fn insert_operators(pdag: &Pdag) -> Vec<Operator> {
    let n = pdag.n();
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            if x == y || pdag.adjacent(x, y) {
                continue;
            }
            let na = pdag.na(y, x);
            if !pdag.is_clique(&na) {
                continue;
            }
            let candidates = insert_candidates(pdag, y, x);
            visit_clique_extensions(pdag, &na, &candidates, false, &mut |t, wall, proven| {
                let blocks = proven || blocks_semi_directed_paths(pdag, y, x, wall);
                if blocks {
                    out.push(Operator {
                        kind: OperatorKind::Insert,
                        y,
                        x,
                        set: sorted_copy(t),
                        na: na.clone(),
                    });
                }
                blocks
            });
        }
    }
    out
}

/// Every valid delete operator of `pdag`.
pub fn delete_operators(pdag: &Pdag) -> Vec<Operator> {
    let n = pdag.n();
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            if x == y || !pdag.has_mark(x, y) {
                continue;
            }
            let na = pdag.na(y, x);
            // H = NA \ C for every clique C ⊆ NA
            visit_clique_extensions(pdag, &[], &na, false, &mut |kept, _, _| {
                let set: NodeSet = na
                    .iter()
                    .copied()
                    .filter(|v| !kept.contains(v))
                    .collect();
                out.push(Operator {
                    kind: OperatorKind::Delete,
                    y,
                    x,
                    set,
                    na: na.clone(),
                });
                false
            });
        }
    }
    out
}

/// Operators of the given kind.
pub fn operators(kind: OperatorKind, pdag: &Pdag) -> Vec<Operator> {
    match kind {
        OperatorKind::Insert => insert_operators(pdag),
        OperatorKind::Delete => delete_operators(pdag),
    }
}

/// Reference enumeration of insert operators: every subset is tested explicitly.
///
/// Exponential in the neighbourhood size; meant for cross-checking [`insert_operators`] on
/// small graphs.
pub fn insert_operators_exhaustive(pdag: &Pdag) -> Vec<Operator> {
    let n = pdag.n();
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            if x == y || pdag.adjacent(x, y) {
                continue;
            }
            let na = pdag.na_uncached(y, x);
            let candidates = insert_candidates(pdag, y, x);
            for t in subsets(&candidates) {
                let wall = sorted_union(&[na.as_slice(), t.as_slice()]);
                if pdag.is_clique(&wall) && blocks_semi_directed_paths(pdag, y, x, &wall) {
                    out.push(Operator {
                        kind: OperatorKind::Insert,
                        y,
                        x,
                        set: t,
                        na: na.clone(),
                    });
                }
            }
        }
    }
    out
}

/// Reference enumeration of delete operators: every subset is tested explicitly.
pub fn delete_operators_exhaustive(pdag: &Pdag) -> Vec<Operator> {
    let n = pdag.n();
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            if x == y || !pdag.has_mark(x, y) {
                continue;
            }
            let na = pdag.na_uncached(y, x);
            for h in subsets(&na) {
                let kept: NodeSet = na.iter().copied().filter(|v| !h.contains(v)).collect();
                if pdag.is_clique(&kept) {
                    out.push(Operator {
                        kind: OperatorKind::Delete,
                        y,
                        x,
                        set: h,
                        na: na.clone(),
                    });
                }
            }
        }
    }
    out
}

fn insert_candidates(pdag: &Pdag, y: usize, x: usize) -> NodeSet {
    pdag.neighbors(y)
        .into_iter()
        .filter(|&t| !pdag.adjacent(t, x))
        .collect()
}

fn subsets(items: &[usize]) -> Vec<NodeSet> {
    (0u64..(1u64 << items.len()))
        .map(|mask| {
            items
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &v)| v)
                .collect()
        })
        .collect()
}

fn sorted_copy(nodes: &[usize]) -> NodeSet {
    let mut copy: NodeSet = nodes.iter().copied().collect();
    copy.sort_unstable();
    copy
}

fn sorted_union(sets: &[&[usize]]) -> NodeSet {
    let mut out: NodeSet = SmallVec::new();
    for set in sets {
        out.extend(set.iter().copied());
    }
    out.sort_unstable();
    out.dedup();
    out
}

fn with_node(set: &[usize], node: usize) -> NodeSet {
    sorted_union(&[set, std::slice::from_ref(&node)])
}
