//! Clique enumeration and path-blocking reachability over a [`Pdag`].
//!
//! Both utilities are shared by the insert/delete operator generators.

use smallvec::SmallVec;

use crate::engine::pdag::{NodeSet, Pdag};

/// Visits every subset `T` of `candidates` such that `fixed ∪ T` is a clique.
///
/// `fixed` must already be a clique. Subsets are produced depth-first with each element of
/// `candidates` either skipped or included; the include branch is only taken when the element
/// is adjacent to every node already in the wall, so non-clique states are never visited.
///
/// `visit` receives `(T, fixed ∪ T, inherited)` and returns the flag handed to every superset
/// of `T` explored below it. The root receives `seed`. This lets callers propagate monotone
/// facts (a wall that already blocks all paths keeps blocking them when it grows) without
/// re-deriving them.
pub fn visit_clique_extensions<F>(
    pdag: &Pdag,
    fixed: &[usize],
    candidates: &[usize],
    seed: bool,
    visit: &mut F,
) where
    F: FnMut(&[usize], &[usize], bool) -> bool,
{
    let mut chosen: NodeSet = SmallVec::new();
    let mut wall: NodeSet = fixed.iter().copied().collect();
    extend_clique(pdag, candidates, 0, &mut chosen, &mut wall, seed, visit);
}

fn extend_clique<F>(
    pdag: &Pdag,
    candidates: &[usize],
    start: usize,
    chosen: &mut NodeSet,
    wall: &mut NodeSet,
    inherited: bool,
    visit: &mut F,
) where
    F: FnMut(&[usize], &[usize], bool) -> bool,
{
    let flag = visit(chosen.as_slice(), wall.as_slice(), inherited);
    for idx in start..candidates.len() {
        let c = candidates[idx];
        if wall.iter().all(|&w| w != c && pdag.adjacent(w, c)) {
            chosen.push(c);
            wall.push(c);
            extend_clique(pdag, candidates, idx + 1, chosen, wall, flag, visit);
            wall.pop();
            chosen.pop();
        }
    }
}

/// Collects every `T ⊆ candidates` with `fixed ∪ T` a clique. Each subset is sorted.
pub fn clique_extensions(pdag: &Pdag, fixed: &[usize], candidates: &[usize]) -> Vec<NodeSet> {
    let mut out = Vec::new();
    visit_clique_extensions(pdag, fixed, candidates, false, &mut |t, _, _| {
        let mut subset: NodeSet = t.iter().copied().collect();
        subset.sort_unstable();
        out.push(subset);
        false
    });
    out
}

/// True when every semi-directed path from `src` to `tgt` passes through `wall`.
///
/// A semi-directed path follows undirected edges and directed edges in their forward
/// direction only. Nodes in `wall` are treated as already visited, so the search never
/// crosses them. The result depends only on the graph and the arguments, not on the order of
/// exploration.
pub fn blocks_semi_directed_paths(pdag: &Pdag, src: usize, tgt: usize, wall: &[usize]) -> bool {
    let n = pdag.n();
    let mut visited = vec![false; n];
    for &w in wall {
        visited[w] = true;
    }
    if visited[src] {
        return true;
    }
    visited[src] = true;
    let mut stack = vec![src];
    while let Some(u) = stack.pop() {
        for v in 0..n {
            if visited[v] || !pdag.has_mark(u, v) {
                continue;
            }
            if v == tgt {
                return false;
            }
            visited[v] = true;
            stack.push(v);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pdag::Edge;

    fn triangle_plus_tail() -> Pdag {
        // 0 -- 1 -- 2 -- 0 triangle, 2 -> 3
        Pdag::from_edges(
            4,
            &[
                Edge::undirected(0, 1),
                Edge::undirected(1, 2),
                Edge::undirected(0, 2),
                Edge::Directed { from: 2, to: 3 },
            ],
        )
        .expect("valid edges")
    }

    #[test]
    fn enumerates_all_clique_subsets_of_a_triangle() {
        let g = triangle_plus_tail();
        let subsets = clique_extensions(&g, &[], &[0, 1, 2]);
        assert_eq!(subsets.len(), 8);
    }

    #[test]
    fn fixed_members_constrain_the_subsets() {
        let g = triangle_plus_tail();
        // 3 is only adjacent to 2, so with fixed {3} the only extensions are {} and {2}
        let subsets = clique_extensions(&g, &[3], &[0, 1, 2]);
        let got: Vec<Vec<usize>> = subsets.iter().map(|s| s.to_vec()).collect();
        assert_eq!(got, vec![vec![], vec![2]]);
    }

    #[test]
    fn inherited_flag_reaches_supersets() {
        let g = triangle_plus_tail();
        let mut seen = Vec::new();
        visit_clique_extensions(&g, &[], &[0, 1], false, &mut |t, _, inherited| {
            seen.push((t.to_vec(), inherited));
            t.contains(&0)
        });
        assert_eq!(
            seen,
            vec![
                (vec![], false),
                (vec![0], false),
                (vec![0, 1], true),
                (vec![1], false),
            ]
        );
    }

    #[test]
    fn semi_directed_paths_use_undirected_and_forward_edges() {
        let g = triangle_plus_tail();
        assert!(!blocks_semi_directed_paths(&g, 0, 3, &[]));
        assert!(blocks_semi_directed_paths(&g, 3, 0, &[]));
        assert!(blocks_semi_directed_paths(&g, 0, 3, &[2]));
        assert!(!blocks_semi_directed_paths(&g, 0, 2, &[1]));
        assert!(blocks_semi_directed_paths(&g, 1, 3, &[0, 2]));
    }
}
