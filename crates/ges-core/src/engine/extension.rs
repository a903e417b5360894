//! Consistent extension of a PDAG (Dor & Tarsi, 1992).
//!
//! Repeatedly removes a vertex `x` from a working copy `A` of the graph such that
//! 1. `x` is a sink in `A` (no directed edge leaves it), and
//! 2. every undirected neighbour of `x` is adjacent to all other vertices adjacent to `x`,
//!
//! orienting every edge of `A` incident to `x` toward `x` in the output. If no such vertex
//! exists while `A` is non-empty, the PDAG has no consistent extension.

use rustc_hash::FxHashSet;

use crate::engine::dag::Dag;
use crate::engine::errors::GesError;
use crate::engine::pdag::Pdag;

/// Working copy of the graph with the three derived neighbourhoods per node.
struct Remaining {
    present: Vec<bool>,
    dir_children: Vec<FxHashSet<usize>>,
    neighbors: Vec<FxHashSet<usize>>,
    adjacent: Vec<FxHashSet<usize>>,
}

impl Remaining {
    fn from_pdag(pdag: &Pdag) -> Self {
        let n = pdag.n();
        let mut remaining = Remaining {
            present: vec![true; n],
            dir_children: vec![FxHashSet::default(); n],
            neighbors: vec![FxHashSet::default(); n],
            adjacent: vec![FxHashSet::default(); n],
        };
        for i in 0..n {
            for j in 0..n {
                if !pdag.has_mark(i, j) {
                    continue;
                }
                remaining.adjacent[i].insert(j);
                remaining.adjacent[j].insert(i);
                if pdag.has_mark(j, i) {
                    remaining.neighbors[i].insert(j);
                } else {
                    remaining.dir_children[i].insert(j);
                }
            }
        }
        remaining
    }

    fn is_removable(&self, x: usize) -> bool {
        if !self.present[x] || !self.dir_children[x].is_empty() {
            return false;
        }
        self.neighbors[x].iter().all(|&y| {
            self.adjacent[x]
                .iter()
                .all(|&z| z == y || self.adjacent[z].contains(&y))
        })
    }

    fn remove(&mut self, x: usize) {
        self.present[x] = false;
        for sets in [
            &mut self.dir_children,
            &mut self.neighbors,
            &mut self.adjacent,
        ] {
            for set in sets.iter_mut() {
                set.remove(&x);
            }
            sets[x].clear();
        }
    }
}

/// Returns a DAG whose orientation agrees with every directed edge of `pdag` and introduces
/// no new v-structure.
///
/// Fails with [`GesError::NoConsistentExtension`] when the PDAG has a directed or partially
/// directed cycle, or when every orientation would create a new v-structure.
pub fn consistent_extension(pdag: &Pdag) -> Result<Dag, GesError> {
    let n = pdag.n();
    let mut output = pdag.clone();
    let mut remaining = Remaining::from_pdag(pdag);

    for _ in 0..n {
        let x = (0..n).find(|&x| remaining.is_removable(x)).ok_or_else(|| {
            let stuck: Vec<usize> = (0..n).filter(|&v| remaining.present[v]).collect();
            GesError::NoConsistentExtension(format!(
                "no sink with a clique neighbourhood among remaining nodes {:?}",
                stuck
            ))
        })?;

        for &y in &remaining.adjacent[x] {
            output.add_directed(y, x);
        }
        remaining.remove(x);
    }

    Ok(Dag::from_extension(output))
}
