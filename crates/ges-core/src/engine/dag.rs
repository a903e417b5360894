//! # DAGs, edge labelling and CPDAG completion
//!
//! A [`Dag`] is a fully directed, acyclic [`Pdag`]. Its Markov-equivalence class is
//! represented by a CPDAG in which compelled arcs stay directed and reversible arcs become
//! undirected.
//!
//! ## Labelling (Chickering, 1995)
//!
//! Arcs are visited with their heads in topological order and, for a fixed head `y`, their
//! tails in reverse topological order. For an unlabelled arc `x -> y`:
//! - for every compelled `w -> x`: if `w` is not a parent of `y`, every arc into `y` is
//!   compelled and the arc is done; otherwise `w -> y` is compelled;
//! - else, if some parent `z` of `y` with `z != x` is not a parent of `x`, every unlabelled
//!   arc into `y` is compelled, otherwise every unlabelled arc into `y` is reversible.

use std::collections::VecDeque;

use crate::engine::errors::GesError;
use crate::engine::extension::consistent_extension;
use crate::engine::pdag::Pdag;

/// Label of a DAG arc within its equivalence class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeLabel {
    /// Same direction in every DAG of the class.
    Compelled,
    /// Direction differs between members of the class.
    Reversible,
}

/// Labels for every arc of a DAG, indexed by `(tail, head)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLabels {
    n: usize,
    labels: Vec<Option<EdgeLabel>>,
}

impl EdgeLabels {
    fn new(n: usize) -> Self {
        Self {
            n,
            labels: vec![None; n * n],
        }
    }

    /// Label of `from -> to`, `None` when the arc does not exist.
    pub fn get(&self, from: usize, to: usize) -> Option<EdgeLabel> {
        self.labels[from * self.n + to]
    }

    fn set(&mut self, from: usize, to: usize, label: EdgeLabel) {
        self.labels[from * self.n + to] = Some(label);
    }

    /// Every labelled arc as `(from, to, label)`, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, EdgeLabel)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(move |(idx, label)| label.map(|l| (idx / self.n, idx % self.n, l)))
    }
}

/// A fully directed acyclic graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dag {
    graph: Pdag,
}

impl Dag {
    /// Wraps a PDAG after checking that it has no undirected edge and no directed cycle.
    pub fn from_pdag(graph: Pdag) -> Result<Self, GesError> {
        if !graph.is_fully_directed() {
            return Err(GesError::ValidationError(
                "a DAG cannot contain undirected edges".into(),
            ));
        }
        let dag = Dag { graph };
        dag.topological_order()?;
        Ok(dag)
    }

    /// Output of the consistent-extension algorithm, acyclic by construction.
    pub(crate) fn from_extension(graph: Pdag) -> Self {
        Dag { graph }
    }

    /// Number of nodes.
    pub fn n(&self) -> usize {
        self.graph.n()
    }

    /// Borrow the underlying graph.
    pub fn as_pdag(&self) -> &Pdag {
        &self.graph
    }

    /// Consume into the underlying graph.
    pub fn into_pdag(self) -> Pdag {
        self.graph
    }

    /// Kahn's algorithm over in-degrees; ties are broken by ascending node index.
    ///
    /// Fails with [`GesError::CycleDetected`] if not every node can be ordered.
    pub fn topological_order(&self) -> Result<Vec<usize>, GesError> {
        let n = self.n();
        let mut in_degree: Vec<usize> = (0..n).map(|v| self.graph.parents(v).len()).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(u) = queue.pop_front() {
            order.push(u);
            for v in self.graph.children(u) {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        if order.len() != n {
            let cyclic: Vec<usize> = (0..n).filter(|&v| in_degree[v] > 0).collect();
            return Err(GesError::CycleDetected(format!(
                "topological sort ordered {} of {} nodes; unresolved {:?}",
                order.len(),
                n,
                cyclic
            )));
        }
        Ok(order)
    }

    /// Labels every arc compelled or reversible.
    pub fn label_edges(&self) -> Result<EdgeLabels, GesError> {
        let n = self.n();
        let order = self.topological_order()?;
        let g = &self.graph;
        let mut labels = EdgeLabels::new(n);

        for &y in &order {
            let parents_y = g.parents(y);
            for &x in order.iter().rev() {
                if !g.has_mark(x, y) || labels.get(x, y).is_some() {
                    continue;
                }

                let mut finished = false;
                for w in g.parents(x) {
                    if labels.get(w, x) != Some(EdgeLabel::Compelled) {
                        continue;
                    }
                    if !g.has_mark(w, y) {
                        for &p in &parents_y {
                            labels.set(p, y, EdgeLabel::Compelled);
                        }
                        finished = true;
                        break;
                    }
                    labels.set(w, y, EdgeLabel::Compelled);
                }
                if finished {
                    continue;
                }

                let z_exists = parents_y
                    .iter()
                    .any(|&z| z != x && !g.has_mark(z, x));
                let label = if z_exists {
                    EdgeLabel::Compelled
                } else {
                    EdgeLabel::Reversible
                };
                for &p in &parents_y {
                    if labels.get(p, y).is_none() {
                        labels.set(p, y, label);
                    }
                }
            }
        }
        Ok(labels)
    }

    /// The CPDAG of this DAG's equivalence class.
    pub fn to_cpdag(&self) -> Result<Pdag, GesError> {
        let labels = self.label_edges()?;
        let mut cpdag = Pdag::empty(self.n());
        for (from, to, label) in labels.iter() {
            match label {
                EdgeLabel::Compelled => cpdag.add_directed(from, to),
                EdgeLabel::Reversible => cpdag.add_undirected(from, to),
            }
        }
        Ok(cpdag)
    }
}

/// Canonical CPDAG of the class represented by `pdag`: extend, then complete.
pub fn completion(pdag: &Pdag) -> Result<Pdag, GesError> {
    consistent_extension(pdag)?.to_cpdag()
}

/// Re-canonicalises `pdag` in place, overwriting its adjacency with its completion.
///
/// On error the graph is left untouched.
pub fn complete_in_place(pdag: &mut Pdag) -> Result<(), GesError> {
    let cpdag = completion(pdag)?;
    pdag.overwrite_with(&cpdag);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pdag::Edge;

    fn dag(n: usize, arcs: &[(usize, usize)]) -> Dag {
        let edges: Vec<Edge> = arcs
            .iter()
            .map(|&(from, to)| Edge::Directed { from, to })
            .collect();
        Dag::from_pdag(Pdag::from_edges(n, &edges).expect("edges")).expect("acyclic")
    }

    #[test]
    fn topological_order_respects_arcs() {
        let d = dag(4, &[(3, 1), (1, 0), (2, 0)]);
        let order = d.topological_order().expect("order");
        let pos = |v: usize| order.iter().position(|&u| u == v).expect("present");
        assert!(pos(3) < pos(1));
        assert!(pos(1) < pos(0));
        assert!(pos(2) < pos(0));
    }

    #[test]
    fn from_pdag_rejects_cycles_and_undirected_edges() {
        let mut three = Pdag::empty(3);
        three.add_directed(0, 1);
        three.add_directed(1, 2);
        three.add_directed(2, 0);
        assert!(matches!(
            Dag::from_pdag(three),
            Err(GesError::CycleDetected(_))
        ));

        let mut undirected = Pdag::empty(2);
        undirected.add_undirected(0, 1);
        assert!(matches!(
            Dag::from_pdag(undirected),
            Err(GesError::ValidationError(_))
        ));
    }

    #[test]
    fn chain_is_fully_reversible() {
        let cpdag = dag(3, &[(0, 1), (1, 2)]).to_cpdag().expect("cpdag");
        assert!(cpdag.is_undirected(0, 1));
        assert!(cpdag.is_undirected(1, 2));
        assert!(!cpdag.adjacent(0, 2));
    }

    #[test]
    fn collider_is_compelled() {
        let labels = dag(3, &[(0, 1), (2, 1)]).label_edges().expect("labels");
        assert_eq!(labels.get(0, 1), Some(EdgeLabel::Compelled));
        assert_eq!(labels.get(2, 1), Some(EdgeLabel::Compelled));
        assert_eq!(labels.get(1, 0), None);
    }

    #[test]
    fn arc_out_of_collider_is_compelled() {
        // 0 -> 2 <- 1, 2 -> 3: the v-structure forces 2 -> 3 as well
        let cpdag = dag(4, &[(0, 2), (1, 2), (2, 3)]).to_cpdag().expect("cpdag");
        assert!(cpdag.is_directed(0, 2));
        assert!(cpdag.is_directed(1, 2));
        assert!(cpdag.is_directed(2, 3));
    }

    #[test]
    fn complete_triangle_is_reversible() {
        let cpdag = dag(3, &[(0, 1), (1, 2), (0, 2)]).to_cpdag().expect("cpdag");
        assert_eq!(cpdag.edges().len(), 3);
        assert!(cpdag.edges().iter().all(|e| matches!(e, Edge::Undirected { .. })));
    }

    #[test]
    fn completion_is_a_fixed_point() {
        let start = dag(5, &[(0, 2), (1, 2), (2, 3), (3, 4), (1, 4)]);
        let once = start.to_cpdag().expect("cpdag");
        let mut twice = once.clone();
        complete_in_place(&mut twice).expect("re-complete");
        assert_eq!(once, twice);
    }
}
