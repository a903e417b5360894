//! Graph metrics.
//!
//! - `GraphSummary`: edge counts by kind
//! - `structural_hamming_distance`: pairwise disagreement between two graphs
//!
//! Both work on any PDAG; comparing a search result against a known CPDAG is the usual case.

use crate::engine::errors::GesError;
use crate::engine::pdag::Pdag;

/// Edge counts of a PDAG.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphSummary {
    pub nodes: usize,
    pub directed: usize,
    pub undirected: usize,
}

impl GraphSummary {
    pub fn of(graph: &Pdag) -> Self {
        let mut summary = GraphSummary {
            nodes: graph.n(),
            ..GraphSummary::default()
        };
        for a in 0..graph.n() {
            for b in (a + 1)..graph.n() {
                match pair_mark(graph, a, b) {
                    PairMark::None => {}
                    PairMark::Undirected => summary.undirected += 1,
                    PairMark::Forward | PairMark::Backward => summary.directed += 1,
                }
            }
        }
        summary
    }

    pub fn edges(&self) -> usize {
        self.directed + self.undirected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairMark {
    None,
    Forward,
    Backward,
    Undirected,
}

fn pair_mark(graph: &Pdag, a: usize, b: usize) -> PairMark {
    match (graph.has_mark(a, b), graph.has_mark(b, a)) {
        (false, false) => PairMark::None,
        (true, false) => PairMark::Forward,
        (false, true) => PairMark::Backward,
        (true, true) => PairMark::Undirected,
    }
}

/// Number of node pairs whose connection differs: a missing or extra edge, or the same
/// adjacency with a different orientation, each count once.
pub fn structural_hamming_distance(a: &Pdag, b: &Pdag) -> Result<usize, GesError> {
    if a.n() != b.n() {
        return Err(GesError::ValidationError(format!(
            "cannot compare graphs over {} and {} nodes",
            a.n(),
            b.n()
        )));
    }
    let n = a.n();
    Ok((0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .filter(|&(i, j)| pair_mark(a, i, j) != pair_mark(b, i, j))
        .count())
}
