//! # Partially directed graphs
//!
//! Dense adjacency-matrix store for PDAGs over `n` integer-labelled nodes.
//!
//! ## Encoding
//!
//! `mat[i][j] = 1` records an edge mark with its tail at `i` pointing toward `j`:
//! - `i -> j`: `mat[i][j] = 1`, `mat[j][i] = 0`
//! - `i -- j`: `mat[i][j] = mat[j][i] = 1`
//!
//! The diagonal is always zero.
//!
//! ## Caching
//!
//! `NA(y, x)` (neighbours of `y` adjacent to `x`) is requested many times per search pass, so
//! it is memoised per ordered pair. Every mutating method goes through
//! [`Pdag::invalidate_caches`], which drops the memo table; a cached value can never outlive
//! the adjacency it was computed from.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::GesError;

/// Maximum size for inline storage of node sets.
const INLINE_SET_SIZE: usize = 8;

/// A small, sorted set of node indices.
///
/// Every set returned by [`Pdag`] queries is sorted ascending and free of duplicates.
pub type NodeSet = SmallVec<[usize; INLINE_SET_SIZE]>;

/// One edge of a PDAG, listed once per connected node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Edge {
    /// `from -> to`
    Directed { from: usize, to: usize },
    /// `a -- b`, normalised so that `a < b`
    Undirected { a: usize, b: usize },
}

impl Edge {
    /// Builds an undirected edge with normalised endpoint order.
    pub fn undirected(a: usize, b: usize) -> Self {
        Edge::Undirected {
            a: a.min(b),
            b: a.max(b),
        }
    }

    /// Both endpoints, smaller first.
    pub fn endpoints(&self) -> (usize, usize) {
        match *self {
            Edge::Directed { from, to } => (from.min(to), from.max(to)),
            Edge::Undirected { a, b } => (a, b),
        }
    }
}

/// A partially directed graph backed by a dense boolean matrix.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pdag {
    n: usize,
    /// Row-major `n × n` edge marks.
    mat: Vec<bool>,
    #[cfg_attr(feature = "serde", serde(skip))]
    na_cache: RefCell<FxHashMap<(usize, usize), NodeSet>>,
}

impl PartialEq for Pdag {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n && self.mat == other.mat
    }
}

impl Eq for Pdag {}

impl Pdag {
    /// Creates a graph with `n` nodes and no edges.
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            mat: vec![false; n * n],
            na_cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Builds a graph from a square 0/1 matrix.
    ///
    /// Any non-zero entry counts as an edge mark. Non-square input and self-loops are rejected.
    pub fn from_matrix<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, GesError> {
        let n = rows.len();
        let mut pdag = Pdag::empty(n);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n {
                return Err(GesError::ValidationError(format!(
                    "adjacency matrix must be square: row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, &mark) in row.iter().enumerate() {
                if mark == 0 {
                    continue;
                }
                if i == j {
                    return Err(GesError::ValidationError(format!(
                        "adjacency matrix has a self-loop on node {}",
                        i
                    )));
                }
                pdag.mat[i * n + j] = true;
            }
        }
        Ok(pdag)
    }

    /// Builds a graph from an edge list.
    pub fn from_edges(n: usize, edges: &[Edge]) -> Result<Self, GesError> {
        let mut pdag = Pdag::empty(n);
        for edge in edges {
            pdag.insert_edge(*edge)?;
        }
        Ok(pdag)
    }

    /// Adds `edge`, replacing any edge already joining its endpoints.
    ///
    /// Checked counterpart of [`Pdag::add_directed`] and [`Pdag::add_undirected`]: an
    /// out-of-range node or a self-loop is a `ValidationError` and leaves the graph untouched.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), GesError> {
        let (a, b) = edge.endpoints();
        if b >= self.n {
            return Err(GesError::ValidationError(format!(
                "edge {:?} references node {} but the graph has {} nodes",
                edge, b, self.n
            )));
        }
        if a == b {
            return Err(GesError::ValidationError(format!(
                "edge {:?} is a self-loop",
                edge
            )));
        }
        match edge {
            Edge::Directed { from, to } => self.add_directed(from, to),
            Edge::Undirected { a, b } => self.add_undirected(a, b),
        }
        Ok(())
    }

    /// Number of nodes.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Raw edge mark `mat[from][to]`.
    ///
    /// Node-indexed queries and mutators take indices the caller has already checked against
    /// [`Pdag::n`]; they panic on an out-of-range node. Use [`Pdag::insert_edge`] for
    /// unchecked input.
    #[inline]
    pub fn has_mark(&self, from: usize, to: usize) -> bool {
        self.mat[self.index(from, to)]
    }

    /// `from -> to` exists.
    #[inline]
    pub fn is_directed(&self, from: usize, to: usize) -> bool {
        self.has_mark(from, to) && !self.has_mark(to, from)
    }

    /// `a -- b` exists.
    #[inline]
    pub fn is_undirected(&self, a: usize, b: usize) -> bool {
        self.has_mark(a, b) && self.has_mark(b, a)
    }

    /// Any edge connects `a` and `b`.
    #[inline]
    pub fn adjacent(&self, a: usize, b: usize) -> bool {
        self.has_mark(a, b) || self.has_mark(b, a)
    }

    /// Nodes `x` with `x -> y`.
    pub fn parents(&self, y: usize) -> NodeSet {
        (0..self.n).filter(|&x| self.is_directed(x, y)).collect()
    }

    /// Nodes `x` with `y -> x`.
    pub fn children(&self, y: usize) -> NodeSet {
        (0..self.n).filter(|&x| self.is_directed(y, x)).collect()
    }

    /// Nodes `x` with `x -- y`.
    pub fn neighbors(&self, y: usize) -> NodeSet {
        (0..self.n).filter(|&x| self.is_undirected(x, y)).collect()
    }

    /// Nodes connected to `y` by any edge.
    pub fn adjacents(&self, y: usize) -> NodeSet {
        (0..self.n).filter(|&x| self.adjacent(x, y)).collect()
    }

    /// `NA(y, x)`: neighbours of `y` that are adjacent to `x`.
    pub fn na(&self, y: usize, x: usize) -> NodeSet {
        if let Some(cached) = self.na_cache.borrow().get(&(y, x)) {
            return cached.clone();
        }
        let computed = self.na_uncached(y, x);
        self.na_cache.borrow_mut().insert((y, x), computed.clone());
        computed
    }

    /// `NA(y, x)` computed from the matrix, bypassing the memo table.
    pub fn na_uncached(&self, y: usize, x: usize) -> NodeSet {
        (0..self.n)
            .filter(|&t| t != x && self.is_undirected(t, y) && self.adjacent(t, x))
            .collect()
    }

    /// Number of memoised `NA` entries.
    pub fn cached_na_entries(&self) -> usize {
        self.na_cache.borrow().len()
    }

    /// Every pair in `nodes` is adjacent.
    pub fn is_clique(&self, nodes: &[usize]) -> bool {
        nodes.iter().enumerate().all(|(i, &a)| {
            nodes[i + 1..]
                .iter()
                .all(|&b| a != b && self.adjacent(a, b))
        })
    }

    /// Contains no undirected edge.
    pub fn is_fully_directed(&self) -> bool {
        (0..self.n).all(|a| (a + 1..self.n).all(|b| !self.is_undirected(a, b)))
    }

    /// Lists every edge once, in row-major order of the smaller endpoint.
    pub fn edges(&self) -> Vec<Edge> {
        let mut out = Vec::new();
        for a in 0..self.n {
            for b in a + 1..self.n {
                match (self.has_mark(a, b), self.has_mark(b, a)) {
                    (true, true) => out.push(Edge::Undirected { a, b }),
                    (true, false) => out.push(Edge::Directed { from: a, to: b }),
                    (false, true) => out.push(Edge::Directed { from: b, to: a }),
                    (false, false) => {}
                }
            }
        }
        out
    }

    /// Number of connected node pairs.
    pub fn edge_count(&self) -> usize {
        (0..self.n)
            .map(|a| (a + 1..self.n).filter(|&b| self.adjacent(a, b)).count())
            .sum()
    }

    /// Exports the `n × n` 0/1 matrix.
    pub fn to_matrix(&self) -> Vec<Vec<u8>> {
        self.mat
            .chunks(self.n.max(1))
            .take(self.n)
            .map(|row| row.iter().map(|&m| m as u8).collect())
            .collect()
    }

    /// Adds or re-orients the edge as `from -> to`.
    ///
    /// # Panics
    /// If either node is out of range. See [`Pdag::insert_edge`].
    pub fn add_directed(&mut self, from: usize, to: usize) {
        debug_assert_ne!(from, to, "self-loops are not representable");
        self.set_mark(from, to, true);
        self.set_mark(to, from, false);
        self.invalidate_caches();
    }

    /// Adds or replaces the edge as `a -- b`.
    ///
    /// # Panics
    /// If either node is out of range.
    pub fn add_undirected(&mut self, a: usize, b: usize) {
        debug_assert_ne!(a, b, "self-loops are not representable");
        self.set_mark(a, b, true);
        self.set_mark(b, a, true);
        self.invalidate_caches();
    }

    /// Removes any edge between `a` and `b`.
    pub fn remove_edge(&mut self, a: usize, b: usize) {
        self.set_mark(a, b, false);
        self.set_mark(b, a, false);
        self.invalidate_caches();
    }

    /// Clears the single mark `mat[from][to]`, leaving the reverse mark untouched.
    ///
    /// Applied to `from -- to` this leaves `to -> from`.
    pub fn clear_mark(&mut self, from: usize, to: usize) {
        self.set_mark(from, to, false);
        self.invalidate_caches();
    }

    /// Replaces the whole adjacency with that of `other`.
    pub fn overwrite_with(&mut self, other: &Pdag) {
        self.n = other.n;
        self.mat.clone_from(&other.mat);
        self.invalidate_caches();
    }

    /// Drops every memoised structural query. Called by all mutating methods.
    pub fn invalidate_caches(&mut self) {
        self.na_cache.get_mut().clear();
    }

    #[inline]
    fn set_mark(&mut self, from: usize, to: usize, value: bool) {
        let idx = self.index(from, to);
        self.mat[idx] = value;
    }

    /// Row-major offset; both nodes must be below `n` so no row wraps into the next.
    #[inline]
    fn index(&self, from: usize, to: usize) -> usize {
        assert!(
            from < self.n && to < self.n,
            "node pair ({}, {}) out of range for a graph with {} nodes",
            from,
            to,
            self.n
        );
        from * self.n + to
    }
}
