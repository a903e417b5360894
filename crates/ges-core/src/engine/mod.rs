//! The search engine.
//!
//! This module provides:
//! - **errors**: Error type shared by every fallible operation
//! - **pdag**: Adjacency-matrix graph store with cached `NA(y, x)` sets
//! - **cliques**: Clique enumeration and semi-directed path blocking
//! - **extension**: Dor–Tarsi consistent extension of a PDAG
//! - **dag**: Topological order, edge labelling and CPDAG completion
//! - **operators**: Insert/delete operator generation and application
//! - **dataset**: Validated mixed continuous/categorical input
//! - **numeric_kernels**: Covariance, pseudo-inverse and pseudo-determinant kernels
//! - **scorer**: Memoised local score with categorical embeddings
//! - **search**: The forward/backward GES state machine

pub mod cliques;
pub mod dag;
pub mod dataset;
pub mod errors;
pub mod extension;
pub mod numeric_kernels;
pub mod operators;
pub mod pdag;
pub mod scorer;
pub mod search;
