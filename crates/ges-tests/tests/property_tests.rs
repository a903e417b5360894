//! Property tests for the graph algebra: extension, completion, NA caching and operators (n ≤ 7)

use ges_core::engine::cliques::blocks_semi_directed_paths;
use ges_core::engine::operators::{
    delete_operators, delete_operators_exhaustive, insert_operators, insert_operators_exhaustive,
};
use ges_core::{completion, consistent_extension, Dag, Edge, Pdag};
use ges_tests::sorted_operators;
use proptest::prelude::*;

/// A random DAG: a shuffled node order plus one coin per forward pair.
fn arb_dag() -> impl Strategy<Value = Dag> {
    (2usize..=7).prop_flat_map(|n| {
        let pairs = n * (n - 1) / 2;
        (
            Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
            proptest::collection::vec(proptest::bool::weighted(0.4), pairs),
        )
            .prop_map(move |(order, coins)| {
                let mut edges = Vec::new();
                let mut coin = coins.iter();
                for i in 0..n {
                    for j in (i + 1)..n {
                        if coin.next().copied().unwrap_or(false) {
                            edges.push(Edge::Directed {
                                from: order[i],
                                to: order[j],
                            });
                        }
                    }
                }
                let pdag = Pdag::from_edges(n, &edges).expect("edges in range");
                Dag::from_pdag(pdag).expect("forward edges are acyclic")
            })
    })
}

fn arb_cpdag() -> impl Strategy<Value = Pdag> {
    arb_dag().prop_map(|dag| dag.to_cpdag().expect("cpdag"))
}

proptest! {
    #[test]
    fn extension_of_a_dag_keeps_its_edges(dag in arb_dag()) {
        let extended = consistent_extension(dag.as_pdag()).expect("a DAG extends to itself");
        prop_assert_eq!(extended.as_pdag(), dag.as_pdag());
    }

    #[test]
    fn completion_is_idempotent(cpdag in arb_cpdag()) {
        let again = completion(&cpdag).expect("completion");
        prop_assert_eq!(&again, &cpdag);
    }

    #[test]
    fn extension_stays_in_the_equivalence_class(dag in arb_dag()) {
        let cpdag = dag.to_cpdag().expect("cpdag");
        let member = consistent_extension(&cpdag).expect("extension");
        prop_assert_eq!(member.to_cpdag().expect("cpdag"), cpdag.clone());
        for edge in cpdag.edges() {
            if let Edge::Directed { from, to } = edge {
                prop_assert!(member.as_pdag().is_directed(from, to));
            }
        }
    }

    #[test]
    fn na_is_bounded_and_never_stale(cpdag in arb_cpdag(), a in 0usize..7, b in 0usize..7) {
        let mut g = cpdag;
        let n = g.n();
        for y in 0..n {
            for x in 0..n {
                let neighbors = g.neighbors(y);
                let adjacent = g.adjacents(x);
                for v in g.na(y, x) {
                    prop_assert!(neighbors.contains(&v) && adjacent.contains(&v));
                }
            }
        }
        prop_assert!(g.cached_na_entries() > 0);

        let (a, b) = (a % n, b % n);
        if a != b {
            if g.adjacent(a, b) {
                g.remove_edge(a, b);
            } else {
                g.add_undirected(a, b);
            }
        }
        for y in 0..n {
            for x in 0..n {
                prop_assert_eq!(g.na(y, x), g.na_uncached(y, x));
            }
        }
    }

    #[test]
    fn insert_enumeration_matches_exhaustive_reference(cpdag in arb_cpdag()) {
        let fast = sorted_operators(insert_operators(&cpdag));
        let slow = sorted_operators(insert_operators_exhaustive(&cpdag));
        prop_assert_eq!(&fast, &slow);

        for op in &fast {
            let mut wall: Vec<usize> = op.na.iter().chain(op.set.iter()).copied().collect();
            wall.sort_unstable();
            prop_assert!(cpdag.is_clique(&wall));
            prop_assert!(blocks_semi_directed_paths(&cpdag, op.y, op.x, &wall));
        }
    }

    #[test]
    fn delete_enumeration_matches_exhaustive_reference(cpdag in arb_cpdag()) {
        let fast = sorted_operators(delete_operators(&cpdag));
        let slow = sorted_operators(delete_operators_exhaustive(&cpdag));
        prop_assert_eq!(fast, slow);
    }

    #[test]
    fn applied_operators_stay_extendable(cpdag in arb_cpdag()) {
        let candidates = insert_operators(&cpdag)
            .into_iter()
            .chain(delete_operators(&cpdag));
        for op in candidates {
            let mut next = cpdag.clone();
            op.apply(&mut next);
            let completed = completion(&next);
            prop_assert!(completed.is_ok(), "{:?} broke extendability: {:?}", op, completed);
        }
    }
}
