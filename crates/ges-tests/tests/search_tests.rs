//! End-to-end recovery of known structures from seeded synthetic data

use ges_core::engine::operators::delete_operators;
use ges_core::metrics::structural_hamming_distance;
use ges_core::{
    run_ges, GesSearch, LocalScorer, MicroStep, Phase, ScorerConfig, SearchConfig, StepOutcome,
};
use ges_tests::{SyntheticModel, VarKind};

#[test]
fn chain_recovers_undirected_class() {
    let model = SyntheticModel::continuous(3, &[(0, 1), (1, 2)]);
    let data = model.sample(500, 42).expect("sample");
    let outcome = run_ges(&data).expect("search");

    let g = &outcome.graph;
    assert!(g.is_undirected(0, 1));
    assert!(g.is_undirected(1, 2));
    assert!(!g.adjacent(0, 2));
    assert!(outcome.completed);
}

#[test]
fn collider_recovers_compelled_arcs() {
    let model = SyntheticModel::continuous(3, &[(0, 1), (2, 1)]);
    let data = model.sample(500, 7).expect("sample");
    let outcome = run_ges(&data).expect("search");

    let g = &outcome.graph;
    assert!(g.is_directed(0, 1));
    assert!(g.is_directed(2, 1));
    assert!(!g.adjacent(0, 2));
}

#[test]
fn larger_graph_recovers_equivalence_class() {
    // 0 -> 2 <- 1, 2 -> 3 -> 4, 1 -> 4
    let model = SyntheticModel::continuous(5, &[(0, 2), (1, 2), (2, 3), (3, 4), (1, 4)]);
    let data = model.sample(2000, 1).expect("sample");
    let outcome = run_ges(&data).expect("search");
    let truth = model.cpdag().expect("cpdag");
    assert_eq!(
        structural_hamming_distance(&truth, &outcome.graph).expect("shd"),
        0,
        "learned {:?}",
        outcome.graph.edges()
    );
}

#[test]
fn finished_search_leaves_no_improving_deletion() {
    // Holds for any sample, including ones where the data favour an extra arc.
    let model = SyntheticModel::continuous(5, &[(0, 2), (1, 2), (2, 3), (3, 4), (1, 4)]);
    for seed in [1, 2024] {
        let data = model.sample(2000, seed).expect("sample");
        let outcome = run_ges(&data).expect("search");
        let mut scorer = LocalScorer::new(&data, ScorerConfig::default()).expect("scorer");
        for op in delete_operators(&outcome.graph) {
            let (before, after) = op.scored_parent_sets(&outcome.graph);
            let delta = scorer.score(op.y, &after).expect("score")
                - scorer.score(op.y, &before).expect("score");
            assert!(delta <= 0.0, "seed {}: {:?} still improves by {}", seed, op, delta);
        }
    }
}

#[test]
fn categorical_root_is_linked_to_its_child_only() {
    // c (3 categories) -> y -> z
    let model = SyntheticModel::new(
        vec![VarKind::Categorical(3), VarKind::Continuous, VarKind::Continuous],
        vec![(0, 1, 2.0), (1, 2, 1.0)],
    );
    let data = model.sample(1000, 99).expect("sample");
    let outcome = run_ges(&data).expect("search");

    let g = &outcome.graph;
    assert!(g.adjacent(0, 1));
    assert!(g.adjacent(1, 2));
    assert!(!g.adjacent(0, 2));
}

#[test]
fn stepping_and_running_reach_the_same_result() {
    let model = SyntheticModel::continuous(4, &[(0, 1), (1, 2), (3, 2)]);
    let data = model.sample(800, 5).expect("sample");

    let direct = run_ges(&data).expect("search");

    let mut search =
        GesSearch::new(&data, SearchConfig::default(), ScorerConfig::default()).expect("new");
    let mut phases = Vec::new();
    let mut applied = 0;
    loop {
        match search.step().expect("step") {
            StepOutcome::Applied(_) => applied += 1,
            StepOutcome::PhaseFinished(phase) => phases.push(phase),
            StepOutcome::Terminated => break,
            StepOutcome::Paused => unreachable!("pause flag never raised"),
        }
    }
    assert_eq!(phases, vec![Phase::Forward, Phase::Backward]);
    assert_eq!(applied, direct.macro_steps);
    assert_eq!(search.graph(), &direct.graph);
    assert_eq!(search.state().total_score, direct.score);
    assert_eq!(search.micro_step().expect("done"), MicroStep::Terminated);
}

#[test]
fn every_applied_delta_is_positive_and_scores_accumulate() {
    let model = SyntheticModel::continuous(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
    let data = model.sample(600, 17).expect("sample");
    let mut search =
        GesSearch::new(&data, SearchConfig::default(), ScorerConfig::default()).expect("new");

    let mut running = search.state().total_score;
    loop {
        match search.micro_step().expect("micro step") {
            MicroStep::Applied(best) => {
                assert!(best.delta > 0.0);
                running += best.delta;
                assert_eq!(search.state().total_score, running);
            }
            MicroStep::Terminated => break,
            MicroStep::Evaluated(_) | MicroStep::PhaseFinished(_) => {}
        }
    }
}

#[test]
fn empty_parent_score_is_closed_form_gaussian() {
    let model = SyntheticModel::continuous(2, &[(0, 1)]).with_noise_std(2.5);
    let data = model.sample(400, 3).expect("sample");
    let mut scorer = LocalScorer::new(&data, ScorerConfig::default()).expect("scorer");

    for v in 0..2 {
        let column = data.column(v);
        let n = column.len() as f64;
        let mean = column.iter().sum::<f64>() / n;
        let var = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let expected = -0.5 * n * (var.ln() + 1.0 + (2.0 * std::f64::consts::PI).ln());
        let got = scorer.score(v, &[]).expect("score");
        assert!(
            (got - expected).abs() < 1e-8 * expected.abs(),
            "node {}: {} vs {}",
            v,
            got,
            expected
        );
    }
}

#[test]
fn node_guard_rejects_wide_inputs() {
    let model = SyntheticModel::continuous(4, &[]);
    let data = model.sample(50, 1).expect("sample");
    let config = SearchConfig {
        max_nodes: Some(3),
        ..SearchConfig::default()
    };
    let err = GesSearch::new(&data, config, ScorerConfig::default())
        .err()
        .expect("guard must trigger");
    assert!(err.to_string().contains("above the limit"));
}
