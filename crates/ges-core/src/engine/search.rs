//! Greedy Equivalence Search driver.
//!
//! The search is an explicit state machine over the current CPDAG. Each pass materialises every
//! operator of the current phase, scores them one at a time, and then either applies the best
//! strictly improving one or moves on to the next phase:
//!
//! ```text
//! Forward (inserts) --no improving insert--> Backward (deletes) --no improving delete--> Done
//! ```
//!
//! Callers drive it at three granularities: [`GesSearch::micro_step`] scores one operator,
//! [`GesSearch::step`] runs to the end of the current pass, and
//! [`GesSearch::run_to_completion`] loops until done or until the pause flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::dag::complete_in_place;
use crate::engine::dataset::Dataset;
use crate::engine::errors::GesError;
use crate::engine::operators::{operators, Operator, OperatorKind};
use crate::engine::pdag::Pdag;
use crate::engine::scorer::{LocalScorer, ScorerConfig};

/// Search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct SearchConfig {
    /// Refuse datasets with more variables than this.
    pub max_nodes: Option<usize>,
    /// Run the insert phase.
    pub forward: bool,
    /// Run the delete phase.
    pub backward: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_nodes: None,
            forward: true,
            backward: true,
        }
    }
}

impl SearchConfig {
    fn validate(&self, n_vars: usize) -> Result<(), GesError> {
        if !self.forward && !self.backward {
            return Err(GesError::ValidationError(
                "at least one of the forward and backward phases must run".into(),
            ));
        }
        if let Some(max) = self.max_nodes {
            if n_vars > max {
                return Err(GesError::ValidationError(format!(
                    "dataset has {} variables, above the limit of {}",
                    n_vars, max
                )));
            }
        }
        Ok(())
    }
}

/// Search phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    Forward,
    Backward,
    Done,
}

impl Phase {
    /// Operators generated in this phase; `None` once done.
    pub fn operator_kind(self) -> Option<OperatorKind> {
        match self {
            Phase::Forward => Some(OperatorKind::Insert),
            Phase::Backward => Some(OperatorKind::Delete),
            Phase::Done => None,
        }
    }
}

/// An operator with its score change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredOperator {
    pub operator: Operator,
    pub delta: f64,
}

/// Observable search state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchState {
    pub phase: Phase,
    /// Score of the current CPDAG: the empty-graph score plus every applied delta.
    pub total_score: f64,
    /// Operators applied so far.
    pub macro_steps: usize,
    /// Operators scored so far.
    pub micro_steps: usize,
    pub terminated: bool,
    /// Size of the current pass and how many of its operators have been scored.
    pub pass_size: usize,
    pub pass_cursor: usize,
    /// Highest-delta operator of the current pass.
    pub best: Option<ScoredOperator>,
    /// Most recently scored operator.
    pub last_attempted: Option<ScoredOperator>,
}

/// Result of one [`GesSearch::micro_step`].
#[derive(Debug, Clone, PartialEq)]
pub enum MicroStep {
    /// One operator was scored.
    Evaluated(ScoredOperator),
    /// The pass ended and its best operator was applied.
    Applied(ScoredOperator),
    /// The pass ended with no improving operator; the search left `phase`.
    PhaseFinished(Phase),
    /// Nothing left to do.
    Terminated,
}

/// Result of one [`GesSearch::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Applied(ScoredOperator),
    PhaseFinished(Phase),
    /// The pause flag was raised mid-pass; the pass resumes where it stopped.
    Paused,
    Terminated,
}

/// Snapshot returned by [`GesSearch::run_to_completion`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchOutcome {
    pub graph: Pdag,
    pub score: f64,
    pub macro_steps: usize,
    pub micro_steps: usize,
    /// False when the run stopped because of the pause flag.
    pub completed: bool,
}

struct Pass {
    operators: Vec<Operator>,
    cursor: usize,
}

/// A GES run over one dataset.
pub struct GesSearch<'a> {
    scorer: LocalScorer<'a>,
    config: SearchConfig,
    graph: Pdag,
    state: SearchState,
    pass: Option<Pass>,
    pause: Arc<AtomicBool>,
}

impl<'a> GesSearch<'a> {
    /// Starts from the empty graph, whose score is the sum of every empty-parent score.
    pub fn new(
        data: &'a Dataset,
        config: SearchConfig,
        scorer_config: ScorerConfig,
    ) -> Result<Self, GesError> {
        config.validate(data.n_vars())?;
        let mut scorer = LocalScorer::new(data, scorer_config)?;
        let n = data.n_vars();
        let mut total_score = 0.0;
        for v in 0..n {
            total_score += scorer.score(v, &[])?;
        }
        let phase = if config.forward {
            Phase::Forward
        } else {
            Phase::Backward
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "GES over {} variables and {} samples; empty-graph score {:.4}",
            n,
            data.n_samples(),
            total_score
        );

        Ok(Self {
            scorer,
            config,
            graph: Pdag::empty(n),
            state: SearchState {
                phase,
                total_score,
                macro_steps: 0,
                micro_steps: 0,
                terminated: false,
                pass_size: 0,
                pass_cursor: 0,
                best: None,
                last_attempted: None,
            },
            pass: None,
            pause: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn graph(&self) -> &Pdag {
        &self.graph
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn scorer(&self) -> &LocalScorer<'a> {
        &self.scorer
    }

    /// Shared flag checked between micro-steps by [`step`](Self::step) and
    /// [`run_to_completion`](Self::run_to_completion). Clear it to resume.
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pause)
    }

    /// Memoised local score of `node` given `parents`.
    pub fn score_of(&mut self, node: usize, parents: &[usize]) -> Result<f64, GesError> {
        self.scorer.score(node, parents)
    }

    /// Advances by one unit: scores the next operator of the pass, or closes the pass.
    pub fn micro_step(&mut self) -> Result<MicroStep, GesError> {
        let Some(kind) = self.state.phase.operator_kind() else {
            return Ok(MicroStep::Terminated);
        };
        let mut pass = match self.pass.take() {
            Some(pass) => pass,
            None => self.open_pass(kind),
        };

        let Some(operator) = pass.operators.get(pass.cursor).cloned() else {
            return self.close_pass();
        };
        pass.cursor += 1;
        self.state.pass_cursor = pass.cursor;
        self.pass = Some(pass);

        let (before, after) = operator.scored_parent_sets(&self.graph);
        let delta = self.scorer.score(operator.y, &after)? - self.scorer.score(operator.y, &before)?;
        let scored = ScoredOperator { operator, delta };

        self.state.micro_steps += 1;
        let improves_best = self
            .state
            .best
            .as_ref()
            .map_or(true, |best| delta > best.delta);
        if improves_best {
            self.state.best = Some(scored.clone());
        }
        self.state.last_attempted = Some(scored.clone());
        Ok(MicroStep::Evaluated(scored))
    }

    /// Runs micro-steps to the end of the current pass.
    pub fn step(&mut self) -> Result<StepOutcome, GesError> {
        loop {
            if self.pause.load(Ordering::SeqCst) {
                return Ok(StepOutcome::Paused);
            }
            match self.micro_step()? {
                MicroStep::Evaluated(_) => continue,
                MicroStep::Applied(scored) => return Ok(StepOutcome::Applied(scored)),
                MicroStep::PhaseFinished(phase) => return Ok(StepOutcome::PhaseFinished(phase)),
                MicroStep::Terminated => return Ok(StepOutcome::Terminated),
            }
        }
    }

    /// Loops until both phases are done or the pause flag is raised.
    pub fn run_to_completion(&mut self) -> Result<SearchOutcome, GesError> {
        while !self.state.terminated {
            if self.pause.load(Ordering::SeqCst) {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "GES paused in {:?} after {} operator evaluations",
                    self.state.phase,
                    self.state.micro_steps
                );
                return Ok(self.outcome(false));
            }
            self.micro_step()?;
        }
        Ok(self.outcome(true))
    }

    fn outcome(&self, completed: bool) -> SearchOutcome {
        SearchOutcome {
            graph: self.graph.clone(),
            score: self.state.total_score,
            macro_steps: self.state.macro_steps,
            micro_steps: self.state.micro_steps,
            completed,
        }
    }

    fn open_pass(&mut self, kind: OperatorKind) -> Pass {
        let operators = operators(kind, &self.graph);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "{:?} pass {} enumerated {} operators",
            self.state.phase,
            self.state.macro_steps + 1,
            operators.len()
        );

        self.state.pass_size = operators.len();
        self.state.pass_cursor = 0;
        self.state.best = None;
        Pass {
            operators,
            cursor: 0,
        }
    }

    fn close_pass(&mut self) -> Result<MicroStep, GesError> {
        self.pass = None;
        match self.state.best.take() {
            Some(best) if best.delta > 0.0 => {
                self.apply(&best)?;
                Ok(MicroStep::Applied(best))
            }
            _ => {
                let finished = self.state.phase;
                self.state.phase = match finished {
                    Phase::Forward if self.config.backward => Phase::Backward,
                    _ => Phase::Done,
                };
                self.state.terminated = self.state.phase == Phase::Done;

                #[cfg(feature = "tracing")]
                {
                    let stats = self.scorer.stats();
                    tracing::info!(
                        "GES finished {:?} phase: score {:.4}, {} operators applied",
                        finished,
                        self.state.total_score,
                        self.state.macro_steps
                    );
                    tracing::debug!(
                        "score cache: {} entries, {} hits, {} misses",
                        self.scorer.cache_len(),
                        stats.hits,
                        stats.misses
                    );
                }

                Ok(MicroStep::PhaseFinished(finished))
            }
        }
    }

    /// Applies `best` to a copy of the graph and re-canonicalises it. A failure here means an
    /// operator broke extendability; the run is stopped and the graph left as it was.
    fn apply(&mut self, best: &ScoredOperator) -> Result<(), GesError> {
        let mut next = self.graph.clone();
        best.operator.apply(&mut next);
        if let Err(err) = complete_in_place(&mut next) {
            #[cfg(feature = "tracing")]
            tracing::error!("canonicalisation failed after {:?}: {}", best.operator, err);
            self.state.phase = Phase::Done;
            self.state.terminated = true;
            return Err(err);
        }
        self.graph = next;
        self.state.total_score += best.delta;
        self.state.macro_steps += 1;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "applied {:?}(y={}, x={}, set={:?}) delta {:.4}, score {:.4}",
            best.operator.kind,
            best.operator.y,
            best.operator.x,
            best.operator.set.as_slice(),
            best.delta,
            self.state.total_score
        );
        Ok(())
    }
}
