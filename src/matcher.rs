//! Global one-to-one assignment between the two inventories.
//!
//! The problem is maximum-weight bipartite matching where leaving any
//! element unmatched is always a feasible zero-cost alternative. The exact
//! path runs Kuhn-Munkres over an integer weight matrix padded with one null
//! column per reference row; the greedy fallback is a two-pass
//! approximation, labeled as such, and only runs when configured.

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};
use tracing::debug;

use crate::config::MatcherMode;
use crate::error::{ReconError, Result};
use crate::schema::{Assignment, Candidate, SolverMethod};

/// Fixed-point scale applied to scores before integer optimization.
const SCORE_SCALE: f64 = 10_000.0;

/// Capability interface: solve the matching problem over admissible
/// candidates. `m` and `n` are the inventory sizes; candidates outside
/// `[0,m) x [0,n)` are a caller bug.
pub trait AssignmentSolver {
    fn method(&self) -> SolverMethod;
    fn solve(&self, m: usize, n: usize, candidates: &[Candidate]) -> Result<Assignment>;
}

pub fn solver_for(mode: MatcherMode, greedy_threshold: f64) -> Box<dyn AssignmentSolver> {
    match mode {
        MatcherMode::Exact => Box::new(ExactSolver),
        MatcherMode::Greedy => Box::new(GreedySolver {
            high_confidence: greedy_threshold,
        }),
    }
}

/// Rectangular weight matrix for Kuhn-Munkres.
struct ScoreMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i64>,
}

impl Weights<i64> for ScoreMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.cols + col]
    }

    fn neg(&self) -> Self {
        ScoreMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| -v).collect(),
        }
    }
}

/// Exact maximum-weight matching via Kuhn-Munkres.
///
/// Weights are lexicographic: the scaled score dominates, and a small index
/// penalty breaks exact ties toward the lower (reference_id, system_id)
/// pair, so identical inputs yield identical assignments across runs.
pub struct ExactSolver;

impl AssignmentSolver for ExactSolver {
    fn method(&self) -> SolverMethod {
        SolverMethod::Exact
    }

    fn solve(&self, m: usize, n: usize, candidates: &[Candidate]) -> Result<Assignment> {
        let admissible: Vec<&Candidate> = candidates.iter().filter(|c| c.admissible).collect();
        if m == 0 || n == 0 || admissible.is_empty() {
            return Ok(Assignment::empty(SolverMethod::Exact, true));
        }

        // One extra zero-weight column per reference row models the null
        // counterpart; every row can always go unmatched.
        let cols = n + m;
        let big = (m as i64) * (n as i64) * (m as i64) + 1;
        let forbidden = -20_000 * big;
        let mut data = vec![0i64; m * cols];
        for row in 0..m {
            for col in 0..n {
                data[row * cols + col] = forbidden;
            }
        }
        for c in &admissible {
            if c.reference >= m || c.system >= n {
                return Err(ReconError::Solver(format!(
                    "candidate ({}, {}) outside inventory bounds {}x{}",
                    c.reference, c.system, m, n
                )));
            }
            let raw = (c.score.clamp(0.0, 1.0) * SCORE_SCALE).round() as i64;
            let tie_break = (c.reference * n + c.system + 1) as i64;
            data[c.reference * cols + c.system] = raw * big - tie_break;
        }

        let matrix = ScoreMatrix { rows: m, cols, data };
        let (total, assigned) = kuhn_munkres(&matrix);
        debug!(total, "kuhn-munkres solved");

        let mut pairs = Vec::new();
        for (row, &col) in assigned.iter().enumerate() {
            if col >= n {
                continue; // null counterpart: row left unmatched
            }
            let weight = matrix.at(row, col);
            if weight <= forbidden {
                return Err(ReconError::Solver(format!(
                    "assignment selected inadmissible pair ({}, {})",
                    row, col
                )));
            }
            if weight > 0 {
                pairs.push((row, col));
            }
        }
        pairs.sort_unstable();
        Ok(Assignment {
            pairs,
            method: SolverMethod::Exact,
            optimal: true,
        })
    }
}

/// Two-pass greedy approximation: commit high-confidence candidates first,
/// then sweep the rest. Not guaranteed optimal; the assignment is labeled
/// accordingly and the mode is never substituted silently for the exact
/// solver.
pub struct GreedySolver {
    pub high_confidence: f64,
}

impl AssignmentSolver for GreedySolver {
    fn method(&self) -> SolverMethod {
        SolverMethod::Greedy
    }

    fn solve(&self, m: usize, n: usize, candidates: &[Candidate]) -> Result<Assignment> {
        let mut admissible: Vec<&Candidate> = candidates.iter().filter(|c| c.admissible).collect();
        admissible.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.reference.cmp(&b.reference))
                .then(a.system.cmp(&b.system))
        });

        let mut ref_used = vec![false; m];
        let mut sys_used = vec![false; n];
        let mut pairs = Vec::new();
        // Pass 1: high-confidence only; pass 2: anything admissible.
        for pass in 0..2 {
            for c in &admissible {
                if pass == 0 && c.score < self.high_confidence {
                    continue;
                }
                if ref_used[c.reference] || sys_used[c.system] {
                    continue;
                }
                ref_used[c.reference] = true;
                sys_used[c.system] = true;
                pairs.push((c.reference, c.system));
            }
        }
        pairs.sort_unstable();
        Ok(Assignment {
            pairs,
            method: SolverMethod::Greedy,
            optimal: false,
        })
    }
}
