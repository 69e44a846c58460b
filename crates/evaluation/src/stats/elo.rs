//! ELO rating system for pairwise agent comparison.
//!
//! Standard chess-style ELO as adapted by Chatbot Arena for model
//! ranking: starting rating 1500, K = 32, deltas rounded to 0.01.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: f64 = 1500.0;
pub const DEFAULT_K_FACTOR: f64 = 32.0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Match inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    AWins,
    BWins,
    Draw,
}

/// One pairwise match between two agents, in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub agent_a: String,
    pub agent_b: String,
    pub outcome: MatchOutcome,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rating math
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rating deltas applied to both sides after a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdate {
    pub winner_new_rating: f64,
    pub loser_new_rating: f64,
    pub winner_delta: f64,
    pub loser_delta: f64,
}

/// Probability that the player rated `rating_a` beats `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
}

/// New ratings after a match. With `draw`, both sides score 0.5 and
/// move toward each other.
pub fn update_ratings(winner_rating: f64, loser_rating: f64, k_factor: f64, draw: bool) -> EloUpdate {
    let exp_winner = expected_score(winner_rating, loser_rating);
    let exp_loser = 1.0 - exp_winner;

    let (actual_winner, actual_loser) = if draw { (0.5, 0.5) } else { (1.0, 0.0) };

    let winner_delta = round2(k_factor * (actual_winner - exp_winner));
    let loser_delta = round2(k_factor * (actual_loser - exp_loser));

    EloUpdate {
        winner_new_rating: round2(winner_rating + winner_delta),
        loser_new_rating: round2(loser_rating + loser_delta),
        winner_delta,
        loser_delta,
    }
}

/// Fold a chronological match list into final ratings. Unseen agents
/// enter at [`DEFAULT_RATING`].
pub fn compute_rankings(matches: &[MatchResult], k_factor: f64) -> HashMap<String, f64> {
    let mut ratings: HashMap<String, f64> = HashMap::new();

    for m in matches {
        let a = *ratings.entry(m.agent_a.clone()).or_insert(DEFAULT_RATING);
        let b = *ratings.entry(m.agent_b.clone()).or_insert(DEFAULT_RATING);

        match m.outcome {
            MatchOutcome::AWins => {
                let update = update_ratings(a, b, k_factor, false);
                ratings.insert(m.agent_a.clone(), update.winner_new_rating);
                ratings.insert(m.agent_b.clone(), update.loser_new_rating);
            }
            MatchOutcome::BWins => {
                let update = update_ratings(b, a, k_factor, false);
                ratings.insert(m.agent_b.clone(), update.winner_new_rating);
                ratings.insert(m.agent_a.clone(), update.loser_new_rating);
            }
            MatchOutcome::Draw => {
                let update = update_ratings(a, b, k_factor, true);
                ratings.insert(m.agent_a.clone(), update.winner_new_rating);
                ratings.insert(m.agent_b.clone(), update.loser_new_rating);
            }
        }
    }

    ratings
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
