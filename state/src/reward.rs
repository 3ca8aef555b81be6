use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::game::GameState;

pub const HEALTH_LOSS_WEIGHT: f32 = 0.05;
pub const ROUND_ADVANCE_BONUS: f32 = 0.1;
pub const MATCH_RESULT_REWARD: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
	Win,
	Lose,
}

impl FromStr for MatchResult {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"win" => Ok(Self::Win),
			"lose" | "loss" => Ok(Self::Lose),
			other => anyhow::bail!("unknown match result {other:?}"),
		}
	}
}

/// Scalar reward for the step `prev → new`.
///
/// Health loss is penalized (gains are ignored), advancing the round label
/// earns a small bonus, and a finished match adds or subtracts the result
/// reward on top.
pub fn compute_reward(prev: &GameState, new: &GameState, done: bool, result: Option<MatchResult>) -> f32 {
	let mut reward = 0.0;

	let health_delta = new.health as f32 - prev.health as f32;
	if health_delta < 0.0 {
		reward += health_delta * HEALTH_LOSS_WEIGHT;
	}

	if new.round() > prev.round() {
		reward += ROUND_ADVANCE_BONUS;
	}

	if done {
		match result {
			Some(MatchResult::Win) => reward += MATCH_RESULT_REWARD,
			Some(MatchResult::Lose) => reward -= MATCH_RESULT_REWARD,
			None => {}
		}
	}
	reward
}
