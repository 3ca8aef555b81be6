use std::{fmt, path::Path, str::FromStr};

use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::game::{FEATURE_LEN, GameState};

/// Discrete actions a policy can pick from. Order is the logit order of the
/// default network head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Noop,
	LevelUp,
	Reroll,
	BuyUnit,
	SellUnit,
}

impl Action {
	pub const ALL: [Action; 5] = [
		Action::Noop,
		Action::LevelUp,
		Action::Reroll,
		Action::BuyUnit,
		Action::SellUnit,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Noop => "noop",
			Self::LevelUp => "level_up",
			Self::Reroll => "reroll",
			Self::BuyUnit => "buy_unit",
			Self::SellUnit => "sell_unit",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|a| a.as_str() == s.trim())
			.with_context(|| format!("unknown action {s:?}"))
	}
}

pub trait Policy {
	fn name(&self) -> &str;
	fn choose(&self, state: &GameState) -> Action;
}

/// Hand-written rules. Deterministic; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct RuleBasedPolicy {
	valid_actions: Vec<Action>,
}

impl Default for RuleBasedPolicy {
	fn default() -> Self {
		Self {
			valid_actions: Action::ALL.to_vec(),
		}
	}
}

impl RuleBasedPolicy {
	pub fn new() -> Self {
		Self::default()
	}

	/// Restrict the policy to a subset of actions. An empty list means all.
	pub fn with_valid_actions(valid_actions: Vec<Action>) -> Self {
		if valid_actions.is_empty() {
			return Self::default();
		}
		Self { valid_actions }
	}

	pub fn choose_from(&self, state: &GameState, valid: &[Action]) -> Action {
		let allowed = |a: Action| valid.contains(&a);
		let gold = state.gold;
		let (major, _) = state.round();

		if state.health <= 15 && gold >= 4 && allowed(Action::LevelUp) {
			return Action::LevelUp;
		}
		if major == 1 && gold >= 2 && allowed(Action::BuyUnit) {
			return Action::BuyUnit;
		}
		if (2..=4).contains(&major) && gold >= 4 && state.board_level < 7 && allowed(Action::LevelUp) {
			return Action::LevelUp;
		}
		if gold >= 50 && allowed(Action::Reroll) {
			return Action::Reroll;
		}
		if (20..50).contains(&gold) && allowed(Action::BuyUnit) {
			return Action::BuyUnit;
		}

		if allowed(Action::Noop) {
			return Action::Noop;
		}
		valid.first().copied().unwrap_or(Action::Noop)
	}
}

impl Policy for RuleBasedPolicy {
	fn name(&self) -> &str {
		"rules"
	}

	fn choose(&self, state: &GameState) -> Action {
		self.choose_from(state, &self.valid_actions)
	}
}

/// Dense layer as stored on disk: `weights[out][in]`.
#[derive(Debug, Clone, Deserialize)]
pub struct Layer {
	pub weights: Vec<Vec<f32>>,
	pub bias: Vec<f32>,
}

impl Layer {
	fn forward(&self, input: &[f32]) -> Vec<f32> {
		self.weights
			.iter()
			.zip(&self.bias)
			.map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
			.collect()
	}
}

#[derive(Debug, Clone, Deserialize)]
struct MlpFile {
	#[serde(default = "default_actions")]
	actions: Vec<Action>,
	layers: Vec<Layer>,
}

fn default_actions() -> Vec<Action> {
	Action::ALL.to_vec()
}

/// Feed-forward network over [`GameState::to_vector`]: ReLU between layers,
/// raw logits out, argmax picks the action.
///
/// Weights file:
///
/// ```json
/// {"actions": ["noop", "level_up", "reroll", "buy_unit", "sell_unit"],
///  "layers": [{"weights": [[...], ...], "bias": [...]}, ...]}
/// ```
#[derive(Debug, Clone)]
pub struct MlpPolicy {
	actions: Vec<Action>,
	layers: Vec<Layer>,
}

impl MlpPolicy {
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let file = std::fs::File::open(path).with_context(|| format!("Open policy weights {}", path.display()))?;
		let parsed: MlpFile = serde_json::from_reader(std::io::BufReader::new(file))
			.with_context(|| format!("Parse policy weights {}", path.display()))?;
		Self::new(parsed.actions, parsed.layers)
	}

	pub fn new(actions: Vec<Action>, layers: Vec<Layer>) -> anyhow::Result<Self> {
		ensure!(!actions.is_empty(), "policy has no actions");
		ensure!(!layers.is_empty(), "policy has no layers");

		let mut width = FEATURE_LEN;
		for (i, layer) in layers.iter().enumerate() {
			ensure!(
				layer.weights.len() == layer.bias.len(),
				"layer {i}: {} weight rows but {} biases",
				layer.weights.len(),
				layer.bias.len()
			);
			if let Some(row) = layer.weights.iter().find(|row| row.len() != width) {
				bail!("layer {i}: expected {width} inputs, found a row of {}", row.len());
			}
			width = layer.bias.len();
		}
		ensure!(
			width == actions.len(),
			"output layer has {width} logits for {} actions",
			actions.len()
		);

		Ok(Self { actions, layers })
	}

	pub fn logits(&self, features: &[f32; FEATURE_LEN]) -> Vec<f32> {
		let last = self.layers.len() - 1;
		let mut x = features.to_vec();
		for (i, layer) in self.layers.iter().enumerate() {
			x = layer.forward(&x);
			if i != last {
				x.iter_mut().for_each(|v| *v = v.max(0.0));
			}
		}
		x
	}
}

impl Policy for MlpPolicy {
	fn name(&self) -> &str {
		"mlp"
	}

	fn choose(&self, state: &GameState) -> Action {
		let logits = self.logits(&state.to_vector());
		// First maximum wins on ties; NaN logits never win.
		let idx = logits
			.iter()
			.enumerate()
			.filter(|(_, v)| !v.is_nan())
			.fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
				Some((_, b)) if v <= b => best,
				_ => Some((i, v)),
			})
			.map_or(0, |(i, _)| i);
		self.actions.get(idx).or(self.actions.first()).copied().unwrap_or(Action::Noop)
	}
}
