//! Human-facing recommendations shown in the overlay.

use serde::Serialize;

use crate::game::GameState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recommendation {
	LevelUp { explanation: String },
	BuyHero { hero: String, slot: u8, explanation: String },
	Aggressive { explanation: String },
	Hold { explanation: String },
}

impl Recommendation {
	pub fn explanation(&self) -> &str {
		match self {
			Self::LevelUp { explanation }
			| Self::BuyHero { explanation, .. }
			| Self::Aggressive { explanation }
			| Self::Hold { explanation } => explanation,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::LevelUp { .. } => "level_up",
			Self::BuyHero { .. } => "buy_hero",
			Self::Aggressive { .. } => "aggressive",
			Self::Hold { .. } => "hold",
		}
	}
}

/// Ordered recommendations for `state`. Never empty.
pub fn recommend_actions(state: &GameState) -> Vec<Recommendation> {
	let mut recs = Vec::new();

	if state.gold >= 50 && state.board_level < 9 {
		recs.push(Recommendation::LevelUp {
			explanation: "Plenty of gold; a higher board level raises the odds of strong heroes.".into(),
		});
	}

	if let Some(hero) = state.shop_slots.iter().find(|h| h.cost == 1 && h.slot_index == 0) {
		recs.push(Recommendation::BuyHero {
			hero: hero.name.clone(),
			slot: hero.slot_index,
			explanation: format!("{} is cheap and in the first slot, a good early pick.", hero.name),
		});
	}

	if state.health < 20 {
		recs.push(Recommendation::Aggressive {
			explanation: "Low health: spend gold on the board to avoid elimination.".into(),
		});
	}

	if recs.is_empty() {
		recs.push(Recommendation::Hold {
			explanation: "No clear play; keep the gold.".into(),
		});
	}
	recs
}

pub fn to_json(recs: &[Recommendation]) -> anyhow::Result<String> {
	Ok(serde_json::to_string(recs)?)
}
