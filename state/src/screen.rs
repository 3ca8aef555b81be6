//! Screen classification and the player roster.
//!
//! A `ScreenState` is rebuilt from scratch on every analysis call; nothing here
//! is carried across ticks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::{self, HEALTH_MAX};

/// Max edit distance when matching the configured local name against OCR'd rows.
const NAME_MATCH_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
	OwnBoard,
	EnemyBoard,
	ShopOpen,
	Carousel,
	LobbyOrMenu,
	#[default]
	Other,
}

impl ScreenType {
	pub fn parse(text: &str) -> Self {
		match text.trim().to_ascii_lowercase().as_str() {
			"own_board" => Self::OwnBoard,
			"enemy_board" => Self::EnemyBoard,
			"shop_open" => Self::ShopOpen,
			"carousel" => Self::Carousel,
			"lobby_or_menu" => Self::LobbyOrMenu,
			_ => Self::Other,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStatus {
	pub name: String,
	pub hp: Option<u32>,
	pub gold: Option<u32>,
	pub level: Option<u32>,
	pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenState {
	pub screen_type: ScreenType,
	pub round_label: Option<String>,
	pub you: PlayerStatus,
	pub others: Vec<PlayerStatus>,
}

impl ScreenState {
	/// Build from the combined screen + roster answer:
	///
	/// ```json
	/// {"screen_type": "...", "round_label": "2-1",
	///  "own": {"gold": 12, "level": "Lv.5"},
	///  "players": [{"name": "...", "hp": 80}]}
	/// ```
	pub fn from_value(data: &Value, local_name: &str) -> Self {
		let screen_type = data
			.get("screen_type")
			.and_then(Value::as_str)
			.map(ScreenType::parse)
			.unwrap_or_default();
		let round_label = data
			.get("round_label")
			.map(|v| game::text(Some(v)))
			.filter(|l| !l.is_empty());

		let mut players: Vec<PlayerStatus> = data
			.get("players")
			.and_then(Value::as_array)
			.map(|rows| rows.iter().filter_map(parse_player).collect())
			.unwrap_or_default();

		let mut you = match find_local(&players, local_name) {
			Some(i) => players.remove(i),
			None => PlayerStatus::default(),
		};
		you.name = local_name.to_string();
		you.is_local = true;

		if let Some(own) = data.get("own").and_then(Value::as_object) {
			if let Some(gold) = own.get("gold").and_then(game::coerce_int) {
				you.gold = Some(gold.clamp(0, game::GOLD_MAX as i64) as u32);
			}
			you.level = match own.get("level") {
				Some(Value::String(s)) => {
					let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
					digits.parse().ok()
				}
				Some(v) => game::coerce_int(v).map(|n| n.clamp(0, u32::MAX as i64) as u32),
				None => None,
			};
		}

		Self {
			screen_type,
			round_label,
			you,
			others: players,
		}
	}
}

fn parse_player(row: &Value) -> Option<PlayerStatus> {
	let name = game::text(row.get("name"));
	if !is_plausible_name(&name) {
		return None;
	}
	let hp = match row.get("hp") {
		Some(Value::Number(n)) => n
			.as_f64()
			.filter(|hp| (0.0..=HEALTH_MAX as f64).contains(hp))
			.map(|hp| hp as u32),
		_ => None,
	};
	Some(PlayerStatus {
		name,
		hp,
		..PlayerStatus::default()
	})
}

/// Rejects empty rows and level badges (`"Nv.4"`, `"Lv.4"`) read as names.
fn is_plausible_name(name: &str) -> bool {
	let lower = name.to_lowercase();
	name.chars().count() >= 2 && !lower.starts_with("nv.") && !lower.starts_with("lv.")
}

fn find_local(players: &[PlayerStatus], local_name: &str) -> Option<usize> {
	if let Some(i) = players.iter().position(|p| p.name == local_name) {
		return Some(i);
	}

	let wanted = local_name.to_lowercase();
	players
		.iter()
		.enumerate()
		.map(|(i, p)| (i, levenshtein::levenshtein(&p.name.to_lowercase(), &wanted)))
		.filter(|(_, dist)| *dist <= NAME_MATCH_THRESHOLD)
		.min_by_key(|(_, dist)| *dist)
		.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn local_player_found_by_fuzzy_name() {
		let screen = ScreenState::from_value(
			&json!({
				"screen_type": "own_board",
				"round_label": "2-4",
				"own": {"gold": 31, "level": "Lv.6"},
				"players": [
					{"name": "Nv.4", "hp": 90},
					{"name": "Rival", "hp": 77},
					{"name": "C0devaMP", "hp": 58},
					{"name": "x", "hp": 12},
					{"name": "Ghost", "hp": 250},
				],
			}),
			"CodevaMP",
		);

		assert_eq!(screen.screen_type, ScreenType::OwnBoard);
		assert_eq!(screen.round_label.as_deref(), Some("2-4"));
		assert_eq!(screen.you.name, "CodevaMP");
		assert!(screen.you.is_local);
		assert_eq!(screen.you.hp, Some(58));
		assert_eq!(screen.you.gold, Some(31));
		assert_eq!(screen.you.level, Some(6));

		let others: Vec<_> = screen.others.iter().map(|p| (p.name.as_str(), p.hp)).collect();
		assert_eq!(others, [("Rival", Some(77)), ("Ghost", None)]);
	}

	#[test]
	fn missing_local_player_has_no_health() {
		let screen = ScreenState::from_value(&json!({"players": [{"name": "Someone", "hp": 40}]}), "Me");
		assert_eq!(screen.screen_type, ScreenType::Other);
		assert_eq!(screen.you.hp, None);
		assert_eq!(screen.others.len(), 1);
	}
}
