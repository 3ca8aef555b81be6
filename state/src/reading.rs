//! Sparse readings produced by the individual vision sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::{self, Phase, ShopEntry, Unit};
use crate::screen::ScreenState;

/// Where a reading came from.
///
/// Declaration order is ascending trust: later sources overwrite earlier ones
/// for every field they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
	/// Full-frame model read; baseline for everything.
	Scene,
	/// Local HUD classifier.
	Local,
	/// HUD crops, OCR first with a model fallback.
	Hud,
	/// Player list strip; only the local player's health.
	Roster,
}

impl Source {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Scene => "scene",
			Self::Local => "local",
			Self::Hud => "hud",
			Self::Roster => "roster",
		}
	}
}

impl std::fmt::Display for Source {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Confidence of a model answer that carries no score of its own. It never
/// clears the fusion thresholds on its own.
pub const UNSCORED_MODEL_CONFIDENCE: f32 = 0.0;

/// A subset of [`crate::GameState`] fields reported by one source for one tick.
///
/// Numeric fields hold the raw value the source reported; clamping happens
/// when the reading is merged.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialReading {
	pub source: Source,
	/// `None` for sources that do not self-report (OCR). Readers that relay a
	/// model's guess without a score set [`UNSCORED_MODEL_CONFIDENCE`].
	pub confidence: Option<f32>,
	pub phase: Option<Phase>,
	pub round_label: Option<String>,
	pub gold: Option<i64>,
	pub health: Option<i64>,
	pub board_level: Option<i64>,
	pub experience: Option<i64>,
	pub shop_slots: Option<Vec<ShopEntry>>,
	pub board_units: Option<Vec<Unit>>,
	pub bench_units: Option<Vec<Unit>>,
	pub active_synergies: Option<BTreeMap<String, u32>>,
	pub potential_synergies: Option<BTreeMap<String, u32>>,
	pub commander: Option<String>,
	pub emblem: Option<String>,
	pub shop_open: Option<bool>,
}

impl PartialReading {
	/// A reading with every field absent. Failed sources turn into this.
	pub fn absent(source: Source) -> Self {
		Self {
			source,
			confidence: None,
			phase: None,
			round_label: None,
			gold: None,
			health: None,
			board_level: None,
			experience: None,
			shop_slots: None,
			board_units: None,
			bench_units: None,
			active_synergies: None,
			potential_synergies: None,
			commander: None,
			emblem: None,
			shop_open: None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.phase.is_none()
			&& self.round_label.is_none()
			&& self.gold.is_none()
			&& self.health.is_none()
			&& self.board_level.is_none()
			&& self.experience.is_none()
			&& self.shop_slots.is_none()
			&& self.board_units.is_none()
			&& self.bench_units.is_none()
			&& self.active_synergies.is_none()
			&& self.potential_synergies.is_none()
			&& self.commander.is_none()
			&& self.emblem.is_none()
			&& self.shop_open.is_none()
	}

	/// Confidence used for gating: the self-reported value, `1.0` for a
	/// non-empty reading without one (OCR digits), `None` when nothing was read.
	pub fn effective_confidence(&self) -> Option<f32> {
		match self.confidence {
			Some(c) => Some(if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }),
			None if !self.is_empty() => Some(1.0),
			None => None,
		}
	}

	/// Parse a full-scene model answer. Keys that are missing or null stay
	/// absent; everything else is coerced the same way [`crate::GameState`] is.
	pub fn from_scene_value(value: &Value, default_confidence: f32) -> Self {
		let mut reading = Self::absent(Source::Scene);
		let Some(obj) = value.as_object() else {
			return reading;
		};
		let get = |key: &str| obj.get(key).filter(|v| !v.is_null());

		reading.phase = get("phase").and_then(Value::as_str).map(Phase::parse);
		reading.round_label = get("round_label").map(|v| game::text(Some(v))).filter(|l| !l.is_empty());
		reading.gold = get("gold").map(|v| game::coerce_int(v).unwrap_or(0));
		reading.health = get("health").map(|v| game::coerce_int(v).unwrap_or(0));
		reading.board_level = get("board_level").map(|v| game::coerce_int(v).unwrap_or(0));
		reading.experience = get("experience").map(|v| game::coerce_int(v).unwrap_or(0));
		reading.shop_slots = get("shop_slots").map(|v| game::entries(Some(v), ShopEntry::from_value));
		reading.board_units = get("board_units").map(|v| game::entries(Some(v), Unit::from_value));
		reading.bench_units = get("bench_units").map(|v| game::entries(Some(v), Unit::from_value));
		reading.active_synergies = get("active_synergies").map(|v| game::synergies(Some(v)));
		reading.potential_synergies = get("potential_synergies").map(|v| game::synergies(Some(v)));
		reading.commander = get("commander").map(|v| game::text(Some(v)));
		reading.emblem = get("emblem").map(|v| game::text(Some(v)));
		reading.shop_open = get("shop_open").map(game::coerce_bool);
		reading.confidence = Some(get("confidence").map_or(default_confidence, game::coerce_float));
		if reading.is_empty() {
			reading.confidence = None;
		}
		reading
	}

	/// Health of the local player from a roster read, if it was legible.
	pub fn from_screen(screen: &ScreenState) -> Self {
		let mut reading = Self::absent(Source::Roster);
		reading.health = screen.you.hp.map(i64::from);
		if !reading.is_empty() {
			reading.confidence = Some(UNSCORED_MODEL_CONFIDENCE);
		}
		reading
	}
}

/// Resolve a HUD number: OCR digits win whenever OCR produced any, otherwise
/// the model's own guess, otherwise nothing.
pub fn pick_digits(ocr_text: Option<&str>, model_value: Option<i64>) -> Option<i64> {
	let digits: String = ocr_text.unwrap_or_default().chars().filter(|c| c.is_ascii_digit()).collect();
	if digits.is_empty() {
		return model_value;
	}
	Some(digits.parse::<i64>().unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn ocr_digits_take_precedence() {
		assert_eq!(pick_digits(Some("G 37"), Some(12)), Some(37));
		assert_eq!(pick_digits(Some("  "), Some(12)), Some(12));
		assert_eq!(pick_digits(None, Some(12)), Some(12));
		assert_eq!(pick_digits(Some("x"), None), None);
		assert_eq!(pick_digits(Some("99999999999999999999999"), None), Some(i64::MAX));
	}

	#[test]
	fn scene_value_keeps_missing_fields_absent() {
		let reading = PartialReading::from_scene_value(
			&json!({"phase": "mid", "gold": "14", "health": null, "shop_open": true}),
			0.9,
		);
		assert_eq!(reading.source, Source::Scene);
		assert_eq!(reading.phase, Some(Phase::Mid));
		assert_eq!(reading.gold, Some(14));
		assert_eq!(reading.health, None);
		assert_eq!(reading.shop_open, Some(true));
		assert_eq!(reading.confidence, Some(0.9));
	}

	#[test]
	fn empty_scene_value_is_absent() {
		let reading = PartialReading::from_scene_value(&json!({}), 0.9);
		assert!(reading.is_empty());
		assert_eq!(reading.effective_confidence(), None);
	}

	#[test]
	fn roster_health_is_an_unscored_guess() {
		let screen = ScreenState::from_value(&json!({"players": [{"name": "Me", "hp": 33}]}), "Me");
		let reading = PartialReading::from_screen(&screen);
		assert_eq!(reading.health, Some(33));
		assert_eq!(reading.effective_confidence(), Some(UNSCORED_MODEL_CONFIDENCE));

		let nobody = ScreenState::from_value(&json!({"players": []}), "Me");
		assert_eq!(PartialReading::from_screen(&nobody).effective_confidence(), None);
	}

	#[test]
	fn readings_without_confidence_are_trusted_when_present() {
		let mut reading = PartialReading::absent(Source::Hud);
		reading.gold = Some(20);
		assert_eq!(reading.effective_confidence(), Some(1.0));
	}

	#[test]
	fn source_order_is_ascending_trust() {
		assert!(Source::Scene < Source::Local);
		assert!(Source::Local < Source::Hud);
		assert!(Source::Hud < Source::Roster);
	}
}
