//! Canonical per-round game state.
//!
//! Everything that enters a [`GameState`] goes through `sanitized()`, so the
//! rest of the pipeline can rely on every numeric field being inside its
//! documented range. Values coming from a model are coerced best-effort:
//! garbage degrades to the field minimum, it never aborts the whole state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of shop cards shown at once.
pub const SHOP_SLOTS: usize = 5;
/// Length of [`GameState::to_vector`].
pub const FEATURE_LEN: usize = 6;

pub const ROUND_NUMBER_MAX: u32 = 200;
pub const GOLD_MAX: u32 = 200;
pub const HEALTH_MAX: u32 = 100;
pub const BOARD_LEVEL_MIN: u32 = 1;
pub const BOARD_LEVEL_MAX: u32 = 15;
pub const EXPERIENCE_MAX: u32 = 100;
pub const BOARD_ROWS: u8 = 8;
pub const BOARD_COLS: u8 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	PreGame,
	Early,
	Mid,
	Late,
	#[default]
	Unknown,
}

impl Phase {
	pub fn parse(text: &str) -> Self {
		match text.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
			"pre_game" | "pregame" => Self::PreGame,
			"early" => Self::Early,
			"mid" => Self::Mid,
			"late" => Self::Late,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::PreGame => "pre_game",
			Self::Early => "early",
			Self::Mid => "mid",
			Self::Late => "late",
			Self::Unknown => "unknown",
		}
	}
}

/// A hero card in the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopEntry {
	pub slot_index: u8,
	pub name: String,
	pub cost: u8,
}

impl ShopEntry {
	/// Returns `None` for malformed entries (not an object, or a numeric field
	/// that is present but cannot be read as a number).
	pub fn from_value(value: &Value) -> Option<Self> {
		let obj = value.as_object()?;
		Some(Self {
			slot_index: entry_int(obj, "slot_index", 0, SHOP_SLOTS as i64 - 1, 0)? as u8,
			name: text(obj.get("name")),
			cost: entry_int(obj, "cost", 0, 10, 0)? as u8,
		})
	}

	fn sanitized(mut self) -> Self {
		self.slot_index = self.slot_index.min(SHOP_SLOTS as u8 - 1);
		self.cost = self.cost.min(10);
		self
	}
}

/// A unit placed on the board or bench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
	pub row: u8,
	pub col: u8,
	pub name: String,
	pub star_level: u8,
}

impl Unit {
	pub fn from_value(value: &Value) -> Option<Self> {
		let obj = value.as_object()?;
		Some(Self {
			row: entry_int(obj, "row", 0, BOARD_ROWS as i64 - 1, 0)? as u8,
			col: entry_int(obj, "col", 0, BOARD_COLS as i64 - 1, 0)? as u8,
			name: text(obj.get("name")),
			star_level: entry_int(obj, "star_level", 1, 3, 1)? as u8,
		})
	}

	fn sanitized(mut self) -> Self {
		self.row = self.row.min(BOARD_ROWS - 1);
		self.col = self.col.min(BOARD_COLS - 1);
		self.star_level = self.star_level.clamp(1, 3);
		self
	}
}

/// Snapshot of one round as seen by the local player.
///
/// Immutable by convention once handed downstream; the fusion engine builds
/// new values instead of patching shared ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
	pub phase: Phase,
	/// Tick counter owned by the capture loop, never by a model.
	pub round_number: u32,
	/// In-game label such as `"2-3"`. See [`parse_round_label`].
	pub round_label: String,
	pub gold: u32,
	pub health: u32,
	pub board_level: u32,
	pub experience: u32,
	pub shop_slots: Vec<ShopEntry>,
	pub board_units: Vec<Unit>,
	pub bench_units: Vec<Unit>,
	pub active_synergies: BTreeMap<String, u32>,
	pub potential_synergies: BTreeMap<String, u32>,
	pub commander: String,
	pub emblem: String,
	/// Self-reported reliability of the reading, in `[0, 1]`.
	pub confidence: f32,
	pub shop_open: bool,
}

impl Default for GameState {
	fn default() -> Self {
		Self {
			phase: Phase::Unknown,
			round_number: 0,
			round_label: String::new(),
			gold: 0,
			health: HEALTH_MAX,
			board_level: BOARD_LEVEL_MIN,
			experience: 0,
			shop_slots: Vec::new(),
			board_units: Vec::new(),
			bench_units: Vec::new(),
			active_synergies: BTreeMap::new(),
			potential_synergies: BTreeMap::new(),
			commander: String::new(),
			emblem: String::new(),
			confidence: 0.0,
			shop_open: false,
		}
	}
}

impl GameState {
	/// Clamp every field into its valid range. Idempotent.
	pub fn sanitized(mut self) -> Self {
		self.round_number = self.round_number.min(ROUND_NUMBER_MAX);
		self.round_label = self.round_label.trim().to_string();
		self.gold = self.gold.min(GOLD_MAX);
		self.health = self.health.min(HEALTH_MAX);
		self.board_level = self.board_level.clamp(BOARD_LEVEL_MIN, BOARD_LEVEL_MAX);
		self.experience = self.experience.min(EXPERIENCE_MAX);
		self.confidence = clamp_unit(self.confidence);
		self.shop_slots = std::mem::take(&mut self.shop_slots)
			.into_iter()
			.take(SHOP_SLOTS)
			.map(ShopEntry::sanitized)
			.collect();
		self.board_units = std::mem::take(&mut self.board_units).into_iter().map(Unit::sanitized).collect();
		self.bench_units = std::mem::take(&mut self.bench_units).into_iter().map(Unit::sanitized).collect();
		self
	}

	/// Build a state from a loosely-typed JSON object (model output or a
	/// persisted record). Never fails: a non-object yields the default state.
	pub fn from_value(value: &Value) -> Self {
		let Some(obj) = value.as_object() else {
			return Self::default();
		};

		let defaults = Self::default();
		Self {
			phase: obj.get("phase").and_then(Value::as_str).map(Phase::parse).unwrap_or_default(),
			round_number: clamp_int(obj.get("round_number"), 0, ROUND_NUMBER_MAX as i64, 0) as u32,
			round_label: text(obj.get("round_label")),
			gold: clamp_int(obj.get("gold"), 0, GOLD_MAX as i64, 0) as u32,
			health: clamp_int(obj.get("health"), 0, HEALTH_MAX as i64, defaults.health as i64) as u32,
			board_level: clamp_int(
				obj.get("board_level"),
				BOARD_LEVEL_MIN as i64,
				BOARD_LEVEL_MAX as i64,
				defaults.board_level as i64,
			) as u32,
			experience: clamp_int(obj.get("experience"), 0, EXPERIENCE_MAX as i64, 0) as u32,
			shop_slots: entries(obj.get("shop_slots"), ShopEntry::from_value),
			board_units: entries(obj.get("board_units"), Unit::from_value),
			bench_units: entries(obj.get("bench_units"), Unit::from_value),
			active_synergies: synergies(obj.get("active_synergies")),
			potential_synergies: synergies(obj.get("potential_synergies")),
			commander: text(obj.get("commander")),
			emblem: text(obj.get("emblem")),
			confidence: obj.get("confidence").map(coerce_float).unwrap_or(0.0),
			shop_open: obj.get("shop_open").map(coerce_bool).unwrap_or(false),
		}
		.sanitized()
	}

	/// Flat mapping in field declaration order, suitable for persistence.
	pub fn to_record(&self) -> Map<String, Value> {
		match serde_json::to_value(self) {
			Ok(Value::Object(map)) => map,
			_ => Map::new(),
		}
	}

	/// `(major, minor)` parsed from [`GameState::round_label`].
	pub fn round(&self) -> (u32, u32) {
		parse_round_label(Some(&self.round_label))
	}

	/// Fixed-length feature vector consumed by policies:
	/// `[level/9, min(gold,100)/100, health/100, min(xp,20)/20, major/10, minor/10]`.
	pub fn to_vector(&self) -> [f32; FEATURE_LEN] {
		let (major, minor) = self.round();
		[
			self.board_level as f32 / 9.0,
			self.gold.min(100) as f32 / 100.0,
			self.health as f32 / 100.0,
			self.experience.min(20) as f32 / 20.0,
			major as f32 / 10.0,
			minor as f32 / 10.0,
		]
	}
}

/// Parse a round label such as `"2-3"` into `(2, 3)`.
///
/// Splits on the first `-`; both sides must be integers, otherwise `(0, 0)`.
pub fn parse_round_label(label: Option<&str>) -> (u32, u32) {
	let Some((major, minor)) = label.and_then(|l| l.trim().split_once('-')) else {
		return (0, 0);
	};
	match (major.trim().parse::<u32>(), minor.trim().parse::<u32>()) {
		(Ok(major), Ok(minor)) => (major, minor),
		_ => (0, 0),
	}
}

// ----------

/// Best-effort integer coercion: integers, truncated floats, booleans and
/// numeric strings. Anything else is `None`.
pub fn coerce_int(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n
			.as_i64()
			.or_else(|| n.as_u64().map(|_| i64::MAX))
			.or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
		Value::Bool(b) => Some(*b as i64),
		Value::String(s) => s.trim().parse::<i64>().ok(),
		_ => None,
	}
}

/// Missing (or null) → `default`; present but unreadable → `min`.
pub(crate) fn clamp_int(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
	match value {
		None | Some(Value::Null) => default,
		Some(v) => coerce_int(v).map_or(min, |n| n.clamp(min, max)),
	}
}

pub(crate) fn coerce_float(value: &Value) -> f32 {
	let raw = match value {
		Value::Number(n) => n.as_f64().unwrap_or(0.0),
		Value::Bool(b) => *b as u8 as f64,
		Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
		_ => 0.0,
	};
	clamp_unit(raw as f32)
}

pub fn coerce_bool(value: &Value) -> bool {
	match value {
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
		_ => false,
	}
}

pub(crate) fn text(value: Option<&Value>) -> String {
	match value {
		Some(Value::String(s)) => s.trim().to_string(),
		Some(Value::Number(n)) => n.to_string(),
		Some(Value::Bool(b)) => b.to_string(),
		_ => String::new(),
	}
}

pub(crate) fn entries<T>(value: Option<&Value>, parse: impl Fn(&Value) -> Option<T>) -> Vec<T> {
	value
		.and_then(Value::as_array)
		.map(|items| items.iter().filter_map(parse).collect())
		.unwrap_or_default()
}

pub(crate) fn synergies(value: Option<&Value>) -> BTreeMap<String, u32> {
	let Some(obj) = value.and_then(Value::as_object) else {
		return BTreeMap::new();
	};
	obj.iter()
		.filter_map(|(name, tier)| {
			let tier = coerce_int(tier)?.clamp(0, u32::MAX as i64) as u32;
			Some((name.trim().to_string(), tier))
		})
		.filter(|(name, _)| !name.is_empty())
		.collect()
}

fn entry_int(obj: &Map<String, Value>, key: &str, min: i64, max: i64, default: i64) -> Option<i64> {
	match obj.get(key) {
		None | Some(Value::Null) => Some(default),
		Some(v) => coerce_int(v).map(|n| n.clamp(min, max)),
	}
}

fn clamp_unit(v: f32) -> f32 {
	if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn round_label_parsing_is_total() {
		assert_eq!(parse_round_label(Some("2-3")), (2, 3));
		assert_eq!(parse_round_label(Some(" 4 - 1 ")), (4, 1));
		assert_eq!(parse_round_label(Some("bogus")), (0, 0));
		assert_eq!(parse_round_label(Some("")), (0, 0));
		assert_eq!(parse_round_label(None), (0, 0));
		assert_eq!(parse_round_label(Some("II-3")), (0, 0));
		assert_eq!(parse_round_label(Some("2-3-4")), (0, 0));
		assert_eq!(parse_round_label(Some("-")), (0, 0));
	}

	#[test]
	fn numeric_fields_are_clamped_for_any_input() {
		let inputs = [
			json!(-5),
			json!(1_000_000),
			json!(3.9),
			json!(-0.5),
			json!("42"),
			json!("forty"),
			json!(true),
			json!([1, 2]),
			json!({"x": 1}),
			json!(u64::MAX),
			json!(f64::MAX),
		];
		for raw in inputs {
			let state = GameState::from_value(&json!({
				"round_number": raw,
				"gold": raw,
				"health": raw,
				"board_level": raw,
				"experience": raw,
				"confidence": raw,
			}));
			assert!(state.round_number <= ROUND_NUMBER_MAX, "{raw}");
			assert!(state.gold <= GOLD_MAX, "{raw}");
			assert!(state.health <= HEALTH_MAX, "{raw}");
			assert!((BOARD_LEVEL_MIN..=BOARD_LEVEL_MAX).contains(&state.board_level), "{raw}");
			assert!(state.experience <= EXPERIENCE_MAX, "{raw}");
			assert!((0.0..=1.0).contains(&state.confidence), "{raw}");
		}
	}

	#[test]
	fn garbage_falls_back_to_minimum_and_missing_to_default() {
		let state = GameState::from_value(&json!({"health": "lots", "board_level": null}));
		assert_eq!(state.health, 0);
		assert_eq!(state.board_level, 1);

		let state = GameState::from_value(&json!({}));
		assert_eq!(state, GameState::default());
		assert_eq!(GameState::from_value(&json!("not an object")), GameState::default());
	}

	#[test]
	fn malformed_entries_are_dropped_individually() {
		let state = GameState::from_value(&json!({
			"shop_slots": [
				{"slot_index": 0, "name": "Layla", "cost": 1},
				"garbage",
				{"slot_index": "left", "name": "Bad"},
				{"slot_index": 9, "name": "Clamped", "cost": 99},
				{"slot_index": 2, "name": "Dup", "cost": 2},
				{"slot_index": 2, "name": "Dup2", "cost": 3},
				{"slot_index": 3, "name": "Fifth", "cost": 3},
				{"slot_index": 4, "name": "Sixth", "cost": 4},
			],
			"board_units": [
				{"row": 12, "col": -3, "name": "Tank", "star_level": 7},
				42,
			],
		}));

		let names: Vec<_> = state.shop_slots.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["Layla", "Clamped", "Dup", "Dup2", "Fifth"]);
		assert_eq!(state.shop_slots[1].slot_index, 4);
		assert_eq!(state.shop_slots[1].cost, 10);

		assert_eq!(
			state.board_units,
			vec![Unit { row: 7, col: 0, name: "Tank".into(), star_level: 3 }]
		);
	}

	#[test]
	fn sanitize_is_idempotent() {
		let state = GameState {
			gold: 999,
			health: 300,
			board_level: 0,
			confidence: f32::NAN,
			round_label: "  3-2 ".into(),
			..GameState::default()
		}
		.sanitized();
		assert_eq!(state.clone().sanitized(), state);
		assert_eq!(state.gold, GOLD_MAX);
		assert_eq!(state.board_level, 1);
		assert_eq!(state.confidence, 0.0);
		assert_eq!(state.round(), (3, 2));
	}

	#[test]
	fn record_roundtrips_through_from_value() {
		let mut state = GameState {
			phase: Phase::Mid,
			round_label: "3-1".into(),
			gold: 37,
			health: 64,
			board_level: 6,
			experience: 12,
			commander: "Vale".into(),
			confidence: 0.75,
			shop_open: true,
			..GameState::default()
		};
		state.active_synergies.insert("Mage".into(), 3);
		state.shop_slots.push(ShopEntry { slot_index: 1, name: "Eudora".into(), cost: 2 });

		let record = state.to_record();
		let keys: Vec<_> = record.keys().map(String::as_str).take(4).collect();
		assert_eq!(keys, ["phase", "round_number", "round_label", "gold"]);
		assert_eq!(GameState::from_value(&Value::Object(record)), state);
	}

	#[test]
	fn feature_vector_layout() {
		let state = GameState {
			board_level: 9,
			gold: 150,
			health: 50,
			experience: 40,
			round_label: "2-5".into(),
			..GameState::default()
		};
		let v = state.to_vector();
		assert_eq!(v.len(), FEATURE_LEN);
		assert_eq!(v, [1.0, 1.0, 0.5, 1.0, 0.2, 0.5]);
	}

	#[test]
	fn phase_parse_is_lenient() {
		assert_eq!(Phase::parse("Pre-Game"), Phase::PreGame);
		assert_eq!(Phase::parse(" late "), Phase::Late);
		assert_eq!(Phase::parse("overtime"), Phase::Unknown);
	}
}
