//! Fusion and temporal smoothing.
//!
//! One tick goes through two pure steps:
//!
//! 1. [`merge`] layers the tick's partial readings over the previous fused
//!    state, in ascending [`Source`] trust order. A layer only overwrites the
//!    fields it actually reported.
//! 2. [`smooth`] compares the merged candidate against the previous fused
//!    state and drops, backfills or reverts implausible values.
//!
//! [`FusionEngine`] owns the previous fused state and chains the two.

use serde::{Deserialize, Serialize};

use crate::game::{GameState, ROUND_NUMBER_MAX};
use crate::reading::{PartialReading, Source};

/// Smoothing thresholds. Hand-tuned, hence configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
	/// Candidates below this confidence are discarded outright.
	pub drop_below: f32,
	/// Large jumps are only accepted at or above this confidence.
	pub trust_above: f32,
	pub max_health_jump: u32,
	pub max_gold_jump: u32,
}

impl Default for FusionConfig {
	fn default() -> Self {
		Self {
			drop_below: 0.2,
			trust_above: 0.6,
			max_health_jump: 30,
			max_gold_jump: 80,
		}
	}
}

/// Raw HUD values as reported by the merged layers, before clamping.
///
/// `None` means no layer reported the field this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reported {
	pub health: Option<i64>,
	pub gold: Option<i64>,
	pub board_level: Option<i64>,
}

/// Output of [`merge`]: a sanitized state plus what was actually reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub state: GameState,
	pub reported: Reported,
}

impl Candidate {
	/// Treat a complete state as if every HUD field had been reported.
	pub fn from_state(state: GameState) -> Self {
		let reported = Reported {
			health: Some(state.health as i64),
			gold: Some(state.gold as i64),
			board_level: Some(state.board_level as i64),
		};
		Self { state, reported }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
	/// First usable tick; becomes the smoothing baseline as-is.
	Seeded,
	Accepted,
	/// Candidate discarded, previous state returned unchanged.
	Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
	Health,
	Gold,
	BoardLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
	/// Shop overlay hid the value; previous value carried over.
	Backfilled { field: Field, from: u32, to: u32 },
	/// Jump too large for the candidate's confidence.
	Reverted { field: Field, from: u32, to: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
	pub state: GameState,
	pub verdict: Verdict,
	pub corrections: Vec<Correction>,
}

/// Layer `readings` over `base` in ascending trust order.
///
/// Fields no reading reports keep `base`'s value. Confidence is the scene
/// reading's when there is one, otherwise the lowest confidence among the
/// other non-empty readings, otherwise zero.
pub fn merge(base: &GameState, round_number: u32, readings: &[PartialReading]) -> Candidate {
	let mut ordered: Vec<&PartialReading> = readings.iter().filter(|r| !r.is_empty()).collect();
	ordered.sort_by_key(|r| r.source);

	let mut state = base.clone();
	let mut reported = Reported::default();

	for r in &ordered {
		if let Some(phase) = r.phase {
			state.phase = phase;
		}
		if let Some(label) = &r.round_label {
			state.round_label = label.clone();
		}
		if let Some(gold) = r.gold {
			state.gold = to_u32(gold);
			reported.gold = Some(gold);
		}
		if let Some(health) = r.health {
			state.health = to_u32(health);
			reported.health = Some(health);
		}
		if let Some(level) = r.board_level {
			state.board_level = to_u32(level);
			reported.board_level = Some(level);
		}
		if let Some(xp) = r.experience {
			state.experience = to_u32(xp);
		}
		if let Some(shop) = &r.shop_slots {
			state.shop_slots = shop.clone();
		}
		if let Some(units) = &r.board_units {
			state.board_units = units.clone();
		}
		if let Some(units) = &r.bench_units {
			state.bench_units = units.clone();
		}
		if let Some(syn) = &r.active_synergies {
			state.active_synergies = syn.clone();
		}
		if let Some(syn) = &r.potential_synergies {
			state.potential_synergies = syn.clone();
		}
		if let Some(commander) = &r.commander {
			state.commander = commander.clone();
		}
		if let Some(emblem) = &r.emblem {
			state.emblem = emblem.clone();
		}
		if let Some(open) = r.shop_open {
			state.shop_open = open;
		}
	}

	let scene = ordered.iter().find(|r| r.source == Source::Scene);
	state.confidence = match scene {
		Some(r) => r.effective_confidence().unwrap_or(0.0),
		None => ordered
			.iter()
			.filter_map(|r| r.effective_confidence())
			.reduce(f32::min)
			.unwrap_or(0.0),
	};
	state.round_number = round_number.min(ROUND_NUMBER_MAX).max(base.round_number);

	Candidate {
		state: state.sanitized(),
		reported,
	}
}

/// Compare `candidate` against the previous fused state.
pub fn smooth(previous: &GameState, candidate: Candidate, config: &FusionConfig) -> Fused {
	let Candidate { mut state, reported } = candidate;

	if state.confidence < config.drop_below {
		return Fused {
			state: previous.clone(),
			verdict: Verdict::Dropped,
			corrections: Vec::new(),
		};
	}

	let mut corrections = Vec::new();

	if state.shop_open {
		let occluded = |raw: Option<i64>, value: u32| raw.is_none_or(|v| v <= 0) || value == 0;
		if occluded(reported.health, state.health) {
			backfill(&mut state.health, previous.health, Field::Health, &mut corrections);
		}
		if occluded(reported.board_level, state.board_level) {
			backfill(&mut state.board_level, previous.board_level, Field::BoardLevel, &mut corrections);
		}
		if occluded(reported.gold, state.gold) {
			backfill(&mut state.gold, previous.gold, Field::Gold, &mut corrections);
		}
	}

	let trusted = state.confidence >= config.trust_above;
	if !trusted && state.health.abs_diff(previous.health) > config.max_health_jump {
		corrections.push(Correction::Reverted {
			field: Field::Health,
			from: state.health,
			to: previous.health,
		});
		state.health = previous.health;
	}
	if !trusted && state.gold.abs_diff(previous.gold) > config.max_gold_jump {
		corrections.push(Correction::Reverted {
			field: Field::Gold,
			from: state.gold,
			to: previous.gold,
		});
		state.gold = previous.gold;
	}

	Fused {
		state,
		verdict: Verdict::Accepted,
		corrections,
	}
}

fn backfill(value: &mut u32, previous: u32, field: Field, corrections: &mut Vec<Correction>) {
	if *value != previous {
		corrections.push(Correction::Backfilled {
			field,
			from: *value,
			to: previous,
		});
		*value = previous;
	}
}

fn to_u32(v: i64) -> u32 {
	v.clamp(0, u32::MAX as i64) as u32
}

/// Owns the smoothing baseline across ticks.
#[derive(Debug, Clone)]
pub struct FusionEngine {
	config: FusionConfig,
	previous: GameState,
	seeded: bool,
}

impl FusionEngine {
	pub fn new(config: FusionConfig) -> Self {
		Self {
			config,
			previous: GameState::default(),
			seeded: false,
		}
	}

	pub fn config(&self) -> &FusionConfig {
		&self.config
	}

	/// Last fused state (the default state before the first usable tick).
	pub fn previous(&self) -> &GameState {
		&self.previous
	}

	/// Fuse one tick. Never fails: with nothing usable it returns the previous
	/// fused state, or the default state before the first usable tick.
	pub fn fuse(&mut self, round_number: u32, readings: &[PartialReading]) -> Fused {
		if !self.seeded {
			if readings.iter().all(PartialReading::is_empty) {
				return Fused {
					state: self.previous.clone(),
					verdict: Verdict::Dropped,
					corrections: Vec::new(),
				};
			}
			let candidate = merge(&self.previous, round_number, readings);
			self.previous = candidate.state.clone();
			self.seeded = true;
			tracing::debug!(round_number, confidence = candidate.state.confidence, "fusion seeded");
			return Fused {
				state: candidate.state,
				verdict: Verdict::Seeded,
				corrections: Vec::new(),
			};
		}

		let candidate = merge(&self.previous, round_number, readings);
		let fused = smooth(&self.previous, candidate, &self.config);

		match fused.verdict {
			Verdict::Dropped => {
				tracing::debug!(round_number, "low-confidence candidate dropped");
			}
			_ => {
				for c in &fused.corrections {
					tracing::debug!(round_number, correction = ?c, "smoothing correction");
				}
				self.previous = fused.state.clone();
			}
		}
		fused
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::game::Phase;
	use crate::reading::{UNSCORED_MODEL_CONFIDENCE, pick_digits};

	fn prev() -> GameState {
		GameState {
			phase: Phase::Mid,
			round_number: 7,
			round_label: "2-3".into(),
			gold: 40,
			health: 80,
			board_level: 5,
			confidence: 1.0,
			..GameState::default()
		}
	}

	fn candidate(edit: impl FnOnce(&mut GameState)) -> Candidate {
		let mut s = prev();
		edit(&mut s);
		Candidate::from_state(s)
	}

	#[test]
	fn identical_candidate_is_a_fixed_point() {
		let p = prev();
		let fused = smooth(&p, Candidate::from_state(p.clone()), &FusionConfig::default());
		assert_eq!(fused.state, p);
		assert_eq!(fused.verdict, Verdict::Accepted);
		assert!(fused.corrections.is_empty());
	}

	#[test]
	fn low_confidence_candidate_returns_previous_exactly() {
		let p = prev();
		let c = candidate(|s| {
			s.confidence = 0.1;
			s.gold = 3;
			s.health = 1;
			s.phase = Phase::Late;
			s.commander = "Someone".into();
		});
		let fused = smooth(&p, c, &FusionConfig::default());
		assert_eq!(fused.state, p);
		assert_eq!(fused.verdict, Verdict::Dropped);
	}

	#[test]
	fn large_health_swing_needs_confidence() {
		let p = prev();
		let fused = smooth(&p, candidate(|s| {
			s.health = 10;
			s.confidence = 0.3;
		}), &FusionConfig::default());
		assert_eq!(fused.state.health, 80);
		assert_eq!(
			fused.corrections,
			[Correction::Reverted { field: Field::Health, from: 10, to: 80 }]
		);

		let fused = smooth(&p, candidate(|s| {
			s.health = 10;
			s.confidence = 0.9;
		}), &FusionConfig::default());
		assert_eq!(fused.state.health, 10);
	}

	#[test]
	fn large_gold_swing_needs_confidence() {
		let p = prev();
		let fused = smooth(&p, candidate(|s| {
			s.gold = 130;
			s.confidence = 0.5;
		}), &FusionConfig::default());
		assert_eq!(fused.state.gold, 40);

		let fused = smooth(&p, candidate(|s| {
			s.gold = 120;
			s.confidence = 0.5;
		}), &FusionConfig::default());
		assert_eq!(fused.state.gold, 120, "a jump of exactly the threshold is allowed");
	}

	#[test]
	fn open_shop_backfills_zeroed_hud() {
		let p = prev();
		let fused = smooth(&p, candidate(|s| {
			s.shop_open = true;
			s.gold = 0;
		}), &FusionConfig::default());
		assert_eq!(fused.state.gold, 40);
		assert_eq!(
			fused.corrections,
			[Correction::Backfilled { field: Field::Gold, from: 0, to: 40 }]
		);
	}

	#[test]
	fn open_shop_backfills_unreported_and_zero_level() {
		let p = prev();
		let mut c = candidate(|s| {
			s.shop_open = true;
			s.health = 55;
			s.board_level = 1;
		});
		c.reported.health = None;
		c.reported.board_level = Some(0);
		let fused = smooth(&p, c, &FusionConfig::default());
		assert_eq!(fused.state.health, 80);
		assert_eq!(fused.state.board_level, 5);
	}

	#[test]
	fn merge_follows_precedence() {
		let mut scene = PartialReading::absent(Source::Scene);
		scene.confidence = Some(0.7);
		scene.phase = Some(Phase::Late);
		scene.gold = Some(11);
		scene.health = Some(90);
		scene.board_level = Some(4);
		scene.round_label = Some("3-1".into());
		scene.commander = Some("Vale".into());

		let mut hud = PartialReading::absent(Source::Hud);
		hud.gold = Some(23);
		hud.board_level = Some(6);
		hud.shop_open = Some(false);

		let mut roster = PartialReading::absent(Source::Roster);
		roster.health = Some(61);

		// Input order must not matter.
		let c = merge(&GameState::default(), 9, &[roster, hud, scene]);
		assert_eq!(c.state.health, 61);
		assert_eq!(c.state.gold, 23);
		assert_eq!(c.state.board_level, 6);
		assert_eq!(c.state.round_label, "3-1");
		assert_eq!(c.state.phase, Phase::Late);
		assert_eq!(c.state.commander, "Vale");
		assert_eq!(c.state.confidence, 0.7);
		assert_eq!(c.state.round_number, 9);
		assert_eq!(c.reported.health, Some(61));
	}

	#[test]
	fn merge_keeps_unreported_fields_from_base() {
		let base = prev();
		let mut hud = PartialReading::absent(Source::Hud);
		hud.gold = Some(300);
		let c = merge(&base, 8, &[hud]);
		assert_eq!(c.state.gold, 200, "clamped after merge");
		assert_eq!(c.reported.gold, Some(300));
		assert_eq!(c.state.health, base.health);
		assert_eq!(c.reported.health, None);
		assert_eq!(c.state.confidence, 1.0);
	}

	#[test]
	fn engine_seeds_then_smooths() {
		let mut engine = FusionEngine::new(FusionConfig::default());

		let fused = engine.fuse(1, &[PartialReading::absent(Source::Scene)]);
		assert_eq!(fused.verdict, Verdict::Dropped);
		assert_eq!(fused.state, GameState::default());

		let mut scene = PartialReading::absent(Source::Scene);
		scene.confidence = Some(0.9);
		scene.health = Some(100);
		scene.gold = Some(10);
		let fused = engine.fuse(2, &[scene.clone()]);
		assert_eq!(fused.verdict, Verdict::Seeded);
		assert_eq!(fused.state.round_number, 2);

		// Misread at low confidence: health reverted, baseline advances.
		scene.confidence = Some(0.4);
		scene.health = Some(20);
		let fused = engine.fuse(3, &[scene.clone()]);
		assert_eq!(fused.verdict, Verdict::Accepted);
		assert_eq!(fused.state.health, 100);
		assert_eq!(engine.previous().round_number, 3);

		// Garbage frame: baseline untouched.
		scene.confidence = Some(0.05);
		let fused = engine.fuse(4, &[scene]);
		assert_eq!(fused.verdict, Verdict::Dropped);
		assert_eq!(&fused.state, engine.previous());
		assert_eq!(engine.previous().round_number, 3);
	}

	#[test]
	fn model_guess_without_scene_cannot_jump() {
		let mut engine = FusionEngine::new(FusionConfig::default());
		let mut scene = PartialReading::absent(Source::Scene);
		scene.confidence = Some(0.9);
		scene.gold = Some(40);
		engine.fuse(1, &[scene.clone()]);

		let mut guessed = PartialReading::absent(Source::Hud);
		guessed.gold = pick_digits(None, Some(150));
		guessed.confidence = Some(UNSCORED_MODEL_CONFIDENCE);

		scene.confidence = Some(0.5);
		let fused = engine.fuse(2, &[scene, guessed.clone()]);
		assert_eq!(fused.state.gold, 40);
		assert_eq!(fused.state.confidence, 0.5);

		let fused = engine.fuse(3, &[PartialReading::absent(Source::Scene), guessed]);
		assert_eq!(fused.verdict, Verdict::Dropped);
		assert_eq!(fused.state.gold, 40);
		assert_eq!(engine.previous().gold, 40);
	}

	#[test]
	fn ocr_digits_keep_full_trust_unless_a_guess_joins() {
		let base = prev();
		let mut ocr = PartialReading::absent(Source::Hud);
		ocr.gold = pick_digits(Some("150"), None);
		let c = merge(&base, 8, &[PartialReading::absent(Source::Scene), ocr.clone()]);
		assert_eq!(c.state.confidence, 1.0);

		let mut roster = PartialReading::absent(Source::Roster);
		roster.health = Some(5);
		roster.confidence = Some(UNSCORED_MODEL_CONFIDENCE);
		let c = merge(&base, 8, &[ocr, roster]);
		assert_eq!(c.state.confidence, 0.0);
	}

	#[test]
	fn engine_without_readings_returns_previous() {
		let mut engine = FusionEngine::new(FusionConfig::default());
		let mut hud = PartialReading::absent(Source::Hud);
		hud.gold = Some(12);
		engine.fuse(1, &[hud]);
		let before = engine.previous().clone();
		let fused = engine.fuse(2, &[]);
		assert_eq!(fused.verdict, Verdict::Dropped);
		assert_eq!(fused.state, before);
	}
}
