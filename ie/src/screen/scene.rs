//! Full-frame reader: the whole capture goes to the model in one request.

use std::sync::Arc;

use serde_json::Value;
use state::{PartialReading, Source};

use crate::{
	Image,
	json::recover_object,
	reader::Reader,
	util::normalize_round_label,
	vlm::{Prompt, Vlm},
};

const SYSTEM: &str = "You are a strict state extractor for the auto-battler Magic Chess: Go Go. \
Reply with ONLY one JSON object, no prose. If a value is not visible or is covered by the shop, \
use null. Never guess.";

const USER: &str = r#"Return exactly this structure:
{
  "phase": "pre_game" | "early" | "mid" | "late",
  "round_label": "<major>-<minor>" | null,
  "gold": int | null,
  "health": int | null,
  "board_level": int | null,
  "experience": int | null,
  "shop_slots": [{"slot_index": 0-4, "name": string, "cost": int}],
  "board_units": [{"row": int, "col": int, "name": string, "star_level": 1-3}],
  "bench_units": [{"row": 0, "col": int, "name": string, "star_level": 1-3}],
  "active_synergies": {"<synergy>": int},
  "potential_synergies": {"<synergy>": int},
  "commander": string | null,
  "emblem": string | null,
  "shop_open": true | false,
  "confidence": 0.0-1.0
}
health is the local player's green heart (0-100), board_level the number on the blue orb,
gold the large number on the coin."#;

pub struct SceneReader {
	vlm: Arc<dyn Vlm>,
	downscale: f32,
	default_confidence: f32,
}

impl SceneReader {
	pub fn new(vlm: Arc<dyn Vlm>, downscale: f32, default_confidence: f32) -> Self {
		Self {
			vlm,
			downscale,
			default_confidence,
		}
	}
}

impl Reader for SceneReader {
	fn source(&self) -> Source {
		Source::Scene
	}

	fn read(&self, frame: Image, _round_hint: u32) -> anyhow::Result<PartialReading> {
		let small = frame.to_owned_image().downscaled(self.downscale)?;
		let prompt = Prompt::new(Some(SYSTEM), USER).image(small.as_image());
		let raw = self.vlm.ask(&prompt)?;

		let Some(answer) = recover_object(&raw, "scene") else {
			return Ok(PartialReading::absent(Source::Scene));
		};
		let mut reading = PartialReading::from_scene_value(&Value::Object(answer), self.default_confidence);
		reading.round_label = reading.round_label.map(|l| normalize_round_label(&l));
		tracing::debug!(confidence = ?reading.confidence, "scene read");
		Ok(reading)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Color, OwnedImage, screen::testing::Canned};
	use state::Phase;

	#[test]
	fn scene_answer_becomes_reading() {
		let vlm = Canned::new(["```json\n{\"phase\": \"mid\", \"round_label\": \"III-2\", \"gold\": 17, \"health\": null}\n```"]);
		let reader = SceneReader::new(vlm.clone(), 0.5, 0.9);
		let frame = OwnedImage::filled(64, 36, Color::BLACK);

		let reading = reader.read(frame.as_image(), 4).unwrap();
		assert_eq!(reading.phase, Some(Phase::Mid));
		assert_eq!(reading.round_label.as_deref(), Some("3-2"));
		assert_eq!(reading.gold, Some(17));
		assert_eq!(reading.health, None);
		assert_eq!(reading.confidence, Some(0.9));
		assert_eq!(vlm.image_sizes(), [vec![(32, 18)]]);
	}

	#[test]
	fn garbage_answer_is_an_empty_reading() {
		let reader = SceneReader::new(Canned::new(["I cannot see the game."]), 1.0, 0.9);
		let frame = OwnedImage::filled(8, 8, Color::BLACK);
		assert!(reader.read(frame.as_image(), 1).unwrap().is_empty());
	}

	#[test]
	fn transport_errors_propagate() {
		let reader = SceneReader::new(Canned::new::<0>([]), 1.0, 0.9);
		let frame = OwnedImage::filled(8, 8, Color::BLACK);
		assert!(reader.read(frame.as_image(), 1).is_err());
	}
}
