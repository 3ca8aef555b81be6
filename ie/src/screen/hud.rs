//! HUD crops: round, level, gold and the shop band.
//!
//! The model sees all four crops in one request. Level and gold are also run
//! through OCR, which wins whenever it produced any digits.

use std::sync::Arc;

use serde_json::{Map, Value};
use state::{PartialReading, Source, UNSCORED_MODEL_CONFIDENCE, game, pick_digits};

use crate::{
	Image, Ocr,
	json::recover_object,
	reader::Reader,
	util::{GOLD_BOX, LEVEL_BOX, ROUND_BOX, SHOP_BOX, normalize_round_label},
	vlm::{Prompt, Vlm},
};

const PROMPT: &str = "You receive 4 images: round_box, level_box, gold_box, shop_box. \
Return ONLY a valid JSON object with the keys \
{\"round_label\": string|null, \"board_level\": int|null, \"gold\": int|null, \"shop_open\": true|false}. \
round_label is the text like 1-2 or I-2; board_level is the white number on the blue orb; \
gold is the large number on the yellow coin; shop_open is true when the shop with 5 cards and gold buttons is visible.";

pub struct HudReader {
	vlm: Arc<dyn Vlm>,
	ocr: Option<Arc<Ocr>>,
}

impl HudReader {
	pub fn new(vlm: Arc<dyn Vlm>, ocr: Option<Arc<Ocr>>) -> Self {
		Self { vlm, ocr }
	}

	fn ask(&self, frame: Image) -> anyhow::Result<Map<String, Value>> {
		let mut prompt = Prompt::new(None, PROMPT);
		for (name, area) in [
			("round_box", ROUND_BOX),
			("level_box", LEVEL_BOX),
			("gold_box", GOLD_BOX),
			("shop_box", SHOP_BOX),
		] {
			prompt = prompt.text(format!("Image: {name}")).image(frame.crop(area));
		}
		let raw = self.vlm.ask(&prompt)?;
		Ok(recover_object(&raw, "hud").unwrap_or_default())
	}
}

impl Reader for HudReader {
	fn source(&self) -> Source {
		Source::Hud
	}

	fn read(&self, frame: Image, _round_hint: u32) -> anyhow::Result<PartialReading> {
		let answer = match self.ask(frame) {
			Ok(answer) => answer,
			// OCR alone still yields gold and level.
			Err(err) if self.ocr.is_some() => {
				tracing::warn!(error = format!("{err:#}"), "hud model request failed; using OCR only");
				Map::new()
			}
			Err(err) => return Err(err),
		};

		let ocr_gold = self.ocr.as_deref().map(|ocr| frame.crop(GOLD_BOX).get_digits(ocr));
		let ocr_level = self.ocr.as_deref().map(|ocr| frame.crop(LEVEL_BOX).get_digits(ocr));
		let model_int = |key: &str| answer.get(key).and_then(game::coerce_int);

		let mut reading = PartialReading::absent(Source::Hud);
		reading.gold = pick_digits(ocr_gold.as_deref(), model_int("gold"));
		reading.board_level = pick_digits(ocr_level.as_deref(), model_int("board_level"));
		reading.round_label = answer
			.get("round_label")
			.and_then(Value::as_str)
			.map(normalize_round_label)
			.filter(|l| !l.is_empty());
		reading.shop_open = answer.get("shop_open").filter(|v| !v.is_null()).map(game::coerce_bool);
		reading.confidence = hud_confidence(&reading, has_digits(ocr_gold.as_deref()), has_digits(ocr_level.as_deref()));

		tracing::debug!(
			gold = ?reading.gold,
			board_level = ?reading.board_level,
			ocr_gold = ?ocr_gold,
			ocr_level = ?ocr_level,
			"hud read"
		);
		Ok(reading)
	}
}

fn has_digits(text: Option<&str>) -> bool {
	text.is_some_and(|t| t.chars().any(|c| c.is_ascii_digit()))
}

/// OCR digits need no score. As soon as a number is the model's own guess, or
/// OCR read nothing, the reading is unscored.
fn hud_confidence(reading: &PartialReading, gold_by_ocr: bool, level_by_ocr: bool) -> Option<f32> {
	if reading.is_empty() {
		return None;
	}
	let guessed = (reading.gold.is_some() && !gold_by_ocr) || (reading.board_level.is_some() && !level_by_ocr);
	if guessed || !(gold_by_ocr || level_by_ocr) {
		Some(UNSCORED_MODEL_CONFIDENCE)
	} else {
		None
	}
}
