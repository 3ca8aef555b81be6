//! Right-hand player list. Only the local player's health is reported.

use std::sync::Arc;

use serde_json::Value;
use state::{PartialReading, ScreenState, Source};

use crate::{
	Image,
	json::recover_object,
	reader::Reader,
	util::PLAYERS_STRIP,
	vlm::{Prompt, Vlm},
};

const SYSTEM: &str = "You are a precise OCR for the right-hand HUD of Magic Chess: Go Go. \
The image only contains the vertical column of player portraits with green health bars and numbers 0-100. \
Read every visible row (up to 8). For each row: \"name\" is the text next to the portrait, \
\"hp\" the number on the green heart (null if unclear). \
If the column is not visible, return \"players\": []. Never invent names.";

const USER: &str = r#"Read the player list and return ONLY:
{"players": [{"name": "...", "hp": ...}]}"#;

pub struct RosterReader {
	vlm: Arc<dyn Vlm>,
	local_name: String,
}

impl RosterReader {
	pub fn new(vlm: Arc<dyn Vlm>, local_name: impl Into<String>) -> Self {
		Self {
			vlm,
			local_name: local_name.into(),
		}
	}

	/// Full screen state as far as the player strip shows it.
	pub fn screen(&self, frame: Image) -> anyhow::Result<ScreenState> {
		let prompt = Prompt::new(Some(SYSTEM), USER).image(frame.crop(PLAYERS_STRIP));
		let raw = self.vlm.ask(&prompt)?;
		let answer = recover_object(&raw, "roster").unwrap_or_default();
		Ok(ScreenState::from_value(&Value::Object(answer), &self.local_name))
	}
}

impl Reader for RosterReader {
	fn source(&self) -> Source {
		Source::Roster
	}

	fn read(&self, frame: Image, _round_hint: u32) -> anyhow::Result<PartialReading> {
		let screen = self.screen(frame)?;
		if screen.you.hp.is_none() {
			tracing::debug!(
				local = %self.local_name,
				rows = screen.others.len(),
				"local player not found in roster"
			);
		}
		Ok(PartialReading::from_screen(&screen))
	}
}
