mod image;
pub use image::*;
pub mod json;
mod ocr;
pub use ocr::Ocr;
pub mod reader;
pub use reader::{Reader, read_or_absent};
pub mod screen;
pub mod util;
pub mod vlm;

use std::sync::Arc;

use anyhow::bail;
use state::PartialReading;

use vlm::{HttpVlm, Vlm, VlmConfig};

/// The set of readers one tick draws from.
pub struct Ie {
	scene: Box<dyn Reader>,
	hud: Option<Box<dyn Reader>>,
	roster: Option<Box<dyn Reader>>,
}

impl Ie {
	/// Pick readers for the configured backend (`"api"` or `"mock"`).
	///
	/// OCR is optional; without it the HUD reader relies on the model alone.
	pub fn try_new(config: &VlmConfig, ocr: Option<Ocr>, local_name: &str) -> anyhow::Result<Self> {
		match config.backend.trim().to_ascii_lowercase().as_str() {
			"api" => {
				let vlm: Arc<dyn Vlm> = Arc::new(HttpVlm::new(config));
				Ok(Self::from_model(vlm, config, ocr.map(Arc::new), local_name))
			}
			"mock" => Ok(Self::new(Box::new(screen::MockReader), None, None)),
			other => bail!("unknown vision backend {other:?} (expected \"api\" or \"mock\")"),
		}
	}

	pub fn from_model(vlm: Arc<dyn Vlm>, config: &VlmConfig, ocr: Option<Arc<Ocr>>, local_name: &str) -> Self {
		Self::new(
			Box::new(screen::SceneReader::new(vlm.clone(), config.downscale, config.scene_confidence)),
			Some(Box::new(screen::HudReader::new(vlm.clone(), ocr))),
			Some(Box::new(screen::RosterReader::new(vlm, local_name))),
		)
	}

	pub fn new(scene: Box<dyn Reader>, hud: Option<Box<dyn Reader>>, roster: Option<Box<dyn Reader>>) -> Self {
		Self { scene, hud, roster }
	}

	/// Full-frame read. Errors are returned so the caller can skip the tick.
	pub fn read_scene(&self, frame: Image, round_hint: u32) -> anyhow::Result<PartialReading> {
		self.scene.read(frame, round_hint)
	}

	/// HUD read; `None` when no HUD reader is configured.
	pub fn read_hud(&self, frame: Image, round_hint: u32) -> Option<PartialReading> {
		self.hud.as_deref().map(|r| read_or_absent(r, frame, round_hint))
	}

	/// Roster read; `None` when no roster reader is configured.
	pub fn read_roster(&self, frame: Image, round_hint: u32) -> Option<PartialReading> {
		self.roster.as_deref().map(|r| read_or_absent(r, frame, round_hint))
	}
}
