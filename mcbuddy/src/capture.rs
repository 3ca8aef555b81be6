use std::path::Path;

use anyhow::Result;
use xcap::image::EncodableLayout;

/// Something that yields one frame per tick.
pub trait FrameSource {
	/// `None` when no frame is available right now (window closed, minimized...).
	fn grab(&mut self) -> Option<ie::OwnedImage>;
}

pub fn find_window(app_name: &str) -> Option<xcap::Window> {
	let windows = xcap::Window::all().ok()?;
	windows
		.into_iter()
		.find(|window| window.app_name().ok().as_deref() == Some(app_name))
}

pub fn capture_specific(app_name: &str) -> Option<ie::OwnedImage> {
	let window = find_window(app_name)?;
	if window.is_minimized().unwrap_or(false) {
		return None;
	}
	let img = window.capture_image().ok()?;
	Some(ie::OwnedImage::from_rgba(img.width() as usize, img.as_bytes()))
}

/// `(app_name, title)` of every capturable window.
pub fn list_windows() -> Result<Vec<(String, String)>> {
	let windows = xcap::Window::all()?;
	Ok(windows
		.into_iter()
		.filter_map(|w| Some((w.app_name().ok()?, w.title().unwrap_or_default())))
		.collect())
}

/// Captures the configured game window.
pub struct WindowCapture {
	app_name: String,
	max_height: Option<u32>,
}

impl WindowCapture {
	pub fn new(app_name: impl Into<String>, max_height: Option<u32>) -> Self {
		Self {
			app_name: app_name.into(),
			max_height,
		}
	}
}

impl FrameSource for WindowCapture {
	fn grab(&mut self) -> Option<ie::OwnedImage> {
		let frame = capture_specific(&self.app_name)?;
		match self.max_height {
			Some(max) => match frame.capped_h(max) {
				Ok(frame) => Some(frame),
				Err(err) => {
					tracing::warn!(error = %err, "failed to downscale capture");
					None
				}
			},
			None => Some(frame),
		}
	}
}

/// Replays a single screenshot on every tick.
pub struct StillFrame {
	frame: ie::OwnedImage,
}

impl StillFrame {
	pub fn open(path: &Path) -> Result<Self> {
		Ok(Self {
			frame: ie::OwnedImage::open(path)?,
		})
	}
}

impl FrameSource for StillFrame {
	fn grab(&mut self) -> Option<ie::OwnedImage> {
		Some(self.frame.clone())
	}
}
