use std::sync::LazyLock;

use regex::Regex;

/// Round labels as drawn on the HUD: `2-3`, `II-3`, `2 – 3`.
static ROUND_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^\s*(?<major>\d+|[ivx]+)\s*[-–—]\s*(?<minor>\d+)\s*$").unwrap()
});

/// Axis-aligned box in fractions of the frame: `(left, top, right, bottom)`.
///
/// Boxes are resolution independent; the reference layout is a 16:9 capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormBox {
	pub left: f32,
	pub top: f32,
	pub right: f32,
	pub bottom: f32,
}

impl NormBox {
	pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
		Self { left, top, right, bottom }
	}

	/// `(x, y, width, height)` in pixels, clamped to the frame.
	pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
		let px = |f: f32, size: u32| ((f.clamp(0.0, 1.0) * size as f32).round() as u32).min(size);
		let x1 = px(self.left, width);
		let y1 = px(self.top, height);
		let x2 = px(self.right, width).max(x1);
		let y2 = px(self.bottom, height).max(y1);
		(x1, y1, x2 - x1, y2 - y1)
	}
}

/// Round indicator, left of the round timer.
pub const ROUND_BOX: NormBox = NormBox::new(0.32, 0.01, 0.36, 0.04);
/// Board level orb, bottom left.
pub const LEVEL_BOX: NormBox = NormBox::new(0.01, 0.86, 0.07, 0.91);
/// Gold coin counter, bottom right.
pub const GOLD_BOX: NormBox = NormBox::new(0.90, 0.83, 0.99, 0.90);
/// Band the shop cards occupy when the shop is open.
pub const SHOP_BOX: NormBox = NormBox::new(0.03, 0.15, 0.97, 0.60);
/// Player list with portraits and health, right edge.
pub const PLAYERS_STRIP: NormBox = NormBox::new(0.72, 0.04, 1.0, 0.96);

/// Normalize a round label to `<major>-<minor>` with arabic numerals.
///
/// Returns the trimmed input unchanged when it does not look like a round label,
/// so the state model still sees what the source produced.
pub fn normalize_round_label(label: &str) -> String {
	let Some(caps) = ROUND_LABEL_REGEX.captures(label) else {
		return label.trim().to_string();
	};
	let major = &caps["major"];
	let major = match major.parse::<u32>() {
		Ok(n) => Some(n),
		Err(_) => roman(major),
	};
	match major {
		Some(major) => format!("{major}-{}", &caps["minor"]),
		None => label.trim().to_string(),
	}
}

fn roman(text: &str) -> Option<u32> {
	let value = |c: char| match c.to_ascii_uppercase() {
		'I' => Some(1),
		'V' => Some(5),
		'X' => Some(10),
		_ => None,
	};
	let digits = text.chars().map(value).collect::<Option<Vec<u32>>>()?;
	let mut total = 0;
	for (i, d) in digits.iter().enumerate() {
		match digits.get(i + 1) {
			Some(next) if next > d => total -= *d as i64,
			_ => total += *d as i64,
		}
	}
	u32::try_from(total).ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_labels_normalize() {
		assert_eq!(normalize_round_label("2-3"), "2-3");
		assert_eq!(normalize_round_label(" II - 3 "), "2-3");
		assert_eq!(normalize_round_label("iv-1"), "4-1");
		assert_eq!(normalize_round_label("2–5"), "2-5");
		assert_eq!(normalize_round_label("Round 2"), "Round 2");
		assert_eq!(normalize_round_label(""), "");
	}

	#[test]
	fn boxes_clamp_to_frame() {
		assert_eq!(GOLD_BOX.to_pixels(1000, 1000), (900, 830, 90, 70));
		assert_eq!(NormBox::new(0.9, 0.9, 1.4, 1.2).to_pixels(100, 100), (90, 90, 10, 10));
		assert_eq!(NormBox::new(0.6, 0.6, 0.2, 0.2).to_pixels(100, 100), (60, 60, 0, 0));
	}
}
