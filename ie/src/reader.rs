use state::{PartialReading, Source};

use crate::Image;

/// A stateless source of partial game state readings.
pub trait Reader {
	fn source(&self) -> Source;
	fn read(&self, frame: Image, round_hint: u32) -> anyhow::Result<PartialReading>;
}

/// Run `reader`, turning any failure into an absent reading.
pub fn read_or_absent(reader: &dyn Reader, frame: Image, round_hint: u32) -> PartialReading {
	match reader.read(frame, round_hint) {
		Ok(reading) => reading,
		Err(err) => {
			tracing::warn!(source = %reader.source(), error = format!("{err:#}"), "reader failed; treating as absent");
			PartialReading::absent(reader.source())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Color, OwnedImage};

	struct Broken;

	impl Reader for Broken {
		fn source(&self) -> Source {
			Source::Roster
		}

		fn read(&self, _frame: Image, _round_hint: u32) -> anyhow::Result<PartialReading> {
			anyhow::bail!("connection refused")
		}
	}

	#[test]
	fn failures_become_absent() {
		let frame = OwnedImage::filled(4, 4, Color::BLACK);
		let reading = read_or_absent(&Broken, frame.as_image(), 1);
		assert_eq!(reading, PartialReading::absent(Source::Roster));
	}
}
