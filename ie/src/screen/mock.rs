//! Synthetic readings for running the loop without a model.

use state::{Phase, PartialReading, ShopEntry, Source};

use crate::{Image, reader::Reader};

const HEROES: [&str; 8] = ["Balmond", "Layla", "Miya", "Eudora", "Tigreal", "Nana", "Zilong", "Alucard"];

/// Deterministic by round hint: the same tick always produces the same reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockReader;

impl Reader for MockReader {
	fn source(&self) -> Source {
		Source::Scene
	}

	fn read(&self, _frame: Image, round_hint: u32) -> anyhow::Result<PartialReading> {
		let tick = round_hint.max(1);
		let major = 1 + (tick - 1) / 5;
		let minor = 1 + (tick - 1) % 5;

		let mut r = PartialReading::absent(Source::Scene);
		r.phase = Some(match major {
			1 => Phase::Early,
			2..=3 => Phase::Mid,
			_ => Phase::Late,
		});
		r.round_label = Some(format!("{major}-{minor}"));
		r.gold = Some(((tick * 7) % 61) as i64);
		r.health = Some(100 - (tick * 3).min(100) as i64);
		r.board_level = Some((1 + tick / 4).min(9) as i64);
		r.experience = Some(((tick * 3) % 20) as i64);
		r.shop_slots = Some(
			(0..5u8)
				.map(|slot| ShopEntry {
					slot_index: slot,
					name: HEROES[(tick as usize + slot as usize) % HEROES.len()].to_string(),
					cost: 1 + ((tick + slot as u32) % 5) as u8,
				})
				.collect(),
		);
		r.shop_open = Some(tick % 3 == 0);
		r.confidence = Some(0.9);
		Ok(r)
	}
}
