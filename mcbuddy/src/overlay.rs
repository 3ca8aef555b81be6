//! Plain-text overlay printed after every fused tick.

use std::fmt::Write;

use state::Verdict;

use crate::tick::TickReport;

pub fn render(report: &TickReport) -> String {
	let s = &report.fused.state;
	let mut out = String::new();
	let label = if s.round_label.is_empty() { "?" } else { s.round_label.as_str() };
	let _ = writeln!(
		out,
		"[{}] round {label} | hp {} | gold {} | level {} | {} ({:.2}) -> {}",
		report.round,
		s.health,
		s.gold,
		s.board_level,
		verdict(report.fused.verdict),
		s.confidence,
		report.action,
	);
	out.push_str("=== recommendations ===\n");
	for rec in &report.recommendations {
		let _ = writeln!(out, "- [{}] {}", rec.kind(), rec.explanation());
	}
	out
}

fn verdict(v: Verdict) -> &'static str {
	match v {
		Verdict::Seeded => "seeded",
		Verdict::Accepted => "accepted",
		Verdict::Dropped => "dropped",
	}
}

#[cfg(test)]
mod tests {
	use state::{Action, Fused, GameState};

	use super::*;

	#[test]
	fn lists_recommendations_in_order() {
		let game = GameState {
			round_label: "2-3".into(),
			gold: 55,
			health: 18,
			confidence: 0.9,
			..GameState::default()
		};
		let report = TickReport {
			round: 7,
			recommendations: state::recommend_actions(&game),
			fused: Fused {
				state: game,
				verdict: Verdict::Accepted,
				corrections: Vec::new(),
			},
			action: Action::LevelUp,
			reward: 0.0,
		};

		let text = render(&report);
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[0], "[7] round 2-3 | hp 18 | gold 55 | level 1 | accepted (0.90) -> level_up");
		assert_eq!(lines[1], "=== recommendations ===");
		assert!(lines[2].starts_with("- [level_up] "));
		assert!(lines.iter().any(|l| l.starts_with("- [aggressive] ")));
		assert!(!text.contains("[hold]"));
	}
}
