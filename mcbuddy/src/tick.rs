//! The capture → read → fuse → decide loop.
//!
//! Everything runs on the calling thread. A tick either produces a
//! [`TickReport`] or is skipped; skipped ticks leave the round counter, the
//! fusion baseline and the episode log untouched.

use std::{
	path::PathBuf,
	sync::atomic::{AtomicBool, Ordering},
	time::{Duration, Instant},
};

use anyhow::Result;
use serde_json::json;
use state::{Action, EpisodeLogger, Fused, FusionEngine, GameState, Policy, Recommendation, Transition};

use crate::capture::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// No frame could be captured.
	NoWindow,
	/// The full-scene reader failed; nothing to fuse.
	SceneUnavailable,
}

#[derive(Debug, Clone)]
pub struct TickReport {
	pub round: u32,
	pub fused: Fused,
	pub action: Action,
	pub reward: f32,
	pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
	Fused(Box<TickReport>),
	Skipped(SkipReason),
}

pub struct Session {
	ie: ie::Ie,
	engine: FusionEngine,
	policy: Box<dyn Policy>,
	logger: EpisodeLogger,
	last: Option<GameState>,
	round: u32,
	players_every_n: u32,
}

impl Session {
	pub fn new(ie: ie::Ie, engine: FusionEngine, policy: Box<dyn Policy>, logger: EpisodeLogger, players_every_n: u32) -> Self {
		Self {
			ie,
			engine,
			policy,
			logger,
			last: None,
			round: 0,
			players_every_n: players_every_n.max(1),
		}
	}

	/// Rounds processed so far.
	pub fn round(&self) -> u32 {
		self.round
	}

	pub fn policy_name(&self) -> &str {
		self.policy.name()
	}

	pub fn tick(&mut self, frame: Option<&ie::OwnedImage>) -> TickOutcome {
		let Some(frame) = frame else {
			return TickOutcome::Skipped(SkipReason::NoWindow);
		};
		let round = self.round;

		let scene = match self.ie.read_scene(frame.as_image(), round) {
			Ok(reading) => reading,
			Err(err) => {
				tracing::warn!(round, error = format!("{err:#}"), "scene read failed; skipping tick");
				return TickOutcome::Skipped(SkipReason::SceneUnavailable);
			}
		};

		let mut readings = vec![scene];
		readings.extend(self.ie.read_hud(frame.as_image(), round));
		// Counted from one, so with n > 1 the first tick skips the roster.
		if (round + 1) % self.players_every_n == 0 {
			readings.extend(self.ie.read_roster(frame.as_image(), round));
		}

		let fused = self.engine.fuse(round, &readings);
		for correction in &fused.corrections {
			tracing::debug!(round, ?correction, "fusion correction");
		}

		let action = self.policy.choose(&fused.state);
		let reward = self
			.last
			.as_ref()
			.map_or(0.0, |prev| state::compute_reward(prev, &fused.state, false, None));

		let transition = Transition {
			state: fused.state.to_vector(),
			action,
			reward,
			done: false,
			info: Some(json!({
				"round": round,
				"gold": fused.state.gold,
				"level": fused.state.board_level,
				"hp": fused.state.health,
			})),
		};
		if let Err(err) = self.logger.log_step(&transition) {
			tracing::warn!(round, error = format!("{err:#}"), "failed to log step");
		}

		let recommendations = state::recommend_actions(&fused.state);
		self.last = Some(fused.state.clone());
		self.round += 1;

		TickOutcome::Fused(Box::new(TickReport {
			round,
			fused,
			action,
			reward,
			recommendations,
		}))
	}

	/// Close the episode with a terminal transition. Consumes the session so
	/// this can only happen once.
	pub fn finish(self) -> Result<PathBuf> {
		let policy = self.policy.name().to_string();
		let state = self.last.unwrap_or_default();
		self.logger.finish(Transition {
			state: state.to_vector(),
			action: Action::Noop,
			reward: 0.0,
			done: true,
			info: Some(json!({
				"last_round": self.round,
				"policy_used": policy,
			})),
		})
	}
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
	pub delay: Duration,
	/// Cap for the doubling wait while no frame is available.
	pub max_backoff: Duration,
	/// Stop after this many ticks (skipped ones included).
	pub max_ticks: Option<u64>,
}

/// Tick until `stop` is set or `max_ticks` is reached. Returns the number of
/// ticks attempted.
pub fn run(
	session: &mut Session,
	source: &mut dyn FrameSource,
	stop: &AtomicBool,
	config: &LoopConfig,
	mut on_report: impl FnMut(&TickReport),
) -> u64 {
	let mut ticks = 0u64;
	let mut backoff = config.delay;

	while !stop.load(Ordering::Relaxed) {
		if config.max_ticks.is_some_and(|max| ticks >= max) {
			break;
		}
		ticks += 1;

		let frame = source.grab();
		let wait = match session.tick(frame.as_ref()) {
			TickOutcome::Fused(report) => {
				on_report(&report);
				backoff = config.delay;
				config.delay
			}
			TickOutcome::Skipped(SkipReason::SceneUnavailable) => {
				backoff = config.delay;
				config.delay
			}
			TickOutcome::Skipped(SkipReason::NoWindow) => {
				tracing::warn!(wait_ms = backoff.as_millis() as u64, "no game window; backing off");
				let wait = backoff;
				backoff = (backoff.max(Duration::from_millis(100)) * 2).min(config.max_backoff.max(config.delay));
				wait
			}
		};

		sleep_unless_stopped(wait, stop);
	}

	ticks
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
	const SLICE: Duration = Duration::from_millis(100);
	let deadline = Instant::now() + duration;
	loop {
		if stop.load(Ordering::Relaxed) {
			return;
		}
		let left = deadline.saturating_duration_since(Instant::now());
		if left.is_zero() {
			return;
		}
		std::thread::sleep(left.min(SLICE));
	}
}
