//! mcbuddy.
//!
//! Watches a running match through window captures, fuses what the readers
//! see into one game state per tick and prints recommendations.

mod capture;
mod config;
mod overlay;
mod tick;
mod util;

use std::{
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use state::{EpisodeLogger, FusionEngine, MlpPolicy, Policy, RuleBasedPolicy};

use crate::{
	capture::{FrameSource, StillFrame, WindowCapture},
	config::Config,
	tick::{LoopConfig, Session},
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Config file (defaults to the platform config directory).
	#[arg(long)]
	config: Option<PathBuf>,

	/// Stop after this many ticks.
	#[arg(long)]
	max_ticks: Option<u64>,

	/// Read this screenshot on every tick instead of capturing the game window.
	#[arg(long, value_name = "PNG")]
	replay: Option<PathBuf>,

	/// Override the vision backend (`api` or `mock`).
	#[arg(long)]
	backend: Option<String>,

	/// Print capturable windows and exit.
	#[arg(long)]
	list_windows: bool,

	/// Write the effective config back to disk and exit.
	#[arg(long)]
	save_config: bool,
}

fn main() {
	// Structured logging. Use `RUST_LOG=info` etc.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	if let Err(err) = run(Cli::parse()) {
		tracing::error!(error = format!("{err:#}"), "fatal");
		std::process::exit(1);
	}
}

fn run(cli: Cli) -> Result<()> {
	if cli.list_windows {
		for (app, title) in capture::list_windows()? {
			println!("{app}\t{title}");
		}
		return Ok(());
	}

	let config_path = match cli.config {
		Some(path) => path,
		None => Config::default_path()?,
	};
	let mut config = Config::load_or_default(&config_path);
	if let Some(backend) = cli.backend {
		config.vlm.backend = backend;
	}
	if cli.save_config {
		config.save(&config_path)?;
		println!("{}", config_path.display());
		return Ok(());
	}

	let ocr = load_ocr(&config)?;
	let ie = ie::Ie::try_new(&config.vlm, ocr, &config.local_player_name)?;
	let policy = load_policy(&config)?;

	let mut meta = Map::new();
	meta.insert("policy".into(), Value::String(policy.name().to_string()));
	meta.insert("backend".into(), Value::String(config.vlm.backend.clone()));
	let logger = EpisodeLogger::start(&config.episodes_dir()?, meta)?;

	let mut session = Session::new(
		ie,
		FusionEngine::new(config.fusion),
		policy,
		logger,
		config.players_every_n,
	);

	let mut source: Box<dyn FrameSource> = match &cli.replay {
		Some(path) => Box::new(StillFrame::open(path)?),
		None => Box::new(WindowCapture::new(config.app_name.clone(), config.max_capture_height)),
	};

	let stop = Arc::new(AtomicBool::new(false));
	{
		let stop = stop.clone();
		ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)).context("install Ctrl-C handler")?;
	}

	let loop_config = LoopConfig {
		delay: Duration::from_secs_f32(config.poll_delay_s.max(0.0)),
		max_backoff: Duration::from_secs_f32(config.max_backoff_s.max(0.0)),
		max_ticks: cli.max_ticks,
	};
	tracing::info!(policy = session.policy_name(), app = %config.app_name, "started");
	let ticks = tick::run(&mut session, source.as_mut(), &stop, &loop_config, |report| {
		print!("{}", overlay::render(report));
	});

	let rounds = session.round();
	let path = session.finish()?;
	tracing::info!(ticks, rounds, path = %path.display(), "stopped");
	Ok(())
}

fn load_ocr(config: &Config) -> Result<Option<ie::Ocr>> {
	let loaded = util::assets::resolve_ocr_assets(config.ocr.dir.as_deref(), &config.ocr.lang)
		.and_then(|a| ie::Ocr::try_new(&a.detection, &a.recognition, &a.charset));
	match loaded {
		Ok(ocr) => Ok(Some(ocr)),
		Err(err) if config.ocr.require => Err(err),
		Err(err) => {
			tracing::warn!(error = format!("{err:#}"), "OCR unavailable; HUD reads use the model only");
			Ok(None)
		}
	}
}

fn load_policy(config: &Config) -> Result<Box<dyn Policy>> {
	match &config.policy_path {
		Some(path) => Ok(Box::new(MlpPolicy::load(path)?)),
		None => Ok(Box::new(RuleBasedPolicy::new())),
	}
}
