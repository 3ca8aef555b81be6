//! Append-only JSONL experience log, one file per match.
//!
//! ```text
//! {"meta":{"episode_id":"1735732800","created_time":1735732800,"schema_version":1,...}}
//! {"state":[...],"action":"level_up","reward":0.0,"done":false}
//! ...
//! ```

use std::{
	fs::{File, OpenOptions},
	io::{BufRead, BufReader, BufWriter, ErrorKind, Write},
	path::{Path, PathBuf},
	time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::game::FEATURE_LEN;
use crate::policy::Action;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
	pub state: [f32; FEATURE_LEN],
	pub action: Action,
	pub reward: f32,
	pub done: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub info: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct MetaLine {
	meta: Map<String, Value>,
}

pub struct EpisodeLogger {
	id: String,
	path: PathBuf,
	writer: BufWriter<File>,
	steps: usize,
}

impl EpisodeLogger {
	/// Create `dir` if needed and open a fresh episode file in it.
	///
	/// `extra_meta` is merged into the meta line; the reserved keys always win.
	pub fn start(dir: &Path, extra_meta: Map<String, Value>) -> Result<Self> {
		std::fs::create_dir_all(dir).with_context(|| format!("Create episode dir {}", dir.display()))?;

		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		let (id, path, file) = create_unique(dir, &now.to_string())?;

		let mut meta = extra_meta;
		meta.insert("episode_id".into(), Value::String(id.clone()));
		meta.insert("created_time".into(), Value::from(now));
		meta.insert("schema_version".into(), Value::from(SCHEMA_VERSION));

		let mut logger = Self {
			id,
			path,
			writer: BufWriter::new(file),
			steps: 0,
		};
		logger.write_line(&MetaLine { meta })?;
		tracing::info!(episode = %logger.id, path = %logger.path.display(), "episode started");
		Ok(logger)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn steps(&self) -> usize {
		self.steps
	}

	/// Append one transition and flush it to disk.
	pub fn log_step(&mut self, transition: &Transition) -> Result<()> {
		self.write_line(transition)?;
		self.steps += 1;
		Ok(())
	}

	/// Append the terminal transition and close the file.
	pub fn finish(mut self, terminal: Transition) -> Result<PathBuf> {
		self.log_step(&Transition { done: true, ..terminal })?;
		tracing::info!(episode = %self.id, steps = self.steps, "episode finished");
		Ok(self.path)
	}

	fn write_line<T: Serialize>(&mut self, line: &T) -> Result<()> {
		serde_json::to_writer(&mut self.writer, line).context("Serialize episode line")?;
		self.writer.write_all(b"\n")?;
		self.writer
			.flush()
			.with_context(|| format!("Flush episode {}", self.path.display()))
	}
}

fn create_unique(dir: &Path, stamp: &str) -> Result<(String, PathBuf, File)> {
	for n in 0u32.. {
		let id = if n == 0 { stamp.to_string() } else { format!("{stamp}_{n}") };
		let path = dir.join(format!("episode_{id}.jsonl"));
		match OpenOptions::new().write(true).create_new(true).open(&path) {
			Ok(file) => return Ok((id, path, file)),
			Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
			Err(err) => return Err(err).with_context(|| format!("Create episode {}", path.display())),
		}
	}
	anyhow::bail!("no free episode name in {}", dir.display())
}

/// A log read back from disk.
#[derive(Debug, Clone)]
pub struct Episode {
	pub meta: Map<String, Value>,
	pub transitions: Vec<Transition>,
}

impl Episode {
	pub fn load(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("Open episode {}", path.display()))?;
		let mut lines = BufReader::new(file).lines();

		let first = lines.next().context("Episode file is empty")??;
		let MetaLine { meta } = serde_json::from_str(&first).context("Parse episode meta")?;

		let mut transitions = Vec::new();
		for (i, line) in lines.enumerate() {
			let line = line?;
			if line.trim().is_empty() {
				continue;
			}
			let t = serde_json::from_str(&line).with_context(|| format!("Parse episode line {}", i + 2))?;
			transitions.push(t);
		}
		Ok(Self { meta, transitions })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn step(action: Action, reward: f32) -> Transition {
		Transition {
			state: [0.1, 0.2, 1.0, 0.0, 0.1, 0.1],
			action,
			reward,
			done: false,
			info: None,
		}
	}

	#[test]
	fn meta_line_comes_first() {
		let dir = tempfile::tempdir().unwrap();
		let mut extra = Map::new();
		extra.insert("policy".into(), "rules".into());
		extra.insert("schema_version".into(), 99.into());

		let mut logger = EpisodeLogger::start(dir.path(), extra).unwrap();
		logger.log_step(&step(Action::BuyUnit, 0.0)).unwrap();
		let path = logger.finish(step(Action::Noop, 5.0)).unwrap();

		let text = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines.len(), 3);
		assert!(lines[0].starts_with(r#"{"meta":"#));
		assert!(!lines[1].contains("info"));

		let episode = Episode::load(&path).unwrap();
		assert_eq!(episode.meta["schema_version"], 1);
		assert_eq!(episode.meta["policy"], "rules");
		assert!(episode.meta["created_time"].is_u64());
		assert_eq!(episode.transitions.len(), 2);
		assert_eq!(episode.transitions[0].action, Action::BuyUnit);
		assert!(episode.transitions[1].done);
	}

	#[test]
	fn steps_are_on_disk_before_finish() {
		let dir = tempfile::tempdir().unwrap();
		let mut logger = EpisodeLogger::start(dir.path(), Map::new()).unwrap();
		logger
			.log_step(&Transition {
				info: Some(serde_json::json!({"gold": 12})),
				..step(Action::Reroll, -0.5)
			})
			.unwrap();

		let episode = Episode::load(logger.path()).unwrap();
		assert_eq!(episode.transitions.len(), 1);
		assert_eq!(episode.transitions[0].info.as_ref().unwrap()["gold"], 12);
	}

	#[test]
	fn episodes_started_together_get_distinct_files() {
		let dir = tempfile::tempdir().unwrap();
		let a = EpisodeLogger::start(dir.path(), Map::new()).unwrap();
		let b = EpisodeLogger::start(dir.path(), Map::new()).unwrap();
		assert_ne!(a.path(), b.path());
		assert!(a.path().file_name().unwrap().to_string_lossy().starts_with("episode_"));
	}
}
