//! Client for an OpenAI-compatible vision chat endpoint.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Image;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlmConfig {
	/// `"api"` talks to `base_url`; `"mock"` uses synthetic readings.
	pub backend: String,
	pub base_url: String,
	pub model: String,
	/// Sent as a bearer token when non-empty.
	pub api_key: String,
	pub timeout_secs: u64,
	/// Confidence assumed for full-scene reads that do not report one.
	pub scene_confidence: f32,
	/// Scale applied to the full frame before it is sent.
	pub downscale: f32,
}

impl Default for VlmConfig {
	fn default() -> Self {
		Self {
			backend: "api".to_string(),
			base_url: "http://localhost:1234".to_string(),
			model: "local-model".to_string(),
			api_key: String::new(),
			timeout_secs: 30,
			scene_confidence: 0.9,
			downscale: 0.6,
		}
	}
}

/// One piece of a user message.
pub enum Part<'a> {
	Text(String),
	Image(Image<'a>),
}

/// A single-turn request: optional system prompt plus mixed text/image content.
pub struct Prompt<'a> {
	pub system: Option<&'a str>,
	pub parts: Vec<Part<'a>>,
}

impl<'a> Prompt<'a> {
	pub fn new(system: Option<&'a str>, text: impl Into<String>) -> Self {
		Self {
			system,
			parts: vec![Part::Text(text.into())],
		}
	}

	pub fn text(mut self, text: impl Into<String>) -> Self {
		self.parts.push(Part::Text(text.into()));
		self
	}

	pub fn image(mut self, image: Image<'a>) -> Self {
		self.parts.push(Part::Image(image));
		self
	}
}

/// Anything that can answer a [`Prompt`] with text.
pub trait Vlm {
	fn ask(&self, prompt: &Prompt) -> Result<String>;
}

pub struct HttpVlm {
	agent: ureq::Agent,
	url: String,
	model: String,
	api_key: String,
}

impl HttpVlm {
	pub fn new(config: &VlmConfig) -> Self {
		let agent: ureq::Agent = ureq::Agent::config_builder()
			.timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
			.build()
			.into();
		Self {
			agent,
			url: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
			model: config.model.clone(),
			api_key: config.api_key.clone(),
		}
	}
}

#[derive(Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	temperature: f32,
	messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
	role: &'static str,
	content: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
	choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
	message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
	#[serde(default)]
	content: Value,
}

impl Vlm for HttpVlm {
	fn ask(&self, prompt: &Prompt) -> Result<String> {
		let mut messages = Vec::with_capacity(2);
		if let Some(system) = prompt.system {
			messages.push(Message {
				role: "system",
				content: Value::String(system.to_string()),
			});
		}
		messages.push(Message {
			role: "user",
			content: encode_parts(&prompt.parts)?,
		});

		let body = ChatRequest {
			model: &self.model,
			temperature: 0.0,
			messages,
		};

		let mut req = self.agent.post(&self.url);
		if !self.api_key.is_empty() {
			req = req.header("Authorization", format!("Bearer {}", self.api_key));
		}
		let mut res = req
			.send_json(&body)
			.with_context(|| format!("POST {}", self.url))?;
		let res = res
			.body_mut()
			.read_json::<ChatResponse>()
			.context("Decode chat completion JSON")?;

		let Some(choice) = res.choices.into_iter().next() else {
			bail!("chat completion has no choices");
		};
		Ok(content_to_text(&choice.message.content))
	}
}

fn encode_parts(parts: &[Part]) -> Result<Value> {
	parts
		.iter()
		.map(|part| -> Result<Value> {
			Ok(match part {
				Part::Text(text) => serde_json::json!({"type": "text", "text": text}),
				Part::Image(image) => serde_json::json!({
					"type": "image_url",
					"image_url": {"url": png_data_url(*image)?},
				}),
			})
		})
		.collect::<Result<Vec<_>>>()
		.map(Value::Array)
}

pub fn png_data_url(image: Image) -> Result<String> {
	let png = image.to_png()?;
	Ok(format!(
		"data:image/png;base64,{}",
		base64::engine::general_purpose::STANDARD.encode(png)
	))
}

/// Message content is either a string or a list of typed blocks.
fn content_to_text(content: &Value) -> String {
	match content {
		Value::String(s) => s.clone(),
		Value::Array(items) => items
			.iter()
			.filter_map(|item| match item {
				Value::String(s) => Some(s.as_str()),
				Value::Object(block) => block.get("text").and_then(Value::as_str),
				_ => None,
			})
			.collect::<Vec<_>>()
			.join("\n"),
		_ => String::new(),
	}
}
