use std::{cell::RefCell, collections::VecDeque, sync::Arc};

use crate::vlm::{Part, Prompt, Vlm};

/// Replays canned answers in order and records what it was asked.
/// Errors once the answers run out.
pub struct Canned {
	answers: RefCell<VecDeque<String>>,
	calls: RefCell<Vec<Vec<Asked>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asked {
	Text(String),
	Image(u32, u32),
}

impl Canned {
	pub fn new<const N: usize>(answers: [&str; N]) -> Arc<Self> {
		Arc::new(Self {
			answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
			calls: RefCell::new(Vec::new()),
		})
	}

	pub fn calls(&self) -> Vec<Vec<Asked>> {
		self.calls.borrow().clone()
	}

	/// Image sizes sent, per call.
	pub fn image_sizes(&self) -> Vec<Vec<(u32, u32)>> {
		self.calls()
			.into_iter()
			.map(|call| {
				call.into_iter()
					.filter_map(|a| match a {
						Asked::Image(w, h) => Some((w, h)),
						Asked::Text(_) => None,
					})
					.collect()
			})
			.collect()
	}
}

impl Vlm for Canned {
	fn ask(&self, prompt: &Prompt) -> anyhow::Result<String> {
		let asked = prompt
			.parts
			.iter()
			.map(|p| match p {
				Part::Text(t) => Asked::Text(t.clone()),
				Part::Image(img) => Asked::Image(img.width(), img.height()),
			})
			.collect();
		self.calls.borrow_mut().push(asked);
		self.answers
			.borrow_mut()
			.pop_front()
			.ok_or_else(|| anyhow::anyhow!("no canned answer left"))
	}
}
