//! Game state model, multi-source fusion and the decision layer on top of it.

pub mod decision;
pub mod episode;
pub mod fusion;
pub mod game;
pub mod policy;
pub mod reading;
pub mod reward;
pub mod screen;

pub use decision::{Recommendation, recommend_actions};
pub use episode::{Episode, EpisodeLogger, Transition};
pub use fusion::{Candidate, Correction, FusionConfig, FusionEngine, Fused, Verdict};
pub use game::{GameState, Phase, ShopEntry, Unit, parse_round_label};
pub use policy::{Action, MlpPolicy, Policy, RuleBasedPolicy};
pub use reading::{PartialReading, Source, UNSCORED_MODEL_CONFIDENCE, pick_digits};
pub use reward::{MatchResult, compute_reward};
pub use screen::{PlayerStatus, ScreenState, ScreenType};
