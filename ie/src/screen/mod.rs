pub mod hud;
pub mod mock;
pub mod roster;
pub mod scene;

#[cfg(test)]
pub(crate) mod testing;

pub use hud::HudReader;
pub use mock::MockReader;
pub use roster::RosterReader;
pub use scene::SceneReader;
