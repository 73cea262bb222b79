//! Bar targets, easing and the render-side tick.

mod animation;
mod store;
mod ticker;

pub use animation::AnimationEngine;
pub use store::BarStore;
pub use ticker::{FrameCallback, Ticker};
