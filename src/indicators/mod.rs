//! Session-level behavioral indicators
//!
//! Turns a frozen [`SessionTrace`](crate::session::SessionTrace) into focus,
//! look-away, blink and saccade statistics plus a weighted composite score.

mod engine;
mod events;
mod regions;
mod scoring;
mod types;

pub use engine::IndicatorEngine;
pub use events::{BlinkStats, LookAwayStats, SaccadeStats};
pub use regions::{is_edge, CenterRegion, FocusStats};
pub use scoring::ScoreInputs;
pub use types::*;
