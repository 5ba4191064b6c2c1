//! State machine module for window tabbing
//!
//! Two states:
//! - Idle: no window switch in progress
//! - Tabbing: modifier held, next/previous-window presses cycle a selection

mod machine;

pub use machine::{Direction, TabbingSession, TabbingState, Transition};
