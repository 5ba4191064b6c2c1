//! Window tabbing state machine
//!
//! Models alt-tab: while the tabbing modifier is held, next/previous-window
//! presses move a staged selection through the window list. Releasing the
//! modifier activates the staged window; any other key cancels.

use std::time::Instant;

use tracing::{debug, info};

use crate::hotkey::ModifierMask;
use crate::shell::WindowId;

/// Direction of a window switch step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// The two states of a tabbing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabbingState {
    /// No switch in progress
    Idle,
    /// Modifier held, cycling through `windows`
    Tabbing {
        modifier: ModifierMask,
        /// Window list snapshot taken when tabbing started
        windows: Vec<WindowId>,
        /// Index into `windows`; `None` when there are no windows
        staged: Option<usize>,
    },
}

impl Default for TabbingState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for TabbingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabbingState::Idle => write!(f, "Idle"),
            TabbingState::Tabbing { modifier, .. } => write!(f, "Tabbing({:#x})", modifier.0),
        }
    }
}

/// What a state machine call did, for the caller to apply to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered tabbing with the first step staged
    Started { staged: Option<WindowId> },
    /// Moved the staged window
    Advanced { staged: Option<WindowId> },
    /// Left tabbing without switching
    Cancelled,
    /// Left tabbing; `target` should become active
    Finished { target: Option<WindowId> },
    /// Nothing to do in the current state
    Unchanged,
}

/// Tracks the tabbing session for the key handler
#[derive(Debug)]
pub struct TabbingSession {
    state: TabbingState,
    /// Modifier whose release commits the selection
    modifier: ModifierMask,
    /// Time when the current session started
    entered_at: Option<Instant>,
}

impl TabbingSession {
    pub fn new(modifier: ModifierMask) -> Self {
        Self {
            state: TabbingState::Idle,
            modifier,
            entered_at: None,
        }
    }

    pub fn state(&self) -> &TabbingState {
        &self.state
    }

    pub fn is_tabbing(&self) -> bool {
        matches!(self.state, TabbingState::Tabbing { .. })
    }

    /// The modifier tracked for release while tabbing
    pub fn modifier(&self) -> ModifierMask {
        match &self.state {
            TabbingState::Tabbing { modifier, .. } => *modifier,
            TabbingState::Idle => self.modifier,
        }
    }

    /// Take one switch step, starting a session if idle
    ///
    /// `windows` is only called when a session starts and must list windows
    /// most recently used first.
    pub fn advance<F>(&mut self, direction: Direction, windows: F) -> Transition
    where
        F: FnOnce() -> Vec<WindowId>,
    {
        if let TabbingState::Tabbing { windows, staged, .. } = &mut self.state {
            *staged = step(*staged, windows.len(), direction);
            let target = staged.map(|i| windows[i]);
            debug!(?direction, ?target, "tabbing advanced");
            return Transition::Advanced { staged: target };
        }

        let windows = windows();
        let staged = step(None, windows.len(), direction);
        let target = staged.map(|i| windows[i]);

        info!(
            from = %self.state,
            windows = windows.len(),
            ?target,
            "tabbing started"
        );

        self.state = TabbingState::Tabbing {
            modifier: self.modifier,
            windows,
            staged,
        };
        self.entered_at = Some(Instant::now());
        Transition::Started { staged: target }
    }

    /// Abandon the session without switching windows
    pub fn cancel(&mut self) -> Transition {
        match self.exit("cancelled") {
            Some(_) => Transition::Cancelled,
            None => Transition::Unchanged,
        }
    }

    /// End the session, committing the staged window
    pub fn finish(&mut self) -> Transition {
        match self.exit("finished") {
            Some(target) => Transition::Finished { target },
            None => Transition::Unchanged,
        }
    }

    /// Return to Idle, yielding the staged window if a session was active
    fn exit(&mut self, how: &str) -> Option<Option<WindowId>> {
        let TabbingState::Tabbing { windows, staged, .. } = std::mem::take(&mut self.state) else {
            return None;
        };

        let duration_ms = self
            .entered_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let target = staged.map(|i| windows[i]);
        info!(to = %self.state, duration_ms, ?target, "tabbing {}", how);

        Some(target)
    }
}

/// Next staged index, wrapping; starting from `None` stages the first step
/// away from the active window at index 0
fn step(staged: Option<usize>, len: usize, direction: Direction) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = staged.unwrap_or(0);
    Some(match direction {
        Direction::Next => (current + 1) % len,
        Direction::Previous => (current + len - 1) % len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::masks;

    fn windows() -> Vec<WindowId> {
        vec![WindowId(1), WindowId(2), WindowId(3)]
    }

    #[test]
    fn test_initial_state() {
        let session = TabbingSession::new(masks::ALT);
        assert_eq!(session.state(), &TabbingState::Idle);
        assert!(!session.is_tabbing());
    }

    #[test]
    fn test_idle_to_tabbing_stages_next_window() {
        let mut session = TabbingSession::new(masks::ALT);
        let transition = session.advance(Direction::Next, windows);
        assert_eq!(transition, Transition::Started { staged: Some(WindowId(2)) });
        assert!(session.is_tabbing());
        assert_eq!(session.modifier(), masks::ALT);
    }

    #[test]
    fn test_previous_starts_from_the_end() {
        let mut session = TabbingSession::new(masks::ALT);
        let transition = session.advance(Direction::Previous, windows);
        assert_eq!(transition, Transition::Started { staged: Some(WindowId(3)) });
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut session = TabbingSession::new(masks::ALT);
        session.advance(Direction::Next, windows);
        session.advance(Direction::Next, windows);
        let transition = session.advance(Direction::Next, windows);
        assert_eq!(transition, Transition::Advanced { staged: Some(WindowId(1)) });

        let transition = session.advance(Direction::Previous, windows);
        assert_eq!(transition, Transition::Advanced { staged: Some(WindowId(3)) });
    }

    #[test]
    fn test_window_list_snapshot_taken_once() {
        let mut session = TabbingSession::new(masks::ALT);
        session.advance(Direction::Next, windows);
        let transition = session.advance(Direction::Next, || panic!("windows queried mid-session"));
        assert_eq!(transition, Transition::Advanced { staged: Some(WindowId(3)) });
    }

    #[test]
    fn test_finish_returns_staged_window() {
        let mut session = TabbingSession::new(masks::ALT);
        session.advance(Direction::Next, windows);
        session.advance(Direction::Next, windows);
        assert_eq!(session.finish(), Transition::Finished { target: Some(WindowId(3)) });
        assert!(!session.is_tabbing());
        assert_eq!(session.finish(), Transition::Unchanged);
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut session = TabbingSession::new(masks::ALT);
        session.advance(Direction::Next, windows);
        assert_eq!(session.cancel(), Transition::Cancelled);
        assert_eq!(session.state(), &TabbingState::Idle);
        assert_eq!(session.cancel(), Transition::Unchanged);
    }

    #[test]
    fn test_no_windows() {
        let mut session = TabbingSession::new(masks::ALT);
        assert_eq!(session.advance(Direction::Next, Vec::new), Transition::Started { staged: None });
        assert_eq!(session.finish(), Transition::Finished { target: None });
    }

    #[test]
    fn test_cycles_after_finish() {
        let mut session = TabbingSession::new(masks::ALT);
        session.advance(Direction::Next, windows);
        session.finish();
        let transition = session.advance(Direction::Next, windows);
        assert!(matches!(transition, Transition::Started { .. }));
    }
}
