//! Master deck tracking
//!
//! Turns per-cycle classifier results into master-change events. A change
//! is the only thing that triggers re-identification of the loaded tracks.

use std::fmt;

use crate::shared::Deck;

/// Which deck is currently master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MasterState {
    #[default]
    NoMaster,
    Left,
    Right,
}

impl MasterState {
    /// Whether `deck` is the master deck
    pub fn is_deck(&self, deck: Deck) -> bool {
        matches!(
            (self, deck),
            (MasterState::Left, Deck::Left) | (MasterState::Right, Deck::Right)
        )
    }
}

impl fmt::Display for MasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterState::NoMaster => write!(f, "no master"),
            MasterState::Left => write!(f, "left"),
            MasterState::Right => write!(f, "right"),
        }
    }
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: MasterState,
    pub to: MasterState,
}

impl Transition {
    /// Whether the master deck changed
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Current and previous master state
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterTracker {
    current: MasterState,
    previous: MasterState,
}

impl MasterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> MasterState {
        self.current
    }

    /// Feed this cycle's classifier results.
    ///
    /// The left deck wins when both test as master. When neither does the
    /// current state is kept, since the indicator can be momentarily
    /// unreadable.
    pub fn observe(&mut self, left_is_master: bool, right_is_master: bool) -> Transition {
        self.previous = self.current;
        if left_is_master {
            self.current = MasterState::Left;
        } else if right_is_master {
            self.current = MasterState::Right;
        }

        Transition {
            from: self.previous,
            to: self.current,
        }
    }
}
