//! Types shared across the detection pipeline
//!
//! The monitored application always shows exactly two decks side by side.

use std::fmt;

/// One of the two playback decks being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deck {
    Left,
    Right,
}

impl Deck {
    /// Both decks in processing order (left before right)
    pub const ALL: [Deck; 2] = [Deck::Left, Deck::Right];

    /// Lowercase name used for logging and scratch file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Deck::Left => "left",
            Deck::Right => "right",
        }
    }

    /// Index into per-deck arrays
    pub fn index(&self) -> usize {
        match self {
            Deck::Left => 0,
            Deck::Right => 1,
        }
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_order_and_index() {
        assert_eq!(Deck::ALL, [Deck::Left, Deck::Right]);
        for (i, deck) in Deck::ALL.iter().enumerate() {
            assert_eq!(deck.index(), i);
        }
    }

    #[test]
    fn test_deck_display() {
        assert_eq!(Deck::Left.to_string(), "left");
        assert_eq!(format!("{} deck", Deck::Right), "right deck");
    }
}
