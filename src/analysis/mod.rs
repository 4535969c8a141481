//! Analysis Engine
//!
//! Master-change tracking and resolution of OCR titles to library tracks.

pub mod events;
pub mod resolver;

pub use events::{MasterTracker, Transition};
pub use resolver::SongResolver;
