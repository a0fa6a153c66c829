//! Generation sessions and their cancellation tokens.

pub mod generation;
pub mod token;

pub use generation::{GenerationSession, NullObserver, SessionObserver, SessionStatus};
pub use token::{Token, TokenCell};
