//! lingua-coach - Speech-practice session engine for graded language learning
//!
//! This library provides the core functionality for the practice engine:
//! - Course generation via an LLM collaborator (graded levels with
//!   translations, grammar notes, vocabulary, and phonetics)
//! - The per-level practice state machine (playback, continuous speech
//!   capture with auto-restart, pronunciation critique, progress tracking)
//! - A WebSocket API so a browser front-end can drive a session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Browser front-end                    │
//! │   rendering  │  speech recognition  │  user input   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ WebSocket
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Practice engine                      │
//! │   Session FSM  │  MediaCache  │  Playback/Capture   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             External collaborators                   │
//! │   generation │ synthesis │ images │ critique        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod course;
pub mod error;
pub mod providers;
pub mod session;
pub mod setup;
pub mod voice;

pub use config::Config;
pub use course::{CourseInput, DifficultyTier, Evaluation, Level, PhonemeError};
pub use error::{Error, Result};
pub use session::{
    AdvanceOutcome, MediaCache, PracticeSession, ProgressTracker, SessionConfig, SessionView,
};
