//! Redub - Automated Spanish Dubbing Workflow
//!
//! Replaces the English speech of training videos with Spanish speech that
//! stays in sync with the picture: each transcribed segment gets a syllable
//! budget for translation, and the assembler fits every synthesized clip
//! into its original time window so the final track matches the video's
//! length exactly.

pub mod assemble;
pub mod budget;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod media;
pub mod segment;
pub mod synthesize;
pub mod transcribe;
pub mod translate;
pub mod workflow;
