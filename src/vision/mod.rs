//! Vision analysis client: sends a meal photo to an OpenAI-compatible
//! multimodal model and extracts a structured calorie estimate through a
//! three-stage fallback.

pub mod client;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod types;

pub use client::{OpenAiVision, VisionBackend, VisionError};
pub use types::{AnalysisOutcome, RawAnalysis, RawFood, Stage};
