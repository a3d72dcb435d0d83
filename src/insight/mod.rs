//! Insight generation: prompt templates and the text generation backend.

pub mod generator;
pub mod prompt;

pub use generator::{GenerationError, GeneratorSettings, InsightGenerator, OllamaGenerator};
