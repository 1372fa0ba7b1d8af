//! Error taxonomy for the flood detection pipeline.

use thiserror::Error;

/// Main error type returned by every stage of the pipeline.
#[derive(Error, Debug)]
pub enum FloodError {
	#[error("[{stage}] input error: {message}")]
	Input { stage: &'static str, message: String },

	#[error("[{stage}] configuration error: {message}")]
	Configuration { stage: &'static str, message: String },

	#[error("[{stage}] algorithmic error: {message}")]
	Algorithmic { stage: &'static str, message: String },

	#[error("[{stage}] I/O error: {source}")]
	Io {
		stage: &'static str,
		#[source]
		source: std::io::Error,
	},
}

impl FloodError {
	pub fn input(stage: &'static str, message: impl Into<String>) -> Self {
		Self::Input { stage, message: message.into() }
	}

	pub fn config(stage: &'static str, message: impl Into<String>) -> Self {
		Self::Configuration { stage, message: message.into() }
	}

	pub fn algorithmic(stage: &'static str, message: impl Into<String>) -> Self {
		Self::Algorithmic { stage, message: message.into() }
	}

	pub fn io(stage: &'static str, source: std::io::Error) -> Self {
		Self::Io { stage, source }
	}
}

/// Result type alias used throughout the crate.
pub type FloodResult<T> = Result<T, FloodError>;
