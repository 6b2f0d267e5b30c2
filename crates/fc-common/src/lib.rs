//! # fc-common
//!
//! Shared configuration and error types for FrameChat.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
