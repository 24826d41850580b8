//! Common utilities and shared types for osccai.
//!
//! This crate provides foundational components used across all osccai crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use osccai_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("{} listening, generated {id}", config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    AuthConfig, Config, ConsensusConfig, DatabaseConfig, ServerConfig, WebhookConfig,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
