//! # ironmq
//!
//! Client for the IronMQ message queue service.
//!
//! ```ignore
//! use ironmq::{Client, Message};
//!
//! let client = Client::new("my-project", "my-token")?;
//! let queue = client.queue("jobs");
//!
//! queue.push("hello").await?;
//! let message = queue.reserve().await?;
//! queue.delete_message(&message).await?;
//! ```
//!
//! ## Configuration
//!
//! Anything not set on the [`ClientBuilder`] is resolved through a chain of
//! sources, each filling only what earlier ones left unset:
//!
//! 1. explicit builder values
//! 2. `IRON_MQ_*` environment variables, then `IRON_*`
//! 3. a scan for `iron.json` and friends in the working directory, its
//!    `config/` subdirectory, and the home directory
//! 4. a named config file, when one was specified
//! 5. built-in defaults (the AWS us-east endpoint)
//!
//! ## Retries
//!
//! Requests answered with `503 Service Unavailable` are retried up to five
//! total attempts with full-jitter exponential backoff; every other failure
//! surfaces immediately. The policy lives in the `ironmq-retries` crate.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod cloud;
pub mod config;
pub mod error;
pub mod queue;
pub mod types;

// Re-exports
pub use auth::TokenProvider;
pub use client::{Client, ClientBuilder};
pub use cloud::Cloud;
pub use config::{ConfigOptions, KeystoneOptions, Resolver};
pub use error::{IronError, Result};
pub use queue::Queue;
pub use types::{Alert, Ids, Message, MessageOptions, QueueModel, Subscriber};
