#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # emend-completion
//!
//! The boundary between the correction pipeline and an external
//! text-completion service.
//!
//! The pipeline depends only on [`CompletionService`]: hand it a
//! [`ChunkRequest`] and a [`CancelToken`](emend_core::CancelToken), get raw
//! suggestions or an [`Error`] whose [`Error::classify`] says whether the
//! call may be retried. [`HttpCompletionClient`] is a reference
//! implementation that POSTs chunk text as JSON.
//!
//! ## Example
//!
//! ```ignore
//! use emend_completion::{ChunkRequest, CompletionService, HttpCompletionClient};
//!
//! let client = HttpCompletionClient::with_url("http://localhost:8080".parse()?)?;
//! let suggestions = client
//!     .suggest(&ChunkRequest::new(0, "Teh cat sat."), &CancelToken::new())
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod response;
pub mod service;

pub use client::HttpCompletionClient;
pub use config::CompletionConfig;
pub use error::{Error, Result, RetryAfter, RetryClass};
pub use response::parse_suggestions;
pub use service::{ChunkRequest, CompletionService};
