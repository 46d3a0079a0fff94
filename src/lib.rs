//! Docvault Core Library
//!
//! Client core for a document vault whose bytes live in an external blob
//! store: concurrent uploads with progress and cancellation, short-lived
//! download/preview links, and ranked full-text search, all wrapped in a
//! request client that identifies, classifies and reports failures.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Request client, typed errors, session, rate-limit advisories
//! - [`transfer`] - Single streamed multipart upload with cancellation
//! - [`upload`] - Concurrent upload registry, validation, duplicate handling
//! - [`files`] - File listing, deletion, text probe, and link resolution
//! - [`search`] - Keyset-paginated search, cursor stack, snippet sanitizing
//! - [`config`] - Client configuration defaults

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod files;
pub mod search;
pub mod transfer;
pub mod upload;
mod user_agent;

// Re-export commonly used types
pub use api::{
    ApiClient, ApiError, ApiErrorKind, ApiResponse, ChannelNotifier, ClientEvent, ClientNotifier,
    NoopNotifier, RateLimitAdvisory, Session,
};
pub use config::ClientConfig;
pub use files::{FileCatalog, FilePage, FileReference, FilesApi, LinkKind, LinkResolver, ResolvedLink};
pub use search::{SearchCursor, SearchEngine, SearchPage, SearchPager, SearchResult};
pub use transfer::{TransferEngine, TransferError, TransferProgress, UploadHandle, UploadPayload};
pub use upload::{
    DuplicateAction, SubmitOptions, SubmitOutcome, TaskId, UploadError, UploadErrorKind,
    UploadEvent, UploadOrchestrator, UploadState, UploadTask,
};
