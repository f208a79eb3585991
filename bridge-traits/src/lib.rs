//! # Host Bridge Traits
//!
//! Capability contracts between the storage core and its host application.
//!
//! ## Overview
//!
//! This crate defines every injection point the core needs from the outside
//! world. The core never talks to the network, the credential store, or the
//! system browser directly — it goes through these traits, which the host
//! (or `bridge-desktop`) implements.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP round trips plus streaming downloads
//!
//! ### Credentials & Persistence
//! - [`SecureStore`](storage::SecureStore) - Encrypted secret persistence (Keychain/DPAPI/Secret Service)
//! - [`TokenStorage`](storage::TokenStorage) - The injected load/save port for OAuth tokens
//!
//! ### Provider Surface
//! - [`StorageAdapter`](storage::StorageAdapter) - The per-provider capability set consumed
//!   by the transfer engine and the client facade
//! - [`AdapterFactory`](storage::AdapterFactory) - Constructs an authenticated adapter
//!
//! ### Platform Integration
//! - [`BrowserLauncher`](platform::BrowserLauncher) - Opens the authorize URL in the system browser
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform-specific failures into it and keep the original
//! message — the core surfaces response bodies verbatim to callers.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod platform;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use platform::BrowserLauncher;
pub use storage::{
    AccountInfo, AdapterFactory, RemoteEntry, SecureStore, StorageAdapter, TokenStorage,
    UploadDestination,
};
