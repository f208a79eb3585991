//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//! - `BrowserLauncher` using the `webbrowser` crate
//! - `TokenStorage` backed by plain files (`FileTokenStorage`) for harness
//!   and test use — production hosts should prefer the keychain-backed
//!   `SecureTokenStorage` from `core-auth`
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SystemBrowser};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let browser = SystemBrowser;
//!
//!     // Inject into the client facade configuration
//! }
//! ```

mod browser;
mod http;
mod token_file;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use browser::SystemBrowser;
pub use http::ReqwestHttpClient;
pub use token_file::FileTokenStorage;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
