//! Storage client façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, browser,
//! token persistence) together with the authorization flow, the token
//! lifecycle manager, the transfer engine and one provider adapter, and
//! exposes the result as [`CloudClient`] — one uniform operation set over
//! Dropbox, Google Drive, OneDrive and Box.
//!
//! Desktop apps typically enable the `desktop` feature (which depends on
//! `bridge-desktop`) and start from [`ClientDeps::desktop`]:
//!
//! ```ignore
//! use core_service::{ClientDeps, CloudClient};
//! use core_auth::ProviderKind;
//!
//! # async fn example() {
//! let deps = ClientDeps::desktop(ProviderKind::Dropbox);
//! let client = CloudClient::dropbox("app-key", 8400, deps);
//!
//! if !client.init().await.is_success() {
//!     client.login().await;
//! }
//! let listing = client.list_folder(None).await;
//! # }
//! ```

pub mod client;
pub mod error;
pub mod outcome;
pub mod tree;

pub use client::{ClientDeps, CloudClient};
pub use error::{CoreError, Result};
pub use outcome::{OpOutcome, OpStatus};
pub use tree::{FolderTree, NodeIndex, TreeNode};

// The pieces hosts commonly need alongside the facade
pub use bridge_traits::storage::{AccountInfo, RemoteEntry};
pub use core_auth::{FlowState, ProviderKind};
pub use core_runtime::events::{AuthEvent, CoreEvent, EventBus, TransferEvent};
pub use core_transfer::{NullProgress, ProgressSink};
pub use tokio_util::sync::CancellationToken;
