//! System Browser Launcher

use bridge_traits::{
    error::{BridgeError, Result},
    platform::BrowserLauncher,
};
use tracing::info;

/// Opens URLs in the user's default browser via the `webbrowser` crate.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        info!("Opening browser for authorization");
        webbrowser::open(url)
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to open browser: {}", e)))
    }
}
