//! Platform integration points that fall outside networking and storage.

use crate::error::Result;

/// Opens a URL in the user's default browser.
///
/// The authorization flow uses this exactly once per login attempt to
/// present the provider's consent page. Opening the browser is a
/// fire-and-forget side effect: the flow does not retry a failed launch and
/// has no way to observe what the user does in the opened tab.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}
