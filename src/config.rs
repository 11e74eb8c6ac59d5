//! Startup configuration. A `Config` is an immutable snapshot taken once,
//! before serving begins.

use std::path::PathBuf;
use std::sync::Arc;

/// Loads a packaged asset by logical path. Used by the render engine in
/// production so that a deployed binary does not need the view source tree.
pub type AssetLoader = Arc<dyn Fn(&str) -> Result<Vec<u8>, String> + Send + Sync>;

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Listen port for the HTTP front-end.
    pub port: u16,

    /// Dev mode trades performance for live template reloads and verbose
    /// diagnostics: the compile cache is bypassed, template errors are
    /// echoed into responses, and panics propagate.
    pub is_dev: bool,

    /// Root of the view source tree. Template paths resolve as
    /// `{views_dir}/{Controller}/{Action}.html`, layout at
    /// `{views_dir}/layout.html`.
    pub views_dir: PathBuf,

    /// Packaged-asset loader tried first in production. Any failure falls
    /// back to reading `views_dir` from disk.
    pub asset_loader: Option<AssetLoader>,

    /// Session cookie name, consumed by the session layer.
    pub session_id: String,

    /// Session signing secret, consumed by the session layer.
    pub session_secret: String,

    /// Worker threads for request handling. Zero means one per core.
    pub workers: usize,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8088,
            is_dev: true,
            views_dir: PathBuf::from("v"),
            asset_loader: None,
            session_id: "gantry_session".to_string(),
            session_secret: String::new(),
            workers: 0,
        }
    }
}
