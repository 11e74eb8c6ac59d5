//! Template engine: directive transpilation, native parsing, rendering and
//! the compile cache.
//!
//! Views live under the configured views root as
//! `{Controller}/{Action}.html` with the shared layout at `layout.html`.
//! Unless a request is an XHR, the layout's `$BODY` placeholder is replaced
//! with the page source and `$TITLE` with the page title before the
//! combined text is transpiled and compiled once.

pub mod parser;
pub mod renderer;
pub mod transpile;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use colored::Colorize;
use serde_json::Value;

use crate::config::AssetLoader;
use crate::error::TemplateError;
use crate::funcs::FuncMap;
use parser::{parse_template, CompiledTemplate};

const BODY_PLACEHOLDER: &str = "$BODY";
const TITLE_PLACEHOLDER: &str = "$TITLE";
const LAYOUT_FILE: &str = "layout.html";

/// Compiles and renders views, caching compiled templates by logical path.
pub struct RenderEngine {
    views_dir: PathBuf,
    dev: bool,
    asset_loader: Option<AssetLoader>,
    funcs: Arc<FuncMap>,
    cache: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
}

impl RenderEngine {
    pub fn new(
        views_dir: PathBuf,
        dev: bool,
        asset_loader: Option<AssetLoader>,
        funcs: Arc<FuncMap>,
    ) -> Self {
        Self {
            views_dir,
            dev,
            asset_loader,
            funcs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_dev(&self) -> bool {
        self.dev
    }

    /// Render the view at logical path `view` (e.g. `Forum/Topic.html`)
    /// against `data`. Non-XHR requests are wrapped in the layout; XHR
    /// requests get the bare page. The layout's `$TITLE` placeholder is
    /// substituted per request, after rendering, so cached compiles stay
    /// title-agnostic.
    pub fn render_view(
        &self,
        view: &str,
        title: &str,
        data: &Value,
        xhr: bool,
    ) -> Result<String, TemplateError> {
        let template = self.get_or_compile(view, xhr)?;
        let rendered = renderer::render_template(&template, data, &self.funcs)
            .map_err(|reason| TemplateError::exec(view, reason))?;
        Ok(rendered.replace(TITLE_PLACEHOLDER, title))
    }

    /// Fetch the compiled template from the cache, compiling on first use.
    /// Dev mode recompiles every request so edits show up immediately.
    fn get_or_compile(&self, view: &str, xhr: bool) -> Result<Arc<CompiledTemplate>, TemplateError> {
        if self.dev {
            return Ok(Arc::new(self.compile(view, xhr)?));
        }

        // Layout-wrapped and bare compilations of the same view are
        // distinct cache entries.
        let key = if xhr {
            format!("{}#xhr", view)
        } else {
            view.to_string()
        };

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(template) = cache.get(&key) {
                return Ok(Arc::clone(template));
            }
        }

        // Concurrent first requests may each compile; the write lock picks
        // one winner and the losers adopt its entry.
        let compiled = Arc::new(self.compile(view, xhr)?);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let entry = cache.entry(key).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    fn compile(&self, view: &str, xhr: bool) -> Result<CompiledTemplate, TemplateError> {
        let page = self.load_source(view)?;
        let combined = if xhr {
            page
        } else {
            // A missing layout is tolerated: log it and serve the page
            // bare rather than failing the whole render.
            match self.load_source(LAYOUT_FILE) {
                Ok(layout) => layout.replace(BODY_PLACEHOLDER, &page),
                Err(err) => {
                    eprintln!("{} {}", "template:".yellow(), err);
                    page
                }
            }
        };
        let native = transpile::transpile(&combined);
        parse_template(&native).map_err(|reason| TemplateError::parse(view, reason))
    }

    /// Resolve template source. Production tries the packaged-asset loader
    /// first and falls back to disk on any failure; dev always reads disk.
    fn load_source(&self, logical: &str) -> Result<String, TemplateError> {
        if !self.dev {
            if let Some(loader) = &self.asset_loader {
                if let Ok(bytes) = loader(logical) {
                    return String::from_utf8(bytes)
                        .map_err(|e| TemplateError::load(logical, e.to_string()));
                }
            }
        }
        let path = self.views_dir.join(logical);
        fs::read_to_string(&path).map_err(|e| TemplateError::load(logical, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::thread;
    use tempfile::TempDir;

    fn views(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, content).expect("write");
        }
        dir
    }

    fn engine(dir: &TempDir, dev: bool) -> RenderEngine {
        RenderEngine::new(
            dir.path().to_path_buf(),
            dev,
            None,
            Arc::new(FuncMap::defaults(0)),
        )
    }

    #[test]
    fn layout_embeds_body_and_title() {
        let dir = views(&[
            ("layout.html", "<title>$TITLE</title>$BODY"),
            ("Home/Index.html", "Hello @Name"),
        ]);
        let out = engine(&dir, true)
            .render_view("Home/Index.html", "Welcome", &json!({"Name": "Ada"}), false)
            .expect("render");
        assert_eq!(out, "<title>Welcome</title>Hello Ada");
    }

    #[test]
    fn xhr_skips_the_layout() {
        let dir = views(&[
            ("layout.html", "LAYOUT $BODY"),
            ("Home/Index.html", "bare @Name"),
        ]);
        let out = engine(&dir, true)
            .render_view("Home/Index.html", "t", &json!({"Name": "Ada"}), true)
            .expect("render");
        assert_eq!(out, "bare Ada");
    }

    #[test]
    fn production_caches_the_first_compile() {
        let dir = views(&[("layout.html", "$BODY"), ("Home/Index.html", "v1")]);
        let eng = engine(&dir, false);

        let first = eng
            .render_view("Home/Index.html", "", &json!({}), false)
            .expect("render");
        assert_eq!(first, "v1");

        fs::write(dir.path().join("Home/Index.html"), "v2").expect("rewrite");
        let second = eng
            .render_view("Home/Index.html", "", &json!({}), false)
            .expect("render");
        assert_eq!(second, "v1");
    }

    #[test]
    fn dev_mode_recompiles_every_request() {
        let dir = views(&[("layout.html", "$BODY"), ("Home/Index.html", "v1")]);
        let eng = engine(&dir, true);

        assert_eq!(
            eng.render_view("Home/Index.html", "", &json!({}), false)
                .expect("render"),
            "v1"
        );
        fs::write(dir.path().join("Home/Index.html"), "v2").expect("rewrite");
        assert_eq!(
            eng.render_view("Home/Index.html", "", &json!({}), false)
                .expect("render"),
            "v2"
        );
    }

    #[test]
    fn cached_compiles_keep_per_request_titles() {
        let dir = views(&[
            ("layout.html", "<title>$TITLE</title>$BODY"),
            ("Home/Index.html", "body"),
        ]);
        let eng = engine(&dir, false);

        assert_eq!(
            eng.render_view("Home/Index.html", "First Title", &json!({}), false)
                .expect("render"),
            "<title>First Title</title>body"
        );
        // The second request reuses the cached compile but must still get
        // its own title.
        assert_eq!(
            eng.render_view("Home/Index.html", "Second Title", &json!({}), false)
                .expect("render"),
            "<title>Second Title</title>body"
        );
    }

    #[test]
    fn missing_layout_serves_the_bare_page() {
        let dir = views(&[("Home/Index.html", "no chrome @Name")]);
        for dev in [true, false] {
            let out = engine(&dir, dev)
                .render_view("Home/Index.html", "t", &json!({"Name": "Ada"}), false)
                .expect("render");
            assert_eq!(out, "no chrome Ada");
        }
    }

    #[test]
    fn xhr_and_full_page_cache_separately() {
        let dir = views(&[("layout.html", "L:$BODY"), ("Home/Index.html", "page")]);
        let eng = engine(&dir, false);

        assert_eq!(
            eng.render_view("Home/Index.html", "", &json!({}), false)
                .expect("render"),
            "L:page"
        );
        assert_eq!(
            eng.render_view("Home/Index.html", "", &json!({}), true)
                .expect("render"),
            "page"
        );
    }

    #[test]
    fn asset_loader_takes_precedence_in_production() {
        let dir = views(&[("layout.html", "disk $BODY"), ("Home/Index.html", "disk page")]);
        let loader: AssetLoader = Arc::new(|logical: &str| {
            if logical == "Home/Index.html" {
                Ok(b"packed page".to_vec())
            } else {
                Err("not packed".to_string())
            }
        });
        let eng = RenderEngine::new(
            dir.path().to_path_buf(),
            false,
            Some(loader),
            Arc::new(FuncMap::defaults(0)),
        );

        // The page comes from the loader; the layout falls back to disk.
        assert_eq!(
            eng.render_view("Home/Index.html", "", &json!({}), false)
                .expect("render"),
            "disk packed page"
        );
    }

    #[test]
    fn missing_view_is_a_load_error() {
        let dir = views(&[("layout.html", "$BODY")]);
        let err = engine(&dir, true)
            .render_view("Home/Nope.html", "", &json!({}), false)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Load { .. }));
        assert_eq!(err.path(), "Home/Nope.html");
    }

    #[test]
    fn concurrent_first_renders_agree() {
        let dir = views(&[("layout.html", "$BODY"), ("Home/Index.html", "@Name!")]);
        let eng = Arc::new(engine(&dir, false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let eng = Arc::clone(&eng);
                thread::spawn(move || {
                    eng.render_view("Home/Index.html", "", &json!({"Name": "x"}), false)
                        .expect("render")
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("join"), "x!");
        }
    }
}
