//! The application object.
//!
//! An `App` owns everything that is shared across requests: config, the
//! route table, the dispatch table, the action registry and the render
//! engine. There is no global state, so several independent apps can run
//! in one process and tests exercise dispatch without a socket.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use colored::Colorize;

use crate::action::{resolve_action, DEFAULT_CONTROLLER};
use crate::config::Config;
use crate::context::{Context, RequestParts, ResponseParts};
use crate::dispatch::DispatchEntry;
use crate::error::RouteError;
use crate::funcs::{FuncMap, FuncReturn, TemplateFunc};
use crate::registry::ActionRegistry;
use crate::router::Router;
use crate::template::RenderEngine;

/// Collects controllers, routes and template customizations, then builds
/// an [`App`].
#[derive(Default)]
pub struct AppBuilder {
    config: Config,
    entries: Vec<DispatchEntry>,
    routes: Vec<(String, String)>,
    funcs: Vec<(String, TemplateFunc)>,
    translations: Option<HashMap<String, String>>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Register a controller. Its conventional route is added
    /// automatically: `/` for the default controller, `/{controller}/`
    /// otherwise.
    pub fn controller(mut self, entry: impl Into<DispatchEntry>) -> Self {
        self.entries.push(entry.into());
        self
    }

    /// Register an extra route to a controller registered with
    /// [`AppBuilder::controller`]. `{name}` segments become pattern routes
    /// whose variables are merged into the request parameters.
    pub fn route(mut self, path: &str, controller: &str) -> Self {
        self.routes.push((path.to_string(), controller.to_string()));
        self
    }

    /// Register a template function usable as `{{ name args... }}`.
    pub fn func<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<FuncReturn, String> + Send + Sync + 'static,
    {
        self.funcs.push((name.to_string(), Arc::new(f)));
        self
    }

    /// Install the translation table backing `{{ T "token" }}`.
    pub fn translations(mut self, table: HashMap<String, String>) -> Self {
        self.translations = Some(table);
        self
    }

    pub fn build(self) -> Result<App, RouteError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut funcs = FuncMap::defaults(timestamp);
        if let Some(table) = self.translations {
            funcs.set_translations(table);
        }
        for (name, f) in self.funcs {
            funcs.insert(&name, move |args| f(args));
        }

        let mut registry = ActionRegistry::new();
        let mut entries = HashMap::new();
        for entry in self.entries {
            for (action, params) in entry.registry_rows() {
                registry.insert(entry.controller(), action, params.clone());
            }
            entries.insert(entry.controller().to_string(), entry);
        }

        let mut router = Router::new();
        for controller in entries.keys() {
            let path = if controller == DEFAULT_CONTROLLER {
                "/".to_string()
            } else {
                format!("/{}/", controller.to_lowercase())
            };
            router.add(&path, controller)?;
        }
        for (path, controller) in &self.routes {
            if !entries.contains_key(controller) {
                return Err(RouteError::UnknownController {
                    path: path.clone(),
                    controller: controller.clone(),
                });
            }
            router.add(path, controller)?;
        }

        let engine = Arc::new(RenderEngine::new(
            self.config.views_dir.clone(),
            self.config.is_dev,
            self.config.asset_loader.clone(),
            Arc::new(funcs),
        ));

        Ok(App {
            config: self.config,
            router,
            entries,
            registry,
            engine,
        })
    }
}

pub struct App {
    config: Config,
    router: Router,
    entries: HashMap<String, DispatchEntry>,
    registry: ActionRegistry,
    engine: Arc<RenderEngine>,
}

impl App {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parameter-name metadata for the registered actions.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Dispatch one request to a response. In production an unhandled
    /// panic anywhere in the pipeline is recovered into a generic
    /// response; in dev mode it propagates so the failure is visible.
    pub fn handle(&self, request: RequestParts) -> ResponseParts {
        if self.config.is_dev {
            return self.dispatch(request);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(request))) {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(&payload);
                eprintln!("{} {}", "request panicked:".red().bold(), message);
                let mut response = ResponseParts::default();
                response.body = "An error occurred while processing this request.".to_string();
                response
            }
        }
    }

    fn dispatch(&self, request: RequestParts) -> ResponseParts {
        let Some(matched) = self.router.find(&request.path) else {
            return not_found();
        };
        let Some(entry) = self.entries.get(&matched.controller) else {
            return not_found();
        };

        let mut request = request;
        // Route variables overwrite query-string values of the same name.
        request.params.extend(matched.vars);

        let trimmed = request.path.trim_matches('/').to_string();
        let action = resolve_action(&trimmed, &matched.controller, &request.verb);

        let mut ctx = Context::new(request, matched.controller.clone(), action);
        ctx.set_engine(Arc::clone(&self.engine));
        entry.dispatch(ctx, self.config.is_dev)
    }
}

fn not_found() -> ResponseParts {
    let mut response = ResponseParts::default();
    response.status = 404;
    response.body = "404 page not found\n".to_string();
    response
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
