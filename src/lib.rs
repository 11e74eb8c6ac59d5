//! Convention-driven MVC web core.
//!
//! `gantry` resolves the controller and action for a request purely from
//! the URL path and HTTP verb, binds untyped string parameters into typed
//! action arguments, and renders views written in a compact directive
//! language that is transpiled into a native `{{ ... }}` template engine.
//!
//! The pieces:
//! - [`action`]: path + verb → action name resolution
//! - [`binder`]: positional string-to-typed argument binding, `form_struct!`
//! - [`controller`] / [`dispatch`]: controller traits, action tables and
//!   the per-request lifecycle (hooks, verb guard, abort)
//! - [`template`]: directive transpiler, native engine and caching render
//!   engine
//! - [`app`]: the application object tying routing, dispatch and rendering
//!   together, with a socket-free [`App::handle`](app::App::handle)
//! - [`serve`]: the hyper front-end and worker pool

pub mod action;
pub mod app;
pub mod binder;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod funcs;
pub mod registry;
pub mod router;
pub mod serve;
pub mod template;
pub mod util;

pub use app::{App, AppBuilder};
pub use binder::{param, Args, FormField, FormMap, FromForm, ParamKind, ParamMap, ParamSpec};
pub use config::{AssetLoader, Config};
pub use context::{Context, RequestParts, ResponseParts};
pub use controller::{Controller, ControllerSet};
pub use error::{RouteError, TemplateError};
pub use funcs::{FuncMap, FuncReturn};
pub use registry::ActionRegistry;
pub use router::{RouteMatch, Router};
pub use template::RenderEngine;
