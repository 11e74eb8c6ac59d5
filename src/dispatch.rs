//! The per-request lifecycle.
//!
//! The pipeline runs entirely on the worker thread that owns the request:
//! construct the controller around its context, `before_action`, verb
//! guard, the action itself (or 404), `after_action`, then extract the
//! buffered response. A set `abort` flag skips the action and silences
//! every later write, but both hooks always run.

use colored::Colorize;

use crate::binder::bind_args;
use crate::context::{Context, ResponseParts};
use crate::controller::{Controller, ControllerSet};
use crate::util::verb_suffix_of;

/// A type-erased controller pipeline, held by the app's dispatch table.
pub struct DispatchEntry {
    controller: String,
    registry_rows: Vec<(String, Vec<String>)>,
    run: Box<dyn Fn(Context, bool) -> ResponseParts + Send + Sync>,
}

impl DispatchEntry {
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// `(action, ordered parameter names)` rows for the action registry.
    pub fn registry_rows(&self) -> &[(String, Vec<String>)] {
        &self.registry_rows
    }

    /// Run the full pipeline for one request.
    pub fn dispatch(&self, ctx: Context, dev: bool) -> ResponseParts {
        (self.run)(ctx, dev)
    }
}

impl<C: Controller + 'static> From<ControllerSet<C>> for DispatchEntry {
    fn from(set: ControllerSet<C>) -> Self {
        Self {
            controller: set.name().to_string(),
            registry_rows: set.registry_rows(),
            run: Box::new(move |ctx, dev| run_pipeline(&set, ctx, dev)),
        }
    }
}

/// Drive one request through the lifecycle against a typed controller set.
pub fn run_pipeline<C: Controller>(
    set: &ControllerSet<C>,
    ctx: Context,
    dev: bool,
) -> ResponseParts {
    let mut controller = C::from_ctx(ctx);

    controller.before_action();

    let action = controller.ctx().action_name.clone();

    // A verb-suffixed action is only reachable with its verb.
    let verb_mismatch = match verb_suffix_of(&action) {
        Some(required) => controller.ctx().verb != required,
        None => false,
    };

    if verb_mismatch {
        controller.ctx().set_status(405);
        controller.ctx().say("wrong verb");
    } else if !controller.ctx().is_aborted() {
        match set.find(&action) {
            Some(entry) => {
                let (params, form) = {
                    let c = controller.ctx();
                    (c.params.clone(), c.form.clone())
                };
                let args = bind_args(&entry.specs, &params, &form);
                (entry.invoke)(&mut controller, &args);
            }
            None => {
                let c = controller.ctx();
                c.set_status(404);
                c.say("404 page not found");
                if dev {
                    let note = format!(
                        "no action '{}' registered on controller '{}'",
                        action,
                        set.name()
                    );
                    eprintln!("{} {}", "dispatch:".yellow(), note);
                    c.say(&note);
                }
            }
        }
    }

    controller.after_action();
    controller.ctx().finish()
}
