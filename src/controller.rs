//! Controllers and their action tables.
//!
//! A controller is an ordinary struct owning the request [`Context`];
//! actions are plain methods. Registration builds a [`ControllerSet`]
//! mapping each action name to its parameter metadata and an invocation
//! thunk, so dispatch needs no runtime inspection of the controller type.

use crate::binder::{Args, ParamSpec};
use crate::context::Context;

/// Implemented by every controller struct.
///
/// `before_action` and `after_action` are optional hooks with no-op
/// defaults; `before_action` typically authenticates and may `abort` or
/// `redirect`, which suppresses the action itself.
pub trait Controller: Send {
    fn from_ctx(ctx: Context) -> Self;

    /// The request context this controller owns.
    fn ctx(&mut self) -> &mut Context;

    fn before_action(&mut self) {}

    fn after_action(&mut self) {}
}

/// One registered action: its name, its parameter metadata in binding
/// order, and the thunk that calls the method with bound arguments.
pub struct ActionEntry<C> {
    pub name: String,
    pub specs: Vec<ParamSpec>,
    pub invoke: Box<dyn Fn(&mut C, &Args) + Send + Sync>,
}

/// A controller's registered actions, keyed by resolved action name
/// (verb-suffixed names like `Add_POST` included).
pub struct ControllerSet<C: Controller> {
    name: String,
    actions: Vec<ActionEntry<C>>,
}

impl<C: Controller> ControllerSet<C> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            actions: Vec::new(),
        }
    }

    /// Register an action. `specs` must list parameters in the order the
    /// thunk reads them from [`Args`].
    pub fn action<F>(mut self, name: &str, specs: Vec<ParamSpec>, invoke: F) -> Self
    where
        F: Fn(&mut C, &Args) + Send + Sync + 'static,
    {
        self.actions.push(ActionEntry {
            name: name.to_string(),
            specs,
            invoke: Box::new(invoke),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find(&self, action: &str) -> Option<&ActionEntry<C>> {
        self.actions.iter().find(|entry| entry.name == action)
    }

    /// `(action, ordered parameter names)` rows for the action registry.
    pub fn registry_rows(&self) -> Vec<(String, Vec<String>)> {
        self.actions
            .iter()
            .map(|entry| {
                (
                    entry.name.clone(),
                    entry.specs.iter().map(|s| s.name.clone()).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::param;
    use crate::context::RequestParts;

    struct Echo {
        ctx: Context,
    }

    impl Controller for Echo {
        fn from_ctx(ctx: Context) -> Self {
            Self { ctx }
        }

        fn ctx(&mut self) -> &mut Context {
            &mut self.ctx
        }
    }

    #[test]
    fn registered_actions_are_found_by_name() {
        let set = ControllerSet::<Echo>::new("Home")
            .action("Index", vec![], |c, _| c.ctx().say("index"))
            .action("Register", vec![param::str("name")], |c, args| {
                let name = args.str(0).to_string();
                c.ctx().say(&name);
            });

        assert_eq!(set.name(), "Home");
        assert!(set.find("Index").is_some());
        assert!(set.find("Register").is_some());
        assert!(set.find("Missing").is_none());
    }

    #[test]
    fn registry_rows_preserve_parameter_order() {
        let set = ControllerSet::<Echo>::new("Home").action(
            "Register",
            vec![param::str("name"), param::int("age")],
            |_, _| {},
        );
        assert_eq!(
            set.registry_rows(),
            vec![(
                "Register".to_string(),
                vec!["name".to_string(), "age".to_string()]
            )]
        );
    }

    #[test]
    fn thunks_receive_bound_arguments() {
        let set = ControllerSet::<Echo>::new("Home").action(
            "Greet",
            vec![param::str("name")],
            |c, args| {
                let name = args.str(0).to_string();
                c.ctx().write(&name);
            },
        );

        let mut controller = Echo::from_ctx(Context::new(
            RequestParts::get("/Greet"),
            "Home".to_string(),
            "Greet".to_string(),
        ));
        let entry = set.find("Greet").unwrap();
        let args = crate::binder::bind_args(
            &entry.specs,
            &[("name".to_string(), "Ada".to_string())].into_iter().collect(),
            &Default::default(),
        );
        (entry.invoke)(&mut controller, &args);
        assert_eq!(controller.ctx().finish().body, "Ada");
    }
}
