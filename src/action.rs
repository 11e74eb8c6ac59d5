//! Convention-based action resolution.
//!
//! The action name is derived purely from the URL path and the HTTP verb:
//! - `""` resolves to `Index`
//! - `"Register"` resolves to `Register`
//! - `"Forum/Topic/Hello-world/234242"` resolves to `Topic` for the `Forum`
//!   controller (segment 0 names the controller, extra segments are left
//!   for argument binding)
//! - non-GET verbs append an `_VERB` suffix, so a form page and its submit
//!   handler can share a path: `Register` vs `Register_POST`

use crate::util::{capitalize, replace_dashes};

/// The distinguished root controller. Its actions are reachable at
/// `/{Action}` rather than `/{Controller}/{Action}`.
pub const DEFAULT_CONTROLLER: &str = "Home";

/// The default read verb. Actions for this verb carry no suffix.
pub const DEFAULT_VERB: &str = "GET";

/// Resolve the action name for a request path and verb.
///
/// `path` must already be stripped of its leading slash.
pub fn resolve_action(path: &str, controller: &str, verb: &str) -> String {
    let action = action_from_path(path, controller);
    if verb.is_empty() || verb == DEFAULT_VERB {
        action
    } else {
        format!("{}_{}", action, verb)
    }
}

fn action_from_path(path: &str, controller: &str) -> String {
    // Root action
    if path.is_empty() {
        return "Index".to_string();
    }

    let values: Vec<&str> = path.trim_matches('/').split('/').collect();
    let mut action = values[0];

    // http://example.com/Controller/Action/Arg1/Arg2
    if values.len() > 1 {
        if controller == DEFAULT_CONTROLLER {
            // The root controller keeps segment 0 as the action; the
            // remaining segments are ignored here.
            action = values[0];
        } else {
            action = values[1];
        }
    } else if action.eq_ignore_ascii_case(controller) {
        // /Action => /Action/Index
        action = "Index";
    }

    // Capitalize and remove unallowed characters
    let action = capitalize(action).replace('.', "");
    replace_dashes(&action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_path_is_index() {
        assert_eq!(resolve_action("", "Home", "GET"), "Index");
    }

    #[test]
    fn single_segment() {
        assert_eq!(resolve_action("Register", "Home", "GET"), "Register");
        assert_eq!(resolve_action("register", "Home", "GET"), "Register");
    }

    #[test]
    fn bare_controller_name_is_index() {
        assert_eq!(resolve_action("Forum", "Forum", "GET"), "Index");
        assert_eq!(resolve_action("forum", "Forum", "GET"), "Index");
    }

    #[test]
    fn forum_topic_extra_segments() {
        // Extra path segments past the action are ignored at this stage for
        // non-root controllers; they feed argument binding instead.
        assert_eq!(
            resolve_action("Forum/Topic/Hello-world/234242", "Forum", "GET"),
            "Topic"
        );
    }

    #[test]
    fn root_controller_keeps_first_segment() {
        // For the root controller the action is segment 0, and everything
        // after it is silently dropped.
        assert_eq!(
            resolve_action("Register/extra/bits", "Home", "GET"),
            "Register"
        );
    }

    #[test]
    fn dots_are_stripped() {
        assert_eq!(resolve_action("favicon.ico", "Home", "GET"), "Faviconico");
    }

    #[test]
    fn dashes_become_camel_case() {
        assert_eq!(resolve_action("view-room", "Home", "GET"), "ViewRoom");
        assert_eq!(resolve_action("view-room-", "Home", "GET"), "ViewRoom");
    }

    #[test]
    fn non_default_verb_appends_suffix() {
        assert_eq!(resolve_action("Register", "Home", "POST"), "Register_POST");
        assert_eq!(resolve_action("", "Home", "POST"), "Index_POST");
        assert_eq!(
            resolve_action("Forum/Topic", "Forum", "DELETE"),
            "Topic_DELETE"
        );
    }
}
