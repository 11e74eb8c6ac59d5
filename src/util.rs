//! Name-mangling helpers shared by the resolver, binder and render engine.

/// Capitalize a string: 'test' => 'Test'.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The opposite of `capitalize`: 'Test' => 'test'.
pub fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// hello-world => helloWorld. A trailing unmatched dash is dropped.
pub fn replace_dashes(action: &str) -> String {
    if !action.contains('-') {
        return action.to_string();
    }
    let mut res = String::with_capacity(action.len());
    let mut upper_next = false;
    for ch in action.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            res.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            res.push(ch);
        }
    }
    res
}

/// Verbs that may appear as an `_VERB` suffix on an action name. GET is the
/// default read verb and never suffixes.
const SUFFIX_VERBS: [&str; 4] = ["POST", "PUT", "DELETE", "PATCH"];

/// Return the verb carried by an action name's `_VERB` suffix, if any.
pub fn verb_suffix_of(action: &str) -> Option<&str> {
    match action.rsplit_once('_') {
        Some((_, verb)) if SUFFIX_VERBS.contains(&verb) => Some(verb),
        _ => None,
    }
}

/// Strip an `_VERB` suffix: 'Register_POST' => 'Register'.
pub fn strip_verb_suffix(action: &str) -> &str {
    match action.rsplit_once('_') {
        Some((base, verb)) if SUFFIX_VERBS.contains(&verb) => base,
        _ => action,
    }
}
