//! Directive-to-native template transpilation.
//!
//! The directive language is rewritten into native `{{ ... }}` syntax by an
//! ordered sequence of whole-text passes. The order is load-bearing:
//! whitespace normalization runs before directive detection because several
//! patterns anchor on newlines, the control-keyword pass must precede the
//! identifier passes, and escaped markers are restored last so they cannot
//! be re-matched as directives.
//!
//! Directives:
//! - `@* comment *@` is stripped
//! - `@t name` invokes the named sub-template
//! - `@.` interpolates the whole current value
//! - `@if expr` / `@else` / `@end` / `@range expr` / `@template` /
//!   `@define` open native control blocks
//! - `@Some.Field` interpolates a field (capitalized identifier)
//! - `@func "arg"` calls a template function (lowercase identifier)
//! - `%token` becomes a translation lookup
//! - `@@` escapes a literal `@`

use std::sync::LazyLock;

use regex::Regex;

// The escaped marker is swapped for a sentinel before any directive pass
// runs and restored in the final pass.
const ESCAPE_SENTINEL: &str = "\u{1}";

static RE_LEADING_TABS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\t+").unwrap());

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)@\*.*?\*@").unwrap());

static RE_SUB_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@t ([a-zA-Z_0-9]+)").unwrap());

static RE_CURRENT_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\.").unwrap());

static RE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(if|else|end|range|template|define)(.*?)\n").unwrap());

static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([A-Z][a-zA-Z.]+)").unwrap());

static RE_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@([a-z][a-zA-Z.]+( "[^"]+")*)"#).unwrap());

static RE_TRANSLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%([a-zA-Z_0-9]+)").unwrap());

/// Rewrite directive-language source into native template syntax.
///
/// Already-native text passes through unchanged: no directive token remains
/// to match, so transpiling transpiled output is a no-op by construction.
pub fn transpile(source: &str) -> String {
    let s = source.replace("@@", ESCAPE_SENTINEL);
    let s = normalize_whitespace(&s);
    let s = RE_COMMENT.replace_all(&s, "");
    let s = RE_SUB_TEMPLATE.replace_all(&s, r#"{{ template "${1}" }}"#);
    let s = RE_CURRENT_VALUE.replace_all(&s, "{{ . }}");
    let s = RE_KEYWORD.replace_all(&s, "{{ ${1}${2} }}\n");
    let s = RE_FIELD.replace_all(&s, "{{.${1}}}");
    let s = RE_FUNC.replace_all(&s, "{{ ${1} }}");
    let s = RE_TRANSLATE.replace_all(&s, r#"{{ T "${1}" }}"#);
    s.replace(ESCAPE_SENTINEL, "@")
}

/// Collapse blank lines and double spaces to a fixed point and strip
/// leading tabs.
fn normalize_whitespace(source: &str) -> String {
    let mut s = source.to_string();
    while s.contains("\n\n") {
        s = s.replace("\n\n", "\n");
    }
    s = RE_LEADING_TABS.replace_all(&s, "").into_owned();
    while s.contains("  ") {
        s = s.replace("  ", " ");
    }
    s
}
