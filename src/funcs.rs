//! Template function map.
//!
//! Functions are invoked from templates as `{{ name arg1 arg2 }}`. A
//! function either returns a plain value, which the renderer HTML-escapes
//! on output, or pre-built HTML emitted raw (the asset-tag helpers and
//! `tojson`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Result of a template function call.
pub enum FuncReturn {
    /// A plain value; escaped when interpolated.
    Value(Value),
    /// Markup emitted without escaping.
    Html(String),
}

pub type TemplateFunc = Arc<dyn Fn(&[Value]) -> Result<FuncReturn, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FuncMap {
    funcs: HashMap<String, TemplateFunc>,
}

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in function set. `timestamp` is appended to `js`/`css`
    /// asset URLs as a cache-busting query string.
    pub fn defaults(timestamp: i64) -> Self {
        let mut map = Self::new();

        map.insert("add", |args| {
            Ok(FuncReturn::Value(Value::from(
                int_arg(args, 0) + int_arg(args, 1),
            )))
        });
        map.insert("sub", |args| {
            Ok(FuncReturn::Value(Value::from(
                int_arg(args, 0) - int_arg(args, 1),
            )))
        });
        map.insert("mul", |args| {
            Ok(FuncReturn::Value(Value::from(
                int_arg(args, 0) * int_arg(args, 1),
            )))
        });
        map.insert("inc", |args| {
            Ok(FuncReturn::Value(Value::from(int_arg(args, 0) + 1)))
        });
        map.insert("eq", |args| {
            Ok(FuncReturn::Value(Value::Bool(args.first() == args.get(1))))
        });
        map.insert("ne", |args| {
            Ok(FuncReturn::Value(Value::Bool(args.first() != args.get(1))))
        });

        map.insert("tojson", |args| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            serde_json::to_string(&value)
                .map(FuncReturn::Html)
                .map_err(|e| format!("tojson: {}", e))
        });

        map.insert("js", move |args| {
            let file = asset_url(str_arg(args, 0), "/js/");
            Ok(FuncReturn::Html(format!(
                "<script src='{}?{}'></script>",
                file, timestamp
            )))
        });
        map.insert("css", move |args| {
            let file = asset_url(str_arg(args, 0), "/css/");
            Ok(FuncReturn::Html(format!(
                "<link href='{}?{}' rel='stylesheet'>",
                file, timestamp
            )))
        });
        map.insert("staticjs", |args| {
            let file = asset_url(str_arg(args, 0), "/js/");
            Ok(FuncReturn::Html(format!("<script src='{}'></script>", file)))
        });
        map.insert("staticcss", |args| {
            let file = asset_url(str_arg(args, 0), "/css/");
            Ok(FuncReturn::Html(format!(
                "<link href='{}' rel='stylesheet'>",
                file
            )))
        });

        // Translation lookup; replaced by the app with a table-backed
        // version when translations are configured.
        map.insert("T", |args| {
            Ok(FuncReturn::Value(Value::String(str_arg(args, 0).to_string())))
        });

        map
    }

    pub fn insert<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<FuncReturn, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.to_string(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunc> {
        self.funcs.get(name)
    }

    /// Install a table-backed `T`. Unknown tokens echo back unchanged.
    pub fn set_translations(&mut self, translations: HashMap<String, String>) {
        let table = Arc::new(translations);
        self.insert("T", move |args| {
            let token = str_arg(args, 0);
            let text = table
                .get(token)
                .cloned()
                .unwrap_or_else(|| token.to_string());
            Ok(FuncReturn::Value(Value::String(text)))
        });
    }
}

fn int_arg(args: &[Value], i: usize) -> i64 {
    args.get(i).and_then(Value::as_i64).unwrap_or(0)
}

fn str_arg(args: &[Value], i: usize) -> &str {
    args.get(i).and_then(Value::as_str).unwrap_or("")
}

/// Prefix a bare filename with the asset directory; URLs containing `//`
/// pass through untouched.
fn asset_url(file: &str, prefix: &str) -> String {
    if file.contains("//") {
        file.to_string()
    } else {
        format!("{}{}", prefix, file)
    }
}
