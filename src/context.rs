//! Per-request context.
//!
//! A `Context` is owned by exactly one worker for the lifetime of a
//! request. Response output is buffered; nothing reaches the wire until
//! the dispatcher extracts the finished `ResponseParts`. Once `abort` is
//! set, every later write is a no-op.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::binder::{FormMap, ParamMap};
use crate::template::RenderEngine;
use crate::util::strip_verb_suffix;

// Ten days, the cookie lifetime on set.
const COOKIE_MAX_AGE_SECS: u64 = 10 * 24 * 60 * 60;

/// The transport-independent pieces of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    /// Request path, without the query string.
    pub path: String,
    /// HTTP verb, uppercase.
    pub verb: String,
    /// Decoded query-string parameters.
    pub params: ParamMap,
    /// Decoded urlencoded body fields.
    pub form: FormMap,
    /// Headers with lowercased names.
    pub headers: HashMap<String, String>,
}

impl RequestParts {
    pub fn get(path: &str) -> Self {
        Self {
            path: path.to_string(),
            verb: "GET".to_string(),
            ..Self::default()
        }
    }

    pub fn post(path: &str) -> Self {
        Self {
            path: path.to_string(),
            verb: "POST".to_string(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_form_field(mut self, name: &str, value: &str) -> Self {
        self.form.insert(name, value);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn xhr(self) -> Self {
        self.with_header("x-requested-with", "XMLHttpRequest")
    }
}

/// The buffered response handed back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: String::new(),
        }
    }
}

impl ResponseParts {
    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            slot.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }
}

/// Per-request state threaded through the dispatch pipeline.
pub struct Context {
    pub path: String,
    pub verb: String,
    pub controller_name: String,
    pub action_name: String,
    pub params: ParamMap,
    pub form: FormMap,
    /// Substituted for the layout's `$TITLE` placeholder.
    pub page_title: String,
    aborted: bool,
    xhr: bool,
    cookies_in: HashMap<String, String>,
    response: ResponseParts,
    engine: Option<Arc<RenderEngine>>,
}

impl Context {
    pub fn new(request: RequestParts, controller_name: String, action_name: String) -> Self {
        let xhr = request
            .headers
            .get("x-requested-with")
            .map(|v| v == "XMLHttpRequest")
            .unwrap_or(false);
        let cookies_in = request
            .headers
            .get("cookie")
            .map(|raw| parse_cookies(raw))
            .unwrap_or_default();
        Self {
            path: request.path,
            verb: request.verb,
            controller_name,
            action_name,
            params: request.params,
            form: request.form,
            page_title: String::new(),
            aborted: false,
            xhr,
            cookies_in,
            response: ResponseParts::default(),
            engine: None,
        }
    }

    /// Attach the render engine consulted by [`Context::view`]. Wired by
    /// the dispatcher before any hook or action runs.
    pub fn set_engine(&mut self, engine: Arc<RenderEngine>) {
        self.engine = Some(engine);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_xhr(&self) -> bool {
        self.xhr
    }

    /// Stop all further response output for this request.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn set_title(&mut self, title: &str) {
        self.page_title = title.to_string();
    }

    pub fn set_status(&mut self, status: u16) {
        if !self.aborted {
            self.response.status = status;
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        if !self.aborted {
            self.response.set_header("Content-Type", content_type);
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        if !self.aborted {
            self.response.set_header(name, value);
        }
    }

    /// Append `text` and a newline to the body.
    pub fn say(&mut self, text: &str) {
        if !self.aborted {
            self.response.body.push_str(text);
            self.response.body.push('\n');
        }
    }

    /// Append `text` to the body as-is.
    pub fn write(&mut self, text: &str) {
        if !self.aborted {
            self.response.body.push_str(text);
        }
    }

    /// 302 to `location` and stop further output.
    pub fn redirect(&mut self, location: &str) {
        if self.aborted {
            return;
        }
        self.response.status = 302;
        self.response.set_header("Location", location);
        self.aborted = true;
    }

    /// `{"Model": ..., "Status": "OK"}` with JSON content type.
    pub fn return_json<T: Serialize>(&mut self, model: &T) {
        let envelope = json!({ "Model": model, "Status": "OK" });
        self.write_json(&envelope);
    }

    /// `{"ErrorMsg": ..., "Status": "FAIL"}` with JSON content type.
    pub fn return_json_fail(&mut self, message: &str) {
        let envelope = json!({ "ErrorMsg": message, "Status": "FAIL" });
        self.write_json(&envelope);
    }

    /// `{"RedirectUrl": ..., "Status": "OK"}`, for clients that navigate
    /// from script.
    pub fn json_redirect(&mut self, url: &str) {
        let envelope = json!({ "RedirectUrl": url, "Status": "OK" });
        self.write_json(&envelope);
    }

    fn write_json(&mut self, envelope: &serde_json::Value) {
        if self.aborted {
            return;
        }
        self.response.set_header("Content-Type", "application/json");
        self.response.body.push_str(&envelope.to_string());
    }

    /// Inbound cookie value, if the client sent one.
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies_in.get(name).map(String::as_str)
    }

    /// Set a cookie with a ten-day lifetime.
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        if !self.aborted {
            self.response.headers.push((
                "Set-Cookie".to_string(),
                format!("{}={}; Path=/; Max-Age={}", name, value, COOKIE_MAX_AGE_SECS),
            ));
        }
    }

    /// Expire a cookie immediately.
    pub fn delete_cookie(&mut self, name: &str) {
        if !self.aborted {
            self.response.headers.push((
                "Set-Cookie".to_string(),
                format!("{}=; Path=/; Max-Age=0", name),
            ));
        }
    }

    /// Render the conventional view for the current action,
    /// `{Controller}/{Action}.html`, against `data`. Errors are logged and
    /// echoed into the body only when the engine runs in dev mode.
    pub fn view(&mut self, data: &serde_json::Value) {
        if self.aborted {
            return;
        }
        let Some(engine) = self.engine.clone() else {
            eprintln!("{}", "view called without a render engine".red());
            return;
        };
        let action = strip_verb_suffix(&self.action_name);
        let logical = format!("{}/{}.html", self.controller_name, action);
        match engine.render_view(&logical, &self.page_title, data, self.xhr) {
            Ok(html) => self.response.body.push_str(&html),
            Err(err) => {
                eprintln!("{} {}", "template error:".red(), err);
                if engine.is_dev() {
                    self.response.body.push_str(&err.to_string());
                }
            }
        }
    }

    /// Extract the finished response. The context must not be written to
    /// afterwards; the dispatcher enforces this by dropping it.
    pub fn finish(&mut self) -> ResponseParts {
        mem::take(&mut self.response)
    }
}

fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funcs::FuncMap;
    use crate::template::RenderEngine;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context::new(
            RequestParts::get("/"),
            "Home".to_string(),
            "Index".to_string(),
        )
    }

    #[test]
    fn default_response_is_html_ok() {
        let mut c = ctx();
        let resp = c.finish();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("Content-Type"), Some("text/html"));
        assert_eq!(resp.body, "");
    }

    #[test]
    fn say_appends_newline_and_write_does_not() {
        let mut c = ctx();
        c.say("a");
        c.write("b");
        assert_eq!(c.finish().body, "a\nb");
    }

    #[test]
    fn redirect_sets_location_and_aborts() {
        let mut c = ctx();
        c.redirect("/Home/Login");
        c.say("never seen");
        let resp = c.finish();
        assert_eq!(resp.status, 302);
        assert_eq!(resp.header("Location"), Some("/Home/Login"));
        assert_eq!(resp.body, "");
    }

    #[test]
    fn json_envelopes() {
        let mut c = ctx();
        c.return_json(&serde_json::json!({"id": 1}));
        let resp = c.finish();
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(v["Status"], "OK");
        assert_eq!(v["Model"]["id"], 1);

        let mut c = ctx();
        c.return_json_fail("nope");
        let v: serde_json::Value = serde_json::from_str(&c.finish().body).unwrap();
        assert_eq!(v["Status"], "FAIL");
        assert_eq!(v["ErrorMsg"], "nope");

        let mut c = ctx();
        c.json_redirect("/next");
        let v: serde_json::Value = serde_json::from_str(&c.finish().body).unwrap();
        assert_eq!(v["Status"], "OK");
        assert_eq!(v["RedirectUrl"], "/next");
    }

    #[test]
    fn abort_suppresses_all_writes() {
        let mut c = ctx();
        c.abort();
        c.say("a");
        c.write("b");
        c.return_json(&1);
        c.set_status(500);
        c.set_cookie("k", "v");
        let resp = c.finish();
        assert_eq!(resp, ResponseParts::default());
    }

    #[test]
    fn cookie_round_trip() {
        let request = RequestParts::get("/").with_header("cookie", "a=1; session=xyz");
        let mut c = Context::new(request, "Home".to_string(), "Index".to_string());
        assert_eq!(c.get_cookie("a"), Some("1"));
        assert_eq!(c.get_cookie("session"), Some("xyz"));
        assert_eq!(c.get_cookie("missing"), None);

        c.set_cookie("name", "val");
        c.delete_cookie("old");
        let resp = c.finish();
        let cookies: Vec<&str> = resp
            .headers
            .iter()
            .filter(|(n, _)| n == "Set-Cookie")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(
            cookies,
            vec![
                "name=val; Path=/; Max-Age=864000",
                "old=; Path=/; Max-Age=0"
            ]
        );
    }

    // A view whose conditional never closes, so compilation always fails.
    fn broken_view_engine(dev: bool) -> (TempDir, Arc<RenderEngine>) {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("layout.html"), "$BODY").expect("layout");
        fs::create_dir_all(dir.path().join("Home")).expect("mkdir");
        fs::write(dir.path().join("Home/Index.html"), "@if .X\nnever closed").expect("view");
        let engine = Arc::new(RenderEngine::new(
            dir.path().to_path_buf(),
            dev,
            None,
            Arc::new(FuncMap::defaults(0)),
        ));
        (dir, engine)
    }

    #[test]
    fn dev_mode_echoes_template_errors_into_the_body() {
        let (_dir, engine) = broken_view_engine(true);
        let mut c = ctx();
        c.set_engine(engine);
        c.view(&serde_json::json!({}));
        let body = c.finish().body;
        assert!(body.contains("failed to parse template"), "{}", body);
    }

    #[test]
    fn production_leaves_the_response_untouched_on_template_errors() {
        let (_dir, engine) = broken_view_engine(false);
        let mut c = ctx();
        c.set_engine(engine);
        c.write("before");
        c.view(&serde_json::json!({}));
        let resp = c.finish();
        assert_eq!(resp.body, "before");
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn xhr_detection() {
        let c = Context::new(
            RequestParts::get("/").xhr(),
            "Home".to_string(),
            "Index".to_string(),
        );
        assert!(c.is_xhr());
        assert!(!ctx().is_xhr());
    }
}
