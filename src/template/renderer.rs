//! Renderer for compiled templates.
//!
//! Templates render against a JSON value, "the dot". `range` rebinds the
//! dot to each element, so nested blocks always evaluate paths relative to
//! the innermost binding. Output expressions are HTML-escaped unless the
//! function that produced them returned pre-built markup.

use serde_json::Value;

use super::parser::{CompiledTemplate, Expr, TemplateNode};
use crate::funcs::{FuncMap, FuncReturn};

/// Result of evaluating an expression: a plain value to escape, or markup
/// to emit raw.
enum Evaluated {
    Value(Value),
    Html(String),
}

/// Render a compiled template against `data`.
pub fn render_template(
    template: &CompiledTemplate,
    data: &Value,
    funcs: &FuncMap,
) -> Result<String, String> {
    let mut out = String::new();
    render_nodes(&template.nodes, data, template, funcs, &mut out)?;
    Ok(out)
}

fn render_nodes(
    nodes: &[TemplateNode],
    dot: &Value,
    template: &CompiledTemplate,
    funcs: &FuncMap,
    out: &mut String,
) -> Result<(), String> {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => out.push_str(text),
            TemplateNode::Output(expr) => match evaluate(expr, dot, funcs)? {
                Evaluated::Html(html) => out.push_str(&html),
                Evaluated::Value(value) => out.push_str(&html_escape(&value_to_string(&value))),
            },
            TemplateNode::If {
                condition,
                body,
                else_body,
            } => {
                let cond = match evaluate(condition, dot, funcs)? {
                    Evaluated::Value(v) => is_truthy(&v),
                    Evaluated::Html(h) => !h.is_empty(),
                };
                if cond {
                    render_nodes(body, dot, template, funcs, out)?;
                } else if let Some(else_nodes) = else_body {
                    render_nodes(else_nodes, dot, template, funcs, out)?;
                }
            }
            TemplateNode::Range { iterable, body } => {
                let value = match evaluate(iterable, dot, funcs)? {
                    Evaluated::Value(v) => v,
                    Evaluated::Html(_) => {
                        return Err("range expects a value, not markup".to_string())
                    }
                };
                match value {
                    Value::Array(items) => {
                        for item in &items {
                            render_nodes(body, item, template, funcs, out)?;
                        }
                    }
                    Value::Null => {}
                    other => {
                        return Err(format!(
                            "range expects an array, got {}",
                            type_name(&other)
                        ))
                    }
                }
            }
            TemplateNode::Invoke(name) => {
                let body = template
                    .defines
                    .get(name)
                    .ok_or_else(|| format!("undefined template '{}'", name))?;
                render_nodes(body, dot, template, funcs, out)?;
            }
        }
    }
    Ok(())
}

fn evaluate(expr: &Expr, dot: &Value, funcs: &FuncMap) -> Result<Evaluated, String> {
    match expr {
        Expr::Dot => Ok(Evaluated::Value(dot.clone())),
        Expr::Path(segments) => {
            let mut current = dot;
            for segment in segments {
                current = match current.get(segment) {
                    Some(v) => v,
                    None => return Ok(Evaluated::Value(Value::Null)),
                };
            }
            Ok(Evaluated::Value(current.clone()))
        }
        Expr::StrLit(s) => Ok(Evaluated::Value(Value::String(s.clone()))),
        Expr::IntLit(n) => Ok(Evaluated::Value(Value::from(*n))),
        Expr::FloatLit(f) => Ok(Evaluated::Value(Value::from(*f))),
        Expr::BoolLit(b) => Ok(Evaluated::Value(Value::Bool(*b))),
        Expr::Call(name, arg_exprs) => {
            let func = funcs
                .get(name)
                .ok_or_else(|| format!("unknown template function '{}'", name))?;
            let mut args = Vec::with_capacity(arg_exprs.len());
            for arg in arg_exprs {
                match evaluate(arg, dot, funcs)? {
                    Evaluated::Value(v) => args.push(v),
                    Evaluated::Html(h) => args.push(Value::String(h)),
                }
            }
            match func(&args)? {
                FuncReturn::Value(v) => Ok(Evaluated::Value(v)),
                FuncReturn::Html(h) => Ok(Evaluated::Html(h)),
            }
        }
    }
}

/// Truthiness matches what templates expect: null, false, zero, the empty
/// string, and empty collections are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
