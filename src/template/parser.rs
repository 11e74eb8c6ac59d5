//! Parser for the native `{{ ... }}` template syntax.
//!
//! Tags:
//! - `{{ if expr }}` / `{{ else }}` / `{{ end }}` - conditional block
//! - `{{ range expr }}` / `{{ end }}` - iteration, rebinding the dot
//! - `{{ define "name" }}` / `{{ end }}` - named sub-template declaration
//! - `{{ template "name" }}` - named sub-template invocation
//! - anything else - an output expression

use std::collections::HashMap;

/// Pre-compiled expression for fast evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The current value: `.`
    Dot,
    /// Field path relative to the dot: `.User.Email`
    Path(Vec<String>),
    /// String literal: "hello"
    StrLit(String),
    /// Integer literal: 42
    IntLit(i64),
    /// Float literal: 3.14
    FloatLit(f64),
    /// Boolean literal: true/false
    BoolLit(bool),
    /// Function call: `name arg1 arg2`
    Call(String, Vec<Expr>),
}

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Raw text content
    Literal(String),
    /// Output expression
    Output(Expr),
    /// Conditional block
    If {
        condition: Expr,
        body: Vec<TemplateNode>,
        else_body: Option<Vec<TemplateNode>>,
    },
    /// Iteration block; the dot is rebound to each element
    Range {
        iterable: Expr,
        body: Vec<TemplateNode>,
    },
    /// Named sub-template invocation
    Invoke(String),
}

/// A compiled template: the top-level nodes plus any `define`d
/// sub-templates collected during parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledTemplate {
    pub nodes: Vec<TemplateNode>,
    pub defines: HashMap<String, Vec<TemplateNode>>,
}

/// Token types during lexing
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Tag(String),
}

/// Parse native template source into a compiled template.
pub fn parse_template(source: &str) -> Result<CompiledTemplate, String> {
    let tokens = tokenize(source)?;
    let mut tpl = CompiledTemplate::default();
    let mut pos = 0;
    let (nodes, stop) = parse_nodes(&tokens, &mut pos, &mut tpl.defines, false)?;
    match stop {
        Stop::Eof => {
            tpl.nodes = nodes;
            Ok(tpl)
        }
        Stop::End => Err("unexpected {{ end }} outside a block".to_string()),
        Stop::Else => Err("unexpected {{ else }} outside an if block".to_string()),
    }
}

/// Tokenize the source into literal runs and `{{ ... }}` tag contents.
fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next(); // consume second '{'

            if !current_literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut current_literal)));
            }

            // Read until closing }}
            let mut tag_content = String::new();
            loop {
                match chars.next() {
                    Some('}') if chars.peek() == Some(&'}') => {
                        chars.next(); // consume second '}'
                        break;
                    }
                    Some(ch) => tag_content.push(ch),
                    None => return Err("unclosed template tag".to_string()),
                }
            }

            tokens.push(Token::Tag(tag_content.trim().to_string()));
        } else {
            current_literal.push(c);
        }
    }

    if !current_literal.is_empty() {
        tokens.push(Token::Literal(current_literal));
    }

    Ok(tokens)
}

/// Why a node sequence stopped.
enum Stop {
    End,
    Else,
    Eof,
}

fn parse_nodes(
    tokens: &[Token],
    pos: &mut usize,
    defines: &mut HashMap<String, Vec<TemplateNode>>,
    inside_block: bool,
) -> Result<(Vec<TemplateNode>, Stop), String> {
    let mut nodes = Vec::new();

    while *pos < tokens.len() {
        let token = &tokens[*pos];
        *pos += 1;

        match token {
            Token::Literal(text) => nodes.push(TemplateNode::Literal(text.clone())),
            Token::Tag(content) => {
                if content == "end" {
                    return Ok((nodes, Stop::End));
                }
                if content == "else" {
                    return Ok((nodes, Stop::Else));
                }

                if let Some(rest) = content.strip_prefix("if ") {
                    let condition = parse_expr(rest)?;
                    let (body, stop) = parse_nodes(tokens, pos, defines, true)?;
                    let else_body = match stop {
                        Stop::End => None,
                        Stop::Else => {
                            let (else_nodes, stop) = parse_nodes(tokens, pos, defines, true)?;
                            match stop {
                                Stop::End => Some(else_nodes),
                                _ => return Err("if block missing {{ end }}".to_string()),
                            }
                        }
                        Stop::Eof => return Err("if block missing {{ end }}".to_string()),
                    };
                    nodes.push(TemplateNode::If {
                        condition,
                        body,
                        else_body,
                    });
                } else if let Some(rest) = content.strip_prefix("range ") {
                    let iterable = parse_expr(rest)?;
                    let (body, stop) = parse_nodes(tokens, pos, defines, true)?;
                    match stop {
                        Stop::End => nodes.push(TemplateNode::Range { iterable, body }),
                        _ => return Err("range block missing {{ end }}".to_string()),
                    }
                } else if let Some(rest) = content.strip_prefix("define ") {
                    let name = parse_quoted_name(rest, "define")?;
                    let (body, stop) = parse_nodes(tokens, pos, defines, true)?;
                    match stop {
                        Stop::End => {
                            defines.insert(name, body);
                        }
                        _ => return Err("define block missing {{ end }}".to_string()),
                    }
                } else if let Some(rest) = content.strip_prefix("template ") {
                    let name = parse_quoted_name(rest, "template")?;
                    nodes.push(TemplateNode::Invoke(name));
                } else {
                    nodes.push(TemplateNode::Output(parse_expr(content)?));
                }
            }
        }
    }

    if inside_block {
        Err("block missing {{ end }}".to_string())
    } else {
        Ok((nodes, Stop::Eof))
    }
}

/// Parse the quoted name argument of `define`/`template`.
fn parse_quoted_name(src: &str, keyword: &str) -> Result<String, String> {
    let src = src.trim();
    let inner = src
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("{} expects a quoted name, got '{}'", keyword, src))?;
    if inner.is_empty() {
        return Err(format!("{} name must not be empty", keyword));
    }
    Ok(inner.to_string())
}

/// Parse an expression: a single atom, or a function call with
/// space-separated atom arguments.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let words = split_words(src)?;
    if words.is_empty() {
        return Err("empty expression".to_string());
    }

    // An identifier in head position is a function call; everything else
    // must be a lone atom.
    if let Word::Bare(name) = &words[0] {
        if !name.starts_with('.') && !is_literal(name) {
            let args = words[1..]
                .iter()
                .map(parse_atom)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Expr::Call(name.clone(), args));
        }
    }

    if words.len() > 1 {
        return Err(format!("unexpected arguments in expression '{}'", src));
    }
    parse_atom(&words[0])
}

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Bare(String),
    Quoted(String),
}

/// Split an expression into whitespace-separated words, keeping quoted
/// strings intact.
fn split_words(src: &str) -> Result<Vec<Word>, String> {
    let mut words = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => s.push(ch),
                    None => return Err(format!("unterminated string in expression '{}'", src)),
                }
            }
            words.push(Word::Quoted(s));
        } else {
            let mut s = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                s.push(ch);
                chars.next();
            }
            words.push(Word::Bare(s));
        }
    }

    Ok(words)
}

fn is_literal(word: &str) -> bool {
    word == "true" || word == "false" || word.parse::<i64>().is_ok() || word.parse::<f64>().is_ok()
}

fn parse_atom(word: &Word) -> Result<Expr, String> {
    match word {
        Word::Quoted(s) => Ok(Expr::StrLit(s.clone())),
        Word::Bare(s) => {
            if s == "." {
                return Ok(Expr::Dot);
            }
            if let Some(path) = s.strip_prefix('.') {
                let segments: Vec<String> = path
                    .split('.')
                    .filter(|seg| !seg.is_empty())
                    .map(str::to_string)
                    .collect();
                if segments.is_empty() {
                    return Ok(Expr::Dot);
                }
                return Ok(Expr::Path(segments));
            }
            if s == "true" {
                return Ok(Expr::BoolLit(true));
            }
            if s == "false" {
                return Ok(Expr::BoolLit(false));
            }
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Expr::IntLit(n));
            }
            if let Ok(f) = s.parse::<f64>() {
                return Ok(Expr::FloatLit(f));
            }
            // A bare identifier in argument position is a zero-argument
            // function call.
            Ok(Expr::Call(s.clone(), Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_only() {
        let tpl = parse_template("plain text").unwrap();
        assert_eq!(tpl.nodes, vec![TemplateNode::Literal("plain text".into())]);
    }

    #[test]
    fn field_output() {
        let tpl = parse_template("{{.User.Email}}").unwrap();
        assert_eq!(
            tpl.nodes,
            vec![TemplateNode::Output(Expr::Path(vec![
                "User".into(),
                "Email".into()
            ]))]
        );
    }

    #[test]
    fn dot_output() {
        let tpl = parse_template("{{ . }}").unwrap();
        assert_eq!(tpl.nodes, vec![TemplateNode::Output(Expr::Dot)]);
    }

    #[test]
    fn if_else_end() {
        let tpl = parse_template("{{ if .Ok }}yes{{ else }}no{{ end }}").unwrap();
        assert_eq!(
            tpl.nodes,
            vec![TemplateNode::If {
                condition: Expr::Path(vec!["Ok".into()]),
                body: vec![TemplateNode::Literal("yes".into())],
                else_body: Some(vec![TemplateNode::Literal("no".into())]),
            }]
        );
    }

    #[test]
    fn range_block() {
        let tpl = parse_template("{{ range .Posts }}{{ . }}{{ end }}").unwrap();
        assert_eq!(
            tpl.nodes,
            vec![TemplateNode::Range {
                iterable: Expr::Path(vec!["Posts".into()]),
                body: vec![TemplateNode::Output(Expr::Dot)],
            }]
        );
    }

    #[test]
    fn function_call_with_mixed_args() {
        let tpl = parse_template(r#"{{ add .Count 1 }}"#).unwrap();
        assert_eq!(
            tpl.nodes,
            vec![TemplateNode::Output(Expr::Call(
                "add".into(),
                vec![Expr::Path(vec!["Count".into()]), Expr::IntLit(1)]
            ))]
        );
    }

    #[test]
    fn translation_call() {
        let tpl = parse_template(r#"{{ T "welcome_msg" }}"#).unwrap();
        assert_eq!(
            tpl.nodes,
            vec![TemplateNode::Output(Expr::Call(
                "T".into(),
                vec![Expr::StrLit("welcome_msg".into())]
            ))]
        );
    }

    #[test]
    fn define_and_invoke() {
        let tpl =
            parse_template(r#"{{ define "header" }}<h1>hi</h1>{{ end }}{{ template "header" }}"#)
                .unwrap();
        assert_eq!(
            tpl.defines.get("header"),
            Some(&vec![TemplateNode::Literal("<h1>hi</h1>".into())])
        );
        assert_eq!(tpl.nodes, vec![TemplateNode::Invoke("header".into())]);
    }

    #[test]
    fn unclosed_tag_is_an_error() {
        assert!(parse_template("{{ if .X ").is_err());
    }

    #[test]
    fn missing_end_is_an_error() {
        assert!(parse_template("{{ if .X }}body").is_err());
        assert!(parse_template("{{ range .X }}body").is_err());
    }

    #[test]
    fn stray_end_is_an_error() {
        assert!(parse_template("{{ end }}").is_err());
    }
}
