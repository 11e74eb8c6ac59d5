//! Positional argument binding.
//!
//! Untyped request strings become typed action arguments without any
//! boilerplate in the action itself. The rules are deliberately permissive:
//! a missing parameter binds the empty string, a malformed number binds
//! zero, and no binding failure is ever surfaced as an error.

use std::collections::HashMap;

use crate::util::decapitalize;

/// Merged query-string and route-variable parameters.
pub type ParamMap = HashMap<String, String>;

/// Declared kind of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    /// The parameter is a form object populated from POST body fields.
    Form,
}

/// Typed metadata for one action parameter, carried by the invocation thunk.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

/// Constructors for [`ParamSpec`], used at action registration time.
pub mod param {
    use super::{ParamKind, ParamSpec};

    pub fn str(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Str,
        }
    }

    pub fn int(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Int,
        }
    }

    pub fn float(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Float,
        }
    }

    pub fn form(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Form,
        }
    }
}

/// POST body fields. Field lookups decapitalize the requested name, so a
/// `Title` field binds the `title` form key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormMap {
    fields: HashMap<String, String>,
}

impl FormMap {
    pub fn from_map(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_string(), value.to_string());
    }

    /// Raw field value; absent fields yield the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    /// Typed field lookup by (decapitalized) field name.
    pub fn field<T: FormField>(&self, name: &str) -> T {
        T::from_field(self.get(&decapitalize(name)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Per-field coercion from a raw form string.
pub trait FormField: Sized {
    fn from_field(raw: &str) -> Self;
}

impl FormField for String {
    fn from_field(raw: &str) -> Self {
        raw.to_string()
    }
}

impl FormField for i64 {
    fn from_field(raw: &str) -> Self {
        raw.parse().unwrap_or(0)
    }
}

impl FormField for f64 {
    fn from_field(raw: &str) -> Self {
        raw.parse().unwrap_or(0.0)
    }
}

/// A form object constructible from submitted fields.
pub trait FromForm: Sized {
    fn from_form(form: &FormMap) -> Self;
}

/// Define a form struct together with its [`FromForm`] binding.
///
/// ```
/// gantry::form_struct! {
///     pub struct TopicForm {
///         pub id: i64,
///         pub title: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! form_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq)]
        $vis struct $name {
            $($fvis $field: $ty),*
        }

        impl $crate::binder::FromForm for $name {
            fn from_form(form: &$crate::binder::FormMap) -> Self {
                Self {
                    $($field: form.field(stringify!($field))),*
                }
            }
        }
    };
}

/// One bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Form(FormMap),
}

/// The bound, ordered argument list handed to an invocation thunk.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<ArgValue>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String argument at `i`; empty for other kinds or out of range.
    pub fn str(&self, i: usize) -> &str {
        match self.values.get(i) {
            Some(ArgValue::Str(s)) => s,
            _ => "",
        }
    }

    /// Integer argument at `i`; zero for other kinds or out of range.
    pub fn int(&self, i: usize) -> i64 {
        match self.values.get(i) {
            Some(ArgValue::Int(n)) => *n,
            _ => 0,
        }
    }

    /// Float argument at `i`; zero for other kinds or out of range.
    pub fn float(&self, i: usize) -> f64 {
        match self.values.get(i) {
            Some(ArgValue::Float(n)) => *n,
            _ => 0.0,
        }
    }

    /// Construct the form object bound at `i`. A non-form argument yields a
    /// struct built from an empty form, all fields at their zero values.
    pub fn form<T: FromForm>(&self, i: usize) -> T {
        match self.values.get(i) {
            Some(ArgValue::Form(map)) => T::from_form(map),
            _ => T::from_form(&FormMap::default()),
        }
    }
}

/// Bind the merged parameter map and form fields to an ordered argument
/// list, coercing each value by its declared kind.
pub fn bind_args(specs: &[ParamSpec], params: &ParamMap, form: &FormMap) -> Args {
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        let raw = params.get(&spec.name).map(String::as_str).unwrap_or("");
        let value = match spec.kind {
            ParamKind::Str => ArgValue::Str(raw.to_string()),
            ParamKind::Int => ArgValue::Int(raw.parse().unwrap_or(0)),
            ParamKind::Float => ArgValue::Float(raw.parse().unwrap_or(0.0)),
            ParamKind::Form => ArgValue::Form(form.clone()),
        };
        values.push(value);
    }
    Args { values }
}
