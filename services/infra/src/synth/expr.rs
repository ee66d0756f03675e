//! Deferred Expressions
//!
//! Attribute values are a tree of literals and references. Nothing is
//! evaluated here: references turn into Terraform interpolations and
//! function calls into `${fn(...)}` strings, which the engine resolves
//! at apply time.

use serde_json::{Map, Value};

use super::types::{Reference, Result};

/// An attribute value in a Terraform block
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A plain JSON value
    Literal(Value),
    /// Read of another block's attribute
    Ref(Reference),
    /// Terraform function call
    Call(String, Vec<Expr>),
    /// Ordered list
    List(Vec<Expr>),
    /// Object with keys in insertion order
    Object(Vec<(String, Expr)>),
    /// Structured value handed over as a YAML document
    Yaml(Box<Expr>),
}

impl Expr {
    /// An empty object (`{}`)
    pub fn empty_object() -> Self {
        Expr::Object(Vec::new())
    }

    /// Encode `value` as a YAML document when rendered
    pub fn yaml(value: impl Into<Expr>) -> Self {
        Expr::Yaml(Box::new(value.into()))
    }

    /// Render to the JSON form Terraform reads.
    ///
    /// `resolve` maps a reference to the expression that reads it from the
    /// stack being rendered.
    pub fn render<F>(&self, resolve: &F) -> Result<Value>
    where
        F: Fn(&Reference) -> String,
    {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ref(reference) => Ok(Value::String(format!("${{{}}}", resolve(reference)))),
            Expr::Call(..) => Ok(Value::String(format!("${{{}}}", self.hcl(resolve)?))),
            Expr::List(items) => items
                .iter()
                .map(|item| item.render(resolve))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.render(resolve)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Yaml(inner) => {
                let value = inner.render(resolve)?;
                Ok(Value::String(serde_yaml::to_string(&value)?))
            }
        }
    }

    /// Render as a bare HCL expression, for use inside an interpolation
    fn hcl<F>(&self, resolve: &F) -> Result<String>
    where
        F: Fn(&Reference) -> String,
    {
        match self {
            Expr::Literal(Value::String(s)) => Ok(serde_json::to_string(s)?),
            Expr::Literal(value) => Ok(value.to_string()),
            Expr::Ref(reference) => Ok(resolve(reference)),
            Expr::Call(function, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.hcl(resolve))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{}({})", function, args.join(", ")))
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| item.hcl(resolve))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("[{}]", items.join(", ")))
            }
            Expr::Object(entries) => {
                let mut fields = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    fields.push(format!("{} = {}", serde_json::to_string(key)?, value.hcl(resolve)?));
                }
                Ok(format!("{{{}}}", fields.join(", ")))
            }
            Expr::Yaml(inner) => {
                let document = serde_yaml::to_string(&inner.render(resolve)?)?;
                Ok(serde_json::to_string(&document)?)
            }
        }
    }

    /// Every reference in the tree, depth first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ref(reference) => out.push(reference),
            Expr::Call(_, items) | Expr::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Expr::Object(entries) => {
                for (_, value) in entries {
                    value.collect_references(out);
                }
            }
            Expr::Yaml(inner) => inner.collect_references(out),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Value::String(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(Value::Bool(value))
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl From<Reference> for Expr {
    fn from(value: Reference) -> Self {
        Expr::Ref(value)
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::List(items.into_iter().map(Into::into).collect())
    }
}

/// Builder for object expressions
///
/// Keys keep the order they were first set in; setting a key again
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs(Vec<(String, Expr)>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    /// Set an attribute only when a value is present
    pub fn set_opt<V: Into<Expr>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn build(self) -> Expr {
        Expr::Object(self.0)
    }
}

impl From<Attrs> for Expr {
    fn from(attrs: Attrs) -> Self {
        attrs.build()
    }
}

/// Terraform built-in functions
pub mod functions {
    use super::Expr;

    /// `base64decode(value)`
    pub fn base64decode(value: impl Into<Expr>) -> Expr {
        Expr::Call("base64decode".to_string(), vec![value.into()])
    }
}
