//! Ruby syntax tree, reduced to what `schema.rb` files are made of:
//! method calls with positional and keyword arguments, blocks, and literals.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Str(String),
    Symbol(String),
    /// Numeric literal text, underscores removed
    Number(String),
    Bool(bool),
    Nil,
    Array(Vec<Expr>),
    Hash(Vec<(String, Expr)>),
    /// `-> { body }`
    Lambda(Vec<Expr>),
    /// `Foo::Bar`
    Const(String),
    Call(Call),
    /// Anything we parsed past but can't represent (`a + b`, `x[1]`, ...)
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub receiver: Option<Box<Expr>>,
    pub method: String,
    pub args: Vec<Expr>,
    /// Trailing `key: value` / `:key => value` pairs
    pub kwargs: Vec<(String, Expr)>,
    pub block: Option<Block>,
    /// Byte offset of the method name
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    pub params: Vec<String>,
    pub body: Vec<Expr>,
}

impl Expr {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Strings and symbols both name things in Rails APIs.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Str(s) | Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Expr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Expr::Number(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Names in a `["a", "b"]` / `"a"` / `:a` argument.
    pub fn as_names(&self) -> Option<Vec<String>> {
        match self {
            Expr::Array(items) => items
                .iter()
                .map(|item| item.as_name().map(str::to_string))
                .collect(),
            other => other.as_name().map(|name| vec![name.to_string()]),
        }
    }

    /// `receiver.method` (or bare `method`) calls
    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }
}

impl Call {
    pub fn kwarg(&self, key: &str) -> Option<&Expr> {
        self.kwargs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether the receiver is the bare local `name` (`t` in `t.string`).
    pub fn has_receiver(&self, name: &str) -> bool {
        matches!(
            self.receiver.as_deref(),
            Some(Expr::Call(Call { receiver: None, method, args, kwargs, block: None, .. }))
                if method == name && args.is_empty() && kwargs.is_empty()
        )
    }
}
