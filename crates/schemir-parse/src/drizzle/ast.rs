//! TypeScript syntax tree, reduced to the expressions Drizzle schemas use:
//! calls, member access, object and array literals, arrow functions, and
//! tagged templates.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Str(String),
    Number(String),
    Bool(bool),
    Null,
    Ident(String),
    /// `object.property` (also `object?.property`)
    Member(Box<Expr>, String),
    Call(Call),
    Object(Vec<Property>),
    Array(Vec<Expr>),
    Arrow(Arrow),
    /// `` tag`text` ``, interpolations kept as written
    Template {
        tag: Option<Box<Expr>>,
        text: String,
    },
    /// Parsed but not modeled (`a + b`, `new Date()`, `x[0]`, ...)
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    /// Byte offset of the callee
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Property {
    Pair(String, Expr),
    /// `...expr`
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arrow {
    /// Parameter names; destructured parameters contribute their bindings
    pub params: Vec<String>,
    /// The expression body, or the `return` value of a block body
    pub body: Box<Expr>,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    /// `const name = init` (also `let`/`var`, with or without `export`)
    Decl { name: String, init: Expr },
    Expr(Expr),
}

/// One `.method(args)` step of a builder chain, innermost first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link<'e> {
    pub method: &'e str,
    pub args: &'e [Expr],
    pub offset: usize,
}

impl Expr {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            Expr::Template { tag: None, text } if !text.contains("${") => Some(text),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    /// `key: value` lookup in an object literal; the last entry wins.
    pub fn get(&self, key: &str) -> Option<&Expr> {
        match self {
            Expr::Object(props) => props.iter().rev().find_map(|prop| match prop {
                Property::Pair(k, v) if k == key => Some(v),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Flatten `base(args).a(..).b(..)` into links, innermost first, along
    /// with the receiver of the base call (`t` in `t.integer()`).
    pub fn chain(&self) -> Option<(Option<&Expr>, Vec<Link<'_>>)> {
        let call = self.as_call()?;
        match call.callee.as_ref() {
            Expr::Ident(method) => Some((
                None,
                vec![Link {
                    method,
                    args: &call.args,
                    offset: call.offset,
                }],
            )),
            Expr::Member(object, method) => {
                let link = Link {
                    method,
                    args: &call.args,
                    offset: call.offset,
                };
                match object.chain() {
                    Some((receiver, mut links)) => {
                        links.push(link);
                        Some((receiver, links))
                    }
                    None => Some((Some(object.as_ref()), vec![link])),
                }
            }
            _ => None,
        }
    }
}
