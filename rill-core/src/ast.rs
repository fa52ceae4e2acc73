//! Syntax tree for Rill.
//!
//! The parser produces this tree with spans populated and no
//! resolutions or types attached. The resolver fills `Ident::res`,
//! the type checker fills `Expr::ty` and `TypeExpr::ty`; neither pass
//! changes the shape.

use crate::span::Span;
use crate::types::Ty;

/// A whole compilation unit: an ordered sequence of items. Declaration
/// order defines the item index used by resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

/// A top-level function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Stable identity assigned at construction; used for
    /// cross-references, not for resolution order.
    pub id: u32,
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeExpr>,
    pub body: Expr,
    pub span: Span,
}

impl Item {
    /// The item's semantic signature, once the checker has attached
    /// types: parameter types plus the written or inferred result.
    pub fn signature(&self) -> Option<Ty> {
        let params = self
            .params
            .iter()
            .map(|param| param.ty.ty.clone())
            .collect::<Option<Vec<_>>>()?;
        let result = match &self.return_ty {
            Some(annotation) => annotation.ty.clone()?,
            None => self.body.ty.clone()?,
        };
        Some(Ty::func(params, result))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// An identifier occurrence. `res` is `None` until the resolver runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
    pub res: Option<Resolution>,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Ident {
        Ident {
            name: name.into(),
            span,
            res: None,
        }
    }
}

/// What an identifier refers to once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// De Bruijn index: 0 is the innermost enclosing binding.
    Local(u32),
    /// Index into the top-level item sequence, in declaration order.
    Item(u32),
    /// Name from the fixed builtin table.
    Builtin(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Semantic type, filled by the checker.
    pub ty: Option<Ty>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr {
            kind,
            span,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// The unit value `()`.
    Empty,
    Int(i32),
    Str(String),
    Var(Ident),
    /// `let name [: ty] = rhs in body`; the scope of `name` is exactly
    /// `body`.
    Let {
        name: Ident,
        ty: Option<TypeExpr>,
        rhs: Box<Expr>,
        body: Box<Expr>,
    },
    /// `{ e1; e2; ... }`; the value is the last element's value. Lets
    /// inside a block are desugared by the parser into nested `Let`
    /// nodes, so block elements never introduce bindings themselves.
    Block(Vec<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
}

/// A written (syntactic) type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    /// Resolved semantic type, filled by the checker.
    pub ty: Option<Ty>,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> TypeExpr {
        TypeExpr {
            kind,
            span,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Named(Ident),
    List(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Typing class of a binary operator: determines required operand and
/// result types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Int operands, Int result.
    Arithmetic,
    /// Operands unify with each other, Bool result.
    Comparison,
    /// Operands unify with each other, Bool result.
    Equality,
    /// Bool operands, Bool result.
    Logical,
}

impl BinOp {
    pub fn class(self) -> OpClass {
        match self {
            BinOp::Or | BinOp::And => OpClass::Logical,
            BinOp::Eq | BinOp::Ne => OpClass::Equality,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => OpClass::Comparison,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => OpClass::Arithmetic,
        }
    }

    /// Total precedence order used by the parser; higher binds tighter.
    /// Stable across passes.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

/// Unary operators: `!` requires and produces Bool, `-` requires and
/// produces Int.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Not => "!",
            UnOp::Neg => "-",
        }
    }
}
