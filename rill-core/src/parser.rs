//! Parser for Rill.
//!
//! Recursive descent over the token stream. The output tree has a
//! span on every node and no resolutions or types populated; item ids
//! are assigned sequentially here and stay stable through every later
//! pass.
//!
//! A `let` inside a block may omit `in`; its continuation is then the
//! rest of the block, so `{ let x = 1; x }` parses to the same shape
//! as `let x = 1 in x`. A trailing block `let` gets a unit
//! continuation.

use crate::ast::{
    BinOp, Expr, ExprKind, Ident, Item, Param, Program, TypeExpr, TypeExprKind, UnOp,
};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};
use crate::span::Span;

pub fn parse(source: &str) -> Result<Program, CoreError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        next_item_id: 0,
    };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_item_id: u32,
}

impl Parser {
    fn parse_program(&mut self) -> Result<Program, CoreError> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            items.push(self.parse_item()?);
        }
        Ok(Program { items })
    }

    fn parse_item(&mut self) -> Result<Item, CoreError> {
        let start = self.expect(&TokenKind::Function, "`function`")?;
        let name = self.parse_ident()?;
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let param_name = self.parse_ident()?;
                self.expect(&TokenKind::Colon, "`:`")?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        let return_ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Equal, "`=`")?;
        let body = self.parse_expr()?;

        let id = self.next_item_id;
        self.next_item_id += 1;
        let span = start.merge(body.span);
        Ok(Item {
            id,
            name,
            params,
            return_ty,
            body,
            span,
        })
    }

    // ----- types -------------------------------------------------

    fn parse_type(&mut self) -> Result<TypeExpr, CoreError> {
        let token = self.advance("a type")?;
        match token.kind {
            TokenKind::Ident(name) => {
                let span = token.span;
                Ok(TypeExpr::new(
                    TypeExprKind::Named(Ident::new(name, span)),
                    span,
                ))
            }
            TokenKind::LBracket => {
                let elem = self.parse_type()?;
                let end = self.expect(&TokenKind::RBracket, "`]`")?;
                let span = token.span.merge(end);
                Ok(TypeExpr::new(TypeExprKind::List(Box::new(elem)), span))
            }
            TokenKind::LParen => {
                let mut elems = Vec::new();
                if !self.at(&TokenKind::RParen) {
                    loop {
                        elems.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(&TokenKind::RParen, "`)`")?;
                let span = token.span.merge(end);
                Ok(TypeExpr::new(TypeExprKind::Tuple(elems), span))
            }
            other => Err(self.unexpected(&other, token.span, "a type")),
        }
    }

    // ----- expressions -------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, CoreError> {
        match self.peek_kind() {
            Some(TokenKind::Let) => self.parse_let(),
            Some(TokenKind::If) => self.parse_if(),
            _ => self.parse_binary(1),
        }
    }

    /// `let name [: ty] = rhs in body`.
    fn parse_let(&mut self) -> Result<Expr, CoreError> {
        let start = self.expect(&TokenKind::Let, "`let`")?;
        let (name, ty, rhs) = self.parse_let_header()?;
        self.expect(&TokenKind::In, "`in`")?;
        let body = self.parse_expr()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Let {
                name,
                ty,
                rhs: Box::new(rhs),
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_let_header(&mut self) -> Result<(Ident, Option<TypeExpr>, Expr), CoreError> {
        let name = self.parse_ident()?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Equal, "`=`")?;
        let rhs = self.parse_expr()?;
        Ok((name, ty, rhs))
    }

    fn parse_if(&mut self) -> Result<Expr, CoreError> {
        let start = self.expect(&TokenKind::If, "`if`")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Then, "`then`")?;
        let then_branch = self.parse_expr()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|e| e.span)
            .unwrap_or(then_branch.span);
        let span = start.merge(end);
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ))
    }

    /// Precedence climbing; all binary operators are left-associative.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CoreError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek_binop() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CoreError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => Some(UnOp::Not),
            Some(TokenKind::Minus) => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance("an operator")?.span;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CoreError> {
        let mut expr = self.parse_primary()?;
        while self.at(&TokenKind::LParen) {
            self.pos += 1;
            let mut args = Vec::new();
            if !self.at(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            let end = self.expect(&TokenKind::RParen, "`)`")?;
            let span = expr.span.merge(end);
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CoreError> {
        let token = self.advance("an expression")?;
        match token.kind {
            TokenKind::Int(value) => Ok(Expr::new(ExprKind::Int(value), token.span)),
            TokenKind::Str(value) => Ok(Expr::new(ExprKind::Str(value), token.span)),
            TokenKind::Ident(name) => {
                let span = token.span;
                Ok(Expr::new(ExprKind::Var(Ident::new(name, span)), span))
            }
            TokenKind::LParen => {
                if self.at(&TokenKind::RParen) {
                    let end = self.expect(&TokenKind::RParen, "`)`")?;
                    return Ok(Expr::new(ExprKind::Empty, token.span.merge(end)));
                }
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBrace => self.parse_block(token.span),
            other => Err(self.unexpected(&other, token.span, "an expression")),
        }
    }

    fn parse_block(&mut self, open: Span) -> Result<Expr, CoreError> {
        let elems = self.parse_block_elems()?;
        let end = self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(Expr::new(ExprKind::Block(elems), open.merge(end)))
    }

    /// Elements of a block up to (not including) the closing brace. A
    /// `let` without `in` captures the remaining elements as its
    /// continuation.
    fn parse_block_elems(&mut self) -> Result<Vec<Expr>, CoreError> {
        let mut elems = Vec::new();
        if self.at(&TokenKind::RBrace) {
            return Ok(elems);
        }
        loop {
            if self.at(&TokenKind::Let) {
                let start = self.expect(&TokenKind::Let, "`let`")?;
                let (name, ty, rhs) = self.parse_let_header()?;
                if self.eat(&TokenKind::In) {
                    // Explicit continuation; an ordinary element.
                    let body = self.parse_expr()?;
                    let span = start.merge(body.span);
                    elems.push(Expr::new(
                        ExprKind::Let {
                            name,
                            ty,
                            rhs: Box::new(rhs),
                            body: Box::new(body),
                        },
                        span,
                    ));
                } else {
                    // Continuation is the rest of the block; this let
                    // is the block's final element.
                    let body = if self.eat(&TokenKind::Semi) && !self.at(&TokenKind::RBrace) {
                        let mut rest = self.parse_block_elems()?;
                        if rest.len() == 1 {
                            rest.pop().expect("rest is non-empty")
                        } else {
                            let span = rest
                                .iter()
                                .map(|e| e.span)
                                .reduce(Span::merge)
                                .unwrap_or(rhs.span);
                            Expr::new(ExprKind::Block(rest), span)
                        }
                    } else {
                        // Trailing let: unit continuation.
                        Expr::new(ExprKind::Empty, rhs.span)
                    };
                    let span = start.merge(body.span);
                    elems.push(Expr::new(
                        ExprKind::Let {
                            name,
                            ty,
                            rhs: Box::new(rhs),
                            body: Box::new(body),
                        },
                        span,
                    ));
                    return Ok(elems);
                }
            } else {
                elems.push(self.parse_expr()?);
            }
            if !self.eat(&TokenKind::Semi) || self.at(&TokenKind::RBrace) {
                return Ok(elems);
            }
        }
    }

    fn parse_ident(&mut self) -> Result<Ident, CoreError> {
        let token = self.advance("an identifier")?;
        match token.kind {
            TokenKind::Ident(name) => Ok(Ident::new(name, token.span)),
            other => Err(self.unexpected(&other, token.span, "an identifier")),
        }
    }

    // ----- token plumbing ----------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek_kind()? {
            TokenKind::OrOr => Some(BinOp::Or),
            TokenKind::AndAnd => Some(BinOp::And),
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::NotEq => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Rem),
            _ => None,
        }
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self, wanted: &str) -> Result<Token, CoreError> {
        match self.tokens.get(self.pos).cloned() {
            Some(token) => {
                self.pos += 1;
                Ok(token)
            }
            None => Err(CoreError::ParseError {
                message: format!("expected {wanted}, found end of input"),
                span: Span::EOF,
            }),
        }
    }

    fn expect(&mut self, kind: &TokenKind, wanted: &str) -> Result<Span, CoreError> {
        match self.peek() {
            Some(token) if token.kind == *kind => {
                let span = token.span;
                self.pos += 1;
                Ok(span)
            }
            Some(token) => Err(CoreError::ParseError {
                message: format!("expected {wanted}, found {:?}", token.kind),
                span: token.span,
            }),
            None => Err(CoreError::ParseError {
                message: format!("expected {wanted}, found end of input"),
                span: Span::EOF,
            }),
        }
    }

    fn unexpected(&self, kind: &TokenKind, span: Span, wanted: &str) -> CoreError {
        CoreError::ParseError {
            message: format!("expected {wanted}, found {kind:?}"),
            span,
        }
    }
}
