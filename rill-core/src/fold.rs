//! Tree-rewriting framework shared by every pass.
//!
//! A pass implements `Fold` and overrides only the handlers it cares
//! about; everything else falls through to the `walk_*` defaults,
//! which recurse into each child with the same mechanism and rebuild
//! the node with children replaced. Non-tree fields (spans, literal
//! values, operator tags, attached types) are carried over untouched.
//!
//! Trees are consumed by value and rebuilt: every node a pass returns
//! is a fresh value, so passes compose without aliasing and a
//! discarded output has no side effects. The framework itself holds no
//! state; a pass threads whatever it needs (scope stacks, variable
//! stores) through `&mut self`.
//!
//! The `walk_*` functions match exhaustively, so adding a node kind
//! without deciding its structural default is a compile error.

use crate::ast::{Expr, ExprKind, Ident, Item, Param, Program, TypeExpr, TypeExprKind};
use crate::error::CoreError;

pub trait Fold {
    fn fold_program(&mut self, program: Program) -> Result<Program, CoreError> {
        let items = program
            .items
            .into_iter()
            .map(|item| self.fold_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Program { items })
    }

    fn fold_item(&mut self, item: Item) -> Result<Item, CoreError> {
        walk_item(self, item)
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr, CoreError> {
        walk_expr(self, expr)
    }

    fn fold_type(&mut self, ty: TypeExpr) -> Result<TypeExpr, CoreError> {
        walk_type(self, ty)
    }

    /// Identifiers default to identity: most passes only touch
    /// identifiers in specific positions, not every occurrence.
    fn fold_ident(&mut self, ident: Ident) -> Result<Ident, CoreError> {
        Ok(ident)
    }
}

pub fn walk_item<F: Fold + ?Sized>(f: &mut F, item: Item) -> Result<Item, CoreError> {
    let name = f.fold_ident(item.name)?;
    let params = item
        .params
        .into_iter()
        .map(|param| {
            Ok(Param {
                name: f.fold_ident(param.name)?,
                ty: f.fold_type(param.ty)?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;
    let return_ty = item.return_ty.map(|ty| f.fold_type(ty)).transpose()?;
    let body = f.fold_expr(item.body)?;
    Ok(Item {
        id: item.id,
        name,
        params,
        return_ty,
        body,
        span: item.span,
    })
}

pub fn walk_expr<F: Fold + ?Sized>(f: &mut F, expr: Expr) -> Result<Expr, CoreError> {
    let kind = match expr.kind {
        ExprKind::Empty => ExprKind::Empty,
        ExprKind::Int(value) => ExprKind::Int(value),
        ExprKind::Str(value) => ExprKind::Str(value),
        ExprKind::Var(ident) => ExprKind::Var(f.fold_ident(ident)?),
        ExprKind::Let {
            name,
            ty,
            rhs,
            body,
        } => ExprKind::Let {
            name: f.fold_ident(name)?,
            ty: ty.map(|t| f.fold_type(t)).transpose()?,
            rhs: Box::new(f.fold_expr(*rhs)?),
            body: Box::new(f.fold_expr(*body)?),
        },
        ExprKind::Block(elems) => ExprKind::Block(
            elems
                .into_iter()
                .map(|elem| f.fold_expr(elem))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: Box::new(f.fold_expr(*lhs)?),
            rhs: Box::new(f.fold_expr(*rhs)?),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: Box::new(f.fold_expr(*operand)?),
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: Box::new(f.fold_expr(*callee)?),
            args: args
                .into_iter()
                .map(|arg| f.fold_expr(arg))
                .collect::<Result<Vec<_>, _>>()?,
        },
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => ExprKind::If {
            cond: Box::new(f.fold_expr(*cond)?),
            then_branch: Box::new(f.fold_expr(*then_branch)?),
            else_branch: else_branch
                .map(|branch| Ok::<_, CoreError>(Box::new(f.fold_expr(*branch)?)))
                .transpose()?,
        },
    };
    Ok(Expr {
        kind,
        span: expr.span,
        ty: expr.ty,
    })
}

pub fn walk_type<F: Fold + ?Sized>(f: &mut F, ty: TypeExpr) -> Result<TypeExpr, CoreError> {
    let kind = match ty.kind {
        TypeExprKind::Named(ident) => TypeExprKind::Named(f.fold_ident(ident)?),
        TypeExprKind::List(elem) => TypeExprKind::List(Box::new(f.fold_type(*elem)?)),
        TypeExprKind::Tuple(elems) => TypeExprKind::Tuple(
            elems
                .into_iter()
                .map(|elem| f.fold_type(elem))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(TypeExpr {
        kind,
        span: ty.span,
        ty: ty.ty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct Identity;
    impl Fold for Identity {}

    /// Doubles every integer literal, touching nothing else.
    struct DoubleInts;
    impl Fold for DoubleInts {
        fn fold_expr(&mut self, expr: Expr) -> Result<Expr, CoreError> {
            match expr.kind {
                ExprKind::Int(value) => Ok(Expr {
                    kind: ExprKind::Int(value * 2),
                    span: expr.span,
                    ty: expr.ty,
                }),
                _ => walk_expr(self, expr),
            }
        }
    }

    #[test]
    fn identity_fold_reproduces_the_tree() {
        let program =
            parse("function f(x: Int): Int = let y = x + 1 in if y < 2 then y else f(y - 1)")
                .expect("parse");
        let folded = Identity.fold_program(program.clone()).expect("fold");
        assert_eq!(folded, program);
    }

    #[test]
    fn overridden_handler_rewrites_only_its_node_kind() {
        let program = parse("function f() = 3 + 4").expect("parse");
        let folded = DoubleInts.fold_program(program).expect("fold");
        let body = &folded.items[0].body;
        match &body.kind {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert_eq!(lhs.kind, ExprKind::Int(6));
                assert_eq!(rhs.kind, ExprKind::Int(8));
            }
            other => panic!("unexpected body shape: {other:?}"),
        }
    }

    #[test]
    fn default_recursion_reaches_nested_children() {
        let program = parse("function f() = { 1; g(2, 3 * 4) }").expect("parse");
        let folded = DoubleInts.fold_program(program).expect("fold");
        let rendered = format!("{:?}", folded.items[0].body);
        assert!(rendered.contains("Int(2)"));
        assert!(rendered.contains("Int(4)"));
        assert!(rendered.contains("Int(6)"));
        assert!(rendered.contains("Int(8)"));
    }
}
