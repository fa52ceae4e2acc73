//! Deterministic textual rendering of a tree at any stage.
//!
//! The printer is the debugging window into the pipeline and the
//! primary tool for golden-file tests of the resolver and checker.
//! Identifiers render with a resolution suffix once resolved
//! (`x@l0` local, `f@i1` item, `len@b` builtin); semantic types use
//! the fixed grammar from [`crate::types::Ty`]'s `Display`. Two
//! renders of the same tree generation are byte-identical.

use std::fmt::Write;

use crate::ast::{Expr, ExprKind, Ident, Item, Program, Resolution, TypeExpr, TypeExprKind};

pub fn render_program(program: &Program) -> String {
    let mut out = String::new();
    for (index, item) in program.items.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_item(&mut out, item);
    }
    out
}

/// `name: fn(params): result`, available once the checker has run.
pub fn render_signature(item: &Item) -> Option<String> {
    Some(format!("{}: {}", item.name.name, item.signature()?))
}

fn render_item(out: &mut String, item: &Item) {
    let _ = write!(out, "function {}(", render_ident(&item.name));
    for (index, param) in item.params.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: ", param.name.name);
        render_type(out, &param.ty);
    }
    out.push(')');
    if let Some(annotation) = &item.return_ty {
        out.push_str(": ");
        render_type(out, annotation);
    }
    out.push_str(" = ");
    render_expr(out, &item.body);
    out.push('\n');
}

fn render_ident(ident: &Ident) -> String {
    match ident.res {
        None => ident.name.clone(),
        Some(Resolution::Local(index)) => format!("{}@l{index}", ident.name),
        Some(Resolution::Item(index)) => format!("{}@i{index}", ident.name),
        Some(Resolution::Builtin(_)) => format!("{}@b", ident.name),
    }
}

fn render_type(out: &mut String, annotation: &TypeExpr) {
    // Prefer the resolved semantic type; fall back to the written
    // shape before the checker has run.
    if let Some(ty) = &annotation.ty {
        let _ = write!(out, "{ty}");
        return;
    }
    match &annotation.kind {
        TypeExprKind::Named(ident) => out.push_str(&ident.name),
        TypeExprKind::List(elem) => {
            out.push('[');
            render_type(out, elem);
            out.push(']');
        }
        TypeExprKind::Tuple(elems) => {
            out.push('(');
            for (index, elem) in elems.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                render_type(out, elem);
            }
            out.push(')');
        }
    }
}

fn render_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Empty => out.push_str("()"),
        ExprKind::Int(value) => {
            let _ = write!(out, "{value}");
        }
        ExprKind::Str(value) => {
            let _ = write!(out, "{value:?}");
        }
        ExprKind::Var(ident) => out.push_str(&render_ident(ident)),
        ExprKind::Let {
            name,
            ty,
            rhs,
            body,
        } => {
            let _ = write!(out, "let {}", name.name);
            if let Some(annotation) = ty {
                out.push_str(": ");
                render_type(out, annotation);
            }
            out.push_str(" = ");
            render_expr(out, rhs);
            out.push_str(" in ");
            render_expr(out, body);
        }
        ExprKind::Block(elems) => {
            out.push_str("{ ");
            for (index, elem) in elems.iter().enumerate() {
                if index > 0 {
                    out.push_str("; ");
                }
                render_expr(out, elem);
            }
            out.push_str(" }");
        }
        ExprKind::Binary { op, lhs, rhs } => {
            out.push('(');
            render_expr(out, lhs);
            let _ = write!(out, " {} ", op.symbol());
            render_expr(out, rhs);
            out.push(')');
        }
        ExprKind::Unary { op, operand } => {
            out.push_str(op.symbol());
            render_expr(out, operand);
        }
        ExprKind::Call { callee, args } => {
            render_expr(out, callee);
            out.push('(');
            for (index, arg) in args.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                render_expr(out, arg);
            }
            out.push(')');
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str("if ");
            render_expr(out, cond);
            out.push_str(" then ");
            render_expr(out, then_branch);
            if let Some(branch) = else_branch {
                out.push_str(" else ");
                render_expr(out, branch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolve::resolve;
    use crate::typecheck::typecheck;

    #[test]
    fn renders_raw_tree_without_suffixes() {
        let program = parse("function f(x: Int) = x + 1").expect("parse");
        let rendered = render_program(&program);
        assert_eq!(rendered, "function f(x: Int) = (x + 1)\n");
    }

    #[test]
    fn renders_resolution_suffixes() {
        let program =
            resolve(parse("function add(x: Int, y: Int): Int = add(x, y)").expect("parse"))
                .expect("resolve");
        let rendered = render_program(&program);
        assert_eq!(
            rendered,
            "function add@i0(x: Int, y: Int): Int = add@i0(x@l1, y@l0)\n"
        );
    }

    #[test]
    fn renders_builtin_marker_and_blocks() {
        let program =
            resolve(parse("function f(n: Int) = { print_int(n); () }").expect("parse"))
                .expect("resolve");
        let rendered = render_program(&program);
        assert_eq!(
            rendered,
            "function f@i0(n: Int) = { print_int@b(n@l0); () }\n"
        );
    }

    #[test]
    fn renders_checked_signature() {
        let program = typecheck(
            resolve(parse("function f(n: Int) = n < 2").expect("parse")).expect("resolve"),
        )
        .expect("typecheck");
        assert_eq!(
            render_signature(&program.items[0]).as_deref(),
            Some("f: fn(Int): Bool")
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let program = typecheck(
            resolve(
                parse("function f(n: Int): Int = let m = n in if m < 1 then 0 else m")
                    .expect("parse"),
            )
            .expect("resolve"),
        )
        .expect("typecheck");
        assert_eq!(render_program(&program), render_program(&program));
    }
}
