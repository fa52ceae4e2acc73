//! Name resolution.
//!
//! Rewrites the raw tree into one of identical shape where every
//! identifier reference carries a `Resolution`: a De Bruijn local
//! index, a top-level item index, or a builtin tag. Binding
//! occurrences (item names, parameter names, `let` names) stay
//! untagged; they declare, they do not refer. The one exception is the
//! item name itself, tagged with its own item index for the printer.
//!
//! Scoping rules:
//! - a `let`'s RHS is resolved in the outer scope (no self-visibility);
//! - parameters are pushed in declaration order before the body, so
//!   the last-declared parameter has index 0;
//! - all item names are registered before any body is resolved, so
//!   plain recursion needs no forward declaration.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, Ident, Item, Program, Resolution, TypeExpr, TypeExprKind};
use crate::builtins;
use crate::error::CoreError;
use crate::fold::{Fold, walk_expr, walk_type};

/// Resolve every identifier in `program`, or fail on the first
/// identifier that matches no local, item, or builtin.
pub fn resolve(program: Program) -> Result<Program, CoreError> {
    let mut items = HashMap::new();
    for (index, item) in program.items.iter().enumerate() {
        // Duplicates: the later declaration wins; still deterministic.
        items.insert(item.name.name.clone(), index as u32);
    }
    let mut resolver = Resolver {
        items,
        locals: Vec::new(),
        next_item: 0,
    };
    resolver.fold_program(program)
}

struct Resolver {
    /// Item name → declaration index, built once up front.
    items: HashMap<String, u32>,
    /// Stack of local binding names, innermost last.
    locals: Vec<String>,
    next_item: u32,
}

impl Resolver {
    fn resolve_value(&self, ident: Ident) -> Result<Ident, CoreError> {
        // Innermost binding first: the index is the distance from the
        // top of the stack.
        if let Some(pos) = self.locals.iter().rposition(|name| *name == ident.name) {
            let index = (self.locals.len() - 1 - pos) as u32;
            return Ok(Ident {
                res: Some(Resolution::Local(index)),
                ..ident
            });
        }
        if let Some(&index) = self.items.get(&ident.name) {
            return Ok(Ident {
                res: Some(Resolution::Item(index)),
                ..ident
            });
        }
        if let Some(descriptor) = builtins::find_builtin(&ident.name) {
            return Ok(Ident {
                res: Some(Resolution::Builtin(descriptor.name)),
                ..ident
            });
        }
        Err(CoreError::UnresolvedName {
            name: ident.name,
            span: ident.span,
        })
    }

    fn resolve_type_name(&self, ident: Ident) -> Result<Ident, CoreError> {
        if let Some(name) = builtins::builtin_name(&ident.name)
            && builtins::TYPE_NAMES.contains(&name)
        {
            return Ok(Ident {
                res: Some(Resolution::Builtin(name)),
                ..ident
            });
        }
        if let Some(&index) = self.items.get(&ident.name) {
            return Ok(Ident {
                res: Some(Resolution::Item(index)),
                ..ident
            });
        }
        Err(CoreError::UnresolvedName {
            name: ident.name,
            span: ident.span,
        })
    }
}

impl Fold for Resolver {
    fn fold_item(&mut self, item: Item) -> Result<Item, CoreError> {
        let index = self.next_item;
        self.next_item += 1;

        let name = Ident {
            res: Some(Resolution::Item(index)),
            ..item.name
        };
        let params = item
            .params
            .into_iter()
            .map(|param| {
                Ok(crate::ast::Param {
                    name: param.name,
                    ty: self.fold_type(param.ty)?,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        let return_ty = item.return_ty.map(|ty| self.fold_type(ty)).transpose()?;

        // Arguments are locals of the body, pushed in declaration
        // order.
        self.locals.clear();
        for param in &params {
            self.locals.push(param.name.name.clone());
        }
        let body = self.fold_expr(item.body)?;
        self.locals.clear();

        Ok(Item {
            id: item.id,
            name,
            params,
            return_ty,
            body,
            span: item.span,
        })
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr, CoreError> {
        match expr.kind {
            ExprKind::Var(ident) => Ok(Expr {
                kind: ExprKind::Var(self.resolve_value(ident)?),
                span: expr.span,
                ty: expr.ty,
            }),
            ExprKind::Let {
                name,
                ty,
                rhs,
                body,
            } => {
                // RHS sees the outer scope only.
                let rhs = self.fold_expr(*rhs)?;
                let ty = ty.map(|t| self.fold_type(t)).transpose()?;
                self.locals.push(name.name.clone());
                let body = self.fold_expr(*body);
                self.locals.pop();
                Ok(Expr {
                    kind: ExprKind::Let {
                        name,
                        ty,
                        rhs: Box::new(rhs),
                        body: Box::new(body?),
                    },
                    span: expr.span,
                    ty: expr.ty,
                })
            }
            _ => walk_expr(self, expr),
        }
    }

    fn fold_type(&mut self, ty: TypeExpr) -> Result<TypeExpr, CoreError> {
        match ty.kind {
            TypeExprKind::Named(ident) => Ok(TypeExpr {
                kind: TypeExprKind::Named(self.resolve_type_name(ident)?),
                span: ty.span,
                ty: ty.ty,
            }),
            _ => walk_type(self, ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolved(source: &str) -> Program {
        resolve(parse(source).expect("parse")).expect("resolve")
    }

    fn body_var(program: &Program, item: usize) -> Resolution {
        fn find(expr: &Expr) -> Option<Resolution> {
            match &expr.kind {
                ExprKind::Var(ident) => ident.res,
                ExprKind::Let { body, .. } => find(body),
                _ => None,
            }
        }
        find(&program.items[item].body).expect("body ends in a variable")
    }

    #[test]
    fn inner_binding_has_index_zero() {
        let program = resolved("function f() = let a = 1 in let b = 2 in b");
        assert_eq!(body_var(&program, 0), Resolution::Local(0));
    }

    #[test]
    fn outer_binding_counts_enclosing_lets() {
        let program = resolved("function f() = let a = 1 in let b = 2 in a");
        assert_eq!(body_var(&program, 0), Resolution::Local(1));
    }

    #[test]
    fn arguments_are_pushed_in_declaration_order() {
        let program = resolved("function add(x: Int, y: Int): Int = x + y");
        let ExprKind::Binary { lhs, rhs, .. } = &program.items[0].body.kind else {
            panic!("expected binary body");
        };
        let ExprKind::Var(x) = &lhs.kind else {
            panic!("expected variable");
        };
        let ExprKind::Var(y) = &rhs.kind else {
            panic!("expected variable");
        };
        assert_eq!(x.res, Some(Resolution::Local(1)));
        assert_eq!(y.res, Some(Resolution::Local(0)));
    }

    #[test]
    fn let_rhs_is_resolved_in_the_outer_scope() {
        // The `x` in the RHS refers to the parameter, not the binding
        // being introduced.
        let program = resolved("function f(x: Int): Int = let x = x + 1 in x");
        let ExprKind::Let { rhs, .. } = &program.items[0].body.kind else {
            panic!("expected let body");
        };
        let ExprKind::Binary { lhs, .. } = &rhs.kind else {
            panic!("expected binary rhs");
        };
        let ExprKind::Var(x) = &lhs.kind else {
            panic!("expected variable");
        };
        assert_eq!(x.res, Some(Resolution::Local(0)));
    }

    #[test]
    fn items_resolve_by_declaration_index_and_allow_recursion() {
        let program = resolved(
            "function even(n: Int): Int = odd(n - 1) function odd(n: Int): Int = even(n - 1)",
        );
        let ExprKind::Call { callee, .. } = &program.items[0].body.kind else {
            panic!("expected call");
        };
        let ExprKind::Var(odd) = &callee.kind else {
            panic!("expected callee variable");
        };
        assert_eq!(odd.res, Some(Resolution::Item(1)));
    }

    #[test]
    fn unknown_names_fall_through_to_builtins() {
        let program = resolved("function f(n: Int) = print_int(n)");
        let ExprKind::Call { callee, .. } = &program.items[0].body.kind else {
            panic!("expected call");
        };
        let ExprKind::Var(ident) = &callee.kind else {
            panic!("expected callee variable");
        };
        assert_eq!(ident.res, Some(Resolution::Builtin("print_int")));
    }

    #[test]
    fn locals_shadow_items_and_builtins() {
        let program = resolved("function len() = 0 function f() = let len = 1 in len");
        assert_eq!(body_var(&program, 1), Resolution::Local(0));
    }

    #[test]
    fn primitive_type_names_resolve_as_builtins() {
        let program = resolved("function f(x: Int): Int = x");
        let TypeExprKind::Named(ident) = &program.items[0].params[0].ty.kind else {
            panic!("expected named type");
        };
        assert_eq!(ident.res, Some(Resolution::Builtin("Int")));
    }

    #[test]
    fn unresolved_name_aborts_with_span() {
        let err = resolve(parse("function f() = mystery").expect("parse")).unwrap_err();
        match err {
            CoreError::UnresolvedName { name, span } => {
                assert_eq!(name, "mystery");
                assert!(!span.is_eof());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let source = "function f(x: Int): Int = let y = x in { y; f(x) }";
        let once = resolved(source);
        let twice = resolved(source);
        assert_eq!(once, twice);
    }
}
