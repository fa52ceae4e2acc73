//! Type checking and inference.
//!
//! Walks the resolved tree and assigns every expression and written
//! type a semantic type, introducing fresh variables where nothing is
//! known yet and unifying them according to the typing rules. There
//! is no let-polymorphism: each binding gets exactly one (possibly
//! variable) type.
//!
//! Item signatures are seeded as fresh variables before any body is
//! checked, then unified with the written annotations; forward and
//! mutually recursive references fall out of unification without a
//! separate pre-pass. After all bodies are checked, the substitution
//! is applied throughout the tree and every signature must be fully
//! concrete.
//!
//! The first unification failure aborts the whole check; errors are
//! reported one at a time.

use crate::ast::{Expr, ExprKind, Item, OpClass, Program, Resolution, TypeExpr, TypeExprKind, UnOp};
use crate::builtins;
use crate::error::CoreError;
use crate::fold::{Fold, walk_expr};
use crate::span::Span;
use crate::types::{Ty, UnifyError, VarStore};

/// Check a resolved program, or fail with the first type error.
pub fn typecheck(program: Program) -> Result<Program, CoreError> {
    let mut checker = TypeChecker {
        vars: VarStore::new(),
        locals: Vec::new(),
        item_sigs: Vec::new(),
    };

    // Seed one signature variable per item, then constrain each with
    // its written annotations. Bodies can then reference any item,
    // in any order, through the store.
    for _ in &program.items {
        let placeholder = checker.vars.fresh();
        checker.item_sigs.push(placeholder);
    }
    for (index, item) in program.items.iter().enumerate() {
        let params = item
            .params
            .iter()
            .map(|param| checker.lower_type(&param.ty))
            .collect::<Result<Vec<_>, _>>()?;
        let result = match &item.return_ty {
            Some(annotation) => checker.lower_type(annotation)?,
            None => checker.vars.fresh(),
        };
        let written = Ty::func(params, result);
        let placeholder = checker.item_sigs[index].clone();
        checker.unify_at(&placeholder, &written, item.name.span)?;
    }

    let program = checker.fold_program(program)?;

    // Substitute solved variables throughout the stored types, then
    // reject any signature that is still open.
    let program = ApplyTypes { vars: &checker.vars }.fold_program(program)?;
    for item in &program.items {
        let signature = item.signature().ok_or_else(|| {
            CoreError::internal(format!("item `{}` left untyped after checking", item.name.name))
        })?;
        if signature.has_vars() {
            return Err(CoreError::TypeMismatch {
                expected: "a concrete type".to_string(),
                found: signature.to_string(),
                span: item.name.span,
            });
        }
    }
    Ok(program)
}

struct TypeChecker {
    vars: VarStore,
    /// Types of the live local bindings, innermost last; mirrors the
    /// resolver's scope stack.
    locals: Vec<Ty>,
    /// One signature per item, indexed by declaration order.
    item_sigs: Vec<Ty>,
}

impl TypeChecker {
    /// Unify two types, translating failure into a diagnostic at
    /// `span` with both types rendered through the substitution.
    fn unify_at(&mut self, expected: &Ty, found: &Ty, span: Span) -> Result<(), CoreError> {
        self.vars.unify(expected, found).map_err(|err| match err {
            UnifyError::Mismatch { left, right } => CoreError::TypeMismatch {
                expected: left.to_string(),
                found: right.to_string(),
                span,
            },
            UnifyError::Arity { left, right } => CoreError::ArityMismatch {
                expected: left,
                found: right,
                span,
            },
            UnifyError::Occurs { var, ty } => CoreError::InfiniteType {
                var: Ty::Var(var).to_string(),
                ty: ty.to_string(),
                span,
            },
        })
    }

    /// Lower a written type to its semantic type without touching the
    /// tree node.
    fn lower_type(&mut self, annotation: &TypeExpr) -> Result<Ty, CoreError> {
        match &annotation.kind {
            TypeExprKind::Named(ident) => match ident.res {
                Some(Resolution::Builtin("Int")) => Ok(Ty::Int),
                Some(Resolution::Builtin("Str")) => Ok(Ty::Str),
                Some(Resolution::Builtin("Bool")) => Ok(Ty::Bool),
                Some(Resolution::Item(index)) => self
                    .item_sigs
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| CoreError::internal(format!(
                        "type annotation references item {index} beyond the item table"
                    ))),
                other => Err(CoreError::internal(format!(
                    "named type `{}` reached the checker with resolution {other:?}",
                    ident.name
                ))),
            },
            TypeExprKind::List(elem) => Ok(Ty::List(Box::new(self.lower_type(elem)?))),
            TypeExprKind::Tuple(elems) => Ok(Ty::Tuple(
                elems
                    .iter()
                    .map(|elem| self.lower_type(elem))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }

    /// Type of a resolved identifier in value position.
    fn ident_ty(&mut self, res: Resolution) -> Result<Ty, CoreError> {
        match res {
            Resolution::Local(index) => {
                let depth = self.locals.len();
                if index as usize >= depth {
                    // A resolver bug, not a user error.
                    return Err(CoreError::internal(format!(
                        "local index {index} exceeds the {depth} enclosing binding(s)"
                    )));
                }
                Ok(self.locals[depth - 1 - index as usize].clone())
            }
            Resolution::Item(index) => self
                .item_sigs
                .get(index as usize)
                .cloned()
                .ok_or_else(|| CoreError::internal(format!(
                    "item index {index} beyond the item table"
                ))),
            Resolution::Builtin(name) => {
                let descriptor = builtins::find_builtin(name).ok_or_else(|| {
                    CoreError::internal(format!(
                        "builtin `{name}` resolved in value position but has no descriptor"
                    ))
                })?;
                // Fresh instantiation per use site.
                Ok(builtins::signature(descriptor.kind, &mut self.vars))
            }
        }
    }

    fn expr_ty(expr: &Expr) -> Result<Ty, CoreError> {
        expr.ty
            .clone()
            .ok_or_else(|| CoreError::internal("expression left untyped during checking"))
    }
}

impl Fold for TypeChecker {
    fn fold_item(&mut self, item: Item) -> Result<Item, CoreError> {
        let Some(Resolution::Item(index)) = item.name.res else {
            return Err(CoreError::internal(format!(
                "item `{}` reached the checker unresolved",
                item.name.name
            )));
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

        // Each argument's written type is its declared local type.
        self.locals.clear();
        for param in &params {
            let ty = param.ty.ty.clone().ok_or_else(|| {
                CoreError::internal("parameter type not lowered before body check")
            })?;
            self.locals.push(ty);
        }
        let body = self.fold_expr(item.body)?;
        self.locals.clear();

        // The body's type must agree with the signature's result.
        let signature = self.item_sigs[index as usize].clone();
        let result = match self.vars.shallow(&signature) {
            Ty::Func { result, .. } => *result,
            other => {
                return Err(CoreError::internal(format!(
                    "signature of item {index} is {other}, not a function type"
                )));
            }
        };
        let body_ty = Self::expr_ty(&body)?;
        self.unify_at(&result, &body_ty, body.span)?;

        Ok(Item {
            id: item.id,
            name: item.name,
            params,
            return_ty,
            body,
            span: item.span,
        })
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr, CoreError> {
        let span = expr.span;
        let (kind, ty) = match expr.kind {
            ExprKind::Empty => (ExprKind::Empty, Ty::unit()),
            ExprKind::Int(value) => (ExprKind::Int(value), Ty::Int),
            ExprKind::Str(value) => (ExprKind::Str(value), Ty::Str),
            ExprKind::Var(ident) => {
                let res = ident.res.ok_or_else(|| {
                    CoreError::internal(format!(
                        "identifier `{}` reached the checker unresolved",
                        ident.name
                    ))
                })?;
                let ty = self.ident_ty(res)?;
                (ExprKind::Var(ident), ty)
            }
            ExprKind::Let {
                name,
                ty: annotation,
                rhs,
                body,
            } => {
                let rhs = self.fold_expr(*rhs)?;
                let rhs_ty = Self::expr_ty(&rhs)?;
                let annotation = annotation.map(|t| self.fold_type(t)).transpose()?;
                if let Some(annotation) = &annotation {
                    let written = annotation.ty.clone().ok_or_else(|| {
                        CoreError::internal("let annotation not lowered before use")
                    })?;
                    self.unify_at(&written, &rhs_ty, rhs.span)?;
                }
                self.locals.push(rhs_ty);
                let body = self.fold_expr(*body);
                self.locals.pop();
                let body = body?;
                let ty = Self::expr_ty(&body)?;
                (
                    ExprKind::Let {
                        name,
                        ty: annotation,
                        rhs: Box::new(rhs),
                        body: Box::new(body),
                    },
                    ty,
                )
            }
            ExprKind::Block(elems) => {
                let elems = elems
                    .into_iter()
                    .map(|elem| self.fold_expr(elem))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = match elems.last() {
                    Some(last) => Self::expr_ty(last)?,
                    None => Ty::unit(),
                };
                (ExprKind::Block(elems), ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.fold_expr(*lhs)?;
                let rhs = self.fold_expr(*rhs)?;
                let lhs_ty = Self::expr_ty(&lhs)?;
                let rhs_ty = Self::expr_ty(&rhs)?;
                let ty = match op.class() {
                    OpClass::Arithmetic => {
                        self.unify_at(&Ty::Int, &lhs_ty, lhs.span)?;
                        self.unify_at(&Ty::Int, &rhs_ty, rhs.span)?;
                        Ty::Int
                    }
                    OpClass::Comparison | OpClass::Equality => {
                        self.unify_at(&lhs_ty, &rhs_ty, span)?;
                        Ty::Bool
                    }
                    OpClass::Logical => {
                        self.unify_at(&Ty::Bool, &lhs_ty, lhs.span)?;
                        self.unify_at(&Ty::Bool, &rhs_ty, rhs.span)?;
                        Ty::Bool
                    }
                };
                (
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                )
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.fold_expr(*operand)?;
                let operand_ty = Self::expr_ty(&operand)?;
                let ty = match op {
                    UnOp::Not => {
                        self.unify_at(&Ty::Bool, &operand_ty, operand.span)?;
                        Ty::Bool
                    }
                    UnOp::Neg => {
                        self.unify_at(&Ty::Int, &operand_ty, operand.span)?;
                        Ty::Int
                    }
                };
                (
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                )
            }
            ExprKind::Call { callee, args } => {
                let callee = self.fold_expr(*callee)?;
                let args = args
                    .into_iter()
                    .map(|arg| self.fold_expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let callee_ty = self.vars.shallow(&Self::expr_ty(&callee)?);
                let result = match callee_ty {
                    Ty::Func { params, result } => {
                        // Arity disagreement is its own diagnostic,
                        // distinct from a type mismatch.
                        if params.len() != args.len() {
                            return Err(CoreError::ArityMismatch {
                                expected: params.len(),
                                found: args.len(),
                                span,
                            });
                        }
                        for (param, arg) in params.iter().zip(args.iter()) {
                            let arg_ty = Self::expr_ty(arg)?;
                            self.unify_at(param, &arg_ty, arg.span)?;
                        }
                        *result
                    }
                    Ty::Var(_) => {
                        let result = self.vars.fresh();
                        let arg_tys = args
                            .iter()
                            .map(Self::expr_ty)
                            .collect::<Result<Vec<_>, _>>()?;
                        let wanted = Ty::func(arg_tys, result.clone());
                        self.unify_at(&callee_ty, &wanted, callee.span)?;
                        result
                    }
                    other => {
                        return Err(CoreError::TypeMismatch {
                            expected: "a function".to_string(),
                            found: self.vars.apply(&other).to_string(),
                            span: callee.span,
                        });
                    }
                };
                (
                    ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                    result,
                )
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.fold_expr(*cond)?;
                let cond_ty = Self::expr_ty(&cond)?;
                self.unify_at(&Ty::Bool, &cond_ty, cond.span)?;
                let then_branch = self.fold_expr(*then_branch)?;
                let then_ty = Self::expr_ty(&then_branch)?;
                let (else_branch, ty) = match else_branch {
                    Some(branch) => {
                        let branch = self.fold_expr(*branch)?;
                        let else_ty = Self::expr_ty(&branch)?;
                        self.unify_at(&then_ty, &else_ty, span)?;
                        (Some(Box::new(branch)), then_ty)
                    }
                    None => {
                        // Without an else the whole expression is unit.
                        self.unify_at(&Ty::unit(), &then_ty, then_branch.span)?;
                        (None, Ty::unit())
                    }
                };
                (
                    ExprKind::If {
                        cond: Box::new(cond),
                        then_branch: Box::new(then_branch),
                        else_branch,
                    },
                    ty,
                )
            }
        };
        Ok(Expr {
            kind,
            span,
            ty: Some(ty),
        })
    }

    fn fold_type(&mut self, annotation: TypeExpr) -> Result<TypeExpr, CoreError> {
        let lowered = self.lower_type(&annotation)?;
        Ok(TypeExpr {
            ty: Some(lowered),
            ..annotation
        })
    }
}

/// Final pass: replace solved variables in every stored type with
/// their representatives.
struct ApplyTypes<'a> {
    vars: &'a VarStore,
}

impl Fold for ApplyTypes<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr, CoreError> {
        let expr = walk_expr(self, expr)?;
        Ok(Expr {
            ty: expr.ty.map(|ty| self.vars.apply(&ty)),
            ..expr
        })
    }

    fn fold_type(&mut self, annotation: TypeExpr) -> Result<TypeExpr, CoreError> {
        let annotation = crate::fold::walk_type(self, annotation)?;
        Ok(TypeExpr {
            ty: annotation.ty.map(|ty| self.vars.apply(&ty)),
            ..annotation
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolve::resolve;

    fn checked(source: &str) -> Program {
        typecheck(resolve(parse(source).expect("parse")).expect("resolve")).expect("typecheck")
    }

    fn check_err(source: &str) -> CoreError {
        typecheck(resolve(parse(source).expect("parse")).expect("resolve")).unwrap_err()
    }

    #[test]
    fn literals_have_their_primitive_types() {
        let program = checked("function f(): Int = 1 function g(): Str = \"s\"");
        assert_eq!(program.items[0].body.ty, Some(Ty::Int));
        assert_eq!(program.items[1].body.ty, Some(Ty::Str));
    }

    #[test]
    fn add_example_signature() {
        let program = checked("function add(x: Int, y: Int): Int = x + y");
        assert_eq!(
            program.items[0].signature(),
            Some(Ty::func(vec![Ty::Int, Ty::Int], Ty::Int))
        );
    }

    #[test]
    fn return_type_is_inferred_from_the_body() {
        let program = checked("function f(n: Int) = n + 1");
        assert_eq!(
            program.items[0].signature(),
            Some(Ty::func(vec![Ty::Int], Ty::Int))
        );
    }

    #[test]
    fn inference_flows_across_items() {
        let program = checked("function f() = g() function g() = 1");
        assert_eq!(program.items[0].signature(), Some(Ty::func(vec![], Ty::Int)));
    }

    #[test]
    fn conditional_branches_unify() {
        let program = checked("function f(n: Int) = if n < 0 then 0 - n else n");
        assert_eq!(program.items[0].body.ty, Some(Ty::Int));
    }

    #[test]
    fn conditional_branch_mismatch_cites_both_types() {
        let err = check_err("function f(n: Int) = if n < 0 then 1 else \"s\"");
        match err {
            CoreError::TypeMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "Int");
                assert_eq!(found, "Str");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn else_less_conditional_is_unit() {
        let program = checked("function f(n: Int) = if n < 0 then print_int(n)");
        assert_eq!(program.items[0].body.ty, Some(Ty::unit()));
    }

    #[test]
    fn else_less_conditional_rejects_valued_then_branch() {
        let err = check_err("function f(n: Int) = if n < 0 then 1");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn wrong_argument_count_is_arity_not_type() {
        let err = check_err(
            "function f(a: Int, b: Int, c: Int): Int = a function g() = f(1, 2)",
        );
        match err {
            CoreError::ArityMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected arity mismatch, got {other:?}"),
        }
    }

    #[test]
    fn wrong_argument_type_is_a_type_mismatch() {
        let err = check_err("function f(a: Int): Int = a function g() = f(\"s\")");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn annotated_let_must_match_its_rhs() {
        let err = check_err("function f() = let x: Str = 1 in x");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn logical_operators_require_bool() {
        let err = check_err("function f(n: Int) = n && (n < 1)");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        let program = checked("function f(n: Int) = (n < 1) && !(n == 2)");
        assert_eq!(program.items[0].body.ty, Some(Ty::Bool));
    }

    #[test]
    fn equality_operands_unify_with_each_other() {
        let program = checked("function f(a: Str, b: Str) = a == b");
        assert_eq!(program.items[0].body.ty, Some(Ty::Bool));
        let err = check_err("function f(a: Str) = a == 1");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn block_takes_the_type_of_its_last_element() {
        let program = checked("function f(n: Int): Int = { print_int(n); let m = n * 2; m }");
        assert_eq!(program.items[0].body.ty, Some(Ty::Int));
    }

    #[test]
    fn builtin_list_constructors_unify_their_elements() {
        let program = checked("function f(): Int = len(list2(1, 2))");
        assert_eq!(program.items[0].body.ty, Some(Ty::Int));
        let err = check_err("function f(): Int = len(list2(1, \"s\"))");
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn builtin_get_recovers_the_element_type() {
        let program = checked("function f(): Str = get(list1(\"s\"), 0)");
        assert_eq!(program.items[0].body.ty, Some(Ty::Str));
    }

    #[test]
    fn tuple_constructor_keeps_positional_types() {
        let program = checked("function f(): (Int, Str) = pair(1, \"s\")");
        assert_eq!(
            program.items[0].body.ty,
            Some(Ty::Tuple(vec![Ty::Int, Ty::Str]))
        );
    }

    #[test]
    fn recursion_checks_against_the_seeded_signature() {
        let program = checked(
            "function fact(n: Int): Int = if n < 2 then 1 else n * fact(n - 1)",
        );
        assert_eq!(
            program.items[0].signature(),
            Some(Ty::func(vec![Ty::Int], Ty::Int))
        );
    }

    #[test]
    fn self_returning_function_is_an_infinite_type() {
        let err = check_err("function f() = f");
        assert!(matches!(err, CoreError::InfiniteType { .. }));
    }

    #[test]
    fn unsolved_signature_variables_are_rejected() {
        let err = check_err("function f() = list0()");
        match err {
            CoreError::TypeMismatch { expected, .. } => {
                assert_eq!(expected, "a concrete type");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn calling_a_non_function_is_reported_at_the_callee() {
        let err = check_err("function f(n: Int) = n(1)");
        match err {
            CoreError::TypeMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "a function");
                assert_eq!(found, "Int");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn checking_is_deterministic() {
        let source = "function f(n: Int) = { let m = n + 1; if m < 3 then m else f(m - 1) }";
        assert_eq!(checked(source), checked(source));
    }
}
