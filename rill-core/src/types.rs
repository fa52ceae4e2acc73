//! Semantic types and unification.
//!
//! `Ty` is the type assigned to every expression and written type by
//! the checker. Type variables are dense indices into a `VarStore`
//! owned by one checking run; unification records substitutions there
//! and all reads resolve through the current chain to its
//! representative.

use std::fmt;

/// Semantic type of a Rill value or expression.
///
/// The empty tuple doubles as the unit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int,
    Str,
    Bool,
    List(Box<Ty>),
    Tuple(Vec<Ty>),
    Func { params: Vec<Ty>, result: Box<Ty> },
    Var(u32),
}

impl Ty {
    pub fn unit() -> Ty {
        Ty::Tuple(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Ty::Tuple(elems) if elems.is_empty())
    }

    pub fn func(params: Vec<Ty>, result: Ty) -> Ty {
        Ty::Func {
            params,
            result: Box::new(result),
        }
    }

    /// True if the type still contains an unsolved variable.
    pub fn has_vars(&self) -> bool {
        match self {
            Ty::Int | Ty::Str | Ty::Bool => false,
            Ty::Var(_) => true,
            Ty::List(elem) => elem.has_vars(),
            Ty::Tuple(elems) => elems.iter().any(Ty::has_vars),
            Ty::Func { params, result } => params.iter().any(Ty::has_vars) || result.has_vars(),
        }
    }
}

impl fmt::Display for Ty {
    /// Fixed rendering grammar: primitives capitalized, lists
    /// bracketed, tuples parenthesized, functions `fn(params): result`,
    /// variables `'tN`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "Int"),
            Ty::Str => write!(f, "Str"),
            Ty::Bool => write!(f, "Bool"),
            Ty::List(elem) => write!(f, "[{elem}]"),
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Ty::Func { params, result } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, "): {result}")
            }
            Ty::Var(index) => write!(f, "'t{index}"),
        }
    }
}

/// Why two types failed to unify.
///
/// The checker translates these into `CoreError`s with the span of the
/// expression being checked; arity is kept distinct from mismatch so
/// call sites report the right diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    Mismatch { left: Ty, right: Ty },
    Arity { left: usize, right: usize },
    Occurs { var: u32, ty: Ty },
}

/// Substitution store over a dense variable-index space.
///
/// One store belongs to one inference run; indices are meaningless
/// across runs.
#[derive(Debug, Default)]
pub struct VarStore {
    slots: Vec<Option<Ty>>,
}

impl VarStore {
    pub fn new() -> VarStore {
        VarStore::default()
    }

    /// Mint a fresh, unsolved type variable.
    pub fn fresh(&mut self) -> Ty {
        let index = self.slots.len() as u32;
        self.slots.push(None);
        Ty::Var(index)
    }

    /// Follow variable links until an unsolved variable or a
    /// non-variable type is reached. Does not recurse into structure.
    pub fn shallow(&self, ty: &Ty) -> Ty {
        let mut current = ty.clone();
        while let Ty::Var(index) = current {
            match self.slots.get(index as usize).and_then(Clone::clone) {
                Some(next) => current = next,
                None => return Ty::Var(index),
            }
        }
        current
    }

    /// Apply the current substitution throughout a type.
    pub fn apply(&self, ty: &Ty) -> Ty {
        match self.shallow(ty) {
            Ty::Int => Ty::Int,
            Ty::Str => Ty::Str,
            Ty::Bool => Ty::Bool,
            Ty::Var(index) => Ty::Var(index),
            Ty::List(elem) => Ty::List(Box::new(self.apply(&elem))),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            Ty::Func { params, result } => Ty::Func {
                params: params.iter().map(|p| self.apply(p)).collect(),
                result: Box::new(self.apply(&result)),
            },
        }
    }

    /// Make two types equal under the substitution, or report why they
    /// cannot be.
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), UnifyError> {
        let a = self.shallow(a);
        let b = self.shallow(b);
        match (a, b) {
            (Ty::Int, Ty::Int) | (Ty::Str, Ty::Str) | (Ty::Bool, Ty::Bool) => Ok(()),
            (Ty::Var(left), Ty::Var(right)) if left == right => Ok(()),
            (Ty::Var(var), ty) | (ty, Ty::Var(var)) => self.bind(var, ty),
            (Ty::List(left), Ty::List(right)) => self.unify(&left, &right),
            (Ty::Tuple(left), Ty::Tuple(right)) => {
                if left.len() != right.len() {
                    return Err(UnifyError::Arity {
                        left: left.len(),
                        right: right.len(),
                    });
                }
                for (l, r) in left.iter().zip(right.iter()) {
                    self.unify(l, r)?;
                }
                Ok(())
            }
            (
                Ty::Func {
                    params: lp,
                    result: lr,
                },
                Ty::Func {
                    params: rp,
                    result: rr,
                },
            ) => {
                if lp.len() != rp.len() {
                    return Err(UnifyError::Arity {
                        left: lp.len(),
                        right: rp.len(),
                    });
                }
                for (l, r) in lp.iter().zip(rp.iter()) {
                    self.unify(l, r)?;
                }
                self.unify(&lr, &rr)
            }
            (left, right) => Err(UnifyError::Mismatch {
                left: self.apply(&left),
                right: self.apply(&right),
            }),
        }
    }

    /// Record `var := ty`, guarded by the occurs check.
    fn bind(&mut self, var: u32, ty: Ty) -> Result<(), UnifyError> {
        if self.occurs(var, &ty) {
            return Err(UnifyError::Occurs {
                var,
                ty: self.apply(&ty),
            });
        }
        self.slots[var as usize] = Some(ty);
        Ok(())
    }

    /// Occurs check through the current substitution: would binding
    /// `var` to `ty` create a type containing itself?
    fn occurs(&self, var: u32, ty: &Ty) -> bool {
        match self.shallow(ty) {
            Ty::Int | Ty::Str | Ty::Bool => false,
            Ty::Var(index) => index == var,
            Ty::List(elem) => self.occurs(var, &elem),
            Ty::Tuple(elems) => elems.iter().any(|e| self.occurs(var, e)),
            Ty::Func { params, result } => {
                params.iter().any(|p| self.occurs(var, p)) || self.occurs(var, &result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_identical_primitives() {
        let mut vars = VarStore::new();
        assert_eq!(vars.unify(&Ty::Int, &Ty::Int), Ok(()));
        assert_eq!(vars.unify(&Ty::Str, &Ty::Str), Ok(()));
        assert_eq!(vars.unify(&Ty::unit(), &Ty::unit()), Ok(()));
    }

    #[test]
    fn binds_variable_to_concrete_type() {
        let mut vars = VarStore::new();
        let var = vars.fresh();
        vars.unify(&var, &Ty::Int).expect("unify");
        assert_eq!(vars.apply(&var), Ty::Int);
    }

    #[test]
    fn unification_is_symmetric() {
        let mut left = VarStore::new();
        let mut right = VarStore::new();
        let a = left.fresh();
        let b = right.fresh();
        let list_int = Ty::List(Box::new(Ty::Int));
        assert_eq!(left.unify(&a, &list_int).is_ok(), right.unify(&list_int, &b).is_ok());
        assert_eq!(left.apply(&a), right.apply(&b));

        let mut vars = VarStore::new();
        assert!(vars.unify(&Ty::Int, &Ty::Str).is_err());
        assert!(vars.unify(&Ty::Str, &Ty::Int).is_err());
    }

    #[test]
    fn resolves_variable_chains_to_representative() {
        let mut vars = VarStore::new();
        let a = vars.fresh();
        let b = vars.fresh();
        vars.unify(&a, &b).expect("link vars");
        vars.unify(&b, &Ty::Bool).expect("solve chain");
        assert_eq!(vars.apply(&a), Ty::Bool);
        assert_eq!(vars.shallow(&a), Ty::Bool);
    }

    #[test]
    fn occurs_check_rejects_direct_infinite_type() {
        let mut vars = VarStore::new();
        let var = vars.fresh();
        let list_of_self = Ty::List(Box::new(var.clone()));
        assert!(matches!(
            vars.unify(&var, &list_of_self),
            Err(UnifyError::Occurs { .. })
        ));
    }

    #[test]
    fn occurs_check_rejects_infinite_type_through_substitution() {
        let mut vars = VarStore::new();
        let a = vars.fresh();
        let b = vars.fresh();
        vars.unify(&a, &b).expect("link vars");
        // b is now the representative of a; a = (b, Int) must still fail.
        let tuple = Ty::Tuple(vec![b, Ty::Int]);
        assert!(matches!(
            vars.unify(&a, &tuple),
            Err(UnifyError::Occurs { .. })
        ));
    }

    #[test]
    fn tuple_length_disagreement_is_an_arity_error() {
        let mut vars = VarStore::new();
        let two = Ty::Tuple(vec![Ty::Int, Ty::Int]);
        let three = Ty::Tuple(vec![Ty::Int, Ty::Int, Ty::Int]);
        assert_eq!(
            vars.unify(&two, &three),
            Err(UnifyError::Arity { left: 2, right: 3 })
        );
    }

    #[test]
    fn function_parameter_count_disagreement_is_an_arity_error() {
        let mut vars = VarStore::new();
        let unary = Ty::func(vec![Ty::Int], Ty::Int);
        let binary = Ty::func(vec![Ty::Int, Ty::Int], Ty::Int);
        assert!(matches!(
            vars.unify(&unary, &binary),
            Err(UnifyError::Arity { left: 1, right: 2 })
        ));
    }

    #[test]
    fn unifies_function_types_component_wise() {
        let mut vars = VarStore::new();
        let a = vars.fresh();
        let b = vars.fresh();
        let open = Ty::func(vec![a.clone()], b.clone());
        let closed = Ty::func(vec![Ty::Str], Ty::Int);
        vars.unify(&open, &closed).expect("unify");
        assert_eq!(vars.apply(&a), Ty::Str);
        assert_eq!(vars.apply(&b), Ty::Int);
    }

    #[test]
    fn mismatch_reports_both_types() {
        let mut vars = VarStore::new();
        let err = vars
            .unify(&Ty::List(Box::new(Ty::Int)), &Ty::Bool)
            .unwrap_err();
        assert_eq!(
            err,
            UnifyError::Mismatch {
                left: Ty::List(Box::new(Ty::Int)),
                right: Ty::Bool,
            }
        );
    }

    #[test]
    fn renders_types_with_fixed_grammar() {
        let ty = Ty::func(
            vec![Ty::List(Box::new(Ty::Int)), Ty::Tuple(vec![Ty::Str, Ty::Bool])],
            Ty::Var(3),
        );
        assert_eq!(ty.to_string(), "fn([Int], (Str, Bool)): 't3");
        assert_eq!(Ty::unit().to_string(), "()");
    }
}
