//! Built-in functions and primitive type names.
//!
//! The builtin table is the fixed set of names the resolver recognizes
//! when an identifier matches no local and no item. Host-provided
//! builtins become wasm imports under the `rill` module; constructors
//! and accessors are lowered entirely inside the emitted module by the
//! backend.
//!
//! Compound values share one linear-memory layout: an `i32` length
//! word (element count for lists and tuples, byte count for strings)
//! followed by the payload, each list/tuple element one `i32` cell.

use crate::types::{Ty, VarStore};

/// Lowering strategy tag, consumed by the wasm backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Host import taking an Int.
    PrintInt,
    /// Host import taking a Str offset.
    PrintStr,
    /// In-module constructor helper allocating a list of the given
    /// arity.
    ListCtor(u32),
    /// In-module constructor helper allocating a tuple of the given
    /// arity.
    TupleCtor(u32),
    /// Inline load of the length word.
    Len,
    /// Inline element address computation plus load.
    Get,
}

/// Metadata about a single builtin symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    /// Name at the Rill source level.
    pub name: &'static str,
    /// Wasm import module for host-provided builtins; ignored for
    /// in-module lowerings.
    pub module: &'static str,
    pub kind: BuiltinKind,
}

impl BuiltinDescriptor {
    /// True if calls lower to a wasm import rather than in-module code.
    pub fn is_import(&self) -> bool {
        matches!(self.kind, BuiltinKind::PrintInt | BuiltinKind::PrintStr)
    }
}

/// The complete builtin table. Signatures come from
/// [`signature`]; polymorphic element types are instantiated with
/// fresh variables at every use site.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        name: "print_int",
        module: "rill",
        kind: BuiltinKind::PrintInt,
    },
    BuiltinDescriptor {
        name: "print_str",
        module: "rill",
        kind: BuiltinKind::PrintStr,
    },
    BuiltinDescriptor {
        name: "list0",
        module: "rill",
        kind: BuiltinKind::ListCtor(0),
    },
    BuiltinDescriptor {
        name: "list1",
        module: "rill",
        kind: BuiltinKind::ListCtor(1),
    },
    BuiltinDescriptor {
        name: "list2",
        module: "rill",
        kind: BuiltinKind::ListCtor(2),
    },
    BuiltinDescriptor {
        name: "list3",
        module: "rill",
        kind: BuiltinKind::ListCtor(3),
    },
    BuiltinDescriptor {
        name: "pair",
        module: "rill",
        kind: BuiltinKind::TupleCtor(2),
    },
    BuiltinDescriptor {
        name: "triple",
        module: "rill",
        kind: BuiltinKind::TupleCtor(3),
    },
    BuiltinDescriptor {
        name: "len",
        module: "rill",
        kind: BuiltinKind::Len,
    },
    BuiltinDescriptor {
        name: "get",
        module: "rill",
        kind: BuiltinKind::Get,
    },
];

/// Primitive type names, members of the builtin name set so the
/// resolver can tag them in type position.
pub const TYPE_NAMES: &[&str] = &["Int", "Str", "Bool"];

/// Look up a value builtin by name. Linear search; the table is small.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Canonical `&'static str` for any member of the builtin name set, or
/// `None` if the name is not a builtin.
pub fn builtin_name(name: &str) -> Option<&'static str> {
    if let Some(descriptor) = find_builtin(name) {
        return Some(descriptor.name);
    }
    TYPE_NAMES.iter().copied().find(|n| *n == name)
}

/// Signature of a builtin, instantiated with fresh type variables for
/// its element types.
pub fn signature(kind: BuiltinKind, vars: &mut VarStore) -> Ty {
    match kind {
        BuiltinKind::PrintInt => Ty::func(vec![Ty::Int], Ty::unit()),
        BuiltinKind::PrintStr => Ty::func(vec![Ty::Str], Ty::unit()),
        BuiltinKind::ListCtor(arity) => {
            let elem = vars.fresh();
            let params = vec![elem.clone(); arity as usize];
            Ty::func(params, Ty::List(Box::new(elem)))
        }
        BuiltinKind::TupleCtor(arity) => {
            let elems: Vec<Ty> = (0..arity).map(|_| vars.fresh()).collect();
            Ty::func(elems.clone(), Ty::Tuple(elems))
        }
        BuiltinKind::Len => {
            let elem = vars.fresh();
            Ty::func(vec![Ty::List(Box::new(elem))], Ty::Int)
        }
        BuiltinKind::Get => {
            let elem = vars.fresh();
            Ty::func(vec![Ty::List(Box::new(elem.clone())), Ty::Int], elem)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_builtins_by_name() {
        assert_eq!(find_builtin("print_int").map(|b| b.kind), Some(BuiltinKind::PrintInt));
        assert_eq!(find_builtin("pair").map(|b| b.kind), Some(BuiltinKind::TupleCtor(2)));
        assert!(find_builtin("missing").is_none());
    }

    #[test]
    fn type_names_are_in_the_builtin_name_set() {
        assert_eq!(builtin_name("Int"), Some("Int"));
        assert_eq!(builtin_name("len"), Some("len"));
        assert_eq!(builtin_name("Float"), None);
    }

    #[test]
    fn list_constructor_shares_one_element_variable() {
        let mut vars = VarStore::new();
        let sig = signature(BuiltinKind::ListCtor(2), &mut vars);
        let Ty::Func { params, result } = sig else {
            panic!("constructor signature must be a function");
        };
        assert_eq!(params[0], params[1]);
        assert_eq!(*result, Ty::List(Box::new(params[0].clone())));
    }

    #[test]
    fn tuple_constructor_mints_distinct_element_variables() {
        let mut vars = VarStore::new();
        let sig = signature(BuiltinKind::TupleCtor(2), &mut vars);
        let Ty::Func { params, .. } = sig else {
            panic!("constructor signature must be a function");
        };
        assert_ne!(params[0], params[1]);
    }

    #[test]
    fn instantiations_are_independent() {
        let mut vars = VarStore::new();
        let first = signature(BuiltinKind::Len, &mut vars);
        let second = signature(BuiltinKind::Len, &mut vars);
        assert_ne!(first, second);
    }
}
