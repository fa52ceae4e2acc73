//! WASM backend.
//!
//! Translates a checked tree into a self-contained wasm module using
//! the `wasm-encoder` crate. Every Rill value is an `i32`: ints and
//! bools directly (bools as 0/1), strings and compound values as
//! offsets into linear memory. Unit is represented by no value at all;
//! where a call site needs a placeholder for a unit argument it pushes
//! `i32.const 0`.
//!
//! Memory layout: offsets 0..8 are reserved, string literal data
//! follows as length-prefixed UTF-8, and a mutable global past the
//! data serves as the bump-allocation frontier for constructors.
//!
//! Function index space: host imports first, then the allocator and
//! constructor helpers, then the program's items in declaration order.
//! Only helpers the program actually uses are emitted.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::ast::{Expr, ExprKind, Item, Program, Resolution, UnOp};
use crate::builtins::{self, BuiltinKind};
use crate::error::CoreError;
use crate::span::Span;
use crate::types::Ty;

/// Start of string literal data in linear memory.
const DATA_BASE: i32 = 8;
const PAGE_SIZE: u64 = 65536;

/// Emit a wasm module for a resolved, checked program. Items are
/// exported by name alongside the module's memory.
pub fn emit_program(program: &Program) -> Result<Vec<u8>, CoreError> {
    let usage = collect_usage(program);
    let layout = ModuleLayout::build(program, &usage)?;

    let mut module = Module::new();

    // One type entry per function, in function-index order, so a
    // function's type index equals its function index.
    let mut types = TypeSection::new();
    for sig in &layout.signatures {
        let params = vec![ValType::I32; sig.params as usize];
        let results: &[ValType] = if sig.result { &[ValType::I32] } else { &[] };
        types.ty().function(params, results.iter().copied());
    }
    module.section(&types);

    if !layout.imports.is_empty() {
        let mut imports = ImportSection::new();
        for (index, descriptor) in layout.imports.iter().enumerate() {
            imports.import(
                descriptor.module,
                descriptor.name,
                EntityType::Function(index as u32),
            );
        }
        module.section(&imports);
    }

    let mut functions = FunctionSection::new();
    for index in layout.imports.len() as u32..layout.signatures.len() as u32 {
        functions.function(index);
    }
    module.section(&functions);

    let mut memories = MemorySection::new();
    let pages = (layout.heap_base as u64).div_ceil(PAGE_SIZE).max(1);
    memories.memory(MemoryType {
        minimum: pages,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    let mut globals = GlobalSection::new();
    globals.global(
        GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        },
        &ConstExpr::i32_const(layout.heap_base),
    );
    module.section(&globals);

    let mut exports = ExportSection::new();
    // A duplicated item name resolves to its last declaration, so only
    // that declaration is exported.
    let mut last_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, item) in program.items.iter().enumerate() {
        last_by_name.insert(item.name.name.as_str(), index);
    }
    for (index, item) in program.items.iter().enumerate() {
        if last_by_name[item.name.name.as_str()] == index {
            exports.export(
                &item.name.name,
                ExportKind::Func,
                layout.item_base + index as u32,
            );
        }
    }
    exports.export("memory", ExportKind::Memory, 0);
    module.section(&exports);

    let mut code = CodeSection::new();
    if layout.alloc_index.is_some() {
        code.function(&emit_alloc_body());
    }
    for &arity in layout.ctor_index.keys() {
        code.function(&emit_ctor_body(arity, &layout)?);
    }
    for item in &program.items {
        code.function(&emit_item_body(item, &layout)?);
    }
    module.section(&code);

    if !layout.data.is_empty() {
        let mut data = DataSection::new();
        data.active(
            0,
            &ConstExpr::i32_const(DATA_BASE),
            layout.data.iter().copied(),
        );
        module.section(&data);
    }

    Ok(module.finish())
}

/// What the program actually reaches for, gathered in one pass so the
/// module carries no unused imports, helpers, or data.
#[derive(Default)]
struct Usage {
    print_int: bool,
    print_str: bool,
    /// Constructor arities in use. Lists and tuples share one helper
    /// per arity; both allocate a length word plus that many cells.
    ctor_arities: BTreeSet<u32>,
    /// String literals in first-occurrence order, deduplicated.
    strings: Vec<String>,
}

fn collect_usage(program: &Program) -> Usage {
    let mut usage = Usage::default();
    let mut seen = HashSet::new();
    for item in &program.items {
        collect_expr(&item.body, &mut usage, &mut seen);
    }
    usage
}

fn collect_expr(expr: &Expr, usage: &mut Usage, seen: &mut HashSet<String>) {
    match &expr.kind {
        ExprKind::Str(value) => {
            if seen.insert(value.clone()) {
                usage.strings.push(value.clone());
            }
        }
        ExprKind::Var(ident) => {
            if let Some(Resolution::Builtin(name)) = ident.res
                && let Some(descriptor) = builtins::find_builtin(name)
            {
                match descriptor.kind {
                    BuiltinKind::PrintInt => usage.print_int = true,
                    BuiltinKind::PrintStr => usage.print_str = true,
                    BuiltinKind::ListCtor(arity) | BuiltinKind::TupleCtor(arity) => {
                        usage.ctor_arities.insert(arity);
                    }
                    BuiltinKind::Len | BuiltinKind::Get => {}
                }
            }
        }
        ExprKind::Empty | ExprKind::Int(_) => {}
        ExprKind::Let { rhs, body, .. } => {
            collect_expr(rhs, usage, seen);
            collect_expr(body, usage, seen);
        }
        ExprKind::Block(elems) => {
            for elem in elems {
                collect_expr(elem, usage, seen);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_expr(lhs, usage, seen);
            collect_expr(rhs, usage, seen);
        }
        ExprKind::Unary { operand, .. } => collect_expr(operand, usage, seen),
        ExprKind::Call { callee, args } => {
            collect_expr(callee, usage, seen);
            for arg in args {
                collect_expr(arg, usage, seen);
            }
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_expr(cond, usage, seen);
            collect_expr(then_branch, usage, seen);
            if let Some(branch) = else_branch {
                collect_expr(branch, usage, seen);
            }
        }
    }
}

/// Wasm-level signature: every parameter is `i32`, the result is
/// either one `i32` or nothing (unit).
struct FuncSig {
    params: u32,
    result: bool,
}

struct ModuleLayout {
    /// Host imports in use, in builtin-table order.
    imports: Vec<&'static builtins::BuiltinDescriptor>,
    alloc_index: Option<u32>,
    /// Constructor arity to function index.
    ctor_index: BTreeMap<u32, u32>,
    /// Function index of item 0; items follow in declaration order.
    item_base: u32,
    /// One signature per function, in function-index order.
    signatures: Vec<FuncSig>,
    string_offset: HashMap<String, i32>,
    data: Vec<u8>,
    heap_base: i32,
}

impl ModuleLayout {
    fn build(program: &Program, usage: &Usage) -> Result<ModuleLayout, CoreError> {
        let mut imports = Vec::new();
        let mut signatures = Vec::new();
        for descriptor in builtins::BUILTINS {
            let used = match descriptor.kind {
                BuiltinKind::PrintInt => usage.print_int,
                BuiltinKind::PrintStr => usage.print_str,
                _ => false,
            };
            if used {
                imports.push(descriptor);
                signatures.push(FuncSig {
                    params: 1,
                    result: false,
                });
            }
        }

        let mut next = imports.len() as u32;
        let alloc_index = if usage.ctor_arities.is_empty() {
            None
        } else {
            signatures.push(FuncSig {
                params: 1,
                result: true,
            });
            next += 1;
            Some(next - 1)
        };
        let mut ctor_index = BTreeMap::new();
        for &arity in &usage.ctor_arities {
            ctor_index.insert(arity, next);
            signatures.push(FuncSig {
                params: arity,
                result: true,
            });
            next += 1;
        }
        let item_base = next;
        for item in &program.items {
            let signature = item.signature().ok_or_else(|| {
                CoreError::internal(format!("item `{}` has no signature", item.name.name))
            })?;
            let Ty::Func { result, .. } = signature else {
                return Err(CoreError::internal(format!(
                    "item `{}` has a non-function signature",
                    item.name.name
                )));
            };
            signatures.push(FuncSig {
                params: item.params.len() as u32,
                result: !result.is_unit(),
            });
        }

        // Length-prefixed UTF-8, each record aligned to 4 bytes.
        let mut data = Vec::new();
        let mut string_offset = HashMap::new();
        for value in &usage.strings {
            while data.len() % 4 != 0 {
                data.push(0);
            }
            string_offset.insert(value.clone(), DATA_BASE + data.len() as i32);
            data.extend_from_slice(&(value.len() as i32).to_le_bytes());
            data.extend_from_slice(value.as_bytes());
        }
        let mut heap_base = DATA_BASE + data.len() as i32;
        while heap_base % 4 != 0 {
            heap_base += 1;
        }

        Ok(ModuleLayout {
            imports,
            alloc_index,
            ctor_index,
            item_base,
            signatures,
            string_offset,
            data,
            heap_base,
        })
    }

    fn alloc(&self) -> Result<u32, CoreError> {
        self.alloc_index
            .ok_or_else(|| CoreError::internal("allocator helper missing from layout"))
    }

    fn import(&self, name: &str) -> Result<u32, CoreError> {
        self.imports
            .iter()
            .position(|descriptor| descriptor.name == name)
            .map(|index| index as u32)
            .ok_or_else(|| CoreError::internal(format!("import `{name}` missing from layout")))
    }
}

fn expr_ty(expr: &Expr) -> Result<&Ty, CoreError> {
    expr.ty
        .as_ref()
        .ok_or_else(|| CoreError::internal("expression reached the backend without a type"))
}

fn mem_word(offset: u64) -> MemArg {
    MemArg {
        offset,
        align: 2,
        memory_index: 0,
    }
}

/// Bump allocator: `alloc(size) -> ptr` advances the heap global and
/// returns the old frontier. Local 0 is the size, local 1 the result.
fn emit_alloc_body() -> Function {
    let mut func = Function::new([(1, ValType::I32)]);
    func.instruction(&Instruction::GlobalGet(0));
    func.instruction(&Instruction::LocalTee(1));
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::GlobalSet(0));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::End);
    func
}

/// Constructor of the given arity: allocates a length word plus one
/// cell per element and stores its arguments. Local `arity` holds the
/// fresh pointer.
fn emit_ctor_body(arity: u32, layout: &ModuleLayout) -> Result<Function, CoreError> {
    let mut func = Function::new([(1, ValType::I32)]);
    let ptr = arity;
    func.instruction(&Instruction::I32Const(4 + 4 * arity as i32));
    func.instruction(&Instruction::Call(layout.alloc()?));
    func.instruction(&Instruction::LocalSet(ptr));
    func.instruction(&Instruction::LocalGet(ptr));
    func.instruction(&Instruction::I32Const(arity as i32));
    func.instruction(&Instruction::I32Store(mem_word(0)));
    for index in 0..arity {
        func.instruction(&Instruction::LocalGet(ptr));
        func.instruction(&Instruction::LocalGet(index));
        func.instruction(&Instruction::I32Store(mem_word(4 + 4 * index as u64)));
    }
    func.instruction(&Instruction::LocalGet(ptr));
    func.instruction(&Instruction::End);
    Ok(func)
}

fn emit_item_body(item: &Item, layout: &ModuleLayout) -> Result<Function, CoreError> {
    let params = item.params.len() as u32;
    let max_depth = max_binding_depth(&item.body, params);
    let mut func = Function::new([(max_depth - params, ValType::I32)]);
    let mut emitter = FnEmitter {
        layout,
        func: &mut func,
        depth: params,
    };
    emitter.emit_expr(&item.body)?;
    func.instruction(&Instruction::End);
    Ok(func)
}

/// Deepest simultaneous binding count in `expr`, starting from `depth`
/// enclosing bindings. Bounds the wasm locals a body needs; sibling
/// lets at the same depth share a slot.
fn max_binding_depth(expr: &Expr, depth: u32) -> u32 {
    match &expr.kind {
        ExprKind::Empty | ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Var(_) => depth,
        ExprKind::Let { rhs, body, .. } => {
            max_binding_depth(rhs, depth).max(max_binding_depth(body, depth + 1))
        }
        ExprKind::Block(elems) => elems
            .iter()
            .map(|elem| max_binding_depth(elem, depth))
            .max()
            .unwrap_or(depth),
        ExprKind::Binary { lhs, rhs, .. } => {
            max_binding_depth(lhs, depth).max(max_binding_depth(rhs, depth))
        }
        ExprKind::Unary { operand, .. } => max_binding_depth(operand, depth),
        ExprKind::Call { callee, args } => args
            .iter()
            .map(|arg| max_binding_depth(arg, depth))
            .fold(max_binding_depth(callee, depth), u32::max),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let base = max_binding_depth(cond, depth).max(max_binding_depth(then_branch, depth));
            match else_branch {
                Some(branch) => base.max(max_binding_depth(branch, depth)),
                None => base,
            }
        }
    }
}

struct FnEmitter<'a> {
    layout: &'a ModuleLayout,
    func: &'a mut Function,
    /// Number of bindings currently in scope; a De Bruijn index `i`
    /// lives in wasm local `depth - 1 - i`.
    depth: u32,
}

impl FnEmitter<'_> {
    /// Emit `expr`, leaving one value on the stack unless its type is
    /// unit, which leaves none.
    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CoreError> {
        match &expr.kind {
            ExprKind::Empty => {}
            ExprKind::Int(value) => {
                self.func.instruction(&Instruction::I32Const(*value));
            }
            ExprKind::Str(value) => {
                let offset = self.layout.string_offset.get(value).ok_or_else(|| {
                    CoreError::internal("string literal missing from data layout")
                })?;
                self.func.instruction(&Instruction::I32Const(*offset));
            }
            ExprKind::Var(ident) => match ident.res {
                Some(Resolution::Local(index)) => {
                    if !expr_ty(expr)?.is_unit() {
                        let slot = self.slot(index)?;
                        self.func.instruction(&Instruction::LocalGet(slot));
                    }
                }
                Some(Resolution::Item(_)) | Some(Resolution::Builtin(_)) => {
                    return Err(unsupported_function_value(&ident.name, expr.span));
                }
                None => {
                    return Err(CoreError::internal(format!(
                        "identifier `{}` reached the backend unresolved",
                        ident.name
                    )));
                }
            },
            ExprKind::Let { rhs, body, .. } => {
                self.emit_expr(rhs)?;
                // Unit bindings occupy a slot but never store or load.
                if !expr_ty(rhs)?.is_unit() {
                    self.func.instruction(&Instruction::LocalSet(self.depth));
                }
                self.depth += 1;
                let result = self.emit_expr(body);
                self.depth -= 1;
                result?;
            }
            ExprKind::Block(elems) => {
                for (index, elem) in elems.iter().enumerate() {
                    self.emit_expr(elem)?;
                    let last = index + 1 == elems.len();
                    if !last && !expr_ty(elem)?.is_unit() {
                        self.func.instruction(&Instruction::Drop);
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                // Both operands are always evaluated; `&&` and `||`
                // do not short-circuit.
                self.emit_value(lhs)?;
                self.emit_value(rhs)?;
                self.func.instruction(&binary_instruction(*op));
            }
            ExprKind::Unary { op, operand } => match op {
                UnOp::Neg => {
                    self.func.instruction(&Instruction::I32Const(0));
                    self.emit_value(operand)?;
                    self.func.instruction(&Instruction::I32Sub);
                }
                UnOp::Not => {
                    self.emit_value(operand)?;
                    self.func.instruction(&Instruction::I32Eqz);
                }
            },
            ExprKind::Call { callee, args } => self.emit_call(callee, args)?,
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.emit_value(cond)?;
                let block = if expr_ty(expr)?.is_unit() {
                    BlockType::Empty
                } else {
                    BlockType::Result(ValType::I32)
                };
                self.func.instruction(&Instruction::If(block));
                self.emit_expr(then_branch)?;
                if let Some(branch) = else_branch {
                    self.func.instruction(&Instruction::Else);
                    self.emit_expr(branch)?;
                }
                self.func.instruction(&Instruction::End);
            }
        }
        Ok(())
    }

    /// Emit `expr` guaranteeing exactly one value on the stack: unit
    /// expressions get an `i32.const 0` placeholder.
    fn emit_value(&mut self, expr: &Expr) -> Result<(), CoreError> {
        self.emit_expr(expr)?;
        if expr_ty(expr)?.is_unit() {
            self.func.instruction(&Instruction::I32Const(0));
        }
        Ok(())
    }

    fn emit_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<(), CoreError> {
        let ExprKind::Var(ident) = &callee.kind else {
            return Err(CoreError::Unsupported {
                message: "only named functions can be called".to_string(),
                span: callee.span,
            });
        };
        match ident.res {
            Some(Resolution::Item(index)) => {
                for arg in args {
                    self.emit_value(arg)?;
                }
                self.func
                    .instruction(&Instruction::Call(self.layout.item_base + index));
                Ok(())
            }
            Some(Resolution::Builtin(name)) => self.emit_builtin_call(name, args),
            Some(Resolution::Local(_)) => Err(unsupported_function_value(&ident.name, callee.span)),
            None => Err(CoreError::internal(format!(
                "callee `{}` reached the backend unresolved",
                ident.name
            ))),
        }
    }

    fn emit_builtin_call(&mut self, name: &'static str, args: &[Expr]) -> Result<(), CoreError> {
        let descriptor = builtins::find_builtin(name).ok_or_else(|| {
            CoreError::internal(format!("builtin `{name}` missing from the table"))
        })?;
        match descriptor.kind {
            BuiltinKind::PrintInt | BuiltinKind::PrintStr => {
                self.emit_value(&args[0])?;
                let index = self.layout.import(name)?;
                self.func.instruction(&Instruction::Call(index));
            }
            BuiltinKind::ListCtor(arity) | BuiltinKind::TupleCtor(arity) => {
                for arg in args {
                    self.emit_value(arg)?;
                }
                let index = *self.layout.ctor_index.get(&arity).ok_or_else(|| {
                    CoreError::internal(format!("constructor of arity {arity} missing from layout"))
                })?;
                self.func.instruction(&Instruction::Call(index));
            }
            BuiltinKind::Len => {
                self.emit_value(&args[0])?;
                self.func.instruction(&Instruction::I32Load(mem_word(0)));
            }
            BuiltinKind::Get => {
                self.emit_value(&args[0])?;
                self.emit_value(&args[1])?;
                self.func.instruction(&Instruction::I32Const(4));
                self.func.instruction(&Instruction::I32Mul);
                self.func.instruction(&Instruction::I32Add);
                self.func.instruction(&Instruction::I32Load(mem_word(4)));
            }
        }
        Ok(())
    }

    fn slot(&self, index: u32) -> Result<u32, CoreError> {
        if index >= self.depth {
            return Err(CoreError::internal(format!(
                "local index {index} out of range at binding depth {}",
                self.depth
            )));
        }
        Ok(self.depth - 1 - index)
    }
}

fn binary_instruction(op: crate::ast::BinOp) -> Instruction<'static> {
    use crate::ast::BinOp;
    match op {
        BinOp::Or => Instruction::I32Or,
        BinOp::And => Instruction::I32And,
        BinOp::Eq => Instruction::I32Eq,
        BinOp::Ne => Instruction::I32Ne,
        BinOp::Lt => Instruction::I32LtS,
        BinOp::Le => Instruction::I32LeS,
        BinOp::Gt => Instruction::I32GtS,
        BinOp::Ge => Instruction::I32GeS,
        BinOp::Add => Instruction::I32Add,
        BinOp::Sub => Instruction::I32Sub,
        BinOp::Mul => Instruction::I32Mul,
        BinOp::Div => Instruction::I32DivS,
        BinOp::Rem => Instruction::I32RemS,
    }
}

fn unsupported_function_value(name: &str, span: Span) -> CoreError {
    CoreError::Unsupported {
        message: format!("`{name}` is a function and functions are not first-class values"),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolve::resolve;
    use crate::typecheck::typecheck;

    fn compile(source: &str) -> Vec<u8> {
        let program =
            typecheck(resolve(parse(source).expect("parse")).expect("resolve")).expect("typecheck");
        emit_program(&program).expect("emit")
    }

    fn instantiate(
        wasm: &[u8],
    ) -> (wasmi::Store<Vec<String>>, wasmi::Instance) {
        let engine = wasmi::Engine::default();
        let module = wasmi::Module::new(&engine, wasm).expect("module");
        let mut linker = wasmi::Linker::new(&engine);
        linker
            .func_wrap(
                "rill",
                "print_int",
                |mut caller: wasmi::Caller<'_, Vec<String>>, value: i32| {
                    caller.data_mut().push(value.to_string());
                },
            )
            .expect("link print_int");
        linker
            .func_wrap(
                "rill",
                "print_str",
                |mut caller: wasmi::Caller<'_, Vec<String>>, offset: i32| {
                    let memory = caller
                        .get_export("memory")
                        .and_then(wasmi::Extern::into_memory)
                        .expect("exported memory");
                    let mut word = [0u8; 4];
                    memory
                        .read(&caller, offset as usize, &mut word)
                        .expect("read length");
                    let len = i32::from_le_bytes(word) as usize;
                    let mut bytes = vec![0u8; len];
                    memory
                        .read(&caller, offset as usize + 4, &mut bytes)
                        .expect("read payload");
                    let text = String::from_utf8(bytes).expect("utf-8 payload");
                    caller.data_mut().push(text);
                },
            )
            .expect("link print_str");
        let mut store = wasmi::Store::new(&engine, Vec::new());
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        (store, instance)
    }

    #[test]
    fn modules_validate() {
        let wasm = compile(
            "function add(x: Int, y: Int): Int = x + y \
             function greet() = print_str(\"hi\") \
             function first(xs: [Int]): Int = get(xs, 0)",
        );
        wasmparser::validate(&wasm).expect("valid module");
    }

    #[test]
    fn executes_arithmetic_item() {
        let wasm = compile("function add(x: Int, y: Int): Int = x + y");
        let (mut store, instance) = instantiate(&wasm);
        let add = instance
            .get_typed_func::<(i32, i32), i32>(&store, "add")
            .expect("typed func");
        assert_eq!(add.call(&mut store, (2, 3)).expect("call"), 5);
    }

    #[test]
    fn let_bindings_map_to_locals() {
        let wasm = compile(
            "function f(x: Int): Int = let a = x * 2 in let b = a + 1 in a + b",
        );
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, 10).expect("call"), 41);
    }

    #[test]
    fn sibling_lets_share_a_slot() {
        let wasm = compile(
            "function f(x: Int): Int = (let a = x + 1 in a * a) + (let b = x - 1 in b * b)",
        );
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, 3).expect("call"), 20);
    }

    #[test]
    fn shadowing_reads_the_innermost_binding() {
        let wasm = compile("function f(x: Int): Int = let x = x + 1 in let x = x * 10 in x");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, 4).expect("call"), 50);
    }

    #[test]
    fn recursion_through_if() {
        let wasm = compile(
            "function fib(n: Int): Int = if n < 2 then n else fib(n - 1) + fib(n - 2)",
        );
        let (mut store, instance) = instantiate(&wasm);
        let fib = instance
            .get_typed_func::<i32, i32>(&store, "fib")
            .expect("typed func");
        assert_eq!(fib.call(&mut store, 10).expect("call"), 55);
    }

    #[test]
    fn logical_operators_do_not_short_circuit_results() {
        let wasm = compile(
            "function f(a: Int, b: Int): Int = if a < b && b < 10 then 1 else 0",
        );
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<(i32, i32), i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, (1, 2)).expect("call"), 1);
        assert_eq!(f.call(&mut store, (3, 2)).expect("call"), 0);
    }

    #[test]
    fn print_builtins_reach_the_host() {
        let wasm = compile(
            "function main() = { print_int(7); print_str(\"seven\") }",
        );
        let (mut store, instance) = instantiate(&wasm);
        let main = instance
            .get_typed_func::<(), ()>(&store, "main")
            .expect("typed func");
        main.call(&mut store, ()).expect("call");
        assert_eq!(store.data().as_slice(), ["7", "seven"]);
    }

    #[test]
    fn lists_support_len_and_get() {
        let wasm = compile(
            "function f(): Int = let xs = list3(10, 20, 30) in len(xs) + get(xs, 2)",
        );
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<(), i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, ()).expect("call"), 33);
    }

    #[test]
    fn empty_list_has_length_zero() {
        let wasm = compile("function f(): Int = len(list0())");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<(), i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, ()).expect("call"), 0);
    }

    #[test]
    fn blocks_drop_intermediate_values() {
        let wasm = compile("function f(x: Int): Int = { x + 1; x + 2; x * 2 }");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, 5).expect("call"), 10);
    }

    #[test]
    fn block_lets_scope_to_the_rest_of_the_block() {
        let wasm = compile("function f(x: Int): Int = { let y = x * 2; let z = y + 1; y + z }");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, 3).expect("call"), 13);
    }

    #[test]
    fn duplicate_string_literals_share_data() {
        let program = typecheck(
            resolve(
                parse("function f() = { print_str(\"x\"); print_str(\"x\") }").expect("parse"),
            )
            .expect("resolve"),
        )
        .expect("typecheck");
        let usage = collect_usage(&program);
        let layout = ModuleLayout::build(&program, &usage).expect("layout");
        // One data record: 4-byte length plus one byte of payload.
        assert_eq!(layout.data.len(), 5);
        wasmparser::validate(&emit_program(&program).expect("emit")).expect("valid module");
    }

    #[test]
    fn unit_results_produce_no_value() {
        let wasm = compile("function f(n: Int) = if n > 0 then print_int(n)");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<i32, ()>(&store, "f")
            .expect("typed func");
        f.call(&mut store, 3).expect("call");
        f.call(&mut store, -3).expect("call");
        assert_eq!(store.data().as_slice(), ["3"]);
    }

    #[test]
    fn function_values_are_rejected() {
        let program = typecheck(
            resolve(
                parse("function id(x: Int): Int = x function f(): Int = let g = id in g(1)")
                    .expect("parse"),
            )
            .expect("resolve"),
        )
        .expect("typecheck");
        let err = emit_program(&program).expect_err("function value must be rejected");
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }

    #[test]
    fn later_duplicate_item_wins_the_export() {
        let wasm = compile("function f(): Int = 1 function f(): Int = 2");
        let (mut store, instance) = instantiate(&wasm);
        let f = instance
            .get_typed_func::<(), i32>(&store, "f")
            .expect("typed func");
        assert_eq!(f.call(&mut store, ()).expect("call"), 2);
    }
}
