use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use rill_core::{CompilationArtifact, CoreError, Diagnostic, check, compile_wasm};
use wasmi::{Caller, Engine, Extern, Linker, Module, Store, Val};

#[derive(Parser, Debug)]
#[command(version, about = "Compiler for the Rill language", long_about = None)]
struct Cli {
    /// Input file; reads stdin when omitted.
    #[arg(short, long)]
    input: Option<String>,

    /// Output file; required for wasm unless --run is given.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "wasm",
        help = "Output format: wasm, ast"
    )]
    emit: String,

    #[arg(long, help = "Execute the compiled module")]
    run: bool,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "main",
        help = "Exported function to call with --run"
    )]
    invoke: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {path}"))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    match cli.emit.as_str() {
        "wasm" => {
            let artifact = compile_wasm(&source).map_err(|err| report(err, &source))?;
            if let Some(path) = &cli.output {
                write_output(path, &artifact.wasm)?;
            } else if !cli.run {
                bail!("nothing to do: pass --output to keep the module or --run to execute it");
            }
            if cli.run {
                run_wasm(&artifact, &cli.invoke)?;
            }
        }
        "ast" => {
            let program = check(&source).map_err(|err| report(err, &source))?;
            let rendered = rill_core::pretty::render_program(&program);
            match &cli.output {
                Some(path) => write_output(path, rendered.as_bytes())?,
                None => print!("{rendered}"),
            }
            if cli.run {
                eprintln!("--run is ignored for non-wasm outputs");
            }
        }
        other => return Err(anyhow!("unsupported emit format: {other}")),
    }

    Ok(())
}

/// Render user-facing errors as caret diagnostics against the source;
/// errors without a location pass through unchanged.
fn report(err: CoreError, source: &str) -> anyhow::Error {
    match err.span() {
        Some(span) => anyhow!("{}", Diagnostic::error(err.to_string(), span).render(source)),
        None => anyhow!(err),
    }
}

fn write_output(path: &str, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}

fn run_wasm(artifact: &CompilationArtifact, invoke: &str) -> Result<()> {
    let engine = Engine::default();
    let module = Module::new(&engine, &artifact.wasm).context("failed to load wasm artifact")?;
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap("rill", "print_int", |value: i32| {
            println!("{value}");
        })
        .context("failed to link print_int")?;
    linker
        .func_wrap(
            "rill",
            "print_str",
            |caller: Caller<'_, ()>, offset: i32| {
                println!("{}", read_string(&caller, offset));
            },
        )
        .context("failed to link print_str")?;
    let mut store = Store::new(&engine, ());
    let instance = linker
        .instantiate_and_start(&mut store, &module)
        .context("failed to instantiate module")?;

    let func = instance
        .get_func(&store, invoke)
        .ok_or_else(|| anyhow!("module does not export a function named `{invoke}`"))?;
    let ty = func.ty(&store);
    if !ty.params().is_empty() {
        bail!("`{invoke}` takes arguments and cannot be invoked from the command line");
    }
    let mut results = vec![Val::I32(0); ty.results().len()];
    func.call(&mut store, &[], &mut results)
        .with_context(|| format!("failed to execute `{invoke}`"))?;
    if let Some(Val::I32(value)) = results.first() {
        println!("{invoke} returned {value}");
    }
    Ok(())
}

/// Read a length-prefixed UTF-8 string out of the module's memory.
fn read_string(caller: &Caller<'_, ()>, offset: i32) -> String {
    let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
        return String::from("<no memory export>");
    };
    let mut word = [0u8; 4];
    if memory.read(caller, offset as usize, &mut word).is_err() {
        return String::from("<bad string offset>");
    }
    let len = i32::from_le_bytes(word) as usize;
    let mut bytes = vec![0u8; len];
    if memory.read(caller, offset as usize + 4, &mut bytes).is_err() {
        return String::from("<bad string payload>");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
