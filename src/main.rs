mod repl;

use clap::Parser;
use dux::config::Config;
use dux::{printer, CompileError};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dux")]
#[command(version = dux::VERSION)]
#[command(about = "The Dux compiler - lowers .dux source files to textual LLVM IR", long_about = None)]
#[command(after_help = "EXAMPLES:
    dux hello.dux hello.ll        Compile a file
    dux hello.dux | clang -x ir - Compile and hand the IR to clang
    dux -e 'printf(\"%d\\n\", 6 * 7)'
    dux                           Start the REPL")]
struct Cli {
    /// Source file to compile, or `-` for stdin. Starts the REPL when omitted
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// Where to write the IR (stdout when omitted)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Compile code given on the command line; bare statements go into `fn main()`
    #[arg(short = 'e', value_name = "CODE", conflicts_with = "source")]
    code: Option<String>,

    /// Target triple written into the IR header (overrides `#target`)
    #[arg(long, value_name = "TRIPLE")]
    target: Option<String>,

    /// Dump tokens to stderr
    #[arg(long)]
    emit_tokens: bool,

    /// Dump the analyzed AST to stderr
    #[arg(long)]
    emit_ast: bool,

    /// Report each stage on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Start the REPL (interactive mode)
    #[arg(short = 'i', long)]
    repl: bool,
}

fn read_source(path: &Path) -> miette::Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| miette::miette!("Failed to read stdin: {}", e))?;
        return Ok(source);
    }

    if path.extension().and_then(|e| e.to_str()) != Some(dux::FILE_EXTENSION) {
        eprintln!(
            "warning: '{}' does not have a .{} extension",
            path.display(),
            dux::FILE_EXTENSION
        );
    }
    fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read '{}': {}", path.display(), e))
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = Config {
        target_triple: cli.target.clone(),
    };

    let (name, source) = match (&cli.code, &cli.source) {
        _ if cli.repl => {
            repl::run_repl(config);
            return Ok(());
        }
        (Some(code), _) => {
            let source = repl::wrap_statements(code).map_err(|e| miette::miette!("{}", e))?;
            ("<command line>".to_string(), source)
        }
        (None, Some(path)) => (path.display().to_string(), read_source(path)?),
        (None, None) => {
            repl::run_repl(config);
            return Ok(());
        }
    };

    if cli.verbose {
        eprintln!("Compiling {}...", name);
    }

    let unit = match dux::compile_unit(&source, &config) {
        Ok(unit) => unit,
        Err(CompileError::Syntax(errors)) => {
            for err in &errors {
                eprintln!("{}", err);
            }
            return Err(miette::miette!("Found {} syntax error(s)", errors.len()));
        }
        Err(e) => {
            eprintln!("{}", e);
            return Err(miette::miette!("Compilation of {} failed", name));
        }
    };

    if cli.emit_tokens {
        eprintln!("=== Tokens ===");
        for token in &unit.tokens {
            eprintln!("{}", token);
        }
    }

    if cli.emit_ast {
        eprintln!("=== AST ===");
        eprintln!("{}", printer::program(&unit.statements));
    }

    if cli.verbose {
        eprintln!("  target: {}", unit.target_triple);
        eprintln!("  {} tokens", unit.tokens.len());
        eprintln!("  {} top-level declarations", unit.statements.len());
    }

    match &cli.output {
        Some(path) => {
            fs::write(path, &unit.ir)
                .map_err(|e| miette::miette!("Failed to write '{}': {}", path.display(), e))?;
            if cli.verbose {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => print!("{}", unit.ir),
    }

    Ok(())
}
