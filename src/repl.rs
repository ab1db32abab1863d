use dux::config::Config;
use dux::lexer::TokenKind;
use dux::{printer, CompileError, Unit};
use logos::Logos;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::fs;
use thiserror::Error;

const BANNER: &str = r#"
  ____
 |  _ \ _   ___  __
 | | | | | | \ \/ /
 | |_| | |_| |>  <
 |____/ \__,_/_/\_\

"#;

pub fn run_repl(config: Config) {
    println!("{}", BANNER);
    println!("Dux REPL v{}", dux::VERSION);
    println!("Type code to see the IR it compiles to.");
    println!("Type .help for commands, .exit to quit.");
    println!("Use arrow keys for history.\n");

    if let Err(e) = repl_loop(config) {
        eprintln!("REPL error: {}", e);
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("fn main is already defined, so bare statements have nowhere to go")]
    MainDefined,
}

/// Everything typed so far. Declarations stay at the top level, bare
/// statements accumulate in the body of a generated `main`.
#[derive(Debug, Default, Clone)]
pub struct Session {
    declarations: Vec<String>,
    statements: Vec<String>,
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session {
            config,
            ..Default::default()
        }
    }

    /// Add one chunk of input as a declaration or a statement.
    ///
    /// Bare statements become the body of a generated `main`, so they cannot
    /// be mixed with a `main` declared by hand.
    pub fn push(&mut self, chunk: &str) -> Result<(), SessionError> {
        if is_declaration(chunk) {
            if declares_main(chunk) && !self.statements.is_empty() {
                return Err(SessionError::MainDefined);
            }
            self.declarations.push(chunk.to_string());
        } else {
            if self.declarations.iter().any(|d| declares_main(d)) {
                return Err(SessionError::MainDefined);
            }
            self.statements.push(chunk.to_string());
        }
        Ok(())
    }

    pub fn source(&self) -> String {
        let mut source = self.declarations.join("\n");
        if !self.statements.is_empty() {
            source.push_str("\nfn main() {\n");
            for stmt in &self.statements {
                source.push_str(stmt);
                source.push('\n');
            }
            source.push_str("}\n");
        }
        source
    }

    pub fn compile(&self) -> Result<Unit, CompileError> {
        dux::compile_unit(&self.source(), &self.config)
    }
}

/// Turn `-e` code into a full program the same way the REPL does.
pub fn wrap_statements(code: &str) -> Result<String, SessionError> {
    let mut session = Session::default();
    for chunk in split_chunks(code) {
        session.push(&chunk)?;
    }
    Ok(session.source())
}

/// Split input into top-level chunks: each ends on a line where the braces
/// opened so far are all closed again.
fn split_chunks(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for line in input.lines() {
        if line.trim().is_empty() && depth == 0 {
            continue;
        }
        depth += brace_delta(line);
        current.push_str(line);
        current.push('\n');
        if depth <= 0 {
            chunks.push(current.trim_end().to_string());
            current.clear();
            depth = 0;
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

fn brace_delta(line: &str) -> i32 {
    line.chars()
        .map(|c| match c {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum()
}

fn is_declaration(chunk: &str) -> bool {
    matches!(
        TokenKind::lexer(chunk).next(),
        Some(Ok(TokenKind::Fn | TokenKind::Struct))
    )
}

fn declares_main(chunk: &str) -> bool {
    let mut lexer = TokenKind::lexer(chunk);
    matches!(lexer.next(), Some(Ok(TokenKind::Fn)))
        && matches!(lexer.next(), Some(Ok(TokenKind::Identifier)))
        && lexer.slice() == "main"
}

fn repl_loop(config: Config) -> RlResult<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session::new(config);
    let mut input_buffer = String::new();
    let mut brace_depth: i32 = 0;
    let mut in_multiline = false;

    let history_path = dirs_history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if in_multiline { "...> " } else { "dux> " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline && trimmed.starts_with('.') {
                    rl.add_history_entry(&line)?;

                    if handle_command(trimmed, &mut session) {
                        break;
                    }
                    continue;
                }

                brace_depth = (brace_depth + brace_delta(&line)).max(0);
                input_buffer.push_str(&line);
                input_buffer.push('\n');

                if brace_depth > 0 {
                    in_multiline = true;
                    continue;
                }

                in_multiline = false;
                let input = input_buffer.trim().to_string();
                if !input.is_empty() {
                    rl.add_history_entry(&input)?;
                    execute_input(&mut session, &input);
                }

                input_buffer.clear();
                brace_depth = 0;
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                input_buffer.clear();
                brace_depth = 0;
                in_multiline = false;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn dirs_history_path() -> Option<String> {
    dirs::home_dir().map(|mut path| {
        path.push(".dux_history");
        path.to_string_lossy().to_string()
    })
}

/// Handle a REPL command. Returns true if the REPL should exit.
fn handle_command(cmd: &str, session: &mut Session) -> bool {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let command = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    match command {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return true;
        }
        ".help" | ".h" => {
            print_repl_help();
        }
        ".clear" => {
            *session = Session::new(session.config.clone());
            println!("Session cleared.");
        }
        ".ir" => match session.compile() {
            Ok(unit) => print!("{}", unit.ir),
            Err(e) => report(&e),
        },
        ".ast" => match session.compile() {
            Ok(unit) => println!("{}", printer::program(&unit.statements)),
            Err(e) => report(&e),
        },
        ".tokens" => match session.compile() {
            Ok(unit) => {
                for token in &unit.tokens {
                    println!("{}", token);
                }
            }
            Err(e) => report(&e),
        },
        ".target" => {
            if let Some(triple) = arg {
                session.config.target_triple = Some(triple.to_string());
            }
            println!("Target: {}", session.config.target_triple());
        }
        ".load" => {
            if let Some(filename) = arg {
                load_file(session, filename);
            } else {
                eprintln!("Usage: .load <file.{}>", dux::FILE_EXTENSION);
            }
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Type .help for available commands.");
        }
    }

    false
}

fn report(err: &CompileError) {
    match err {
        CompileError::Syntax(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
        }
        other => eprintln!("{}", other),
    }
}

fn load_file(session: &mut Session, filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read '{}': {}", filename, e);
            return;
        }
    };

    let mut candidate = session.clone();
    for chunk in split_chunks(&source) {
        if let Err(e) = candidate.push(&chunk) {
            eprintln!("{}", e);
            return;
        }
    }
    match candidate.compile() {
        Ok(unit) => {
            *session = candidate;
            let names: Vec<String> = unit
                .statements
                .iter()
                .filter_map(|s| match s {
                    dux::ast::Stmt::Function(f) => Some(f.name.clone()),
                    dux::ast::Stmt::Struct(s) => Some(s.name.clone()),
                    _ => None,
                })
                .collect();
            if !names.is_empty() {
                println!("Defined: {}", names.join(", "));
            }
            println!("Loaded {}", filename);
        }
        Err(e) => report(&e),
    }
}

/// Compile the session with `input` added; keep the input only if the
/// whole program still compiles.
fn execute_input(session: &mut Session, input: &str) {
    let mut candidate = session.clone();
    let chunks = split_chunks(input);
    for chunk in &chunks {
        if let Err(e) = candidate.push(chunk) {
            eprintln!("{}", e);
            return;
        }
    }

    let unit = match candidate.compile() {
        Ok(unit) => unit,
        Err(e) => {
            report(&e);
            return;
        }
    };
    *session = candidate;

    for chunk in chunks.iter().filter(|c| is_declaration(c)) {
        let mut words = chunk.split_whitespace();
        if let (Some(kind), Some(name)) = (words.next(), words.next()) {
            let name = name.split(['(', '{']).next().unwrap_or(name);
            let what = if kind == "fn" { "function" } else { "struct" };
            println!("Defined {}: {}", what, name);
        }
    }

    if chunks.iter().any(|c| !is_declaration(c)) {
        print!("{}", function_ir(&unit.ir, "main"));
    }
}

/// The `define` block of one function, cut out of a module.
fn function_ir(ir: &str, name: &str) -> String {
    let header = format!("@{}(", name);
    let mut out = String::new();
    let mut inside = false;
    for line in ir.lines() {
        if line.starts_with("define") && line.contains(&header) {
            inside = true;
        }
        if inside {
            out.push_str(line);
            out.push('\n');
            if line == "}" {
                break;
            }
        }
    }
    out
}

fn print_repl_help() {
    println!(
        r#"
REPL Commands:
    .help, .h          Show this help message
    .exit, .quit, .q   Exit the REPL
    .clear             Forget everything typed so far
    .ir                Print the IR of the whole session
    .ast               Print the analyzed AST
    .tokens            Print the token stream
    .target [triple]   Show or set the target triple
    .load <file>       Add the declarations of a .dux file

Navigation:
    Up/Down arrows     Navigate command history
    Ctrl-C             Cancel current input
    Ctrl-D             Exit REPL

Examples:
    x := 3             Statements go into fn main()
    x += 4
    printf("%d\n", x)

    fn square(n: i32) -> i32 {{ return n * n }}
                       Declarations stay at the top level

Tips:
    - Multi-line input: open braces are auto-detected
    - Input that does not compile is dropped
    - History is saved to ~/.dux_history
"#
    );
}
