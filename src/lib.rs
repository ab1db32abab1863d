//! The Dux compiler: lowers `.dux` source files to textual LLVM IR.
//!
//! The pipeline runs strictly forward: [`lexer`] → [`parser`] → [`sema`]
//! → [`codegen`]. [`compile`] drives all of it.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod sema;
pub mod types;

use ast::Stmt;
use codegen::CodegenError;
use config::Config;
use lexer::{LexError, Token};
use parser::ParseError;
use sema::SemanticError;
use thiserror::Error;

pub const VERSION: &str = "0.1.0";
pub const FILE_EXTENSION: &str = "dux";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{}", render_syntax_errors(.0))]
    Syntax(Vec<ParseError>),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

fn render_syntax_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything one successful compilation produced, for the debugging flags.
#[derive(Debug, Clone)]
pub struct Unit {
    pub tokens: Vec<Token>,
    /// The analyzed tree, with every expression annotated.
    pub statements: Vec<Stmt>,
    pub target_triple: String,
    pub ir: String,
}

/// Compile Dux source to IR text. `config` holds command-line settings,
/// which win over `#target` directives in the source.
pub fn compile(source: &str, config: &Config) -> Result<String, CompileError> {
    compile_unit(source, config).map(|unit| unit.ir)
}

pub fn compile_unit(source: &str, config: &Config) -> Result<Unit, CompileError> {
    let (source, directives) = config::process_directives(source);
    let config = directives.merge(config.clone());

    let tokens = lexer::lex(&source)?;

    let (program, errors) = parser::parse(tokens.clone());
    if !errors.is_empty() {
        return Err(CompileError::Syntax(errors));
    }

    let mut statements = program.statements;
    let scope = sema::analyze(&mut statements, program.scope)?;

    let ir = codegen::generate(&statements, &scope, config.target_triple())?;
    Ok(Unit {
        tokens,
        statements,
        target_triple: config.target_triple().to_string(),
        ir,
    })
}
