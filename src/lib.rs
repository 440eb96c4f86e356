//! Curly: a small expression-oriented language compiled to a stack-machine
//! bytecode.
//!
//! A program runs through five stages, each its own module:
//! [`lexer`] turns source text into a [`token::Token`] stream, [`grammar`]
//! parses that stream into an [`ast::AstNode`] tree with a combinator
//! library ([`combinator`]) built for exactly that, [`checker`] elaborates
//! the tree against a [`types::TypeRegistry`] and lexical [`scope::Scope`],
//! [`compiler`] lowers the elaborated tree to a [`compiler::Chunk`] of
//! bytecode, and [`vm`] runs it.
//!
//! [`run`] wires all five stages together for the common case of "compile
//! and execute this source string".

pub mod ast;
pub mod checker;
pub mod combinator;
pub mod compiler;
pub mod grammar;
pub mod lexer;
pub mod scope;
pub mod token;
pub mod types;
pub mod util;
pub mod value;
pub mod vm;

#[cfg(test)]
mod end_to_end;

use checker::{Elaborator, TypeError};
use combinator::ParseFailure;
use compiler::{CompileError, CompilerOptions};
use grammar::Grammar;
use types::TypeRegistry;
use vm::{Vm, VmOptions};

/// Everything that can go wrong turning source text into a running program,
/// one variant per pipeline stage: parse, type and compile errors. A
/// [`vm::RuntimeHalt`] is reported through the returned [`Vm`] instead,
/// since by that point the program is running.
#[derive(Debug, Clone)]
pub enum CurlyError {
    Parse(ParseFailure),
    Type(TypeError),
    Compile(CompileError),
}

impl From<ParseFailure> for CurlyError {
    fn from(e: ParseFailure) -> Self {
        CurlyError::Parse(e)
    }
}

impl From<TypeError> for CurlyError {
    fn from(e: TypeError) -> Self {
        CurlyError::Type(e)
    }
}

impl From<CompileError> for CurlyError {
    fn from(e: CompileError) -> Self {
        CurlyError::Compile(e)
    }
}

/// Compiles `source` to a [`compiler::Chunk`], stopping at the first parse,
/// type or compile error.
pub fn compile_source(
    source: &str,
    grammar: &Grammar,
    registry: &mut TypeRegistry,
    options: CompilerOptions,
) -> Result<compiler::Chunk, CurlyError> {
    let mut root = grammar.parse(source)?;
    Elaborator::new(registry).elaborate_root(&mut root)?;
    Ok(compiler::compile(&root, registry, options)?)
}

/// Compiles and runs `source` against a fresh [`TypeRegistry`], returning
/// the [`Vm`] after it halts so the caller can inspect its stack, globals,
/// or [`vm::RuntimeHalt`].
pub fn run(source: &str, options: VmOptions) -> Result<Vm, CurlyError> {
    let grammar = Grammar::new();
    let mut registry = TypeRegistry::new();
    let chunk = compile_source(source, &grammar, &mut registry, CompilerOptions { terminate: true, ..Default::default() })?;
    let mut vm = Vm::new(chunk, options);
    vm.run();
    Ok(vm)
}
