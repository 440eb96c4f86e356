//! Lowers an elaborated AST to a [`Chunk`] of bytecode.
//!
//! The opcode family table is fixed and must stay that way: no jump, call,
//! closure or list opcode exists. Constructs whose runtime semantics would
//! need one of those — `if`, quantifiers, list literals and comprehensions,
//! ranges and range-destructuring, first-class function values — type-check
//! fine but are rejected here with [`CompileError::Unsupported`]. Direct,
//! fully-saturated calls to named functions are still supported, by inlining
//! the callee's body against its arguments at the call site rather than
//! emitting a call.

mod chunk;
mod emit;
mod opcode;

pub use chunk::Chunk;
pub use emit::{compile, CompileError, Compiler};
pub use opcode::{ArithFamily, Opcode};

use crate::util::Log;

/// Compile-time knobs, mirroring the grammar/checker modules' options
/// structs.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// When set, a terminating `BREAK` is appended after the last root
    /// statement so the VM halts cleanly instead of running off the end of
    /// `code`.
    pub terminate: bool,
    /// Traces expression dispatch and `with`/call frame push and pop while
    /// compiling, the same `Log` level the VM uses for opcode tracing.
    pub trace: Log<()>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            terminate: false,
            trace: Log::None,
        }
    }
}
