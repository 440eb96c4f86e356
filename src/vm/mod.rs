//! The bytecode interpreter: a flat `match` over [`Opcode`](crate::compiler::Opcode)
//! standing in for a C VM's 256-entry function-pointer jump table; a `match`
//! on a tagged enum is the idiomatic Rust rendition of the same dispatch.

mod machine;

pub use machine::{RuntimeHalt, Vm};

use crate::util::Log;

/// Run-time knobs.
#[derive(Debug, Clone)]
pub struct VmOptions {
    pub trace: Log<()>,
    /// Seeds the value stack's first allocation; growth past this is still
    /// `Vec`'s amortized doubling.
    pub initial_stack_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            trace: Log::None,
            initial_stack_capacity: 0,
        }
    }
}
