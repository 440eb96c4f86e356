//! The six concrete end-to-end scenarios, run through the full
//! lex → parse → elaborate → compile → execute pipeline ([`crate::run`]).
//!
//! `PRINT` writes straight to stdout and there's nothing worth capturing it
//! with here, but since `PRINT` peeks rather than pops, the printed value is
//! exactly what's left on top of the VM's stack when it halts — so these
//! assert against `vm.stack()` instead of scraping output.

use crate::vm::{RuntimeHalt, VmOptions};
use crate::value::Value;
use crate::{run, CurlyError};

#[test]
fn arithmetic_precedence() {
    let vm = run("1 + 2 * 3\n", VmOptions::default()).unwrap();
    assert_eq!(vm.stack(), &[Value::Int(7)]);
}

#[test]
fn mixed_arithmetic_widens_to_float() {
    let vm = run("1.0 + 2\n", VmOptions::default()).unwrap();
    assert_eq!(vm.stack(), &[Value::Float(3.0)]);
    assert_eq!(format!("{}", vm.stack()[0]), "3.000000");
}

#[test]
fn globals_created_in_order_only_last_statement_prints() {
    let vm = run("x = 40\ny = 2\nx + y\n", VmOptions::default()).unwrap();
    assert_eq!(vm.globals(), &[Value::Int(40), Value::Int(2)]);
    assert_eq!(vm.stack(), &[Value::Int(42)]);
}

#[test]
fn with_expression_pops_its_local_frame_after_the_result() {
    let vm = run("with a = 10, b = 32, a + b\n", VmOptions::default()).unwrap();
    assert_eq!(vm.stack(), &[Value::Int(42)]);
}

#[test]
fn modulo_by_zero_halts_the_vm() {
    let vm = run("10 % 0\n", VmOptions::default()).unwrap();
    assert!(!vm.is_running());
    assert!(matches!(vm.last_error(), Some(RuntimeHalt::ModuloByZero { .. })));
}

#[test]
fn typed_assignment_with_mismatched_rhs_is_a_type_error() {
    let err = run("x: Int = 1.0\n", VmOptions::default()).unwrap_err();
    assert!(matches!(err, CurlyError::Type(_)));
}
