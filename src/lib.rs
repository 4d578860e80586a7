#![crate_name = "pl0"]

//! Code generation and a stack machine for a small Pascal-like language.
//!
//! A checked syntax tree is lowered by [`compiler::Compiler`] into a table
//! of procedures, which [`interpreter::StackMachine`] loads into a flat word
//! memory and executes.

pub mod compiler;
pub mod config;
pub mod console;
pub mod instruction;
pub mod interpreter;
pub mod loader;
pub mod operation;
pub mod reporter;
pub mod trace;
pub mod traceback;
pub mod vm;

#[cfg(test)]
mod test_utils;

use crate::compiler::tree::ProgramNode;
use crate::compiler::{Compiler, CompilerError};
use crate::config::MachineConfig;
use crate::console::Console;
use crate::interpreter::StackMachine;
use crate::reporter::ErrorReporter;

/// Generate code for `program`, load it and run it to completion. Runtime
/// errors are reported on the console and recorded in `reporter`.
pub fn compile_and_run<C: Console>(
    program: &ProgramNode,
    config: &MachineConfig,
    console: C,
    reporter: &mut ErrorReporter,
) -> Result<StackMachine<C>, CompilerError> {
    let procedures = Compiler::with_code_start(config.code_start).compile(program, reporter)?;
    let mut machine = StackMachine::new(config, procedures, console)?;
    machine.run(reporter);
    Ok(machine)
}
