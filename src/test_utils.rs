// Test utilities for building checked programs and loaded machines

use crate::compiler::code::Code;
use crate::compiler::procedures::Procedures;
use crate::compiler::syms::{ProcId, ProcedureEntry, Type, VarEntry};
use crate::compiler::tree::{BlockNode, ProcedureNode, ProgramNode, Statement};
use crate::config::MachineConfig;
use crate::console::BufferedConsole;
use crate::interpreter::StackMachine;
use crate::reporter::ErrorReporter;

/// Integer variable declared at `level`
pub fn int_var(ident: &str, level: u32, offset: i32) -> VarEntry {
    VarEntry::new(ident, level, offset, Type::Integer)
}

/// Procedure declared at `level` whose block holds `locals`
pub fn procedure(
    id: usize,
    ident: &str,
    level: u32,
    locals: Vec<VarEntry>,
    body: Statement,
    procedures: Vec<ProcedureNode>,
) -> ProcedureNode {
    let variable_space = locals.iter().map(VarEntry::space).sum();
    ProcedureNode {
        entry: ProcedureEntry::new(id, ident, level).with_locals(locals),
        block: BlockNode {
            variable_space,
            body,
            procedures,
        },
    }
}

/// Main program with its own locals and nested procedures
pub fn program(
    locals: Vec<VarEntry>,
    body: Statement,
    procedures: Vec<ProcedureNode>,
) -> ProgramNode {
    ProgramNode {
        main: procedure(0, "<main>", 0, locals, body, procedures),
    }
}

/// Compile and run, returning the console output and the reporter
pub fn run_program(program: &ProgramNode, input: &[&str]) -> (String, ErrorReporter) {
    let mut reporter = ErrorReporter::new();
    let machine = crate::compile_and_run(
        program,
        &MachineConfig::default(),
        BufferedConsole::with_input(input.iter().copied()),
        &mut reporter,
    )
    .expect("program should compile and load");
    (machine.into_console().take_output(), reporter)
}

/// Machine whose main program is exactly `code`
pub fn machine_for(code: Code) -> StackMachine<BufferedConsole> {
    machine_with_input(code, &[])
}

pub fn machine_with_input(code: Code, input: &[&str]) -> StackMachine<BufferedConsole> {
    let mut procedures = Procedures::new(1000);
    procedures.add_procedure(ProcedureEntry::new(0, "<main>", 0), code);
    procedures.set_main(ProcId(0));
    StackMachine::new(
        &MachineConfig::default(),
        procedures,
        BufferedConsole::with_input(input.iter().copied()),
    )
    .expect("code should load")
}

/// The integers written by a program, skipping any other console text
pub fn written_values(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
