// Shared helpers for building checked programs and running them

#![allow(dead_code)]

use pl0::compiler::syms::{ProcedureEntry, Type, VarEntry};
use pl0::compiler::tree::{BlockNode, ProcedureNode, ProgramNode, Statement};
use pl0::compile_and_run;
use pl0::config::MachineConfig;
use pl0::console::BufferedConsole;
use pl0::reporter::ErrorReporter;

pub fn int_var(ident: &str, level: u32, offset: i32) -> VarEntry {
    VarEntry::new(ident, level, offset, Type::Integer)
}

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

pub fn program(
    locals: Vec<VarEntry>,
    body: Statement,
    procedures: Vec<ProcedureNode>,
) -> ProgramNode {
    ProgramNode {
        main: procedure(0, "<main>", 0, locals, body, procedures),
    }
}

/// Run with the default machine, returning console output and the reporter
pub fn run(program: &ProgramNode, input: &[&str]) -> (String, ErrorReporter) {
    run_with(program, &MachineConfig::default(), input)
}

pub fn run_with(
    program: &ProgramNode,
    config: &MachineConfig,
    input: &[&str],
) -> (String, ErrorReporter) {
    let mut reporter = ErrorReporter::new();
    let machine = compile_and_run(
        program,
        config,
        BufferedConsole::with_input(input.iter().copied()),
        &mut reporter,
    )
    .expect("program should compile and load");
    (machine.into_console().take_output(), reporter)
}

/// Integers written by the program, in order
pub fn written_values(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
