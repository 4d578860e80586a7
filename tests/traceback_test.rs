// Trace backs and stack dumps after runtime errors

mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{int_var, procedure, program, run, run_with};
use pl0::compiler::tree::{Exp, Operator, ProgramNode, Statement};
use pl0::compiler::RuntimeError;
use pl0::config::MachineConfig;
use test_log::test;

fn divide_by_zero() -> Statement {
    Statement::Write(Exp::binary(
        Operator::Div,
        Exp::constant(1),
        Exp::constant(0),
    ))
}

/// main calls p, which calls q; q has one local and fails
fn nested_failure(q_body: Vec<Statement>) -> ProgramNode {
    let g = int_var("g", 1, 3);
    let x = int_var("x", 3, 3);
    let mut body = vec![Statement::assign(Exp::variable(&x), Exp::constant(7))];
    body.extend(q_body);
    body.push(divide_by_zero());
    let q = procedure(2, "q", 2, vec![x], Statement::List(body), vec![]);
    let p = procedure(
        1,
        "p",
        1,
        vec![],
        Statement::Call(q.entry.reference()),
        vec![q],
    );
    let main_body = Statement::List(vec![
        Statement::assign(Exp::variable(&g), Exp::constant(6)),
        Statement::Call(p.entry.reference()),
    ]);
    program(vec![g], main_body, vec![p])
}

fn line_index(output: &str, needle: &str) -> usize {
    output
        .lines()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("no line containing {:?} in\n{}", needle, output))
}

#[test]
fn test_trace_back_walks_every_frame() {
    let (output, reporter) = run(&nested_failure(vec![]), &[]);
    assert_eq!(reporter.runtime_errors(), &[RuntimeError::DivideByZero]);

    let q = line_index(&output, " in q FP=7 SL=4 DL=4 RA=");
    let x = line_index(&output, "  x(3) = 7");
    let p = line_index(&output, " in p FP=4 SL=0 DL=0 RA=");
    let main = line_index(&output, " in <main> FP=0 SL=0 DL=0 RA=0");
    let g = line_index(&output, "  g(3) = 6");
    let end = line_index(&output, "End of traceBack");
    assert!(q < x && x < p && p < main && main < g && g < end);
    assert!(!output.contains("Stack pointer"));
}

#[test]
fn test_corrupt_dynamic_link_ends_trace_back() {
    for corrupt in [50, -2] {
        let g = int_var("g", 1, 3);
        let link = int_var("link", 2, 1);
        let p = procedure(
            1,
            "p",
            1,
            vec![],
            Statement::List(vec![
                Statement::assign(Exp::variable(&link), Exp::constant(corrupt)),
                divide_by_zero(),
            ]),
            vec![],
        );
        let body = Statement::Call(p.entry.reference());
        let (output, reporter) = run(&program(vec![g], body, vec![p]), &[]);

        assert_eq!(reporter.runtime_errors(), &[RuntimeError::DivideByZero]);
        assert!(output.contains(&format!(" in p FP=4 SL=0 DL={} RA=", corrupt)));
        assert!(output.contains(&format!(
            "Trace back terminated early - invalid dynamic link {} FP= 4",
            corrupt
        )));
        assert!(output.contains("\nStack pointer = "));
        assert!(output.contains(" FP: 4   : 0\n"), "{}", output);
        assert!(!output.contains("End of traceBack"));
        assert!(output.ends_with("\nTerminated\n"));
    }
}

#[test]
fn test_dynamic_link_inside_own_frame_is_invalid() {
    // q's caller frame would overlap q's own header
    let dl = int_var("dl", 3, 1);
    let (output, _) = run(
        &nested_failure(vec![Statement::assign(Exp::variable(&dl), Exp::constant(5))]),
        &[],
    );
    assert!(output.contains("Trace back terminated early - invalid dynamic link 5 FP= 7"));
}

#[test]
fn test_corrupt_return_address_ends_trace_back() {
    let ra = int_var("ra", 3, 2);
    let (output, _) = run(
        &nested_failure(vec![Statement::assign(Exp::variable(&ra), Exp::constant(5))]),
        &[],
    );
    assert!(output.contains(" in q FP=7 SL=4 DL=4 RA=5"));
    assert!(output.contains("Trace back terminated early - PC 5 out of valid range"));
    assert!(output.contains("\nStack pointer = "));
    assert!(!output.contains(" in p "));
}

#[test]
fn test_runaway_recursion_overflows_stack() {
    let config = MachineConfig::from_toml_str("code_start = 100\nmemory_size = 200\n").unwrap();
    let entry = pl0::compiler::syms::ProcedureEntry::new(1, "p", 1);
    let p = procedure(1, "p", 1, vec![], Statement::Call(entry.reference()), vec![]);
    let body = Statement::Call(entry.reference());
    let (output, reporter) = run_with(&program(vec![], body, vec![p]), &config, &[]);

    assert_eq!(reporter.runtime_errors(), &[RuntimeError::StackOverflow]);
    assert!(output.contains("Runtime error: memory overflow!"));
    // three word frames from 3 up to the code origin
    let frames = output.lines().filter(|line| line.contains(" in p FP=")).count();
    assert_eq!(frames, 32);
    assert!(output.contains("End of traceBack"));
}

#[test]
fn test_main_frame_return_address_ends_trace_back() {
    let ra = int_var("ra", 1, 2);
    let body = Statement::List(vec![
        Statement::assign(Exp::variable(&ra), Exp::constant(1001)),
        divide_by_zero(),
    ]);
    let prog = program(vec![], body, vec![]);

    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(run(&prog, &[]));
    });
    let (output, reporter) = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("trace back should finish");

    assert_eq!(reporter.runtime_errors(), &[RuntimeError::DivideByZero]);
    let frames = output.lines().filter(|line| line.contains(" in <main> FP=")).count();
    assert_eq!(frames, 1);
    assert!(output.contains(" in <main> FP=0 SL=0 DL=0 RA=1001"));
    assert!(output.contains("Trace back terminated early - invalid return address 1001 FP= 0"));
    assert!(output.contains("\nStack pointer = "));
    assert!(!output.contains("End of traceBack"));
    assert!(output.ends_with("\nTerminated\n"));
}
