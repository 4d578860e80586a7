use log::{debug, info};

pub use crate::compiler::error::RuntimeError;

use crate::compiler::codegen::CASE_LABEL_MISSING;
use crate::compiler::error::CompilerError;
use crate::compiler::procedures::Procedures;
use crate::config::MachineConfig;
use crate::console::Console;
use crate::loader::load_program;
use crate::operation::Operation;
use crate::reporter::ErrorReporter;
use crate::trace::{Trace, TraceSet};
use crate::vm::{Word, FALSE_VALUE, LOCALS_BASE, RETURN_ADDRESS, TRUE_VALUE, VM};

/// Result of executing a single instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Continue with the next instruction
    Continue,
    /// Branch taken, PC already updated
    Branched,
    /// Procedure called, PC updated
    Called,
    /// Procedure returned to its caller
    Returned,
    /// Main program returned
    Terminated,
}

/// The stack machine interpreter
pub struct StackMachine<C: Console> {
    /// The VM state
    pub vm: VM,
    /// Loaded procedures, for traces and trace backs
    pub(crate) procedures: Procedures,
    pub(crate) console: C,
    tracing: TraceSet,
    running: bool,
    instruction_count: u64,
}

impl<C: Console> StackMachine<C> {
    /// Load the procedures into a fresh machine
    pub fn new(
        config: &MachineConfig,
        procedures: Procedures,
        mut console: C,
    ) -> Result<Self, CompilerError> {
        config.validate().map_err(CompilerError::InvalidConfig)?;
        let mut vm = VM::new(config);
        load_program(&mut vm, &procedures, &mut console, config.listing)?;
        Ok(StackMachine {
            vm,
            procedures,
            console,
            tracing: config.trace,
            running: false,
            instruction_count: 0,
        })
    }

    pub fn set_tracing(&mut self, tracing: TraceSet) {
        self.tracing = tracing;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn procedures(&self) -> &Procedures {
        &self.procedures
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Run from the main program's entry point until it returns or a
    /// runtime error stops the machine
    pub fn run(&mut self, reporter: &mut ErrorReporter) {
        info!("Starting execution at PC {}", self.vm.pc);
        self.running = true;
        if let Err(e) = self.setup_main_frame() {
            self.runtime_error(e, reporter);
        }
        while self.running {
            match self.step() {
                Ok(ExecutionResult::Terminated) => self.running = false,
                Ok(_) => {}
                Err(e) => self.runtime_error(e, reporter),
            }
        }
        self.console.println("\nTerminated");
        info!(
            "Execution stopped after {} instructions",
            self.instruction_count
        );
    }

    /// Dummy static link, dynamic link and return address for the main
    /// program, whose frame is at address 0
    fn setup_main_frame(&mut self) -> Result<(), RuntimeError> {
        self.vm.fp = 0;
        self.vm.sp = 0;
        for _ in 0..LOCALS_BASE {
            self.push(0)?;
        }
        Ok(())
    }

    fn runtime_error(&mut self, err: RuntimeError, reporter: &mut ErrorReporter) {
        self.running = false;
        self.console.println(&format!("\nRuntime error: {}", err));
        reporter.runtime_error(&err);
        self.trace_back();
    }

    /// Fetch, decode and execute one instruction
    pub fn step(&mut self) -> Result<ExecutionResult, RuntimeError> {
        self.vm.current_pc = self.vm.pc;
        let word = self.vm.fetch()?;
        let op = Operation::from_word(word).ok_or(RuntimeError::InvalidOpcode {
            pc: self.vm.current_pc,
            word,
        })?;
        self.instruction_count += 1;
        if self.tracing.contains(Trace::State) {
            self.trace_state(op);
        }
        self.execute(op)
    }

    fn trace_state(&mut self, op: Operation) {
        let mut text = format!(
            "\nPC: {}: FP: {}  SP: {}  Limit: {}  Opcode: {} ",
            self.vm.current_pc, self.vm.fp, self.vm.sp, self.vm.limit, op
        );
        if op == Operation::LoadCon {
            if let Some(value) = self.vm.word(self.vm.pc) {
                text.push_str(&format!("{} ", value));
            }
        }
        self.console.print(&text);
    }

    fn push(&mut self, value: Word) -> Result<(), RuntimeError> {
        self.vm.push(value)?;
        if self.tracing.contains(Trace::Stack) {
            self.console.print(&format!(" Push({}) ", value));
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Word, RuntimeError> {
        let value = self.vm.pop()?;
        if self.tracing.contains(Trace::Stack) {
            self.console.print(&format!(" Pop() = {} ", value));
        }
        Ok(value)
    }

    fn load(&mut self, address: Word) -> Result<Word, RuntimeError> {
        let value = self.vm.load(address)?;
        if self.tracing.contains(Trace::Memory) {
            self.console
                .print(&format!("\n    Load [{}] => {}", address, value));
        }
        Ok(value)
    }

    fn store(&mut self, address: Word, value: Word) -> Result<(), RuntimeError> {
        self.vm.store(address, value)?;
        if self.tracing.contains(Trace::Memory) {
            self.console
                .print(&format!("\n    Store [{}] <= {}", address, value));
        }
        Ok(())
    }

    fn push_bool(&mut self, value: bool) -> Result<(), RuntimeError> {
        self.push(if value { TRUE_VALUE } else { FALSE_VALUE })
    }

    /// Frame-relative address on top of stack made absolute
    fn pop_frame_address(&mut self) -> Result<Word, RuntimeError> {
        Ok(self.vm.fp.wrapping_add(self.pop()?))
    }

    fn branch(&mut self, offset: Word) -> ExecutionResult {
        self.vm.pc = self.vm.pc.wrapping_add(offset);
        if self.tracing.contains(Trace::Branches) {
            self.console
                .print(&format!("\n      Branch => {}", self.vm.pc));
        }
        ExecutionResult::Branched
    }

    /// Name of the procedure containing `pc`, for traces
    pub(crate) fn procedure_name(&self, pc: Word) -> String {
        usize::try_from(pc)
            .ok()
            .and_then(|pc| self.procedures.get_procedure(pc).ok().flatten())
            .map(|procedure| procedure.entry.ident.clone())
            .unwrap_or_else(|| "?".to_string())
    }

    fn execute(&mut self, op: Operation) -> Result<ExecutionResult, RuntimeError> {
        match op {
            Operation::NoOp => {}
            Operation::Br => {
                let offset = self.pop()?;
                return Ok(self.branch(offset));
            }
            Operation::BrFalse => {
                let offset = self.pop()?;
                match self.pop()? {
                    FALSE_VALUE => return Ok(self.branch(offset)),
                    TRUE_VALUE => {}
                    value => return Err(RuntimeError::NonBooleanBranch { value }),
                }
            }
            Operation::Copy => {
                let size = self.pop()?;
                let to = self.pop_frame_address()?;
                let from = self.pop_frame_address()?;
                for i in 0..size.max(0) {
                    let value = self.load(from.wrapping_add(i))?;
                    self.store(to.wrapping_add(i), value)?;
                }
            }
            Operation::Call => {
                let address = self.pop()?;
                // static link is already on the stack
                self.push(self.vm.fp)?;
                self.vm.fp = self.vm.sp - 2;
                self.push(self.vm.pc)?;
                self.vm.pc = address;
                if self.tracing.contains(Trace::Calls) {
                    let text = format!(
                        "\n      Call => {} at {}",
                        self.procedure_name(address),
                        address
                    );
                    self.console.print(&text);
                }
                return Ok(ExecutionResult::Called);
            }
            Operation::Return => {
                // discards the locals
                self.vm.sp = self.vm.fp.wrapping_add(LOCALS_BASE);
                self.vm.pc = self.pop()?;
                self.vm.fp = self.pop()?;
                self.pop()?;
                if self.vm.pc == 0 {
                    if self.tracing.contains(Trace::Calls) {
                        self.console.println("\n      Exiting program");
                    }
                    debug!("main program returned");
                    return Ok(ExecutionResult::Terminated);
                }
                if self.tracing.contains(Trace::Calls) {
                    let text = format!(
                        "\n      Returning to => {} at {}",
                        self.procedure_name(self.vm.pc),
                        self.vm.pc
                    );
                    self.console.print(&text);
                }
                return Ok(ExecutionResult::Returned);
            }
            Operation::AllocStack => {
                let words = self.pop()?;
                let null = self.vm.null_address();
                for _ in 0..words {
                    self.push(null)?;
                }
            }
            Operation::DeallocStack => {
                let words = self.pop()?;
                if words < 0
                    || self.vm.sp.wrapping_sub(words) <= self.vm.fp.wrapping_add(RETURN_ADDRESS)
                {
                    return Err(RuntimeError::DeallocTooMany);
                }
                self.vm.sp -= words;
            }
            Operation::Pop => {
                self.pop()?;
            }
            Operation::Dup => {
                let value = self.pop()?;
                self.push(value)?;
                self.push(value)?;
            }
            Operation::Swap => {
                let top = self.pop()?;
                let second = self.pop()?;
                self.push(top)?;
                self.push(second)?;
            }
            Operation::Add => {
                let result = self.pop()?.wrapping_add(self.pop()?);
                self.push(result)?;
            }
            Operation::Mpy => {
                let result = self.pop()?.wrapping_mul(self.pop()?);
                self.push(result)?;
            }
            Operation::Div => {
                let divisor = self.pop()?;
                let dividend = self.pop()?;
                if divisor == 0 {
                    return Err(RuntimeError::DivideByZero);
                }
                self.push(dividend.wrapping_div(divisor))?;
            }
            Operation::Or => {
                let result = self.pop()? | self.pop()?;
                self.push(result)?;
            }
            Operation::And => {
                let result = self.pop()? & self.pop()?;
                self.push(result)?;
            }
            Operation::Xor => {
                let result = self.pop()? ^ self.pop()?;
                self.push(result)?;
            }
            Operation::Equal => {
                let result = self.pop()? == self.pop()?;
                self.push_bool(result)?;
            }
            Operation::Less => {
                let top = self.pop()?;
                let second = self.pop()?;
                self.push_bool(second < top)?;
            }
            Operation::LessEq => {
                let top = self.pop()?;
                let second = self.pop()?;
                self.push_bool(second <= top)?;
            }
            Operation::Not => {
                let value = self.pop()?;
                self.push(!value)?;
            }
            Operation::Negate => {
                let value = self.pop()?;
                self.push(value.wrapping_neg())?;
            }
            Operation::Read => {
                let value = self.read_integer()?;
                self.push(value)?;
            }
            Operation::Write => {
                let value = self.pop()?;
                self.console.println(&value.to_string());
            }
            Operation::Bound => {
                let upper = self.pop()?;
                let lower = self.pop()?;
                let value = self.pop()?;
                if value < lower || value > upper {
                    return Err(RuntimeError::BoundsCheck {
                        pc: self.vm.current_pc,
                        value,
                        lower,
                        upper,
                    });
                }
                self.push(value)?;
            }
            Operation::ToGlobal => {
                let result = self.pop()?.wrapping_add(self.vm.fp);
                self.push(result)?;
            }
            Operation::ToLocal => {
                let result = self.pop()?.wrapping_sub(self.vm.fp);
                self.push(result)?;
            }
            Operation::LoadCon => {
                let value = self.vm.fetch()?;
                self.push(value)?;
            }
            Operation::LoadAbs => {
                let address = self.pop()?;
                let value = self.load(address)?;
                self.push(value)?;
            }
            Operation::StoreFrame => {
                let address = self.pop_frame_address()?;
                let value = self.pop()?;
                self.store(address, value)?;
            }
            Operation::LoadFrame => {
                let address = self.pop_frame_address()?;
                let value = self.load(address)?;
                self.push(value)?;
            }
            Operation::Zero => self.push(0)?,
            Operation::One => self.push(1)?,
            Operation::AllocHeap => {
                let size = self.pop()?;
                let address = self.vm.allocate_heap(size)?;
                self.push(address)?;
            }
            Operation::LoadMulti => {
                let count = self.pop()?;
                let address = self.pop_frame_address()?;
                for i in 0..count {
                    let value = self.load(address.wrapping_add(i))?;
                    self.push(value)?;
                }
            }
            Operation::StoreMulti => {
                let count = self.pop()?;
                let address = self.pop_frame_address()?;
                // last word is on top
                for i in (0..count).rev() {
                    let value = self.pop()?;
                    self.store(address.wrapping_add(i), value)?;
                }
            }
            Operation::Stop => {
                return Err(match self.pop()? {
                    CASE_LABEL_MISSING => RuntimeError::CaseLabelMissing,
                    code => RuntimeError::Halted { code },
                });
            }
        }
        Ok(ExecutionResult::Continue)
    }

    fn read_integer(&mut self) -> Result<Word, RuntimeError> {
        match self.console.read_line() {
            Ok(Some(line)) => line
                .trim()
                .parse::<Word>()
                .map_err(|_| RuntimeError::InvalidInput { text: line }),
            Ok(None) => Err(RuntimeError::InvalidInput {
                text: String::new(),
            }),
            Err(e) => Err(RuntimeError::InvalidInput {
                text: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
