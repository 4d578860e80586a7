// Compiler Module
// Code generation from a checked syntax tree to procedure code

pub mod code;
pub mod codegen;
pub mod error;
pub mod procedures;
pub mod syms;
pub mod tree;

pub use error::{CompilerError, RuntimeError};

use log::info;

use crate::compiler::codegen::CodeGenerator;
use crate::compiler::procedures::Procedures;
use crate::compiler::tree::ProgramNode;
use crate::config::DEFAULT_CODE_START;
use crate::reporter::ErrorReporter;

/// Main compiler structure
pub struct Compiler {
    code_start: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            code_start: DEFAULT_CODE_START,
        }
    }

    /// Lay out code from `code_start` instead of the default origin
    pub fn with_code_start(code_start: usize) -> Self {
        Compiler { code_start }
    }

    /// Generate code for every procedure of a checked program
    pub fn compile(
        &self,
        program: &ProgramNode,
        reporter: &mut ErrorReporter,
    ) -> Result<Procedures, CompilerError> {
        info!("Generating code for {}", program.main.entry.ident);
        let procedures = CodeGenerator::new(reporter, self.code_start).generate_code(program)?;
        info!(
            "Generated {} procedures, {} words",
            procedures.len(),
            procedures.code_end() - procedures.code_start()
        );
        Ok(procedures)
    }
}
