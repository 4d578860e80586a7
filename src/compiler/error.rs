// Compiler Error Handling

use std::fmt;

use crate::compiler::syms::ProcId;
use crate::config::ConfigError;
use crate::compiler::tree::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerError {
    // Generator found something the checker should have rejected
    InternalError { message: String, location: Location },

    // Image construction errors
    CodeTooLarge { size: usize, limit: usize },
    UnknownProcedure(ProcId),
    NoMainProgram,
    InvalidConfig(ConfigError),
}

impl CompilerError {
    pub fn internal(message: impl Into<String>, location: Location) -> Self {
        CompilerError::InternalError {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::InternalError { message, location } => {
                write!(f, "Internal error at {}: {}", location, message)
            }
            CompilerError::CodeTooLarge { size, limit } => {
                write!(
                    f,
                    "Code size {} words exceeds available memory of {} words",
                    size, limit
                )
            }
            CompilerError::UnknownProcedure(id) => {
                write!(f, "Reference to procedure {} with no generated code", id)
            }
            CompilerError::NoMainProgram => {
                write!(f, "No main program in generated procedures")
            }
            CompilerError::InvalidConfig(err) => {
                write!(f, "Invalid machine configuration: {}", err)
            }
        }
    }
}

impl std::error::Error for CompilerError {}

/// Errors detected by the stack machine while executing. Each of these
/// terminates the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    StackOverflow,
    StackUnderflow,
    LoadOutOfRange { pc: i32, address: i32 },
    StoreOutOfRange { pc: i32, address: i32 },
    PcOutOfRange { pc: i32 },
    InvalidOpcode { pc: i32, word: i32 },
    NonBooleanBranch { value: i32 },
    DivideByZero,
    BoundsCheck { pc: i32, value: i32, lower: i32, upper: i32 },
    CaseLabelMissing,
    Halted { code: i32 },
    InvalidInput { text: String },
    DeallocTooMany,
    HeapAllocation { size: i32 },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow => write!(f, "memory overflow!"),
            RuntimeError::StackUnderflow => write!(f, "stack underflow!"),
            RuntimeError::LoadOutOfRange { pc, address } => {
                write!(f, "load outside memory pc={}: address={}", pc, address)
            }
            RuntimeError::StoreOutOfRange { pc, address } => {
                write!(f, "store outside memory pc={}: address={}", pc, address)
            }
            RuntimeError::PcOutOfRange { pc } => {
                write!(f, "PC = {} out of range of code", pc)
            }
            RuntimeError::InvalidOpcode { pc, word } => {
                write!(f, "invalid opcode {} at pc={}", word, pc)
            }
            RuntimeError::NonBooleanBranch { value } => {
                write!(f, "non-boolean operand in branch: {}", value)
            }
            RuntimeError::DivideByZero => write!(f, "divide by zero"),
            RuntimeError::BoundsCheck {
                pc,
                value,
                lower,
                upper,
            } => write!(
                f,
                "bounds check failed at {}: {} not in {}..{}",
                pc, value, lower, upper
            ),
            RuntimeError::CaseLabelMissing => {
                write!(f, "expression in case doesn't match any label")
            }
            RuntimeError::Halted { code } => write!(f, "machine halted with code {}", code),
            RuntimeError::InvalidInput { text } => write!(
                f,
                "invalid value read - must be an integer: {:?}",
                text
            ),
            RuntimeError::DeallocTooMany => write!(f, "deallocating too many words"),
            RuntimeError::HeapAllocation { size } => {
                write!(f, "invalid heap allocation of {} words", size)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_runtime_messages_match_console_text() {
        assert_eq!(RuntimeError::DivideByZero.to_string(), "divide by zero");
        assert_eq!(
            RuntimeError::BoundsCheck {
                pc: 1012,
                value: 11,
                lower: 0,
                upper: 10
            }
            .to_string(),
            "bounds check failed at 1012: 11 not in 0..10"
        );
        assert_eq!(
            RuntimeError::CaseLabelMissing.to_string(),
            "expression in case doesn't match any label"
        );
        assert_eq!(
            RuntimeError::Halted { code: 7 }.to_string(),
            "machine halted with code 7"
        );
    }

    #[test]
    fn test_internal_error_carries_location() {
        let err = CompilerError::internal("bad node", Location::new(3, 9));
        assert_eq!(err.to_string(), "Internal error at 3:9: bad node");
    }
}
