//! Instructions as held in a code buffer before loading
//!
//! A call target is not known until every procedure has been placed, so the
//! generator emits `ProcRef` and the loader resolves it against the finished
//! procedure table.

use std::fmt;

use crate::compiler::error::CompilerError;
use crate::compiler::procedures::Procedures;
use crate::compiler::syms::ProcId;
use crate::operation::Operation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Any operation without an inline operand
    Op(Operation),
    /// `LOAD_CON` with its constant
    LoadCon(i32),
    /// `LOAD_CON` of the start address of a procedure, filled in at load time
    ProcRef(ProcId),
}

/// One word of a serialised instruction plus the text used in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedWord {
    pub word: i32,
    pub name: &'static str,
}

impl Instruction {
    pub fn operation(&self) -> Operation {
        match self {
            Instruction::Op(op) => *op,
            Instruction::LoadCon(_) | Instruction::ProcRef(_) => Operation::LoadCon,
        }
    }

    /// Size in words, fixed by the operation
    pub fn size(&self) -> usize {
        self.operation().size()
    }

    /// Replace a procedure reference by the procedure's start address
    pub fn resolve(&self, procedures: &Procedures) -> Result<Instruction, CompilerError> {
        match self {
            Instruction::ProcRef(id) => {
                let start = procedures.start_of(*id)?;
                Ok(Instruction::LoadCon(start as i32))
            }
            Instruction::Op(op) => Ok(Instruction::from(*op)),
            other => Ok(other.clone()),
        }
    }

    /// Words to place in memory, resolving any procedure reference
    pub fn encode(&self, procedures: &Procedures) -> Result<Vec<EncodedWord>, CompilerError> {
        let op = self.operation();
        let mut words = vec![EncodedWord {
            word: op.ordinal(),
            name: op.mnemonic(),
        }];
        if let Instruction::LoadCon(value) = self.resolve(procedures)? {
            words.push(EncodedWord {
                word: value,
                name: "",
            });
        }
        Ok(words)
    }
}

impl From<Operation> for Instruction {
    fn from(op: Operation) -> Self {
        match op {
            Operation::LoadCon => Instruction::LoadCon(0),
            other => Instruction::Op(other),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Op(op) => write!(f, "{}", op),
            Instruction::LoadCon(value) => write!(f, "LOAD_CON({})", value),
            Instruction::ProcRef(id) => write!(f, "LOAD_CON(proc {})", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::code::Code;
    use crate::compiler::syms::ProcedureEntry;
    use test_log::test;

    #[test]
    fn test_sizes_follow_operation() {
        assert_eq!(Instruction::Op(Operation::Add).size(), 1);
        assert_eq!(Instruction::LoadCon(-4).size(), 2);
        assert_eq!(Instruction::ProcRef(ProcId(3)).size(), 2);
    }

    #[test]
    fn test_proc_ref_resolves_to_start_address() {
        let mut procedures = Procedures::new(1000);
        let mut body = Code::new();
        body.generate_op(Operation::Return);
        procedures.add_procedure(ProcedureEntry::new(7, "p", 1), body.clone());
        procedures.add_procedure(ProcedureEntry::new(8, "q", 1), body);

        let resolved = Instruction::ProcRef(ProcId(8)).resolve(&procedures).unwrap();
        assert_eq!(resolved, Instruction::LoadCon(1001));

        let words = Instruction::ProcRef(ProcId(7)).encode(&procedures).unwrap();
        assert_eq!(
            words,
            vec![
                EncodedWord {
                    word: Operation::LoadCon.ordinal(),
                    name: "LOAD_CON"
                },
                EncodedWord {
                    word: 1000,
                    name: ""
                },
            ]
        );
    }

    #[test]
    fn test_unknown_procedure_is_an_error() {
        let procedures = Procedures::new(1000);
        assert_eq!(
            Instruction::ProcRef(ProcId(2)).resolve(&procedures),
            Err(CompilerError::UnknownProcedure(ProcId(2)))
        );
    }
}
