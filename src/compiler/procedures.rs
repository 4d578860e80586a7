//! Procedure table
//!
//! Procedures are laid out one after another from the code origin in the
//! order they are added. Start addresses are fixed as each procedure is
//! added, so procedure references can be resolved once the table is
//! complete.

use indexmap::IndexMap;
use log::debug;
use std::fmt;

use crate::compiler::code::Code;
use crate::compiler::error::CompilerError;
use crate::compiler::syms::{ProcId, ProcedureEntry};
use crate::compiler::tree::Location;

/// Generated code for one procedure and where it lives
#[derive(Debug, Clone)]
pub struct ProcedureCode {
    pub entry: ProcedureEntry,
    pub code: Code,
    /// Address of the first word
    pub start: usize,
    /// Address one past the last word
    pub finish: usize,
}

impl ProcedureCode {
    pub fn contains(&self, pc: usize) -> bool {
        self.start <= pc && pc < self.finish
    }
}

impl fmt::Display for ProcedureCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}..{} ({} words)",
            self.entry.ident,
            self.start,
            self.finish,
            self.code.size()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Procedures {
    procedures: IndexMap<ProcId, ProcedureCode>,
    code_start: usize,
    /// Next free code address
    current: usize,
    main: Option<ProcId>,
}

impl Procedures {
    pub fn new(code_start: usize) -> Self {
        Procedures {
            procedures: IndexMap::new(),
            code_start,
            current: code_start,
            main: None,
        }
    }

    pub fn add_procedure(&mut self, entry: ProcedureEntry, code: Code) {
        let start = self.current;
        self.current += code.size();
        debug!(
            "procedure {} placed at {}..{}",
            entry.ident, start, self.current
        );
        self.procedures.insert(
            entry.id,
            ProcedureCode {
                entry,
                code,
                start,
                finish: self.current,
            },
        );
    }

    /// Mark the procedure execution starts in
    pub fn set_main(&mut self, id: ProcId) {
        self.main = Some(id);
    }

    pub fn main(&self) -> Option<ProcId> {
        self.main
    }

    pub fn code_start(&self) -> usize {
        self.code_start
    }

    /// Address one past the end of the last procedure
    pub fn code_end(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcedureCode> {
        self.procedures.values()
    }

    pub fn get(&self, id: ProcId) -> Option<&ProcedureCode> {
        self.procedures.get(&id)
    }

    pub fn start_of(&self, id: ProcId) -> Result<usize, CompilerError> {
        self.procedures
            .get(&id)
            .map(|procedure| procedure.start)
            .ok_or(CompilerError::UnknownProcedure(id))
    }

    /// Find the procedure whose code contains `pc`. Addresses below the code
    /// origin or past the last procedure belong to no procedure.
    pub fn get_procedure(&self, pc: usize) -> Result<Option<&ProcedureCode>, CompilerError> {
        if pc < self.code_start || self.current <= pc {
            return Ok(None);
        }
        self.procedures
            .values()
            .find(|procedure| pc < procedure.finish)
            .map(Some)
            .ok_or_else(|| {
                CompilerError::internal(
                    format!("no procedure contains pc {}", pc),
                    Location::default(),
                )
            })
    }
}

impl fmt::Display for Procedures {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for procedure in self.procedures.values() {
            writeln!(f, "{}", procedure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use test_log::test;

    fn body(words: usize) -> Code {
        let mut code = Code::new();
        for _ in 0..words {
            code.generate_op(Operation::NoOp);
        }
        code
    }

    fn table() -> Procedures {
        let mut procedures = Procedures::new(1000);
        procedures.add_procedure(ProcedureEntry::new(1, "inner", 1), body(4));
        procedures.add_procedure(ProcedureEntry::new(0, "<main>", 0), body(6));
        procedures.set_main(ProcId(0));
        procedures
    }

    #[test]
    fn test_procedures_are_laid_out_in_order() {
        let procedures = table();
        assert_eq!(procedures.start_of(ProcId(1)), Ok(1000));
        assert_eq!(procedures.start_of(ProcId(0)), Ok(1004));
        assert_eq!(procedures.code_end(), 1010);
        assert_eq!(procedures.main(), Some(ProcId(0)));
    }

    #[test]
    fn test_get_procedure_by_pc() {
        let procedures = table();
        let ident = |pc| {
            procedures
                .get_procedure(pc)
                .unwrap()
                .map(|procedure| procedure.entry.ident.clone())
        };
        assert_eq!(ident(999), None);
        assert_eq!(ident(1000).as_deref(), Some("inner"));
        assert_eq!(ident(1003).as_deref(), Some("inner"));
        assert_eq!(ident(1004).as_deref(), Some("<main>"));
        assert_eq!(ident(1009).as_deref(), Some("<main>"));
        assert_eq!(ident(1010), None);
    }
}
