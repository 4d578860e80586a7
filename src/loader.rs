//! Loading procedure code into machine memory
//!
//! Procedures are written one after another from the code origin, in table
//! order, resolving procedure references as they go. With listing enabled
//! each word is printed with its address and, for opcodes, its mnemonic.

use log::{debug, info};

use crate::compiler::error::CompilerError;
use crate::compiler::procedures::Procedures;
use crate::compiler::tree::Location;
use crate::console::Console;
use crate::vm::{Word, VM};

/// Column the address starts in
const ASSEMBLY_POSN: usize = 4;

/// Load all procedures and set pc to the start of the main program
pub fn load_program(
    vm: &mut VM,
    procedures: &Procedures,
    console: &mut dyn Console,
    listing: bool,
) -> Result<Word, CompilerError> {
    if procedures.code_start() as Word != vm.code_start() {
        return Err(CompilerError::internal(
            format!(
                "code generated for origin {} but machine code starts at {}",
                procedures.code_start(),
                vm.code_start()
            ),
            Location::default(),
        ));
    }
    let limit = vm.memory_size().saturating_sub(procedures.code_start());
    let size = procedures.code_end() - procedures.code_start();
    if size > limit {
        return Err(CompilerError::CodeTooLarge { size, limit });
    }

    let main = procedures.main().ok_or(CompilerError::NoMainProgram)?;
    let mut entry = None;
    for procedure in procedures.iter() {
        debug!("loading {}", procedure);
        if listing {
            console.println(&format!("Procedure {}", procedure.entry.ident));
        }
        if procedure.entry.id == main {
            entry = Some(vm.code_end());
        }
        for instruction in &procedure.code {
            for encoded in instruction.encode(procedures)? {
                let address = vm.write_code(encoded.word)?;
                if listing {
                    console.println(&listing_line(address, encoded.word, encoded.name));
                }
            }
        }
    }

    let entry = entry.ok_or(CompilerError::UnknownProcedure(main))?;
    vm.pc = entry;
    info!(
        "loaded {} words at {}..{}, entry point {}",
        size,
        vm.code_start(),
        vm.code_end(),
        entry
    );
    Ok(entry)
}

/// One line of the code listing
pub fn listing_line(address: Word, word: Word, name: &str) -> String {
    format!(
        "{:indent$}{:<5}:  {:<6}{}",
        "",
        address,
        word,
        name,
        indent = ASSEMBLY_POSN
    )
}
