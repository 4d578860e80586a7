//! Code buffer
//!
//! A `Code` is the instruction sequence for part of a procedure together with
//! its size in words. The generator builds sub-sequences into separate
//! buffers so their sizes are known before emitting the branches that skip
//! over them.

use crate::compiler::error::CompilerError;
use crate::compiler::syms::ProcedureRef;
use crate::compiler::tree::Location;
use crate::instruction::Instruction;
use crate::operation::Operation;

/// Words in a branch-if-false sequence: LOAD_CON offset, BR_FALSE
pub const SIZE_JUMP_IF_FALSE: usize = 3;
/// Words in an unconditional branch sequence: LOAD_CON offset, BR
pub const SIZE_JUMP_ALWAYS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    instructions: Vec<Instruction>,
    size: usize,
}

impl Code {
    pub fn new() -> Self {
        Code::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Size in words, which differs from the instruction count
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Add an instruction, returning its position for later patching
    pub fn add(&mut self, instruction: Instruction) -> usize {
        self.size += instruction.size();
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn append(&mut self, mut other: Code) {
        self.size += other.size;
        self.instructions.append(&mut other.instructions);
    }

    pub fn generate_op(&mut self, op: Operation) {
        self.add(Instruction::from(op));
    }

    /// Emit LOAD_CON, returning its position
    pub fn gen_load_constant(&mut self, value: i32) -> usize {
        self.add(Instruction::LoadCon(value))
    }

    /// Change the constant of a previously emitted LOAD_CON
    pub fn update_load_constant(&mut self, position: usize, value: i32) -> Result<(), CompilerError> {
        match self.instructions.get_mut(position) {
            Some(Instruction::LoadCon(old)) => {
                *old = value;
                Ok(())
            }
            other => Err(CompilerError::internal(
                format!("no LOAD_CON at position {} to update: {:?}", position, other),
                Location::default(),
            )),
        }
    }

    /// Load a constant, using the single word forms for 0 and 1
    pub fn gen_const(&mut self, value: i32) {
        match value {
            0 => self.generate_op(Operation::Zero),
            1 => self.generate_op(Operation::One),
            _ => {
                self.gen_load_constant(value);
            }
        }
    }

    /// Boolean complement of 0/1: NEGATE, ONE, ADD
    pub fn gen_bool_not(&mut self) {
        self.generate_op(Operation::Negate);
        self.generate_op(Operation::One);
        self.generate_op(Operation::Add);
    }

    /// Frame-relative address of a variable `level_diff` static levels out
    pub fn gen_mem_ref(&mut self, level_diff: usize, offset: i32) {
        if level_diff == 0 {
            self.gen_load_constant(offset);
        } else {
            self.load_frame_address(level_diff);
            self.gen_load_constant(offset);
            self.generate_op(Operation::Add);
            self.generate_op(Operation::ToLocal);
        }
    }

    /// Absolute address of the frame `level_diff` static links away
    pub fn load_frame_address(&mut self, level_diff: usize) {
        // the static link is at offset 0 of each frame
        self.generate_op(Operation::Zero);
        self.generate_op(Operation::LoadFrame);
        for _ in 1..level_diff {
            self.generate_op(Operation::LoadAbs);
        }
    }

    /// Push the static link for a callee declared `level_diff` levels out
    pub fn gen_static_link(&mut self, level_diff: usize) {
        if level_diff == 0 {
            // callee is nested directly within the caller
            self.generate_op(Operation::Zero);
            self.generate_op(Operation::ToGlobal);
        } else {
            self.load_frame_address(level_diff);
        }
    }

    pub fn gen_call(&mut self, level_diff: usize, procedure: &ProcedureRef) {
        self.gen_static_link(level_diff);
        self.add(Instruction::ProcRef(procedure.id));
        self.generate_op(Operation::Call);
    }

    /// Branch-if-false over `offset` words, returning the LOAD_CON position
    pub fn gen_jump_if_false(&mut self, offset: i32) -> usize {
        let position = self.gen_load_constant(offset);
        self.generate_op(Operation::BrFalse);
        position
    }

    /// Unconditional branch by `offset` words, returning the LOAD_CON position
    pub fn gen_jump_always(&mut self, offset: i32) -> usize {
        let position = self.gen_load_constant(offset);
        self.generate_op(Operation::Br);
        position
    }

    pub fn gen_bounds_check(&mut self, lower: i32, upper: i32) {
        self.gen_load_constant(lower);
        self.gen_load_constant(upper);
        self.generate_op(Operation::Bound);
    }

    pub fn gen_alloc_stack(&mut self, size: usize) {
        self.gen_load_constant(size as i32);
        self.generate_op(Operation::AllocStack);
    }

    pub fn gen_dealloc_stack(&mut self, size: usize) {
        self.gen_load_constant(size as i32);
        self.generate_op(Operation::DeallocStack);
    }

    /// Load a value of `size` words from the address on top of stack
    pub fn gen_load(&mut self, size: usize) {
        if size == 1 {
            self.generate_op(Operation::LoadFrame);
        } else {
            self.gen_load_constant(size as i32);
            self.generate_op(Operation::LoadMulti);
        }
    }

    /// Store a value of `size` words to the address on top of stack
    pub fn gen_store(&mut self, size: usize) {
        if size == 1 {
            self.generate_op(Operation::StoreFrame);
        } else {
            self.gen_load_constant(size as i32);
            self.generate_op(Operation::StoreMulti);
        }
    }
}

impl<'a> IntoIterator for &'a Code {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
