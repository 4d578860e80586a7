//! Stack machine operation codes
//!
//! Every operation works on the top of the stack. Binary operations pop two
//! words and push one result, unary operations pop one and push one. The
//! only operation with an inline operand is `LoadCon`, which occupies two
//! words: the opcode followed by the constant.
//!
//! An opcode is stored in memory as its ordinal, i.e. its position in the
//! declaration below.

use std::fmt;

/// The stack machine instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Do nothing
    NoOp,
    /// Unconditional branch relative to the following instruction
    Br,
    /// Branch if the second top of stack is false (0)
    BrFalse,
    /// Copy a block of memory, both addresses frame relative
    Copy,
    /// Call the procedure whose address is on top of the stack
    Call,
    /// Exit the current stack frame and return
    Return,
    /// Allocate space on the stack frame
    AllocStack,
    /// Deallocate space from the stack frame
    DeallocStack,
    /// Discard the top of stack
    Pop,
    /// Duplicate the top of stack
    Dup,
    /// Swap the top two stack words
    Swap,
    Add,
    Mpy,
    Div,
    /// Bitwise or
    Or,
    /// Bitwise and
    And,
    /// Bitwise exclusive or
    Xor,
    Equal,
    /// Second top less than top; swap the operands to get greater-than
    Less,
    /// Second top less than or equal to top; swap the operands to get
    /// greater-than-or-equal
    LessEq,
    /// Bitwise complement
    Not,
    /// Two's complement negation
    Negate,
    /// Read an integer from the console
    Read,
    /// Write an integer to the console
    Write,
    /// Check the value under [lower, upper] is within those bounds
    Bound,
    /// Convert a frame-local address on top of stack to an absolute one
    ToGlobal,
    /// Convert an absolute address on top of stack to a frame-local one
    ToLocal,
    /// Load the next word as a constant
    LoadCon,
    /// Load from the absolute address on top of stack
    LoadAbs,
    /// Store a word at a frame-relative address
    StoreFrame,
    /// Load a word from a frame-relative address
    LoadFrame,
    Zero,
    One,
    /// Allocate memory from the heap
    AllocHeap,
    /// Load multiple words onto the stack
    LoadMulti,
    /// Store multiple words from the stack
    StoreMulti,
    /// Halt execution with the exit code on top of stack
    Stop,
}

/// All operations in ordinal order
const OPERATIONS: [Operation; 37] = [
    Operation::NoOp,
    Operation::Br,
    Operation::BrFalse,
    Operation::Copy,
    Operation::Call,
    Operation::Return,
    Operation::AllocStack,
    Operation::DeallocStack,
    Operation::Pop,
    Operation::Dup,
    Operation::Swap,
    Operation::Add,
    Operation::Mpy,
    Operation::Div,
    Operation::Or,
    Operation::And,
    Operation::Xor,
    Operation::Equal,
    Operation::Less,
    Operation::LessEq,
    Operation::Not,
    Operation::Negate,
    Operation::Read,
    Operation::Write,
    Operation::Bound,
    Operation::ToGlobal,
    Operation::ToLocal,
    Operation::LoadCon,
    Operation::LoadAbs,
    Operation::StoreFrame,
    Operation::LoadFrame,
    Operation::Zero,
    Operation::One,
    Operation::AllocHeap,
    Operation::LoadMulti,
    Operation::StoreMulti,
    Operation::Stop,
];

impl Operation {
    /// Size of the instruction in words
    pub fn size(self) -> usize {
        match self {
            Operation::LoadCon => 2,
            _ => 1,
        }
    }

    /// The word stored in memory for this operation
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Decode a memory word, `None` if it is not a legal opcode
    pub fn from_word(word: i32) -> Option<Operation> {
        usize::try_from(word)
            .ok()
            .and_then(|index| OPERATIONS.get(index).copied())
    }

    /// Name used in code listings and state traces
    pub fn mnemonic(self) -> &'static str {
        match self {
            Operation::NoOp => "NO_OP",
            Operation::Br => "BR",
            Operation::BrFalse => "BR_FALSE",
            Operation::Copy => "COPY",
            Operation::Call => "CALL",
            Operation::Return => "RETURN",
            Operation::AllocStack => "ALLOC_STACK",
            Operation::DeallocStack => "DEALLOC_STACK",
            Operation::Pop => "POP",
            Operation::Dup => "DUP",
            Operation::Swap => "SWAP",
            Operation::Add => "ADD",
            Operation::Mpy => "MPY",
            Operation::Div => "DIV",
            Operation::Or => "OR",
            Operation::And => "AND",
            Operation::Xor => "XOR",
            Operation::Equal => "EQUAL",
            Operation::Less => "LESS",
            Operation::LessEq => "LESSEQ",
            Operation::Not => "NOT",
            Operation::Negate => "NEGATE",
            Operation::Read => "READ",
            Operation::Write => "WRITE",
            Operation::Bound => "BOUND",
            Operation::ToGlobal => "TO_GLOBAL",
            Operation::ToLocal => "TO_LOCAL",
            Operation::LoadCon => "LOAD_CON",
            Operation::LoadAbs => "LOAD_ABS",
            Operation::StoreFrame => "STORE_FRAME",
            Operation::LoadFrame => "LOAD_FRAME",
            Operation::Zero => "ZERO",
            Operation::One => "ONE",
            Operation::AllocHeap => "ALLOC_HEAP",
            Operation::LoadMulti => "LOAD_MULTI",
            Operation::StoreMulti => "STORE_MULTI",
            Operation::Stop => "STOP",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_ordinals_round_trip_through_table() {
        for (index, op) in OPERATIONS.iter().enumerate() {
            assert_eq!(op.ordinal(), index as i32, "{op} out of order");
            assert_eq!(Operation::from_word(index as i32), Some(*op));
        }
    }

    #[test]
    fn test_illegal_words_do_not_decode() {
        assert_eq!(Operation::from_word(-1), None);
        assert_eq!(Operation::from_word(OPERATIONS.len() as i32), None);
        assert_eq!(Operation::from_word(10000), None);
    }

    #[test]
    fn test_only_load_con_is_two_words() {
        for op in OPERATIONS {
            let expected = if op == Operation::LoadCon { 2 } else { 1 };
            assert_eq!(op.size(), expected, "size of {op}");
        }
    }
}
