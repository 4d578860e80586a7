use log::debug;
use std::fmt;

use crate::compiler::error::{CompilerError, RuntimeError};
use crate::config::MachineConfig;

/// A machine word
pub type Word = i32;

/// Boolean encodings
pub const FALSE_VALUE: Word = 0;
pub const TRUE_VALUE: Word = 1;

/// Offsets of the frame header words from the frame pointer
pub const STATIC_LINK: Word = 0;
pub const DYNAMIC_LINK: Word = 1;
pub const RETURN_ADDRESS: Word = 2;
/// Offset of the first local variable
pub const LOCALS_BASE: Word = 3;

/// The stack machine state
///
/// Memory is one array of words. The stack grows up from 0, the heap grows
/// down from the code origin and the code sits from the code origin up.
pub struct VM {
    /// Stack, heap and code
    memory: Vec<Word>,
    /// Program counter - next word to fetch
    pub pc: Word,
    /// Frame pointer - address of the current frame's static link
    pub fp: Word,
    /// Stack pointer - one past the top of stack
    pub sp: Word,
    /// Top of stack limit, which is also the bottom of the heap
    pub limit: Word,
    /// Address of the instruction being executed (for error reports)
    pub current_pc: Word,
    /// Code origin
    code_start: Word,
    /// One past the last loaded code word
    code_end: Word,
}

impl VM {
    /// Create a machine with every word set to the null address. A code
    /// origin past the end of memory is clamped to it, leaving no room for
    /// code.
    pub fn new(config: &MachineConfig) -> Self {
        let memory_size = config.memory_size.min(Word::MAX as usize);
        let code_start = config.code_start.min(memory_size) as Word;
        VM {
            memory: vec![memory_size as Word; memory_size],
            pc: 0,
            fp: 0,
            sp: 0,
            limit: code_start,
            current_pc: 0,
            code_start,
            code_end: code_start,
        }
    }

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    /// The value of a word never written
    pub fn null_address(&self) -> Word {
        self.memory.len() as Word
    }

    pub fn code_start(&self) -> Word {
        self.code_start
    }

    pub fn code_end(&self) -> Word {
        self.code_end
    }

    /// Append a word to the loaded code, returning its address
    pub fn write_code(&mut self, word: Word) -> Result<Word, CompilerError> {
        let address = self.code_end as usize;
        match self.memory.get_mut(address) {
            Some(slot) => {
                *slot = word;
                self.code_end += 1;
                Ok(address as Word)
            }
            None => Err(CompilerError::CodeTooLarge {
                size: address + 1 - self.code_start as usize,
                limit: self.memory.len() - self.code_start as usize,
            }),
        }
    }

    /// Word at `address` if it lies within memory, without range checks
    /// against the stack or code regions
    pub fn word(&self, address: Word) -> Option<Word> {
        usize::try_from(address)
            .ok()
            .and_then(|index| self.memory.get(index).copied())
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Word) -> Result<(), RuntimeError> {
        if self.sp >= self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        if self.sp < 0 {
            return Err(RuntimeError::StoreOutOfRange {
                pc: self.current_pc,
                address: self.sp,
            });
        }
        self.memory[self.sp as usize] = value;
        self.sp += 1;
        Ok(())
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<Word, RuntimeError> {
        if self.sp <= 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        let value = self.word(self.sp - 1).ok_or(RuntimeError::LoadOutOfRange {
            pc: self.current_pc,
            address: self.sp - 1,
        })?;
        self.sp -= 1;
        Ok(value)
    }

    /// Load from anywhere in memory
    pub fn load(&self, address: Word) -> Result<Word, RuntimeError> {
        self.word(address).ok_or(RuntimeError::LoadOutOfRange {
            pc: self.current_pc,
            address,
        })
    }

    /// Store into the stack and heap region; code is read only
    pub fn store(&mut self, address: Word, value: Word) -> Result<(), RuntimeError> {
        if address < 0 || address >= self.code_start {
            return Err(RuntimeError::StoreOutOfRange {
                pc: self.current_pc,
                address,
            });
        }
        self.memory[address as usize] = value;
        Ok(())
    }

    /// Fetch the word at pc and advance pc. Only loaded code can be fetched.
    pub fn fetch(&mut self) -> Result<Word, RuntimeError> {
        if self.pc < self.code_start || self.pc >= self.code_end {
            return Err(RuntimeError::PcOutOfRange { pc: self.pc });
        }
        let word = self.memory[self.pc as usize];
        self.pc += 1;
        Ok(word)
    }

    /// Carve `size` words off the heap, returning the address of the block.
    /// The heap never shrinks.
    pub fn allocate_heap(&mut self, size: Word) -> Result<Word, RuntimeError> {
        if size < 0 {
            return Err(RuntimeError::HeapAllocation { size });
        }
        let new_limit = self.limit - size;
        // the block address is pushed straight after, so it needs a free word
        if new_limit <= self.sp || new_limit < 0 {
            return Err(RuntimeError::StackOverflow);
        }
        let null = self.null_address();
        self.memory[new_limit as usize..self.limit as usize].fill(null);
        debug!("heap allocation of {} words at {}", size, new_limit);
        self.limit = new_limit;
        Ok(new_limit)
    }

    /// Words from the bottom of the stack to the top, clipped to memory
    pub fn stack(&self) -> &[Word] {
        let top = self.sp.clamp(0, self.memory.len() as Word) as usize;
        &self.memory[..top]
    }
}

impl fmt::Display for VM {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PC: {} FP: {} SP: {} Limit: {}",
            self.pc, self.fp, self.sp, self.limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn small_vm() -> VM {
        let config = MachineConfig {
            code_start: 20,
            memory_size: 40,
            ..MachineConfig::default()
        };
        VM::new(&config)
    }

    #[test]
    fn test_memory_starts_as_null_address() {
        let vm = small_vm();
        assert_eq!(vm.word(0), Some(40));
        assert_eq!(vm.word(39), Some(40));
        assert_eq!(vm.word(40), None);
        assert_eq!(vm.word(-1), None);
    }

    #[test]
    fn test_push_pop() {
        let mut vm = small_vm();
        vm.push(5).unwrap();
        vm.push(-7).unwrap();
        assert_eq!(vm.sp, 2);
        assert_eq!(vm.pop(), Ok(-7));
        assert_eq!(vm.pop(), Ok(5));
        assert_eq!(vm.pop(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_push_stops_at_limit() {
        let mut vm = small_vm();
        for i in 0..20 {
            vm.push(i).unwrap();
        }
        assert_eq!(vm.push(99), Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_store_range_excludes_code() {
        let mut vm = small_vm();
        vm.store(19, 3).unwrap();
        assert_eq!(vm.load(19), Ok(3));
        assert!(matches!(
            vm.store(20, 3),
            Err(RuntimeError::StoreOutOfRange { address: 20, .. })
        ));
        assert!(matches!(
            vm.store(-1, 3),
            Err(RuntimeError::StoreOutOfRange { address: -1, .. })
        ));
        assert!(vm.load(39).is_ok());
        assert!(matches!(
            vm.load(40),
            Err(RuntimeError::LoadOutOfRange { address: 40, .. })
        ));
    }

    #[test]
    fn test_fetch_only_from_loaded_code() {
        let mut vm = small_vm();
        assert_eq!(vm.write_code(11), Ok(20));
        vm.pc = 20;
        assert_eq!(vm.fetch(), Ok(11));
        assert_eq!(vm.fetch(), Err(RuntimeError::PcOutOfRange { pc: 21 }));
        vm.pc = 19;
        assert_eq!(vm.fetch(), Err(RuntimeError::PcOutOfRange { pc: 19 }));
    }

    #[test]
    fn test_code_too_large() {
        let mut vm = small_vm();
        for _ in 0..20 {
            vm.write_code(0).unwrap();
        }
        assert_eq!(
            vm.write_code(0),
            Err(CompilerError::CodeTooLarge {
                size: 21,
                limit: 20
            })
        );
    }

    #[test]
    fn test_heap_grows_down() {
        let mut vm = small_vm();
        vm.store(15, 1).unwrap();
        assert_eq!(vm.allocate_heap(3), Ok(17));
        assert_eq!(vm.allocate_heap(4), Ok(13));
        assert_eq!(vm.limit, 13);
        assert_eq!(vm.word(15), Some(40));
        assert_eq!(
            vm.allocate_heap(-1),
            Err(RuntimeError::HeapAllocation { size: -1 })
        );
    }

    #[test]
    fn test_heap_cannot_overrun_stack() {
        let mut vm = small_vm();
        for i in 0..10 {
            vm.push(i).unwrap();
        }
        assert_eq!(vm.allocate_heap(10), Err(RuntimeError::StackOverflow));
        assert_eq!(vm.limit, 20);
        assert_eq!(vm.allocate_heap(9), Ok(11));
    }
}
