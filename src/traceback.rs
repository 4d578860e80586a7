//! Post mortem trace back and stack dump
//!
//! Both only read machine state. A trace back walks the dynamic links from
//! the current frame, and gives up with a stack dump rather than following a
//! link that does not point below the frame it came from.

use crate::console::Console;
use crate::interpreter::StackMachine;
use crate::vm::{Word, DYNAMIC_LINK, LOCALS_BASE, RETURN_ADDRESS, STATIC_LINK};

impl<C: Console> StackMachine<C> {
    /// Print each active frame with its locals, innermost first
    pub fn trace_back(&mut self) {
        let mut trace_pc = self.vm.pc;
        let mut trace_fp = self.vm.fp;
        while trace_pc != 0 {
            let entry = match usize::try_from(trace_pc.wrapping_sub(1))
                .ok()
                .and_then(|pc| self.procedures.get_procedure(pc).ok().flatten())
            {
                Some(procedure) => procedure.entry.clone(),
                None => {
                    // the outermost frame is still being set up
                    if trace_fp != 0 {
                        self.console.println(&format!(
                            "Trace back terminated early - PC {} out of valid range",
                            trace_pc
                        ));
                        self.dump_stack();
                    }
                    return;
                }
            };

            let header = |offset: Word| self.vm.word(trace_fp.wrapping_add(offset));
            let (static_link, dynamic_link, return_address) =
                match (header(STATIC_LINK), header(DYNAMIC_LINK), header(RETURN_ADDRESS)) {
                    (Some(sl), Some(dl), Some(ra)) => (sl, dl, ra),
                    _ => {
                        self.console.println(&format!(
                            "Trace back terminated early - FP {} out of memory",
                            trace_fp
                        ));
                        self.dump_stack();
                        return;
                    }
                };
            self.console.println(&format!(
                "PC={} in {} FP={} SL={} DL={} RA={}",
                trace_pc, entry.ident, trace_fp, static_link, dynamic_link, return_address
            ));

            for var in &entry.locals {
                let size = var.ty.base_type().space();
                let line = self.format_local(trace_fp, &var.ident, var.offset, size);
                self.console.println(&line);
            }

            // the outermost frame has no caller
            if trace_fp == 0 {
                if return_address != 0 {
                    self.console.println(&format!(
                        "Trace back terminated early - invalid return address {} FP= {}",
                        return_address, trace_fp
                    ));
                    self.dump_stack();
                    return;
                }
                break;
            }

            trace_pc = return_address;
            // a caller's frame starts at least a frame header below its callee
            if dynamic_link < 0
                || (dynamic_link != 0 && dynamic_link > trace_fp.wrapping_sub(LOCALS_BASE))
            {
                self.console.println(&format!(
                    "Trace back terminated early - invalid dynamic link {} FP= {}",
                    dynamic_link, trace_fp
                ));
                self.dump_stack();
                return;
            }
            trace_fp = dynamic_link;
        }
        self.console.println("End of traceBack");
    }

    fn format_local(&self, fp: Word, ident: &str, offset: Word, size: usize) -> String {
        let mut line = format!("  {}({}) =", ident, offset);
        let mut address = fp.wrapping_add(offset);
        for _ in 0..size {
            if 0 <= address && address < self.vm.code_start() {
                let value = self.vm.word(address).unwrap_or_default();
                line.push_str(&format!(" {}", value));
                address += 1;
            } else {
                line.push_str(" offset out of stack bounds");
                break;
            }
        }
        line
    }

    /// Print every stack word, marking the one the frame pointer addresses
    pub fn dump_stack(&mut self) {
        let mut text = format!("\nStack pointer = {}\n", self.vm.sp);
        for (address, value) in self.vm.stack().iter().enumerate() {
            let marker = if address as Word == self.vm.fp {
                " FP: "
            } else {
                "     "
            };
            text.push_str(&format!("{}{:<4}: {}\n", marker, address, value));
        }
        self.console.print(&text);
    }
}
