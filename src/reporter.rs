//! Error and debug reporting context
//!
//! One `ErrorReporter` is created per compilation/run and passed to the code
//! generator and the interpreter. It keeps the nesting depth used to indent
//! generator debug messages and a record of the errors reported.

use log::{debug, error, warn};

use crate::compiler::error::{CompilerError, RuntimeError};
use crate::compiler::tree::Location;

#[derive(Debug, Default)]
pub struct ErrorReporter {
    depth: usize,
    compile_errors: usize,
    runtime_errors: Vec<RuntimeError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        ErrorReporter::default()
    }

    pub fn inc_debug(&mut self) {
        self.depth += 1;
    }

    pub fn dec_debug(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn debug_message(&self, message: &str) {
        debug!("{:indent$}{}", "", message, indent = self.depth * 2);
    }

    /// Report an internal compiler error, returning it for propagation
    pub fn fatal(&mut self, message: impl Into<String>, location: Location) -> CompilerError {
        let err = CompilerError::internal(message, location);
        error!("{}", err);
        self.compile_errors += 1;
        err
    }

    pub fn runtime_error(&mut self, err: &RuntimeError) {
        warn!("runtime error: {}", err);
        self.runtime_errors.push(err.clone());
    }

    pub fn runtime_errors(&self) -> &[RuntimeError] {
        &self.runtime_errors
    }

    pub fn error_count(&self) -> usize {
        self.compile_errors + self.runtime_errors.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_counts_both_error_kinds() {
        let mut reporter = ErrorReporter::new();
        assert!(!reporter.has_errors());
        let err = reporter.fatal("error node", Location::new(2, 5));
        assert!(matches!(err, CompilerError::InternalError { .. }));
        reporter.runtime_error(&RuntimeError::DivideByZero);
        assert_eq!(reporter.error_count(), 2);
        assert_eq!(reporter.runtime_errors(), &[RuntimeError::DivideByZero]);
    }

    #[test]
    fn test_debug_depth_never_underflows() {
        let mut reporter = ErrorReporter::new();
        reporter.dec_debug();
        reporter.inc_debug();
        reporter.debug_message("nested");
        reporter.dec_debug();
        reporter.dec_debug();
        assert_eq!(reporter.depth, 0);
    }
}
