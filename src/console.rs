//! Console seen by a running program
//!
//! Program input and output, the code listing, trace text and runtime
//! error reports all go through a `Console` so they can be captured.

use log::debug;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

pub trait Console {
    /// Read one line without its terminator, `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;

    fn print(&mut self, text: &str);

    fn println(&mut self, text: &str) {
        self.print(text);
        self.print("\n");
    }
}

/// Standard input and output
#[derive(Debug, Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        StdConsole
    }
}

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn print(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()) {
            debug!("console write failed: {}", e);
        }
    }
}

/// Scripted input and captured output, for tests and embedding
#[derive(Debug, Default)]
pub struct BufferedConsole {
    input: VecDeque<String>,
    output: String,
}

impl BufferedConsole {
    pub fn new() -> Self {
        BufferedConsole::default()
    }

    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BufferedConsole {
            input: lines.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn push_input(&mut self, line: impl Into<String>) {
        self.input.push_back(line.into());
    }

    /// Everything printed so far
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Console for BufferedConsole {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}
