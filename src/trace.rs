//! Execution trace categories
//!
//! Tracing only prints; it never changes what the machine does.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    /// Loads and stores
    Memory,
    /// Procedure calls and returns
    Calls,
    /// Branches taken
    Branches,
    /// Pushes and pops
    Stack,
    /// Registers and opcode before each instruction
    State,
}

const ALL_TRACES: [Trace; 5] = [
    Trace::Memory,
    Trace::Calls,
    Trace::Branches,
    Trace::Stack,
    Trace::State,
];

impl Trace {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Trace::Memory => "memory",
            Trace::Calls => "calls",
            Trace::Branches => "branches",
            Trace::Stack => "stack",
            Trace::State => "state",
        }
    }
}

impl FromStr for Trace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TRACES
            .iter()
            .copied()
            .find(|trace| trace.name() == s)
            .ok_or_else(|| format!("unknown trace category '{}'", s))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of enabled trace categories, written in configuration as a list of
/// names or `["all"]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TraceSet(u8);

impl TraceSet {
    pub fn none() -> Self {
        TraceSet(0)
    }

    pub fn all() -> Self {
        ALL_TRACES.iter().fold(TraceSet::none(), |set, trace| set.with(*trace))
    }

    pub fn with(mut self, trace: Trace) -> Self {
        self.insert(trace);
        self
    }

    pub fn insert(&mut self, trace: Trace) {
        self.0 |= trace.bit();
    }

    pub fn remove(&mut self, trace: Trace) {
        self.0 &= !trace.bit();
    }

    pub fn contains(&self, trace: Trace) -> bool {
        self.0 & trace.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Trace> + '_ {
        ALL_TRACES.iter().copied().filter(|trace| self.contains(*trace))
    }
}

impl TryFrom<Vec<String>> for TraceSet {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut set = TraceSet::none();
        for name in names {
            if name == "all" {
                set = TraceSet::all();
            } else {
                set.insert(name.parse()?);
            }
        }
        Ok(set)
    }
}

impl From<TraceSet> for Vec<String> {
    fn from(set: TraceSet) -> Self {
        set.iter().map(|trace| trace.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_insert_and_remove() {
        let mut set = TraceSet::none().with(Trace::Calls);
        assert!(set.contains(Trace::Calls));
        assert!(!set.contains(Trace::Stack));
        set.insert(Trace::Stack);
        set.remove(Trace::Calls);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Trace::Stack]);
    }

    #[test]
    fn test_names_parse() {
        let set = TraceSet::try_from(vec!["memory".to_string(), "state".to_string()]).unwrap();
        assert!(set.contains(Trace::Memory));
        assert!(set.contains(Trace::State));
        assert!(!set.contains(Trace::Branches));
        assert_eq!(TraceSet::try_from(vec!["all".to_string()]), Ok(TraceSet::all()));
        assert!(TraceSet::try_from(vec!["jumps".to_string()]).is_err());
    }
}
