//! Symbol table entries as seen by the code generator
//!
//! The checker resolves every identifier before code generation, so the
//! generator only needs the static level, frame offset and type of each
//! variable, and the identity and declaring level of each procedure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a procedure, unique within one program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcId(pub usize);

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolved types. Only the information that affects generated code is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Integer,
    Boolean,
    Subrange { lower: i32, upper: i32 },
    Array {
        lower: i32,
        upper: i32,
        element: Box<Type>,
    },
    Pointer(Box<Type>),
    /// Address of a variable of the base type (an lvalue)
    Reference(Box<Type>),
}

impl Type {
    /// Number of words occupied by a value of this type
    pub fn space(&self) -> usize {
        match self {
            Type::Integer
            | Type::Boolean
            | Type::Subrange { .. }
            | Type::Pointer(_)
            | Type::Reference(_) => 1,
            Type::Array {
                lower,
                upper,
                element,
            } => {
                if upper < lower {
                    0
                } else {
                    (*upper as i64 - *lower as i64 + 1) as usize * element.space()
                }
            }
        }
    }

    /// The type referred to, with any reference stripped
    pub fn base_type(&self) -> &Type {
        match self {
            Type::Reference(base) => base.base_type(),
            other => other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::Subrange { lower, upper } => write!(f, "[{}..{}]", lower, upper),
            Type::Array {
                lower,
                upper,
                element,
            } => write!(f, "array [{}..{}] of {}", lower, upper, element),
            Type::Pointer(base) => write!(f, "^{}", base),
            Type::Reference(base) => write!(f, "ref({})", base),
        }
    }
}

/// A variable: where it lives and what it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarEntry {
    pub ident: String,
    /// Static level of the scope declaring the variable
    pub level: u32,
    /// Word offset from the frame pointer of that scope
    pub offset: i32,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl VarEntry {
    pub fn new(ident: &str, level: u32, offset: i32, ty: Type) -> Self {
        VarEntry {
            ident: ident.to_string(),
            level,
            offset,
            ty,
        }
    }

    pub fn space(&self) -> usize {
        self.ty.space()
    }
}

/// A procedure as referenced from a call statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureRef {
    pub id: ProcId,
    pub ident: String,
    /// Static level of the scope the procedure is declared in
    pub level: u32,
}

/// A procedure declaration. The locals are only used for trace backs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureEntry {
    pub id: ProcId,
    pub ident: String,
    pub level: u32,
    #[serde(default)]
    pub locals: Vec<VarEntry>,
}

impl ProcedureEntry {
    pub fn new(id: usize, ident: &str, level: u32) -> Self {
        ProcedureEntry {
            id: ProcId(id),
            ident: ident.to_string(),
            level,
            locals: Vec::new(),
        }
    }

    pub fn with_locals(mut self, locals: Vec<VarEntry>) -> Self {
        self.locals = locals;
        self
    }

    pub fn reference(&self) -> ProcedureRef {
        ProcedureRef {
            id: self.id,
            ident: self.ident.clone(),
            level: self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_array_space_multiplies_element_space() {
        let inner = Type::Array {
            lower: 1,
            upper: 3,
            element: Box::new(Type::Integer),
        };
        let outer = Type::Array {
            lower: 0,
            upper: 1,
            element: Box::new(inner.clone()),
        };
        assert_eq!(inner.space(), 3);
        assert_eq!(outer.space(), 6);
    }

    #[test]
    fn test_empty_array_has_no_space() {
        let empty = Type::Array {
            lower: 5,
            upper: 4,
            element: Box::new(Type::Integer),
        };
        assert_eq!(empty.space(), 0);
    }

    #[test]
    fn test_base_type_strips_references() {
        let ty = Type::Reference(Box::new(Type::Subrange { lower: 0, upper: 9 }));
        assert_eq!(ty.base_type(), &Type::Subrange { lower: 0, upper: 9 });
        assert_eq!(ty.space(), 1);
    }
}
