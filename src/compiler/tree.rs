//! Checked syntax tree handed to the code generator
//!
//! Every expression carries its resolved type and every variable or
//! procedure reference carries its symbol table entry. Coercions between a
//! subrange and its base type have already been inserted as explicit
//! `NarrowSubrange` / `WidenSubrange` nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compiler::syms::{ProcedureEntry, ProcedureRef, Type, VarEntry};

/// Source position of a node, for internal error messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The main program is the outermost procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramNode {
    pub main: ProcedureNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureNode {
    pub entry: ProcedureEntry,
    pub block: BlockNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    /// Words of local variable storage above the frame header
    #[serde(default)]
    pub variable_space: usize,
    pub body: Statement,
    #[serde(default)]
    pub procedures: Vec<ProcedureNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Left behind by the checker after a reported error
    Error(Location),
    Skip,
    /// One or more simultaneous assignments
    Assignment(Vec<SingleAssign>),
    Write(Exp),
    Call(ProcedureRef),
    List(Vec<Statement>),
    If {
        condition: Exp,
        then_stmt: Box<Statement>,
        else_stmt: Box<Statement>,
    },
    While {
        condition: Exp,
        body: Box<Statement>,
    },
    Case {
        condition: Exp,
        #[serde(default)]
        cases: Vec<CaseBranch>,
        #[serde(default)]
        default: Option<Box<Statement>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleAssign {
    /// Expression of reference type giving the target address
    pub variable: Exp,
    pub exp: Exp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub label: i32,
    pub body: Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    And,
    Or,
    Neg,
    Not,
}

impl Operator {
    pub fn arity(self) -> usize {
        match self {
            Operator::Neg | Operator::Not => 1,
            _ => 2,
        }
    }

    fn result_type(self) -> Type {
        match self {
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Neg => {
                Type::Integer
            }
            _ => Type::Boolean,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::Less => "<",
            Operator::LessEquals => "<=",
            Operator::Greater => ">",
            Operator::GreaterEquals => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Neg => "-",
            Operator::Not => "!",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exp {
    pub kind: ExpKind,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpKind {
    Error,
    Const(i32),
    Read,
    Operator { op: Operator, args: Vec<Exp> },
    /// Address of a variable; the type is a reference
    Variable(VarEntry),
    /// Value held at the address computed by the inner expression
    Dereference(Box<Exp>),
    /// Bounds are those of the node's subrange type
    NarrowSubrange(Box<Exp>),
    WidenSubrange(Box<Exp>),
    /// Address of an element of the array referenced by `array`
    Index { array: Box<Exp>, index: Box<Exp> },
    /// Allocate a heap object of the type pointed to by the node's type
    New,
    /// Address of the object a pointer value refers to
    PointerDeref(Box<Exp>),
}

impl Exp {
    pub fn new(kind: ExpKind, ty: Type) -> Self {
        Exp {
            kind,
            ty,
            location: Location::default(),
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn constant(value: i32) -> Self {
        Exp::new(ExpKind::Const(value), Type::Integer)
    }

    pub fn boolean(value: bool) -> Self {
        Exp::new(ExpKind::Const(i32::from(value)), Type::Boolean)
    }

    pub fn read() -> Self {
        Exp::new(ExpKind::Read, Type::Integer)
    }

    pub fn variable(var: &VarEntry) -> Self {
        Exp::new(
            ExpKind::Variable(var.clone()),
            Type::Reference(Box::new(var.ty.clone())),
        )
    }

    /// Value of a variable: the dereferenced variable address
    pub fn value_of(var: &VarEntry) -> Self {
        Exp::dereference(Exp::variable(var))
    }

    pub fn dereference(lvalue: Exp) -> Self {
        let ty = lvalue.ty.base_type().clone();
        Exp::new(ExpKind::Dereference(Box::new(lvalue)), ty)
    }

    pub fn binary(op: Operator, left: Exp, right: Exp) -> Self {
        Exp::new(
            ExpKind::Operator {
                op,
                args: vec![left, right],
            },
            op.result_type(),
        )
    }

    pub fn unary(op: Operator, arg: Exp) -> Self {
        Exp::new(ExpKind::Operator { op, args: vec![arg] }, op.result_type())
    }

    pub fn narrow(exp: Exp, lower: i32, upper: i32) -> Self {
        Exp::new(
            ExpKind::NarrowSubrange(Box::new(exp)),
            Type::Subrange { lower, upper },
        )
    }

    pub fn widen(exp: Exp) -> Self {
        Exp::new(ExpKind::WidenSubrange(Box::new(exp)), Type::Integer)
    }

    pub fn index(array: Exp, index: Exp) -> Self {
        let element = match array.ty.base_type() {
            Type::Array { element, .. } => (**element).clone(),
            other => other.clone(),
        };
        Exp::new(
            ExpKind::Index {
                array: Box::new(array),
                index: Box::new(index),
            },
            Type::Reference(Box::new(element)),
        )
    }

    pub fn new_object(target: Type) -> Self {
        Exp::new(ExpKind::New, Type::Pointer(Box::new(target)))
    }

    pub fn pointer_deref(pointer: Exp) -> Self {
        let target = match &pointer.ty {
            Type::Pointer(target) => (**target).clone(),
            other => other.clone(),
        };
        Exp::new(
            ExpKind::PointerDeref(Box::new(pointer)),
            Type::Reference(Box::new(target)),
        )
    }
}

impl Statement {
    pub fn assign(variable: Exp, exp: Exp) -> Self {
        Statement::Assignment(vec![SingleAssign { variable, exp }])
    }

    pub fn assign_all(pairs: Vec<(Exp, Exp)>) -> Self {
        Statement::Assignment(
            pairs
                .into_iter()
                .map(|(variable, exp)| SingleAssign { variable, exp })
                .collect(),
        )
    }

    pub fn if_then_else(condition: Exp, then_stmt: Statement, else_stmt: Statement) -> Self {
        Statement::If {
            condition,
            then_stmt: Box::new(then_stmt),
            else_stmt: Box::new(else_stmt),
        }
    }

    pub fn while_loop(condition: Exp, body: Statement) -> Self {
        Statement::While {
            condition,
            body: Box::new(body),
        }
    }

    pub fn case(condition: Exp, cases: Vec<(i32, Statement)>, default: Option<Statement>) -> Self {
        Statement::Case {
            condition,
            cases: cases
                .into_iter()
                .map(|(label, body)| CaseBranch { label, body })
                .collect(),
            default: default.map(Box::new),
        }
    }
}
