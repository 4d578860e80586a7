//! Code generation from the checked syntax tree
//!
//! Each statement and expression is lowered into its own `Code` buffer and
//! spliced into its parent, so the size of any sub-sequence is known before
//! the branches around it are emitted. The generator tracks the static level
//! of the procedure being generated: the main program is at level 1 and each
//! nested procedure is one deeper.

use crate::compiler::code::{Code, SIZE_JUMP_ALWAYS};
use crate::compiler::error::CompilerError;
use crate::compiler::procedures::Procedures;
use crate::compiler::syms::Type;
use crate::compiler::tree::{
    BlockNode, CaseBranch, Exp, ExpKind, Location, Operator, ProcedureNode, ProgramNode,
    SingleAssign, Statement,
};
use crate::operation::Operation;
use crate::reporter::ErrorReporter;

/// Static level of the main program
pub const MAIN_LEVEL: u32 = 1;
/// Exit code used by STOP when no case label matches
pub const CASE_LABEL_MISSING: i32 = 1;
/// Words per jump table entry: LOAD_CON offset, BR
const JUMP_TABLE_ENTRY: i64 = 3;
/// Largest label range dispatched through a jump table
const MAX_JUMP_TABLE: i64 = 1 << 16;

pub struct CodeGenerator<'a> {
    reporter: &'a mut ErrorReporter,
    procedures: Procedures,
    static_level: u32,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(reporter: &'a mut ErrorReporter, code_start: usize) -> Self {
        CodeGenerator {
            reporter,
            procedures: Procedures::new(code_start),
            static_level: MAIN_LEVEL,
        }
    }

    /// Generate the whole program. Nested procedures are added to the table
    /// before the procedure enclosing them, so the main program comes last.
    pub fn generate_code(mut self, program: &ProgramNode) -> Result<Procedures, CompilerError> {
        self.begin_gen("Program");
        self.static_level = MAIN_LEVEL;
        self.visit_procedure(&program.main)?;
        self.procedures.set_main(program.main.entry.id);
        self.end_gen("Program");
        Ok(self.procedures)
    }

    fn begin_gen(&mut self, node: &str) {
        self.reporter.debug_message(&format!("Generating {}", node));
        self.reporter.inc_debug();
    }

    fn end_gen(&mut self, node: &str) {
        self.reporter.dec_debug();
        self.reporter.debug_message(&format!("End generation of {}", node));
    }

    fn fatal(&mut self, message: impl Into<String>, location: Location) -> CompilerError {
        self.reporter.fatal(message, location)
    }

    /// Number of static links between the current level and `level`
    fn level_diff(&mut self, level: u32, location: Location) -> Result<usize, CompilerError> {
        match self.static_level.checked_sub(level) {
            Some(diff) => Ok(diff as usize),
            None => Err(self.fatal(
                format!(
                    "reference to level {} from shallower level {}",
                    level, self.static_level
                ),
                location,
            )),
        }
    }

    fn visit_procedure(&mut self, node: &ProcedureNode) -> Result<(), CompilerError> {
        self.begin_gen(&format!("Procedure {}", node.entry.ident));
        let code = self.visit_block(&node.block)?;
        self.procedures.add_procedure(node.entry.clone(), code);
        self.end_gen("Procedure");
        Ok(())
    }

    fn visit_block(&mut self, block: &BlockNode) -> Result<Code, CompilerError> {
        self.begin_gen("Block");
        let mut code = Code::new();
        if block.variable_space != 0 {
            code.gen_alloc_stack(block.variable_space);
        }
        code.append(self.gen_statement(&block.body)?);
        code.generate_op(Operation::Return);

        self.static_level += 1;
        for procedure in &block.procedures {
            self.visit_procedure(procedure)?;
        }
        self.static_level -= 1;
        self.end_gen("Block");
        Ok(code)
    }

    pub fn gen_statement(&mut self, stmt: &Statement) -> Result<Code, CompilerError> {
        match stmt {
            Statement::Error(location) => {
                Err(self.fatal("error node reached code generation", *location))
            }
            Statement::Skip => Ok(Code::new()),
            Statement::Assignment(assigns) => self.gen_assignment(assigns),
            Statement::Write(exp) => {
                self.begin_gen("Write");
                let mut code = self.gen_exp(exp)?;
                code.generate_op(Operation::Write);
                self.end_gen("Write");
                Ok(code)
            }
            Statement::Call(procedure) => {
                self.begin_gen(&format!("Call {}", procedure.ident));
                let diff = self.level_diff(procedure.level, Location::default())?;
                let mut code = Code::new();
                code.gen_call(diff, procedure);
                self.end_gen("Call");
                Ok(code)
            }
            Statement::List(stmts) => {
                self.begin_gen("StatementList");
                let mut code = Code::new();
                for stmt in stmts {
                    code.append(self.gen_statement(stmt)?);
                }
                self.end_gen("StatementList");
                Ok(code)
            }
            Statement::If {
                condition,
                then_stmt,
                else_stmt,
            } => {
                self.begin_gen("If");
                let mut code = self.gen_exp(condition)?;
                let then_code = self.gen_statement(then_stmt)?;
                let else_code = self.gen_statement(else_stmt)?;
                code.gen_jump_if_false((then_code.size() + SIZE_JUMP_ALWAYS) as i32);
                code.append(then_code);
                code.gen_jump_always(else_code.size() as i32);
                code.append(else_code);
                self.end_gen("If");
                Ok(code)
            }
            Statement::While { condition, body } => {
                self.begin_gen("While");
                let mut code = self.gen_exp(condition)?;
                let body_code = self.gen_statement(body)?;
                code.gen_jump_if_false((body_code.size() + SIZE_JUMP_ALWAYS) as i32);
                code.append(body_code);
                // back to the start of the condition
                code.gen_jump_always(-((code.size() + SIZE_JUMP_ALWAYS) as i32));
                self.end_gen("While");
                Ok(code)
            }
            Statement::Case {
                condition,
                cases,
                default,
            } => {
                self.begin_gen("Case");
                let code = self.gen_case(condition, cases, default.as_deref())?;
                self.end_gen("Case");
                Ok(code)
            }
        }
    }

    /// Evaluate every right hand side, then store into the targets in
    /// reverse order so each store takes its value from the top of stack.
    fn gen_assignment(&mut self, assigns: &[SingleAssign]) -> Result<Code, CompilerError> {
        self.begin_gen("Assignment");
        let mut code = Code::new();
        for assign in assigns {
            code.append(self.gen_exp(&assign.exp)?);
        }
        for assign in assigns.iter().rev() {
            code.append(self.gen_exp(&assign.variable)?);
            code.gen_store(assign.variable.ty.base_type().space());
        }
        self.end_gen("Assignment");
        Ok(code)
    }

    /// Case statement dispatched through a jump table.
    ///
    /// Layout, where `d` is the condition minus the smallest label:
    ///
    /// ```text
    ///   condition; d := condition - min
    ///   if !(d <= max - min) goto out_of_range
    ///   if !(0 <= d) goto out_of_range
    ///   BR 3 * d
    ///   table:   one LOAD_CON/BR per value in min..=max
    ///   bodies:  each followed by a branch to end
    ///   out_of_range: POP d
    ///   default (or STOP with CASE_LABEL_MISSING)
    ///   end:
    /// ```
    fn gen_case(
        &mut self,
        condition: &Exp,
        cases: &[CaseBranch],
        default: Option<&Statement>,
    ) -> Result<Code, CompilerError> {
        let mut code = self.gen_exp(condition)?;

        let default_code = match default {
            Some(stmt) => self.gen_statement(stmt)?,
            None => {
                let mut halt = Code::new();
                halt.gen_const(CASE_LABEL_MISSING);
                halt.generate_op(Operation::Stop);
                halt
            }
        };

        let (min, max) = match (
            cases.iter().map(|case| case.label).min(),
            cases.iter().map(|case| case.label).max(),
        ) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                code.generate_op(Operation::Pop);
                code.append(default_code);
                return Ok(code);
            }
        };
        let range = max as i64 - min as i64 + 1;
        if range > MAX_JUMP_TABLE {
            return Err(self.fatal(
                format!("case label range {}..{} too large", min, max),
                condition.location,
            ));
        }

        // bodies, with each body's offset from the start of the first body
        let mut labelled: Vec<Option<i64>> = vec![None; range as usize];
        let mut bodies = Vec::with_capacity(cases.len());
        let mut offset = 0i64;
        for case in cases {
            let slot = (case.label as i64 - min as i64) as usize;
            if labelled[slot].is_some() {
                return Err(self.fatal(
                    format!("duplicate case label {}", case.label),
                    condition.location,
                ));
            }
            labelled[slot] = Some(offset);
            let body = self.gen_statement(&case.body)?;
            offset += (body.size() + SIZE_JUMP_ALWAYS) as i64;
            bodies.push(body);
        }
        let bodies_size = offset;
        let default_size = default_code.size() as i64;
        let table_size = JUMP_TABLE_ENTRY * range;
        // the POP of the out of range path sits between bodies and default
        let default_offset = bodies_size + 1;
        let end_offset = default_offset + default_size;

        let mut table = Code::new();
        for (index, target) in labelled.iter().enumerate() {
            let after_entry = JUMP_TABLE_ENTRY * (index as i64 + 1);
            let target = target.unwrap_or(default_offset);
            table.gen_jump_always((table_size - after_entry + target) as i32);
        }

        let mut case_code = Code::new();
        let mut offset = 0i64;
        for body in bodies {
            offset += (body.size() + SIZE_JUMP_ALWAYS) as i64;
            case_code.append(body);
            case_code.gen_jump_always((end_offset - offset) as i32);
        }

        // the dispatch branch: LOAD_CON 3, MPY, BR
        let dispatch_size = 4;
        let mut below = Code::new();
        below.generate_op(Operation::Dup);
        below.generate_op(Operation::Zero);
        below.generate_op(Operation::Swap);
        below.generate_op(Operation::LessEq);
        below.gen_jump_if_false((dispatch_size + table_size + bodies_size) as i32);

        code.gen_const(min.wrapping_neg());
        code.generate_op(Operation::Add);
        code.generate_op(Operation::Dup);
        code.gen_load_constant((range - 1) as i32);
        code.generate_op(Operation::LessEq);
        code.gen_jump_if_false(
            (below.size() as i64 + dispatch_size + table_size + bodies_size) as i32,
        );
        code.append(below);
        code.gen_load_constant(JUMP_TABLE_ENTRY as i32);
        code.generate_op(Operation::Mpy);
        code.generate_op(Operation::Br);
        code.append(table);
        code.append(case_code);
        code.generate_op(Operation::Pop);
        code.append(default_code);
        Ok(code)
    }

    pub fn gen_exp(&mut self, exp: &Exp) -> Result<Code, CompilerError> {
        match &exp.kind {
            ExpKind::Error => Err(self.fatal("error node reached code generation", exp.location)),
            ExpKind::Const(value) => {
                let mut code = Code::new();
                code.gen_const(*value);
                Ok(code)
            }
            ExpKind::Read => {
                let mut code = Code::new();
                code.generate_op(Operation::Read);
                Ok(code)
            }
            ExpKind::Operator { op, args } => self.gen_operator(*op, args, exp.location),
            ExpKind::Variable(var) => {
                self.begin_gen(&format!("Variable {}", var.ident));
                let diff = self.level_diff(var.level, exp.location)?;
                let mut code = Code::new();
                code.gen_mem_ref(diff, var.offset);
                self.end_gen("Variable");
                Ok(code)
            }
            ExpKind::Dereference(lvalue) => {
                self.begin_gen("Dereference");
                let mut code = self.gen_exp(lvalue)?;
                code.gen_load(exp.ty.space());
                self.end_gen("Dereference");
                Ok(code)
            }
            ExpKind::NarrowSubrange(inner) => {
                self.begin_gen("NarrowSubrange");
                let (lower, upper) = match exp.ty.base_type() {
                    Type::Subrange { lower, upper } => (*lower, *upper),
                    other => {
                        return Err(self.fatal(
                            format!("narrowing to non-subrange type {}", other),
                            exp.location,
                        ))
                    }
                };
                let mut code = self.gen_exp(inner)?;
                code.gen_bounds_check(lower, upper);
                self.end_gen("NarrowSubrange");
                Ok(code)
            }
            ExpKind::WidenSubrange(inner) => self.gen_exp(inner),
            ExpKind::Index { array, index } => {
                self.begin_gen("Index");
                let (lower, upper, element_space) = match array.ty.base_type() {
                    Type::Array {
                        lower,
                        upper,
                        element,
                    } => (*lower, *upper, element.space()),
                    other => {
                        return Err(self.fatal(
                            format!("indexing non-array type {}", other),
                            exp.location,
                        ))
                    }
                };
                let mut code = self.gen_exp(array)?;
                code.append(self.gen_exp(index)?);
                code.gen_bounds_check(lower, upper);
                if lower != 0 {
                    code.gen_const(lower.wrapping_neg());
                    code.generate_op(Operation::Add);
                }
                if element_space != 1 {
                    code.gen_const(element_space as i32);
                    code.generate_op(Operation::Mpy);
                }
                code.generate_op(Operation::Add);
                self.end_gen("Index");
                Ok(code)
            }
            ExpKind::New => {
                self.begin_gen("New");
                let size = match &exp.ty {
                    Type::Pointer(target) => target.space(),
                    other => {
                        return Err(self.fatal(
                            format!("new of non-pointer type {}", other),
                            exp.location,
                        ))
                    }
                };
                let mut code = Code::new();
                code.gen_const(size as i32);
                code.generate_op(Operation::AllocHeap);
                self.end_gen("New");
                Ok(code)
            }
            ExpKind::PointerDeref(pointer) => {
                // pointers hold absolute addresses
                let mut code = self.gen_exp(pointer)?;
                code.generate_op(Operation::ToLocal);
                Ok(code)
            }
        }
    }

    fn gen_operator(
        &mut self,
        op: Operator,
        args: &[Exp],
        location: Location,
    ) -> Result<Code, CompilerError> {
        if args.len() != op.arity() {
            return Err(self.fatal(
                format!(
                    "operator {} given {} operands, expected {}",
                    op,
                    args.len(),
                    op.arity()
                ),
                location,
            ));
        }
        self.begin_gen(&format!("Operator {}", op));
        let code = match op {
            Operator::Neg => {
                let mut code = self.gen_exp(&args[0])?;
                code.generate_op(Operation::Negate);
                code
            }
            Operator::Not => {
                let mut code = self.gen_exp(&args[0])?;
                code.gen_bool_not();
                code
            }
            Operator::Add => self.gen_binary(args, false, &[Operation::Add])?,
            // negate the right operand and add
            Operator::Sub => self.gen_binary(args, false, &[Operation::Negate, Operation::Add])?,
            Operator::Mul => self.gen_binary(args, false, &[Operation::Mpy])?,
            Operator::Div => self.gen_binary(args, false, &[Operation::Div])?,
            Operator::Equals => self.gen_binary(args, false, &[Operation::Equal])?,
            Operator::NotEquals => {
                let mut code = self.gen_binary(args, false, &[Operation::Equal])?;
                code.gen_bool_not();
                code
            }
            Operator::Less => self.gen_binary(args, false, &[Operation::Less])?,
            Operator::LessEquals => self.gen_binary(args, false, &[Operation::LessEq])?,
            // reversed operands so LESS/LESSEQ compute > and >=
            Operator::Greater => self.gen_binary(args, true, &[Operation::Less])?,
            Operator::GreaterEquals => self.gen_binary(args, true, &[Operation::LessEq])?,
            Operator::And => self.gen_binary(args, false, &[Operation::And])?,
            Operator::Or => self.gen_binary(args, false, &[Operation::Or])?,
        };
        self.end_gen("Operator");
        Ok(code)
    }

    /// Both operands, left first unless `reversed`, followed by `ops`
    fn gen_binary(
        &mut self,
        args: &[Exp],
        reversed: bool,
        ops: &[Operation],
    ) -> Result<Code, CompilerError> {
        let (first, second) = if reversed {
            (&args[1], &args[0])
        } else {
            (&args[0], &args[1])
        };
        let mut code = self.gen_exp(first)?;
        code.append(self.gen_exp(second)?);
        for op in ops {
            code.generate_op(*op);
        }
        Ok(code)
    }
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
