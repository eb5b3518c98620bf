/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use std::collections::HashMap;

use super::builtins;
use super::instruction::{Instruction, Operation};
use super::operand::{Operand, Register};
use super::{IrFunction, IrProgram};
use crate::errors::WisniaError;
use crate::source::ast::{BinaryOp, Expr, PrimitiveType, Program, Stmt, UnaryOp};

/// Walks the resolved AST and produces three-address IR, one [`IrFunction`]
/// per source function plus the four built-in routines appended at the
/// end. This replaces the original's visitor double-dispatch with a plain
/// `match` over the AST's tagged-union nodes.
pub struct Lowering<'a> {
    program: &'a Program,
    temp_counter: usize,
    label_counter: usize,
    string_literals: Vec<(String, String)>,
    /// Declared type of every local currently in scope, rebuilt per function.
    var_types: HashMap<String, PrimitiveType>,
    /// (break_label, continue_label) stack for nested loops.
    loop_labels: Vec<(String, String)>,
    /// The temporary holding the caller's return address for the function
    /// currently being lowered, popped off the stack in the prologue and
    /// pushed back before every `ret`. `None` while lowering `main`, which
    /// never executes `ret` (it falls into `__builtin_exit` instead).
    return_addr: Option<Operand>,
}

type LResult<T> = Result<T, WisniaError>;

impl<'a> Lowering<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            temp_counter: 0,
            label_counter: 0,
            string_literals: Vec::new(),
            var_types: HashMap::new(),
            loop_labels: Vec::new(),
            return_addr: None,
        }
    }

    fn fresh_temp(&mut self) -> Operand {
        let name = format!("_t{}", self.temp_counter);
        self.temp_counter += 1;
        Operand::Identifier(name)
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        let name = format!("_L{}_{}", self.label_counter, hint);
        self.label_counter += 1;
        name
    }

    pub fn lower_program(mut self) -> LResult<IrProgram> {
        let mut functions = Vec::new();
        // Functions are lowered in reverse order of appearance in the
        // source file, and the resulting IR slices are emitted to the text
        // section in that same reverse order. No `main` label or call is
        // ever emitted to reach it — the ELF entry point is simply the
        // first byte of the text section — so by convention source files
        // declare `main` last (after the functions it calls) and this
        // reversal is what puts it first in the text section.
        for f in self.program.functions.iter().rev() {
            functions.push(self.lower_function(f)?);
        }
        if !self.program.classes.is_empty() {
            return Err(WisniaError::not_implemented("class code generation is not supported"));
        }
        functions.push(IrFunction { name: builtins::STRLEN_LABEL.into(), instructions: builtins::strlen_routine() });
        functions.push(IrFunction {
            name: builtins::PRINT_NUMBER_LABEL.into(),
            instructions: builtins::print_number_routine(),
        });
        functions.push(IrFunction {
            name: builtins::PRINT_BOOLEAN_LABEL.into(),
            instructions: builtins::print_boolean_routine(),
        });
        functions.push(IrFunction { name: builtins::EXIT_LABEL.into(), instructions: builtins::exit_routine() });

        self.string_literals.push((builtins::STR_TRUE_LABEL.into(), "true".into()));
        self.string_literals.push((builtins::STR_FALSE_LABEL.into(), "false".into()));

        Ok(IrProgram { functions, string_literals: self.string_literals })
    }

    fn lower_function(&mut self, f: &crate::source::ast::FnDef) -> LResult<IrFunction> {
        self.var_types.clear();
        for p in &f.params {
            self.var_types.insert(p.name.clone(), p.ty);
        }
        let mut instrs = Vec::new();
        instrs.push(Instruction::with_target(Operation::Label, Operand::Label(f.name.clone())));

        // The caller's `call` pushed a return address on top of the
        // arguments it pushed; pop it into a temporary before popping the
        // parameters themselves off, then push it back right before every
        // `ret` so the hardware return still targets the right place.
        if f.name != "main" {
            let return_addr = self.fresh_temp();
            instrs.push(Instruction::with_target(Operation::Pop, return_addr.clone()));
            self.return_addr = Some(return_addr);
            for param in f.params.iter().rev() {
                instrs.push(Instruction::with_target(Operation::Pop, Operand::Identifier(param.name.clone())));
            }
        } else {
            self.return_addr = None;
        }

        self.lower_block(&f.body, &mut instrs)?;

        if !matches!(f.body.last(), Some(Stmt::Return { .. })) {
            self.emit_return(&mut instrs, None);
        }

        Ok(IrFunction { name: f.name.clone(), instructions: instrs })
    }

    /// Emits one function exit: for `main`, a fixed `rdi = 0; call exit`
    /// (any returned value is discarded — the language has no way to feed a
    /// process exit status back through `main`'s return). For any other
    /// function, optionally moves `value` into `r15` (the call convention's
    /// return-value register), restores the saved return address, and emits
    /// `ret`.
    fn emit_return(&mut self, out: &mut Vec<Instruction>, value: Option<Operand>) {
        match self.return_addr.clone() {
            Some(return_addr) => {
                if let Some(v) = value {
                    out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::R15), v));
                }
                out.push(Instruction::with_target(Operation::Push, return_addr));
                out.push(Instruction::new(Operation::Ret));
            }
            None => {
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::IntLiteral(0),
                ));
                out.push(Instruction::with_target(Operation::Call, Operand::Label(builtins::EXIT_LABEL.into())));
            }
        }
    }

    fn lower_block(&mut self, stmts: &[Stmt], out: &mut Vec<Instruction>) -> LResult<()> {
        for stmt in stmts {
            self.lower_stmt(stmt, out)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Instruction>) -> LResult<()> {
        match stmt {
            Stmt::VarDecl { name, ty, init, .. } => {
                self.var_types.insert(name.clone(), *ty);
                if let Some(expr) = init {
                    let value = self.lower_expr(expr, out)?;
                    out.push(Instruction::with_args(Operation::Mov, Operand::Identifier(name.clone()), value));
                }
            }
            Stmt::VarAssign { name, value, .. } => {
                let value = self.lower_expr(value, out)?;
                out.push(Instruction::with_args(Operation::Mov, Operand::Identifier(name.clone()), value));
            }
            Stmt::ExprStmt(expr) => {
                self.lower_expr(expr, out)?;
            }
            Stmt::Print(args) => {
                for arg in args {
                    self.lower_print_arg(arg, out)?;
                }
            }
            Stmt::Read { name, .. } => self.lower_read(name, out)?,
            Stmt::Return { value, .. } => {
                let v = value.as_ref().map(|expr| self.lower_expr(expr, out)).transpose()?;
                self.emit_return(out, v);
            }
            Stmt::Break => {
                let (break_label, _) = self
                    .loop_labels
                    .last()
                    .cloned()
                    .ok_or_else(|| WisniaError::semantic(0, "'break' outside of a loop"))?;
                out.push(Instruction::with_target(Operation::Jmp, Operand::Label(break_label)));
            }
            Stmt::Continue => {
                let (_, continue_label) = self
                    .loop_labels
                    .last()
                    .cloned()
                    .ok_or_else(|| WisniaError::semantic(0, "'continue' outside of a loop"))?;
                out.push(Instruction::with_target(Operation::Jmp, Operand::Label(continue_label)));
            }
            Stmt::Block(body) => self.lower_block(body, out)?,
            Stmt::If { branches, else_branch } => self.lower_if(branches, else_branch.as_deref(), out)?,
            Stmt::While { condition, body } => self.lower_while(condition, body, out)?,
            Stmt::For { init, condition, increment, body } => {
                self.lower_for(init, condition, increment, body, out)?
            }
            Stmt::Foreach { .. } => {
                return Err(WisniaError::not_implemented("'foreach' over collections is not supported"));
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        branches: &[(Expr, Vec<Stmt>)],
        else_branch: Option<&[Stmt]>,
        out: &mut Vec<Instruction>,
    ) -> LResult<()> {
        let end_label = self.fresh_label("if_end");
        for (cond, body) in branches {
            let next_label = self.fresh_label("if_next");
            let cond_val = self.lower_expr(cond, out)?;
            out.push(Instruction::with_args(Operation::Cmp, cond_val, Operand::IntLiteral(0)));
            out.push(Instruction::with_target(Operation::Jz, Operand::Label(next_label.clone())));
            self.lower_block(body, out)?;
            out.push(Instruction::with_target(Operation::Jmp, Operand::Label(end_label.clone())));
            out.push(Instruction::with_target(Operation::Label, Operand::Label(next_label)));
        }
        if let Some(body) = else_branch {
            self.lower_block(body, out)?;
        }
        out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expr, body: &[Stmt], out: &mut Vec<Instruction>) -> LResult<()> {
        let start_label = self.fresh_label("while_start");
        let end_label = self.fresh_label("while_end");
        out.push(Instruction::with_target(Operation::Label, Operand::Label(start_label.clone())));
        let cond_val = self.lower_expr(condition, out)?;
        out.push(Instruction::with_args(Operation::Cmp, cond_val, Operand::IntLiteral(0)));
        out.push(Instruction::with_target(Operation::Jz, Operand::Label(end_label.clone())));
        self.loop_labels.push((end_label.clone(), start_label.clone()));
        self.lower_block(body, out)?;
        self.loop_labels.pop();
        out.push(Instruction::with_target(Operation::Jmp, Operand::Label(start_label)));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: &Stmt,
        condition: &Expr,
        increment: &Stmt,
        body: &[Stmt],
        out: &mut Vec<Instruction>,
    ) -> LResult<()> {
        self.lower_stmt(init, out)?;
        let start_label = self.fresh_label("for_start");
        let continue_label = self.fresh_label("for_continue");
        let end_label = self.fresh_label("for_end");
        out.push(Instruction::with_target(Operation::Label, Operand::Label(start_label.clone())));
        let cond_val = self.lower_expr(condition, out)?;
        out.push(Instruction::with_args(Operation::Cmp, cond_val, Operand::IntLiteral(0)));
        out.push(Instruction::with_target(Operation::Jz, Operand::Label(end_label.clone())));
        self.loop_labels.push((end_label.clone(), continue_label.clone()));
        self.lower_block(body, out)?;
        self.loop_labels.pop();
        out.push(Instruction::with_target(Operation::Label, Operand::Label(continue_label)));
        self.lower_stmt(increment, out)?;
        out.push(Instruction::with_target(Operation::Jmp, Operand::Label(start_label)));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
        Ok(())
    }

    fn lower_read(&mut self, name: &str, out: &mut Vec<Instruction>) -> LResult<()> {
        // reads up to 20 bytes from stdin into a stack buffer, then converts
        // the ASCII digits to an integer with a small accumulation loop.
        let digit_loop = self.fresh_label("read_digit_loop");
        let digit_end = self.fresh_label("read_digit_end");
        let buf = self.fresh_temp();
        out.push(Instruction::with_args(Operation::Sub, Operand::Register(Register::Rsp), Operand::IntLiteral(20)));
        out.push(Instruction::with_args(Operation::Mov, buf.clone(), Operand::Register(Register::Rsp)));
        out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rax), Operand::IntLiteral(0)));
        out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rdi), Operand::IntLiteral(0)));
        out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rsi), buf.clone()));
        out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rdx), Operand::IntLiteral(20)));
        out.push(Instruction::new(Operation::SysCall));

        let acc = self.fresh_temp();
        let cursor = self.fresh_temp();
        let digit = self.fresh_temp();
        out.push(Instruction::with_args(Operation::Mov, acc.clone(), Operand::IntLiteral(0)));
        out.push(Instruction::with_args(Operation::Mov, cursor.clone(), buf));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(digit_loop.clone())));
        out.push(Instruction::with_args(Operation::LoadByte, digit.clone(), cursor.clone()));
        out.push(Instruction::with_args(Operation::Cmp, digit.clone(), Operand::IntLiteral(b'0' as i64)));
        out.push(Instruction::with_target(Operation::Jl, Operand::Label(digit_end.clone())));
        out.push(Instruction::with_args(Operation::Sub, digit.clone(), Operand::IntLiteral(b'0' as i64)));
        out.push(Instruction::with_args(Operation::Mul, acc.clone(), Operand::IntLiteral(10)));
        out.push(Instruction::with_args(Operation::Add, acc.clone(), digit.clone()));
        out.push(Instruction::with_args(Operation::Add, cursor.clone(), Operand::IntLiteral(1)));
        out.push(Instruction::with_target(Operation::Jmp, Operand::Label(digit_loop)));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(digit_end)));
        out.push(Instruction::with_args(Operation::Mov, Operand::Identifier(name.to_string()), acc));
        out.push(Instruction::with_args(Operation::Add, Operand::Register(Register::Rsp), Operand::IntLiteral(20)));
        Ok(())
    }

    fn lower_print_arg(&mut self, expr: &Expr, out: &mut Vec<Instruction>) -> LResult<()> {
        match expr {
            Expr::StringLiteral(s) => {
                let label = self.fresh_label("str");
                self.string_literals.push((label.clone(), s.clone()));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rsi),
                    Operand::Label(label),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdx),
                    Operand::IntLiteral(s.len() as i64),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rax),
                    Operand::IntLiteral(1),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::IntLiteral(1),
                ));
                out.push(Instruction::new(Operation::SysCall));
            }
            Expr::BoolLiteral(b) => {
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::IntLiteral(*b as i64),
                ));
                out.push(Instruction::with_target(
                    Operation::Call,
                    Operand::Label(builtins::PRINT_BOOLEAN_LABEL.into()),
                ));
            }
            Expr::Var { name, line } if self.var_types.get(name.as_str()) == Some(&PrimitiveType::String) => {
                let _ = line;
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::Identifier(name.clone()),
                ));
                out.push(Instruction::with_target(Operation::Call, Operand::Label(builtins::STRLEN_LABEL.into())));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdx),
                    Operand::Register(Register::Rax),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rsi),
                    Operand::Identifier(name.clone()),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rax),
                    Operand::IntLiteral(1),
                ));
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::IntLiteral(1),
                ));
                out.push(Instruction::new(Operation::SysCall));
            }
            Expr::Var { name, .. } if self.var_types.get(name.as_str()) == Some(&PrimitiveType::Bool) => {
                out.push(Instruction::with_args(
                    Operation::Mov,
                    Operand::Register(Register::Rdi),
                    Operand::Identifier(name.clone()),
                ));
                out.push(Instruction::with_target(
                    Operation::Call,
                    Operand::Label(builtins::PRINT_BOOLEAN_LABEL.into()),
                ));
            }
            _ => {
                if matches!(
                    self.expr_type(expr),
                    Some(PrimitiveType::Float) | Some(PrimitiveType::Void)
                ) {
                    return Err(WisniaError::not_implemented("printing float values is not supported"));
                }
                let value = self.lower_expr(expr, out)?;
                out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rdi), value));
                out.push(Instruction::with_target(Operation::Call, Operand::Label(builtins::PRINT_NUMBER_LABEL.into())));
            }
        }
        Ok(())
    }

    /// Best-effort type of an expression from locally tracked declarations,
    /// used only to route `print` to the right built-in and to reject the
    /// not-yet-supported float path early with a clear error.
    fn expr_type(&self, expr: &Expr) -> Option<PrimitiveType> {
        match expr {
            Expr::IntLiteral(_) => Some(PrimitiveType::Int),
            Expr::FloatLiteral(_) => Some(PrimitiveType::Float),
            Expr::BoolLiteral(_) => Some(PrimitiveType::Bool),
            Expr::StringLiteral(_) => Some(PrimitiveType::String),
            Expr::Var { name, .. } => self.var_types.get(name.as_str()).copied(),
            _ => None,
        }
    }

    fn lower_expr(&mut self, expr: &Expr, out: &mut Vec<Instruction>) -> LResult<Operand> {
        match expr {
            Expr::IntLiteral(n) => Ok(Operand::IntLiteral(*n)),
            Expr::BoolLiteral(b) => Ok(Operand::IntLiteral(*b as i64)),
            Expr::FloatLiteral(_) => Err(WisniaError::not_implemented("floating point arithmetic is not supported")),
            Expr::StringLiteral(s) => {
                let label = self.fresh_label("str");
                self.string_literals.push((label.clone(), s.clone()));
                Ok(Operand::Label(label))
            }
            Expr::Var { name, .. } => Ok(Operand::Identifier(name.clone())),
            Expr::Unary { op, operand, .. } => self.lower_unary(*op, operand, out),
            Expr::Binary { op, lhs, rhs, .. } => self.lower_binary(*op, lhs, rhs, out),
            Expr::Call { name, args, .. } => self.lower_call(name, args, out),
            Expr::ClassInit { .. } => Err(WisniaError::not_implemented("class instantiation is not supported")),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, out: &mut Vec<Instruction>) -> LResult<Operand> {
        let value = self.lower_expr(operand, out)?;
        let result = self.fresh_temp();
        match op {
            UnaryOp::Neg => {
                out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(0)));
                out.push(Instruction::with_args(Operation::Sub, result.clone(), value));
            }
            UnaryOp::Not => {
                let true_label = self.fresh_label("not_true");
                let end_label = self.fresh_label("not_end");
                out.push(Instruction::with_args(Operation::Cmp, value, Operand::IntLiteral(0)));
                out.push(Instruction::with_target(Operation::Jz, Operand::Label(true_label.clone())));
                out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(0)));
                out.push(Instruction::with_target(Operation::Jmp, Operand::Label(end_label.clone())));
                out.push(Instruction::with_target(Operation::Label, Operand::Label(true_label)));
                out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(1)));
                out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
            }
        }
        Ok(result)
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, out: &mut Vec<Instruction>) -> LResult<Operand> {
        match op {
            BinaryOp::And => return self.lower_short_circuit(true, lhs, rhs, out),
            BinaryOp::Or => return self.lower_short_circuit(false, lhs, rhs, out),
            _ => {}
        }

        let lhs_val = self.lower_expr(lhs, out)?;
        let rhs_val = self.lower_expr(rhs, out)?;
        let result = self.fresh_temp();

        if op == BinaryOp::Div {
            // `idiv` divides the 128-bit value in `rdx:rax` by its one
            // register operand, so the dividend has to sit in `rax`
            // specifically rather than wherever the allocator happened to
            // put `result` — capture the divisor into `rcx` first, before
            // `rax` is touched, in case it was already sitting in `rax`
            // itself (e.g. `x / x`).
            out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rcx), rhs_val));
            out.push(Instruction::with_args(Operation::Mov, Operand::Register(Register::Rax), lhs_val));
            out.push(Instruction::with_args(
                Operation::Div,
                Operand::Register(Register::Rax),
                Operand::Register(Register::Rcx),
            ));
            out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::Register(Register::Rax)));
            return Ok(result);
        }

        let arithmetic_op = match op {
            BinaryOp::Add => Some(Operation::Add),
            BinaryOp::Sub => Some(Operation::Sub),
            BinaryOp::Mul => Some(Operation::Mul),
            _ => None,
        };
        if let Some(arith) = arithmetic_op {
            out.push(Instruction::with_args(Operation::Mov, result.clone(), lhs_val));
            out.push(Instruction::with_args(arith, result.clone(), rhs_val));
            return Ok(result);
        }

        // comparisons: Cmp followed by the jump whose condition mirrors the
        // source operator, producing a 0/1 result in `result`.
        let jump_if_true = match op {
            BinaryOp::Eq => Operation::Je,
            BinaryOp::Neq => Operation::Jne,
            BinaryOp::Lt => Operation::Jl,
            BinaryOp::Le => Operation::Jle,
            BinaryOp::Gt => Operation::Jg,
            BinaryOp::Ge => Operation::Jge,
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        let true_label = self.fresh_label("cmp_true");
        let end_label = self.fresh_label("cmp_end");
        out.push(Instruction::with_args(Operation::Cmp, lhs_val, rhs_val));
        out.push(Instruction::with_target(jump_if_true, Operand::Label(true_label.clone())));
        out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(0)));
        out.push(Instruction::with_target(Operation::Jmp, Operand::Label(end_label.clone())));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(true_label)));
        out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(1)));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
        Ok(result)
    }

    fn lower_short_circuit(
        &mut self,
        is_and: bool,
        lhs: &Expr,
        rhs: &Expr,
        out: &mut Vec<Instruction>,
    ) -> LResult<Operand> {
        let result = self.fresh_temp();
        let short_circuit_label = self.fresh_label(if is_and { "and_short" } else { "or_short" });
        let end_label = self.fresh_label(if is_and { "and_end" } else { "or_end" });

        let lhs_val = self.lower_expr(lhs, out)?;
        out.push(Instruction::with_args(Operation::Cmp, lhs_val, Operand::IntLiteral(0)));
        if is_and {
            out.push(Instruction::with_target(Operation::Jz, Operand::Label(short_circuit_label.clone())));
        } else {
            out.push(Instruction::with_target(Operation::Jne, Operand::Label(short_circuit_label.clone())));
        }

        let rhs_val = self.lower_expr(rhs, out)?;
        out.push(Instruction::with_args(Operation::Cmp, rhs_val, Operand::IntLiteral(0)));
        if is_and {
            out.push(Instruction::with_target(Operation::Jz, Operand::Label(short_circuit_label.clone())));
            out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(1)));
        } else {
            out.push(Instruction::with_target(Operation::Jne, Operand::Label(short_circuit_label.clone())));
            out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::IntLiteral(0)));
        }
        out.push(Instruction::with_target(Operation::Jmp, Operand::Label(end_label.clone())));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(short_circuit_label)));
        out.push(Instruction::with_args(
            Operation::Mov,
            result.clone(),
            Operand::IntLiteral(if is_and { 0 } else { 1 }),
        ));
        out.push(Instruction::with_target(Operation::Label, Operand::Label(end_label)));
        Ok(result)
    }

    /// Lowers a call: every allocatable register except `r15` is pushed,
    /// arguments are pushed in order, the callee is invoked, the stack is
    /// unwound, and the return value (convention: left in `r15` by the
    /// callee) is moved into a fresh temporary once every other register
    /// is back to its pre-call value.
    fn lower_call(&mut self, name: &str, args: &[Expr], out: &mut Vec<Instruction>) -> LResult<Operand> {
        if name.contains("::") {
            return Err(WisniaError::not_implemented(format!(
                "class method calls ('{name}') are not supported"
            )));
        }
        let callee = self
            .program
            .functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| WisniaError::semantic(0, format!("call to undefined function '{name}'")))?;
        if callee.params.len() != args.len() {
            return Err(WisniaError::semantic(
                0,
                format!("'{name}' expects {} argument(s), got {}", callee.params.len(), args.len()),
            ));
        }

        let mut arg_vals = Vec::with_capacity(args.len());
        for arg in args {
            arg_vals.push(self.lower_expr(arg, out)?);
        }

        // `r15` is excluded from this save/restore pair: it's the dedicated
        // return-value channel (see `Stmt::Return` lowering), and saving it
        // here only to immediately overwrite it with the callee's result
        // would defeat the point. A live value the allocator happens to
        // park in `r15` across a call is the one case this convention
        // doesn't protect.
        for reg in super::operand::ALLOCATABLE_REGISTERS {
            if reg == Register::R15 {
                continue;
            }
            out.push(Instruction::with_target(Operation::Push, Operand::Register(reg)));
        }
        for val in &arg_vals {
            out.push(Instruction::with_target(Operation::Push, val.clone()));
        }
        out.push(Instruction::with_target(Operation::Call, Operand::Label(name.to_string())));
        // The callee's own prologue pops the return address and every
        // argument off the stack (see `lower_function`), so the caller only
        // has its saved registers left to restore — no per-argument discard
        // pop here, or the stack would be unwound past where the callee
        // already left it.
        for reg in super::operand::ALLOCATABLE_REGISTERS.iter().rev() {
            if *reg == Register::R15 {
                continue;
            }
            out.push(Instruction::with_target(Operation::Pop, Operand::Register(*reg)));
        }
        // Only now, after every other register is back to its pre-call
        // value, read the callee's result out of `r15` into a temporary —
        // capturing it any earlier would expose it to being overwritten by
        // one of the pops above if the allocator later assigns this
        // temporary the same register as some other live value.
        let result = self.fresh_temp();
        out.push(Instruction::with_args(Operation::Mov, result.clone(), Operand::Register(Register::R15)));
        Ok(result)
    }
}

pub fn lower(program: &Program) -> LResult<IrProgram> {
    Lowering::new(program).lower_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_and_resolve;

    fn lower_src(src: &str) -> IrProgram {
        let program = parse_and_resolve(src).unwrap();
        lower(&program).unwrap()
    }

    #[test]
    fn lowers_main_with_exit_call() {
        let ir = lower_src("fn main() { }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main_fn.instructions.iter().any(|i| {
            i.op == Operation::Call && i.target == Some(Operand::Label(builtins::EXIT_LABEL.into()))
        }));
    }

    #[test]
    fn appends_all_four_builtins() {
        let ir = lower_src("fn main() { }");
        for name in [
            builtins::STRLEN_LABEL,
            builtins::PRINT_NUMBER_LABEL,
            builtins::PRINT_BOOLEAN_LABEL,
            builtins::EXIT_LABEL,
        ] {
            assert!(ir.functions.iter().any(|f| f.name == name), "missing builtin {name}");
        }
    }

    #[test]
    fn var_decl_lowers_to_mov_into_identifier() {
        let ir = lower_src("fn main() { int x = 5; }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main_fn.instructions.iter().any(|i| {
            i.op == Operation::Mov && i.target == Some(Operand::Identifier("x".into()))
        }));
    }

    #[test]
    fn print_int_literal_calls_print_number() {
        let ir = lower_src("fn main() { print(42); }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main_fn.instructions.iter().any(|i| {
            i.op == Operation::Call && i.target == Some(Operand::Label(builtins::PRINT_NUMBER_LABEL.into()))
        }));
    }

    #[test]
    fn print_string_literal_registers_a_data_label() {
        let ir = lower_src(r#"fn main() { print("hi"); }"#);
        assert!(ir.string_literals.iter().any(|(_, text)| text == "hi"));
    }

    #[test]
    fn while_loop_lowers_to_labeled_jumps() {
        let ir = lower_src("fn main() { int x = 0; while (x < 10) { x = x + 1; } }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main_fn.instructions.iter().any(|i| i.op == Operation::Jz));
        assert!(main_fn.instructions.iter().any(|i| i.op == Operation::Jmp));
    }

    #[test]
    fn division_routes_dividend_and_divisor_through_fixed_registers() {
        let ir = lower_src("fn main() { int x = 10; int y = 3; int z = x / y; }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        let div = main_fn.instructions.iter().find(|i| i.op == Operation::Div).unwrap();
        assert_eq!(div.target, Some(Operand::Register(Register::Rax)));
        assert_eq!(div.arg1, Some(Operand::Register(Register::Rcx)));
    }

    #[test]
    fn float_literal_is_not_implemented() {
        let program = parse_and_resolve("fn main() { float x = 1.5; }").unwrap();
        let err = lower(&program).unwrap_err();
        assert!(matches!(err, WisniaError::NotImplemented { .. }));
    }

    #[test]
    fn call_to_user_function_pushes_and_pops_all_allocatable_registers_except_r15() {
        let ir = lower_src("fn helper() -> int { return 1; } fn main() { int x = helper(); }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        let push_count = main_fn.instructions.iter().filter(|i| i.op == Operation::Push).count();
        let pop_count = main_fn.instructions.iter().filter(|i| i.op == Operation::Pop).count();
        let saved_count = super::super::operand::ALLOCATABLE_REGISTERS.len() - 1;
        assert!(push_count >= saved_count);
        assert!(pop_count >= saved_count);
        let pushes_r15 = main_fn
            .instructions
            .iter()
            .any(|i| i.op == Operation::Push && i.target == Some(Operand::Register(Register::R15)));
        assert!(!pushes_r15, "r15 must not be saved/restored around a call — it carries the result");
    }

    #[test]
    fn call_result_survives_the_register_restore_sequence() {
        let ir =
            lower_src("fn foo() -> int { return 5; } fn main() { int x = foo(); print(x); }");
        let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
        // The mov that captures r15 into the result temporary must come
        // after every restore pop, not before — otherwise the restore would
        // clobber it whenever the allocator assigns that temporary one of
        // the 14 saved registers.
        let last_pop = main_fn.instructions.iter().rposition(|i| i.op == Operation::Pop);
        let capture = main_fn.instructions.iter().position(|i| {
            i.op == Operation::Mov && i.arg1 == Some(Operand::Register(Register::R15))
        });
        assert!(last_pop.is_some() && capture.is_some());
        assert!(capture.unwrap() > last_pop.unwrap());
    }
}
