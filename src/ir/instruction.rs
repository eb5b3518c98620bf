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
use super::operand::Operand;

/// The three-address IR opcode set. Lowering produces instructions in this
/// form; register allocation rewrites operands in place; the peephole pass
/// removes redundant `Mov`s; the emitter dispatches on this enum one
/// variant at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // data movement
    Mov,
    /// Stores `arg1` into the byte at the address held in `target`.
    MovMemory,
    /// Loads the zero-extended byte at the address held in `arg1` into `target`.
    LoadByte,
    Lea,
    Push,
    Pop,
    // control flow
    Label,
    Jmp,
    Jz,
    Jnz,
    Je,
    Jne,
    Jl,
    Jle,
    Jg,
    Jge,
    Call,
    Ret,
    // arithmetic / comparison
    Add,
    Sub,
    Mul,
    Div,
    Inc,
    Dec,
    Cmp,
    CmpBytePtr,
    Xor,
    Test,
    // syscalls
    SysCall,
}

/// A single three-address-form IR instruction: an operation plus up to a
/// target and two argument operands. Which slots are populated depends on
/// the operation (e.g. `Label` uses only `target`, `Add` uses all three).
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Operation,
    pub target: Option<Operand>,
    pub arg1: Option<Operand>,
    pub arg2: Option<Operand>,
}

impl Instruction {
    pub fn new(op: Operation) -> Self {
        Self { op, target: None, arg1: None, arg2: None }
    }

    pub fn with_target(op: Operation, target: Operand) -> Self {
        Self { op, target: Some(target), arg1: None, arg2: None }
    }

    pub fn with_args(op: Operation, target: Operand, arg1: Operand) -> Self {
        Self { op, target: Some(target), arg1: Some(arg1), arg2: None }
    }

    pub fn with_args2(op: Operation, target: Operand, arg1: Operand, arg2: Operand) -> Self {
        Self { op, target: Some(target), arg1: Some(arg1), arg2: Some(arg2) }
    }

    /// Every operand slot actually populated on this instruction, in
    /// target/arg1/arg2 order. Used by the register allocator's live
    /// interval scan and by the final operand-substitution pass.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        [self.target.as_ref(), self.arg1.as_ref(), self.arg2.as_ref()]
            .into_iter()
            .flatten()
    }

    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [self.target.as_mut(), self.arg1.as_mut(), self.arg2.as_mut()]
            .into_iter()
            .flatten()
    }
}
