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
use crate::ir::instruction::{Instruction, Operation};
use crate::ir::operand::Operand;

/// The sole peephole rule: drop any `Mov target, arg1` once register
/// allocation has resolved both operands to the exact same physical
/// register. Anything else (different registers, spills, non-Mov
/// instructions) passes through unchanged.
pub fn optimize(instructions: Vec<Instruction>) -> Vec<Instruction> {
    instructions.into_iter().filter(|instr| !is_redundant_self_move(instr)).collect()
}

fn is_redundant_self_move(instr: &Instruction) -> bool {
    instr.op == Operation::Mov
        && matches!(
            (&instr.target, &instr.arg1),
            (Some(Operand::Register(a)), Some(Operand::Register(b))) if a == b
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::Register;

    #[test]
    fn removes_mov_into_same_register() {
        let instrs = vec![Instruction::with_args(
            Operation::Mov,
            Operand::Register(Register::Rax),
            Operand::Register(Register::Rax),
        )];
        assert!(optimize(instrs).is_empty());
    }

    #[test]
    fn keeps_mov_between_different_registers() {
        let instrs = vec![Instruction::with_args(
            Operation::Mov,
            Operand::Register(Register::Rax),
            Operand::Register(Register::Rcx),
        )];
        assert_eq!(optimize(instrs).len(), 1);
    }

    #[test]
    fn keeps_other_instructions_untouched() {
        let instrs = vec![Instruction::with_args(
            Operation::Add,
            Operand::Register(Register::Rax),
            Operand::IntLiteral(1),
        )];
        assert_eq!(optimize(instrs).len(), 1);
    }

    #[test]
    fn preserves_instruction_order_around_removed_moves() {
        let instrs = vec![
            Instruction::with_target(Operation::Label, Operand::Label("start".into())),
            Instruction::with_args(Operation::Mov, Operand::Register(Register::Rax), Operand::Register(Register::Rax)),
            Instruction::new(Operation::Ret),
        ];
        let result = optimize(instrs);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].op, Operation::Label);
        assert_eq!(result[1].op, Operation::Ret);
    }
}
