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
use super::instruction::{Instruction, Operation};
use super::operand::{Operand, Register};

pub const STRLEN_LABEL: &str = "__builtin_strlen";
pub const PRINT_NUMBER_LABEL: &str = "__builtin_print_number";
pub const PRINT_BOOLEAN_LABEL: &str = "__builtin_print_boolean";
pub const EXIT_LABEL: &str = "__builtin_exit";

pub const STR_TRUE_LABEL: &str = "__str_true";
pub const STR_FALSE_LABEL: &str = "__str_false";

/// Scans forward from the pointer in `rdi` for a null byte and leaves the
/// scanned length in `rax`. Synthesized as IR rather than inline machine
/// code so it goes through the same register allocator, peephole pass, and
/// emitter as user code.
pub fn strlen_routine() -> Vec<Instruction> {
    use Operand::*;
    use Operation::*;
    use Register::*;
    let loop_label = format!("{STRLEN_LABEL}_loop");
    let done_label = format!("{STRLEN_LABEL}_done");
    vec![
        Instruction::with_target(Label, Operand::Label(STRLEN_LABEL.to_string())),
        Instruction::with_args(Mov, Register(Rax), IntLiteral(0)),
        Instruction::with_target(Label, Operand::Label(loop_label.clone())),
        Instruction::with_args2(CmpBytePtr, Register(Rdi), Register(Rax), IntLiteral(0)),
        Instruction::with_target(Jz, Operand::Label(done_label.clone())),
        Instruction::with_target(Inc, Register(Rax)),
        Instruction::with_target(Jmp, Operand::Label(loop_label)),
        Instruction::with_target(Label, Operand::Label(done_label)),
        Instruction::new(Ret),
    ]
}

/// Prints the unsigned decimal representation of `rdi` to stdout by
/// repeatedly dividing by 10 and filling a small stack buffer back to
/// front, then issuing one `write` syscall over the filled region.
///
/// Stack layout during the loop: `rbx` holds the original stack-buffer end
/// (for computing the final length), `rsi` is the write cursor that walks
/// backward as each digit is produced, `rdi` holds the remaining quotient.
/// Every register the loop touches (`rax`, `rbx`, `rcx`, `rdx`, `rsi`,
/// `rdi`) is callee-saved around the body: this routine is reached through
/// a plain `call`, not the user-call convention in `lower_call`, so nothing
/// else protects the caller's live values.
pub fn print_number_routine() -> Vec<Instruction> {
    use Operand::*;
    use Operation::*;
    use Register::*;
    let loop_label = format!("{PRINT_NUMBER_LABEL}_loop");
    vec![
        Instruction::with_target(Label, Operand::Label(PRINT_NUMBER_LABEL.to_string())),
        Instruction::with_target(Push, Register(Rax)),
        Instruction::with_target(Push, Register(Rbx)),
        Instruction::with_target(Push, Register(Rcx)),
        Instruction::with_target(Push, Register(Rdx)),
        Instruction::with_target(Push, Register(Rsi)),
        Instruction::with_target(Push, Register(Rdi)),
        Instruction::with_args(Sub, Register(Rsp), IntLiteral(32)),
        Instruction::with_args(Mov, Register(Rbx), Register(Rsp)),
        Instruction::with_args(Add, Register(Rbx), IntLiteral(32)),
        Instruction::with_args(Mov, Register(Rsi), Register(Rbx)),
        Instruction::with_target(Label, Operand::Label(loop_label.clone())),
        Instruction::with_args(Mov, Register(Rax), Register(Rdi)),
        Instruction::with_args(Mov, Register(Rcx), IntLiteral(10)),
        Instruction::with_args(Div, Register(Rax), Register(Rcx)),
        Instruction::with_args(Sub, Register(Rsi), IntLiteral(1)),
        Instruction::with_args(Add, Register(Edx), IntLiteral(b'0' as i64)),
        Instruction::with_args(MovMemory, Register(Rsi), Register(Dl)),
        Instruction::with_args(Mov, Register(Rdi), Register(Rax)),
        Instruction::with_args(Cmp, Register(Rdi), IntLiteral(0)),
        Instruction::with_target(Jnz, Operand::Label(loop_label)),
        Instruction::with_args(Mov, Register(Rdx), Register(Rbx)),
        Instruction::with_args(Sub, Register(Rdx), Register(Rsi)),
        Instruction::with_args(Mov, Register(Rax), IntLiteral(1)),
        Instruction::with_args(Mov, Register(Rdi), IntLiteral(1)),
        Instruction::new(SysCall),
        Instruction::with_args(Add, Register(Rsp), IntLiteral(32)),
        Instruction::with_target(Pop, Register(Rdi)),
        Instruction::with_target(Pop, Register(Rsi)),
        Instruction::with_target(Pop, Register(Rdx)),
        Instruction::with_target(Pop, Register(Rcx)),
        Instruction::with_target(Pop, Register(Rbx)),
        Instruction::with_target(Pop, Register(Rax)),
        Instruction::new(Ret),
    ]
}

/// Prints `"true"` or `"false"` depending on whether `rdi` is nonzero.
pub fn print_boolean_routine() -> Vec<Instruction> {
    use Operand::*;
    use Operation::*;
    use Register::*;
    let false_label = format!("{PRINT_BOOLEAN_LABEL}_false");
    let end_label = format!("{PRINT_BOOLEAN_LABEL}_end");
    vec![
        Instruction::with_target(Label, Operand::Label(PRINT_BOOLEAN_LABEL.to_string())),
        Instruction::with_args(Cmp, Register(Rdi), IntLiteral(0)),
        Instruction::with_target(Jz, Operand::Label(false_label.clone())),
        Instruction::with_args(Mov, Register(Rsi), Operand::Label(STR_TRUE_LABEL.to_string())),
        Instruction::with_args(Mov, Register(Rdx), IntLiteral(4)),
        Instruction::with_target(Jmp, Operand::Label(end_label.clone())),
        Instruction::with_target(Label, Operand::Label(false_label)),
        Instruction::with_args(Mov, Register(Rsi), Operand::Label(STR_FALSE_LABEL.to_string())),
        Instruction::with_args(Mov, Register(Rdx), IntLiteral(5)),
        Instruction::with_target(Label, Operand::Label(end_label)),
        Instruction::with_args(Mov, Register(Rax), IntLiteral(1)),
        Instruction::with_args(Mov, Register(Rdi), IntLiteral(1)),
        Instruction::new(SysCall),
        Instruction::new(Ret),
    ]
}

/// Terminates the process via `exit(rdi)`.
pub fn exit_routine() -> Vec<Instruction> {
    use Operand::*;
    use Operation::*;
    use Register::*;
    vec![
        Instruction::with_target(Label, Operand::Label(EXIT_LABEL.to_string())),
        Instruction::with_args(Mov, Register(Rax), IntLiteral(60)),
        Instruction::new(SysCall),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strlen_routine_starts_with_its_label_and_ends_with_ret() {
        let routine = strlen_routine();
        assert_eq!(routine.first().unwrap().op, Operation::Label);
        assert_eq!(routine.last().unwrap().op, Operation::Ret);
    }

    #[test]
    fn exit_routine_sets_syscall_number_60() {
        let routine = exit_routine();
        assert!(routine.iter().any(|i| i.op == Operation::SysCall));
    }
}
