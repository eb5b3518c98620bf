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
/// The sixteen general-purpose x86-64 registers plus a handful of
/// sub-register aliases used only by the built-in runtime routines
/// (`Edx`/`Esi`/`Dl`), and the `Spilled` sentinel a linear-scan allocator
/// assigns to a temporary it ran out of physical registers for.
///
/// `Rsp` is never handed out by the allocator (it's the stack pointer) but
/// is kept in this enum and in [`Register::matrix_index`] because the 4x4
/// register-register encoding matrix is indexed by position in the full
/// 16-register machine order, not the 15-register allocatable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    /// 32-bit alias of RDX, used by `lea`/`add` in the print-number builtin.
    Edx,
    /// 32-bit alias of RSI, used by the print-number builtin's buffer pointer.
    Esi,
    /// 8-bit low alias of RDX, used to peel one decimal digit at a time.
    Dl,
    /// Placeholder for a temporary the allocator could not fit in a register.
    Spilled,
}

/// The registers the linear-scan allocator may hand out, in lowest-free-slot
/// preference order. `Rsp` is excluded; it is the stack pointer.
pub const ALLOCATABLE_REGISTERS: [Register; 15] = [
    Register::Rax,
    Register::Rcx,
    Register::Rdx,
    Register::Rbx,
    Register::Rbp,
    Register::Rsi,
    Register::Rdi,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
    Register::R15,
];

impl Register {
    /// Position in the canonical 16-register machine order used to index
    /// the 4x4 REX/ModRM encoding matrix. Sub-register aliases have no
    /// matrix position; callers that need one always operate on the
    /// corresponding full register instead.
    pub fn matrix_index(self) -> Option<usize> {
        use Register::*;
        Some(match self {
            Rax => 0,
            Rcx => 1,
            Rdx => 2,
            Rbx => 3,
            Rsp => 4,
            Rbp => 5,
            Rsi => 6,
            Rdi => 7,
            R8 => 8,
            R9 => 9,
            R10 => 10,
            R11 => 11,
            R12 => 12,
            R13 => 13,
            R14 => 14,
            R15 => 15,
            Edx | Esi | Dl | Spilled => return None,
        })
    }

}

/// A value an instruction reads or writes: a register, an integer literal, a
/// named identifier (a temporary or a user variable, resolved to a register
/// by the allocator), or a label reference (a jump/call target or a
/// data-section symbol — string literals flow through the emitter as a
/// `Label` into the data section rather than as their own operand kind,
/// since by the time one reaches an instruction it has already been
/// registered as a data-section entry; see `Lowering::lower_print_arg`).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    IntLiteral(i64),
    /// A named value not yet assigned a register: `_t3`, `x`, a function
    /// name used as a call target, or a loop/if label.
    Identifier(String),
    Label(String),
}
