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
/// Flat opcode constant tables, one per instruction family, the way a
/// hand-written encoder typically keeps them close to the emit function
/// that uses each one rather than behind an abstraction.
pub const MOV_OPCODE: u8 = 0x89; // MOV r/m64, r64
pub const MOV_IMM_OPCODE: u8 = 0xC7; // MOV r/m64, imm32 (/0)
pub const LEA_OPCODE: u8 = 0x8D;
pub const ADD_OPCODE: u8 = 0x01; // ADD r/m64, r64
pub const ADD_IMM_OPCODE: u8 = 0x81; // ADD r/m64, imm32 (/0)
pub const SUB_OPCODE: u8 = 0x29; // SUB r/m64, r64
pub const SUB_IMM_OPCODE: u8 = 0x81; // SUB r/m64, imm32 (/5)
pub const CMP_OPCODE: u8 = 0x39; // CMP r/m64, r64
pub const CMP_IMM_OPCODE: u8 = 0x81; // CMP r/m64, imm32 (/7)
pub const CMP_BYTE_PTR_OPCODE: u8 = 0x80; // CMP byte [r+r], imm8 (/7)
pub const XOR_OPCODE: u8 = 0x31;
pub const TEST_OPCODE: u8 = 0x85;
pub const IMUL_OPCODE_PREFIX: u8 = 0x0F;
pub const IMUL_OPCODE: u8 = 0xAF; // IMUL r64, r/m64
pub const IDIV_MODRM_EXT: u8 = 7; // F7 /7
pub const ARITH_GRP1_OPCODE: u8 = 0xF7; // NEG/NOT/MUL/DIV group (/3 neg, /6 div, /7 idiv)
pub const INC_OPCODE: u8 = 0xFF; // /0
pub const DEC_OPCODE: u8 = 0xFF; // /1
pub const PUSH_OPCODE_BASE: u8 = 0x50;
pub const POP_OPCODE_BASE: u8 = 0x58;
pub const CALL_OPCODE: u8 = 0xE8; // call rel32
pub const RET_OPCODE: u8 = 0xC3;
pub const JMP_SHORT_OPCODE: u8 = 0xEB;
pub const JZ_SHORT_OPCODE: u8 = 0x74;
pub const JNZ_SHORT_OPCODE: u8 = 0x75;
pub const JE_SHORT_OPCODE: u8 = 0x74;
pub const JNE_SHORT_OPCODE: u8 = 0x75;
pub const JL_SHORT_OPCODE: u8 = 0x7C;
pub const JLE_SHORT_OPCODE: u8 = 0x7E;
pub const JG_SHORT_OPCODE: u8 = 0x7F;
pub const JGE_SHORT_OPCODE: u8 = 0x7D;
pub const SYSCALL_OPCODE: [u8; 2] = [0x0F, 0x05];
pub const CQO_OPCODE: u8 = 0x99;

/// `ModRM.rm` field for `edx`/`rdx` (index 2 in the canonical register
/// order) when building the 32-bit-operand `edx` immediate special case by
/// hand instead of through the 4x4 matrix (which only knows the 64-bit
/// register file).
pub const EDX_RM: u8 = 2;

/// `inc`/`dec`/`neg`/`div` on the `rax` register have no special one-byte
/// short form in 64-bit mode (unlike 32-bit mode's `0x40+r`); every general
/// register uses the same `ModRM`-based encoding, so these "register
/// special cases" that existed for 32-bit opcodes are deliberately absent
/// here.
pub const REX_W: u8 = 0x48;
