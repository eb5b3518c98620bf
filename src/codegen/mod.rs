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
pub mod matrix;
pub mod tables;

use std::collections::HashMap;

use crate::bytebuffer::ByteBuffer;
use crate::errors::WisniaError;
use crate::ir::instruction::{Instruction, Operation};
use crate::ir::operand::{Operand, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixupKind {
    /// A one-byte relative displacement, patched `0xff - diff` style,
    /// short-jump only (the only jump-distance encoding this emitter
    /// supports; see [`crate::SPEC_FULL`]'s Non-goals).
    Jump,
    /// A four-byte `call rel32` displacement.
    Call,
    /// A four-byte absolute virtual address into the data section.
    Data,
}

#[derive(Debug, Clone)]
struct Fixup {
    /// Byte offset within the text section where the patch is written.
    offset: usize,
    kind: FixupKind,
    target: String,
}

use crate::elf::{TEXT_OFFSET, VIRT_DATA};

/// Emits x86-64 machine code for one flattened, allocated, peephole-optimized
/// instruction stream. Instructions are expected to carry only
/// `Operand::Register`, `Operand::IntLiteral`, and `Operand::Label`
/// operands by this point — any `Operand::Identifier` reaching the emitter
/// means register allocation was skipped, which is a programming error in
/// the pipeline rather than a user-facing one.
pub struct Emitter {
    text: ByteBuffer,
    data: ByteBuffer,
    label_table: HashMap<String, usize>,
    data_label_table: HashMap<String, usize>,
    fixups: Vec<Fixup>,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            text: ByteBuffer::new(),
            data: ByteBuffer::new(),
            label_table: HashMap::new(),
            data_label_table: HashMap::new(),
            fixups: Vec::new(),
        }
    }

    /// Lays out every string literal into the data section up front. This
    /// has to happen before the text section is emitted so that `mov reg,
    /// label` instructions referencing a string can be recorded as data
    /// fixups immediately; the fixups themselves are only patched once the
    /// full text section (and therefore every label's final offset) is
    /// known, preserving the two-phase emit-then-patch ordering.
    pub fn layout_data_section(&mut self, string_literals: &[(String, String)]) {
        for (label, text) in string_literals {
            self.data_label_table.insert(label.clone(), self.data.len());
            self.data.put_bytes(text.as_bytes());
            self.data.put_u8(0);
        }
    }

    pub fn generate(mut self, instructions: &[Instruction]) -> Result<(Vec<u8>, Vec<u8>), WisniaError> {
        for instr in instructions {
            self.emit_instruction(instr)?;
        }
        self.apply_fixups()?;
        Ok((self.text.into_vec(), self.data.into_vec()))
    }

    fn emit_instruction(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        use Operation::*;
        match instr.op {
            Label => self.emit_label(instr),
            Mov => self.emit_mov(instr),
            MovMemory => self.emit_mov_memory(instr),
            LoadByte => self.emit_load_byte(instr),
            Lea => self.emit_lea(instr),
            Push => self.emit_push(instr),
            Pop => self.emit_pop(instr),
            Jmp | Jz | Jnz | Je | Jne | Jl | Jle | Jg | Jge => self.emit_jump(instr),
            Call => self.emit_call(instr),
            Ret => {
                self.text.put_u8(tables::RET_OPCODE);
                Ok(())
            }
            Add => self.emit_arith(instr, tables::ADD_OPCODE, tables::ADD_IMM_OPCODE, 0),
            Sub => self.emit_arith(instr, tables::SUB_OPCODE, tables::SUB_IMM_OPCODE, 5),
            Cmp => self.emit_arith(instr, tables::CMP_OPCODE, tables::CMP_IMM_OPCODE, 7),
            Xor => self.emit_arith(instr, tables::XOR_OPCODE, tables::ADD_IMM_OPCODE, 6),
            Test => self.emit_test(instr),
            CmpBytePtr => self.emit_cmp_byte_ptr(instr),
            Mul => self.emit_mul(instr),
            Div => self.emit_div(instr),
            Inc => self.emit_inc_dec(instr, 0),
            Dec => self.emit_inc_dec(instr, 1),
            SysCall => {
                self.text.put_bytes(&tables::SYSCALL_OPCODE);
                Ok(())
            }
        }
    }

    fn require_register(op: &Operand) -> Result<Register, WisniaError> {
        match op {
            Operand::Register(Register::Spilled) => {
                Err(WisniaError::codegen("spilled operand has no physical register to emit"))
            }
            Operand::Register(r) => Ok(*r),
            other => Err(WisniaError::instruction(format!("expected a register operand, found {other:?}"))),
        }
    }

    fn require_imm(op: &Operand) -> Result<i64, WisniaError> {
        match op {
            Operand::IntLiteral(v) => Ok(*v),
            other => Err(WisniaError::instruction(format!("expected an immediate operand, found {other:?}"))),
        }
    }

    fn emit_label(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let Some(Operand::Label(name)) = &instr.target else {
            return Err(WisniaError::instruction("Label instruction missing a label operand"));
        };
        self.label_table.insert(name.clone(), self.text.len());
        Ok(())
    }

    fn emit_mov(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Mov missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("Mov missing source"))?;
        let dst = Self::require_register(target)?;

        match arg1 {
            Operand::Register(src) => {
                let pair = matrix::encode_reg_reg(*src, dst)
                    .ok_or_else(|| WisniaError::codegen("mov operand has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(tables::MOV_OPCODE);
                self.text.put_u8(pair.modrm);
            }
            Operand::IntLiteral(value) => {
                let pair = matrix::encode_reg_opcode_ext(dst, 0)
                    .ok_or_else(|| WisniaError::codegen("mov destination has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(tables::MOV_IMM_OPCODE);
                self.text.put_u8(pair.modrm);
                self.text.put_u32_le(*value as u32);
            }
            Operand::Label(label) => {
                let pair = matrix::encode_reg_opcode_ext(dst, 0)
                    .ok_or_else(|| WisniaError::codegen("mov destination has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(tables::MOV_IMM_OPCODE);
                self.text.put_u8(pair.modrm);
                self.fixups.push(Fixup { offset: self.text.len(), kind: FixupKind::Data, target: label.clone() });
                self.text.put_u32_le(0);
            }
            other => return Err(WisniaError::instruction(format!("unsupported Mov source {other:?}"))),
        }
        Ok(())
    }

    /// Stores `arg1` (a byte-sized register alias) into the address held
    /// in `target`.
    fn emit_mov_memory(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("MovMemory missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("MovMemory missing value"))?;
        let ptr_reg = Self::require_register(target)?;
        let value_reg = Self::require_register(arg1)?;
        let ptr_idx = ptr_reg
            .matrix_index()
            .ok_or_else(|| WisniaError::codegen("MovMemory pointer has no matrix encoding"))?;
        // MOV r/m8, r8 (0x88) takes its source out of ModRM.reg, not a fixed
        // field; only `dl` (the print-number built-in's one digit byte) is
        // ever passed here.
        let value_field = match value_reg {
            Register::Dl => 2,
            other => {
                return Err(WisniaError::codegen(format!("MovMemory value register {other:?} has no byte encoding")))
            }
        };
        let rex = tables::REX_W | if ptr_idx >= 8 { 0x01 } else { 0 };
        self.text.put_u8(rex);
        self.text.put_u8(0x88); // MOV byte [r], r8
        let modrm = 0b0000_0000 | (value_field << 3) | (ptr_idx as u8 & 0x7);
        self.text.put_u8(modrm);
        Ok(())
    }

    /// Loads the zero-extended byte at the address held in `arg1` into `target`.
    fn emit_load_byte(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("LoadByte missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("LoadByte missing pointer"))?;
        let dst = Self::require_register(target)?;
        let ptr = Self::require_register(arg1)?;
        let dst_idx = dst.matrix_index().ok_or_else(|| WisniaError::codegen("LoadByte dst has no matrix encoding"))?;
        let ptr_idx = ptr.matrix_index().ok_or_else(|| WisniaError::codegen("LoadByte ptr has no matrix encoding"))?;
        let rex = tables::REX_W
            | if dst_idx >= 8 { 0x04 } else { 0 }
            | if ptr_idx >= 8 { 0x01 } else { 0 };
        self.text.put_u8(rex);
        self.text.put_bytes(&[0x0F, 0xB6]); // MOVZX r64, r/m8
        let modrm = 0b0000_0000 | ((dst_idx as u8 & 0x7) << 3) | (ptr_idx as u8 & 0x7);
        self.text.put_u8(modrm);
        Ok(())
    }

    fn emit_lea(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Lea missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("Lea missing source"))?;
        let dst = Self::require_register(target)?;
        let Operand::Label(label) = arg1 else {
            return Err(WisniaError::instruction("Lea source must be a label"));
        };
        let dst_idx = dst.matrix_index().ok_or_else(|| WisniaError::codegen("Lea destination has no matrix encoding"))?;
        let rex = tables::REX_W | if dst_idx >= 8 { 0x04 } else { 0 };
        self.text.put_u8(rex);
        self.text.put_u8(tables::LEA_OPCODE);
        self.text.put_u8(0b0000_0101 | ((dst_idx as u8 & 0x7) << 3)); // RIP-relative ModRM
        self.fixups.push(Fixup { offset: self.text.len(), kind: FixupKind::Data, target: label.clone() });
        self.text.put_u32_le(0);
        Ok(())
    }

    fn emit_push(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        match instr.target.as_ref() {
            Some(Operand::Register(reg)) => {
                let idx = reg.matrix_index().ok_or_else(|| WisniaError::codegen("push operand has no matrix encoding"))?;
                if idx >= 8 {
                    self.text.put_u8(0x41); // REX.B
                }
                self.text.put_u8(tables::PUSH_OPCODE_BASE + (idx as u8 & 0x7));
            }
            Some(Operand::IntLiteral(value)) => {
                self.text.put_u8(0x68); // push imm32
                self.text.put_u32_le(*value as u32);
            }
            other => return Err(WisniaError::instruction(format!("unsupported Push operand {other:?}"))),
        }
        Ok(())
    }

    fn emit_pop(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Pop missing target"))?;
        let reg = Self::require_register(target)?;
        let idx = reg.matrix_index().ok_or_else(|| WisniaError::codegen("pop operand has no matrix encoding"))?;
        if idx >= 8 {
            self.text.put_u8(0x41);
        }
        self.text.put_u8(tables::POP_OPCODE_BASE + (idx as u8 & 0x7));
        Ok(())
    }

    fn jump_opcode(op: Operation) -> u8 {
        use Operation::*;
        match op {
            Jmp => tables::JMP_SHORT_OPCODE,
            Jz => tables::JZ_SHORT_OPCODE,
            Jnz => tables::JNZ_SHORT_OPCODE,
            Je => tables::JE_SHORT_OPCODE,
            Jne => tables::JNE_SHORT_OPCODE,
            Jl => tables::JL_SHORT_OPCODE,
            Jle => tables::JLE_SHORT_OPCODE,
            Jg => tables::JG_SHORT_OPCODE,
            Jge => tables::JGE_SHORT_OPCODE,
            _ => unreachable!("not a jump opcode"),
        }
    }

    fn emit_jump(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let Some(Operand::Label(label)) = &instr.target else {
            return Err(WisniaError::instruction("jump instruction missing a label target"));
        };
        self.text.put_u8(Self::jump_opcode(instr.op));
        self.fixups.push(Fixup { offset: self.text.len(), kind: FixupKind::Jump, target: label.clone() });
        self.text.put_u8(0);
        Ok(())
    }

    fn emit_call(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let Some(Operand::Label(label)) = &instr.target else {
            return Err(WisniaError::instruction("call instruction missing a label target"));
        };
        self.text.put_u8(tables::CALL_OPCODE);
        self.fixups.push(Fixup { offset: self.text.len(), kind: FixupKind::Call, target: label.clone() });
        self.text.put_u32_le(0);
        Ok(())
    }

    fn emit_arith(
        &mut self,
        instr: &Instruction,
        reg_opcode: u8,
        imm_opcode: u8,
        imm_modrm_ext: u8,
    ) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("missing source"))?;
        let dst = Self::require_register(target)?;
        match arg1 {
            Operand::Register(src) => {
                let pair = matrix::encode_reg_reg(*src, dst)
                    .ok_or_else(|| WisniaError::codegen("arithmetic operand has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(reg_opcode);
                self.text.put_u8(pair.modrm);
            }
            Operand::IntLiteral(value) => {
                if dst == Register::Edx {
                    // 32-bit-operand special case: no REX.W, `edx` addressed
                    // directly by its matrix-less alias's ModRM.rm (2).
                    let modrm = 0b1100_0000 | ((imm_modrm_ext & 0x7) << 3) | tables::EDX_RM;
                    self.text.put_u8(imm_opcode);
                    self.text.put_u8(modrm);
                    self.text.put_u32_le(*value as u32);
                    return Ok(());
                }
                let pair = matrix::encode_reg_opcode_ext(dst, imm_modrm_ext)
                    .ok_or_else(|| WisniaError::codegen("arithmetic destination has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(imm_opcode);
                self.text.put_u8(pair.modrm);
                self.text.put_u32_le(*value as u32);
            }
            other => return Err(WisniaError::instruction(format!("unsupported arithmetic operand {other:?}"))),
        }
        Ok(())
    }

    fn emit_test(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Test missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("Test missing source"))?;
        let dst = Self::require_register(target)?;
        let src = Self::require_register(arg1)?;
        let pair =
            matrix::encode_reg_reg(src, dst).ok_or_else(|| WisniaError::codegen("Test operand has no matrix encoding"))?;
        self.text.put_u8(pair.rex);
        self.text.put_u8(tables::TEST_OPCODE);
        self.text.put_u8(pair.modrm);
        Ok(())
    }

    /// `cmp byte [target + arg1], arg2` — the only memory-operand
    /// comparison form this emitter supports, used by the string-length
    /// built-in's null-terminator scan.
    fn emit_cmp_byte_ptr(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("CmpBytePtr missing base"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("CmpBytePtr missing index"))?;
        let arg2 = instr.arg2.as_ref().ok_or_else(|| WisniaError::instruction("CmpBytePtr missing comparand"))?;
        let base = Self::require_register(target)?;
        let index = Self::require_register(arg1)?;
        let value = Self::require_imm(arg2)?;
        let base_idx = base.matrix_index().ok_or_else(|| WisniaError::codegen("CmpBytePtr base has no matrix encoding"))?;
        let index_idx =
            index.matrix_index().ok_or_else(|| WisniaError::codegen("CmpBytePtr index has no matrix encoding"))?;
        let rex = tables::REX_W
            | if index_idx >= 8 { 0x02 } else { 0 } // REX.X for SIB index
            | if base_idx >= 8 { 0x01 } else { 0 };
        self.text.put_u8(rex);
        self.text.put_u8(tables::CMP_BYTE_PTR_OPCODE);
        self.text.put_u8(0b0000_0100 | (7 << 3)); // ModRM: mod=00, reg=/7, rm=SIB
        self.text.put_u8(((index_idx as u8 & 0x7) << 3) | (base_idx as u8 & 0x7)); // SIB: scale=1
        self.text.put_u8(value as u8);
        Ok(())
    }

    fn emit_mul(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Mul missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("Mul missing operand"))?;
        let dst = Self::require_register(target)?;
        match arg1 {
            Operand::Register(src) => {
                // IMUL r64, r/m64 transposes the usual dst/src roles: the
                // ModRM.reg field is the destination and ModRM.rm is the
                // source, the opposite assignment from MOV/ADD/SUB/CMP.
                let pair = matrix::encode_reg_reg(dst, *src)
                    .ok_or_else(|| WisniaError::codegen("Mul operand has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_bytes(&[tables::IMUL_OPCODE_PREFIX, tables::IMUL_OPCODE]);
                self.text.put_u8(pair.modrm);
            }
            Operand::IntLiteral(value) => {
                let pair = matrix::encode_reg_reg(dst, dst)
                    .ok_or_else(|| WisniaError::codegen("Mul destination has no matrix encoding"))?;
                self.text.put_u8(pair.rex);
                self.text.put_u8(0x69); // IMUL r64, r/m64, imm32
                self.text.put_u8(pair.modrm);
                self.text.put_u32_le(*value as u32);
            }
            other => return Err(WisniaError::instruction(format!("unsupported Mul operand {other:?}"))),
        }
        Ok(())
    }

    /// `target /= arg1` via hardware `idiv`: sign-extends `rax` into
    /// `rdx:rax` with `cqo`, divides by `arg1`, and leaves the quotient in
    /// `rax`/remainder in `rdx` exactly where the hardware instruction puts
    /// them — callers that need the remainder (the print-number built-in)
    /// read `rdx` directly afterward rather than through this contract.
    fn emit_div(&mut self, instr: &Instruction) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("Div missing target"))?;
        let arg1 = instr.arg1.as_ref().ok_or_else(|| WisniaError::instruction("Div missing divisor"))?;
        let dst = Self::require_register(target)?;
        if dst != Register::Rax {
            return Err(WisniaError::codegen("Div target must already be allocated to rax"));
        }
        let divisor = Self::require_register(arg1)?;
        self.text.put_u8(tables::CQO_OPCODE);
        let pair = matrix::encode_reg_opcode_ext(divisor, tables::IDIV_MODRM_EXT)
            .ok_or_else(|| WisniaError::codegen("Div divisor has no matrix encoding"))?;
        self.text.put_u8(pair.rex);
        self.text.put_u8(tables::ARITH_GRP1_OPCODE);
        self.text.put_u8(pair.modrm);
        Ok(())
    }

    fn emit_inc_dec(&mut self, instr: &Instruction, reg_field: u8) -> Result<(), WisniaError> {
        let target = instr.target.as_ref().ok_or_else(|| WisniaError::instruction("missing target"))?;
        let dst = Self::require_register(target)?;
        let pair = matrix::encode_reg_opcode_ext(dst, reg_field)
            .ok_or_else(|| WisniaError::codegen("inc/dec operand has no matrix encoding"))?;
        self.text.put_u8(pair.rex);
        self.text.put_u8(tables::INC_OPCODE);
        self.text.put_u8(pair.modrm);
        Ok(())
    }

    fn apply_fixups(&mut self) -> Result<(), WisniaError> {
        for fixup in &self.fixups {
            match fixup.kind {
                FixupKind::Jump => {
                    let target_offset = *self
                        .label_table
                        .get(&fixup.target)
                        .ok_or_else(|| WisniaError::codegen(format!("undefined label '{}'", fixup.target)))?;
                    // rel8 = label-offset - (fixup-offset + 1), the address of
                    // the byte after the one-byte displacement. Signed so it
                    // covers both directions: `if`/`while`/`for` lowering
                    // emits both backward jumps (loop re-entry) and forward
                    // ones (jumping over a body to an `else`/`end` label), and
                    // this short-jump encoding has no separate form for either.
                    let instr_end = fixup.offset as i64 + 1;
                    let rel = target_offset as i64 - instr_end;
                    if !(i8::MIN as i64..=i8::MAX as i64).contains(&rel) {
                        return Err(WisniaError::codegen("jump target too far for a short displacement"));
                    }
                    self.text.patch_u8(fixup.offset, rel as i8 as u8);
                }
                FixupKind::Call => {
                    let target_offset = *self
                        .label_table
                        .get(&fixup.target)
                        .ok_or_else(|| WisniaError::codegen(format!("undefined label '{}'", fixup.target)))?;
                    // rel32 = label-offset - (fixup-offset + 4), the address
                    // of the byte after the 4-byte displacement. Equivalent
                    // to `0xffffffff - (diff - 1)` for backward calls but
                    // expressed as plain signed arithmetic so it also
                    // handles forward calls (a function defined later in
                    // the text section than its call site).
                    let instr_end = fixup.offset as i64 + 4;
                    let rel = (target_offset as i64 - instr_end) as i32 as u32;
                    self.text.patch_u32_le(fixup.offset, rel);
                }
                FixupKind::Data => {
                    let data_offset = *self
                        .data_label_table
                        .get(&fixup.target)
                        .ok_or_else(|| WisniaError::codegen(format!("undefined data label '{}'", fixup.target)))?;
                    // Mirrors the data segment's vaddr in `elf::build_executable`:
                    // VIRT_DATA + TEXT_OFFSET + |text| + data_offset, not just
                    // VIRT_DATA + data_offset, so the two stay in lockstep.
                    let addr = VIRT_DATA + TEXT_OFFSET + self.text.len() as u64 + data_offset as u64;
                    self.text.patch_u32_le(fixup.offset, addr as u32);
                }
            }
        }
        Ok(())
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::Instruction;

    #[test]
    fn ret_emits_single_byte() {
        let emitter = Emitter::new();
        let (text, _) = emitter.generate(&[Instruction::new(Operation::Ret)]).unwrap();
        assert_eq!(text, vec![tables::RET_OPCODE]);
    }

    #[test]
    fn mov_register_to_register_has_rex_prefix() {
        let emitter = Emitter::new();
        let instr = Instruction::with_args(
            Operation::Mov,
            Operand::Register(Register::Rax),
            Operand::Register(Register::Rcx),
        );
        let (text, _) = emitter.generate(&[instr]).unwrap();
        assert_eq!(text.len(), 3);
        assert_eq!(text[0] & 0xF0, 0x40);
    }

    #[test]
    fn backward_jump_resolves_against_label_table() {
        let emitter = Emitter::new();
        let instrs = vec![
            Instruction::with_target(Operation::Label, Operand::Label("loop".into())),
            Instruction::new(Operation::Ret),
            Instruction::with_target(Operation::Jmp, Operand::Label("loop".into())),
        ];
        let (text, _) = emitter.generate(&instrs).unwrap();
        // label at offset 0, ret at offset 0 (1 byte), jmp opcode at offset 1
        assert_eq!(text[1], tables::JMP_SHORT_OPCODE);
    }

    #[test]
    fn forward_jump_resolves_against_label_table() {
        let emitter = Emitter::new();
        let instrs = vec![
            Instruction::with_target(Operation::Jz, Operand::Label("end".into())),
            Instruction::new(Operation::Ret),
            Instruction::with_target(Operation::Label, Operand::Label("end".into())),
            Instruction::new(Operation::Ret),
        ];
        // `if`/`while`/`for` lowering jumps over a body to a label defined
        // later in the stream; this must patch cleanly rather than hit the
        // "forward short jumps are not supported" error the emitter used to
        // raise for every such jump.
        let (text, _) = emitter.generate(&instrs).unwrap();
        assert_eq!(text[0], tables::JZ_SHORT_OPCODE);
        // bytes: [0]=opcode [1]=placeholder [2]=Ret, label "end" at offset 3.
        // rel = target(3) - (fixup_offset(1) + 1) = 1.
        assert_eq!(text[1], 1);
    }

    #[test]
    fn mov_memory_encodes_dl_in_the_reg_field() {
        let emitter = Emitter::new();
        let instr = Instruction::with_args(Operation::MovMemory, Operand::Register(Register::Rsi), Operand::Register(Register::Dl));
        let (text, _) = emitter.generate(&[instr]).unwrap();
        assert_eq!(text[1], 0x88);
        // ModRM: mod=00, reg=dl(2), rm=rsi(6)
        assert_eq!(text[2], 0b0001_0110);
    }

    #[test]
    fn add_edx_immediate_uses_the_32_bit_special_case_encoding() {
        let emitter = Emitter::new();
        let instr = Instruction::with_args(Operation::Add, Operand::Register(Register::Edx), Operand::IntLiteral(48));
        let (text, _) = emitter.generate(&[instr]).unwrap();
        // No REX prefix: opcode 0x81 /0, ModRM 0xC2 (mod=11, reg=0, rm=edx(2)),
        // imm32 little-endian.
        assert_eq!(text[0], tables::ADD_IMM_OPCODE);
        assert_eq!(text[1], 0xC2);
        assert_eq!(u32::from_le_bytes(text[2..6].try_into().unwrap()), 48);
        assert_eq!(text.len(), 6);
    }

    #[test]
    fn spilled_operand_is_a_codegen_error() {
        let emitter = Emitter::new();
        let instr = Instruction::with_target(Operation::Inc, Operand::Register(Register::Spilled));
        let err = emitter.generate(&[instr]).unwrap_err();
        assert!(matches!(err, WisniaError::CodeGeneration { .. }));
    }

    #[test]
    fn data_label_patches_absolute_virtual_address() {
        let mut emitter = Emitter::new();
        emitter.layout_data_section(&[("greeting".to_string(), "hi".to_string())]);
        let instr =
            Instruction::with_args(Operation::Mov, Operand::Register(Register::Rsi), Operand::Label("greeting".into()));
        let (text, data) = emitter.generate(&[instr]).unwrap();
        assert_eq!(data, b"hi\0");
        let patched = u32::from_le_bytes(text[text.len() - 4..].try_into().unwrap());
        assert_eq!(patched as u64, VIRT_DATA + TEXT_OFFSET + text.len() as u64);
    }
}
