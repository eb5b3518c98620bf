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
use crate::ir::operand::Register;

/// The REX prefix and ModRM byte for a 64-bit register-register
/// instruction of the form `op dst, src`, computed from which quadrant of
/// the 16x16 register-pair space `(dst, src)` falls into.
///
/// The canonical machine register order (`Rax..Rdi, R8..R15`, 16 entries)
/// splits into a low half (index 0-7, no REX extension bit needed) and a
/// high half (index 8-15, R8-R15, which need REX.B/REX.R set). Pairing
/// "dst in {low, high}" with "src in {low, high}" gives four quadrants,
/// each with a fixed REX prefix; the ModRM byte's mod field is always
/// `0b11` (register-direct) and its reg/rm fields are always the low 3
/// bits of dst/src regardless of quadrant.
pub struct EncodedPair {
    pub rex: u8,
    pub modrm: u8,
}

const REX_BASE: u8 = 0x48; // REX.W, 64-bit operand size
const REX_R: u8 = 0x04; // extends ModRM.reg
const REX_B: u8 = 0x01; // extends ModRM.rm

pub fn encode_reg_reg(dst: Register, src: Register) -> Option<EncodedPair> {
    let dst_idx = dst.matrix_index()?;
    let src_idx = src.matrix_index()?;
    let rex = REX_BASE
        | if dst_idx >= 8 { REX_R } else { 0 }
        | if src_idx >= 8 { REX_B } else { 0 };
    let modrm = 0b1100_0000 | ((dst_idx as u8 & 0x7) << 3) | (src_idx as u8 & 0x7);
    Some(EncodedPair { rex, modrm })
}

/// Same quadrant logic but for instructions whose ModRM.reg field is a
/// fixed opcode extension (`/digit`) rather than a second register, e.g.
/// `inc`/`dec`/`neg` (`FF /0`, `FF /1`). `reg_field` is that `/digit`.
pub fn encode_reg_opcode_ext(reg: Register, reg_field: u8) -> Option<EncodedPair> {
    let idx = reg.matrix_index()?;
    let rex = REX_BASE | if idx >= 8 { REX_B } else { 0 };
    let modrm = 0b1100_0000 | ((reg_field & 0x7) << 3) | (idx as u8 & 0x7);
    Some(EncodedPair { rex, modrm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use Register::*;

    #[test]
    fn low_low_quadrant_needs_no_extension_bits() {
        let pair = encode_reg_reg(Rax, Rcx).unwrap();
        assert_eq!(pair.rex, 0x48);
        assert_eq!(pair.modrm, 0b1100_1001);
    }

    #[test]
    fn high_dst_sets_rex_r() {
        let pair = encode_reg_reg(R8, Rax).unwrap();
        assert_eq!(pair.rex, 0x48 | REX_R);
    }

    #[test]
    fn high_src_sets_rex_b() {
        let pair = encode_reg_reg(Rax, R9).unwrap();
        assert_eq!(pair.rex, 0x48 | REX_B);
    }

    #[test]
    fn both_high_sets_both_extension_bits() {
        let pair = encode_reg_reg(R10, R11).unwrap();
        assert_eq!(pair.rex, 0x48 | REX_R | REX_B);
    }

    #[test]
    fn sub_register_aliases_have_no_matrix_position() {
        assert!(encode_reg_reg(Register::Edx, Rax).is_none());
    }
}
