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
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::bytebuffer::ByteBuffer;
use crate::errors::WisniaError;

/// Fixed layout constants for the minimal two-segment ELF64 executable
/// this writer produces: one `PT_LOAD` segment for the text section, one
/// for the data section, both mapped at a fixed virtual address (no
/// position-independent code, no dynamic linking, no section headers
/// beyond what a loader strictly requires).
pub const VIRT_TEXT: u64 = 0x400000;
pub const VIRT_DATA: u64 = 0x600000;
pub const PAGE_ALIGN: u64 = 0x200000;
pub const TEXT_OFFSET: u64 = 0xB0;

const ELF_HEADER_SIZE: u64 = 64;
const PROGRAM_HEADER_SIZE: u64 = 56;

/// Builds the ELF64 header, two `PT_LOAD` program headers, and the text
/// and data section bytes into one executable image. The entry point is
/// `VIRT_TEXT + TEXT_OFFSET`; `TEXT_OFFSET` also doubles as the file
/// offset of the text bytes, since this writer emits one contiguous file
/// with the ELF/program headers occupying the space before it.
pub fn build_executable(text: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = ByteBuffer::new();
    let entry = VIRT_TEXT + TEXT_OFFSET;
    let text_file_offset = TEXT_OFFSET;
    let data_file_offset = text_file_offset + text.len() as u64;

    write_elf_header(&mut out, entry);
    write_program_header(&mut out, text_file_offset, VIRT_TEXT + text_file_offset, text.len() as u64, 0b101); // R+X
    // The data segment's vaddr is shifted by the same text_offset+|text|
    // amount as its file offset, not pinned to VIRT_DATA directly: PT_LOAD
    // requires p_vaddr mod p_align == p_offset mod p_align, and VIRT_DATA
    // alone is already a multiple of PAGE_ALIGN, so this keeps the
    // congruence the loader expects instead of violating it whenever
    // text_file_offset + |text| isn't itself page-aligned.
    write_program_header(&mut out, data_file_offset, VIRT_DATA + data_file_offset, data.len() as u64, 0b110); // R+W

    // pad up to TEXT_OFFSET with zeros (headers above occupy less than
    // TEXT_OFFSET bytes, matching the original layout's reserved gap)
    while out.len() < text_file_offset as usize {
        out.put_u8(0);
    }
    out.put_bytes(text);
    out.put_bytes(data);
    out.into_vec()
}

fn write_elf_header(out: &mut ByteBuffer, entry: u64) {
    out.put_bytes(&[0x7f, b'E', b'L', b'F']);
    out.put_u8(2); // ELFCLASS64
    out.put_u8(1); // ELFDATA2LSB
    out.put_u8(1); // EI_VERSION
    out.put_u8(0); // EI_OSABI: System V
    out.put_bytes(&[0u8; 8]); // padding
    out.put_bytes(&2u16.to_le_bytes()); // e_type: ET_EXEC
    out.put_bytes(&0x3eu16.to_le_bytes()); // e_machine: EM_X86_64
    out.put_u32_le(1); // e_version
    out.put_u64_le(entry);
    out.put_u64_le(ELF_HEADER_SIZE); // e_phoff
    out.put_u64_le(0); // e_shoff
    out.put_u32_le(0); // e_flags
    out.put_bytes(&(ELF_HEADER_SIZE as u16).to_le_bytes()); // e_ehsize
    out.put_bytes(&(PROGRAM_HEADER_SIZE as u16).to_le_bytes()); // e_phentsize
    out.put_bytes(&2u16.to_le_bytes()); // e_phnum
    out.put_bytes(&0u16.to_le_bytes()); // e_shentsize
    out.put_bytes(&0u16.to_le_bytes()); // e_shnum
    out.put_bytes(&0u16.to_le_bytes()); // e_shstrndx
}

fn write_program_header(out: &mut ByteBuffer, file_offset: u64, vaddr: u64, size: u64, flags: u32) {
    out.put_u32_le(1); // PT_LOAD
    out.put_u32_le(flags);
    out.put_u64_le(file_offset);
    out.put_u64_le(vaddr);
    out.put_u64_le(vaddr); // p_paddr, unused but conventionally mirrors p_vaddr
    out.put_u64_le(size);
    out.put_u64_le(size);
    out.put_u64_le(PAGE_ALIGN);
}

/// Writes the executable image to `path` and marks it world-executable,
/// matching the permissive mode the teacher's assembler output used for
/// its ROM images.
pub fn write_executable(path: &Path, text: &[u8], data: &[u8]) -> Result<(), WisniaError> {
    let image = build_executable(text, data);
    fs::write(path, image).map_err(|e| WisniaError::codegen(format!("failed to write '{}': {e}", path.display())))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))
        .map_err(|e| WisniaError::codegen(format!("failed to chmod '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_elf_magic() {
        let image = build_executable(&[0xC3], &[]);
        assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
    }

    #[test]
    fn declares_two_program_headers() {
        let image = build_executable(&[0xC3], &[1, 2, 3]);
        let phnum = u16::from_le_bytes([image[56], image[57]]);
        assert_eq!(phnum, 2);
    }

    #[test]
    fn entry_point_is_text_virtual_address_plus_offset() {
        let image = build_executable(&[0xC3], &[]);
        let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
        assert_eq!(entry, VIRT_TEXT + TEXT_OFFSET);
    }

    #[test]
    fn data_segment_vaddr_is_congruent_with_its_file_offset() {
        let text = vec![0x90; 37]; // deliberately not page-aligned
        let image = build_executable(&text, &[1, 2, 3]);
        // PHDR #2 starts right after PHDR #1, each 56 bytes, starting at e_phoff=0x40.
        let phdr2 = &image[0x40 + 56..0x40 + 112];
        let p_offset = u64::from_le_bytes(phdr2[8..16].try_into().unwrap());
        let p_vaddr = u64::from_le_bytes(phdr2[16..24].try_into().unwrap());
        assert_eq!(p_vaddr % PAGE_ALIGN, p_offset % PAGE_ALIGN);
    }

    #[test]
    fn text_bytes_are_placed_at_text_offset() {
        let image = build_executable(&[0xC3, 0x90], &[]);
        assert_eq!(&image[TEXT_OFFSET as usize..TEXT_OFFSET as usize + 2], &[0xC3, 0x90]);
    }

    #[test]
    fn writes_executable_file_with_permissive_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        write_executable(&path, &[0xC3], &[]).unwrap();
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o777);
    }
}
