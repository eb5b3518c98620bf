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
use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::codegen::Emitter;
use crate::elf;
use crate::ir::{self, IrProgram};
use crate::peephole;
use crate::regalloc;
use crate::source::{self, ast::Program, lexer::Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Tokens,
    Ast,
    Ir,
    Code,
}

impl std::str::FromStr for DumpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokens" => Ok(DumpKind::Tokens),
            "ast" => Ok(DumpKind::Ast),
            "ir" => Ok(DumpKind::Ir),
            "code" => Ok(DumpKind::Code),
            other => Err(format!("unknown dump kind '{other}' (expected tokens|ast|ir|code)")),
        }
    }
}

pub fn tokenize(source_text: &str) -> Result<Vec<Token>> {
    source::tokenize(source_text).context("Failed during lexing")
}

pub fn parse(source_text: &str) -> Result<Program> {
    source::parse_and_resolve(source_text).context("Failed during parsing/name resolution")
}

pub fn lower(program: &Program) -> Result<IrProgram> {
    ir::lowering::lower(program).context("Failed during IR lowering")
}

/// Runs register allocation and the peephole pass over every function in
/// `ir`, in place.
pub fn optimize(ir: &mut IrProgram) {
    for function in &mut ir.functions {
        let spilled = regalloc::allocate_function(&mut function.instructions);
        debug!(function = %function.name, "assigned registers");
        if spilled > 0 {
            warn!(function = %function.name, spilled, "register allocation spilled temporaries with no physical register");
        }
        let before = function.instructions.len();
        function.instructions = peephole::optimize(std::mem::take(&mut function.instructions));
        debug!(
            function = %function.name,
            removed = before - function.instructions.len(),
            "peephole pass complete"
        );
    }
}

/// Runs the full pipeline and returns the generated `(text, data)` section
/// bytes, without writing an ELF file.
pub fn compile_to_sections(source_text: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let tokens = tokenize(source_text)?;
    debug!(count = tokens.len(), "tokenized source");

    let program = parse(source_text)?;
    debug!(
        functions = program.functions.len(),
        classes = program.classes.len(),
        "parsed and resolved program"
    );

    let mut ir = lower(&program)?;
    debug!(functions = ir.functions.len(), "lowered to IR");

    optimize(&mut ir);

    let instructions = ir.flatten();
    let mut emitter = Emitter::new();
    emitter.layout_data_section(&ir.string_literals);
    let (text, data) = emitter
        .generate(&instructions)
        .context("Failed during code generation")?;
    debug!(text_bytes = text.len(), data_bytes = data.len(), "emitted machine code");

    Ok((text, data))
}

/// Runs the full pipeline and writes a minimal ELF64 executable to `output_path`.
pub fn compile_to_elf(source_text: &str, output_path: &std::path::Path) -> Result<()> {
    let (text, data) = compile_to_sections(source_text)?;
    elf::write_executable(output_path, &text, &data).context("Failed while writing the ELF executable")?;
    debug!(path = %output_path.display(), "wrote ELF executable");
    Ok(())
}
