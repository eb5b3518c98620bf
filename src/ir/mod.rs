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
pub mod builtins;
pub mod instruction;
pub mod lowering;
pub mod operand;

use instruction::Instruction;

#[derive(Debug, Clone, Default)]
pub struct IrFunction {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
    /// String literals encountered during lowering, keyed by the label the
    /// emitter will place them under in the data section.
    pub string_literals: Vec<(String, String)>,
}

impl IrProgram {
    /// All instructions across all functions, in function order, the shape
    /// the register allocator, peephole pass, and emitter operate on.
    pub fn flatten(&self) -> Vec<Instruction> {
        self.functions.iter().flat_map(|f| f.instructions.clone()).collect()
    }
}
