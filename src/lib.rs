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
pub mod bytebuffer;
pub mod codegen;
pub mod driver;
pub mod elf;
pub mod errors;
pub mod file_reader;
pub mod ir;
pub mod peephole;
pub mod regalloc;
pub mod source;

pub use driver::{compile_to_elf, compile_to_sections, DumpKind};
pub use errors::WisniaError;
