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
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod resolver;

use crate::errors::WisniaError;
use ast::Program;
use lexer::{Lexer, Token};

pub fn tokenize(source: &str) -> Result<Vec<Token>, WisniaError> {
    Lexer::new(source).tokenize()
}

pub fn parse_and_resolve(source: &str) -> Result<Program, WisniaError> {
    let tokens = tokenize(source)?;
    let program = parser::parse(tokens)?;
    resolver::Resolver::new(&program).resolve()?;
    Ok(program)
}
