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
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use tracing_subscriber::EnvFilter;
use wisniac::driver::{self, DumpKind};
use wisniac::file_reader::{FileReader, SourceFileReader};

#[derive(ClapParser)]
#[clap(version, author, about = "Ahead-of-time compiler for WisniaLang")]
struct Opts {
    /// Source file to compile.
    input: PathBuf,

    /// Path to write the generated ELF64 executable.
    #[clap(short, long, default_value = "a.out")]
    output: PathBuf,

    /// Print an intermediate representation instead of emitting an executable.
    #[clap(short, long, value_name = "tokens|ast|ir|code")]
    dump: Option<DumpKind>,

    /// Raise logging verbosity (can be repeated).
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    let reader = SourceFileReader;
    let source_text = reader
        .read_to_string(&opts.input)
        .with_context(|| format!("Failed to read input file: {}", opts.input.display()))?;

    match opts.dump {
        Some(DumpKind::Tokens) => {
            let tokens = driver::tokenize(&source_text)?;
            println!("{tokens:#?}");
        }
        Some(DumpKind::Ast) => {
            let program = driver::parse(&source_text)?;
            println!("{program:#?}");
        }
        Some(DumpKind::Ir) => {
            let program = driver::parse(&source_text)?;
            let mut ir = driver::lower(&program)?;
            driver::optimize(&mut ir);
            println!("{ir:#?}");
        }
        Some(DumpKind::Code) => {
            let (text, data) = driver::compile_to_sections(&source_text)?;
            println!("text ({} bytes): {text:02x?}", text.len());
            println!("data ({} bytes): {data:02x?}", data.len());
        }
        None => {
            driver::compile_to_elf(&source_text, &opts.output)?;
            println!("Successfully compiled {} to {}", opts.input.display(), opts.output.display());
        }
    }

    Ok(())
}
