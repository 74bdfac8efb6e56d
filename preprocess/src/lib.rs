//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
//! A portable multi-language file preprocessor. Directives (`#if`,
//! `#define`, `#include`, ...) are embedded in the comment syntax native
//! to each file type, so preprocessed sources remain valid inputs for
//! their own toolchains.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

pub mod content_types;
pub mod defines;
pub mod directive;
pub mod engine;
pub mod error;
mod expr;

pub use content_types::{CaseSensitivity, ContentTypesRegistry};
pub use defines::{DefineTable, Value};
pub use engine::{preprocess, Options};
pub use error::{Error, ErrorKind, Result};

#[derive(Parser)]
#[command(
    version,
    about = "preprocess - portable multi-language file preprocessor"
)]
pub struct Args {
    /// Write output to PATH instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it already exists
    #[arg(short, long)]
    pub force: bool,

    /// Define a variable, e.g. -D DEBUG=1 (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME[=VAL]")]
    pub define: Vec<String>,

    /// Add a directory to the #include search path (repeatable)
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Emit empty lines for skipped content so line numbers are preserved
    #[arg(short, long)]
    pub keep_lines: bool,

    /// Substitute defined variable names in emitted lines
    #[arg(short, long)]
    pub substitute: bool,

    /// Load an additional content.types file (repeatable, later files win)
    #[arg(short, long = "content-types-config", value_name = "FILE")]
    pub content_types_config: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// The file to preprocess
    pub input_file: PathBuf,
}

pub fn run(args: &Args) -> Result<()> {
    let mut defines = defines::parse_definitions(&args.define)?;
    let registry = ContentTypesRegistry::with_config_files(&args.content_types_config)?;

    let mut include_paths = vec![PathBuf::from(".")];
    include_paths.extend(args.include.iter().cloned());

    let options = Options {
        force_overwrite: args.force,
        keep_lines: args.keep_lines,
        substitute: args.substitute,
    };

    match &args.output {
        Some(path) => {
            if path.exists() {
                if !options.force_overwrite {
                    return Err(ErrorKind::OutputExists(path.clone()).into());
                }
                // Remove and recreate rather than truncate, so a
                // read-only existing output does not defeat --force.
                fs::remove_file(path)
                    .map_err(|e| Error::new(ErrorKind::Io(e)).in_file(path))?;
            }
            let file = fs::File::create(path)
                .map_err(|e| Error::new(ErrorKind::Io(e)).in_file(path))?;
            let mut writer = io::BufWriter::new(file);
            engine::preprocess(
                &args.input_file,
                &mut writer,
                &mut defines,
                &options,
                &include_paths,
                None,
                &registry,
            )?;
            writer.flush()?;
            Ok(())
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            engine::preprocess(
                &args.input_file,
                &mut lock,
                &mut defines,
                &options,
                &include_paths,
                None,
                &registry,
            )
        }
    }
}
