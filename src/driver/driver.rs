//! The compile pipeline: read the input, parse the module, run the
//! emitter, write the listing to stdout.

use std::io::{Read, Write};

use log::debug;

use crate::backend;
use crate::common::error::BackendError;
use crate::driver::cli::Options;
use crate::ir::parse::parse_module;

pub fn run(opts: &Options) -> Result<(), BackendError> {
    let (source, name) = read_input(&opts.input)?;
    let module = parse_module(&source, &name)?;
    debug!(
        "parsed module '{}': {} globals, {} functions",
        name,
        module.globals.len(),
        module.functions.len()
    );

    let listing = backend::write_module(&module, opts.classname.as_deref(), opts.debug);

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(listing.as_bytes())
        .map_err(|e| BackendError::Io { path: "<stdout>".to_string(), source: e })?;
    Ok(())
}

fn read_input(input: &str) -> Result<(String, String), BackendError> {
    if input == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| BackendError::Io { path: "<stdin>".to_string(), source: e })?;
        return Ok((source, "stdin".to_string()));
    }
    let source = std::fs::read_to_string(input)
        .map_err(|e| BackendError::Io { path: input.to_string(), source: e })?;
    Ok((source, input.to_string()))
}
