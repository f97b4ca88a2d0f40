//! Driver-level error types.
//!
//! Only failures that happen before emission starts are recoverable enough
//! to be values: I/O problems reading the input and parse errors in the
//! textual IR. Everything the emitter itself rejects (unsupported opcodes,
//! bad pointer widths, invalid constants) is fatal by design and reported
//! through a panic that the entry point converts to a diagnostic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {msg}")]
    Parse {
        file: String,
        line: u32,
        msg: String,
    },
}
