use std::path::PathBuf;
use thiserror::Error;

use crate::parser::ParseError;

/// Everything that can stop a script from running to completion.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// A throw that no clause handled, rendered as `Name: message` for
    /// error objects.
    #[error("Uncaught {0}")]
    Uncaught(String),
    #[error("Error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
