//! Errors the engine reports to its caller.  Being interrupted is not
//! one of them; see `engine::Outcome`.

use std::io;

/// Everything that can stop a render for good.
#[derive(Debug, Fail)]
pub enum EngineError {
    /// The chosen strategy cannot run with this configuration.  Raised
    /// before any pixel is computed and never retried.
    #[fail(display = "configuration error: {}", _0)]
    Configuration(String),

    /// The orbit math failed on a pixel.  The pixel is left unset.
    #[fail(display = "classifier failed at ({}, {}): {}", x, y, reason)]
    Classifier {
        /// Column of the failing pixel.
        x: i32,
        /// Row of the failing pixel.
        y: i32,
        /// What the formula said.
        reason: String,
    },

    /// A resume blob that could not be decoded.
    #[fail(display = "bad resume data: {}", _0)]
    BadResume(String),

    /// A render thread died.
    #[fail(display = "worker failed: {}", _0)]
    Worker(String),

    /// Reading or writing resume state or images.
    #[fail(display = "i/o error: {}", _0)]
    Io(#[cause] io::Error),
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Io(err)
    }
}
