#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resumable escape-time renderer
//!
//! Rendering a deep zoom of the Mandelbrot set can take a very long
//! time, and a user will want to stop it, look at what's there, and
//! pick up again later, possibly in another process.  This crate is
//! the scheduling engine that makes that possible.  It decides which
//! pixels to compute, in what order, and which ones it can get away
//! with *not* computing at all, and it can always describe the work
//! that remains as a small queue of rectangles that can be written to
//! disk and read back.
//!
//! The engine knows nothing about fractals.  Pixels are colored by
//! something implementing [`Classify`]; the [`EscapeTime`] classifier
//! wraps an [`OrbitMath`] formula (Mandelbrot and Julia are provided)
//! with periodicity detection and the usual coloring transforms.
//!
//! There are five ways of walking a rectangle: one or two passes in
//! raster order, solid guessing, boundary tracing, tesseral
//! subdivision, and diffusion.  All five can be interrupted at any
//! pixel, and all five produce the same image when resumed as they
//! would have produced uninterrupted.
//!
//! [`Classify`]: classify/trait.Classify.html
//! [`EscapeTime`]: classify/struct.EscapeTime.html
//! [`OrbitMath`]: orbit/trait.OrbitMath.html

extern crate crossbeam;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

pub mod boundary;
pub mod classify;
pub mod config;
pub mod diffusion;
pub mod engine;
pub mod error;
pub mod guess;
pub mod orbit;
pub mod planes;
pub mod raster;
pub mod standard;
pub mod symmetry;
pub mod tesseral;
pub mod threaded;
pub mod work;

pub use classify::{Classify, EscapeTime, FnClassifier};
pub use config::{Config, Inside, Outside, Strategy, Symmetry};
pub use engine::{CustomEngine, Engine, EngineContext, Halt, InterruptPoll, Never, Outcome, StopAfter};
pub use error::EngineError;
pub use orbit::{Julia, Mandelbrot, OrbitMath};
pub use planes::PlaneMapper;
pub use raster::{Canvas, Color, Raster};
pub use symmetry::{Axes, Axis};
pub use threaded::{StopFlag, Threaded};
pub use work::{TesseralPhase, WorkItem, WorkQueue};
