//! Render options.  Every knob the engine and the escape-time
//! classifier understand lives in `Config`; the command line tool
//! parses its flags straight into one.

use std::str::FromStr;

use raster::Color;

/// Which symmetry the fractal has on this image.  The engine only
/// exploits it where the planes put the axis on the pixel grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symmetry {
    /// Compute everything.
    None,
    /// Mirror image top to bottom across the real axis.
    XAxis,
    /// Mirror image left to right across the imaginary axis.
    YAxis,
    /// Mirror across both axes.
    XYAxis,
    /// Point reflection through the origin.
    Origin,
    /// The image repeats every π along the real axis.
    Pi,
}

/// How pixels are visited.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Every pixel, raster order.
    SinglePass,
    /// A coarse pass over even pixels, then the rest.
    TwoPass,
    /// Coarse-to-fine blocks, guessing solid areas.
    SolidGuess,
    /// Trace the edge of each color region and fill its inside.
    BoundaryTrace,
    /// Subdivide boxes until their borders are one color.
    Tesseral,
    /// A scattered progressive order.
    Diffusion,
    /// Hand each work item to a caller-supplied engine.
    Custom,
}

/// Color for points that never escape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Inside {
    /// One fixed color.
    Color(Color),
    /// Colored by the length of the cycle periodicity checking caught.
    Period,
}

/// Color for points that escape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outside {
    /// Colored by iteration count.
    Iteration,
    /// Continuous potential, smoothing away the iteration bands.
    Potential,
    /// One fixed color.
    Color(Color),
}

/// Everything a render needs to know besides the picture itself.
#[derive(Clone, Debug)]
pub struct Config {
    /// Which symmetry to look for.
    pub symmetry: Symmetry,
    /// How to walk each work item.
    pub strategy: Strategy,
    /// Orbits that survive this many steps are inside.
    pub max_iterations: u32,
    /// Catch cycling orbits early.  Can, rarely, call an outside
    /// point inside.
    pub periodicity: bool,
    /// How close two iterates must be, in both parts, to be the same.
    pub periodicity_tolerance: f64,
    /// Orbits further out than this have escaped.
    pub escape_radius: f64,
    /// Largest block solid guessing starts from.  A power of two.
    pub max_block: i32,
    /// Let solid guessing guess blocks cut off by the right or bottom
    /// edge of a work item.  Known to mispaint, off by default.
    pub guess_edges: bool,
    /// Palette size.
    pub colors: u32,
    /// How points that never escape are colored.
    pub inside: Inside,
    /// How escaped points are colored.
    pub outside: Outside,
    /// Binary decomposition: escaped points below the real axis get
    /// the other half of the palette.
    pub decomposition: bool,
    /// Distance estimation: escaped points closer than this many pixel
    /// widths to the set are painted with the inside color.
    pub distance_threshold: Option<f64>,
    /// Pixels classified between interrupt polls.
    pub poll_interval: u32,
    /// Diffusion paints a block around each new point instead of a
    /// single pixel.
    pub diffusion_fill: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symmetry: Symmetry::None,
            strategy: Strategy::SolidGuess,
            max_iterations: 150,
            periodicity: true,
            periodicity_tolerance: 1e-10,
            escape_radius: 2.0,
            max_block: 16,
            guess_edges: false,
            colors: 256,
            inside: Inside::Color(1),
            outside: Outside::Iteration,
            decomposition: false,
            distance_threshold: None,
            poll_interval: 100,
            diffusion_fill: false,
        }
    }
}

impl FromStr for Symmetry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Symmetry::None),
            "x" | "xaxis" => Ok(Symmetry::XAxis),
            "y" | "yaxis" => Ok(Symmetry::YAxis),
            "xy" | "xyaxis" => Ok(Symmetry::XYAxis),
            "origin" => Ok(Symmetry::Origin),
            "pi" => Ok(Symmetry::Pi),
            _ => Err(format!("Unknown symmetry '{}'", s)),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "single" => Ok(Strategy::SinglePass),
            "2" | "two" => Ok(Strategy::TwoPass),
            "g" | "guess" => Ok(Strategy::SolidGuess),
            "b" | "boundary" => Ok(Strategy::BoundaryTrace),
            "t" | "tesseral" => Ok(Strategy::Tesseral),
            "d" | "diffusion" => Ok(Strategy::Diffusion),
            _ => Err(format!("Unknown drawing method '{}'", s)),
        }
    }
}

impl FromStr for Inside {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "period" {
            return Ok(Inside::Period);
        }
        Color::from_str(s)
            .map(Inside::Color)
            .map_err(|_| format!("Inside must be a color index or 'period', not '{}'", s))
    }
}

impl FromStr for Outside {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iter" => Ok(Outside::Iteration),
            "potential" => Ok(Outside::Potential),
            _ => Color::from_str(s).map(Outside::Color).map_err(|_| {
                format!(
                    "Outside must be 'iter', 'potential' or a color index, not '{}'",
                    s
                )
            }),
        }
    }
}
