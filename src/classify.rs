//! Pixel classification: turning a pixel into a color.
//!
//! The engine only needs something that implements `Classify`.  The
//! `EscapeTime` classifier is the real one: it runs an orbit formula
//! until the orbit escapes, hits the iteration limit, or is caught
//! cycling, and then applies the coloring options.

use num::Complex;
use std::f64::consts::LN_2;

use config::{Config, Inside, Outside};
use error::EngineError;
use orbit::OrbitMath;
use planes::{Pixel, PlaneMapper};
use raster::Color;

/// Iterations run before periodicity checking starts.
const PERIOD_CHECK_START: u32 = 8;

/// Snapshots taken at each spacing before the spacing doubles.
const SNAPSHOTS_PER_SPACING: u32 = 4;

/// Colors pixels.  Must be deterministic: the same pixel always gets
/// the same color, however many times and in whatever order it is
/// asked for.
pub trait Classify {
    /// Called once before the scheduler runs.  Returning false means
    /// the image has been handled already and nothing should be
    /// scheduled.
    fn prepare(&mut self) -> bool {
        true
    }

    /// The color of pixel `(x, y)`.
    fn classify(&mut self, x: i32, y: i32) -> Result<Color, EngineError>;
}

/// Any `FnMut(x, y) -> Color` as a classifier.  Handy for synthetic
/// images.
pub struct FnClassifier<F>(pub F);

impl<F> Classify for FnClassifier<F>
where
    F: FnMut(i32, i32) -> Color,
{
    fn classify(&mut self, x: i32, y: i32) -> Result<Color, EngineError> {
        Ok((self.0)(x, y))
    }
}

/// Brent-style cycle detection.  An iterate is saved every `spacing`
/// iterations, with the spacing doubling after every few saves, and each
/// iterate in between is compared against the saved one.
#[derive(Clone, Debug)]
struct Periodicity {
    tolerance: f64,
    mask: u32,
    remaining: u32,
    saved: Complex<f64>,
    saved_at: u32,
}

impl Periodicity {
    fn new(tolerance: f64) -> Periodicity {
        Periodicity {
            tolerance,
            mask: 1,
            remaining: SNAPSHOTS_PER_SPACING,
            saved: Complex::new(0.0, 0.0),
            saved_at: 0,
        }
    }

    /// Looks at the iterate at `iteration`, returning the cycle length
    /// once the orbit comes back to a saved value.
    fn observe(&mut self, iteration: u32, z: Complex<f64>) -> Option<u32> {
        if iteration <= PERIOD_CHECK_START {
            return None;
        }
        if iteration & self.mask == 0 {
            self.saved = z;
            self.saved_at = iteration;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.mask = (self.mask << 1) | 1;
                self.remaining = SNAPSHOTS_PER_SPACING;
            }
            None
        } else if self.saved_at > 0
            && (z.re - self.saved.re).abs() < self.tolerance
            && (z.im - self.saved.im).abs() < self.tolerance
        {
            Some(iteration - self.saved_at)
        } else {
            None
        }
    }
}

/// The escape-time classifier.
pub struct EscapeTime<M> {
    math: M,
    plane: PlaneMapper,
    config: Config,
    last_period: Option<u32>,
    cycles_caught: u64,
}

impl<M: OrbitMath> EscapeTime<M> {
    /// Colors the points `plane` maps pixels to by running `math` on
    /// them, with the limits and coloring in `config`.
    pub fn new(math: M, plane: PlaneMapper, config: &Config) -> EscapeTime<M> {
        EscapeTime {
            math,
            plane,
            config: config.clone(),
            last_period: None,
            cycles_caught: 0,
        }
    }

    /// The cycle length caught on the most recent pixel, if any.
    pub fn last_period(&self) -> Option<u32> {
        self.last_period
    }

    /// How many pixels periodicity checking has cut short.
    pub fn cycles_caught(&self) -> u64 {
        self.cycles_caught
    }

    /// Where the pixels land on the complex plane.
    pub fn plane(&self) -> &PlaneMapper {
        &self.plane
    }

    /// Colors run from 1 up; 0 is the background.
    fn span(&self) -> u32 {
        self.config.colors.max(2) - 1
    }

    fn inside_color(&self) -> Color {
        match self.config.inside {
            Inside::Color(color) => color,
            Inside::Period => (1 + self.last_period.unwrap_or(0) % self.span()) as Color,
        }
    }

    fn outside_color(&self, iteration: u32) -> Color {
        let z = self.math.z();
        let modulus = z.norm();

        if let (Some(threshold), Some(dz)) =
            (self.config.distance_threshold, self.math.derivative())
        {
            let dz = dz.norm();
            if dz > 0.0 && modulus > 1.0 {
                let distance = 2.0 * modulus * modulus.ln() / dz;
                if distance < threshold * self.plane.pixel_width() {
                    return self.inside_color();
                }
            }
        }

        let span = self.span();
        let index = match self.config.outside {
            Outside::Color(color) => return color,
            Outside::Iteration => (iteration.max(1) - 1) % span,
            Outside::Potential => {
                let nu = if modulus > 1.0 {
                    modulus.ln().ln() / LN_2
                } else {
                    0.0
                };
                let smooth = (iteration as f64 + 1.0 - nu).max(1.0);
                (smooth as u32 - 1) % span
            }
        };
        let index = if self.config.decomposition && z.im < 0.0 {
            (index + span / 2) % span
        } else {
            index
        };
        (index + 1) as Color
    }
}

impl<M: OrbitMath> Classify for EscapeTime<M> {
    fn prepare(&mut self) -> bool {
        self.math.setup_image(&self.plane)
    }

    fn classify(&mut self, x: i32, y: i32) -> Result<Color, EngineError> {
        let point = self.plane.pixel_to_point(&Pixel(x as usize, y as usize));
        self.math.setup_pixel(point);

        let max_iterations = self.config.max_iterations;
        let mut periodicity = if self.config.periodicity {
            Some(Periodicity::new(self.config.periodicity_tolerance))
        } else {
            None
        };
        self.last_period = None;

        let mut iteration = 0;
        let mut escaped = false;
        while iteration < max_iterations {
            iteration += 1;
            if self.math.step()? {
                escaped = true;
                break;
            }
            if let Some(ref mut check) = periodicity {
                if let Some(period) = check.observe(iteration, self.math.z()) {
                    self.last_period = Some(period);
                    self.cycles_caught += 1;
                    break;
                }
            }
        }

        if escaped {
            Ok(self.outside_color(iteration))
        } else {
            Ok(self.inside_color())
        }
    }
}
