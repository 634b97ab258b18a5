//! The fractal formulas.  An `OrbitMath` knows how to start an orbit
//! for a point and take one step of it; everything else (counting
//! iterations, spotting cycles, picking a color) is the classifier's
//! job.

use num::Complex;

use error::EngineError;
use planes::PlaneMapper;

/// One escape-time formula.
pub trait OrbitMath {
    /// Called once per image.  Returning false means the formula has
    /// drawn the image by some other means and the scheduler should not
    /// run at all.
    fn setup_image(&mut self, _plane: &PlaneMapper) -> bool {
        true
    }

    /// Starts the orbit of the point `c`.
    fn setup_pixel(&mut self, c: Complex<f64>);

    /// Advances the orbit one step.  Returns true once it has escaped.
    fn step(&mut self) -> Result<bool, EngineError>;

    /// The current iterate.
    fn z(&self) -> Complex<f64>;

    /// The derivative of the current iterate with respect to the
    /// starting point, for formulas that track one.
    fn derivative(&self) -> Option<Complex<f64>> {
        None
    }
}

/// z ← z² + c, starting from z = 0.
#[derive(Clone, Debug)]
pub struct Mandelbrot {
    bailout: f64,
    c: Complex<f64>,
    z: Complex<f64>,
    dz: Complex<f64>,
}

impl Mandelbrot {
    /// The Mandelbrot set, escaping past `escape_radius`.
    pub fn new(escape_radius: f64) -> Mandelbrot {
        Mandelbrot {
            bailout: escape_radius * escape_radius,
            c: Complex::new(0.0, 0.0),
            z: Complex::new(0.0, 0.0),
            dz: Complex::new(0.0, 0.0),
        }
    }
}

impl OrbitMath for Mandelbrot {
    fn setup_pixel(&mut self, c: Complex<f64>) {
        self.c = c;
        self.z = Complex::new(0.0, 0.0);
        self.dz = Complex::new(0.0, 0.0);
    }

    fn step(&mut self) -> Result<bool, EngineError> {
        self.dz = self.z * self.dz * 2.0 + 1.0;
        self.z = self.z * self.z + self.c;
        Ok(self.z.norm_sqr() >= self.bailout)
    }

    fn z(&self) -> Complex<f64> {
        self.z
    }

    fn derivative(&self) -> Option<Complex<f64>> {
        Some(self.dz)
    }
}

/// z ← z² + k, starting from z = the pixel's point.
#[derive(Clone, Debug)]
pub struct Julia {
    bailout: f64,
    k: Complex<f64>,
    z: Complex<f64>,
    dz: Complex<f64>,
}

impl Julia {
    /// The Julia set of `k`, escaping past `escape_radius`.
    pub fn new(k: Complex<f64>, escape_radius: f64) -> Julia {
        Julia {
            bailout: escape_radius * escape_radius,
            k,
            z: Complex::new(0.0, 0.0),
            dz: Complex::new(1.0, 0.0),
        }
    }
}

impl OrbitMath for Julia {
    fn setup_pixel(&mut self, c: Complex<f64>) {
        self.z = c;
        self.dz = Complex::new(1.0, 0.0);
    }

    fn step(&mut self) -> Result<bool, EngineError> {
        self.dz = self.z * self.dz * 2.0;
        self.z = self.z * self.z + self.k;
        Ok(self.z.norm_sqr() >= self.bailout)
    }

    fn z(&self) -> Complex<f64> {
        self.z
    }

    fn derivative(&self) -> Option<Complex<f64>> {
        Some(self.dz)
    }
}
