//! Contains the PlaneMapper struct, which describes a relationship
//! between the pixel grid of the image, with row 0 at the top, and a
//! rectangle on the complex plane given by its left-lower and
//! right-upper corners.  Beyond mapping pixels to points, it
//! knows where the real and imaginary axes fall on the pixel grid,
//! which is what the symmetry planner needs.
use num::Complex;
use std::f64::consts::PI;

use error::EngineError;
use symmetry::{Axes, Axis};

/// How close (in pixels) an axis has to land on a row, or halfway
/// between two rows, to count as lying on the grid.
const GRID_SNAP: f64 = 0.01;

/// Describes the width and height of the pixel grid.  The grid starts
/// at 0,0 in the upper left.
#[derive(Copy, Clone, Debug)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the lower-left corner and upper-right corner of the
/// Complex plane, treating the real part of each value as the
/// x-component and the imaginary part of each value as the
/// y-component.
#[derive(Copy, Clone, Debug)]
pub struct ComplexPlane(pub Complex<f64>, pub Complex<f64>);

/// Describes the column, row of a pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps pixels to points.  Pixel centers are not used; pixel
/// (0, 0) is exactly the upper-left corner of the complex rectangle,
/// and pixel (width - 1, height - 1) is exactly the lower-right one.
#[derive(Debug, Clone)]
pub struct PlaneMapper {
    /// The size of the pixel grid.
    pub integral_plane: IntegralPlane,
    /// The two coordinates defining the complex cartesian plane,
    /// left-lower and right-upper.
    pub complex_plane: ComplexPlane,
    // Distance on the complex plane between neighbouring columns and
    // neighbouring rows.
    step: (f64, f64),
}

impl PlaneMapper {
    /// Takes the size of the pixel grid and two points describing the
    /// complex plane.
    pub fn new(
        width: usize,
        height: usize,
        leftlower: Complex<f64>,
        rightupper: Complex<f64>,
    ) -> Result<PlaneMapper, EngineError> {
        if rightupper.re <= leftlower.re {
            return Err(EngineError::Configuration(
                "The left lower corner is not to the left of the right upper corner.".to_string(),
            ));
        }

        if rightupper.im <= leftlower.im {
            return Err(EngineError::Configuration(
                "The left lower corner is not lower than the right upper corner".to_string(),
            ));
        }

        if width < 2 || height < 2 {
            return Err(EngineError::Configuration(
                "The image must be at least 2x2 pixels".to_string(),
            ));
        }

        let step = (
            (rightupper.re - leftlower.re) / ((width - 1) as f64),
            (rightupper.im - leftlower.im) / ((height - 1) as f64),
        );

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            complex_plane: ComplexPlane(leftlower, rightupper),
            step,
        })
    }

    /// The width of one pixel on the complex plane.
    pub fn pixel_width(&self) -> f64 {
        self.step.0
    }

    /// Given a pixel, return the point on the complex plane it samples.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            self.complex_plane.0.re + (pixel.0 as f64) * self.step.0,
            self.complex_plane.1.im - (pixel.1 as f64) * self.step.1,
        )
    }

    /// Where the real axis (im = 0) crosses the rows of the image.
    pub fn real_axis(&self) -> Option<Axis> {
        let row = self.complex_plane.1.im / self.step.1;
        snap(row, self.integral_plane.1)
    }

    /// Where the imaginary axis (re = 0) crosses the columns.
    pub fn imaginary_axis(&self) -> Option<Axis> {
        let column = -self.complex_plane.0.re / self.step.0;
        snap(column, self.integral_plane.0)
    }

    /// The number of columns spanning π on the real axis, if that
    /// comes out to a whole number of pixels.
    pub fn pi_period(&self) -> Option<i32> {
        let period = PI / self.step.0;
        let whole = period.round();
        if (period - whole).abs() < GRID_SNAP && whole >= 1.0 && whole < self.integral_plane.0 as f64
        {
            Some(whole as i32)
        } else {
            None
        }
    }

    /// All three of the above, for handing to the symmetry planner.
    pub fn axes(&self) -> Axes {
        Axes {
            real: self.real_axis(),
            imaginary: self.imaginary_axis(),
            pi_period: self.pi_period(),
        }
    }
}

/// An axis is usable if it lands on a pixel line, or exactly halfway
/// between two, and lies inside the image.
fn snap(position: f64, extent: usize) -> Option<Axis> {
    if position < 0.0 || position > (extent - 1) as f64 {
        return None;
    }
    let floor = position.floor();
    let fraction = position - floor;
    if fraction < GRID_SNAP {
        Some(Axis {
            at: floor as i32,
            between: false,
        })
    } else if fraction > 1.0 - GRID_SNAP {
        Some(Axis {
            at: floor as i32 + 1,
            between: false,
        })
    } else if (fraction - 0.5).abs() < GRID_SNAP {
        Some(Axis {
            at: floor as i32,
            between: true,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planemapper_fails_on_bad_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, 1.0), Complex::new(1.0, -1.0));
        assert!(pm.is_err());
    }

    #[test]
    fn planemapper_passes_on_good_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0));
        assert!(pm.is_ok());
    }

    #[test]
    fn pixel_to_point_puts_row_zero_at_the_top() {
        let pm = PlaneMapper::new(5, 5, Complex::new(0.0, 0.0), Complex::new(4.0, 4.0)).unwrap();
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(0.0, 4.0));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(2.0, 2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(4.0, 0.0));
    }

    #[test]
    fn real_axis_on_a_row() {
        let pm = PlaneMapper::new(9, 9, Complex::new(-2.0, -2.0), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(
            pm.real_axis(),
            Some(Axis {
                at: 4,
                between: false
            })
        );
    }

    #[test]
    fn real_axis_between_rows() {
        let pm = PlaneMapper::new(8, 8, Complex::new(-2.0, -2.0), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(
            pm.real_axis(),
            Some(Axis {
                at: 3,
                between: true
            })
        );
    }

    #[test]
    fn off_grid_axis_is_not_usable() {
        let pm = PlaneMapper::new(10, 10, Complex::new(-2.0, -1.3), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(pm.real_axis(), None);
    }

    #[test]
    fn pi_period_counts_columns_per_pi() {
        let pm = PlaneMapper::new(41, 9, Complex::new(0.0, -1.0), Complex::new(4.0 * PI, 1.0)).unwrap();
        assert_eq!(pm.pi_period(), Some(10));
        assert_eq!(pm.axes().pi_period, Some(10));
    }

    #[test]
    fn pi_period_wider_than_the_image_is_not_usable() {
        let pm = PlaneMapper::new(8, 9, Complex::new(0.0, -1.0), Complex::new(0.7 * PI, 1.0)).unwrap();
        assert_eq!(pm.pi_period(), None);
    }

    #[test]
    fn axis_outside_the_image_is_not_usable() {
        let pm = PlaneMapper::new(10, 10, Complex::new(-2.0, 0.5), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(pm.real_axis(), None);
    }
}
