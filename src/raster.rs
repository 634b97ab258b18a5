//! The grid of color indices the engine paints into.  The engine only
//! ever talks to a `Raster`; `Canvas` is the in-memory one used by the
//! command line tool, the threaded renderer and the tests.

/// A palette index.  Color 0 is the background: a pixel that still
/// holds it has not been painted yet, as far as boundary tracing is
/// concerned.
pub type Color = u16;

/// The background color.
pub const BACKGROUND: Color = 0;

/// A two-dimensional grid of colors.  Coordinates are 0-based and
/// row ranges are inclusive at both ends.
pub trait Raster {
    /// Width of the whole image.
    fn width(&self) -> i32;
    /// Height of the whole image.
    fn height(&self) -> i32;
    /// Reads one pixel.
    fn get(&self, x: i32, y: i32) -> Color;
    /// Writes one pixel.
    fn put(&mut self, x: i32, y: i32, color: Color);

    /// Reads `x0..=x1` of row `y`.
    fn get_row(&self, y: i32, x0: i32, x1: i32) -> Vec<Color> {
        (x0..=x1).map(|x| self.get(x, y)).collect()
    }

    /// Writes `colors` to row `y` starting at `x0` and stopping at `x1`.
    fn put_row(&mut self, y: i32, x0: i32, x1: i32, colors: &[Color]) {
        for (x, color) in (x0..=x1).zip(colors.iter()) {
            self.put(x, y, *color);
        }
    }
}

/// A raster held in memory.  A canvas may hold only a band of rows of
/// a larger image; reads outside the band return the background and
/// writes outside it are dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    width: i32,
    height: i32,
    top: i32,
    rows: i32,
    pixels: Vec<Color>,
}

impl Canvas {
    /// A whole image, cleared to the background.
    pub fn new(width: i32, height: i32) -> Canvas {
        Canvas::band(width, height, 0, height - 1)
    }

    /// Rows `top..=bottom` of a `width` by `height` image.
    pub fn band(width: i32, height: i32, top: i32, bottom: i32) -> Canvas {
        let rows = (bottom - top + 1).max(0);
        Canvas {
            width,
            height,
            top,
            rows,
            pixels: vec![BACKGROUND; (width.max(0) * rows) as usize],
        }
    }

    /// Rebuilds a whole-image canvas from a saved pixel dump.
    pub fn from_pixels(width: i32, height: i32, pixels: Vec<Color>) -> Option<Canvas> {
        if width < 0 || height < 0 || pixels.len() != (width * height) as usize {
            return None;
        }
        Some(Canvas {
            width,
            height,
            top: 0,
            rows: height,
            pixels,
        })
    }

    /// The first row this canvas holds.
    pub fn top(&self) -> i32 {
        self.top
    }

    /// The last row this canvas holds.
    pub fn bottom(&self) -> i32 {
        self.top + self.rows - 1
    }

    /// The pixels of the band, row by row.
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Copies every row of `band` into the same rows of this canvas.
    pub fn merge(&mut self, band: &Canvas) {
        for y in band.top()..=band.bottom() {
            let row = band.get_row(y, 0, band.width - 1);
            self.put_row(y, 0, self.width - 1, &row);
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || x >= self.width || y < self.top || y >= self.top + self.rows {
            None
        } else {
            Some(((y - self.top) * self.width + x) as usize)
        }
    }
}

impl Raster for Canvas {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn get(&self, x: i32, y: i32) -> Color {
        match self.offset(x, y) {
            Some(offset) => self.pixels[offset],
            None => BACKGROUND,
        }
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        if let Some(offset) = self.offset(x, y) {
            self.pixels[offset] = color;
        }
    }

    fn put_row(&mut self, y: i32, x0: i32, x1: i32, colors: &[Color]) {
        if y < self.top || y >= self.top + self.rows {
            return;
        }
        let x0c = x0.max(0);
        let x1c = x1.min(self.width - 1).min(x0 + colors.len() as i32 - 1);
        if x1c < x0c {
            return;
        }
        let start = ((y - self.top) * self.width + x0c) as usize;
        let skip = (x0c - x0) as usize;
        let count = (x1c - x0c + 1) as usize;
        self.pixels[start..start + count].copy_from_slice(&colors[skip..skip + count]);
    }
}
