//! Tesseral subdivision.  The border of the window is computed first.
//! Then, box by box off an explicit stack: a box whose border is all
//! one color, and whose center agrees, has its inside filled; any
//! other box is cut in two across its longer side, the cut line is
//! computed, and both halves go on the stack.
//!
//! An interrupted item saves which phase it was in and how many pixels
//! it had classified.  Resuming re-descends from the whole window with
//! those pixels replayed from the raster, which rebuilds the stack as
//! it was, and carries on from the pixel it stopped at.

use engine::{EngineContext, Halt};
use raster::Color;
use symmetry::Window;
use work::{TesseralPhase, TesseralResume};

/// A box, edges included.  Its edges have always been computed by the
/// time it is on the stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Tile {
    x1: i32,
    x2: i32,
    y1: i32,
    y2: i32,
}

impl Tile {
    fn has_inside(&self) -> bool {
        self.x2 - self.x1 >= 2 && self.y2 - self.y1 >= 2
    }
}

/// `Some(color)` if every color in `colors` is `color`.
fn uniform<I: Iterator<Item = Color>>(mut colors: I) -> Option<Color> {
    let first = colors.next()?;
    if colors.all(|c| c == first) {
        Some(first)
    } else {
        None
    }
}

/// The color of a box's whole border, if it has just one.
fn border(ctx: &EngineContext, tile: &Tile) -> Option<Color> {
    let top = uniform(ctx.get_row(tile.y1, tile.x1, tile.x2).into_iter())?;
    let bottom = uniform(ctx.get_row(tile.y2, tile.x1, tile.x2).into_iter())?;
    let left = uniform((tile.y1..=tile.y2).map(|y| ctx.get(tile.x1, y)))?;
    let right = uniform((tile.y1..=tile.y2).map(|y| ctx.get(tile.x2, y)))?;
    if top == bottom && top == left && top == right {
        Some(top)
    } else {
        None
    }
}

/// Computes `x1..=x2` of row `y`, except for `known`.
fn row(ctx: &mut EngineContext, y: i32, x1: i32, x2: i32, known: Option<(i32, i32)>) -> Result<(), Halt> {
    for x in (x1..=x2).filter(|&x| known != Some((x, y))) {
        ctx.calc(x, y)?;
    }
    Ok(())
}

/// Computes `y1..=y2` of column `x`, except for `known`.
fn column(ctx: &mut EngineContext, x: i32, y1: i32, y2: i32, known: Option<(i32, i32)>) -> Result<(), Halt> {
    for y in (y1..=y2).filter(|&y| known != Some((x, y))) {
        ctx.calc(x, y)?;
    }
    Ok(())
}

/// Renders the window, or the rest of it.
pub fn render(ctx: &mut EngineContext) -> Result<(), Halt> {
    subdivide(ctx).map(|_| ())
}

/// Runs the subdivision, returning the number of boxes taken off the
/// stack.
fn subdivide(ctx: &mut EngineContext) -> Result<usize, Halt> {
    let window = ctx.window();
    if let Some(at) = TesseralResume::from_item(ctx.item()) {
        debug!("tesseral resuming in {:?} after {} pixels", at.phase, at.done);
        ctx.replay(u64::from(at.done));
    }

    let mut phase = TesseralPhase::Outline;
    let result = outline(ctx, &window).and_then(|_| walk_stack(ctx, &mut phase, &window));
    if let Err(Halt::Interrupted) = result {
        let mut item = *ctx.item();
        TesseralResume {
            phase,
            done: ctx.answered().min(u64::from(u32::max_value())) as u32,
        }
        .store(&mut item);
        ctx.requeue(item);
    }
    result
}

fn outline(ctx: &mut EngineContext, window: &Window) -> Result<(), Halt> {
    row(ctx, window.y_start, window.x_start, window.x_stop, None)?;
    if window.y_stop > window.y_start {
        row(ctx, window.y_stop, window.x_start, window.x_stop, None)?;
    }
    column(ctx, window.x_start, window.y_start + 1, window.y_stop - 1, None)?;
    if window.x_stop > window.x_start {
        column(ctx, window.x_stop, window.y_start + 1, window.y_stop - 1, None)?;
    }
    Ok(())
}

/// Works through the stack, keeping `phase` on the box at hand.
fn walk_stack(ctx: &mut EngineContext, phase: &mut TesseralPhase, window: &Window) -> Result<usize, Halt> {
    let mut stack = vec![Tile {
        x1: window.x_start,
        x2: window.x_stop,
        y1: window.y_start,
        y2: window.y_stop,
    }];
    let mut visits = 0;

    while let Some(tile) = stack.pop() {
        visits += 1;
        if !tile.has_inside() {
            continue;
        }
        *phase = TesseralPhase::Box {
            x1: tile.x1,
            y1: tile.y1,
        };
        split_or_fill(ctx, &tile, &mut stack)?;
    }
    Ok(visits)
}

fn split_or_fill(ctx: &mut EngineContext, tile: &Tile, stack: &mut Vec<Tile>) -> Result<(), Halt> {
    let mut known = None;
    if let Some(color) = border(ctx, tile) {
        let center = ((tile.x1 + tile.x2) / 2, (tile.y1 + tile.y2) / 2);
        if ctx.calc(center.0, center.1)? == color {
            for y in tile.y1 + 1..tile.y2 {
                ctx.fill_row(y, tile.x1 + 1, tile.x2 - 1, color);
            }
            return Ok(());
        }
        // The center lies on the cut and is already done.
        known = Some(center);
    }

    if tile.x2 - tile.x1 >= tile.y2 - tile.y1 {
        let mid = (tile.x1 + tile.x2) / 2;
        column(ctx, mid, tile.y1 + 1, tile.y2 - 1, known)?;
        stack.push(Tile { x1: mid, ..*tile });
        stack.push(Tile { x2: mid, ..*tile });
    } else {
        let mid = (tile.y1 + tile.y2) / 2;
        row(ctx, mid, tile.x1 + 1, tile.x2 - 1, known)?;
        stack.push(Tile { y1: mid, ..*tile });
        stack.push(Tile { y2: mid, ..*tile });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::FnClassifier;
    use config::{Config, Strategy};
    use engine::{CustomEngine, Engine, Never, Outcome, StopAfter};
    use work::WorkQueue;
    use raster::{Canvas, Raster};
    use symmetry::Axes;

    struct Visits {
        visits: usize,
    }

    impl CustomEngine for Visits {
        fn render(&mut self, ctx: &mut EngineContext) -> Result<(), Halt> {
            self.visits = subdivide(ctx)?;
            Ok(())
        }
    }

    fn disc(x: i32, y: i32) -> Color {
        let (dx, dy) = (x - 20, y - 12);
        if dx * dx + dy * dy < 81 {
            2
        } else {
            1 + ((x / 9) % 3) as Color
        }
    }

    #[test]
    fn uniform_needs_every_color_equal() {
        assert_eq!(uniform(vec![3, 3, 3].into_iter()), Some(3));
        assert_eq!(uniform(vec![3, 4, 3].into_iter()), None);
        assert_eq!(uniform(Vec::<Color>::new().into_iter()), None);
    }

    #[test]
    fn visits_stay_within_the_area() {
        let config = Config {
            strategy: Strategy::Custom,
            ..Config::default()
        };
        let mut canvas = Canvas::new(41, 25);
        let mut engine = Engine::new(&config, 41, 25, Axes::default());
        let mut counter = Visits { visits: 0 };
        engine
            .run_custom(&mut canvas, &mut FnClassifier(disc), &mut Never, &mut counter)
            .unwrap();
        assert!(counter.visits > 1);
        assert!(counter.visits <= 2 * 41 * 25);
        for y in 0..25 {
            for x in 0..41 {
                assert_eq!(canvas.get(x, y), disc(x, y), "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn flat_images_fill_in_one_box() {
        let config = Config {
            strategy: Strategy::Tesseral,
            ..Config::default()
        };
        let mut count = 0;
        let mut canvas = Canvas::new(10, 10);
        {
            let mut pixels = FnClassifier(|_, _| {
                count += 1;
                4
            });
            let mut engine = Engine::new(&config, 10, 10, Axes::default());
            engine.run(&mut canvas, &mut pixels, &mut Never).unwrap();
        }
        // The border and the center.
        assert_eq!(count, 36 + 1);
        assert!(canvas.pixels().iter().all(|&c| c == 4));
    }

    #[test]
    fn no_pixel_is_computed_twice() {
        // A ring whose inside differs from it, so some box has a
        // uniform border and a center of another color.
        let ring = |x: i32, y: i32| {
            let (dx, dy) = (x - 16, y - 16);
            let d = dx * dx + dy * dy;
            if d < 16 {
                3
            } else if d < 144 {
                2
            } else {
                1
            }
        };
        let config = Config {
            strategy: Strategy::Tesseral,
            ..Config::default()
        };
        let mut counts = vec![0; 33 * 33];
        let mut canvas = Canvas::new(33, 33);
        {
            let mut pixels = FnClassifier(|x: i32, y: i32| {
                counts[(y * 33 + x) as usize] += 1;
                ring(x, y)
            });
            let mut engine = Engine::new(&config, 33, 33, Axes::default());
            engine.run(&mut canvas, &mut pixels, &mut Never).unwrap();
        }
        assert!(counts.iter().all(|&n| n <= 1));
        for y in 0..33 {
            for x in 0..33 {
                assert_eq!(canvas.get(x, y), ring(x, y), "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn outline_resumes_at_the_pixel_it_stopped_at() {
        let config = Config {
            strategy: Strategy::Tesseral,
            poll_interval: 1,
            ..Config::default()
        };
        let (width, height) = (30, 20);
        let mut counts = vec![0; (width * height) as usize];
        let mut canvas = Canvas::new(width, height);
        let mut engine = Engine::new(&config, width, height, Axes::default());
        let mut runs = 0;
        loop {
            runs += 1;
            assert!(runs < 100, "no progress after {} runs", runs);
            let outcome = {
                let mut pixels = FnClassifier(|x: i32, y: i32| {
                    counts[(y * width + x) as usize] += 1;
                    4
                });
                engine.run(&mut canvas, &mut pixels, &mut StopAfter(5)).unwrap()
            };
            let blob = match outcome {
                Outcome::Complete => break,
                Outcome::Interrupted(blob) => blob,
            };
            if runs == 1 {
                let queue = WorkQueue::decode(&blob).unwrap();
                let at = TesseralResume::from_item(queue.iter().next().unwrap()).unwrap();
                assert_eq!(at.phase, TesseralPhase::Outline);
                assert_eq!(at.done, 5);
            }
            engine = Engine::resume(&config, Axes::default(), &blob).unwrap();
        }
        // The border, once, and the center.
        assert_eq!(counts.iter().sum::<u32>(), 2 * 30 + 2 * 18 + 1);
        assert!(counts.iter().all(|&n| n <= 1));
        assert!(canvas.pixels().iter().all(|&c| c == 4));
    }
}
