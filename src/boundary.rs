//! Boundary tracing.
//!
//! The window is scanned in raster order for pixels nobody has visited
//! yet.  Each one is classified and, taking its color as the trail
//! color, the outline of its region is followed with a hand on the
//! wall: turn left after every step onto a trail-colored pixel, turn
//! right after every miss.  Unvisited pixels met along the way are
//! classified.  Once the walk is back where it started, a region that
//! gave at least four steps is walked again, and every row reached
//! heading south (or on turning west) is filled leftwards across its
//! unvisited run.
//!
//! Regions are assumed to contain no islands of another color.  A
//! pixel counts as visited once it has been classified or filled.
//!
//! An interrupted item records the scan pixel it stopped at and how
//! many pixels it had classified.  Resuming retraces the item from its
//! first pixel with those classifications replayed from the raster, so
//! the visited bitmap, the trails and the fills all come out as they
//! were, and carries on with the pixel it stopped at.

use engine::{EngineContext, Halt};
use raster::{Color, BACKGROUND};
use symmetry::Window;
use work::TraceResume;

/// Steps onto the trail color needed before a region is filled.
const MIN_MATCHES: u32 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    fn left(self) -> Heading {
        match self {
            Heading::North => Heading::West,
            Heading::East => Heading::North,
            Heading::South => Heading::East,
            Heading::West => Heading::South,
        }
    }

    fn right(self) -> Heading {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    fn step(self, x: i32, y: i32) -> (i32, i32) {
        match self {
            Heading::North => (x, y - 1),
            Heading::East => (x + 1, y),
            Heading::South => (x, y + 1),
            Heading::West => (x - 1, y),
        }
    }
}

/// One step of the walk onto a trail pixel.
#[derive(Copy, Clone, Debug)]
struct Step {
    x: i32,
    y: i32,
    heading: Heading,
    previous: Heading,
}

impl Step {
    /// Right-hand edges, where the region lies to the west.
    fn fills(&self) -> bool {
        self.heading == Heading::South
            || (self.heading == Heading::West && self.previous != Heading::West)
    }
}

/// The walk around one region.
struct Trail {
    color: Color,
    start: (i32, i32),
    steps: Vec<Step>,
    matches: u32,
}

/// Which pixels of the window have been classified or filled.
struct Visited {
    window: Window,
    seen: Vec<bool>,
}

impl Visited {
    fn new(window: Window) -> Visited {
        Visited {
            window,
            seen: vec![false; window.area() as usize],
        }
    }

    fn index(&self, x: i32, y: i32) -> usize {
        ((y - self.window.y_start) * self.window.width() + (x - self.window.x_start)) as usize
    }

    fn get(&self, x: i32, y: i32) -> bool {
        self.seen[self.index(x, y)]
    }

    fn set(&mut self, x: i32, y: i32) {
        let i = self.index(x, y);
        self.seen[i] = true;
    }

    /// Color of a pixel, classifying it first if it has not been.
    fn color_of(&mut self, ctx: &mut EngineContext, x: i32, y: i32) -> Result<Color, Halt> {
        if self.get(x, y) {
            return Ok(ctx.get(x, y));
        }
        let color = ctx.calc(x, y)?;
        self.set(x, y);
        Ok(color)
    }
}

/// Walks the outline of the region of `color` whose first pixel in scan
/// order is `(x, y)`.  Nothing above row `y` belongs to it.
fn walk(
    ctx: &mut EngineContext,
    visited: &mut Visited,
    window: &Window,
    x: i32,
    y: i32,
    color: Color,
) -> Result<Trail, Halt> {
    let mut trail = Trail {
        color,
        start: (x, y),
        steps: Vec::new(),
        matches: 0,
    };
    let (mut px, mut py) = (x, y);
    let mut heading = Heading::East;
    let mut previous = Heading::East;
    // Each pixel can be left in four headings at most.
    let limit = 4 * window.area() + 4;
    let mut taken = 0;

    loop {
        taken += 1;
        if taken > limit {
            warn!("trail from ({}, {}) does not close", x, y);
            trail.matches = 0;
            return Ok(trail);
        }
        let (cx, cy) = heading.step(px, py);
        let on_trail = cy >= y && window.contains(cx, cy) && visited.color_of(ctx, cx, cy)? == color;
        if on_trail {
            trail.steps.push(Step {
                x: cx,
                y: cy,
                heading,
                previous,
            });
            trail.matches += 1;
            previous = heading;
            px = cx;
            py = cy;
            if (px, py) == trail.start {
                break;
            }
            heading = heading.left();
        } else {
            heading = heading.right();
            if (px, py) == trail.start && heading == Heading::East {
                break;
            }
        }
    }
    Ok(trail)
}

/// Fills the region behind each right-hand edge of the trail.
fn fill(ctx: &mut EngineContext, visited: &mut Visited, window: &Window, trail: &Trail) {
    for step in trail.steps.iter().filter(|s| s.fills()) {
        let mut right = step.x - 1;
        while right >= window.x_start
            && visited.get(right, step.y)
            && ctx.get(right, step.y) == trail.color
        {
            right -= 1;
        }
        if right < window.x_start || visited.get(right, step.y) {
            continue;
        }
        let mut left = right;
        while left > window.x_start && !visited.get(left - 1, step.y) {
            left -= 1;
        }
        ctx.fill_row(step.y, left, right, trail.color);
        for x in left..=right {
            visited.set(x, step.y);
        }
    }
}

/// Classifies a scan pixel and, unless it is background, walks and
/// fills its region.  Returns whether a region was filled.
fn trace_region(
    ctx: &mut EngineContext,
    visited: &mut Visited,
    window: &Window,
    x: i32,
    y: i32,
) -> Result<bool, Halt> {
    let color = visited.color_of(ctx, x, y)?;
    if color == BACKGROUND {
        return Ok(false);
    }
    let trail = walk(ctx, visited, window, x, y, color)?;
    if trail.matches < MIN_MATCHES {
        return Ok(false);
    }
    fill(ctx, visited, window, &trail);
    Ok(true)
}

fn interrupted(ctx: &mut EngineContext, x: i32, y: i32) {
    let mut item = *ctx.item();
    TraceResume {
        column: x,
        row: y,
        done: ctx.answered().min(u64::from(u32::max_value())) as u32,
    }
    .store(&mut item);
    ctx.requeue(item);
}

/// Traces the window, or the rest of it.
pub fn render(ctx: &mut EngineContext) -> Result<(), Halt> {
    let window = ctx.window();
    if let Some(at) = TraceResume::from_item(ctx.item()) {
        debug!(
            "boundary tracing resuming at ({}, {}) after {} pixels",
            at.column, at.row, at.done
        );
        ctx.replay(u64::from(at.done));
    }
    let mut visited = Visited::new(window);
    let mut regions = 0;

    for y in window.y_start..=window.y_stop {
        for x in window.x_start..=window.x_stop {
            if visited.get(x, y) {
                continue;
            }
            match trace_region(ctx, &mut visited, &window, x, y) {
                Ok(true) => regions += 1,
                Ok(false) => {}
                Err(halt) => {
                    if let Halt::Interrupted = halt {
                        interrupted(ctx, x, y);
                    }
                    return Err(halt);
                }
            }
        }
    }
    debug!("boundary tracing filled {} regions in {:?}", regions, window);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::FnClassifier;
    use config::{Config, Strategy};
    use engine::{Engine, Never, Outcome, StopAfter};
    use raster::{Canvas, Raster};
    use symmetry::Axes;

    fn boxes(x: i32, y: i32) -> Color {
        if x >= 3 && x <= 12 && y >= 2 && y <= 9 {
            5
        } else if x >= 15 && x <= 18 && y >= 11 && y <= 14 {
            7
        } else {
            0
        }
    }

    fn trace() -> Config {
        Config {
            strategy: Strategy::BoundaryTrace,
            ..Config::default()
        }
    }

    #[test]
    fn headings_turn_both_ways() {
        for &h in &[Heading::North, Heading::East, Heading::South, Heading::West] {
            assert_eq!(h.left().right(), h);
            assert_eq!(h.right().right().right().right(), h);
        }
    }

    #[test]
    fn rectangles_are_filled_not_computed() {
        let mut count = 0;
        let mut canvas = Canvas::new(20, 16);
        {
            let mut pixels = FnClassifier(|x, y| {
                count += 1;
                boxes(x, y)
            });
            let mut engine = Engine::new(&trace(), 20, 16, Axes::default());
            engine.run(&mut canvas, &mut pixels, &mut Never).unwrap();
        }
        for y in 0..16 {
            for x in 0..20 {
                assert_eq!(canvas.get(x, y), boxes(x, y), "at ({}, {})", x, y);
            }
        }
        // The inside of the big box is never classified.
        assert!(count <= 20 * 16 - 8 * 6);
    }

    #[test]
    fn thin_features_are_left_alone() {
        let thin = |x: i32, y: i32| {
            if (x, y) == (4, 4) {
                3
            } else if y == 6 && x >= 2 {
                4
            } else {
                0
            }
        };
        let mut canvas = Canvas::new(9, 9);
        let mut engine = Engine::new(&trace(), 9, 9, Axes::default());
        engine
            .run(&mut canvas, &mut FnClassifier(thin), &mut Never)
            .unwrap();
        for y in 0..9 {
            for x in 0..9 {
                assert_eq!(canvas.get(x, y), thin(x, y));
            }
        }
    }

    #[test]
    fn resumed_traces_classify_nothing_twice() {
        let config = Config {
            poll_interval: 1,
            ..trace()
        };
        let mut counts = vec![0u32; 20 * 16];
        let mut canvas = Canvas::new(20, 16);
        let mut engine = Engine::new(&config, 20, 16, Axes::default());
        let mut runs = 0;
        loop {
            runs += 1;
            assert!(runs < 1000, "no progress after {} runs", runs);
            let outcome = {
                let mut pixels = FnClassifier(|x: i32, y: i32| {
                    counts[(y * 20 + x) as usize] += 1;
                    boxes(x, y)
                });
                engine.run(&mut canvas, &mut pixels, &mut StopAfter(1)).unwrap()
            };
            match outcome {
                Outcome::Complete => break,
                Outcome::Interrupted(blob) => {
                    engine = Engine::resume(&config, Axes::default(), &blob).unwrap();
                }
            }
        }
        assert!(runs > 1);
        assert!(counts.iter().all(|&n| n <= 1));
        for y in 0..16 {
            for x in 0..20 {
                assert_eq!(canvas.get(x, y), boxes(x, y), "at ({}, {})", x, y);
            }
        }
    }
}
