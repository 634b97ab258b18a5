//! Solid guessing.
//!
//! The window is first sampled on a coarse grid of blocks.  Each later
//! pass halves the grid spacing: a block whose four corners agree, and
//! whose ring of twelve neighbouring grid points agrees with them, is
//! filled solid without computing its inside; any other block has the
//! three new grid points on its top edge, left edge and center
//! computed.  Whenever a computed pixel disagrees with a guessed pixel
//! next to it, the guessed one is recomputed, and so on outwards while
//! the guesses keep turning out wrong.
//!
//! A block that was filled is never visited again: the skip bitmap
//! carries it down to the finer passes.
//!
//! An interrupted item records the pass and the block it stopped in,
//! and how many pixels it had classified for that block.  Resuming
//! replays the passes from the start, taking colors from the raster
//! instead of computing them, so that the same decisions are made,
//! until that block comes around again.  Within the block, those
//! pixels, fixups included, are replayed from the raster too.

use engine::{EngineContext, Halt};
use raster::Color;
use symmetry::Window;
use work::GuessResume;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Known {
    Pending,
    Computed(Color),
    Guessed(Color),
}

impl Known {
    fn color(self) -> Option<Color> {
        match self {
            Known::Pending => None,
            Known::Computed(c) | Known::Guessed(c) => Some(c),
        }
    }
}

/// One bit per block of the current pass: set if the block lies in a
/// region that has already been filled.
#[derive(Clone, Debug)]
struct SkipBitmap {
    across: usize,
    words: Vec<u32>,
}

impl SkipBitmap {
    fn new(across: i32, down: i32) -> SkipBitmap {
        let across = across.max(0) as usize;
        let bits = across * down.max(0) as usize;
        SkipBitmap {
            across,
            words: vec![0; (bits + 31) / 32],
        }
    }

    fn bit(&self, i: i32, j: i32) -> (usize, u32) {
        let n = j as usize * self.across + i as usize;
        (n / 32, 1 << (n % 32))
    }

    fn get(&self, i: i32, j: i32) -> bool {
        let (word, mask) = self.bit(i, j);
        self.words[word] & mask != 0
    }

    fn set(&mut self, i: i32, j: i32) {
        let (word, mask) = self.bit(i, j);
        self.words[word] |= mask;
    }

    /// The bitmap for the next pass, whose blocks are half the size.
    fn refine(&self, across: i32, down: i32) -> SkipBitmap {
        let mut next = SkipBitmap::new(across, down);
        for j in 0..down {
            for i in 0..across {
                if self.get(i / 2, j / 2) {
                    next.set(i, j);
                }
            }
        }
        next
    }
}

/// A place in the pass sequence: a grid point in pass 0, a block's
/// corner after that.  Coordinates are absolute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Mark {
    pass: i32,
    x: i32,
    y: i32,
}

fn blocks(extent: i32, size: i32) -> i32 {
    (extent + size - 1) / size
}

struct Guesser {
    window: Window,
    width: i32,
    height: i32,
    block: i32,
    guess_edges: bool,
    state: Vec<Known>,
    live: bool,
    target: Option<Mark>,
    /// Pixels the target block had classified.
    replay: u32,
    at: Mark,
    /// `answered` on entering the block at `at`.
    entered: u64,
    fixups: Vec<(i32, i32, Color)>,
    guessed: u64,
}

impl Guesser {
    fn new(ctx: &EngineContext, target: Option<Mark>, replay: u32) -> Guesser {
        let window = ctx.window();
        let (width, height) = (window.width(), window.height());
        let cap = ctx.config().max_block.max(1);
        let mut block = 1;
        while block * 2 <= width.min(height) && block * 2 <= cap {
            block *= 2;
        }
        Guesser {
            window,
            width,
            height,
            block,
            guess_edges: ctx.config().guess_edges,
            state: vec![Known::Pending; (width * height).max(0) as usize],
            live: target.is_none(),
            target,
            replay,
            at: Mark {
                pass: 0,
                x: window.x_start,
                y: window.y_start,
            },
            entered: 0,
            fixups: Vec::new(),
            guessed: 0,
        }
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    fn inside(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Notes where the walk is, going live on reaching the resume mark.
    fn enter(&mut self, ctx: &mut EngineContext, pass: i32, x: i32, y: i32) {
        self.at = Mark {
            pass,
            x: self.window.x_start + x,
            y: self.window.y_start + y,
        };
        self.entered = ctx.answered();
        if !self.live && self.target == Some(self.at) {
            trace!("solid guessing replay reached {:?}", self.at);
            self.live = true;
            ctx.replay(u64::from(self.replay));
        }
    }

    fn compute(&mut self, ctx: &mut EngineContext, x: i32, y: i32) -> Result<Color, Halt> {
        let (ax, ay) = (self.window.x_start + x, self.window.y_start + y);
        let color = if self.live {
            ctx.calc(ax, ay)?
        } else {
            ctx.get(ax, ay)
        };
        let i = self.index(x, y);
        self.state[i] = Known::Computed(color);
        Ok(color)
    }

    /// Computes a pixel, then repairs whatever guesses it contradicts.
    fn settle(&mut self, ctx: &mut EngineContext, x: i32, y: i32) -> Result<(), Halt> {
        self.fixups.clear();
        let color = self.compute(ctx, x, y)?;
        self.fixups.push((x, y, color));
        self.repair(ctx)
    }

    /// Works through the fixup stack: every guessed pixel next to a
    /// computed one of another color is recomputed, and its own
    /// neighbours checked in turn.
    fn repair(&mut self, ctx: &mut EngineContext) -> Result<(), Halt> {
        while let Some((px, py, pc)) = self.fixups.pop() {
            for &(qx, qy) in &[(px + 1, py), (px - 1, py), (px, py + 1), (px, py - 1)] {
                if !self.inside(qx, qy) {
                    continue;
                }
                if let Known::Guessed(guess) = self.state[self.index(qx, qy)] {
                    if guess != pc {
                        let actual = self.compute(ctx, qx, qy)?;
                        self.fixups.push((qx, qy, actual));
                    }
                }
            }
        }
        Ok(())
    }

    /// The color a block can be filled with, if it can.  `size` is the
    /// distance between its corners.
    fn guess(&self, x0: i32, y0: i32, size: i32) -> Option<Color> {
        let color = self.state[self.index(x0, y0)].color()?;
        for dy in -1..3 {
            for dx in -1..3 {
                let (x, y) = (x0 + dx * size, y0 + dy * size);
                if !self.inside(x, y) {
                    if self.guess_edges {
                        continue;
                    }
                    return None;
                }
                if self.state[self.index(x, y)].color() != Some(color) {
                    return None;
                }
            }
        }
        Some(color)
    }

    /// Fills a block, then checks its outline against the computed
    /// pixels around it.
    fn fill(
        &mut self,
        ctx: &mut EngineContext,
        x0: i32,
        y0: i32,
        size: i32,
        color: Color,
    ) -> Result<(), Halt> {
        let x1 = (x0 + size).min(self.width) - 1;
        let y1 = (y0 + size).min(self.height) - 1;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let i = self.index(x, y);
                if self.state[i] == Known::Pending {
                    self.state[i] = Known::Guessed(color);
                    self.guessed += 1;
                }
            }
            if self.live {
                let (wx, wy) = (self.window.x_start, self.window.y_start);
                ctx.fill_row(wy + y, wx + x0, wx + x1, color);
            }
        }

        self.fixups.clear();
        let outside = (x0 - 1..=x1 + 1)
            .flat_map(|x| vec![(x, y0 - 1), (x, y1 + 1)])
            .chain((y0..=y1).flat_map(|y| vec![(x0 - 1, y), (x1 + 1, y)]));
        for (x, y) in outside {
            if !self.inside(x, y) {
                continue;
            }
            if let Known::Computed(c) = self.state[self.index(x, y)] {
                if c != color {
                    self.fixups.push((x, y, c));
                }
            }
        }
        self.repair(ctx)
    }

    fn run(&mut self, ctx: &mut EngineContext) -> Result<(), Halt> {
        let block = self.block;
        let mut y = 0;
        while y < self.height {
            let mut x = 0;
            while x < self.width {
                self.enter(ctx, 0, x, y);
                self.settle(ctx, x, y)?;
                x += block;
            }
            y += block;
        }

        let mut skip = SkipBitmap::new(blocks(self.width, block), blocks(self.height, block));
        let mut step = block / 2;
        let mut pass = 1;
        while step >= 1 {
            let size = 2 * step;
            trace!("solid guessing pass {} with {}-pixel blocks", pass, size);
            for j in 0..blocks(self.height, size) {
                for i in 0..blocks(self.width, size) {
                    let (x0, y0) = (i * size, j * size);
                    self.enter(ctx, pass, x0, y0);
                    if skip.get(i, j) {
                        continue;
                    }
                    if let Some(color) = self.guess(x0, y0, size) {
                        skip.set(i, j);
                        self.fill(ctx, x0, y0, size, color)?;
                        continue;
                    }
                    for &(x, y) in &[(x0 + step, y0), (x0, y0 + step), (x0 + step, y0 + step)] {
                        if self.inside(x, y) && self.state[self.index(x, y)] == Known::Pending {
                            self.settle(ctx, x, y)?;
                        }
                    }
                }
            }
            skip = skip.refine(blocks(self.width, step), blocks(self.height, step));
            step /= 2;
            pass += 1;
        }
        Ok(())
    }
}

/// Runs the passes, requeueing the item at the block it stopped in.
/// Returns whether the resume mark, if there was one, was found.
fn attempt(ctx: &mut EngineContext, target: Option<Mark>, replay: u32) -> Result<bool, Halt> {
    let mut guesser = Guesser::new(ctx, target, replay);
    let result = guesser.run(ctx);
    if let Err(Halt::Interrupted) = result {
        let mut item = *ctx.item();
        let done = ctx.answered() - guesser.entered;
        GuessResume {
            pass: guesser.at.pass,
            row: guesser.at.y,
            column: guesser.at.x,
            done: done.min(u64::from(u32::max_value())) as u32,
        }
        .store(&mut item);
        ctx.requeue(item);
    }
    result?;
    debug!(
        "solid guessing filled {} of {} pixels in {:?}",
        guesser.guessed,
        guesser.state.len(),
        guesser.window
    );
    Ok(guesser.live)
}

/// Guesses the window, or the rest of it.
pub fn render(ctx: &mut EngineContext) -> Result<(), Halt> {
    let window = ctx.window();
    let at = GuessResume::from_item(ctx.item());
    let fresh = at.pass == 0 && at.done == 0;
    let target = if fresh && at.row <= window.y_start && at.column <= window.x_start {
        None
    } else {
        Some(Mark {
            pass: at.pass,
            x: at.column,
            y: at.row,
        })
    };
    if !attempt(ctx, target, at.done)? {
        warn!("solid guessing mark {:?} not found, recomputing {:?}", target, window);
        attempt(ctx, None, 0)?;
    }
    Ok(())
}
