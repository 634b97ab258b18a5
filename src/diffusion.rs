//! Diffusion scan.  A counter is turned into a position inside a square
//! power-of-two tile by splitting its bits between x and y and reading
//! each backwards, so the first few points land far apart and later ones
//! fill the gaps between them.  The tile is repeated across the window.
//! In fill mode every point also paints the square it stands for at
//! its level of refinement, giving a blocky preview that sharpens as the
//! counter runs.
//!
//! An interrupted item records its counter and how many tiles it had
//! done at that counter; those pixels are replayed from the raster when
//! it resumes.

use engine::{EngineContext, Halt};
use symmetry::Window;
use work::DiffusionResume;

/// Tiles are at most 2^MAX_BITS pixels on a side.
const MAX_BITS: u32 = 8;

struct Tables {
    x: [u8; 256],
    y: [u8; 256],
}

impl Tables {
    /// For each byte, its even bits and its odd bits as two reversed
    /// nibbles.
    fn new() -> Tables {
        let mut x = [0u8; 256];
        let mut y = [0u8; 256];
        for byte in 0..256usize {
            for bit in 0..4 {
                if byte & (1 << (2 * bit)) != 0 {
                    x[byte] |= 0x8 >> bit;
                }
                if byte & (1 << (2 * bit + 1)) != 0 {
                    y[byte] |= 0x8 >> bit;
                }
            }
        }
        Tables { x, y }
    }

    fn offset(&self, n: u32, bits: u32) -> (i32, i32) {
        let lo = (n & 0xff) as usize;
        let hi = ((n >> 8) & 0xff) as usize;
        let x = ((self.x[lo] as u32) << 4 | self.x[hi] as u32) >> (MAX_BITS - bits);
        let y = ((self.y[lo] as u32) << 4 | self.y[hi] as u32) >> (MAX_BITS - bits);
        (x as i32, y as i32)
    }
}

/// Where the `n`th point falls in a tile `2^bits` pixels on a side.
/// Counters from 0 to `4^bits - 1` visit every position once.
pub fn diffusion_offset(n: u32, bits: u32) -> (i32, i32) {
    Tables::new().offset(n, bits.min(MAX_BITS))
}

/// Bits per side of the smallest tile covering the window, up to the
/// largest tile there is.
fn tile_bits(window: &Window) -> u32 {
    let side = window.width().max(window.height()).max(1) as u32;
    let mut bits = 0;
    while (1u32 << bits) < side && bits < MAX_BITS {
        bits += 1;
    }
    bits
}

/// Refinement level of the `n`th point: how many two-bit groups its
/// counter needs.
fn level(n: u32) -> u32 {
    let significant = 32 - n.leading_zeros();
    (significant + 1) / 2
}

/// Scans the window, or the rest of it.
pub fn render(ctx: &mut EngineContext) -> Result<(), Halt> {
    let window = ctx.window();
    let bits = tile_bits(&window);
    let tile = 1i32 << bits;
    let limit = 1u32 << (2 * bits);
    let fill = ctx.config().diffusion_fill;
    let tables = Tables::new();
    let tiles_across = (window.width() + tile - 1) / tile;
    let tiles_down = (window.height() + tile - 1) / tile;

    let at = DiffusionResume::from_item(ctx.item());
    let mut counter = at.counter;
    trace!(
        "diffusion over {:?} in {}-pixel tiles from {}",
        window,
        tile,
        counter
    );
    ctx.replay(u64::from(at.done));

    while counter < limit {
        let started = ctx.answered();
        let (dx, dy) = tables.offset(counter, bits);
        let size = tile >> level(counter);
        for (ty, tx) in iproduct!(0..tiles_down, 0..tiles_across) {
            let x = window.x_start + tx * tile + dx;
            let y = window.y_start + ty * tile + dy;
            if !window.contains(x, y) {
                continue;
            }
            let color = match ctx.calc(x, y) {
                Ok(color) => color,
                Err(halt) => {
                    if let Halt::Interrupted = halt {
                        let mut item = *ctx.item();
                        let done = ctx.answered() - started;
                        DiffusionResume {
                            counter,
                            done: done.min(u64::from(u32::max_value())) as u32,
                        }
                        .store(&mut item);
                        ctx.requeue(item);
                    }
                    return Err(halt);
                }
            };
            if fill && size > 1 {
                let right = (x + size - 1).min(window.x_stop);
                let bottom = (y + size - 1).min(window.y_stop);
                for row in y..=bottom {
                    ctx.fill_row(row, x, right, color);
                }
            }
        }
        counter += 1;
    }
    Ok(())
}
