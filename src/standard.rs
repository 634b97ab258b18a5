//! The plain strategies: every pixel in raster order, or a coarse pass
//! over every other pixel of every other row followed by a pass that
//! fills in the rest.

use config::Strategy;
use engine::{EngineContext, Halt};
use symmetry::Window;
use work::PassResume;

/// Renders the window in one or two passes, depending on the strategy.
pub fn render(ctx: &mut EngineContext) -> Result<(), Halt> {
    let window = ctx.window();
    let mut at = PassResume::from_item(ctx.item());
    at.row = at.row.max(window.y_start);

    let result = if ctx.config().strategy == Strategy::TwoPass {
        two_pass(ctx, window, &mut at)
    } else {
        single_pass(ctx, window, &mut at)
    };
    if let Err(Halt::Interrupted) = result {
        let mut item = *ctx.item();
        at.store(&mut item);
        ctx.requeue(item);
    }
    result
}

/// Every pixel, row by row, starting from `at`.  `at` is kept on the
/// pixel being worked on.
fn single_pass(ctx: &mut EngineContext, window: Window, at: &mut PassResume) -> Result<(), Halt> {
    while at.row <= window.y_stop {
        at.column = at.column.max(window.x_start);
        while at.column <= window.x_stop {
            ctx.calc(at.column, at.row)?;
            at.column += 1;
        }
        at.row += 1;
        at.column = window.x_start;
    }
    Ok(())
}

fn two_pass(ctx: &mut EngineContext, window: Window, at: &mut PassResume) -> Result<(), Halt> {
    if at.pass == 0 {
        coarse_pass(ctx, window, at)?;
        at.pass = 1;
        at.row = window.y_start;
        at.column = window.x_start;
    }
    fine_pass(ctx, window, at)
}

/// Even columns of even rows, counted from the window's corner, each
/// copied into the rest of its 2x2 cell as a preview.
fn coarse_pass(ctx: &mut EngineContext, window: Window, at: &mut PassResume) -> Result<(), Halt> {
    // A resume can only land on a pixel this pass computes.
    at.row += (at.row - window.y_start) & 1;
    while at.row <= window.y_stop {
        at.column = at.column.max(window.x_start);
        at.column += (at.column - window.x_start) & 1;
        while at.column <= window.x_stop {
            let color = ctx.calc(at.column, at.row)?;
            let right = (at.column + 1).min(window.x_stop);
            if right > at.column {
                ctx.plot(right, at.row, color);
            }
            if at.row < window.y_stop {
                ctx.fill_row(at.row + 1, at.column, right, color);
            }
            at.column += 2;
        }
        at.row += 2;
        at.column = window.x_start;
    }
    Ok(())
}

/// Everything the coarse pass guessed at.
fn fine_pass(ctx: &mut EngineContext, window: Window, at: &mut PassResume) -> Result<(), Halt> {
    while at.row <= window.y_stop {
        let odd_row = (at.row - window.y_start) & 1 == 1;
        at.column = at.column.max(window.x_start);
        while at.column <= window.x_stop {
            if odd_row || (at.column - window.x_start) & 1 == 1 {
                ctx.calc(at.column, at.row)?;
            }
            at.column += 1;
        }
        at.row += 1;
        at.column = window.x_start;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use classify::FnClassifier;
    use config::{Config, Strategy};
    use engine::{Engine, Never, Outcome, StopAfter};
    use raster::{Canvas, Raster};
    use symmetry::Axes;

    fn pattern(x: i32, y: i32) -> u16 {
        (1 + (x * 7 + y * 3) % 11) as u16
    }

    fn config(strategy: Strategy) -> Config {
        Config {
            strategy,
            poll_interval: 1,
            ..Config::default()
        }
    }

    #[test]
    fn single_pass_paints_every_pixel() {
        let mut canvas = Canvas::new(7, 5);
        let mut engine = Engine::new(&config(Strategy::SinglePass), 7, 5, Axes::default());
        let outcome = engine
            .run(&mut canvas, &mut FnClassifier(pattern), &mut Never)
            .unwrap();
        assert_eq!(outcome, Outcome::Complete);
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(canvas.get(x, y), pattern(x, y));
            }
        }
    }

    #[test]
    fn two_pass_classifies_each_pixel_once() {
        let mut count = 0;
        let mut canvas = Canvas::new(7, 5);
        {
            let mut pixels = FnClassifier(|x, y| {
                count += 1;
                pattern(x, y)
            });
            let mut engine = Engine::new(&config(Strategy::TwoPass), 7, 5, Axes::default());
            engine.run(&mut canvas, &mut pixels, &mut Never).unwrap();
        }
        assert_eq!(count, 35);
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(canvas.get(x, y), pattern(x, y));
            }
        }
    }

    #[test]
    fn coarse_pass_previews_whole_cells() {
        let mut canvas = Canvas::new(4, 4);
        let mut engine = Engine::new(&config(Strategy::TwoPass), 4, 4, Axes::default());
        // Four coarse pixels, then stop.
        let outcome = engine
            .run(&mut canvas, &mut FnClassifier(pattern), &mut StopAfter(4))
            .unwrap();
        match outcome {
            Outcome::Interrupted(_) => {}
            Outcome::Complete => panic!("should have stopped"),
        }
        assert_eq!(canvas.get(1, 1), pattern(0, 0));
        assert_eq!(canvas.get(3, 3), pattern(2, 2));
    }

    #[test]
    fn interrupted_mid_row_resumes_at_the_pixel() {
        let mut canvas = Canvas::new(6, 3);
        let mut engine = Engine::new(&config(Strategy::SinglePass), 6, 3, Axes::default());
        let blob = match engine
            .run(&mut canvas, &mut FnClassifier(pattern), &mut StopAfter(8))
            .unwrap()
        {
            Outcome::Interrupted(blob) => blob,
            Outcome::Complete => panic!("should have stopped"),
        };
        assert_eq!(canvas.get(1, 1), pattern(1, 1));
        assert_eq!(canvas.get(2, 1), 0);
        let item = *engine.queue().iter().next().unwrap();
        assert_eq!((item.x_begin, item.y_begin), (2, 1));

        let mut engine = Engine::resume(&config(Strategy::SinglePass), Axes::default(), &blob).unwrap();
        let outcome = engine
            .run(&mut canvas, &mut FnClassifier(pattern), &mut Never)
            .unwrap();
        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(canvas.get(2, 1), pattern(2, 1));
        assert_eq!(canvas.get(5, 2), pattern(5, 2));
    }
}
