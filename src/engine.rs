//! The driver.  `Engine` pops work items off the queue one at a time,
//! lets the symmetry planner cut them down, and hands them to the
//! selected strategy along with an `EngineContext`: the raster, the
//! classifier, the interrupt poll and the bookkeeping for the item at
//! hand.  A strategy that is interrupted puts what it has left back on
//! the queue, and the driver hands the caller the queue as a resume
//! blob.

use boundary;
use classify::Classify;
use config::{Config, Inside, Outside, Strategy};
use diffusion;
use error::EngineError;
use guess;
use raster::{Color, Raster};
use standard;
use symmetry::{Axes, Mirror, SymmetryPlanner, Window};
use tesseral;
use work::{WorkItem, WorkQueue};

/// Pixels mirrored for each poll-countdown tick they are charged.
const MIRROR_CHARGE_RATIO: u64 = 16;

/// Asked, every so often, whether the render should stop.
pub trait InterruptPoll {
    /// True means stop now.
    fn poll(&mut self) -> bool;
}

/// Never stops.
pub struct Never;

impl InterruptPoll for Never {
    fn poll(&mut self) -> bool {
        false
    }
}

/// Lets `n` polls through and stops on every one after that.
pub struct StopAfter(pub u64);

impl InterruptPoll for StopAfter {
    fn poll(&mut self) -> bool {
        if self.0 == 0 {
            true
        } else {
            self.0 -= 1;
            false
        }
    }
}

/// Why a strategy stopped short of finishing its item.
#[derive(Debug)]
pub enum Halt {
    /// The poll said stop.  The strategy has requeued its remainder.
    Interrupted,
    /// The classifier failed.
    Failed(EngineError),
}

impl From<EngineError> for Halt {
    fn from(err: EngineError) -> Self {
        Halt::Failed(err)
    }
}

/// How a run ended.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Every pixel has been painted.
    Complete,
    /// Stopped early.  The blob is the serialized work queue; hand it
    /// to `Engine::resume` along with the same raster to carry on.
    Interrupted(Vec<u8>),
}

/// A caller-supplied strategy, for `Strategy::Custom`.
pub trait CustomEngine {
    /// Renders `ctx.window()`.  On `Halt::Interrupted` the engine must
    /// already have requeued whatever it did not finish.
    fn render(&mut self, ctx: &mut EngineContext) -> Result<(), Halt>;
}

/// Everything a strategy can touch while it works on one item.
pub struct EngineContext<'a> {
    raster: &'a mut dyn Raster,
    pixels: &'a mut dyn Classify,
    poll: &'a mut dyn InterruptPoll,
    queue: &'a mut WorkQueue,
    config: &'a Config,
    mirror: Mirror,
    window: Window,
    item: WorkItem,
    interval: u32,
    countdown: u32,
    classified: u64,
    replaying: u64,
    answered: u64,
}

impl<'a> EngineContext<'a> {
    /// The configuration of the run.
    pub fn config(&self) -> &Config {
        self.config
    }

    /// The part of the item to compute, after symmetry.
    pub fn window(&self) -> Window {
        self.window
    }

    /// The item as it came off the queue, after symmetry.
    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    /// Pixels classified so far in this run.
    pub fn classified(&self) -> u64 {
        self.classified
    }

    /// Calls to `calc` answered so far for this item, whether from the
    /// classifier or replayed from the raster.
    pub fn answered(&self) -> u64 {
        self.answered
    }

    /// Answers the next `n` calls to `calc` from the raster and paints
    /// nothing until they are used up.  A resumed strategy retraces the
    /// classifications it made before the interrupt this way; the raster
    /// already shows everything it painted back then.
    pub fn replay(&mut self, n: u64) {
        if n > 0 {
            trace!("replaying {} pixels of {:?}", n, self.item);
        }
        self.replaying = n;
    }

    /// Is `calc` still being answered from the raster?
    pub fn replaying(&self) -> bool {
        self.replaying > 0
    }

    /// The color in the raster.
    pub fn get(&self, x: i32, y: i32) -> Color {
        self.raster.get(x, y)
    }

    /// Colors `x0..=x1` of row `y` in the raster.
    pub fn get_row(&self, y: i32, x0: i32, x1: i32) -> Vec<Color> {
        self.raster.get_row(y, x0, x1)
    }

    /// Classifies a pixel and paints it and its reflections.  This is
    /// where interrupts are noticed: a pixel is either fully painted or
    /// not touched.
    pub fn calc(&mut self, x: i32, y: i32) -> Result<Color, Halt> {
        if self.replaying > 0 {
            self.replaying -= 1;
            self.answered += 1;
            return Ok(self.raster.get(x, y));
        }
        self.tick()?;
        let color = self.pixels.classify(x, y)?;
        self.mirror.plot(&mut *self.raster, x, y, color);
        self.classified += 1;
        self.answered += 1;
        Ok(color)
    }

    /// Paints a pixel and its reflections without classifying it.
    pub fn plot(&mut self, x: i32, y: i32, color: Color) {
        if self.replaying > 0 {
            return;
        }
        self.mirror.plot(&mut *self.raster, x, y, color);
    }

    /// Paints `x0..=x1` of row `y`, and the reflections of that run.
    pub fn plot_row(&mut self, y: i32, x0: i32, x1: i32, colors: &[Color]) {
        if self.replaying > 0 {
            return;
        }
        self.mirror.plot_row(&mut *self.raster, y, x0, x1, colors);
    }

    /// Paints `x0..=x1` of row `y` in one color.
    pub fn fill_row(&mut self, y: i32, x0: i32, x1: i32, color: Color) {
        if x1 < x0 {
            return;
        }
        let colors = vec![color; (x1 - x0 + 1) as usize];
        self.plot_row(y, x0, x1, &colors);
    }

    /// Counts down to the next poll.  Strategies whose inner loops can
    /// run for long without classifying call this themselves.
    pub fn tick(&mut self) -> Result<(), Halt> {
        if self.countdown > 1 {
            self.countdown -= 1;
            return Ok(());
        }
        self.countdown = self.interval;
        if self.poll.poll() {
            Err(Halt::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Puts an item at the head of the queue, to be resumed first.
    pub fn requeue(&mut self, item: WorkItem) {
        trace!("requeueing {:?}", item);
        if !self.queue.push_front(item) {
            // The planner keeps a slot free, so this cannot happen.
            error!("no room to requeue {:?}", item);
        }
    }
}

/// Drives a render from a work queue.
pub struct Engine {
    config: Config,
    queue: WorkQueue,
    planner: SymmetryPlanner,
}

impl Engine {
    /// An engine for the whole `width` by `height` image.
    pub fn new(config: &Config, width: i32, height: i32, axes: Axes) -> Engine {
        Engine::with_item(config, WorkItem::rect(0, width - 1, 0, height - 1), axes)
    }

    /// An engine for one rectangle.
    pub fn with_item(config: &Config, item: WorkItem, axes: Axes) -> Engine {
        let mut queue = WorkQueue::new();
        queue.push(item);
        Engine::with_queue(config, queue, axes)
    }

    /// An engine picking up from a resume blob.
    pub fn resume(config: &Config, axes: Axes, blob: &[u8]) -> Result<Engine, EngineError> {
        let queue = WorkQueue::decode(blob)?;
        info!("resuming with {} work items", queue.len());
        Ok(Engine::with_queue(config, queue, axes))
    }

    fn with_queue(config: &Config, queue: WorkQueue, axes: Axes) -> Engine {
        Engine {
            config: config.clone(),
            planner: SymmetryPlanner::new(config.symmetry, axes),
            queue,
        }
    }

    /// The work still to do.
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// The configuration the engine runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs until the queue is empty or the poll says stop.
    pub fn run(
        &mut self,
        raster: &mut dyn Raster,
        pixels: &mut dyn Classify,
        poll: &mut dyn InterruptPoll,
    ) -> Result<Outcome, EngineError> {
        self.drive(raster, pixels, poll, None)
    }

    /// Like `run`, handing every item to `custom`.  Requires
    /// `Strategy::Custom`.
    pub fn run_custom(
        &mut self,
        raster: &mut dyn Raster,
        pixels: &mut dyn Classify,
        poll: &mut dyn InterruptPoll,
        custom: &mut dyn CustomEngine,
    ) -> Result<Outcome, EngineError> {
        self.drive(raster, pixels, poll, Some(custom))
    }

    fn drive(
        &mut self,
        raster: &mut dyn Raster,
        pixels: &mut dyn Classify,
        poll: &mut dyn InterruptPoll,
        mut custom: Option<&mut dyn CustomEngine>,
    ) -> Result<Outcome, EngineError> {
        self.check()?;
        if self.config.strategy == Strategy::Custom && custom.is_none() {
            return Err(EngineError::Configuration(
                "the custom strategy needs an engine to call".to_string(),
            ));
        }
        if !pixels.prepare() {
            info!("classifier drew the image itself");
            self.queue = WorkQueue::new();
            return Ok(Outcome::Complete);
        }

        let interval = self.config.poll_interval.max(1);
        let mut countdown = interval;
        let mut classified = 0;

        while let Some(mut item) = self.queue.pop() {
            let plan = self.planner.plan(&mut item, &mut self.queue);
            let charge = plan.saved / MIRROR_CHARGE_RATIO;
            countdown = (countdown as u64).saturating_sub(charge).max(1) as u32;
            debug!(
                "{:?} on {:?}, window {:?}, {} items waiting",
                self.config.strategy,
                item,
                plan.window,
                self.queue.len()
            );

            let (result, left) = {
                let mut ctx = EngineContext {
                    raster: &mut *raster,
                    pixels: &mut *pixels,
                    poll: &mut *poll,
                    queue: &mut self.queue,
                    config: &self.config,
                    mirror: plan.mirror,
                    window: plan.window,
                    item,
                    interval,
                    countdown,
                    classified,
                    replaying: 0,
                    answered: 0,
                };
                let result = match self.config.strategy {
                    Strategy::SinglePass | Strategy::TwoPass => standard::render(&mut ctx),
                    Strategy::SolidGuess => guess::render(&mut ctx),
                    Strategy::BoundaryTrace => boundary::render(&mut ctx),
                    Strategy::Tesseral => tesseral::render(&mut ctx),
                    Strategy::Diffusion => diffusion::render(&mut ctx),
                    Strategy::Custom => match custom {
                        Some(ref mut engine) => engine.render(&mut ctx),
                        None => Ok(()),
                    },
                };
                if result.is_ok() && ctx.replaying() {
                    warn!("{:?} finished with {} pixels left to replay", item, ctx.replaying);
                }
                (result, (ctx.countdown, ctx.classified))
            };
            countdown = left.0;
            classified = left.1;

            match result {
                Ok(()) => {}
                Err(Halt::Interrupted) => {
                    info!(
                        "interrupted after {} pixels, {} items left",
                        classified,
                        self.queue.len()
                    );
                    return Ok(Outcome::Interrupted(self.queue.encode()));
                }
                Err(Halt::Failed(err)) => {
                    // Start the item over next time.
                    let mut again = item;
                    again.restart();
                    if !self.queue.push_front(again) {
                        error!("no room to requeue failed {:?}", again);
                    }
                    return Err(err);
                }
            }
        }

        info!("render complete, {} pixels classified", classified);
        Ok(Outcome::Complete)
    }

    /// Preconditions that make a run pointless.
    fn check(&self) -> Result<(), EngineError> {
        if self.config.strategy != Strategy::BoundaryTrace {
            return Ok(());
        }
        if self.config.colors < 16 {
            return Err(EngineError::Configuration(format!(
                "boundary tracing needs at least 16 colors, not {}",
                self.config.colors
            )));
        }
        if self.config.inside == Inside::Color(0) || self.config.outside == Outside::Color(0) {
            return Err(EngineError::Configuration(
                "boundary tracing cannot use the background as the inside or outside color"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::FnClassifier;
    use raster::Canvas;

    struct Counting {
        items: Vec<WorkItem>,
    }

    impl CustomEngine for Counting {
        fn render(&mut self, ctx: &mut EngineContext) -> Result<(), Halt> {
            self.items.push(*ctx.item());
            let w = ctx.window();
            for y in w.y_start..=w.y_stop {
                ctx.fill_row(y, w.x_start, w.x_stop, 7);
            }
            Ok(())
        }
    }

    #[test]
    fn boundary_trace_refuses_small_palettes() {
        let config = Config {
            strategy: Strategy::BoundaryTrace,
            colors: 8,
            ..Config::default()
        };
        let mut engine = Engine::new(&config, 4, 4, Axes::default());
        let mut canvas = Canvas::new(4, 4);
        let mut pixels = FnClassifier(|_, _| 1);
        match engine.run(&mut canvas, &mut pixels, &mut Never) {
            Err(EngineError::Configuration(_)) => {}
            other => panic!("expected a configuration error, got {:?}", other),
        }
        assert!(canvas.pixels().iter().all(|&c| c == 0));
    }

    #[test]
    fn boundary_trace_refuses_background_inside() {
        let config = Config {
            strategy: Strategy::BoundaryTrace,
            inside: Inside::Color(0),
            ..Config::default()
        };
        let mut engine = Engine::new(&config, 4, 4, Axes::default());
        let mut canvas = Canvas::new(4, 4);
        let mut pixels = FnClassifier(|_, _| 1);
        assert!(engine.run(&mut canvas, &mut pixels, &mut Never).is_err());
    }

    #[test]
    fn custom_engines_get_every_item() {
        let config = Config {
            strategy: Strategy::Custom,
            ..Config::default()
        };
        let mut engine = Engine::new(&config, 5, 3, Axes::default());
        let mut canvas = Canvas::new(5, 3);
        let mut pixels = FnClassifier(|_, _| 1);
        let mut custom = Counting { items: vec![] };
        let outcome = engine
            .run_custom(&mut canvas, &mut pixels, &mut Never, &mut custom)
            .unwrap();
        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(custom.items, vec![WorkItem::rect(0, 4, 0, 2)]);
        assert!(canvas.pixels().iter().all(|&c| c == 7));
    }

    #[test]
    fn custom_strategy_without_an_engine_is_refused() {
        let config = Config {
            strategy: Strategy::Custom,
            ..Config::default()
        };
        let mut engine = Engine::new(&config, 5, 3, Axes::default());
        let mut canvas = Canvas::new(5, 3);
        let mut pixels = FnClassifier(|_, _| 1);
        assert!(engine.run(&mut canvas, &mut pixels, &mut Never).is_err());
    }

    #[test]
    fn classifiers_that_opt_out_skip_the_scheduler() {
        struct DrewItself;
        impl Classify for DrewItself {
            fn prepare(&mut self) -> bool {
                false
            }
            fn classify(&mut self, _x: i32, _y: i32) -> Result<Color, EngineError> {
                panic!("should not be asked");
            }
        }
        let mut engine = Engine::new(&Config::default(), 4, 4, Axes::default());
        let mut canvas = Canvas::new(4, 4);
        let outcome = engine.run(&mut canvas, &mut DrewItself, &mut Never).unwrap();
        assert_eq!(outcome, Outcome::Complete);
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn failures_leave_the_item_queued() {
        struct FailsAt(i32, i32);
        impl Classify for FailsAt {
            fn classify(&mut self, x: i32, y: i32) -> Result<Color, EngineError> {
                if (x, y) == (self.0, self.1) {
                    Err(EngineError::Classifier {
                        x,
                        y,
                        reason: "boom".to_string(),
                    })
                } else {
                    Ok(3)
                }
            }
        }
        let config = Config {
            strategy: Strategy::SinglePass,
            ..Config::default()
        };
        let mut engine = Engine::new(&config, 4, 4, Axes::default());
        let mut canvas = Canvas::new(4, 4);
        let result = engine.run(&mut canvas, &mut FailsAt(2, 1), &mut Never);
        assert!(result.is_err());
        assert_eq!(canvas.get(2, 1), 0);
        assert_eq!(canvas.get(1, 1), 3);
        assert_eq!(engine.queue().len(), 1);
    }

    #[test]
    fn failed_items_start_over() {
        struct FailsAt(i32, i32);
        impl Classify for FailsAt {
            fn classify(&mut self, x: i32, y: i32) -> Result<Color, EngineError> {
                if (x, y) == (self.0, self.1) {
                    Err(EngineError::Classifier {
                        x,
                        y,
                        reason: "boom".to_string(),
                    })
                } else {
                    Ok(3)
                }
            }
        }
        let config = Config {
            strategy: Strategy::SinglePass,
            ..Config::default()
        };
        let mut item = WorkItem::rect(0, 3, 0, 3);
        item.x_begin = 2;
        item.y_begin = 1;
        item.pass = 1;
        let mut engine = Engine::with_item(&config, item, Axes::default());
        let mut canvas = Canvas::new(4, 4);
        assert!(engine.run(&mut canvas, &mut FailsAt(3, 2), &mut Never).is_err());
        let head = engine.queue().iter().next().unwrap();
        assert!(head.is_fresh());
        assert_eq!((head.x_start, head.y_stop), (0, 3));
    }

    #[test]
    fn replayed_pixels_come_from_the_raster() {
        struct Retrace {
            colors: Vec<Color>,
        }
        impl CustomEngine for Retrace {
            fn render(&mut self, ctx: &mut EngineContext) -> Result<(), Halt> {
                ctx.replay(2);
                self.colors.push(ctx.calc(0, 0)?);
                ctx.fill_row(1, 0, 2, 8);
                self.colors.push(ctx.calc(1, 0)?);
                assert!(!ctx.replaying());
                self.colors.push(ctx.calc(2, 0)?);
                ctx.fill_row(2, 0, 2, 8);
                assert_eq!(ctx.answered(), 3);
                Ok(())
            }
        }
        let config = Config {
            strategy: Strategy::Custom,
            ..Config::default()
        };
        let mut canvas = Canvas::new(3, 3);
        canvas.put(0, 0, 5);
        canvas.put(1, 0, 6);
        let mut asked = 0;
        let mut retrace = Retrace { colors: vec![] };
        {
            let mut pixels = FnClassifier(|_, _| {
                asked += 1;
                9
            });
            let mut engine = Engine::new(&config, 3, 3, Axes::default());
            engine
                .run_custom(&mut canvas, &mut pixels, &mut Never, &mut retrace)
                .unwrap();
        }
        assert_eq!(asked, 1);
        assert_eq!(retrace.colors, vec![5, 6, 9]);
        assert_eq!(canvas.get_row(1, 0, 2), vec![0, 0, 0]);
        assert_eq!(canvas.get_row(2, 0, 2), vec![8, 8, 8]);
    }

    #[test]
    fn stop_after_counts_polls() {
        let mut poll = StopAfter(2);
        assert!(!poll.poll());
        assert!(!poll.poll());
        assert!(poll.poll());
        assert!(poll.poll());
    }
}
