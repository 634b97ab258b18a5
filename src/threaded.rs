//! Rendering on several threads.  The image is cut into horizontal
//! bands, one work item each, and a pool of threads takes bands off a
//! shared iterator and runs an ordinary engine on each one with its own
//! classifier and its own canvas.  The canvases are stitched together
//! at the end, and whatever the bands left unfinished is gathered into
//! a single resume blob that a plain `Engine::resume` can pick up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam;
use crossbeam::thread::ScopedJoinHandle;
use num_cpus;

use classify::Classify;
use config::Config;
use engine::{Engine, InterruptPoll, Outcome};
use error::EngineError;
use raster::Canvas;
use symmetry::Axes;
use work::{WorkItem, WorkQueue, MAX_WORK};

/// Bands cut per thread, so that threads finishing early have more to
/// take.
const BANDS_PER_THREAD: usize = 4;

/// Stops when a shared flag is raised.
pub struct StopFlag<'a>(pub &'a AtomicBool);

impl<'a> InterruptPoll for StopFlag<'a> {
    fn poll(&mut self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A finished band.
struct Band {
    canvas: Canvas,
    result: Result<Outcome, EngineError>,
}

/// Renders one image on a pool of threads.
pub struct Threaded {
    config: Config,
    axes: Axes,
    width: i32,
    height: i32,
    threads: usize,
}

impl Threaded {
    /// One thread per CPU.
    pub fn new(config: &Config, width: i32, height: i32, axes: Axes) -> Threaded {
        Threaded {
            config: config.clone(),
            axes,
            width,
            height,
            threads: num_cpus::get(),
        }
    }

    /// Uses `threads` threads, at least one.
    pub fn with_threads(mut self, threads: usize) -> Threaded {
        self.threads = threads.max(1);
        self
    }

    /// Threads a render will use.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The work items the image is cut into, top to bottom.
    fn bands(&self) -> Vec<WorkItem> {
        let height = self.height.max(1);
        let count = (self.threads * BANDS_PER_THREAD).min(height as usize).max(1) as i32;
        let rows = (height + count - 1) / count;
        (0..count)
            .map(|i| i * rows)
            .take_while(|&top| top < height)
            .map(|top| WorkItem::rect(0, self.width - 1, top, (top + rows - 1).min(height - 1)))
            .collect()
    }

    /// Renders the image.  Raising `stop` interrupts every band; the
    /// canvas then holds what was painted and the outcome carries the
    /// rest of the work.
    pub fn render<C, F>(&self, factory: F, stop: &AtomicBool) -> Result<(Canvas, Outcome), EngineError>
    where
        C: Classify,
        F: Fn() -> C + Sync,
    {
        let bands = self.bands();
        info!(
            "rendering {} bands on {} threads",
            bands.len(),
            self.threads
        );
        let work = Arc::new(Mutex::new(bands.into_iter()));
        let factory = &factory;

        let finished: Vec<Vec<Band>> = crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<Vec<Band>>> = (0..self.threads)
                .map(|_| {
                    let work = work.clone();
                    spawner.spawn(move |_| {
                        let mut done = vec![];
                        loop {
                            let item = match work.lock() {
                                Ok(mut bands) => bands.next(),
                                Err(_) => None,
                            };
                            match item {
                                Some(item) => done.push(self.render_band(item, factory(), stop)),
                                None => break,
                            }
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| EngineError::Worker("render thread panicked".to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .map_err(|_| EngineError::Worker("render threads panicked".to_string()))??;

        let mut canvas = Canvas::new(self.width, self.height);
        let mut leftover = Vec::new();
        for band in finished.into_iter().flatten() {
            canvas.merge(&band.canvas);
            if let Outcome::Interrupted(blob) = band.result? {
                leftover.extend(WorkQueue::decode(&blob)?.iter().cloned());
            }
        }
        if leftover.is_empty() {
            return Ok((canvas, Outcome::Complete));
        }

        leftover.sort_by_key(|item| (item.y_start, item.x_start));
        let mut queue = WorkQueue::with_capacity(leftover.len().max(MAX_WORK));
        for item in leftover {
            queue.push(item);
        }
        info!("interrupted with {} work items left", queue.len());
        Ok((canvas, Outcome::Interrupted(queue.encode())))
    }

    fn render_band<C: Classify>(&self, item: WorkItem, mut pixels: C, stop: &AtomicBool) -> Band {
        let mut canvas = Canvas::band(self.width, self.height, item.y_start, item.y_stop);
        if stop.load(Ordering::Relaxed) {
            let mut queue = WorkQueue::new();
            queue.push(item);
            return Band {
                canvas,
                result: Ok(Outcome::Interrupted(queue.encode())),
            };
        }

        debug!("band {}..={} starting", item.y_start, item.y_stop);
        let mut engine = Engine::with_item(&self.config, item, self.axes);
        let result = engine.run(&mut canvas, &mut pixels, &mut StopFlag(stop));
        if result.is_err() {
            stop.store(true, Ordering::Relaxed);
        }
        Band { canvas, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::FnClassifier;
    use config::Strategy;
    use engine::Never;
    use raster::{Color, Raster};

    fn rings(x: i32, y: i32) -> Color {
        let (dx, dy) = (x - 30, y - 20);
        1 + ((dx * dx + dy * dy) / 40 % 6) as Color
    }

    fn tiles(x: i32, y: i32) -> Color {
        1 + ((x / 16 + y / 16) % 2) as Color
    }

    #[test]
    fn bands_cover_every_row_once() {
        let threaded = Threaded::new(&Config::default(), 10, 37, Axes::default()).with_threads(3);
        let bands = threaded.bands();
        assert_eq!(bands[0].y_start, 0);
        assert_eq!(bands.last().map(|b| b.y_stop), Some(36));
        for pair in bands.windows(2) {
            assert_eq!(pair[0].y_stop + 1, pair[1].y_start);
        }
    }

    #[test]
    fn threads_paint_what_one_thread_paints() {
        let config = Config {
            strategy: Strategy::SolidGuess,
            ..Config::default()
        };
        let mut alone = Canvas::new(60, 40);
        Engine::new(&config, 60, 40, Axes::default())
            .run(&mut alone, &mut FnClassifier(tiles), &mut Never)
            .unwrap();

        let stop = AtomicBool::new(false);
        let (canvas, outcome) = Threaded::new(&config, 60, 40, Axes::default())
            .with_threads(3)
            .render(|| FnClassifier(tiles), &stop)
            .unwrap();
        assert_eq!(outcome, Outcome::Complete);
        for y in 0..40 {
            assert_eq!(canvas.get_row(y, 0, 59), alone.get_row(y, 0, 59));
        }
    }

    #[test]
    fn stopped_renders_resume_on_one_thread() {
        let config = Config {
            strategy: Strategy::SinglePass,
            ..Config::default()
        };
        let stop = AtomicBool::new(true);
        let (mut canvas, outcome) = Threaded::new(&config, 20, 12, Axes::default())
            .with_threads(2)
            .render(|| FnClassifier(rings), &stop)
            .unwrap();
        let blob = match outcome {
            Outcome::Interrupted(blob) => blob,
            Outcome::Complete => panic!("nothing should have run"),
        };
        assert!(canvas.pixels().iter().all(|&c| c == 0));

        let mut engine = Engine::resume(&config, Axes::default(), &blob).unwrap();
        let outcome = engine
            .run(&mut canvas, &mut FnClassifier(rings), &mut Never)
            .unwrap();
        assert_eq!(outcome, Outcome::Complete);
        for y in 0..12 {
            for x in 0..20 {
                assert_eq!(canvas.get(x, y), rings(x, y));
            }
        }
    }
}
