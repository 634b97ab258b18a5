//! Symmetry exploitation.  Before a work item is computed the planner
//! checks whether an axis of symmetry runs through it.  If one does, the
//! part of the rectangle that has no mirror image inside it is split
//! off onto the work queue, the rest is halved, and the strategy is
//! handed a `Mirror` that paints every reflection of each pixel it
//! writes.  Reflections only ever land in the half the strategy does
//! not visit.
//!
//! The decision is recorded in the item's `symmetry` bits, so an item
//! that is interrupted and resumed is halved the same way again
//! without being re-split.

use config::Symmetry;
use raster::{Color, Raster};
use work::{WorkItem, WorkQueue};

/// Rows have been checked against the real axis.
pub const ROWS_DECIDED: i32 = 0x10;
/// Rows fold about the real axis.
pub const ROWS_FOLDED: i32 = 0x01;
/// Columns have been checked against the imaginary axis.
pub const COLUMNS_DECIDED: i32 = 0x20;
/// Columns fold about the imaginary axis.
pub const COLUMNS_FOLDED: i32 = 0x02;
/// Columns have been checked against the π period.
pub const PERIOD_DECIDED: i32 = 0x40;
/// Columns repeat every period.
pub const PERIOD_REPEATS: i32 = 0x04;

/// Where an axis falls on the pixel grid: on row (or column) `at`, or
/// halfway between `at` and `at + 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Axis {
    /// The row or column the axis is on, or just after.
    pub at: i32,
    /// Halfway between `at` and the next row or column.
    pub between: bool,
}

/// The axes of the image that sit on the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Axes {
    /// The real axis, as a row.
    pub real: Option<Axis>,
    /// The imaginary axis, as a column.
    pub imaginary: Option<Axis>,
    /// Columns per π.
    pub pi_period: Option<i32>,
}

/// The part of a work item a strategy actually visits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    /// Leftmost column.
    pub x_start: i32,
    /// Rightmost column.
    pub x_stop: i32,
    /// Top row.
    pub y_start: i32,
    /// Bottom row.
    pub y_stop: i32,
}

impl Window {
    /// The whole of an item.
    pub fn of(item: &WorkItem) -> Window {
        Window {
            x_start: item.x_start,
            x_stop: item.x_stop,
            y_start: item.y_start,
            y_stop: item.y_stop,
        }
    }

    /// Is `(x, y)` inside?
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x_start && x <= self.x_stop && y >= self.y_start && y <= self.y_stop
    }

    /// Columns in the window.
    pub fn width(&self) -> i32 {
        self.x_stop - self.x_start + 1
    }

    /// Rows in the window.
    pub fn height(&self) -> i32 {
        self.y_stop - self.y_start + 1
    }

    /// Pixels in the window.
    pub fn area(&self) -> u64 {
        (self.width().max(0) as u64) * (self.height().max(0) as u64)
    }
}

/// A reflection of `start..=stop` onto itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fold {
    sum: i32,
    half: i32,
    stop: i32,
}

impl Fold {
    fn of(start: i32, stop: i32) -> Fold {
        Fold {
            sum: start + stop,
            half: (start + stop) / 2,
            stop,
        }
    }

    /// The mirror of `v`, wherever it lands.
    pub fn mirror(&self, v: i32) -> i32 {
        self.sum - v
    }

    /// The mirror of `v` if it lands past the computed half.
    pub fn beyond(&self, v: i32) -> Option<i32> {
        let m = self.sum - v;
        if m > self.half && m <= self.stop {
            Some(m)
        } else {
            None
        }
    }
}

/// How a pixel write is replicated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mirror {
    /// Each pixel is written once.
    None,
    /// Rows are reflected about the real axis.
    XAxis(Fold),
    /// Columns are reflected about the imaginary axis.
    YAxis(Fold),
    /// Reflected both ways, four pixels a write.
    Both {
        /// The reflection of rows.
        rows: Fold,
        /// The reflection of columns.
        columns: Fold,
    },
    /// Reflected through the center, two pixels a write.
    Origin {
        /// The reflection of rows.
        rows: Fold,
        /// The reflection of columns.
        columns: Fold,
    },
    /// Columns repeat every `period` up to column `stop`.
    Pi {
        /// Columns per π.
        period: i32,
        /// Last column to copy to.
        stop: i32,
    },
}

impl Mirror {
    /// Writes a pixel and its reflections.
    pub fn plot(&self, raster: &mut dyn Raster, x: i32, y: i32, color: Color) {
        raster.put(x, y, color);
        match *self {
            Mirror::None => {}
            Mirror::XAxis(rows) => {
                if let Some(my) = rows.beyond(y) {
                    put_clipped(raster, x, my, color);
                }
            }
            Mirror::YAxis(columns) => {
                if let Some(mx) = columns.beyond(x) {
                    put_clipped(raster, mx, y, color);
                }
            }
            Mirror::Both { rows, columns } => {
                let mx = columns.beyond(x);
                let my = rows.beyond(y);
                if let Some(mx) = mx {
                    put_clipped(raster, mx, y, color);
                }
                if let Some(my) = my {
                    put_clipped(raster, x, my, color);
                    if let Some(mx) = mx {
                        put_clipped(raster, mx, my, color);
                    }
                }
            }
            Mirror::Origin { rows, columns } => {
                if let Some(my) = rows.beyond(y) {
                    put_clipped(raster, columns.mirror(x), my, color);
                }
            }
            Mirror::Pi { period, stop } => {
                let mut mx = x + period;
                while mx <= stop {
                    put_clipped(raster, mx, y, color);
                    mx += period;
                }
            }
        }
    }

    /// Writes `x0..=x1` of row `y` and its reflections.
    pub fn plot_row(&self, raster: &mut dyn Raster, y: i32, x0: i32, x1: i32, colors: &[Color]) {
        match *self {
            Mirror::None => raster.put_row(y, x0, x1, colors),
            Mirror::XAxis(rows) => {
                raster.put_row(y, x0, x1, colors);
                if let Some(my) = rows.beyond(y) {
                    if my < raster.height() {
                        raster.put_row(my, x0, x1, colors);
                    }
                }
            }
            Mirror::Pi { period, stop } => {
                raster.put_row(y, x0, x1, colors);
                let mut shift = period;
                while x0 + shift <= stop {
                    let end = (x1 + shift).min(stop);
                    raster.put_row(y, x0 + shift, end, &colors[..(end - x0 - shift + 1) as usize]);
                    shift += period;
                }
            }
            _ => {
                for (x, color) in (x0..=x1).zip(colors.iter()) {
                    self.plot(raster, x, y, *color);
                }
            }
        }
    }
}

fn put_clipped(raster: &mut dyn Raster, x: i32, y: i32, color: Color) {
    if x >= 0 && y >= 0 && x < raster.width() && y < raster.height() {
        raster.put(x, y, color);
    }
}

/// What the planner decided for one work item.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    /// What is left to compute.
    pub window: Window,
    /// How each computed pixel is replicated.
    pub mirror: Mirror,
    /// Pixels that will be painted by reflection rather than computed.
    pub saved: u64,
}

/// Decides, item by item, how much of the image can be mirrored.
#[derive(Clone, Debug)]
pub struct SymmetryPlanner {
    symmetry: Symmetry,
    axes: Axes,
}

impl SymmetryPlanner {
    /// A planner for `symmetry` on an image whose axes are `axes`.
    pub fn new(symmetry: Symmetry, axes: Axes) -> SymmetryPlanner {
        SymmetryPlanner { symmetry, axes }
    }

    /// Applies symmetry to `item`, splitting pieces without a mirror
    /// image onto `queue`.  `item` is updated in place to the
    /// rectangle that remains, with its decision bits set.
    pub fn plan(&self, item: &mut WorkItem, queue: &mut WorkQueue) -> Plan {
        let mut rows = None;
        let mut columns = None;
        let mut period = None;

        match self.symmetry {
            Symmetry::None => {}
            Symmetry::XAxis => rows = self.fold_rows(item, queue),
            Symmetry::YAxis => columns = self.fold_columns(item, queue),
            Symmetry::XYAxis => {
                rows = self.fold_rows(item, queue);
                columns = self.fold_columns(item, queue);
            }
            Symmetry::Origin => {
                // The columns must be symmetric for the point reflection
                // to stay inside the item, but only the rows are halved.
                columns = self.fold_columns(item, queue);
                if columns.is_some() {
                    rows = self.fold_rows(item, queue);
                }
            }
            Symmetry::Pi => period = self.repeat_columns(item),
        }

        let mut window = Window::of(item);
        let mirror = match (self.symmetry, rows, columns, period) {
            (_, _, _, Some(p)) => {
                window.x_stop = window.x_stop.min(window.x_start + p - 1);
                Mirror::Pi {
                    period: p,
                    stop: item.x_stop,
                }
            }
            (Symmetry::Origin, Some(rows), Some(columns), _) => {
                window.y_stop = rows.half;
                Mirror::Origin { rows, columns }
            }
            (Symmetry::Origin, _, _, _) => Mirror::None,
            (_, Some(rows), Some(columns), _) => {
                window.y_stop = rows.half;
                window.x_stop = columns.half;
                Mirror::Both { rows, columns }
            }
            (_, Some(rows), None, _) => {
                window.y_stop = rows.half;
                Mirror::XAxis(rows)
            }
            (_, None, Some(columns), _) => {
                window.x_stop = columns.half;
                Mirror::YAxis(columns)
            }
            _ => Mirror::None,
        };

        let saved = Window::of(item).area() - window.area();
        if saved > 0 {
            debug!(
                "symmetry {:?} on {:?}: computing {:?}, mirroring {} pixels",
                self.symmetry, item, window, saved
            );
        }
        Plan {
            window,
            mirror,
            saved,
        }
    }

    fn fold_rows(&self, item: &mut WorkItem, queue: &mut WorkQueue) -> Option<Fold> {
        if item.symmetry & ROWS_DECIDED != 0 {
            return if item.symmetry & ROWS_FOLDED != 0 {
                Some(Fold::of(item.y_start, item.y_stop))
            } else {
                None
            };
        }
        let fresh = item.is_fresh();
        item.symmetry |= ROWS_DECIDED;
        let axis = self.axes.real?;
        if !fresh {
            return None;
        }
        let (x_start, x_stop) = (item.x_start, item.x_stop);
        let folded = fold_span(&mut item.y_start, &mut item.y_stop, axis, |start, stop| {
            // One slot stays free for requeueing this item if it is
            // interrupted.
            queue.has_room(2) && queue.push(WorkItem::rect(x_start, x_stop, start, stop))
        });
        if !folded {
            return None;
        }
        item.y_begin = item.y_start;
        item.symmetry |= ROWS_FOLDED;
        Some(Fold::of(item.y_start, item.y_stop))
    }

    fn fold_columns(&self, item: &mut WorkItem, queue: &mut WorkQueue) -> Option<Fold> {
        if item.symmetry & COLUMNS_DECIDED != 0 {
            return if item.symmetry & COLUMNS_FOLDED != 0 {
                Some(Fold::of(item.x_start, item.x_stop))
            } else {
                None
            };
        }
        // Rows may have just been folded; that still counts as fresh.
        let fresh = item.x_begin == item.x_start && item.y_begin == item.y_start && item.pass == 0;
        item.symmetry |= COLUMNS_DECIDED;
        let axis = self.axes.imaginary?;
        if !fresh {
            return None;
        }
        let (y_start, y_stop) = (item.y_start, item.y_stop);
        let folded = fold_span(&mut item.x_start, &mut item.x_stop, axis, |start, stop| {
            queue.has_room(2) && queue.push(WorkItem::rect(start, stop, y_start, y_stop))
        });
        if !folded {
            return None;
        }
        item.x_begin = item.x_start;
        item.symmetry |= COLUMNS_FOLDED;
        Some(Fold::of(item.x_start, item.x_stop))
    }

    fn repeat_columns(&self, item: &mut WorkItem) -> Option<i32> {
        let period = self.axes.pi_period?;
        if item.symmetry & PERIOD_DECIDED == 0 {
            item.symmetry |= PERIOD_DECIDED;
            if item.is_fresh() && item.width() > period {
                item.symmetry |= PERIOD_REPEATS;
            }
        }
        if item.symmetry & PERIOD_REPEATS != 0 {
            Some(period)
        } else {
            None
        }
    }
}

/// Trims `start..=stop` to the part that is symmetric about `axis`,
/// handing the trimmed piece to `remainder`.  Fails, leaving the span
/// alone, if the axis is not strictly inside or the piece cannot be
/// queued.
fn fold_span<F>(start: &mut i32, stop: &mut i32, axis: Axis, mut remainder: F) -> bool
where
    F: FnMut(i32, i32) -> bool,
{
    let sum = 2 * axis.at + if axis.between { 1 } else { 0 };
    if axis.at < *start || axis.at >= *stop {
        return false;
    }
    let mirror_of_start = sum - *start;
    if mirror_of_start > *stop {
        let cut = sum - *stop;
        if !remainder(*start, cut - 1) {
            return false;
        }
        *start = cut;
    } else if mirror_of_start < *stop {
        if !remainder(mirror_of_start + 1, *stop) {
            return false;
        }
        *stop = mirror_of_start;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster::Canvas;

    fn on_row(at: i32) -> Axes {
        Axes {
            real: Some(Axis { at, between: false }),
            ..Axes::default()
        }
    }

    #[test]
    fn centered_axis_halves_without_splitting() {
        let planner = SymmetryPlanner::new(Symmetry::XAxis, on_row(8));
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 15, 0, 16);
        let plan = planner.plan(&mut item, &mut queue);
        assert!(queue.is_empty());
        assert_eq!(plan.window.y_stop, 8);
        assert_eq!(plan.saved, 16 * 8);
        assert_eq!(item.symmetry, ROWS_DECIDED | ROWS_FOLDED);
    }

    #[test]
    fn off_center_axis_splits_off_the_rest() {
        let planner = SymmetryPlanner::new(Symmetry::XAxis, on_row(8));
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 15, 0, 15);
        let plan = planner.plan(&mut item, &mut queue);
        // Row 0 has no mirror inside 0..=15.
        assert_eq!(queue.pop(), Some(WorkItem::rect(0, 15, 0, 0)));
        assert_eq!(item.y_start, 1);
        assert_eq!(item.y_stop, 15);
        assert_eq!(plan.window.y_start, 1);
        assert_eq!(plan.window.y_stop, 8);
    }

    #[test]
    fn full_queue_gives_up_on_the_split() {
        let planner = SymmetryPlanner::new(Symmetry::XAxis, on_row(8));
        let mut queue = WorkQueue::with_capacity(0);
        let mut item = WorkItem::rect(0, 15, 0, 15);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.mirror, Mirror::None);
        assert_eq!(plan.window, Window::of(&WorkItem::rect(0, 15, 0, 15)));
        assert_eq!(item.symmetry, ROWS_DECIDED);
    }

    #[test]
    fn axis_outside_the_item_is_ignored() {
        let planner = SymmetryPlanner::new(Symmetry::XAxis, on_row(30));
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 15, 0, 15);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.mirror, Mirror::None);
        assert_eq!(plan.saved, 0);
    }

    #[test]
    fn resumed_item_halves_the_same_way() {
        let planner = SymmetryPlanner::new(Symmetry::XAxis, on_row(8));
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 15, 0, 16);
        let first = planner.plan(&mut item, &mut queue);
        item.y_begin = 5;
        let second = planner.plan(&mut item, &mut queue);
        assert_eq!(first, second);
        assert!(queue.is_empty());
    }

    #[test]
    fn between_rows_mirrors_the_axis_row_too() {
        let axes = Axes {
            real: Some(Axis {
                at: 3,
                between: true,
            }),
            ..Axes::default()
        };
        let planner = SymmetryPlanner::new(Symmetry::XAxis, axes);
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 3, 0, 7);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.window.y_stop, 3);
        let mut canvas = Canvas::new(4, 8);
        plan.mirror.plot(&mut canvas, 1, 3, 9);
        assert_eq!(canvas.get(1, 4), 9);
        plan.mirror.plot(&mut canvas, 2, 0, 5);
        assert_eq!(canvas.get(2, 7), 5);
    }

    #[test]
    fn both_axes_write_three_reflections() {
        let axes = Axes {
            real: Some(Axis { at: 4, between: false }),
            imaginary: Some(Axis { at: 4, between: false }),
            pi_period: None,
        };
        let planner = SymmetryPlanner::new(Symmetry::XYAxis, axes);
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 8, 0, 8);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.window.x_stop, 4);
        assert_eq!(plan.window.y_stop, 4);
        let mut canvas = Canvas::new(9, 9);
        plan.mirror.plot(&mut canvas, 1, 2, 3);
        assert_eq!(canvas.get(1, 2), 3);
        assert_eq!(canvas.get(7, 2), 3);
        assert_eq!(canvas.get(1, 6), 3);
        assert_eq!(canvas.get(7, 6), 3);
        assert_eq!(canvas.pixels().iter().filter(|&&c| c == 3).count(), 4);
    }

    #[test]
    fn origin_reflects_through_the_center() {
        let axes = Axes {
            real: Some(Axis { at: 4, between: false }),
            imaginary: Some(Axis { at: 4, between: false }),
            pi_period: None,
        };
        let planner = SymmetryPlanner::new(Symmetry::Origin, axes);
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 8, 0, 8);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.window.x_stop, 8);
        assert_eq!(plan.window.y_stop, 4);
        let mut canvas = Canvas::new(9, 9);
        plan.mirror.plot(&mut canvas, 1, 2, 3);
        assert_eq!(canvas.get(7, 6), 3);
        assert_eq!(canvas.pixels().iter().filter(|&&c| c == 3).count(), 2);
    }

    #[test]
    fn pi_repeats_every_period() {
        let axes = Axes {
            pi_period: Some(3),
            ..Axes::default()
        };
        let planner = SymmetryPlanner::new(Symmetry::Pi, axes);
        let mut queue = WorkQueue::new();
        let mut item = WorkItem::rect(0, 7, 0, 1);
        let plan = planner.plan(&mut item, &mut queue);
        assert_eq!(plan.window.x_stop, 2);
        let mut canvas = Canvas::new(8, 2);
        plan.mirror.plot_row(&mut canvas, 0, 0, 2, &[1, 2, 3]);
        assert_eq!(canvas.get_row(0, 0, 7), vec![1, 2, 3, 1, 2, 3, 1, 2]);
    }
}
