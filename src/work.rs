//! Work items and the work queue: the whole of the engine's resumable
//! state.  Whatever is not on the queue has already been painted, and
//! whatever is on the queue has not, so writing the queue out is all it
//! takes to stop a render and pick it up again later.
//!
//! The resume blob is little-endian throughout:
//!
//! ```text
//! u32   byte length of everything after this field
//! u16   format version (1 lacks the x_begin field)
//! u16   number of work items
//! i32 x 8 per item: x_start x_stop x_begin y_start y_stop y_begin pass symmetry
//! ```

use std::collections::VecDeque;

use error::EngineError;

/// The most work items the queue will hold.
pub const MAX_WORK: usize = 24;

/// Current resume blob version.
pub const RESUME_VERSION: u16 = 2;

/// The old layout, written before items could resume mid-row.
pub const RESUME_VERSION_NO_X_BEGIN: u16 = 1;

/// A rectangle of pixels still to be computed, and where in it to
/// resume.  `x_start..=x_stop` by `y_start..=y_stop` is the whole
/// rectangle, before any symmetry halving; the `*_begin` fields, `pass`
/// and `symmetry` are interpreted by the strategy the item belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Leftmost column.
    pub x_start: i32,
    /// Rightmost column.
    pub x_stop: i32,
    /// Column to resume at, for strategies that resume at a pixel.
    pub x_begin: i32,
    /// Top row.
    pub y_start: i32,
    /// Bottom row.
    pub y_stop: i32,
    /// Row to resume at.
    pub y_begin: i32,
    /// Strategy-specific phase; 0 on an item nothing has been done to.
    pub pass: i32,
    /// Symmetry decisions already taken, see `symmetry`.
    pub symmetry: i32,
}

impl WorkItem {
    /// A fresh item covering `x_start..=x_stop` by `y_start..=y_stop`.
    pub fn rect(x_start: i32, x_stop: i32, y_start: i32, y_stop: i32) -> WorkItem {
        WorkItem {
            x_start,
            x_stop,
            x_begin: x_start,
            y_start,
            y_stop,
            y_begin: y_start,
            pass: 0,
            symmetry: 0,
        }
    }

    /// Width of the whole rectangle.
    pub fn width(&self) -> i32 {
        self.x_stop - self.x_start + 1
    }

    /// Height of the whole rectangle.
    pub fn height(&self) -> i32 {
        self.y_stop - self.y_start + 1
    }

    /// Has anything been done to this item yet?
    pub fn is_fresh(&self) -> bool {
        self.x_begin == self.x_start && self.y_begin == self.y_start && self.pass == 0
    }

    /// Forgets how far the item got.  Symmetry decisions are kept.
    pub fn restart(&mut self) {
        self.x_begin = self.x_start;
        self.y_begin = self.y_start;
        self.pass = 0;
    }
}

/// The queue of pending work.  New work goes on the back; the driver
/// pops from the front, and an interrupted item goes back on the front
/// so it is the first thing resumed.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkQueue {
    items: VecDeque<WorkItem>,
    capacity: usize,
}

impl Default for WorkQueue {
    fn default() -> Self {
        WorkQueue::with_capacity(MAX_WORK)
    }
}

impl WorkQueue {
    /// An empty queue of `MAX_WORK` items.
    pub fn new() -> WorkQueue {
        WorkQueue::default()
    }

    /// An empty queue of `capacity` items.
    pub fn with_capacity(capacity: usize) -> WorkQueue {
        WorkQueue {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Items waiting.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Is there nothing left to do?
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most items the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Is there space for `count` more items?
    pub fn has_room(&self, count: usize) -> bool {
        self.items.len() + count <= self.capacity
    }

    /// Appends an item.  A full queue refuses it and says so; callers
    /// go on without whatever split they were attempting.
    pub fn push(&mut self, item: WorkItem) -> bool {
        if !self.has_room(1) {
            warn!("work queue full, dropping split {:?}", item);
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Puts an item at the head of the queue.
    pub fn push_front(&mut self, item: WorkItem) -> bool {
        if !self.has_room(1) {
            return false;
        }
        self.items.push_front(item);
        true
    }

    /// Takes the item at the head.
    pub fn pop(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    /// The items, head first.
    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }

    /// Serializes the queue into a resume blob.
    pub fn encode(&self) -> Vec<u8> {
        let body_len = 4 + self.items.len() * 8 * 4;
        let mut blob = Vec::with_capacity(4 + body_len);
        blob.extend_from_slice(&(body_len as u32).to_le_bytes());
        blob.extend_from_slice(&RESUME_VERSION.to_le_bytes());
        blob.extend_from_slice(&(self.items.len() as u16).to_le_bytes());
        for item in &self.items {
            for field in &[
                item.x_start,
                item.x_stop,
                item.x_begin,
                item.y_start,
                item.y_stop,
                item.y_begin,
                item.pass,
                item.symmetry,
            ] {
                blob.extend_from_slice(&field.to_le_bytes());
            }
        }
        blob
    }

    /// Reads a resume blob back.  The queue is sized to hold at least
    /// what the blob carries.
    pub fn decode(blob: &[u8]) -> Result<WorkQueue, EngineError> {
        let mut reader = Reader { blob, at: 0 };
        let body_len = reader.u32()? as usize;
        if body_len != blob.len() - 4 {
            return Err(EngineError::BadResume(format!(
                "length field says {} bytes, found {}",
                body_len,
                blob.len() - 4
            )));
        }
        let version = reader.u16()?;
        let fields = match version {
            RESUME_VERSION => 8,
            RESUME_VERSION_NO_X_BEGIN => 7,
            _ => {
                return Err(EngineError::BadResume(format!(
                    "unknown version {}",
                    version
                )))
            }
        };
        let count = reader.u16()? as usize;
        if body_len != 4 + count * fields * 4 {
            return Err(EngineError::BadResume(format!(
                "{} items do not fit in {} bytes",
                count, body_len
            )));
        }

        let mut queue = WorkQueue::with_capacity(count.max(MAX_WORK));
        for _ in 0..count {
            let x_start = reader.i32()?;
            let x_stop = reader.i32()?;
            let x_begin = if fields == 8 { reader.i32()? } else { 0 };
            let item = WorkItem {
                x_start,
                x_stop,
                x_begin,
                y_start: reader.i32()?,
                y_stop: reader.i32()?,
                y_begin: reader.i32()?,
                pass: reader.i32()?,
                symmetry: reader.i32()?,
            };
            queue.items.push_back(item);
        }
        Ok(queue)
    }
}

struct Reader<'a> {
    blob: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EngineError> {
        if self.at + n > self.blob.len() {
            return Err(EngineError::BadResume("truncated".to_string()));
        }
        let bytes = &self.blob[self.at..self.at + n];
        self.at += n;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16, EngineError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, EngineError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, EngineError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Where a one- or two-pass item picks up: row, column and pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PassResume {
    /// 0 for the coarse pass of two, 1 for the fine pass or the only one.
    pub pass: i32,
    /// Row of the next pixel.
    pub row: i32,
    /// Column of the next pixel.
    pub column: i32,
}

impl PassResume {
    /// Reads the resume point out of an item.
    pub fn from_item(item: &WorkItem) -> PassResume {
        PassResume {
            pass: item.pass,
            row: item.y_begin,
            column: item.x_begin.max(item.x_start),
        }
    }

    /// Writes the resume point into an item.
    pub fn store(&self, item: &mut WorkItem) {
        item.pass = self.pass;
        item.y_begin = self.row;
        item.x_begin = self.column;
    }
}

/// Most pixels a resume point will have replayed.  Past it, the rest
/// are classified again.
pub const MAX_REPLAY: u32 = 0x7f_ffff;

/// Solid guessing resumes at a block's corner in a given pass, after
/// replaying the `done` pixels it had already classified for that
/// block.  `pass` keeps the low eight bits of its field and `done` the
/// rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GuessResume {
    /// 0 for the coarse grid, then one more for every halving.
    pub pass: i32,
    /// Row of the block's corner.
    pub row: i32,
    /// Column of the block's corner.
    pub column: i32,
    /// Pixels of the block, and of the guesses it set right, already
    /// classified.
    pub done: u32,
}

impl GuessResume {
    /// Reads the resume point out of an item.
    pub fn from_item(item: &WorkItem) -> GuessResume {
        GuessResume {
            pass: item.pass & 0xff,
            row: item.y_begin,
            column: item.x_begin.max(item.x_start),
            done: ((item.pass as u32) >> 8).min(MAX_REPLAY),
        }
    }

    /// Writes the resume point into an item.
    pub fn store(&self, item: &mut WorkItem) {
        item.pass = (self.pass & 0xff) | ((self.done.min(MAX_REPLAY) as i32) << 8);
        item.y_begin = self.row;
        item.x_begin = self.column;
    }
}

/// Boundary tracing records the scan pixel it stopped at, and how many
/// pixels of the item it had classified by then.  Resuming retraces the
/// item from its start, replaying those.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceResume {
    /// Column of the scan.
    pub column: i32,
    /// Row of the scan.
    pub row: i32,
    /// Pixels of the item already classified.
    pub done: u32,
}

impl TraceResume {
    /// Reads the resume point out of an item, if it has one.
    pub fn from_item(item: &WorkItem) -> Option<TraceResume> {
        if item.pass <= 0 {
            return None;
        }
        Some(TraceResume {
            column: item.x_begin,
            row: item.y_begin,
            done: (item.pass - 1) as u32,
        })
    }

    /// Writes the resume point into an item.
    pub fn store(&self, item: &mut WorkItem) {
        item.x_begin = self.column;
        item.y_begin = self.row;
        // One more, so an item stopped on its first pixel is not fresh.
        item.pass = self.done.min(i32::max_value() as u32 - 1) as i32 + 1;
    }
}

/// Which part of a tesseral item was being worked on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TesseralPhase {
    /// The window's own border.
    Outline,
    /// The box with this top left corner, taken off the stack.
    Box {
        /// Left edge of the box.
        x1: i32,
        /// Top edge of the box.
        y1: i32,
    },
}

/// How far a tesseral item got: the phase it stopped in, and how many
/// pixels of the item it had classified.  Resuming re-descends from the
/// whole window, replaying those, which rebuilds the same stack.  A
/// negative `pass` marks the outline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TesseralResume {
    /// Where it stopped.
    pub phase: TesseralPhase,
    /// Pixels of the item already classified.
    pub done: u32,
}

impl TesseralResume {
    /// Reads the resume point out of an item, if it has one.
    pub fn from_item(item: &WorkItem) -> Option<TesseralResume> {
        if item.pass == 0 {
            return None;
        }
        let phase = if item.pass < 0 {
            TesseralPhase::Outline
        } else {
            TesseralPhase::Box {
                x1: item.x_begin,
                y1: item.y_begin,
            }
        };
        Some(TesseralResume {
            phase,
            done: ((item.pass as i64).abs() - 1) as u32,
        })
    }

    /// Writes the resume point into an item.
    pub fn store(&self, item: &mut WorkItem) {
        let count = self.done.min(i32::max_value() as u32 - 1) as i32 + 1;
        match self.phase {
            TesseralPhase::Outline => {
                item.x_begin = item.x_start;
                item.y_begin = item.y_start;
                item.pass = -count;
            }
            TesseralPhase::Box { x1, y1 } => {
                item.x_begin = x1;
                item.y_begin = y1;
                item.pass = count;
            }
        }
    }
}

/// Diffusion resumes at its counter, split across the two begin
/// fields sixteen bits at a time.  `done` counts the pixels already
/// classified for that counter, one per tile, and rides in `pass`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiffusionResume {
    /// Position in the visiting order.
    pub counter: u32,
    /// Tiles already done at that position.
    pub done: u32,
}

impl DiffusionResume {
    /// Reads the resume point out of an item.
    pub fn from_item(item: &WorkItem) -> DiffusionResume {
        if item.pass <= 0 {
            return DiffusionResume { counter: 0, done: 0 };
        }
        let low = (item.x_begin as u32) & 0xffff;
        let high = (item.y_begin as u32) & 0xffff;
        DiffusionResume {
            counter: (high << 16) | low,
            done: (item.pass - 1) as u32,
        }
    }

    /// Writes the resume point into an item.
    pub fn store(&self, item: &mut WorkItem) {
        item.x_begin = (self.counter & 0xffff) as i32;
        item.y_begin = (self.counter >> 16) as i32;
        item.pass = self.done.min(i32::max_value() as u32 - 1) as i32 + 1;
    }
}
