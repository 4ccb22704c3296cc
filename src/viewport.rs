//! Scrollable record buffer
//!
//! Holds every decoded record for the life of the process and tracks which
//! rendered lines are visible. Line counts come from a [`RecordLayout`] so the
//! arithmetic here stays independent of how records are drawn.
//!
//! Invariant after every operation: `0 <= offset <= max_offset`, and when
//! follow mode is on `offset == max_offset`.

use crate::record::DisplayRecord;
use std::ops::Range;

/// Measures how many rendered lines a record occupies at a given width.
pub trait RecordLayout {
    fn line_count(&self, record: &DisplayRecord, width: u16) -> usize;
}

/// Largest valid scroll offset for `total` rendered lines in a window of `height`.
pub fn max_offset(total: usize, height: usize) -> usize {
    total.saturating_sub(height)
}

pub struct Viewport<L> {
    layout: L,
    records: Vec<DisplayRecord>,
    line_counts: Vec<usize>,
    total_lines: usize,
    offset: usize,
    follow: bool,
    width: u16,
    height: usize,
}

impl<L: RecordLayout> Viewport<L> {
    pub fn new(layout: L, width: u16, height: usize) -> Self {
        Self {
            layout,
            records: Vec::new(),
            line_counts: Vec::new(),
            total_lines: 0,
            offset: 0,
            follow: true,
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// Largest valid offset for a window of `height` lines.
    pub fn max_offset(&self, height: usize) -> usize {
        max_offset(self.total_lines, height)
    }

    /// Append records in order. In follow mode the view is pinned to the bottom.
    pub fn append(&mut self, records: impl IntoIterator<Item = DisplayRecord>) {
        for record in records {
            let lines = self.layout.line_count(&record, self.width);
            self.total_lines += lines;
            self.line_counts.push(lines);
            self.records.push(record);
        }
        self.settle();
    }

    /// Move by `delta` lines (negative is up).
    ///
    /// Scrolling up from anywhere but the top leaves follow mode; scrolling
    /// down onto the last line re-enters it.
    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.max_offset(self.height);
        if delta < 0 {
            if self.offset > 0 {
                self.follow = false;
            }
            self.offset = self.offset.saturating_sub(delta.unsigned_abs());
        } else if delta > 0 {
            self.offset = self.offset.saturating_add(delta.unsigned_abs()).min(max);
            if self.offset == max {
                self.follow = true;
            }
        }
        self.settle();
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(self.height.max(1) as isize));
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.height.max(1) as isize);
    }

    pub fn jump_to_top(&mut self) {
        self.offset = 0;
        self.follow = false;
        self.settle();
    }

    pub fn jump_to_bottom(&mut self) {
        self.follow = true;
        self.settle();
    }

    pub fn toggle_follow(&mut self) {
        self.follow = !self.follow;
        self.settle();
    }

    /// Re-measure every record for a new window size.
    pub fn resize(&mut self, width: u16, height: usize) {
        if width != self.width {
            self.width = width;
            self.line_counts = self
                .records
                .iter()
                .map(|record| self.layout.line_count(record, width))
                .collect();
            self.total_lines = self.line_counts.iter().sum();
        }
        self.height = height;
        self.settle();
    }

    /// `[start, end)` range of rendered lines currently on screen.
    pub fn visible_lines(&self) -> Range<usize> {
        let end = (self.offset + self.height).min(self.total_lines);
        self.offset.min(end)..end
    }

    /// Records overlapping the visible window, each with its first line index.
    pub fn visible_records(&self) -> impl Iterator<Item = (usize, &DisplayRecord)> {
        let window = self.visible_lines();
        let mut start = 0;
        self.records
            .iter()
            .zip(&self.line_counts)
            .filter_map(move |(record, &lines)| {
                let first = start;
                start += lines;
                (first < window.end && first + lines > window.start).then_some((first, record))
            })
    }

    fn settle(&mut self) {
        let max = self.max_offset(self.height);
        if self.follow {
            self.offset = max;
        } else {
            self.offset = self.offset.min(max);
        }
    }
}
