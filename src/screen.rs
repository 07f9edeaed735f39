use std::collections::VecDeque;

use bitflags::bitflags;

bitflags! {
    /// Graphic rendition flags carried by every cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attr: u16 {
        const BOLD      = 1 << 0;
        const DIM       = 1 << 1;
        const ITALIC    = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK     = 1 << 4;
        const INVERSE   = 1 << 5;
        const INVISIBLE = 1 << 6;
        const STRIKE    = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Current graphic rendition: what SGR sets and what printed cells inherit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub attr: Attr,
}

/// One character cell. `width` is 1 for narrow glyphs, 2 for the leading
/// half of a wide glyph and 0 for the cell a wide glyph spills into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub pen: Pen,
    pub width: u8,
}

impl Default for Cell {
    fn default() -> Self { Cell { ch: ' ', pen: Pen::default(), width: 1 } }
}

impl Cell {
    /// Erased cell: keeps only the background of `pen` (back-color erase).
    pub fn blank(pen: Pen) -> Self {
        Cell { ch: ' ', pen: Pen { bg: pen.bg, ..Pen::default() }, width: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub y: u16,
    pub x: u16,
}

#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    cursor: Cursor,
    pen: Pen,
    pending_wrap: bool,
}

/// A scrollable pad. The last `lines` rows are the live screen; everything
/// above them is history. `tos` is the first live row, `off` the first row
/// shown to the user. Cursor coordinates are relative to `tos`.
pub struct Screen {
    rows: VecDeque<Vec<Cell>>,
    lines: u16,
    cols: u16,
    scrollback: usize,
    off: usize,
    pub cursor: Cursor,
    pub pen: Pen,
    pub pending_wrap: bool,
    pub cursor_visible: bool,
    saved: Option<SavedCursor>,
    top: u16,
    bottom: u16,
}

impl Screen {
    /// Primary screen: `max(lines, scrollback)` rows tall.
    pub fn primary(lines: u16, cols: u16, scrollback: usize) -> Self { Self::with_pad(lines, cols, scrollback) }

    /// Alternate screen: exactly `lines` rows, no history.
    pub fn alternate(lines: u16, cols: u16) -> Self { Self::with_pad(lines, cols, 0) }

    fn with_pad(lines: u16, cols: u16, scrollback: usize) -> Self {
        let lines = lines.max(1);
        let cols = cols.max(1);
        let height = (lines as usize).max(scrollback);
        let rows = (0..height).map(|_| vec![Cell::default(); cols as usize]).collect::<VecDeque<_>>();
        Screen {
            rows,
            lines,
            cols,
            scrollback,
            off: height - lines as usize,
            cursor: Cursor::default(),
            pen: Pen::default(),
            pending_wrap: false,
            cursor_visible: true,
            saved: None,
            top: 0,
            bottom: lines - 1,
        }
    }

    pub fn lines(&self) -> u16 { self.lines }
    pub fn cols(&self) -> u16 { self.cols }
    pub fn pad_height(&self) -> usize { self.rows.len() }
    pub fn tos(&self) -> usize { self.pad_height() - self.lines as usize }
    pub fn off(&self) -> usize { self.off }
    pub fn at_bottom(&self) -> bool { self.off == self.tos() }
    pub fn region(&self) -> (u16, u16) { (self.top, self.bottom) }

    /// Row `r` of what the user currently sees (history when scrolled back).
    pub fn visible_row(&self, r: u16) -> Option<&[Cell]> {
        self.rows.get(self.off + r as usize).map(|row| row.as_slice())
    }

    pub fn live_row(&self, y: u16) -> &[Cell] { &self.rows[self.tos() + y as usize] }

    fn live_row_mut(&mut self, y: u16) -> &mut Vec<Cell> {
        let tos = self.tos();
        &mut self.rows[tos + y as usize]
    }

    fn blank_row(&self) -> Vec<Cell> { vec![Cell::blank(self.pen); self.cols as usize] }

    /// Move the view by `delta` rows (negative is into history), clamped to `[0, tos]`.
    pub fn scroll_view(&mut self, delta: isize) {
        let tos = self.tos() as isize;
        self.off = (self.off as isize + delta).clamp(0, tos) as usize;
    }

    pub fn scroll_to_bottom(&mut self) { self.off = self.tos(); }

    pub fn move_to(&mut self, y: u16, x: u16) {
        self.cursor = Cursor { y: y.min(self.lines - 1), x: x.min(self.cols - 1) };
        self.pending_wrap = false;
    }

    pub fn set_region(&mut self, top: u16, bottom: u16) {
        if top < bottom && bottom < self.lines {
            self.top = top;
            self.bottom = bottom;
        } else {
            self.top = 0;
            self.bottom = self.lines - 1;
        }
    }

    fn full_region(&self) -> bool { self.top == 0 && self.bottom == self.lines - 1 }

    /// Put one glyph at the cursor, honouring deferred wrap.
    pub fn print(&mut self, ch: char, width: u16, insert: bool, autowrap: bool) {
        if width == 0 || width > self.cols { return; }
        if self.pending_wrap && autowrap {
            self.cursor.x = 0;
            self.index();
        }
        self.pending_wrap = false;
        if self.cursor.x + width > self.cols {
            if autowrap {
                self.cursor.x = 0;
                self.index();
            } else {
                self.cursor.x = self.cols - width;
            }
        }
        if insert { self.insert_chars(width); }
        let Cursor { y, x } = self.cursor;
        let pen = self.pen;
        let row = self.live_row_mut(y);
        clear_wide_at(row, x as usize, pen);
        clear_wide_at(row, (x + width - 1) as usize, pen);
        row[x as usize] = Cell { ch, pen, width: width as u8 };
        if width == 2 {
            row[x as usize + 1] = Cell { ch: ' ', pen, width: 0 };
        }
        if x + width >= self.cols {
            self.pending_wrap = true;
        } else {
            self.cursor.x += width;
        }
    }

    /// Cursor down one line, scrolling the region when on its bottom row.
    pub fn index(&mut self) {
        if self.cursor.y == self.bottom {
            self.scroll_up(1);
        } else if self.cursor.y < self.lines - 1 {
            self.cursor.y += 1;
        }
    }

    pub fn reverse_index(&mut self) {
        if self.cursor.y == self.top {
            self.scroll_down(1);
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
    }

    /// Scroll the region up. With a full-screen region the top line moves
    /// into history instead of being discarded.
    pub fn scroll_up(&mut self, n: u16) {
        let n = n.min(self.bottom - self.top + 1);
        for _ in 0..n {
            let blank = self.blank_row();
            if self.full_region() {
                self.rows.pop_front();
                self.rows.push_back(blank);
                if self.off < self.tos() {
                    self.off = self.off.saturating_sub(1);
                }
            } else {
                let tos = self.tos();
                self.rows.remove(tos + self.top as usize);
                self.rows.insert(tos + self.bottom as usize, blank);
            }
        }
    }

    pub fn scroll_down(&mut self, n: u16) {
        let n = n.min(self.bottom - self.top + 1);
        let tos = self.tos();
        for _ in 0..n {
            let blank = self.blank_row();
            self.rows.remove(tos + self.bottom as usize);
            self.rows.insert(tos + self.top as usize, blank);
        }
    }

    pub fn insert_lines(&mut self, n: u16) {
        let y = self.cursor.y;
        if y < self.top || y > self.bottom { return; }
        let tos = self.tos();
        for _ in 0..n.min(self.bottom - y + 1) {
            let blank = self.blank_row();
            self.rows.remove(tos + self.bottom as usize);
            self.rows.insert(tos + y as usize, blank);
        }
        self.pending_wrap = false;
    }

    pub fn delete_lines(&mut self, n: u16) {
        let y = self.cursor.y;
        if y < self.top || y > self.bottom { return; }
        let tos = self.tos();
        for _ in 0..n.min(self.bottom - y + 1) {
            let blank = self.blank_row();
            self.rows.remove(tos + y as usize);
            self.rows.insert(tos + self.bottom as usize, blank);
        }
        self.pending_wrap = false;
    }

    pub fn insert_chars(&mut self, n: u16) {
        let Cursor { y, x } = self.cursor;
        let cols = self.cols as usize;
        let blank = Cell::blank(self.pen);
        let row = self.live_row_mut(y);
        let n = (n as usize).min(cols - x as usize);
        for _ in 0..n {
            row.insert(x as usize, blank);
        }
        row.truncate(cols);
        if row[cols - 1].width == 2 {
            row[cols - 1] = blank;
        }
    }

    pub fn delete_chars(&mut self, n: u16) {
        let Cursor { y, x } = self.cursor;
        let cols = self.cols as usize;
        let blank = Cell::blank(self.pen);
        let row = self.live_row_mut(y);
        let n = (n as usize).min(cols - x as usize);
        row.drain(x as usize..x as usize + n);
        row.resize(cols, blank);
        if row[x as usize].width == 0 {
            row[x as usize] = blank;
        }
        self.pending_wrap = false;
    }

    pub fn erase_chars(&mut self, n: u16) {
        let Cursor { y, x } = self.cursor;
        let end = (x as usize + n.max(1) as usize).min(self.cols as usize);
        self.erase_span(y, x as usize, end);
    }

    fn erase_span(&mut self, y: u16, from: usize, to: usize) {
        let blank = Cell::blank(self.pen);
        let row = self.live_row_mut(y);
        if from < to {
            clear_wide_at(row, from, blank.pen);
            clear_wide_at(row, to - 1, blank.pen);
        }
        for cell in &mut row[from..to] {
            *cell = blank;
        }
    }

    /// EL: 0 cursor to end, 1 start to cursor, 2 whole line.
    pub fn erase_line(&mut self, mode: u16) {
        let Cursor { y, x } = self.cursor;
        let cols = self.cols as usize;
        match mode {
            0 => self.erase_span(y, x as usize, cols),
            1 => self.erase_span(y, 0, x as usize + 1),
            2 => self.erase_span(y, 0, cols),
            _ => {}
        }
    }

    /// ED: 0 cursor to end, 1 start to cursor, 2 whole screen, 3 history too.
    pub fn erase_display(&mut self, mode: u16) {
        let y = self.cursor.y;
        let cols = self.cols as usize;
        match mode {
            0 => {
                self.erase_line(0);
                for r in y + 1..self.lines { self.erase_span(r, 0, cols); }
            }
            1 => {
                for r in 0..y { self.erase_span(r, 0, cols); }
                self.erase_line(1);
            }
            2 => {
                for r in 0..self.lines { self.erase_span(r, 0, cols); }
            }
            3 => {
                let tos = self.tos();
                for row in self.rows.iter_mut().take(tos) {
                    row.fill(Cell::default());
                }
                self.off = tos;
            }
            _ => {}
        }
    }

    pub fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor { cursor: self.cursor, pen: self.pen, pending_wrap: self.pending_wrap });
    }

    pub fn restore_cursor(&mut self) {
        match self.saved {
            Some(s) => {
                self.move_to(s.cursor.y, s.cursor.x);
                self.pen = s.pen;
                self.pending_wrap = s.pending_wrap;
            }
            None => {
                self.move_to(0, 0);
                self.pen = Pen::default();
            }
        }
    }

    /// Clear the live screen and reset rendition, region and cursor state.
    pub fn reset(&mut self) {
        self.pen = Pen::default();
        for r in 0..self.lines {
            let blank = self.blank_row();
            *self.live_row_mut(r) = blank;
        }
        self.move_to(0, 0);
        self.cursor_visible = true;
        self.saved = None;
        self.set_region(0, self.lines - 1);
        self.off = self.tos();
    }

    /// Fill the live screen with `E` (DECALN).
    pub fn fill_alignment(&mut self) {
        for r in 0..self.lines {
            for cell in self.live_row_mut(r).iter_mut() {
                *cell = Cell { ch: 'E', ..Cell::default() };
            }
        }
        self.move_to(0, 0);
    }

    /// Change the live size. When shrinking, the top line stays put unless
    /// the cursor would fall off the bottom, in which case just enough top
    /// lines move into history. When growing, the top line stays put and
    /// blank lines appear at the bottom.
    pub fn resize(&mut self, lines: u16, cols: u16) {
        let lines = lines.max(1);
        let cols = cols.max(1);
        if lines == self.lines && cols == self.cols { return; }
        let old_tos = self.tos();
        let top = if lines < self.lines {
            old_tos + (self.cursor.y as usize).saturating_sub(lines as usize - 1)
        } else {
            old_tos
        };
        let height = (lines as usize).max(self.scrollback);
        let history = height - lines as usize;
        let hist_start = top.saturating_sub(history);
        let mut rows = VecDeque::with_capacity(height);
        for _ in 0..history - (top - hist_start) {
            rows.push_back(vec![Cell::default(); cols as usize]);
        }
        for i in hist_start..top + lines as usize {
            let mut row = self.rows.get(i).cloned().unwrap_or_default();
            row.resize(cols as usize, Cell::default());
            if row[cols as usize - 1].width == 2 {
                row[cols as usize - 1] = Cell::default();
            }
            rows.push_back(row);
        }
        self.rows = rows;
        let y = (self.cursor.y as usize + old_tos - top).min(lines as usize - 1) as u16;
        self.lines = lines;
        self.cols = cols;
        self.move_to(y, self.cursor.x);
        if let Some(saved) = self.saved.as_mut() {
            saved.cursor.y = saved.cursor.y.min(lines - 1);
            saved.cursor.x = saved.cursor.x.min(cols - 1);
        }
        self.top = 0;
        self.bottom = lines - 1;
        self.off = self.tos();
    }

    #[cfg(test)]
    pub fn live_text(&self, y: u16) -> String {
        self.live_row(y).iter().filter(|c| c.width != 0).map(|c| c.ch).collect::<String>().trim_end().to_string()
    }
}

/// Overwriting half of a wide glyph blanks the other half.
fn clear_wide_at(row: &mut [Cell], x: usize, pen: Pen) {
    match row.get(x).map(|c| c.width) {
        Some(0) if x > 0 => row[x - 1] = Cell::blank(pen),
        Some(2) if x + 1 < row.len() => row[x + 1] = Cell::blank(pen),
        _ => {}
    }
}
