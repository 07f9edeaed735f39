use unicode_width::UnicodeWidthChar;
use vte::{Params, Perform};

use crate::screen::{Attr, Color, Pen, Screen};

/// Longest title accepted from OSC 0/2.
const MAX_TITLE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Charset {
    #[default]
    Ascii,
    Graphics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    /// Line feed also returns the carriage (and Enter sends CR LF).
    pub lnm: bool,
    /// Cursor keys in application mode (`ESC O` prefix).
    pub pnm: bool,
    pub insert: bool,
    pub origin: bool,
    pub autowrap: bool,
}

impl Default for Modes {
    fn default() -> Self { Modes { lnm: false, pnm: false, insert: false, origin: false, autowrap: true } }
}

/// Per-pane terminal state driven by the `vte` state machine: the screen
/// pair, tab stops and the mode flags the key dispatcher consults.
pub struct VirtualTerminal {
    pub primary: Screen,
    pub alternate: Screen,
    pub alt_active: bool,
    pub tabs: Vec<bool>,
    pub modes: Modes,
    tabstop: usize,
    charsets: [Charset; 2],
    shift: usize,
    last_printed: Option<char>,
    replies: Vec<u8>,
    title: Option<String>,
    bell: bool,
}

/// Tab stops for `cols` columns: existing stops are kept, new columns get a
/// stop every `tabstop` columns.
pub fn rebuild_tabs(old: &[bool], cols: usize, tabstop: usize) -> Vec<bool> {
    (0..cols).map(|i| old.get(i).copied().unwrap_or(tabstop > 0 && i % tabstop == 0)).collect()
}

impl VirtualTerminal {
    pub fn new(lines: u16, cols: u16, scrollback: usize, tabstop: usize) -> Self {
        VirtualTerminal {
            primary: Screen::primary(lines, cols, scrollback),
            alternate: Screen::alternate(lines, cols),
            alt_active: false,
            tabs: rebuild_tabs(&[], cols.max(1) as usize, tabstop),
            modes: Modes::default(),
            tabstop,
            charsets: [Charset::Ascii; 2],
            shift: 0,
            last_printed: None,
            replies: Vec::new(),
            title: None,
            bell: false,
        }
    }

    pub fn screen(&self) -> &Screen { if self.alt_active { &self.alternate } else { &self.primary } }

    pub fn screen_mut(&mut self) -> &mut Screen { if self.alt_active { &mut self.alternate } else { &mut self.primary } }

    pub fn resize(&mut self, lines: u16, cols: u16, tabstop: usize) {
        self.primary.resize(lines, cols);
        self.alternate.resize(lines, cols);
        self.tabstop = tabstop;
        self.tabs = rebuild_tabs(&self.tabs, self.primary.cols() as usize, tabstop);
    }

    /// Bytes the terminal owes the child (DSR, DA, ENQ answers).
    pub fn take_replies(&mut self) -> Vec<u8> { std::mem::take(&mut self.replies) }

    pub fn take_title(&mut self) -> Option<String> { self.title.take() }

    pub fn take_bell(&mut self) -> bool { std::mem::take(&mut self.bell) }

    fn set_alternate(&mut self, on: bool) {
        if on == self.alt_active { return; }
        let (cursor, pen) = (self.screen().cursor, self.screen().pen);
        self.alt_active = on;
        let s = self.screen_mut();
        s.move_to(cursor.y, cursor.x);
        s.pen = pen;
    }

    fn reset(&mut self) {
        self.alt_active = false;
        self.primary.reset();
        self.alternate.reset();
        self.modes = Modes::default();
        self.charsets = [Charset::Ascii; 2];
        self.shift = 0;
        self.last_printed = None;
        self.tabs = rebuild_tabs(&[], self.tabs.len(), self.tabstop);
    }

    fn goto(&mut self, y: u16, x: u16) {
        let origin = self.modes.origin;
        let s = self.screen_mut();
        let (top, bottom) = s.region();
        let y = if origin { y.saturating_add(top).min(bottom) } else { y };
        s.move_to(y, x);
    }

    fn cursor_up(&mut self, n: u16) {
        let s = self.screen_mut();
        let (top, _) = s.region();
        let floor = if s.cursor.y >= top { top } else { 0 };
        let y = s.cursor.y.saturating_sub(n).max(floor);
        s.move_to(y, s.cursor.x);
    }

    fn cursor_down(&mut self, n: u16) {
        let s = self.screen_mut();
        let (_, bottom) = s.region();
        let ceil = if s.cursor.y <= bottom { bottom } else { s.lines() - 1 };
        let y = s.cursor.y.saturating_add(n).min(ceil);
        s.move_to(y, s.cursor.x);
    }

    fn tab_forward(&mut self, n: u16) {
        let s = if self.alt_active { &mut self.alternate } else { &mut self.primary };
        let last = s.cols() - 1;
        let mut x = s.cursor.x;
        for _ in 0..n {
            x = (x + 1..=last).find(|&c| self.tabs.get(c as usize).copied().unwrap_or(false)).unwrap_or(last);
        }
        s.move_to(s.cursor.y, x);
    }

    fn tab_backward(&mut self, n: u16) {
        let s = if self.alt_active { &mut self.alternate } else { &mut self.primary };
        let mut x = s.cursor.x;
        for _ in 0..n {
            x = (0..x).rev().find(|&c| self.tabs.get(c as usize).copied().unwrap_or(false)).unwrap_or(0);
        }
        s.move_to(s.cursor.y, x);
    }

    fn set_mode(&mut self, params: &Params, private: bool, on: bool) {
        for p in params.iter() {
            let Some(&code) = p.first() else { continue };
            match (private, code) {
                (false, 4) => self.modes.insert = on,
                (false, 20) => self.modes.lnm = on,
                (true, 1) => self.modes.pnm = on,
                (true, 6) => {
                    self.modes.origin = on;
                    self.goto(0, 0);
                }
                (true, 7) => self.modes.autowrap = on,
                (true, 25) => self.screen_mut().cursor_visible = on,
                (true, 47) | (true, 1047) => self.set_alternate(on),
                (true, 1048) => {
                    if on { self.screen_mut().save_cursor() } else { self.screen_mut().restore_cursor() }
                }
                (true, 1049) => {
                    if on {
                        self.primary.save_cursor();
                        self.set_alternate(true);
                        self.alternate.erase_display(2);
                    } else {
                        self.set_alternate(false);
                        self.primary.restore_cursor();
                    }
                }
                _ => {}
            }
        }
    }

    fn sgr(&mut self, params: &Params) {
        let groups: Vec<&[u16]> = params.iter().collect();
        let pen = &mut self.screen_mut().pen;
        if groups.is_empty() {
            *pen = Pen::default();
            return;
        }
        let mut i = 0;
        while i < groups.len() {
            let g = groups[i];
            let code = g.first().copied().unwrap_or(0);
            match code {
                0 => *pen = Pen::default(),
                1 => pen.attr.insert(Attr::BOLD),
                2 => pen.attr.insert(Attr::DIM),
                3 => pen.attr.insert(Attr::ITALIC),
                4 => pen.attr.insert(Attr::UNDERLINE),
                5 | 6 => pen.attr.insert(Attr::BLINK),
                7 => pen.attr.insert(Attr::INVERSE),
                8 => pen.attr.insert(Attr::INVISIBLE),
                9 => pen.attr.insert(Attr::STRIKE),
                21 | 22 => pen.attr.remove(Attr::BOLD | Attr::DIM),
                23 => pen.attr.remove(Attr::ITALIC),
                24 => pen.attr.remove(Attr::UNDERLINE),
                25 => pen.attr.remove(Attr::BLINK),
                27 => pen.attr.remove(Attr::INVERSE),
                28 => pen.attr.remove(Attr::INVISIBLE),
                29 => pen.attr.remove(Attr::STRIKE),
                30..=37 => pen.fg = Color::Indexed((code - 30) as u8),
                39 => pen.fg = Color::Default,
                40..=47 => pen.bg = Color::Indexed((code - 40) as u8),
                49 => pen.bg = Color::Default,
                90..=97 => pen.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => pen.bg = Color::Indexed((code - 100 + 8) as u8),
                38 | 48 => {
                    let color = if g.len() > 1 {
                        extended_color(&g[1..], true).0
                    } else {
                        let rest: Vec<u16> = groups[i + 1..].iter().map(|p| p.first().copied().unwrap_or(0)).collect();
                        let (color, used) = extended_color(&rest, false);
                        i += used;
                        color
                    };
                    if let Some(c) = color {
                        if code == 38 { pen.fg = c } else { pen.bg = c }
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn report(&mut self, what: u16) {
        match what {
            5 => self.replies.extend_from_slice(b"\x1b[0n"),
            6 => {
                let c = self.screen().cursor;
                self.replies.extend_from_slice(format!("\x1b[{};{}R", c.y + 1, c.x + 1).as_bytes());
            }
            _ => {}
        }
    }
}

/// Decode the arguments after a 38/48: `5;n` or `2;r;g;b`. Colon forms may
/// carry a colour-space id before the components. Returns the colour and
/// how many arguments were consumed.
fn extended_color(args: &[u16], colon: bool) -> (Option<Color>, usize) {
    match args.first() {
        Some(5) => (args.get(1).map(|&n| Color::Indexed(n as u8)), args.len().min(2)),
        Some(2) => {
            let rgb = if colon && args.len() >= 5 { &args[2..5] } else if args.len() >= 4 { &args[1..4] } else { return (None, args.len()) };
            (Some(Color::Rgb(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8)), 4)
        }
        _ => (None, 0),
    }
}

/// DEC special graphics for the `0` character set.
fn dec_graphics(c: char) -> char {
    match c {
        '`' => '◆', 'a' => '▒', 'b' => '␉', 'c' => '␌', 'd' => '␍', 'e' => '␊',
        'f' => '°', 'g' => '±', 'h' => '␤', 'i' => '␋', 'j' => '┘', 'k' => '┐',
        'l' => '┌', 'm' => '└', 'n' => '┼', 'o' => '⎺', 'p' => '⎻', 'q' => '─',
        'r' => '⎼', 's' => '⎽', 't' => '├', 'u' => '┤', 'v' => '┴', 'w' => '┬',
        'x' => '│', 'y' => '≤', 'z' => '≥', '{' => 'π', '|' => '≠', '}' => '£',
        '~' => '·',
        other => other,
    }
}

fn arg(params: &[&[u16]], i: usize, default: u16) -> u16 {
    params.get(i).and_then(|p| p.first()).copied().filter(|&v| v != 0).unwrap_or(default)
}

fn raw(params: &[&[u16]], i: usize) -> u16 {
    params.get(i).and_then(|p| p.first()).copied().unwrap_or(0)
}

impl Perform for VirtualTerminal {
    fn print(&mut self, c: char) {
        let c = if self.charsets[self.shift] == Charset::Graphics { dec_graphics(c) } else { c };
        let Some(width) = c.width() else { return };
        if width == 0 { return; }
        let Modes { insert, autowrap, .. } = self.modes;
        self.screen_mut().print(c, width as u16, insert, autowrap);
        self.last_printed = Some(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x05 => self.replies.push(0x06),
            0x07 => self.bell = true,
            0x08 => {
                let s = self.screen_mut();
                let (y, x) = (s.cursor.y, s.cursor.x.saturating_sub(1));
                s.move_to(y, x);
            }
            0x09 => self.tab_forward(1),
            0x0a..=0x0c => {
                let lnm = self.modes.lnm;
                let s = self.screen_mut();
                if lnm { s.cursor.x = 0; }
                s.pending_wrap = false;
                s.index();
            }
            0x0d => {
                let s = self.screen_mut();
                s.cursor.x = 0;
                s.pending_wrap = false;
            }
            0x0e => self.shift = 1,
            0x0f => self.shift = 0,
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore { return; }
        let private = intermediates.first() == Some(&b'?');
        let ps: Vec<&[u16]> = params.iter().collect();
        let n = arg(&ps, 0, 1);
        match (private, action) {
            (_, 'h') => self.set_mode(params, private, true),
            (_, 'l') => self.set_mode(params, private, false),
            (true, _) => {}
            (false, '@') => self.screen_mut().insert_chars(n),
            (false, 'A') => self.cursor_up(n),
            (false, 'B') | (false, 'e') => self.cursor_down(n),
            (false, 'C') | (false, 'a') => {
                let s = self.screen_mut();
                s.move_to(s.cursor.y, s.cursor.x.saturating_add(n));
            }
            (false, 'D') => {
                let s = self.screen_mut();
                s.move_to(s.cursor.y, s.cursor.x.saturating_sub(n));
            }
            (false, 'E') => {
                self.cursor_down(n);
                let s = self.screen_mut();
                s.move_to(s.cursor.y, 0);
            }
            (false, 'F') => {
                self.cursor_up(n);
                let s = self.screen_mut();
                s.move_to(s.cursor.y, 0);
            }
            (false, 'G') | (false, '`') => {
                let s = self.screen_mut();
                s.move_to(s.cursor.y, n - 1);
            }
            (false, 'H') | (false, 'f') => self.goto(n - 1, arg(&ps, 1, 1) - 1),
            (false, 'I') => self.tab_forward(n),
            (false, 'J') => self.screen_mut().erase_display(raw(&ps, 0)),
            (false, 'K') => self.screen_mut().erase_line(raw(&ps, 0)),
            (false, 'L') => self.screen_mut().insert_lines(n),
            (false, 'M') => self.screen_mut().delete_lines(n),
            (false, 'P') => self.screen_mut().delete_chars(n),
            (false, 'S') => self.screen_mut().scroll_up(n),
            (false, 'T') => self.screen_mut().scroll_down(n),
            (false, 'X') => self.screen_mut().erase_chars(n),
            (false, 'Z') => self.tab_backward(n),
            (false, 'b') => {
                if let Some(c) = self.last_printed {
                    // Anything past a full screen only overwrites itself.
                    let s = self.screen();
                    let cap = s.lines() as usize * s.cols() as usize;
                    for _ in 0..(n as usize).min(cap) { self.print(c); }
                }
            }
            (false, 'c') if intermediates.is_empty() && raw(&ps, 0) == 0 => self.replies.extend_from_slice(b"\x1b[?6c"),
            (false, 'd') => {
                let x = self.screen().cursor.x;
                self.goto(n - 1, x);
            }
            (false, 'g') => match raw(&ps, 0) {
                0 => {
                    let x = self.screen().cursor.x as usize;
                    if let Some(t) = self.tabs.get_mut(x) { *t = false; }
                }
                3 => self.tabs.iter_mut().for_each(|t| *t = false),
                _ => {}
            },
            (false, 'm') => self.sgr(params),
            (false, 'n') => self.report(raw(&ps, 0)),
            (false, 'r') if intermediates.is_empty() => {
                let lines = self.screen().lines();
                let top = arg(&ps, 0, 1) - 1;
                let bottom = arg(&ps, 1, lines).min(lines) - 1;
                self.screen_mut().set_region(top, bottom);
                self.goto(0, 0);
            }
            (false, 's') if intermediates.is_empty() => self.screen_mut().save_cursor(),
            (false, 'u') if intermediates.is_empty() => self.screen_mut().restore_cursor(),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8) {
        if ignore { return; }
        match (intermediates, byte) {
            ([], b'7') => self.screen_mut().save_cursor(),
            ([], b'8') => self.screen_mut().restore_cursor(),
            ([b'#'], b'8') => self.screen_mut().fill_alignment(),
            ([], b'D') => self.screen_mut().index(),
            ([], b'E') => {
                let s = self.screen_mut();
                s.cursor.x = 0;
                s.index();
            }
            ([], b'H') => {
                let x = self.screen().cursor.x as usize;
                if let Some(t) = self.tabs.get_mut(x) { *t = true; }
            }
            ([], b'M') => self.screen_mut().reverse_index(),
            ([], b'c') => self.reset(),
            ([], b'=') => self.modes.pnm = true,
            ([], b'>') => self.modes.pnm = false,
            ([b'('], set) => self.charsets[0] = if set == b'0' { Charset::Graphics } else { Charset::Ascii },
            ([b')'], set) => self.charsets[1] = if set == b'0' { Charset::Graphics } else { Charset::Ascii },
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        match params.first() {
            Some(&b"0") | Some(&b"2") => {
                let text = params[1..].join(&b";"[..]);
                let mut title = String::from_utf8_lossy(&text).into_owned();
                if let Some((idx, _)) = title.char_indices().nth(MAX_TITLE) {
                    title.truncate(idx);
                }
                self.title = Some(title);
            }
            _ => {}
        }
    }
}
