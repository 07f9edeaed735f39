use std::io;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::commands::{execute_action, send_to_focused};
use crate::types::{AppState, Divider, FocusDir, Mode, ScrollDir, ViewTarget};

/// Non-character keys, shared by both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKey {
    Resize,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Home, End, PageUp, PageDown,
    Backspace, Delete, Insert, BackTab, Enter,
    Up, Down, Right, Left,
}

const CODE_KEY_COUNT: usize = CodeKey::Left as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Code(CodeKey),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Send(&'static [u8]),
    /// Cursor key; the final byte of `ESC O x` / `ESC [ x`.
    SendArrow(u8),
    Transition { send_prefix: bool },
    Split(Option<Divider>),
    Reorient,
    Focus(FocusDir),
    FocusId,
    SetTabstop,
    Resize,
    Equalize,
    Redraw,
    Scroll(ScrollDir),
    View(ViewTarget),
    Digit(u8),
    ReshapeRoot,
    Delete,
}

pub struct Keymap {
    keys: [Option<Action>; 128],
    cmd_keys: [Option<Action>; 128],
    code_keys: [Option<Action>; CODE_KEY_COUNT],
}

impl Keymap {
    pub fn new(prefix: u8) -> Self {
        let mut keys = [None; 128];
        let mut cmd_keys = [None; 128];
        let mut code_keys = [None; CODE_KEY_COUNT];

        keys[b'\r' as usize] = Some(Action::Send(b"\r"));
        keys[b'\n' as usize] = Some(Action::Send(b"\n"));
        keys[0] = Some(Action::Send(b"\0"));
        keys[(prefix & 0x7f) as usize] = Some(Action::Transition { send_prefix: false });

        let cmd = [
            (b'\r', Action::Transition { send_prefix: false }),
            (b',', Action::Scroll(ScrollDir::Up)),
            (b'm', Action::Scroll(ScrollDir::Down)),
            (b'c', Action::Split(None)),
            (b'C', Action::Split(Some(Divider::Vertical))),
            (b'x', Action::Reorient),
            (b'|', Action::Reorient),
            (b'r', Action::Redraw),
            (b'j', Action::Focus(FocusDir::Down)),
            (b'k', Action::Focus(FocusDir::Up)),
            (b'h', Action::Focus(FocusDir::Left)),
            (b'l', Action::Focus(FocusDir::Right)),
            (b'o', Action::Focus(FocusDir::Previous)),
            (b'p', Action::Focus(FocusDir::Previous)),
            (b'g', Action::FocusId),
            (b't', Action::SetTabstop),
            (b'>', Action::Resize),
            (b'=', Action::Equalize),
            (b'v', Action::View(ViewTarget::Parent)),
            (b'V', Action::View(ViewTarget::Base)),
            (b'w', Action::Delete),
        ];
        for (k, a) in cmd {
            cmd_keys[k as usize] = Some(a);
        }
        for d in 0..10u8 {
            cmd_keys[(b'0' + d) as usize] = Some(Action::Digit(d));
        }
        cmd_keys[(prefix & 0x7f) as usize] = Some(Action::Transition { send_prefix: true });

        let code = [
            (CodeKey::Resize, Action::ReshapeRoot),
            (CodeKey::F1, Action::Send(b"\x1bOP")),
            (CodeKey::F2, Action::Send(b"\x1bOQ")),
            (CodeKey::F3, Action::Send(b"\x1bOR")),
            (CodeKey::F4, Action::Send(b"\x1bOS")),
            (CodeKey::F5, Action::Send(b"\x1b[15~")),
            (CodeKey::F6, Action::Send(b"\x1b[17~")),
            (CodeKey::F7, Action::Send(b"\x1b[18~")),
            (CodeKey::F8, Action::Send(b"\x1b[19~")),
            (CodeKey::F9, Action::Send(b"\x1b[20~")),
            (CodeKey::F10, Action::Send(b"\x1b[21~")),
            (CodeKey::F11, Action::Send(b"\x1b[23~")),
            (CodeKey::F12, Action::Send(b"\x1b[24~")),
            (CodeKey::Home, Action::Send(b"\x1b[1~")),
            (CodeKey::End, Action::Send(b"\x1b[4~")),
            (CodeKey::PageUp, Action::Send(b"\x1b[5~")),
            (CodeKey::PageDown, Action::Send(b"\x1b[6~")),
            (CodeKey::Backspace, Action::Send(b"\x7f")),
            (CodeKey::Delete, Action::Send(b"\x1b[3~")),
            (CodeKey::Insert, Action::Send(b"\x1b[2~")),
            (CodeKey::BackTab, Action::Send(b"\x1b[Z")),
            (CodeKey::Enter, Action::Send(b"\r")),
            (CodeKey::Up, Action::SendArrow(b'A')),
            (CodeKey::Down, Action::SendArrow(b'B')),
            (CodeKey::Right, Action::SendArrow(b'C')),
            (CodeKey::Left, Action::SendArrow(b'D')),
        ];
        for (k, a) in code {
            code_keys[k as usize] = Some(a);
        }

        Keymap { keys, cmd_keys, code_keys }
    }

    pub fn lookup(&self, mode: Mode, key: Key) -> Option<Action> {
        match key {
            Key::Char(c) if (c as u32) < 128 => match mode {
                Mode::Passthrough => self.keys[c as usize],
                Mode::Command => self.cmd_keys[c as usize],
            },
            Key::Char(_) => None,
            Key::Code(k) => self.code_keys[k as usize],
        }
    }
}

/// Byte produced by Ctrl plus `c`, the way a VT keyboard maps it.
pub fn control_byte(c: char) -> Option<u8> {
    let b = match c.to_ascii_lowercase() {
        c @ 'a'..='z' => c as u8 - b'a' + 1,
        '@' | ' ' | '2' => 0,
        '[' | '3' => 0x1b,
        '\\' | '4' => 0x1c,
        ']' | '5' => 0x1d,
        '^' | '6' => 0x1e,
        '_' | '7' | '/' => 0x1f,
        '?' | '8' => 0x7f,
        _ => return None,
    };
    Some(b)
}

fn translate_key(key: &KeyEvent) -> Vec<Key> {
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return Vec::new();
    }
    let code = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => match control_byte(c) {
            Some(b) => Key::Char(b as char),
            None => Key::Char(c),
        },
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Char('\r'),
        KeyCode::Tab => Key::Char('\t'),
        KeyCode::Esc => Key::Char('\x1b'),
        KeyCode::Null => Key::Char('\0'),
        KeyCode::Backspace => Key::Code(CodeKey::Backspace),
        KeyCode::BackTab => Key::Code(CodeKey::BackTab),
        KeyCode::Delete => Key::Code(CodeKey::Delete),
        KeyCode::Insert => Key::Code(CodeKey::Insert),
        KeyCode::Home => Key::Code(CodeKey::Home),
        KeyCode::End => Key::Code(CodeKey::End),
        KeyCode::PageUp => Key::Code(CodeKey::PageUp),
        KeyCode::PageDown => Key::Code(CodeKey::PageDown),
        KeyCode::Up => Key::Code(CodeKey::Up),
        KeyCode::Down => Key::Code(CodeKey::Down),
        KeyCode::Right => Key::Code(CodeKey::Right),
        KeyCode::Left => Key::Code(CodeKey::Left),
        KeyCode::F(n) => match n {
            1 => Key::Code(CodeKey::F1),
            2 => Key::Code(CodeKey::F2),
            3 => Key::Code(CodeKey::F3),
            4 => Key::Code(CodeKey::F4),
            5 => Key::Code(CodeKey::F5),
            6 => Key::Code(CodeKey::F6),
            7 => Key::Code(CodeKey::F7),
            8 => Key::Code(CodeKey::F8),
            9 => Key::Code(CodeKey::F9),
            10 => Key::Code(CodeKey::F10),
            11 => Key::Code(CodeKey::F11),
            12 => Key::Code(CodeKey::F12),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    if key.modifiers.contains(KeyModifiers::ALT) && matches!(code, Key::Char(_)) {
        vec![Key::Char('\x1b'), code]
    } else {
        vec![code]
    }
}

/// Keys the dispatcher sees for one terminal event.
pub fn translate_event(event: &Event) -> Vec<Key> {
    match event {
        Event::Key(key) => translate_key(key),
        Event::Resize(..) => vec![Key::Code(CodeKey::Resize)],
        Event::Paste(text) => text.chars().map(|c| Key::Char(if c == '\n' { '\r' } else { c })).collect(),
        _ => Vec::new(),
    }
}

pub fn handle_key(app: &mut AppState, key: Key) -> io::Result<()> {
    let action = app.keymap.lookup(app.mode, key);
    let result = match action {
        Some(a) => execute_action(app, a),
        None => {
            if let Key::Char(c) = key {
                let mut buf = [0u8; 4];
                send_to_focused(app, c.encode_utf8(&mut buf).as_bytes());
            }
            if app.mode == Mode::Command {
                app.mode = Mode::Passthrough;
            }
            Ok(())
        }
    };
    if !matches!(action, Some(Action::Digit(_))) {
        app.cmd_count = 0;
    }
    result
}
