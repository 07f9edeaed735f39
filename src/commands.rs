use std::io;

use log::debug;
use ratatui::prelude::Rect;

use crate::config::DEFAULT_TABSTOP;
use crate::input::Action;
use crate::types::{AppState, Mode, ViewTarget};

/// Write user input to the focused pane's child.
pub fn send_to_focused(app: &mut AppState, bytes: &[u8]) {
    if let Some(pane) = app.layout.focused_pane_mut() {
        pane.send(bytes);
    }
}

fn transition(app: &mut AppState, send_prefix: bool) {
    if send_prefix {
        let prefix = [app.prefix];
        send_to_focused(app, &prefix);
    }
    app.mode = match app.mode {
        Mode::Passthrough => Mode::Command,
        Mode::Command => Mode::Passthrough,
    };
    if app.mode == Mode::Passthrough {
        if let Some(pane) = app.layout.focused_pane_mut() {
            pane.scroll_to_bottom();
        }
    }
}

/// Count argument as a split ratio, if one was typed.
fn count_ratio(count: u32) -> Option<f64> { (count > 0).then(|| count as f64 / 100.0) }

pub fn execute_action(app: &mut AppState, action: Action) -> io::Result<()> {
    let count = app.cmd_count;
    let focused = app.layout.focused;
    match action {
        Action::Send(bytes) => {
            let lnm = app.layout.focused_pane_mut().is_some_and(|p| p.vt.modes.lnm);
            if bytes == b"\r" && lnm {
                send_to_focused(app, b"\r\n");
            } else {
                send_to_focused(app, bytes);
            }
        }
        Action::SendArrow(c) => {
            let pnm = app.layout.focused_pane_mut().is_some_and(|p| p.vt.modes.pnm);
            send_to_focused(app, &[0x1b, if pnm { b'O' } else { b'[' }, c]);
        }
        Action::Transition { send_prefix } => transition(app, send_prefix),
        Action::Split(divider) => {
            let Some(target) = focused else { return Ok(()) };
            let v = app.layout.split(target, divider, count_ratio(count), &*app.spawner)?;
            app.layout.focus(v);
        }
        Action::Reorient => {
            if let Some(f) = focused {
                app.layout.reorient(f);
            }
        }
        Action::Focus(dir) => app.layout.focus_dir(dir, count.max(1)),
        Action::FocusId => {
            if let Some(n) = app.layout.find_by_id(count as usize) {
                let outside = app.layout.view_root.is_some_and(|v| !app.layout.contains(v, n));
                if outside {
                    if let Some(root) = app.layout.root {
                        app.layout.set_view(root);
                    }
                }
                app.layout.focus(n);
            }
        }
        Action::SetTabstop => {
            app.layout.tabstop = if count > 0 { count as usize } else { DEFAULT_TABSTOP };
            debug!("tabstop for new columns: {}", app.layout.tabstop);
        }
        Action::Resize => {
            if let Some(f) = focused {
                app.layout.resize(f, count_ratio(count).unwrap_or(0.5));
            }
        }
        Action::Equalize => {
            if let Some(f) = focused {
                app.layout.equalize(f);
            }
        }
        Action::Redraw => app.redraw_all = true,
        Action::Scroll(dir) => {
            let Some(f) = focused else { return Ok(()) };
            let rows = app.layout.node(f).map_or(0, |n| n.rect.height);
            if let Some(pane) = app.layout.pane_mut(f) {
                pane.scroll(dir, rows);
            }
        }
        Action::View(ViewTarget::Parent) => {
            let target = if count > 0 {
                app.layout.find_by_id(count as usize)
            } else {
                focused.map(|f| app.layout.parent(f).unwrap_or(f))
            };
            if let Some(t) = target {
                app.layout.set_view(t);
                app.redraw_all = true;
            }
        }
        Action::View(ViewTarget::Base) => {
            if let Some(root) = app.layout.root {
                app.layout.set_view(root);
                app.redraw_all = true;
            }
        }
        Action::Digit(d) => app.cmd_count = count.saturating_mul(10).saturating_add(d as u32),
        Action::ReshapeRoot => {
            let (cols, rows) = app.host_size;
            app.layout.reshape_root(Rect::new(0, 0, cols, rows));
            app.redraw_all = true;
        }
        Action::Delete => {
            if let Some(f) = focused {
                app.layout.reap(f);
            }
        }
    }
    Ok(())
}
