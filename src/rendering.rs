use ratatui::prelude::*;

use crate::screen::{self, Attr, Pen};
use crate::tree::{NodeId, NodeKind, MIN_PANE_DIM};
use crate::types::{AppState, Divider, Mode};

pub fn vt_to_color(c: screen::Color) -> Color {
    match c {
        screen::Color::Default => Color::Reset,
        screen::Color::Indexed(i) => Color::Indexed(i),
        screen::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

pub fn pen_style(pen: Pen) -> Style {
    let mut style = Style::default().fg(vt_to_color(pen.fg)).bg(vt_to_color(pen.bg));
    let mods = [
        (Attr::BOLD, Modifier::BOLD),
        (Attr::DIM, Modifier::DIM),
        (Attr::ITALIC, Modifier::ITALIC),
        (Attr::UNDERLINE, Modifier::UNDERLINED),
        (Attr::BLINK, Modifier::SLOW_BLINK),
        (Attr::INVERSE, Modifier::REVERSED),
        (Attr::INVISIBLE, Modifier::HIDDEN),
        (Attr::STRIKE, Modifier::CROSSED_OUT),
    ];
    for (attr, m) in mods {
        if pen.attr.contains(attr) {
            style = style.add_modifier(m);
        }
    }
    style
}

/// Composite the zoomed subtree onto the frame and place the cursor.
pub fn render_app(f: &mut Frame, app: &AppState) {
    let Some(view) = app.layout.view_root else { return };
    render_node(f.buffer_mut(), app, view);

    if app.mode != Mode::Passthrough {
        return;
    }
    let Some(focused) = app.layout.focused.filter(|&id| app.layout.contains(view, id)) else { return };
    let Some(node) = app.layout.node(focused) else { return };
    let Some(pane) = node.pane() else { return };
    let s = pane.screen();
    if s.cursor_visible && s.at_bottom() && node.rect.height >= MIN_PANE_DIM {
        let x = node.rect.x + s.cursor.x.min(node.rect.width.saturating_sub(1));
        let y = node.rect.y + s.cursor.y.min(node.rect.height.saturating_sub(2));
        f.set_cursor_position((x, y));
    }
}

fn put(buf: &mut Buffer, x: u16, y: u16, ch: char, style: Style) {
    if let Some(cell) = buf.cell_mut((x, y)) {
        cell.set_char(ch).set_style(style);
    }
}

pub fn render_node(buf: &mut Buffer, app: &AppState, id: NodeId) {
    let Some(node) = app.layout.node(id) else { return };
    let area = node.rect;
    match &node.kind {
        NodeKind::Pane(pane) => {
            if area.height < MIN_PANE_DIM || area.width < MIN_PANE_DIM {
                return;
            }
            let s = pane.screen();
            let rows = area.height - 1;
            for r in 0..rows.min(s.lines()) {
                let Some(cells) = s.visible_row(r) else { continue };
                for (c, cell) in cells.iter().take(area.width as usize).enumerate() {
                    let (x, y) = (area.x + c as u16, area.y + r);
                    let Some(out) = buf.cell_mut((x, y)) else { continue };
                    if cell.width == 0 {
                        out.reset();
                        continue;
                    }
                    // A wide glyph cut by the right edge would spill into the neighbour.
                    let ch = if cell.width == 2 && c + 1 >= area.width as usize { ' ' } else { cell.ch };
                    out.set_char(ch).set_style(pen_style(cell.pen));
                }
            }

            let title_y = area.y + area.height - 1;
            let reversed = app.mode == Mode::Command && app.layout.focused == Some(id);
            let style = if reversed { Style::default().add_modifier(Modifier::REVERSED) } else { Style::default() };
            for x in area.x..area.x + area.width {
                put(buf, x, title_y, '─', style);
            }
            let label = format!(" {} {} ", node.id, pane.title);
            let mut x = area.x + 1;
            for ch in label.chars() {
                if x >= area.x + area.width {
                    break;
                }
                put(buf, x, title_y, if ch.is_control() { '?' } else { ch }, style);
                x += 1;
            }
        }
        NodeKind::Split(split) => {
            for child in split.children {
                render_node(buf, app, child);
            }
            if split.divider == Divider::Vertical {
                let Some(left) = app.layout.node(split.children[0]) else { return };
                let x = left.rect.x + left.rect.width;
                for y in area.y..area.y + area.height {
                    put(buf, x, y, '│', Style::default());
                }
            }
        }
    }
}
