use ratatui::prelude::Rect;

use crate::config::Config;
use crate::input::Keymap;
use crate::pane::Spawner;
use crate::tree::Layout;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode { Passthrough, Command }

/// Which way a split divides its area, named after the divider line:
/// `Vertical` puts children side by side with a `|` column between them,
/// `Horizontal` stacks them and the upper title bar acts as the `-` divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divider { Vertical, Horizontal }

impl Divider {
    pub fn flip(self) -> Self {
        match self {
            Divider::Vertical => Divider::Horizontal,
            Divider::Horizontal => Divider::Vertical,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Divider::Vertical => '|',
            Divider::Horizontal => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDir { Up, Down, Left, Right, Previous }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDir { Up, Down }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTarget { Parent, Base }

/// Everything the loop and the action handlers mutate.
pub struct AppState {
    pub layout: Layout,
    pub mode: Mode,
    pub cmd_count: u32,
    pub prefix: u8,
    pub keymap: Keymap,
    pub spawner: Box<dyn Spawner>,
    /// Host terminal size as (cols, rows), refreshed on resize events.
    pub host_size: (u16, u16),
    pub redraw_all: bool,
    pub bell: bool,
}

impl AppState {
    pub fn new(config: &Config, spawner: Box<dyn Spawner>, host_size: (u16, u16)) -> Self {
        let (cols, rows) = host_size;
        AppState {
            layout: Layout::new(Rect::new(0, 0, cols, rows), config.scrollback, config.tabstop),
            mode: Mode::Passthrough,
            cmd_count: 0,
            prefix: config.prefix,
            keymap: Keymap::new(config.prefix),
            spawner,
            host_size,
            redraw_all: false,
            bell: false,
        }
    }
}
