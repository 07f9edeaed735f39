use crate::cli::{prefix_byte, Cli};
use crate::platform;

pub const DEFAULT_TABSTOP: usize = 8;
const DEFAULT_TERM: &str = "screen-bce";
const DEFAULT_256_COLOR_TERM: &str = "screen-256color-bce";

/// Resolved runtime settings. There are no config files: everything comes
/// from the command line and the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: u8,
    pub scrollback: usize,
    pub tabstop: usize,
    pub term: String,
    pub shell: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        if let Some(t) = &cli.host_term {
            std::env::set_var("TERM", t);
        }
        let colors = platform::host_colors();
        Config {
            prefix: prefix_byte(cli.command_key.as_deref()),
            scrollback: cli.scrollback,
            tabstop: DEFAULT_TABSTOP,
            term: advertised_term(cli.term.as_deref(), cli.host_term.as_deref(), colors),
            shell: platform::user_shell(),
        }
    }
}

/// TERM handed to children: `-t` (upgraded to its 256-colour sibling when the
/// host can show it), then `-T`, then the screen default for the colour depth.
pub fn advertised_term(term: Option<&str>, host_term: Option<&str>, colors: u32) -> String {
    if let Some(t) = term {
        if colors >= 256 {
            if let Some(wide) = with_256_colors(t) {
                return wide.to_string();
            }
        }
        return t.to_string();
    }
    if let Some(t) = host_term {
        return t.to_string();
    }
    if colors >= 256 { DEFAULT_256_COLOR_TERM.to_string() } else { DEFAULT_TERM.to_string() }
}

fn with_256_colors(name: &str) -> Option<&'static str> {
    match name {
        "screen" => Some("screen-256color"),
        "screen-bce" => Some("screen-256color-bce"),
        "xterm" => Some("xterm-256color"),
        "tmux" => Some("tmux-256color"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_term_follows_color_depth() {
        assert_eq!(advertised_term(None, None, 8), "screen-bce");
        assert_eq!(advertised_term(None, None, 256), "screen-256color-bce");
    }

    #[test]
    fn test_explicit_term_prefers_256_colors() {
        assert_eq!(advertised_term(Some("screen"), None, 256), "screen-256color");
        assert_eq!(advertised_term(Some("screen"), None, 8), "screen");
        assert_eq!(advertised_term(Some("vt220"), None, 256), "vt220");
    }

    #[test]
    fn test_host_term_is_exported() {
        assert_eq!(advertised_term(None, Some("xterm"), 256), "xterm");
        assert_eq!(advertised_term(Some("tmux"), Some("xterm"), 256), "tmux-256color");
    }
}
