use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sttm",
    version,
    about = "Simple tiling terminal multiplexer",
    after_help = "\
COMMAND MODE KEYS (after the prefix, Ctrl-G by default):
    c / C          Split the focused pane (inherit orientation / side by side)
    x, |           Flip the orientation of the enclosing split
    h j k l        Move focus left, down, up, right
    o, p           Focus the previously focused pane
    g              Focus the pane whose id is the count
    w              Close the focused pane
    >              Resize: the count is the first child's share in percent
    =              Equalize panes along the split axis
    , / m          Scroll half a page up / down
    v / V          Zoom into the enclosing split (or pane <count>) / unzoom
    t              Set the tab stop width for new columns (count, default 8)
    r              Redraw the screen
    0-9            Accumulate a count for the next command
    Enter          Return to passthrough
    prefix         Send the prefix key itself and return to passthrough"
)]
pub struct Cli {
    /// Prefix key; its control character is used (e.g. `-c a` is Ctrl-A)
    #[arg(short = 'c', value_name = "KEY")]
    pub command_key: Option<String>,

    /// Rows of scrollback history per pane
    #[arg(short = 's', value_name = "SCROLLBACK", default_value_t = 1024)]
    pub scrollback: usize,

    /// Set TERM for the multiplexer itself and the children
    #[arg(short = 'T', value_name = "NAME")]
    pub host_term: Option<String>,

    /// Override the TERM advertised to the children
    #[arg(short = 't', value_name = "NAME")]
    pub term: Option<String>,
}

/// Control character for a prefix key argument: `KEY & 0x1f`.
pub fn prefix_byte(key: Option<&str>) -> u8 {
    key.and_then(|k| k.bytes().next()).map_or(0x07, |b| b & 0x1f)
}
