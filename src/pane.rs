use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;

use log::{debug, info, warn};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::platform;
use crate::screen::Screen;
use crate::types::{ScrollDir, VERSION};
use crate::vt::VirtualTerminal;

/// Largest chunk read from a pty per readiness event.
pub const BUFSIZ: usize = 8192;

const MAX_PUTATIVE: usize = 256;

/// Master side of a child's pseudo-terminal.
pub trait Pty {
    fn raw_fd(&self) -> Option<RawFd>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// TIOCSWINSZ: tell the child its new size.
    fn resize(&mut self, rows: u16, cols: u16) -> io::Result<()>;
    fn pid(&self) -> Option<u32>;
}

/// Starts a child on a fresh pty.
pub trait Spawner {
    fn spawn(&self, rows: u16, cols: u16) -> io::Result<Box<dyn Pty>>;
    /// Name shown in the title bar before the child sets one.
    fn program(&self) -> String;
}

pub struct ShellSpawner {
    shell: String,
    term: String,
}

impl ShellSpawner {
    pub fn new(shell: String, term: String) -> Self { ShellSpawner { shell, term } }
}

impl Spawner for ShellSpawner {
    fn spawn(&self, rows: u16, cols: u16) -> io::Result<Box<dyn Pty>> {
        let size = PtySize { rows: rows.max(1), cols: cols.max(1), pixel_width: 0, pixel_height: 0 };
        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("openpty error: {e}")))?;
        let mut cmd = CommandBuilder::new(&self.shell);
        cmd.env("STTM", std::process::id().to_string());
        cmd.env("STTM_VERSION", VERSION);
        cmd.env("TERM", &self.term);
        if let Ok(dir) = std::env::current_dir() {
            cmd.cwd(dir);
        }
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("spawn shell error: {e}")))?;
        // The child must hold the only slave handle or its exit never reads as EOF.
        drop(pair.slave);
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("clone reader error: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("take writer error: {e}")))?;
        let fd = pair.master.as_raw_fd();
        if let Some(fd) = fd {
            platform::set_nonblocking(fd)?;
        }
        Ok(Box::new(ShellPty { master: pair.master, reader, writer, child, fd }))
    }

    fn program(&self) -> String {
        std::path::Path::new(&self.shell)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.shell.clone())
    }
}

struct ShellPty {
    master: Box<dyn MasterPty + Send>,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    fd: Option<RawFd>,
}

impl Pty for ShellPty {
    fn raw_fd(&self) -> Option<RawFd> { self.fd }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.reader.read(buf) }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.writer.write(buf) }

    fn resize(&mut self, rows: u16, cols: u16) -> io::Result<()> {
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("resize error: {e}")))
    }

    fn pid(&self) -> Option<u32> { self.child.process_id() }
}

/// Write all of `bytes`, retrying on EINTR and short writes. Anything else,
/// including a full pty buffer, drops the remainder.
pub fn safewrite(pty: &mut dyn Pty, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match pty.write(bytes) {
            Ok(0) => break,
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("dropping {} bytes to pty: {e}", bytes.len());
                break;
            }
        }
    }
}

pub struct Pane {
    pub pty: Box<dyn Pty>,
    pub pid: Option<u32>,
    pub title: String,
    pub vt: VirtualTerminal,
    parser: vte::Parser,
    putative: String,
}

impl Pane {
    /// `h` and `w` are the pane's full geometry; one row goes to the title bar.
    pub fn new(pty: Box<dyn Pty>, title: String, h: u16, w: u16, scrollback: usize, tabstop: usize) -> Self {
        let pid = pty.pid();
        Pane {
            pty,
            pid,
            title,
            vt: VirtualTerminal::new(h.saturating_sub(1), w, scrollback, tabstop),
            parser: vte::Parser::new(),
            putative: String::new(),
        }
    }

    pub fn screen(&self) -> &Screen { self.vt.screen() }

    pub fn resize(&mut self, h: u16, w: u16, tabstop: usize) {
        let rows = h.saturating_sub(1).max(1);
        let cols = w.max(1);
        self.vt.resize(rows, cols, tabstop);
        if let Err(e) = self.pty.resize(rows, cols) {
            warn!("TIOCSWINSZ {rows}x{cols} failed: {e}");
        }
    }

    /// Run child output through the parser and answer any queries it made.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.parser.advance(&mut self.vt, b);
        }
        let replies = self.vt.take_replies();
        if !replies.is_empty() {
            safewrite(self.pty.as_mut(), &replies);
        }
        if let Some(title) = self.vt.take_title() {
            self.title = title;
        }
    }

    /// Forward user input to the child and jump back to the live screen.
    pub fn send(&mut self, bytes: &[u8]) {
        if !self.vt.alt_active {
            self.track_command(bytes);
        }
        safewrite(self.pty.as_mut(), bytes);
        self.vt.screen_mut().scroll_to_bottom();
    }

    pub fn scroll(&mut self, dir: ScrollDir, rows: u16) {
        let half = (rows / 2).max(1) as isize;
        let delta = match dir {
            ScrollDir::Up => -half,
            ScrollDir::Down => half,
        };
        self.vt.screen_mut().scroll_view(delta);
    }

    pub fn scroll_to_bottom(&mut self) { self.vt.screen_mut().scroll_to_bottom(); }

    fn track_command(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                b'\r' | b'\n' => {
                    if let Some(name) = resolve_command(&self.putative) {
                        info!("pane title -> {name}");
                        self.title = name;
                    }
                    self.putative.clear();
                }
                0x08 | 0x7f => {
                    self.putative.pop();
                }
                0x03 | 0x15 => self.putative.clear(),
                0x20..=0x7e if self.putative.len() < MAX_PUTATIVE => self.putative.push(b as char),
                _ => {}
            }
        }
    }

    #[cfg(test)]
    pub fn putative(&self) -> &str { &self.putative }
}

/// First word of a typed command line, if it names something on PATH.
fn resolve_command(line: &str) -> Option<String> {
    let word = line.split_whitespace().next()?;
    which::which(word).ok()?;
    std::path::Path::new(word).file_name().map(|s| s.to_string_lossy().into_owned())
}
