use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event};
use log::{debug, info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::input::{handle_key, translate_event};
use crate::pane::BUFSIZ;
use crate::platform::{self, FdSet};
use crate::rendering::render_app;
use crate::types::AppState;

/// Longest `select` sleep. crossterm notices SIGWINCH on its own pipe,
/// which is not in our set, so a resize that lands between two waits is
/// only seen when the wait ends.
pub const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Block until some descriptor is readable or `IDLE_WAIT` passes.
/// An interrupted wait counts as nothing ready.
fn wait(fds: &FdSet) -> io::Result<FdSet> {
    match platform::select(fds, Some(IDLE_WAIT)) {
        Ok(r) => Ok(r),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(FdSet::new()),
        Err(e) => {
            warn!("select: {e}");
            Err(e)
        }
    }
}

/// Main loop: wait on stdin and every pty, route what arrives, repaint.
/// Returns once the last pane has gone.
pub fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut AppState) -> io::Result<()> {
    let mut buf = vec![0u8; BUFSIZ];
    terminal.draw(|f| render_app(f, app))?;
    while app.layout.root.is_some() {
        let ready = wait(&app.layout.fds)?;
        drain_input(app)?;
        drain_output(app, &ready, &mut buf);
        if app.layout.root.is_none() {
            break;
        }
        if std::mem::take(&mut app.redraw_all) {
            terminal.clear()?;
        }
        terminal.draw(|f| render_app(f, app))?;
        if std::mem::take(&mut app.bell) {
            let out = terminal.backend_mut();
            out.write_all(b"\x07")?;
            out.flush()?;
        }
    }
    info!("last pane closed, exiting");
    Ok(())
}

/// Handle every terminal event that is already buffered.
fn drain_input(app: &mut AppState) -> io::Result<()> {
    while event::poll(Duration::ZERO)? {
        let ev = event::read()?;
        if let Event::Resize(cols, rows) = ev {
            debug!("host resized to {cols}x{rows}");
            app.host_size = (cols, rows);
        }
        for key in translate_event(&ev) {
            if let Err(e) = handle_key(app, key) {
                warn!("{key:?}: {e}");
            }
        }
    }
    Ok(())
}

/// Read once from each ready pty. A pane whose child has gone is reaped;
/// the walk stops there since the tree changed under it.
pub fn drain_output(app: &mut AppState, ready: &FdSet, buf: &mut [u8]) {
    if ready.is_empty() {
        return;
    }
    for id in app.layout.leaves() {
        let Some(pane) = app.layout.pane_mut(id) else { continue };
        if !pane.pty.raw_fd().is_some_and(|fd| ready.contains(fd)) {
            continue;
        }
        let dead = match pane.pty.read(buf) {
            Ok(0) => true,
            Ok(n) => {
                pane.feed(&buf[..n]);
                if pane.vt.take_bell() {
                    app.bell = true;
                }
                false
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => false,
            Err(e) => {
                debug!("pty read: {e}");
                true
            }
        };
        if dead {
            app.layout.reap(id);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::config::Config;
    use crate::pane::ShellSpawner;
    use crate::types::Divider;

    fn shell_app() -> AppState {
        let config = Config { prefix: 0x07, scrollback: 100, tabstop: 8, term: "screen".into(), shell: "/bin/sh".into() };
        let spawner = ShellSpawner::new(config.shell.clone(), config.term.clone());
        let mut app = AppState::new(&config, Box::new(spawner), (80, 24));
        let AppState { layout, spawner, .. } = &mut app;
        layout.bootstrap(spawner.as_ref()).unwrap();
        app
    }

    fn pump_until(app: &mut AppState, done: impl Fn(&AppState) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut buf = vec![0u8; BUFSIZ];
        while Instant::now() < deadline {
            if done(app) {
                return true;
            }
            let ready = platform::select(&app.layout.fds, Some(Duration::from_millis(50))).unwrap_or_default();
            drain_output(app, &ready, &mut buf);
        }
        done(app)
    }

    fn focused_rows(app: &AppState) -> Vec<String> {
        let Some(pane) = app.layout.focused.and_then(|f| app.layout.pane(f)) else { return Vec::new() };
        (0..pane.screen().lines()).map(|y| pane.screen().live_text(y)).collect()
    }

    #[test]
    fn test_wait_returns_when_idle() {
        let mut fds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let mut watch = FdSet::new();
        watch.insert(fds[0]).unwrap();
        let start = Instant::now();
        let ready = wait(&watch).unwrap();
        assert!(ready.is_empty());
        assert!(start.elapsed() >= IDLE_WAIT / 2);
        assert!(start.elapsed() < IDLE_WAIT * 8);
        assert_eq!(unsafe { libc::write(fds[1], b"x".as_ptr() as *const libc::c_void, 1) }, 1);
        assert!(wait(&watch).unwrap().contains(fds[0]));
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn test_cursor_down_in_real_shell() {
        let mut app = shell_app();
        assert!(pump_until(&mut app, |a| focused_rows(a).iter().any(|r| !r.trim().is_empty())));
        app.layout.focused_pane_mut().unwrap().send(b"printf '\\033[5B%s%s' MAR KER\r");
        assert!(pump_until(&mut app, |a| focused_rows(a).iter().any(|r| r.contains("MARKER"))));
        let rows = focused_rows(&app);
        let echo = rows.iter().rposition(|r| r.contains("MAR KER")).unwrap();
        let marker = rows.iter().position(|r| r.contains("MARKER")).unwrap();
        assert_eq!(marker, echo + 6);
        let pane = app.layout.pane(app.layout.focused.unwrap()).unwrap();
        assert_eq!(pane.screen().cursor.y as usize, echo + 6);
    }

    #[test]
    fn test_exiting_child_collapses_split() {
        let mut app = shell_app();
        let root = app.layout.root.unwrap();
        let AppState { layout, spawner, .. } = &mut app;
        let v = layout.split(root, Some(Divider::Horizontal), None, spawner.as_ref()).unwrap();
        layout.focus(v);
        assert_eq!(app.layout.leaves().len(), 2);
        assert!(pump_until(&mut app, |a| a.layout.pane(v).is_some_and(|p| p.screen().cursor.x > 0)));
        app.layout.pane_mut(v).unwrap().send(b"exit\r");
        assert!(pump_until(&mut app, |a| a.layout.leaves().len() == 1));
        assert!(app.layout.describe().starts_with("*23x80@0,0("), "{}", app.layout.describe());
        assert_eq!(app.layout.focused, Some(root));
    }
}
