//! Unix glue: descriptor sets for `select`, non-blocking fds, signal
//! disposition and user lookups.

use std::ffi::CStr;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

pub const STDIN_FD: RawFd = libc::STDIN_FILENO;

/// The descriptors the I/O loop waits on. `nfds` is one past the largest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdSet {
    fds: Vec<RawFd>,
}

impl FdSet {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, fd: RawFd) -> io::Result<()> {
        if fd < 0 || fd as usize >= libc::FD_SETSIZE as usize {
            return Err(io::Error::new(io::ErrorKind::Other, format!("descriptor {fd} out of range for select")));
        }
        if let Err(pos) = self.fds.binary_search(&fd) {
            self.fds.insert(pos, fd);
        }
        Ok(())
    }

    pub fn remove(&mut self, fd: RawFd) {
        if let Ok(pos) = self.fds.binary_search(&fd) {
            self.fds.remove(pos);
        }
    }

    pub fn contains(&self, fd: RawFd) -> bool { self.fds.binary_search(&fd).is_ok() }

    pub fn is_empty(&self) -> bool { self.fds.is_empty() }

    pub fn nfds(&self) -> libc::c_int { self.fds.last().map_or(0, |&fd| fd + 1) }
}

/// Wait until a descriptor in `watch` is readable. `None` blocks forever.
/// Returns the ready subset; EINTR comes back as an error for the caller
/// to treat as "nothing ready".
pub fn select(watch: &FdSet, timeout: Option<Duration>) -> io::Result<FdSet> {
    let mut raw: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe { libc::FD_ZERO(&mut raw) };
    for &fd in &watch.fds {
        unsafe { libc::FD_SET(fd, &mut raw) };
    }
    let mut tv = timeout.map(|d| libc::timeval {
        tv_sec: d.as_secs() as libc::time_t,
        tv_usec: d.subsec_micros() as libc::suseconds_t,
    });
    let tvp = tv.as_mut().map_or(std::ptr::null_mut(), |t| t as *mut libc::timeval);
    let rc = unsafe { libc::select(watch.nfds(), &mut raw, std::ptr::null_mut(), std::ptr::null_mut(), tvp) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let fds = watch.fds.iter().copied().filter(|&fd| unsafe { libc::FD_ISSET(fd, &raw) }).collect();
    Ok(FdSet { fds })
}

pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Children are reaped by the kernel; their death is noticed through the pty.
pub fn ignore_sigchld() {
    unsafe { libc::signal(libc::SIGCHLD, libc::SIG_IGN) };
}

/// `$SHELL`, then the passwd entry of the real uid, then `/bin/sh`.
pub fn user_shell() -> String {
    if let Some(shell) = std::env::var("SHELL").ok().filter(|s| !s.is_empty()) {
        return shell;
    }
    passwd_shell().unwrap_or_else(|| "/bin/sh".to_string())
}

fn passwd_shell() -> Option<String> {
    let pw = unsafe { libc::getpwuid(libc::getuid()) };
    if pw.is_null() {
        return None;
    }
    let shell = unsafe { (*pw).pw_shell };
    if shell.is_null() {
        return None;
    }
    let shell = unsafe { CStr::from_ptr(shell) }.to_string_lossy().into_owned();
    (!shell.is_empty()).then_some(shell)
}

/// Rough colour depth of the host terminal.
pub fn host_colors() -> u32 {
    let colorterm = std::env::var("COLORTERM").unwrap_or_default();
    let term = std::env::var("TERM").unwrap_or_default();
    if colorterm == "truecolor" || colorterm == "24bit" || term.contains("256color") { 256 } else { 8 }
}
