//! Command loop: reads protocol lines, applies them to the pane manager and
//! writes failure replies.
//!
//! The loop blocks in `poll(2)` on the input descriptor and the
//! cancellation wake descriptor with no timeout, so it neither spins nor
//! delays shutdown. Input is read unbuffered, straight from the descriptor,
//! so no bytes can hide in a userspace buffer while `poll` waits.

use std::io::{self, Read, Write};
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use paneflip_backend::DisplayBackend;
use paneflip_runtime::{CancellationToken, PaneError, PaneManager};

use crate::protocol::{MAX_LINE_LEN, ParseError, Request, RequestError, parse_line};

const READ_CHUNK: usize = 4096;

/// Why [`CommandLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    EndOfInput,
}

/// Result of handling one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    /// Syntax error, sent as `parsing failed: ...`.
    ParseFailed(ParseError),
    /// Argument or pane error, sent as `failure: ...`.
    Failure(String),
}

impl Reply {
    fn line(&self) -> Option<String> {
        match self {
            Self::Ok => None,
            Self::ParseFailed(e) => Some(format!("parsing failed: {e}")),
            Self::Failure(msg) => Some(format!("failure: {msg}")),
        }
    }
}

impl From<RequestError> for Reply {
    fn from(err: RequestError) -> Self {
        Self::Failure(err.to_string())
    }
}

impl From<PaneError> for Reply {
    fn from(err: PaneError) -> Self {
        Self::Failure(err.to_string())
    }
}

/// Apply one protocol line to `manager`.
pub fn execute<B: DisplayBackend + 'static>(manager: &PaneManager<B>, line: &str) -> Reply {
    let cmd = match parse_line(line) {
        Ok(cmd) => cmd,
        Err(e) => return Reply::ParseFailed(e),
    };
    let request = match Request::from_command(&cmd) {
        Ok(r) => r,
        Err(e) => return e.into(),
    };
    let target = cmd.target;
    let result = match request {
        Request::Create { color } => manager.create(target, color),
        Request::Remove => manager.remove(target),
        Request::Fill { color } => manager.fill(target, color),
        Request::Rect { rect, color } => manager.draw_rect(target, &rect, color),
        Request::Circle { circle, color } => manager.draw_circle(target, &circle, color),
        Request::Line { line, color } => manager.draw_line(target, &line, color),
        Request::Triangle { tri, color } => manager.draw_triangle(target, &tri, color),
        Request::Bezier { curve, color } => manager.draw_bezier2(target, &curve, color),
        Request::Copy(copy) => manager.copy_rect(target, &copy),
        Request::Dump { path } => {
            // Copy under the lock, write without it.
            return match manager.dump_pane(target) {
                Ok(bytes) => match std::fs::write(path, bytes) {
                    Ok(()) => Reply::Ok,
                    Err(e) => Reply::Failure(format!("cannot write {}: {e}", path.display())),
                },
                Err(e) => e.into(),
            };
        }
    };
    match result {
        Ok(()) => Reply::Ok,
        Err(e) => e.into(),
    }
}

/// Reads commands until end of input or cancellation.
pub struct CommandLoop<'m, B: DisplayBackend + 'static, W: Write> {
    manager: &'m PaneManager<B>,
    token: CancellationToken,
    out: W,
    pending: Vec<u8>,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
    handled: u64,
}

impl<'m, B: DisplayBackend + 'static, W: Write> CommandLoop<'m, B, W> {
    pub fn new(manager: &'m PaneManager<B>, token: CancellationToken, out: W) -> Self {
        Self {
            manager,
            token,
            out,
            pending: Vec::with_capacity(MAX_LINE_LEN + 1),
            discarding: false,
            handled: 0,
        }
    }

    /// Lines handled so far, including rejected ones.
    #[must_use]
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Serve `input` until it closes or the token is cancelled.
    pub fn run<R: Read + AsFd>(&mut self, mut input: R) -> io::Result<LoopExit> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if self.token.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }
            if !self.wait_readable(&input)? {
                continue;
            }
            let n = match input.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                self.finish()?;
                tracing::debug!(target: "paneflip.cmd", handled = self.handled, "end of input");
                return Ok(LoopExit::EndOfInput);
            }
            self.feed(&chunk[..n])?;
        }
    }

    /// Block until `input` is readable (`true`) or the wake fd fires.
    fn wait_readable<R: AsFd>(&self, input: &R) -> io::Result<bool> {
        let read = PollFlags::POLLIN;
        let mut fds = Vec::with_capacity(2);
        fds.push(PollFd::new(input.as_fd(), read));
        let timeout = match self.token.wake_fd() {
            Some(wake) => {
                fds.push(PollFd::new(wake, read));
                PollTimeout::NONE
            }
            // Without a wake descriptor cancellation is only seen between polls.
            None => PollTimeout::from(250u16),
        };
        match poll(&mut fds, timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(false),
            Err(e) => return Err(io::Error::from(e)),
        }
        // Hang-up and errors count as readable so the read reports them.
        let ready = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        Ok(fds[0].revents().is_some_and(|r| r.intersects(ready)))
    }

    fn feed(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        while let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
            let (head, tail) = bytes.split_at(pos);
            bytes = &tail[1..];
            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.pending.extend_from_slice(head);
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&line)?;
            self.pending = line;
            self.pending.clear();
        }
        if self.discarding {
            return Ok(());
        }
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_LINE_LEN {
            self.pending.clear();
            self.discarding = true;
            self.reply(Reply::ParseFailed(ParseError::TooLong))?;
        }
        Ok(())
    }

    /// Handle a final line that had no newline.
    fn finish(&mut self) -> io::Result<()> {
        if !self.discarding && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&line)?;
        }
        self.out.flush()
    }

    fn handle_line(&mut self, raw: &[u8]) -> io::Result<()> {
        let reply = if raw.len() > MAX_LINE_LEN {
            Reply::ParseFailed(ParseError::TooLong)
        } else {
            match std::str::from_utf8(raw) {
                Ok(line) => execute(self.manager, line),
                Err(_) => Reply::ParseFailed(ParseError::InvalidUtf8),
            }
        };
        self.reply(reply)
    }

    fn reply(&mut self, reply: Reply) -> io::Result<()> {
        self.handled += 1;
        if let Some(line) = reply.line() {
            tracing::warn!(target: "paneflip.cmd", reply = %line, "command failed");
            writeln!(self.out, "{line}")?;
            self.out.flush()?;
        }
        Ok(())
    }
}
