//! Node-style IPC bridge.
//!
//! When tsrun itself was started with an IPC channel (`NODE_CHANNEL_FD`), the
//! child gets its own channel on fd 3 and newline-delimited messages are
//! forwarded in both directions by two independent tasks.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Environment variable naming the IPC file descriptor.
pub const NODE_CHANNEL_FD: &str = "NODE_CHANNEL_FD";

/// Descriptor the child's channel is installed on.
pub const CHILD_CHANNEL_FD: RawFd = 3;

/// Parent channel plus a fresh socket pair for the child.
#[derive(Debug)]
pub struct IpcChannel {
    upstream: StdUnixStream,
    ours: StdUnixStream,
    theirs: OwnedFd,
}

impl IpcChannel {
    /// Take over the channel named by `NODE_CHANNEL_FD`, if any.
    pub fn from_env() -> io::Result<Option<Self>> {
        let Some(fd) = std::env::var(NODE_CHANNEL_FD)
            .ok()
            .and_then(|v| v.trim().parse::<RawFd>().ok())
        else {
            return Ok(None);
        };
        // SAFETY: F_GETFD only probes whether the descriptor is open.
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            return Ok(None);
        }
        // SAFETY: checked above that `fd` is an open descriptor; tsrun never
        // uses it anywhere else.
        let upstream = unsafe { StdUnixStream::from_raw_fd(fd) };
        set_cloexec(upstream.as_raw_fd(), true)?;
        Self::with_upstream(upstream).map(Some)
    }

    /// Bridge to an explicit upstream socket.
    pub fn with_upstream(upstream: StdUnixStream) -> io::Result<Self> {
        let (ours, theirs) = StdUnixStream::pair()?;
        Ok(Self {
            upstream,
            ours,
            theirs: theirs.into(),
        })
    }

    /// Install the child end on fd 3 and tell the child about it.
    pub fn configure(&self, command: &mut Command) {
        let child_fd = self.theirs.as_raw_fd();
        command.env(NODE_CHANNEL_FD, CHILD_CHANNEL_FD.to_string());
        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            command.pre_exec(move || {
                if child_fd == CHILD_CHANNEL_FD {
                    return set_cloexec(child_fd, false);
                }
                if libc::dup2(child_fd, CHILD_CHANNEL_FD) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    /// Start forwarding. Call after the child was spawned; drops the child
    /// end in this process.
    pub fn start(self) -> io::Result<IpcBridge> {
        drop(self.theirs);
        let upstream = into_tokio(self.upstream)?;
        let ours = into_tokio(self.ours)?;

        let (upstream_read, upstream_write) = upstream.into_split();
        let (child_read, child_write) = ours.into_split();

        Ok(IpcBridge {
            to_child: tokio::spawn(forward_lines(upstream_read, child_write, "parent -> child")),
            to_parent: tokio::spawn(forward_lines(child_read, upstream_write, "child -> parent")),
        })
    }
}

/// The two forwarding tasks.
#[derive(Debug)]
pub struct IpcBridge {
    to_child: JoinHandle<()>,
    to_parent: JoinHandle<()>,
}

impl IpcBridge {
    /// Stop both directions.
    pub fn close(&self) {
        self.to_child.abort();
        self.to_parent.abort();
    }
}

impl Drop for IpcBridge {
    fn drop(&mut self) {
        self.close();
    }
}

async fn forward_lines<R, W>(reader: R, mut writer: W, direction: &'static str)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(n) => {
                trace!(direction, bytes = n, "ipc message");
                if writer.write_all(&line).await.is_err() || writer.flush().await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(direction, error = %e, "ipc read failed");
                break;
            }
        }
    }
    debug!(direction, "ipc forwarding stopped");
}

fn into_tokio(stream: StdUnixStream) -> io::Result<UnixStream> {
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

fn set_cloexec(fd: RawFd, on: bool) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        let flags = if on {
            flags | libc::FD_CLOEXEC
        } else {
            flags & !libc::FD_CLOEXEC
        };
        if libc::fcntl(fd, libc::F_SETFD, flags) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::{exit_code, ChildCommand, SupervisedChild};
    use std::io::{BufRead, Write};

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (parent_side, upstream) = StdUnixStream::pair().unwrap();
        let channel = IpcChannel::with_upstream(upstream).unwrap();

        // Child echoes one line from fd 3 back to fd 3, uppercased.
        let spec = ChildCommand::new("sh")
            .arg("-c")
            .arg(r#"read line <&3; printf '%s\n' "$line" | tr a-z A-Z >&3"#);
        let mut command = spec.to_command();
        channel.configure(&mut command);
        let mut child = SupervisedChild::spawn_command(&spec, command).unwrap();
        let bridge = channel.start().unwrap();

        let reply = tokio::task::spawn_blocking(move || {
            let mut writer = parent_side.try_clone().unwrap();
            writer.write_all(b"{\"cmd\":\"ping\"}\n").unwrap();
            let mut reader = std::io::BufReader::new(parent_side);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            line
        })
        .await
        .unwrap();

        assert_eq!(reply, "{\"CMD\":\"PING\"}\n");
        assert_eq!(exit_code(&child.wait().await.unwrap()), 0);
        bridge.close();
    }

    #[test]
    fn test_no_channel_without_env() {
        if std::env::var_os(NODE_CHANNEL_FD).is_none() {
            assert!(IpcChannel::from_env().unwrap().is_none());
        }
    }
}
