//! Trait definitions for the protocol and workflow seams

use async_trait::async_trait;
use std::io;

/// Byte stream underneath a terminal session
///
/// The session owns exactly one transport. Implementations apply their own
/// per-read timeout and report expiry as `io::ErrorKind::TimedOut`.
#[async_trait]
pub trait Transport: Send {
    /// Write the whole buffer to the stream
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, returning how many were read
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Flush and release the underlying stream
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Operator approval between workflow stages
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Return true to run the named stage
    async fn confirm(&self, stage: &str) -> bool;
}

/// Approves every stage; used for `--autorun`
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Confirm for AutoApprove {
    async fn confirm(&self, _stage: &str) -> bool {
        true
    }
}
