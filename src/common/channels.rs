//! Channel type definitions for inter-task communication

use tokio::sync::{mpsc, watch};

use crate::das::reply::Reply;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a channel carrying streamed subscription replies
pub fn create_reply_channel() -> (mpsc::Sender<Reply>, mpsc::Receiver<Reply>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create the cancellation flag shared by a streaming loop and its watcher
///
/// The watcher sets `true`; the streaming loop reads it between I/O cycles.
pub fn create_cancel_flag() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
