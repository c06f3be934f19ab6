//! Terminal session: login, send-settle-drain, streaming subscriptions
//!
//! The protocol carries no framing and no correlation ids, so a reply is
//! whatever arrives between sending a command and the first short read. A
//! session therefore allows exactly one command in flight, enforced by
//! `&mut self` on every operation that touches the stream.

use std::io;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use super::command::{self, Command, Level, Subscription};
use super::reply::Reply;
use super::transport::TcpTransport;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::Transport;
use crate::common::types::Quote;
use crate::config::types::{Credentials, SettleConfig, TerminalConfig};

/// Authentication lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Ready,
    Closed,
}

/// One persistent stream to the terminal
pub struct Session<T: Transport> {
    /// `None` once the session has been closed or the stream failed
    transport: Option<T>,
    state: SessionState,
    settle: SettleConfig,
    /// Read size; a read shorter than this ends a drain
    buffer_size: usize,
    /// Redacted text of the command whose reply has not been drained yet
    pending: Option<String>,
}

impl Session<TcpTransport> {
    /// Connect to the terminal described by `config`
    pub async fn connect(config: &TerminalConfig, settle: SettleConfig) -> Result<Self> {
        let transport = TcpTransport::connect(
            &config.host,
            config.port,
            config.connect_timeout(),
            config.read_timeout(),
        )
        .await?;
        Ok(Self::new(transport, config.buffer_size, settle))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, buffer_size: usize, settle: SettleConfig) -> Self {
        Self {
            transport: Some(transport),
            state: SessionState::Unauthenticated,
            settle,
            buffer_size: buffer_size.max(1),
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Send the login line and check the greeting
    #[instrument(skip(self, credentials), fields(user = %credentials.user))]
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<Reply> {
        if self.state != SessionState::Unauthenticated {
            return Err(ClientError::NotReady(self.state));
        }
        let login = command::login(credentials)?;

        self.state = SessionState::Authenticating;
        let greeting = self.cycle(&login).await?;
        info!("Login greeting: {}", greeting.raw());

        if greeting.contains_ignore_case("invalid") || greeting.contains_ignore_case("failed") {
            error!("Terminal refused login for {}", credentials.user);
            self.release().await;
            return Err(ClientError::Authentication(greeting.raw().to_string()));
        }

        self.state = SessionState::Ready;
        info!("Session ready for account {}", credentials.account);
        Ok(greeting)
    }

    /// Send one command and return everything drained after it settles
    ///
    /// A read timeout while draining yields an empty reply. Any other stream
    /// failure closes the session and returns `ClientError::Transport`.
    pub async fn execute(&mut self, command: &Command) -> Result<Reply> {
        if self.state != SessionState::Ready {
            return Err(ClientError::NotReady(self.state));
        }
        self.cycle(command).await
    }

    /// Like `execute`, but an empty reply is `ClientError::TimeoutNoData`
    pub async fn execute_expecting_data(&mut self, command: &Command) -> Result<Reply> {
        let reply = self.execute(command).await?;
        if reply.is_empty() {
            return Err(ClientError::TimeoutNoData(command.redacted()));
        }
        Ok(reply)
    }

    /// Run commands one after another, stopping at the first error
    pub async fn execute_batch(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(self.execute(command).await?);
        }
        Ok(replies)
    }

    /// Subscribe to Lv1 for one reply and parse the top of book
    #[instrument(skip(self))]
    pub async fn quote_snapshot(&mut self, symbol: &str) -> Result<Quote> {
        let subscription = Subscription::symbol(symbol, Level::Lv1)?;
        self.execute(&command::return_full_lv1(true)).await?;

        let result = self.first_quote(&subscription).await;
        let unsubscribe = subscription.unsubscribe_command();
        if self.is_ready() {
            if let Err(e) = self.execute(&unsubscribe).await {
                warn!("Failed to send {}: {}", unsubscribe.text(), e);
                result?;
                return Err(e);
            }
        }
        let quote = result?;
        debug!("{} bid={:?} ask={:?}", symbol, quote.bid, quote.ask);
        Ok(quote)
    }

    async fn first_quote(&mut self, subscription: &Subscription) -> Result<Quote> {
        let mut reply = self.execute(&subscription.subscribe_command()).await?;
        if reply.is_empty() {
            reply = self.poll().await?;
        }
        if reply.is_empty() {
            return Err(ClientError::TimeoutNoData(
                subscription.subscribe_command().text(),
            ));
        }
        Ok(Quote::from_lv1(reply.raw()))
    }

    /// Stream a subscription into `sink` until cancelled
    ///
    /// The cancel flag is read only between complete poll/drain cycles. The
    /// loop also ends when the sink is closed or the flag's sender is gone.
    /// The matching unsubscribe is sent on every exit path while the stream
    /// is still usable. Returns the number of replies forwarded.
    #[instrument(skip(self, sink, cancel))]
    pub async fn stream_subscription(
        &mut self,
        subscription: &Subscription,
        sink: mpsc::Sender<Reply>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<usize> {
        let first = self.execute(&subscription.subscribe_command()).await?;
        info!("Streaming {}", subscription.subscribe_command().text());

        let mut forwarded = 0;
        let outcome = self
            .stream_loop(first, &sink, &mut cancel, &mut forwarded)
            .await;

        let unsubscribe = subscription.unsubscribe_command();
        if self.is_ready() {
            if let Err(e) = self.execute(&unsubscribe).await {
                warn!("Failed to send {}: {}", unsubscribe.text(), e);
                outcome?;
                return Err(e);
            }
        } else {
            warn!("Session closed before {} could be sent", unsubscribe.text());
        }

        outcome?;
        info!("Stream ended after {} replies", forwarded);
        Ok(forwarded)
    }

    async fn stream_loop(
        &mut self,
        first: Reply,
        sink: &mpsc::Sender<Reply>,
        cancel: &mut watch::Receiver<bool>,
        forwarded: &mut usize,
    ) -> Result<()> {
        let mut reply = first;
        loop {
            if !reply.is_empty() {
                if sink.send(reply).await.is_err() {
                    debug!("Reply sink closed");
                    return Ok(());
                }
                *forwarded += 1;
            }
            if *cancel.borrow() || cancel.has_changed().is_err() {
                debug!("Cancellation observed");
                return Ok(());
            }
            tokio::task::yield_now().await;
            reply = self.poll().await?;
        }
    }

    /// Drain whatever has arrived without sending anything
    async fn poll(&mut self) -> Result<Reply> {
        sleep_if_nonzero(Duration::from_millis(self.settle.poll_ms)).await;
        self.drain().await
    }

    /// Send QUIT and release the stream; safe to call more than once
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        if self.state == SessionState::Ready {
            let quit = command::quit();
            if let Some(transport) = self.transport.as_mut() {
                if let Err(e) = transport.send(&quit.to_wire()).await {
                    warn!("Failed to send QUIT: {}", e);
                }
            }
        }
        self.release().await;
        info!("Session closed");
        Ok(())
    }

    async fn release(&mut self) {
        self.state = SessionState::Closed;
        self.pending = None;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                debug!("Shutdown after close: {}", e);
            }
        }
    }

    /// One send-settle-drain cycle
    async fn cycle(&mut self, command: &Command) -> Result<Reply> {
        if let Some(stale) = self.pending.take() {
            warn!("Discarding unread reply to {}", stale);
            let discarded = self.drain().await?;
            debug!("Discarded {} bytes", discarded.raw().len());
        }

        self.pending = Some(command.redacted());
        debug!("-> {}", command);

        let sent = self.transport_mut()?.send(&command.to_wire()).await;
        if let Err(e) = sent {
            return Err(self.fail(e));
        }

        sleep_if_nonzero(command.settle_class().delay(&self.settle)).await;

        let reply = self.drain().await?;
        self.pending = None;
        debug!("<- {} bytes", reply.raw().len());
        Ok(reply)
    }

    /// Read until a read comes back shorter than the buffer
    async fn drain(&mut self) -> Result<Reply> {
        let buffer_size = self.buffer_size;
        let mut data = Vec::new();
        let mut buf = vec![0u8; buffer_size];
        loop {
            let read = self.transport_mut()?.recv(&mut buf).await;
            match read {
                Ok(n) => {
                    data.extend_from_slice(&buf[..n]);
                    if n < buffer_size {
                        return Ok(Reply::from_bytes(&data));
                    }
                }
                Err(e) if is_timeout(&e) => {
                    if !data.is_empty() {
                        debug!("Read timed out with {} bytes buffered", data.len());
                    }
                    return Ok(Reply::empty());
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    fn transport_mut(&mut self) -> Result<&mut T> {
        let state = self.state;
        self.transport.as_mut().ok_or(ClientError::NotReady(state))
    }

    /// Close after a stream failure
    fn fail(&mut self, err: io::Error) -> ClientError {
        error!("Stream failure, closing session: {}", err);
        self.state = SessionState::Closed;
        self.pending = None;
        self.transport = None;
        ClientError::Transport(err.to_string())
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

async fn sleep_if_nonzero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
