//! Per-connection read and write loops.
//!
//! Each admitted connection runs two units of work:
//!
//! - the **inbound loop**, on the upgrade task, reads frames only to
//!   detect liveness and closure. Its read deadline is pushed forward on
//!   every pong; a peer that vanished without a close frame is detected
//!   when the deadline passes.
//! - the **outbound loop**, on its own task, drains the session queue and
//!   sends a ping every [`SessionConfig::ping_period`]. Every write has its
//!   own deadline.
//!
//! Whichever loop ends first ends the session: the other is cancelled or
//! told to stop, the session is removed from the hub and the transport is
//! dropped.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::config::SessionConfig;
use crate::domain::{Hub, Identity, Outbox, Session, SessionState};

const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Why the inbound loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEnd {
    /// No pong arrived within the liveness window.
    LivenessTimeout,
    /// The peer sent a close frame.
    PeerClosed,
    /// The transport reported end of stream.
    Eof,
    /// The peer sent a frame larger than allowed.
    Oversized(usize),
    /// The transport failed.
    ReadFailed(String),
}

/// Why the outbound loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEnd {
    /// The hub closed the session queue.
    QueueClosed,
    /// A write did not complete within the write deadline.
    WriteTimeout,
    /// The transport rejected a write.
    WriteFailed(String),
}

/// Runs an authenticated connection until either side terminates.
///
/// Admits a new [`Session`] for `identity`, drives both loops, and on the
/// first terminal condition removes the session from the hub and releases
/// the transport. Nothing is returned: every failure here is local to this
/// one connection and is only logged.
pub async fn run_connection<S, E>(socket: S, identity: Identity, hub: Hub, config: SessionConfig)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: fmt::Display + Send,
    E: fmt::Display + Send,
{
    let (session, outbox) = Session::new(identity, config.queue_capacity);
    let span = tracing::info_span!(
        "session",
        user_id = %session.user_id(),
        session_id = %session.id(),
    );
    drive(socket, session, outbox, hub, config)
        .instrument(span)
        .await;
}

async fn drive<S, E>(socket: S, session: Session, outbox: Outbox, hub: Hub, config: SessionConfig)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: fmt::Display + Send,
    E: fmt::Display + Send,
{
    let mut state = SessionState::Connecting;
    let (sink, mut stream) = socket.split();

    let key = match hub.admit(session).await {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "session not admitted");
            transition(&mut state, SessionState::Closing);
            transition(&mut state, SessionState::Closed);
            return;
        }
    };
    transition(&mut state, SessionState::Admitted);

    let mut writer: JoinHandle<OutboundEnd> =
        tokio::spawn(write_loop(sink, outbox, config).in_current_span());

    let writer_done = tokio::select! {
        end = read_loop(&mut stream, &config) => {
            tracing::debug!(reason = ?end, "inbound loop ended");
            false
        }
        joined = &mut writer => {
            match joined {
                Ok(end) => tracing::debug!(reason = ?end, "outbound loop ended"),
                Err(e) => tracing::warn!(error = %e, "outbound task failed"),
            }
            true
        }
    };
    transition(&mut state, SessionState::Closing);

    // Removal closes the queue, which is the outbound loop's stop signal.
    if let Err(e) = hub.remove(key).await {
        tracing::warn!(error = %e, "failed to remove session from hub");
    }

    if !writer_done {
        // The writer finishes its current write, sends a close frame and
        // exits; both are bounded by the write deadline.
        let grace = config.write_wait.saturating_mul(2);
        match tokio::time::timeout(grace, &mut writer).await {
            Ok(Ok(end)) => tracing::debug!(reason = ?end, "outbound loop ended"),
            Ok(Err(e)) => tracing::warn!(error = %e, "outbound task failed"),
            Err(_) => {
                tracing::warn!("outbound loop did not stop in time, aborting");
                writer.abort();
            }
        }
    }

    drop(stream);
    transition(&mut state, SessionState::Closed);
}

fn transition(state: &mut SessionState, next: SessionState) {
    match state.advance(next) {
        Ok(advanced) => {
            tracing::debug!(from = ?*state, to = ?advanced, "session state");
            *state = advanced;
        }
        Err(e) => tracing::error!(error = %e, "session state machine violated"),
    }
}

/// Reads until the transport fails, closes, or goes quiet for longer than
/// [`SessionConfig::pong_wait`].
///
/// Only pongs extend the deadline. Other inbound frames are ignored apart
/// from the size check.
async fn read_loop<R, E>(stream: &mut R, config: &SessionConfig) -> InboundEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut deadline = deadline_after(config.pong_wait);
    loop {
        let Ok(next) = tokio::time::timeout_at(deadline, stream.next()).await else {
            return InboundEnd::LivenessTimeout;
        };
        let message = match next {
            None => return InboundEnd::Eof,
            Some(Err(e)) => return InboundEnd::ReadFailed(e.to_string()),
            Some(Ok(message)) => message,
        };
        match message {
            Message::Pong(_) => {
                deadline = deadline_after(config.pong_wait);
            }
            Message::Close(_) => return InboundEnd::PeerClosed,
            Message::Text(text) if text.as_str().len() > config.max_frame_size => {
                return InboundEnd::Oversized(text.as_str().len());
            }
            Message::Binary(data) if data.len() > config.max_frame_size => {
                return InboundEnd::Oversized(data.len());
            }
            _ => tracing::trace!("ignoring inbound frame"),
        }
    }
}

/// Drains `outbox` into `sink`, interleaving pings.
///
/// Returns when the queue is closed (after sending a close frame) or when
/// any write fails or overruns its deadline.
async fn write_loop<W>(mut sink: W, mut outbox: Outbox, config: SessionConfig) -> OutboundEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let period = config.ping_period();
    let mut ping = tokio::time::interval_at(deadline_after(period), period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbox.recv() => {
                let Some(frame) = frame else {
                    let _ = write_frame(&mut sink, Message::Close(None), &config).await;
                    return OutboundEnd::QueueClosed;
                };
                if let Err(end) = write_frame(&mut sink, Message::text(String::from(&*frame)), &config).await {
                    return end;
                }
            }
            _ = ping.tick() => {
                if let Err(end) = write_frame(&mut sink, Message::Ping(Bytes::new()), &config).await {
                    return end;
                }
            }
        }
    }
}

/// `now + wait`, capped about a year out instead of overflowing.
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait.min(FAR_FUTURE)).unwrap_or(now)
}

async fn write_frame<W>(
    sink: &mut W,
    message: Message,
    config: &SessionConfig,
) -> Result<(), OutboundEnd>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match tokio::time::timeout(config.write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(OutboundEnd::WriteFailed(e.to_string())),
        Err(_) => Err(OutboundEnd::WriteTimeout),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use futures_util::{future, sink, stream};
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{Envelope, HubConfig, UserId};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            queue_capacity: 8,
            write_wait: Duration::from_millis(50),
            pong_wait: Duration::from_millis(60),
            max_frame_size: 512,
        }
    }

    fn make_session() -> (Session, Outbox) {
        Session::new(Identity::new(UserId::new(1), "alice"), 8)
    }

    /// Joins a read half and a write half into one socket-like value.
    struct Duplex<R, W> {
        reader: R,
        writer: W,
    }

    impl<R: Stream + Unpin, W: Unpin> Stream for Duplex<R, W> {
        type Item = R::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R::Item>> {
            Pin::new(&mut self.reader).poll_next(cx)
        }
    }

    impl<R: Unpin, W: Sink<Message> + Unpin> Sink<Message> for Duplex<R, W> {
        type Error = W::Error;

        fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), W::Error>> {
            Pin::new(&mut self.writer).poll_ready(cx)
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), W::Error> {
            Pin::new(&mut self.writer).start_send(item)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), W::Error>> {
            Pin::new(&mut self.writer).poll_flush(cx)
        }

        fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), W::Error>> {
            Pin::new(&mut self.writer).poll_close(cx)
        }
    }

    async fn wait_for_count(hub: &Hub, user_id: UserId, expected: usize) {
        for _ in 0..200 {
            if hub.session_count(user_id).await == Ok(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("user {user_id} never reached {expected} sessions");
    }

    /// Sink that forwards every written message to a channel.
    fn capture_sink() -> (
        impl Sink<Message, Error = &'static str> + Unpin,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = sink::unfold(tx, |tx, message: Message| async move {
            tx.send(message).map_err(|_| "receiver gone")?;
            Ok::<_, &'static str>(tx)
        });
        (Box::pin(sink), rx)
    }

    #[tokio::test]
    async fn silent_peer_hits_liveness_deadline() {
        let mut quiet = stream::pending::<Result<Message, Infallible>>();
        let started = Instant::now();
        let end = read_loop(&mut quiet, &fast_config()).await;
        assert_eq!(end, InboundEnd::LivenessTimeout);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn pongs_extend_the_deadline() {
        let pongs = stream::iter(0..5)
            .then(|_| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, Infallible>(Message::Pong(Bytes::new()))
            })
            .chain(stream::pending());
        let mut pongs = Box::pin(pongs);
        let started = Instant::now();
        let end = read_loop(&mut pongs, &fast_config()).await;
        assert_eq!(end, InboundEnd::LivenessTimeout);
        // Five pongs 30ms apart keep a 60ms window open well past 60ms.
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn inbound_text_does_not_extend_the_deadline() {
        let chatter = stream::iter(0..10)
            .then(|_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, Infallible>(Message::text("typing"))
            })
            .chain(stream::pending());
        let mut chatter = Box::pin(chatter);
        let started = Instant::now();
        let end = read_loop(&mut chatter, &fast_config()).await;
        assert_eq!(end, InboundEnd::LivenessTimeout);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn oversized_frame_aborts() {
        let mut frames = stream::iter(vec![Ok::<_, Infallible>(Message::text("x".repeat(600)))]);
        let end = read_loop(&mut frames, &fast_config()).await;
        assert_eq!(end, InboundEnd::Oversized(600));
    }

    #[tokio::test]
    async fn close_frame_ends_inbound() {
        let mut frames = stream::iter(vec![Ok::<_, Infallible>(Message::Close(None))]);
        assert_eq!(
            read_loop(&mut frames, &fast_config()).await,
            InboundEnd::PeerClosed
        );
    }

    #[tokio::test]
    async fn read_error_and_eof_end_inbound() {
        let mut broken = stream::iter(vec![Err::<Message, _>("connection reset")]);
        assert_eq!(
            read_loop(&mut broken, &fast_config()).await,
            InboundEnd::ReadFailed("connection reset".to_string())
        );

        let mut empty = stream::iter(Vec::<Result<Message, Infallible>>::new());
        assert_eq!(read_loop(&mut empty, &fast_config()).await, InboundEnd::Eof);
    }

    #[test]
    fn huge_waits_do_not_overflow_deadlines() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > Instant::now());
    }

    #[tokio::test]
    async fn queued_frames_are_written_as_text() {
        let (session, outbox) = make_session();
        let (sink, mut written) = capture_sink();
        let writer = tokio::spawn(write_loop(sink, outbox, fast_config()));

        assert!(session.enqueue(Arc::from(r#"{"type":"message","payload":{}}"#)));
        let Some(Message::Text(text)) = written.recv().await else {
            panic!("expected a text frame");
        };
        assert_eq!(text.as_str(), r#"{"type":"message","payload":{}}"#);

        drop(session);
        let Ok(end) = writer.await else {
            panic!("writer panicked");
        };
        assert_eq!(end, OutboundEnd::QueueClosed);
    }

    #[tokio::test]
    async fn closed_queue_sends_close_frame() {
        let (mut session, outbox) = make_session();
        let (sink, mut written) = capture_sink();
        session.close();

        let end = write_loop(sink, outbox, fast_config()).await;
        assert_eq!(end, OutboundEnd::QueueClosed);
        assert!(matches!(written.recv().await, Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn idle_connection_is_pinged() {
        let (_session, outbox) = make_session();
        let (sink, mut written) = capture_sink();
        let writer = tokio::spawn(write_loop(sink, outbox, fast_config()));

        let first = tokio::time::timeout(Duration::from_millis(500), written.recv()).await;
        assert!(matches!(first, Ok(Some(Message::Ping(_)))));
        writer.abort();
    }

    #[tokio::test]
    async fn write_failure_ends_outbound() {
        let (session, outbox) = make_session();
        let broken = Box::pin(sink::unfold((), |(), _message: Message| async {
            Err::<(), _>("broken pipe")
        }));

        assert!(session.enqueue(Arc::from("hello")));
        let end = write_loop(broken, outbox, fast_config()).await;
        assert_eq!(end, OutboundEnd::WriteFailed("broken pipe".to_string()));
    }

    #[tokio::test]
    async fn stuck_write_hits_write_deadline() {
        let (session, outbox) = make_session();
        let stuck = Box::pin(sink::unfold((), |(), _message: Message| {
            future::pending::<Result<(), &'static str>>()
        }));

        assert!(session.enqueue(Arc::from("hello")));
        let end = write_loop(stuck, outbox, fast_config()).await;
        assert_eq!(end, OutboundEnd::WriteTimeout);
    }

    #[tokio::test]
    async fn failed_write_tears_down_whole_session() {
        let hub = Hub::spawn(HubConfig::default());
        let alice = UserId::new(1);
        // Long liveness window: only the write side can end this session.
        let config = SessionConfig {
            pong_wait: Duration::from_secs(30),
            ..fast_config()
        };
        let socket = Duplex {
            reader: stream::pending::<Result<Message, Infallible>>(),
            writer: Box::pin(sink::unfold((), |(), _message: Message| async {
                Err::<(), _>("broken pipe")
            })),
        };

        let connection = tokio::spawn(run_connection(
            socket,
            Identity::new(alice, "alice"),
            hub.clone(),
            config,
        ));
        wait_for_count(&hub, alice, 1).await;

        let envelope = Envelope::new("message", serde_json::json!({"content": "hi"}));
        assert!(hub.notify(alice, &envelope));

        let Ok(joined) = tokio::time::timeout(Duration::from_secs(2), connection).await else {
            panic!("connection outlived its failed write");
        };
        assert!(joined.is_ok());
        assert_eq!(hub.session_count(alice).await, Ok(0));
    }
}
