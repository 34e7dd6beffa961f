//! The polling relay loop.
//!
//! Relays input to output unchanged while tracking idle/active transitions
//! and dispatching hooks on qualifying edges. Single task; the bounded wait
//! for input readability is the only suspension point, and hook execution
//! blocks the loop for its duration.

use std::io;
use std::time::Duration;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use crate::hooks::HookEvent;
use crate::hooks::HookRunner;
use crate::state::Edge;
use crate::state::StateTracker;
use crate::state::Thresholds;

/// Relay read buffer size. Not semantically load-bearing, throughput only.
const BUFFER_SIZE: usize = 4096;

/// How long each wait for input readability lasts before a pure-time tick.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Stream activity monitor.
///
/// Generic over the hook runner so tests can observe dispatches with a
/// recording stub instead of a shell.
pub struct Monitor<H> {
    thresholds: Thresholds,
    hooks: H,
    poll_interval: Duration,
}

impl<H: HookRunner> Monitor<H> {
    /// Create a monitor with the standard one-second poll interval.
    pub fn new(thresholds: Thresholds, hooks: H) -> Self {
        Self {
            thresholds,
            hooks,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the poll interval. Used by tests to run at millisecond scale.
    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the relay until end-of-input or a fatal I/O error.
    ///
    /// Bytes read from `reader` are written to `writer` unchanged and in
    /// order. Returns `Ok(())` on clean EOF, after the EOF hook has completed.
    pub async fn run<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut tracker = StateTracker::new(self.thresholds, Instant::now());
        let mut buf = vec![0u8; BUFFER_SIZE];

        loop {
            let polled = timeout(self.poll_interval, reader.read(&mut buf)).await;
            let now = Instant::now();

            match polled {
                Ok(Ok(0)) => {
                    debug!("End of input reached");
                    self.hooks.run(HookEvent::Eof).await;
                    return Ok(());
                }
                Ok(Ok(n)) => {
                    // Relay in full before any transition handling.
                    writer
                        .write_all(&buf[..n])
                        .await
                        .context("Failed to write to output")?;
                    writer.flush().await.context("Failed to flush output")?;
                    trace!("Relayed {} bytes", n);

                    if let Some(edge) = tracker.on_data(now) {
                        self.dispatch(edge).await;
                    }
                }
                Ok(Err(e))
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    // Raced with the readiness wait; no data this tick.
                    trace!("Read would block, treating as no data");
                }
                Ok(Err(e)) => {
                    return Err(e).context("Failed to read from input");
                }
                Err(_elapsed) => {
                    // Poll interval elapsed with no data; time-based
                    // transitions are evaluated below.
                }
            }

            // Runs every tick: idleness is detected by the passage of time
            // alone. After fresh data this sees zero silence and is a no-op.
            if let Some(edge) = tracker.on_tick(now) {
                self.dispatch(edge).await;
            }
        }
    }

    /// Log a transition and run its hook if the dwell threshold was met.
    async fn dispatch(&mut self, edge: Edge) {
        match edge {
            Edge::Activated { hook_eligible } => {
                debug!("Transition: idle -> active (hook_eligible={hook_eligible})");
                if hook_eligible {
                    self.hooks.run(HookEvent::Activated).await;
                }
            }
            Edge::Idled { hook_eligible } => {
                debug!("Transition: active -> idle (hook_eligible={hook_eligible})");
                if hook_eligible {
                    self.hooks.run(HookEvent::Idled).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::task::Poll;
    use tokio::time::sleep;

    /// Hook runner that records dispatched events.
    #[derive(Clone, Default)]
    struct RecordingHooks {
        events: Arc<Mutex<Vec<HookEvent>>>,
    }

    #[async_trait]
    impl HookRunner for RecordingHooks {
        async fn run(&mut self, event: HookEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Reader that plays back a scripted sequence of read results, then EOF.
    struct ScriptedReader {
        script: std::collections::VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedReader {
        fn new(script: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            match this.script.pop_front() {
                Some(Ok(bytes)) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                Some(Err(e)) => Poll::Ready(Err(e)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    /// Writer whose writes always fail.
    struct FailingWriter;

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone")))
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn monitor(
        idle_timeout: Duration,
        idle_to_active: Duration,
        active_to_idle: Duration,
    ) -> (Monitor<RecordingHooks>, Arc<Mutex<Vec<HookEvent>>>) {
        let hooks = RecordingHooks::default();
        let events = hooks.events.clone();
        let monitor = Monitor::new(
            Thresholds {
                idle_timeout,
                idle_to_active,
                active_to_idle,
            },
            hooks,
        )
        .with_poll_interval(ms(5));
        (monitor, events)
    }

    #[tokio::test]
    async fn test_passthrough_preserves_bytes() {
        let (mut tx, rx) = tokio::io::duplex(8);
        // Instant activation is below threshold, so only EOF fires a hook.
        let (mut monitor, events) = monitor(ms(1000), ms(1000), ms(1000));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            tx.write_all(b"hello ").await.unwrap();
            tx.write_all(b"idle ").await.unwrap();
            tx.write_all(b"world").await.unwrap();
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        assert_eq!(out, b"hello idle world");
        assert_eq!(*events.lock().unwrap(), vec![HookEvent::Eof]);
    }

    #[tokio::test]
    async fn test_activation_below_threshold_does_not_fire_hook() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(1000), ms(60_000), ms(60_000));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            tx.write_all(b"data").await.unwrap();
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        // Phase went active, but the idle dwell was far below threshold.
        assert_eq!(*events.lock().unwrap(), vec![HookEvent::Eof]);
    }

    #[tokio::test]
    async fn test_activation_hook_fires_once_after_quiet_period() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(1000), ms(50), ms(60_000));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            sleep(ms(120)).await;
            tx.write_all(b"a").await.unwrap();
            sleep(ms(10)).await;
            tx.write_all(b"b").await.unwrap();
            tx.write_all(b"c").await.unwrap();
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        // One hook for the transition, none for the later bytes while active.
        assert_eq!(
            *events.lock().unwrap(),
            vec![HookEvent::Activated, HookEvent::Eof]
        );
        assert_eq!(out, b"abc");
    }

    #[tokio::test]
    async fn test_idle_detection_is_time_driven() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(40), ms(60_000), ms(10));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            tx.write_all(b"burst").await.unwrap();
            // Keep the input open with no data so idleness is detected by
            // the passage of time, then close it.
            sleep(ms(150)).await;
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![HookEvent::Idled, HookEvent::Eof]
        );
    }

    #[tokio::test]
    async fn test_idled_hook_suppressed_below_active_dwell_threshold() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(30), ms(60_000), ms(60_000));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            tx.write_all(b"x").await.unwrap();
            sleep(ms(100)).await;
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        // The stream went idle, but the active dwell was below threshold.
        assert_eq!(*events.lock().unwrap(), vec![HookEvent::Eof]);
    }

    #[tokio::test]
    async fn test_each_qualifying_transition_fires_again() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(20), ms(30), ms(60_000));
        let mut out = Vec::new();

        let writer = tokio::spawn(async move {
            // First burst after 60ms idle: qualifies.
            sleep(ms(60)).await;
            tx.write_all(b"a").await.unwrap();
            // Silence flips the stream idle at ~20ms; by 150ms the second
            // idle dwell also clears the 30ms threshold.
            sleep(ms(150)).await;
            tx.write_all(b"b").await.unwrap();
            sleep(ms(10)).await;
        });

        monitor.run(rx, &mut out).await.unwrap();
        writer.await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![HookEvent::Activated, HookEvent::Activated, HookEvent::Eof]
        );
        assert_eq!(out, b"ab");
    }

    #[tokio::test]
    async fn test_eof_hook_runs_once_and_loop_exits() {
        let (tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(1000), ms(1000), ms(1000));
        let mut out = Vec::new();

        drop(tx);
        monitor.run(rx, &mut out).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(*events.lock().unwrap(), vec![HookEvent::Eof]);
    }

    #[tokio::test]
    async fn test_would_block_and_interrupted_reads_are_no_data() {
        let reader = ScriptedReader::new(vec![
            Err(io::Error::from(io::ErrorKind::WouldBlock)),
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(b"ok".to_vec()),
        ]);
        let (mut monitor, events) = monitor(ms(1000), ms(1000), ms(1000));
        let mut out = Vec::new();

        monitor.run(reader, &mut out).await.unwrap();

        // Relay survives both error kinds, and they cause no transition.
        assert_eq!(out, b"ok");
        assert_eq!(*events.lock().unwrap(), vec![HookEvent::Eof]);
    }

    #[tokio::test]
    async fn test_fatal_read_error_aborts_without_eof_hook() {
        let reader = ScriptedReader::new(vec![Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad stream",
        ))]);
        let (mut monitor, events) = monitor(ms(1000), ms(1000), ms(1000));
        let mut out = Vec::new();

        let result = monitor.run(reader, &mut out).await;

        assert!(result.is_err());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let (mut monitor, events) = monitor(ms(1000), ms(1000), ms(1000));

        let writer = tokio::spawn(async move {
            tx.write_all(b"doomed").await.unwrap();
            sleep(ms(100)).await;
        });

        let result = monitor.run(rx, FailingWriter).await;
        writer.await.unwrap();

        assert!(result.is_err());
        // No EOF hook on the fatal path.
        assert!(events.lock().unwrap().is_empty());
    }
}
