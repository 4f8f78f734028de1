//! The throttled listen loop that owns a subscription for its lifetime.

use dalink_tasks::ShutdownGuard;
use tracing::*;

use crate::{
    processor::MessageProcessor,
    sub::{Frame, FrameSubscription},
};

/// Drives one feed until shutdown. Blocks on `recv`, validates the frame
/// shape, applies the throttle and dispatches to the processor.
///
/// Throttle contract: the counter counts *valid* frames, and the gate check
/// `counter % interval == 0` uses the pre-increment value. So the 1st,
/// (N+1)th, (2N+1)th... valid frames are processed; with `interval == 1`
/// every valid frame is. Invalid frames and receive errors do not touch the
/// counter. Processor errors are logged and the loop moves on.
pub async fn listen_loop<S, P>(
    mut sub: S,
    mut processor: P,
    interval: u64,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()>
where
    S: FrameSubscription,
    P: MessageProcessor,
{
    anyhow::ensure!(interval >= 1, "listener: throttle interval must be >= 1");

    let mut counter: u64 = 0;

    loop {
        let parts = tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                info!("listener got shutdown signal, exiting");
                return Ok(());
            }
            res = sub.recv() => match res {
                Ok(parts) => parts,
                Err(e) => {
                    error!(err = %e, "Failed to receive message");
                    continue;
                }
            },
        };

        let Some(frame) = Frame::from_parts(parts) else {
            warn!("Received message with unexpected number of parts");
            continue;
        };

        let gated_in = counter % interval == 0;
        counter += 1;
        if !gated_in {
            trace!(%counter, "throttled, skipping frame");
            continue;
        }

        debug!(topic = %frame.topic_str(), "Processing message");
        if let Err(e) = processor.process(&frame).await {
            error!(err = %e, "Error processing message");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{processor::ProcessError, sub::SubscribeError};

    /// Feed backed by a channel; yields queued messages then pends forever.
    struct ChannelSubscription {
        rx: mpsc::UnboundedReceiver<Vec<Bytes>>,
    }

    #[async_trait]
    impl FrameSubscription for ChannelSubscription {
        async fn recv(&mut self) -> Result<Vec<Bytes>, SubscribeError> {
            match self.rx.recv().await {
                Some(parts) => Ok(parts),
                // Channel closed; pend so the loop blocks like a real socket.
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingProcessor {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MessageProcessor for CountingProcessor {
        async fn process(&mut self, frame: &Frame) -> Result<(), ProcessError> {
            self.seen.lock().push(frame.topic_str());
            Ok(())
        }
    }

    fn valid_frame(n: u32) -> Vec<Bytes> {
        vec![
            Bytes::from_static(b"rawblock"),
            Bytes::from_static(b"payload"),
            Bytes::from(n.to_le_bytes().to_vec()),
        ]
    }

    async fn run_loop_until_shutdown(
        frames: Vec<Vec<Bytes>>,
        interval: u64,
    ) -> Vec<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        for f in frames {
            tx.send(f).unwrap();
        }

        let processor = CountingProcessor::default();
        let seen = processor.seen.clone();

        let manager = dalink_tasks::TaskManager::new(tokio::runtime::Handle::current());
        let executor = manager.executor();
        let shutdown_sig = manager.shutdown_signal();

        let handle = executor.spawn_critical_async_with_shutdown("listener", |shutdown| async move {
            let sub = ChannelSubscription { rx };
            let _ = listen_loop(sub, processor, interval, shutdown).await;
        });

        // Give the loop time to drain the queue, then stop it.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        shutdown_sig.send();
        let _ = handle.await;

        let out = seen.lock().clone();
        out
    }

    #[tokio::test]
    async fn every_valid_frame_processed_at_interval_one() {
        let frames = (0..5).map(valid_frame).collect();
        let seen = run_loop_until_shutdown(frames, 1).await;
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn interval_n_processes_every_nth_valid_frame() {
        // 7 valid frames at interval 3: indices 0, 3 and 6 pass the gate.
        let frames = (0..7).map(valid_frame).collect();
        let seen = run_loop_until_shutdown(frames, 3).await;
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn invalid_frames_do_not_reach_processor_or_counter() {
        // Two-part messages are rejected before the throttle; the valid
        // frames still line up as counter values 0..3.
        let mut frames = Vec::new();
        for n in 0..4u32 {
            frames.push(vec![Bytes::from_static(b"rawblock"), Bytes::from_static(b"x")]);
            frames.push(valid_frame(n));
        }
        let seen = run_loop_until_shutdown(frames, 2).await;
        // Valid frames 0 and 2 pass the gate.
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_ends_the_loop() {
        let seen = run_loop_until_shutdown(Vec::new(), 1).await;
        assert!(seen.is_empty());
    }
}
