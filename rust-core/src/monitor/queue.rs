//! Bounded display queue between the worker and the UI
//!
//! The worker never blocks: when the queue is full the oldest entry is dropped.

use super::LoopFatal;
use crate::scoring::AnomalyEvent;
use crate::sink::DisplaySink;
use crate::spectrum::SpectrumFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Item handed from the worker to the display side
#[derive(Debug, Clone)]
pub enum MonitorOutput {
    Frame(SpectrumFrame),
    Event(AnomalyEvent),
    /// The loop stopped itself after repeated failures
    Stopped(LoopFatal),
}

/// Create a queue holding at most `capacity` outputs
pub fn display_queue(capacity: usize) -> (DisplayQueue, DisplayReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        DisplayQueue {
            tx,
            evict: rx.clone(),
            dropped: Arc::clone(&dropped),
        },
        DisplayReceiver { rx, dropped },
    )
}

/// Worker end of the display queue
#[derive(Clone)]
pub struct DisplayQueue {
    tx: Sender<MonitorOutput>,
    /// Receiver used only to evict the oldest entry on overflow
    evict: Receiver<MonitorOutput>,
    dropped: Arc<AtomicU64>,
}

impl DisplayQueue {
    /// Enqueue, evicting the oldest entries until there is room
    ///
    /// # Returns
    /// Number of entries evicted
    pub fn push(&self, output: MonitorOutput) -> u64 {
        let mut output = output;
        let mut evicted = 0;

        loop {
            match self.tx.try_send(output) {
                Ok(()) => break,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        evicted += 1;
                    }
                    output = back;
                }
                // Unreachable while `evict` is alive
                Err(TrySendError::Disconnected(_)) => break,
            }
        }

        if evicted > 0 {
            self.dropped.fetch_add(evicted, Ordering::Relaxed);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Display end of the queue, drained from the UI's own timer
pub struct DisplayReceiver {
    rx: Receiver<MonitorOutput>,
    dropped: Arc<AtomicU64>,
}

impl DisplayReceiver {
    pub fn try_recv(&self) -> Option<MonitorOutput> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<MonitorOutput> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> Vec<MonitorOutput> {
        self.rx.try_iter().collect()
    }

    /// Hand everything currently queued to `sink`
    ///
    /// # Returns
    /// Number of outputs delivered
    pub fn drain_into<S: DisplaySink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut delivered = 0;
        for output in self.rx.try_iter() {
            match &output {
                MonitorOutput::Frame(frame) => sink.on_frame(frame),
                MonitorOutput::Event(event) => sink.on_event(event),
                MonitorOutput::Stopped(fatal) => sink.on_stopped(fatal),
            }
            delivered += 1;
        }
        delivered
    }

    /// Outputs evicted so far because the display fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{AnomalyCategory, ThreatLevel};
    use chrono::Utc;

    fn event(frequency: f64) -> MonitorOutput {
        MonitorOutput::Event(AnomalyEvent {
            timestamp: Utc::now(),
            frequency,
            score: 0.5,
            level: ThreatLevel::High,
            category: AnomalyCategory::StrongTransmitter,
            description: String::new(),
        })
    }

    fn frequency(output: &MonitorOutput) -> f64 {
        match output {
            MonitorOutput::Event(e) => e.frequency,
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_fifo_order() {
        let (queue, receiver) = display_queue(10);
        for i in 0..5 {
            queue.push(event(i as f64));
        }

        let drained: Vec<f64> = receiver.drain().iter().map(frequency).collect();
        assert_eq!(drained, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let (queue, receiver) = display_queue(3);
        for i in 0..7 {
            queue.push(event(i as f64));
            assert!(queue.len() <= 3);
        }

        let drained: Vec<f64> = receiver.drain().iter().map(frequency).collect();
        assert_eq!(drained, vec![4.0, 5.0, 6.0]);
        assert_eq!(receiver.dropped(), 4);
    }

    #[test]
    fn test_push_never_blocks_without_consumer() {
        let (queue, receiver) = display_queue(1);
        for i in 0..1000 {
            queue.push(event(i as f64));
        }
        assert_eq!(receiver.len(), 1);
        assert_eq!(frequency(&receiver.try_recv().unwrap()), 999.0);
    }
}
