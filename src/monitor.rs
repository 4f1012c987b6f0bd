/*
 *  monitor.rs
 *
 *  CellScope - every gram counts
 *	(c) 2024-25 CellScope authors
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use futures_util::StreamExt;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{Mutex as TokMutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::calibration::Calibration;
use crate::pacer::RenderGate;
use crate::peak::PeakTracker;
use crate::ring::SampleRing;
use crate::stream::{LoadStream, StreamError};

/// Lifecycle of the ingestion pipeline, published on a watch channel so
/// the UI layer sees stream failures as a state change instead of a
/// silently dead trace.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Streaming,
    /// Device closed the stream; not an error, not retried.
    Ended,
    Failed(String),
}

/// One ingestion+render pipeline instance: the sample ring, the peak
/// tracker, the active calibration and the render gate, all owned
/// together so every batch is applied atomically between suspension
/// points.
pub struct Monitor {
    ring: SampleRing,
    peak: PeakTracker,
    calibration: Calibration,
    gate: RenderGate,
    batches_seen: u64,
    // ingestion task management
    stop_sender: Option<mpsc::Sender<()>>,
    ingest_handle: Option<JoinHandle<()>>,
    state_tx: watch::Sender<PipelineState>,
    state_rx: watch::Receiver<PipelineState>,
}

/// Everything one redraw needs, captured under a single lock so the
/// frame observes a prefix-consistent snapshot.
pub struct RenderSnapshot {
    pub samples: Vec<i16>,
    pub calibration: Calibration,
    pub peak_raw: f64,
}

impl Monitor {
    pub fn new(capacity: usize, calibration: Calibration) -> Self {
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        Self {
            ring: SampleRing::new(capacity),
            peak: PeakTracker::new(calibration.offset()),
            calibration,
            gate: RenderGate::new(),
            batches_seen: 0,
            stop_sender: None,
            ingest_handle: None,
            state_tx,
            state_rx,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Apply one decoded batch: ring write, peak fold, redraw request.
    /// Runs to completion under the caller's lock, so the render step can
    /// never observe half a batch.
    pub fn ingest(&mut self, batch: &[i16]) {
        self.ring.write(batch);
        self.peak.observe(batch);
        self.batches_seen += 1;
        self.gate.mark_dirty();
    }

    /// Claim the pending redraw, if any. Clears the gate before handing
    /// out the snapshot, so batches arriving during the redraw pend the
    /// next frame.
    pub fn take_render(&mut self) -> Option<RenderSnapshot> {
        if !self.gate.take_pending() {
            return None;
        }
        Some(RenderSnapshot {
            samples: self.ring.snapshot(),
            calibration: self.calibration,
            peak_raw: self.peak.value(),
        })
    }

    /// Swap in a new calibration. Raw samples are untouched; the dirty
    /// mark makes the next frame re-project the whole visible trace.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        info!("calibration applied: {}", calibration);
        self.calibration = calibration;
        self.gate.mark_dirty();
    }

    /// Zero the peak indicator back to the calibration offset.
    pub fn reset_peak(&mut self) {
        self.peak.reset(self.calibration.offset());
        self.gate.mark_dirty();
    }

    /// Build a monitor and start its ingestion task against `url`.
    ///
    /// The task runs until end-of-stream, transport failure, or a stop
    /// signal; there is no reconnect and no timeout on the body. The
    /// outcome lands on the state channel.
    pub fn spawn(capacity: usize, calibration: Calibration, url: String) -> Arc<TokMutex<Monitor>> {
        let mut monitor = Monitor::new(capacity, calibration);

        let (tx, mut stop_rx) = mpsc::channel(1);
        monitor.stop_sender = Some(tx);
        let state_tx = monitor.state_tx.clone();

        let monitor_arc = Arc::new(TokMutex::new(monitor));
        let monitor_for_ingest = Arc::clone(&monitor_arc);

        let ingest_handle = tokio::spawn(async move {
            let client = LoadStream::new();

            let outcome: Result<(), StreamError> = async {
                let stream = client.open(&url).await?;
                let _ = state_tx.send(PipelineState::Streaming);
                let mut batches = Box::pin(stream);
                loop {
                    tokio::select! {
                        next = batches.next() => match next {
                            Some(Ok(batch)) => {
                                monitor_for_ingest.lock().await.ingest(&batch);
                            }
                            Some(Err(e)) => return Err(StreamError::Http(e)),
                            None => return Ok(()),
                        },
                        _ = stop_rx.recv() => {
                            debug!("ingest task received stop signal");
                            return Ok(());
                        }
                    }
                }
            }
            .await;

            match outcome {
                Ok(()) => {
                    info!("sample stream ended");
                    let _ = state_tx.send(PipelineState::Ended);
                }
                Err(e) => {
                    error!("sample stream failed: {}", e);
                    let _ = state_tx.send(PipelineState::Failed(e.to_string()));
                }
            }
        });

        // store the handle back in the shared instance
        if let Ok(mut locked) = monitor_arc.try_lock() {
            locked.ingest_handle = Some(ingest_handle);
        }

        monitor_arc
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            // non-blocking; the runtime reaps the detached task
            let _ = sender.try_send(());
        }
        if let Some(handle) = self.ingest_handle.take() {
            handle.abort();
        }
    }
}
