//! Background sample preparation.
//!
//! Decoding a whole track for the waveform can take a noticeable fraction of a
//! second, so the shell hands [`PrepareTicket`]s to a worker thread and feeds
//! the results back through [`PlaybackSession::accept_samples`] on its own
//! tick. Stale results are rejected by the session, not here.
//!
//! [`PlaybackSession::accept_samples`]: crate::session::PlaybackSession::accept_samples

use crate::audio::decode::SampleDecoder;
use crate::samples::SampleStore;
use crate::session::PrepareTicket;
use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

pub struct PreparedSamples {
    pub ticket: PrepareTicket,
    pub store: SampleStore,
}

pub struct SampleLoader {
    tx: Sender<PrepareTicket>,
    rx: Receiver<PreparedSamples>,
    _handle: JoinHandle<()>,
}

impl SampleLoader {
    pub fn spawn<D>(decoder: D) -> Result<Self>
    where
        D: SampleDecoder + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<PrepareTicket>();
        let (result_tx, result_rx) = mpsc::channel::<PreparedSamples>();

        let handle = thread::Builder::new()
            .name(String::from("sample-loader"))
            .spawn(move || loader_thread(decoder, request_rx, result_tx))
            .context("failed to spawn sample loader thread")?;

        log::info!("sample loader spawned");

        Ok(Self {
            tx: request_tx,
            rx: result_rx,
            _handle: handle,
        })
    }

    /// Queues a decode. Returns false when the worker has gone away.
    pub fn request(&self, ticket: PrepareTicket) -> bool {
        match self.tx.send(ticket) {
            Ok(()) => true,
            Err(err) => {
                log::error!("sample loader disconnected, dropping {}", err.0.track().location);
                false
            }
        }
    }

    pub fn try_recv(&self) -> Option<PreparedSamples> {
        match self.rx.try_recv() {
            Ok(prepared) => Some(prepared),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("sample loader thread disconnected unexpectedly");
                None
            }
        }
    }

    /// Blocks until the next result arrives or the worker exits.
    pub fn recv(&self) -> Option<PreparedSamples> {
        self.rx.recv().ok()
    }
}

fn loader_thread<D: SampleDecoder>(
    decoder: D,
    rx: Receiver<PrepareTicket>,
    tx: Sender<PreparedSamples>,
) {
    log::debug!("sample loader thread started");

    while let Ok(mut ticket) = rx.recv() {
        // Only the newest queued request can still be current.
        while let Ok(newer) = rx.try_recv() {
            log::debug!("skipping superseded request for {}", ticket.track().location);
            ticket = newer;
        }

        let store = SampleStore::prepare(ticket.track(), &decoder);
        if tx.send(PreparedSamples { ticket, store }).is_err() {
            break;
        }
    }

    log::debug!("sample loader thread exiting");
}
