use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::ListenerId;
use super::Registry;
use crate::metrics::RESYNC_ROUNDS;
use crate::Object;
use crate::Result;

/// Batches listener resync requests into non-overlapping rounds.
///
/// While accepting, the first request opens a round: every request already
/// queued joins it, the participants are flagged syncing and one tick goes
/// to the controller. Intake stays off until the round's `Resynced` has been
/// reconciled. Requests arriving meanwhile wait in the channel for the next
/// round.
pub(crate) struct ResyncCoordinator<K> {
    registry: Arc<Registry<K>>,
    requests: mpsc::Receiver<ListenerId>,
    completed: mpsc::UnboundedReceiver<()>,
    controller_tick: mpsc::Sender<()>,
}

impl<K: Object> ResyncCoordinator<K> {
    pub(crate) fn new(
        registry: Arc<Registry<K>>,
        requests: mpsc::Receiver<ListenerId>,
        completed: mpsc::UnboundedReceiver<()>,
        controller_tick: mpsc::Sender<()>,
    ) -> Self {
        Self {
            registry,
            requests,
            completed,
            controller_tick,
        }
    }

    pub(crate) async fn run(
        mut self,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                done = self.completed.recv(), if !accepting => {
                    if done.is_none() {
                        break;
                    }
                    debug!("resync round completed");
                    accepting = true;
                }
                request = self.requests.recv(), if accepting => {
                    let Some(first) = request else {
                        break;
                    };
                    let mut ids = vec![first];
                    while let Ok(id) = self.requests.try_recv() {
                        ids.push(id);
                    }

                    let marked = self.registry.mark_syncing(&ids);
                    if marked == 0 {
                        trace!(?ids, "resync requested by removed listeners only");
                        continue;
                    }
                    accepting = false;
                    RESYNC_ROUNDS.inc();
                    debug!(listeners = marked, "resync round started");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = self.controller_tick.send(()) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!("resync coordinator stopped");
        Ok(())
    }
}
