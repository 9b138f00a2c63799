//! Background worker: the dispatcher and reconciler loops under one
//! cancellation token.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::dispatcher::Dispatcher;
use super::reconciler::Reconciler;

/// Handle to the running background loops.
pub struct Worker {
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
    reconciler: JoinHandle<()>,
}

impl Worker {
    /// Spawn both loops. They stop when `cancel` fires or [`Worker::shutdown`]
    /// is called.
    pub fn spawn(
        dispatcher: Arc<Dispatcher>,
        reconciler: Arc<Reconciler>,
        cancel: CancellationToken,
    ) -> Self {
        let dispatcher = tokio::spawn(dispatcher.run(cancel.child_token()));
        let reconciler = tokio::spawn(reconciler.run(cancel.child_token()));
        info!("Worker started");

        Self {
            cancel,
            dispatcher,
            reconciler,
        }
    }

    /// Cancel both loops and wait for in-flight tasks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let (dispatcher, reconciler) = tokio::join!(self.dispatcher, self.reconciler);
        if let Err(e) = dispatcher {
            error!(error = %e, "Dispatcher task failed");
        }
        if let Err(e) = reconciler {
            error!(error = %e, "Reconciler task failed");
        }

        info!("Worker stopped");
    }
}
