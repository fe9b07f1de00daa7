//! Fire-and-forget writer in front of [`AnalyticsStore`].
//!
//! Records are queued on a bounded channel and written in order by a single
//! background task on the blocking pool. Request handlers never wait on the
//! database; a full queue or a failed write is logged and dropped.

use super::records::{
    ClientRequestRecord, ServerRequestRecord, ServerResponseRecord, ServiceResponseRecord,
};
use super::store::AnalyticsStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const QUEUE_CAPACITY: usize = 1024;

enum Command {
    ClientRequest(ClientRequestRecord),
    Upstream(ServerRequestRecord, ServerResponseRecord),
    ServiceResponse(ServiceResponseRecord),
    Flush(oneshot::Sender<()>),
}

/// Handle for queueing analytics records. Cheap to clone.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    tx: mpsc::Sender<Command>,
}

impl AnalyticsRecorder {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(store: AnalyticsStore) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                if let Command::Flush(done) = command {
                    let _ = done.send(());
                    continue;
                }
                let store = store.clone();
                let written = tokio::task::spawn_blocking(move || write(&store, command)).await;
                if let Err(e) = written {
                    warn!("Analytics writer task failed: {}", e);
                }
            }
            debug!("Analytics writer stopped");
        });

        Self { tx }
    }

    fn enqueue(&self, command: Command) {
        if let Err(e) = self.tx.try_send(command) {
            warn!("Dropping analytics record: {}", e);
        }
    }

    pub fn client_request(&self, record: ClientRequestRecord) {
        self.enqueue(Command::ClientRequest(record));
    }

    /// Queue one upstream exchange: the request and the response it got.
    pub fn upstream(&self, request: ServerRequestRecord, response: ServerResponseRecord) {
        self.enqueue(Command::Upstream(request, response));
    }

    pub fn service_response(&self, record: ServiceResponseRecord) {
        self.enqueue(Command::ServiceResponse(record));
    }

    /// Wait until every record queued before this call has been written.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

fn write(store: &AnalyticsStore, command: Command) {
    let outcome = match command {
        Command::ClientRequest(record) => store.insert_client_request(&record).map(|_| ()),
        Command::Upstream(request, response) => store
            .insert_server_request(&request)
            .and_then(|_| store.insert_server_response(&response))
            .map(|_| ()),
        Command::ServiceResponse(record) => store.insert_service_response(&record).map(|_| ()),
        Command::Flush(_) => Ok(()),
    };
    if let Err(e) = outcome {
        warn!("Failed to write analytics record: {}", e);
    }
}
