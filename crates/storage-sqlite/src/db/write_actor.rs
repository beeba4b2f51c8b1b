//! Single-writer actor.
//!
//! Every mutation is sent as a job to one task that owns one connection and
//! runs the job inside an immediate transaction. Writers never contend for
//! the SQLite lock; readers use the pool and are not blocked in WAL mode.

use std::any::Any;

use diesel::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;
use stockbase_core::errors::{DatabaseError, Result};

type AnyBox = Box<dyn Any + Send + 'static>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> Result<AnyBox> + Send + 'static>;
type Envelope = (Job, oneshot::Sender<Result<AnyBox>>);

/// Queue depth before `exec` callers wait.
const WRITER_QUEUE_DEPTH: usize = 1024;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<Envelope>,
}

fn writer_gone(detail: &str) -> stockbase_core::Error {
    DatabaseError::TransactionFailed(format!("writer actor unavailable: {}", detail)).into()
}

impl WriteHandle {
    /// Run `job` on the writer connection inside one transaction.
    ///
    /// An error from the job rolls the whole transaction back and is returned
    /// with its original variant.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (ret_tx, ret_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| job(conn).map(|v| Box::new(v) as AnyBox));

        self.tx
            .send((job, ret_tx))
            .await
            .map_err(|_| writer_gone("queue closed"))?;

        let boxed = ret_rx.await.map_err(|_| writer_gone("reply dropped"))??;
        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| DatabaseError::Internal("writer returned an unexpected type".into()).into())
    }
}

/// Spawn the writer task on the current Tokio runtime.
///
/// The task holds one pooled connection until every `WriteHandle` is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<Envelope>(WRITER_QUEUE_DEPTH);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not get a connection: {}", e);
                let message = e.to_string();
                while let Some((_, reply_tx)) = rx.recv().await {
                    let _ = reply_tx.send(Err(writer_gone(&message)));
                }
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<AnyBox> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(Into::into);

            // The caller may have gone away; nothing to do then.
            let _ = reply_tx.send(result);
        }
    });

    WriteHandle { tx }
}
