//! Canal de observación de estado de un job.
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::model::JobRecord;

/// Stream de `JobRecord` de un job: primero el estado actual y luego cada
/// transición, en orden no decreciente. Termina tras el registro terminal.
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::UnboundedReceiver<JobRecord>,
}

impl StatusStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<JobRecord>) -> Self {
        Self { rx }
    }

    /// Siguiente registro, o `None` cuando el job terminó (o el controlador
    /// se destruyó).
    pub async fn recv(&mut self) -> Option<JobRecord> {
        self.rx.recv().await
    }
}

impl Stream for StatusStream {
    type Item = JobRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
