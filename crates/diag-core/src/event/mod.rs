//! Log de auditoría por job: `EventStore` y tipos de evento.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{JobEvent, JobEventKind};
