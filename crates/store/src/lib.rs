pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::{Coordinates, DayId, ObservationId, ObservationStatus, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryObservationStore;
pub use postgres::PostgresObservationStore;
pub use query::ObservationQuery;
pub use record::{
    ItemRecord, ItemWithEvent, ObservationRecord, ObservationSummary, ReferencedEvent, UserRecord,
};
pub use store::{DraftTransaction, ItemPatch, ObservationFilter, ObservationPatch, ObservationStore};
