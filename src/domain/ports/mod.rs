pub mod collector;
pub mod sink;
pub mod store;

pub use collector::{CollectError, Collector, Probe};
pub use sink::{AlertSink, DeliveryError};
pub use store::{
    AlertStore, CacheStore, EntityStore, GraphStore, RelationshipStore, RuleStore, StoreError,
};
