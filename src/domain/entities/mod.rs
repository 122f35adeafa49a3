pub mod alert;
pub mod entity;
pub mod monitor_rule;
pub mod observation;
pub mod path;
pub mod relationship;

pub use alert::{Alert, DeliveryState};
pub use entity::{Entity, EntityType};
pub use monitor_rule::{MonitorCondition, MonitorRule, RuleState};
pub use observation::Observation;
pub use path::{Path, PathStep};
pub use relationship::{Relationship, RelationshipType};
