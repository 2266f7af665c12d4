use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A fact raised by an [`crate::Aggregate`].
///
/// Facts are persisted as JSON documents alongside their type tag, so every event has to name
/// itself. The tag is what subscribers and the audit log see.
pub trait Event: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// The type tag stored next to the payload, e.g. `"BatteryInstalled"`.
    fn event_type(&self) -> &'static str;
}
