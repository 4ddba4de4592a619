//! The Tree Lifecycle Controller, Registry, persistent-store restore slice, and
//! Event Bus Facade (spec §4 components H/I, §4.6, §6). Depends only on
//! `conclave-core`, `conclave-agent`'s trait surface, and `conclave-actions`' pure
//! request types — never on a concrete `LlmProvider` — so the Supervisor binary
//! alone owns what an Agent Actor is made of.

pub mod events;
pub mod lifecycle;
pub mod registry;
pub mod store;

pub use events::{EventBus, EventBusPublisher, TopicEvent};
pub use lifecycle::{ActorFactory, ParentLookup, ProfileCatalog, TreeController};
pub use registry::{Registry, RegistryEntry, RegistrySnapshot};
pub use store::{InMemoryStore, PersistedAgentLoader};
