//! Session and transport lifecycle for the mcpgate gateway.
//!
//! Maps client-presented session ids to live transports, persists session
//! existence in a pluggable [`SessionStore`], and decides per request
//! whether to create, resume, or reject a session ([`admission`]).

pub mod admission;
pub mod error;
pub mod events;
pub mod manager;
pub mod registry;
pub mod store;
pub mod transport;

pub use admission::{admit, resolve, Admission};
pub use error::{SessionError, StoreError};
pub use events::{EventBus, SessionEvent, SubscriptionId};
pub use manager::{IdGenerator, ManagerOptions, SessionManager};
pub use registry::TransportRegistry;
pub use store::{
    MemorySessionStore, RedisSessionStore, RedisStoreOptions, SessionRecord, SessionStore,
};
pub use transport::{
    HandlerFactory, RpcHandler, StreamableTransport, TransportError, TransportObserver,
    TransportReply,
};
