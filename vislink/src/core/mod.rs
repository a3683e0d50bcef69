pub mod config;
pub(crate) mod correlator;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod observability;
pub mod path;
pub mod subscription;

pub use config::{ConfigStore, Configurable, LinkConfig};
pub use engine::{Engine, Link};
pub use error::LinkError;
pub use handshake::{ConnectionNode, Identity};
pub use observability::{MemoryTrace, NoopTrace, TraceSink};
pub use path::{CONNECTION_SEGMENT, PathError};
pub use subscription::{Listener, ListenerId};
