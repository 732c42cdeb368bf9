//! Routes calls on composite proxies to implementations living in a foreign runtime

mod cleaner;
mod dispatcher;
mod factory;
mod proxy;
pub mod signature;
mod table;

pub use cleaner::{CleanupGuard, ResourceCleaner};
pub use factory::{FactoryState, ProxyFactory};
pub use proxy::{CompositeProxy, Interface, WeakProxy};
pub use table::{ImplementationTable, NotRegistered};

use api::{
    ChannelId, CleanupToken, ForeignError, FunctionPointer, ResolveError, ResultEnvelope,
    RuntimeId, Value,
};

/// Everything a transport needs to carry one call across the boundary.
#[derive(Debug)]
pub struct Invocation {
    pub runtime: RuntimeId,
    pub channel: ChannelId,
    pub function_pointer: FunctionPointer,
    /// Held until the call finishes, so the proxy's channels stay open while
    /// it is in flight.
    pub proxy: CompositeProxy,
    pub signature: String,
    pub args: Vec<Value>,
    pub blocking: bool,
    /// Whether the foreign runtime may be entered directly from this thread.
    pub reentrancy_safe: bool,
}

/// Moves calls to the foreign runtime and frees what it allocates for them.
pub trait Transport: Send + Sync {
    /// Blocking calls must return `Some(envelope)`; non-blocking calls return
    /// `None` without waiting on the foreign side.
    fn invoke(&self, call: Invocation) -> Result<Option<ResultEnvelope>, TransportError>;

    /// Frees the foreign allocation behind a blocking call's result.
    fn release(&self, token: CleanupToken) -> Result<(), TransportError>;

    /// Frees everything tied to a channel once no proxy can reach it anymore.
    fn release_channel(&self, channel: ChannelId) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Foreign runtime is not running")]
    Disconnected,
    #[error("{0} is closed")]
    ChannelClosed(ChannelId),
    #[error("Call addressed runtime {0:?} but transport serves {1:?}")]
    WrongRuntime(RuntimeId, RuntimeId),
    #[error("Blocking call returned no result envelope")]
    MissingEnvelope,
    #[error("Transport rejected call: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No interface implementation added")]
    Empty,
    #[error("This proxy has already been built")]
    AlreadyBuilt,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The foreign implementation failed without an underlying cause.
    #[error("Foreign call failed: {0}")]
    Foreign(ForeignError),
    /// The original failure the foreign implementation rethrew.
    #[error(transparent)]
    Thrown(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Unregistered(#[from] NotRegistered),
    #[error("No method {name} taking {arity} argument(s) on {interface}")]
    NoSuchMethod {
        interface: api::InterfaceId,
        name: String,
        arity: usize,
    },
    #[error("Method {name} taking {arity} argument(s) on {interface} is overloaded")]
    AmbiguousMethod {
        interface: api::InterfaceId,
        name: String,
        arity: usize,
    },
    /// The foreign side answered with a value the declared return type cannot hold.
    #[error("{method} returned {value:?}")]
    UnexpectedReturn { method: String, value: Value },
}
