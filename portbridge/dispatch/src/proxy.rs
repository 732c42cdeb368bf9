use crate::cleaner::CleanupGuard;
use crate::dispatcher::{IdentityMethod, InvocationDispatcher};
use crate::CallError;
use api::{ImplementationHandle, InterfaceDesc, InterfaceId, MethodDesc, ObjectIdentity, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_identity() -> ObjectIdentity {
    ObjectIdentity(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
}

struct ProxyShared {
    identity: ObjectIdentity,
    interfaces: Vec<InterfaceDesc>,
    dispatcher: InvocationDispatcher,
    // Dropped with the last handle, which releases every channel.
    _cleanup: Vec<CleanupGuard>,
}

/// One object implementing every interface registered with its factory.
///
/// Clones share the same identity. The foreign channels behind the proxy are
/// released when the last clone is dropped.
#[derive(Clone)]
pub struct CompositeProxy {
    shared: Arc<ProxyShared>,
}

/// A reference to a proxy that does not keep it alive.
#[derive(Clone)]
pub struct WeakProxy {
    identity: ObjectIdentity,
    shared: Weak<ProxyShared>,
}

/// A typed view over a proxy, one per interface.
pub trait Interface: Sized {
    /// Binary name of the interface this wrapper speaks for.
    const ID: &'static str;

    fn wrap(proxy: CompositeProxy) -> Self;
}

impl CompositeProxy {
    pub(crate) fn new(
        identity: ObjectIdentity,
        interfaces: Vec<InterfaceDesc>,
        dispatcher: InvocationDispatcher,
        cleanup: Vec<CleanupGuard>,
    ) -> Self {
        Self {
            shared: Arc::new(ProxyShared {
                identity,
                interfaces,
                dispatcher,
                _cleanup: cleanup,
            }),
        }
    }

    pub fn identity(&self) -> ObjectIdentity {
        self.shared.identity
    }

    pub fn identity_hash(&self) -> i32 {
        self.shared.identity.hash_code()
    }

    /// Name of the first interface the proxy was built with.
    pub fn name(&self) -> &InterfaceId {
        &self.shared.interfaces[0].id
    }

    pub fn interfaces(&self) -> &[InterfaceDesc] {
        &self.shared.interfaces
    }

    pub fn implements(&self, interface: &InterfaceId) -> bool {
        self.shared.interfaces.iter().any(|desc| &desc.id == interface)
    }

    pub fn handle(&self, interface: &InterfaceId) -> Option<ImplementationHandle> {
        self.shared.dispatcher.table().get(interface).ok()
    }

    pub fn as_value(&self) -> Value {
        Value::Proxy(self.identity())
    }

    pub fn downgrade(&self) -> WeakProxy {
        WeakProxy {
            identity: self.shared.identity,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn cast<I: Interface>(&self) -> Option<I> {
        if self.implements(&InterfaceId::from(I::ID)) {
            Some(I::wrap(self.clone()))
        } else {
            None
        }
    }

    /// Calls `method` as declared by `interface`. Non-blocking methods return `None`.
    pub fn invoke(
        &self,
        interface: &InterfaceId,
        method: &MethodDesc,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CallError> {
        self.shared.dispatcher.dispatch(self, interface, method, args)
    }

    /// Looks `name` up on `interface` by arity and invokes it.
    pub fn call(
        &self,
        interface: impl Into<InterfaceId>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CallError> {
        let interface = interface.into();
        let method = self.method(&interface, name, args.len())?;
        self.invoke(&interface, &method, args)
    }

    /// Finds the single method called `name` taking `arity` arguments.
    ///
    /// `equals`, `hashCode` and `toString` resolve on every interface even
    /// when its description does not list them.
    pub fn method(
        &self,
        interface: &InterfaceId,
        name: &str,
        arity: usize,
    ) -> Result<MethodDesc, CallError> {
        let desc = self
            .shared
            .interfaces
            .iter()
            .find(|desc| &desc.id == interface)
            .ok_or_else(|| crate::NotRegistered(interface.clone()))?;

        let mut candidates = desc
            .methods
            .iter()
            .filter(|m| m.name == name && m.params.len() == arity);
        match (candidates.next(), candidates.next()) {
            (Some(method), None) => Ok(method.clone()),
            (Some(_), Some(_)) => Err(CallError::AmbiguousMethod {
                interface: interface.clone(),
                name: name.to_string(),
                arity,
            }),
            (None, _) => IdentityMethod::describe(name, arity).ok_or_else(|| CallError::NoSuchMethod {
                interface: interface.clone(),
                name: name.to_string(),
                arity,
            }),
        }
    }
}

impl PartialEq for CompositeProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for CompositeProxy {}

impl Hash for CompositeProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.identity.hash(state);
    }
}

impl fmt::Display for CompositeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.name(), self.identity_hash())
    }
}

impl fmt::Debug for CompositeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.shared.interfaces.iter().map(|d| d.id.as_str()).collect();
        f.debug_struct("CompositeProxy")
            .field("identity", &self.shared.identity)
            .field("interfaces", &ids)
            .finish()
    }
}

impl WeakProxy {
    pub fn identity(&self) -> ObjectIdentity {
        self.identity
    }

    pub fn upgrade(&self) -> Option<CompositeProxy> {
        self.shared.upgrade().map(|shared| CompositeProxy { shared })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl fmt::Debug for WeakProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakProxy")
            .field("identity", &self.identity)
            .field("alive", &self.is_alive())
            .finish()
    }
}
