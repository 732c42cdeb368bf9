use crate::proxy::CompositeProxy;
use crate::signature::{self, EQUALS, HASH_CODE, TO_STRING};
use crate::table::ImplementationTable;
use crate::{CallError, Invocation, Transport, TransportError};
use api::{
    CleanupToken, ForeignError, InterfaceId, MainContext, MethodDesc, Payload, RuntimeId,
    TypeDesc, Value,
};
use log::{debug, error, trace, warn};
use std::sync::Arc;

/// Methods every proxy answers locally; the foreign side knows nothing of
/// a proxy's local identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentityMethod {
    Equals,
    HashCode,
    ToString,
}

impl IdentityMethod {
    fn classify(signature: &str) -> Option<Self> {
        match signature {
            EQUALS => Some(IdentityMethod::Equals),
            HASH_CODE => Some(IdentityMethod::HashCode),
            TO_STRING => Some(IdentityMethod::ToString),
            _ => None,
        }
    }

    /// Description of the identity method called `name` with `arity` arguments.
    pub(crate) fn describe(name: &str, arity: usize) -> Option<MethodDesc> {
        match (name, arity) {
            ("equals", 1) => Some(MethodDesc::new(name, vec![TypeDesc::object()], TypeDesc::Boolean)),
            ("hashCode", 0) => Some(MethodDesc::new(name, vec![], TypeDesc::Int)),
            ("toString", 0) => Some(MethodDesc::new(name, vec![], TypeDesc::string())),
            _ => None,
        }
    }

    fn resolve(self, proxy: &CompositeProxy, args: &[Value]) -> Value {
        match self {
            IdentityMethod::Equals => {
                Value::Bool(matches!(args.first(), Some(Value::Proxy(id)) if *id == proxy.identity()))
            }
            IdentityMethod::HashCode => Value::Int(proxy.identity_hash()),
            IdentityMethod::ToString => Value::String(proxy.to_string()),
        }
    }
}

/// The single interception point behind every method of one composite proxy.
///
/// Holds no per-call state; the table is frozen once the proxy is built, so
/// concurrent callers need no locking here.
pub(crate) struct InvocationDispatcher {
    runtime: RuntimeId,
    table: ImplementationTable,
    transport: Arc<dyn Transport>,
    main_context: Arc<dyn MainContext>,
    constructed_on_main: bool,
}

impl InvocationDispatcher {
    pub(crate) fn new(
        runtime: RuntimeId,
        table: ImplementationTable,
        transport: Arc<dyn Transport>,
        main_context: Arc<dyn MainContext>,
        constructed_on_main: bool,
    ) -> Self {
        Self {
            runtime,
            table,
            transport,
            main_context,
            constructed_on_main,
        }
    }

    pub(crate) fn table(&self) -> &ImplementationTable {
        &self.table
    }

    pub(crate) fn dispatch(
        &self,
        proxy: &CompositeProxy,
        interface: &InterfaceId,
        method: &MethodDesc,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CallError> {
        let signature = signature::encode_method(method);
        if let Some(identity) = IdentityMethod::classify(&signature) {
            return Ok(Some(identity.resolve(proxy, &args)));
        }

        let handle = self.table.get(interface).map_err(|e| {
            error!("Dispatch defect on {}: {} ({})", proxy, e, signature);
            e
        })?;
        let blocking = !self.table.is_async(&signature);
        let reentrancy_safe = self.constructed_on_main && self.main_context.is_current();

        debug!(
            "{} -> {}::{} on {} (blocking: {}, reentrancy_safe: {})",
            proxy, interface, method.name, handle.channel, blocking, reentrancy_safe
        );
        trace!("Signature key: {}", signature);

        let reply = self.transport.invoke(Invocation {
            runtime: self.runtime,
            channel: handle.channel,
            function_pointer: handle.function_pointer,
            proxy: proxy.clone(),
            signature,
            args,
            blocking,
            reentrancy_safe,
        })?;

        if !blocking {
            if let Some(stray) = reply {
                warn!("Transport returned a result for a non-blocking call; releasing it");
                self.release(stray.cleanup);
            }
            return Ok(None);
        }

        let envelope = reply.ok_or(TransportError::MissingEnvelope)?;
        // Released before the payload is looked at so the error path cannot skip it.
        self.release(envelope.cleanup);
        match envelope.payload {
            Payload::Value(value) => Ok(Some(value)),
            Payload::Error(error) => Err(unwrap_foreign(error)),
        }
    }

    fn release(&self, token: CleanupToken) {
        if let Err(e) = self.transport.release(token) {
            warn!("Failed to release {}, foreign result may leak: {}", token, e);
        }
    }
}

fn unwrap_foreign(error: ForeignError) -> CallError {
    let ForeignError { message, cause } = error;
    match cause {
        Some(cause) => CallError::Thrown(cause),
        None => CallError::Foreign(ForeignError::new(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_methods_classify_by_key() {
        for (name, arity, expected) in [
            ("equals", 1, IdentityMethod::Equals),
            ("hashCode", 0, IdentityMethod::HashCode),
            ("toString", 0, IdentityMethod::ToString),
        ] {
            let desc = IdentityMethod::describe(name, arity).unwrap();
            let key = signature::encode_method(&desc);
            assert_eq!(IdentityMethod::classify(&key), Some(expected));
        }
    }

    #[test]
    fn test_overloads_are_not_identity_methods() {
        assert!(IdentityMethod::describe("equals", 2).is_none());
        let key = signature::encode("equals", &[TypeDesc::string()], &TypeDesc::Boolean);
        assert_eq!(IdentityMethod::classify(&key), None);
        let key = signature::encode("hashCode", &[], &TypeDesc::Long);
        assert_eq!(IdentityMethod::classify(&key), None);
    }

    #[test]
    fn test_cause_is_preferred_over_wrapper() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        match unwrap_foreign(ForeignError::with_cause("wrapper", io)) {
            CallError::Thrown(cause) => {
                assert!(cause.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }

        match unwrap_foreign(ForeignError::new("plain")) {
            CallError::Foreign(e) => assert_eq!(e.message, "plain"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
