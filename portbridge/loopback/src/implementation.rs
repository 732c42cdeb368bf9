use api::{ForeignError, Value};
use dispatch::CompositeProxy;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

type Handler = Arc<dyn Fn(&ForeignCall) -> Result<Value, ForeignError> + Send + Sync>;

/// One call as seen by a foreign handler.
#[derive(Debug)]
pub struct ForeignCall {
    /// The proxy the call came through. Its channels stay open until the
    /// call returns.
    pub proxy: CompositeProxy,
    pub signature: String,
    pub args: Vec<Value>,
}

impl ForeignCall {
    pub fn arg(&self, index: usize) -> Result<&Value, ForeignError> {
        self.args.get(index).ok_or_else(|| {
            ForeignError::new(format!(
                "{} expects argument {} but got {}",
                self.signature,
                index,
                self.args.len()
            ))
        })
    }

    pub fn str_arg(&self, index: usize) -> Result<&str, ForeignError> {
        let value = self.arg(index)?;
        value.as_str().ok_or_else(|| {
            ForeignError::new(format!(
                "{} argument {} is not a string: {:?}",
                self.signature, index, value
            ))
        })
    }
}

/// Handlers keyed by signature key, implementing one interface.
#[derive(Clone, Default)]
pub struct ForeignImplementation {
    handlers: HashMap<String, Handler>,
    async_methods: BTreeSet<String>,
}

impl ForeignImplementation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles `signature` and returns its result to the caller.
    pub fn on<F>(mut self, signature: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ForeignCall) -> Result<Value, ForeignError> + Send + Sync + 'static,
    {
        self.handlers.insert(signature.into(), Arc::new(handler));
        self
    }

    /// Handles `signature` as fire-and-forget; callers never see its outcome.
    pub fn on_async<F>(mut self, signature: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ForeignCall) -> Result<(), ForeignError> + Send + Sync + 'static,
    {
        let signature = signature.into();
        self.async_methods.insert(signature.clone());
        self.handlers
            .insert(signature, Arc::new(move |call: &ForeignCall| handler(call).map(|()| Value::Null)));
        self
    }

    /// Signature keys to register as fire-and-forget with a proxy factory.
    pub fn async_methods(&self) -> Vec<String> {
        self.async_methods.iter().cloned().collect()
    }

    pub(crate) fn handle(&self, call: &ForeignCall) -> Result<Value, ForeignError> {
        match self.handlers.get(&call.signature) {
            Some(handler) => handler(call),
            None => Err(ForeignError::new(format!(
                "NoSuchMethodError: {}",
                call.signature
            ))),
        }
    }
}

impl fmt::Debug for ForeignImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signatures: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        signatures.sort_unstable();
        f.debug_struct("ForeignImplementation")
            .field("signatures", &signatures)
            .field("async_methods", &self.async_methods)
            .finish()
    }
}
