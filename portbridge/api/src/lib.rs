//! Shared data model for bridging local proxy objects to foreign implementations.

mod context;
mod describe;

pub use context::{mark_main_thread, ContextError, GlobalMainThread, MainContext, MainThread, NoMainContext};
pub use describe::{
    InterfaceDesc, InterfaceRegistry, InterfaceResolver, MethodDesc, ResolveError, SummaryError,
    TypeDesc,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary name of an interface, e.g. `com.example.Greeter` or `com.example.Outer$Inner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(String);

impl InterfaceId {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self(binary_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InterfaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque id of a communication port into the foreign runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

/// Opaque foreign function pointer. Never dereferenced on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionPointer(pub i64);

/// Identifies the foreign runtime instance a proxy talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeId(pub i64);

/// Token naming a foreign-side allocation that backs one blocking call's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupToken(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

impl fmt::Display for CleanupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

/// A foreign implementation of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImplementationHandle {
    pub channel: ChannelId,
    pub function_pointer: FunctionPointer,
}

impl ImplementationHandle {
    pub fn new(channel: ChannelId, function_pointer: FunctionPointer) -> Self {
        Self {
            channel,
            function_pointer,
        }
    }
}

/// Process-unique identity of a local composite proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectIdentity(pub u64);

impl ObjectIdentity {
    /// Stable 32-bit hash of this identity, in the shape of an identity hash code.
    pub fn hash_code(self) -> i32 {
        let mixed = self.0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (mixed >> 33) as i32
    }
}

/// Reference to an object owned by the foreign runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignObject {
    pub class: String,
    pub handle: i64,
}

/// A dynamically typed argument or result crossing the boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(ForeignObject),
    Proxy(ObjectIdentity),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens any integral value that fits into an `i32`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Char(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            other => other.as_int().map(i64::from),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// An exception raised by the foreign implementation.
///
/// `cause` carries the original failure when the foreign code rethrew
/// something that started on this side of the boundary.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ForeignError {
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ForeignError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}

/// Outcome of a foreign call.
#[derive(Debug)]
pub enum Payload {
    Value(Value),
    Error(ForeignError),
}

/// What a blocking call hands back. `cleanup` must be released exactly once.
#[derive(Debug)]
pub struct ResultEnvelope {
    pub cleanup: CleanupToken,
    pub payload: Payload,
}

impl ResultEnvelope {
    pub fn value(cleanup: CleanupToken, value: Value) -> Self {
        Self {
            cleanup,
            payload: Payload::Value(value),
        }
    }

    pub fn error(cleanup: CleanupToken, error: ForeignError) -> Self {
        Self {
            cleanup,
            payload: Payload::Error(error),
        }
    }
}
