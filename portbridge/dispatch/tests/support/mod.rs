#![allow(dead_code)]

use api::{
    ChannelId, CleanupToken, ForeignError, FunctionPointer, InterfaceDesc, InterfaceRegistry,
    MainContext, MethodDesc, NoMainContext, ObjectIdentity, Payload, ResultEnvelope, RuntimeId,
    TypeDesc, Value,
};
use dispatch::{Invocation, ProxyFactory, ResourceCleaner, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const GREETER: &str = "com.example.Greeter";
pub const TICKER: &str = "com.example.Ticker";
pub const GREET_KEY: &str = "greet(Ljava/lang/String;)Ljava/lang/String;";
pub const TICK_KEY: &str = "tick(I)V";

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub runtime: RuntimeId,
    pub channel: ChannelId,
    pub function_pointer: FunctionPointer,
    pub proxy: ObjectIdentity,
    pub signature: String,
    pub args: Vec<Value>,
    pub blocking: bool,
    pub reentrancy_safe: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Invoke(Recorded),
    Release(CleanupToken),
    ReleaseChannel(ChannelId),
}

/// Transport double that records every call and answers from a script.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<Event>>,
    replies: Mutex<VecDeque<Payload>>,
    next_token: Mutex<i64>,
    held: Mutex<Vec<Invocation>>,
    fail_invoke: bool,
    fail_release: bool,
    omit_envelope: bool,
    hold_async: bool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every invoke fails with `Disconnected`.
    pub fn failing_invoke() -> Arc<Self> {
        Arc::new(Self {
            fail_invoke: true,
            ..Self::default()
        })
    }

    /// Every release of a result fails.
    pub fn failing_release() -> Arc<Self> {
        Arc::new(Self {
            fail_release: true,
            ..Self::default()
        })
    }

    /// Blocking calls come back without an envelope.
    pub fn omitting_envelope() -> Arc<Self> {
        Arc::new(Self {
            omit_envelope: true,
            ..Self::default()
        })
    }

    /// Non-blocking calls stay queued until `finish_held` runs them.
    pub fn holding_async() -> Arc<Self> {
        Arc::new(Self {
            hold_async: true,
            ..Self::default()
        })
    }

    /// Completes queued non-blocking calls and returns how many there were.
    pub fn finish_held(&self) -> usize {
        let held = std::mem::take(&mut *self.held.lock().unwrap());
        held.len()
    }

    pub fn reply(&self, payload: Payload) {
        self.replies.lock().unwrap().push_back(payload);
    }

    pub fn reply_value(&self, value: impl Into<Value>) {
        self.reply(Payload::Value(value.into()));
    }

    pub fn reply_error(&self, error: ForeignError) {
        self.reply(Payload::Error(error));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<Recorded> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Invoke(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn releases(&self) -> Vec<CleanupToken> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Release(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn released_channels(&self) -> Vec<ChannelId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ReleaseChannel(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn invoke(&self, call: Invocation) -> Result<Option<ResultEnvelope>, TransportError> {
        self.events.lock().unwrap().push(Event::Invoke(Recorded {
            runtime: call.runtime,
            channel: call.channel,
            function_pointer: call.function_pointer,
            proxy: call.proxy.identity(),
            signature: call.signature.clone(),
            args: call.args.clone(),
            blocking: call.blocking,
            reentrancy_safe: call.reentrancy_safe,
        }));
        if self.fail_invoke {
            return Err(TransportError::Disconnected);
        }
        if !call.blocking && self.hold_async {
            self.held.lock().unwrap().push(call);
            return Ok(None);
        }
        if !call.blocking || self.omit_envelope {
            return Ok(None);
        }
        let payload = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Payload::Value(Value::Null));
        let mut next = self.next_token.lock().unwrap();
        *next += 1;
        Ok(Some(ResultEnvelope {
            cleanup: CleanupToken(*next),
            payload,
        }))
    }

    fn release(&self, token: CleanupToken) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(Event::Release(token));
        if self.fail_release {
            Err(TransportError::Rejected("release refused".into()))
        } else {
            Ok(())
        }
    }

    fn release_channel(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(Event::ReleaseChannel(channel));
        Ok(())
    }
}

pub fn greet_method() -> MethodDesc {
    MethodDesc::new("greet", vec![TypeDesc::string()], TypeDesc::string())
}

pub fn tick_method() -> MethodDesc {
    MethodDesc::new("tick", vec![TypeDesc::Int], TypeDesc::Void)
}

pub fn registry() -> Arc<InterfaceRegistry> {
    let mut registry = InterfaceRegistry::new();
    registry.insert(InterfaceDesc::new(GREETER).with_method(greet_method()));
    registry.insert(InterfaceDesc::new(TICKER).with_method(tick_method()));
    Arc::new(registry)
}

pub fn factory(transport: &Arc<RecordingTransport>) -> ProxyFactory {
    factory_with_context(transport, Arc::new(NoMainContext))
}

pub fn factory_with_context(
    transport: &Arc<RecordingTransport>,
    main_context: Arc<dyn MainContext>,
) -> ProxyFactory {
    ProxyFactory::new(RuntimeId(3), transport.clone(), registry(), main_context)
        .with_cleaner(Arc::new(ResourceCleaner::new()))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
