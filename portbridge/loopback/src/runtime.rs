use crate::implementation::{ForeignCall, ForeignImplementation};
use crate::LoopbackError;
use api::{
    ChannelId, CleanupToken, ForeignError, FunctionPointer, ImplementationHandle, ResultEnvelope,
    RuntimeId, Value,
};
use dispatch::{Invocation, Transport, TransportError};
use log::{debug, info, trace, warn};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::{mpsc, oneshot};

type Reply = oneshot::Sender<Result<Value, ForeignError>>;

struct Request {
    implementation: Arc<ForeignImplementation>,
    // Owns the calling proxy, so its channel cannot close while queued.
    call: ForeignCall,
    reply: Option<Reply>,
}

impl Request {
    fn run(self) {
        let outcome = run_handler(&self.implementation, &self.call);
        match self.reply {
            Some(reply) => {
                if reply.send(outcome).is_err() {
                    debug!("Caller of {} went away before the result", self.call.signature);
                }
            }
            None => {
                if let Err(e) = outcome {
                    warn!("Fire-and-forget call {} failed: {}", self.call.signature, e);
                }
            }
        }
    }
}

fn run_handler(implementation: &ForeignImplementation, call: &ForeignCall) -> Result<Value, ForeignError> {
    panic::catch_unwind(AssertUnwindSafe(|| implementation.handle(call))).unwrap_or_else(|_| {
        Err(ForeignError::new(format!(
            "Foreign handler for {} panicked",
            call.signature
        )))
    })
}

struct Port {
    function_pointer: FunctionPointer,
    implementation: Arc<ForeignImplementation>,
}

struct Inner {
    id: RuntimeId,
    sender: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    ports: RwLock<HashMap<ChannelId, Port>>,
    results: Mutex<HashSet<i64>>,
    next_channel: AtomicI64,
    next_pointer: AtomicI64,
    next_token: AtomicI64,
}

/// Handle to a running loopback runtime. Clones share the same runtime.
#[derive(Clone)]
pub struct LoopbackRuntime {
    inner: Arc<Inner>,
}

impl LoopbackRuntime {
    /// Spawns the runtime thread and its event loop.
    pub fn start(id: RuntimeId) -> Result<Self, LoopbackError> {
        let event_loop = tokio::runtime::Builder::new_current_thread().build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Request>();

        let worker = thread::Builder::new()
            .name(format!("loopback-{}", id.0))
            .spawn(move || {
                event_loop.block_on(async move {
                    while let Some(request) = receiver.recv().await {
                        request.run();
                    }
                });
                debug!("Loopback event loop drained");
            })?;

        info!("Started loopback runtime {:?}", id);
        Ok(Self {
            inner: Arc::new(Inner {
                id,
                worker_id: worker.thread().id(),
                sender: Mutex::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
                ports: RwLock::new(HashMap::new()),
                results: Mutex::new(HashSet::new()),
                next_channel: AtomicI64::new(1),
                next_pointer: AtomicI64::new(0x1000),
                next_token: AtomicI64::new(1),
            }),
        })
    }

    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    /// Opens a channel for `implementation` and returns the handle proxies use to reach it.
    pub fn register(&self, implementation: ForeignImplementation) -> ImplementationHandle {
        let channel = ChannelId(self.inner.next_channel.fetch_add(1, Ordering::Relaxed));
        let function_pointer = FunctionPointer(self.inner.next_pointer.fetch_add(0x10, Ordering::Relaxed));
        debug!("Registered {:?} on {}", implementation, channel);
        self.inner.write_ports().insert(
            channel,
            Port {
                function_pointer,
                implementation: Arc::new(implementation),
            },
        );
        ImplementationHandle::new(channel, function_pointer)
    }

    pub fn open_channels(&self) -> usize {
        self.inner.read_ports().len()
    }

    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.inner.read_ports().contains_key(&channel)
    }

    /// Results handed out and not yet released.
    pub fn live_results(&self) -> usize {
        self.inner.lock_results().len()
    }

    /// Stops accepting calls and waits for queued ones to finish.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn on_worker_thread(&self) -> bool {
        thread::current().id() == self.inner.worker_id
    }

    fn post(&self, request: Request) -> Result<(), TransportError> {
        let guard = self.inner.sender.lock().unwrap_or_else(|p| p.into_inner());
        let sender = guard.as_ref().ok_or(TransportError::Disconnected)?;
        sender.send(request).map_err(|_| TransportError::Disconnected)
    }

    fn allocate_result(&self) -> CleanupToken {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner.lock_results().insert(token);
        CleanupToken(token)
    }
}

impl Transport for LoopbackRuntime {
    fn invoke(&self, call: Invocation) -> Result<Option<ResultEnvelope>, TransportError> {
        if call.runtime != self.inner.id {
            return Err(TransportError::WrongRuntime(call.runtime, self.inner.id));
        }
        let implementation = {
            let ports = self.inner.read_ports();
            let port = ports
                .get(&call.channel)
                .ok_or(TransportError::ChannelClosed(call.channel))?;
            if port.function_pointer != call.function_pointer {
                return Err(TransportError::Rejected(format!(
                    "{} does not serve function pointer {:#x}",
                    call.channel, call.function_pointer.0
                )));
            }
            Arc::clone(&port.implementation)
        };
        let foreign_call = ForeignCall {
            proxy: call.proxy,
            signature: call.signature,
            args: call.args,
        };

        if !call.blocking {
            trace!("Posting {} to {}", foreign_call.signature, call.channel);
            self.post(Request {
                implementation,
                call: foreign_call,
                reply: None,
            })?;
            return Ok(None);
        }

        // Waiting on our own event loop would never finish.
        let outcome = if call.reentrancy_safe || self.on_worker_thread() {
            trace!("Entering runtime directly for {}", foreign_call.signature);
            run_handler(&implementation, &foreign_call)
        } else {
            let (reply, result) = oneshot::channel();
            self.post(Request {
                implementation,
                call: foreign_call,
                reply: Some(reply),
            })?;
            result.blocking_recv().map_err(|_| TransportError::Disconnected)?
        };

        let token = self.allocate_result();
        Ok(Some(match outcome {
            Ok(value) => ResultEnvelope::value(token, value),
            Err(error) => ResultEnvelope::error(token, error),
        }))
    }

    fn release(&self, token: CleanupToken) -> Result<(), TransportError> {
        if !self.inner.lock_results().remove(&token.0) {
            debug!("{} was already released", token);
        }
        Ok(())
    }

    fn release_channel(&self, channel: ChannelId) -> Result<(), TransportError> {
        match self.inner.write_ports().remove(&channel) {
            Some(_) => debug!("Closed {}", channel),
            None => debug!("{} was already closed", channel),
        }
        Ok(())
    }
}

impl Inner {
    fn read_ports(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ChannelId, Port>> {
        self.ports.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_ports(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ChannelId, Port>> {
        self.ports.write().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_results(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.results.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(worker) = worker {
            if thread::current().id() == self.worker_id {
                // The loop exits on its own once this request returns.
                return;
            }
            if worker.join().is_err() {
                warn!("Loopback runtime {:?} thread panicked", self.id);
            }
        }
        info!("Stopped loopback runtime {:?}", self.id);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
