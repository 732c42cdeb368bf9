use crate::cleaner::ResourceCleaner;
use crate::dispatcher::InvocationDispatcher;
use crate::proxy::{self, CompositeProxy};
use crate::table::ImplementationTable;
use crate::{BuildError, Transport};
use api::{
    ChannelId, FunctionPointer, ImplementationHandle, InterfaceId, InterfaceResolver, MainContext,
    RuntimeId,
};
use log::{debug, info};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryState {
    Empty,
    Accumulating,
    Built,
}

/// Collects foreign implementations and turns them into one [`CompositeProxy`].
pub struct ProxyFactory {
    runtime: RuntimeId,
    state: FactoryState,
    table: ImplementationTable,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn InterfaceResolver>,
    main_context: Arc<dyn MainContext>,
    constructed_on_main: bool,
    cleaner: Arc<ResourceCleaner>,
}

impl ProxyFactory {
    /// Whether this thread is the main context is captured here, once.
    pub fn new(
        runtime: RuntimeId,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn InterfaceResolver>,
        main_context: Arc<dyn MainContext>,
    ) -> Self {
        let constructed_on_main = main_context.is_current();
        Self {
            runtime,
            state: FactoryState::Empty,
            table: ImplementationTable::new(),
            transport,
            resolver,
            main_context,
            constructed_on_main,
            cleaner: ResourceCleaner::global(),
        }
    }

    /// Use `cleaner` instead of the process-wide one.
    pub fn with_cleaner(mut self, cleaner: Arc<ResourceCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn state(&self) -> FactoryState {
        self.state
    }

    pub fn constructed_on_main(&self) -> bool {
        self.constructed_on_main
    }

    /// Registers the foreign implementation of `interface`. Adding the same
    /// interface again replaces its handle.
    pub fn add_implementation<I, K>(
        &mut self,
        interface: impl Into<InterfaceId>,
        channel: ChannelId,
        function_pointer: FunctionPointer,
        async_methods: I,
    ) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        if self.state == FactoryState::Built {
            return Err(BuildError::AlreadyBuilt);
        }
        let interface = interface.into();
        debug!("Adding implementation of {} on {}", interface, channel);
        self.table.put(
            interface,
            ImplementationHandle::new(channel, function_pointer),
            async_methods,
        );
        self.state = FactoryState::Accumulating;
        Ok(())
    }

    /// Builds the proxy. Can succeed at most once.
    ///
    /// The factory counts as built as soon as resolution starts, so a failed
    /// resolution cannot be retried on the same factory.
    pub fn build(&mut self) -> Result<CompositeProxy, BuildError> {
        match self.state {
            FactoryState::Empty => return Err(BuildError::Empty),
            FactoryState::Built => return Err(BuildError::AlreadyBuilt),
            FactoryState::Accumulating => {}
        }
        self.state = FactoryState::Built;
        let table = std::mem::take(&mut self.table);

        let interfaces = table
            .interfaces()
            .map(|id| self.resolver.resolve(id))
            .collect::<Result<Vec<_>, _>>()?;

        let cleanup = table
            .handles()
            .map(|handle| self.cleaner.register(handle.channel, Arc::clone(&self.transport)))
            .collect();

        let dispatcher = InvocationDispatcher::new(
            self.runtime,
            table,
            Arc::clone(&self.transport),
            Arc::clone(&self.main_context),
            self.constructed_on_main,
        );
        let proxy = CompositeProxy::new(proxy::next_identity(), interfaces, dispatcher, cleanup);
        info!(
            "Built {} over {} interface(s)",
            proxy,
            proxy.interfaces().len()
        );
        Ok(proxy)
    }
}
