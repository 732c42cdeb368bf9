use crate::BridgeConfig;
use anyhow::{anyhow, Context, Result};
use api::{
    InterfaceDesc, InterfaceRegistry, InterfaceResolver, MainContext, MethodDesc, RuntimeId,
    TypeDesc, Value,
};
use dispatch::{signature, CallError, CompositeProxy, Interface, ProxyFactory};
use log::{debug, info};
use loopback::{ForeignImplementation, LoopbackRuntime};
use std::sync::{Arc, Mutex};

pub const GREETER: &str = "com.example.Greeter";
pub const JOURNAL: &str = "com.example.Journal";

fn greet_method() -> MethodDesc {
    MethodDesc::new("greet", vec![TypeDesc::string()], TypeDesc::string())
}

fn write_method() -> MethodDesc {
    MethodDesc::new("write", vec![TypeDesc::string()], TypeDesc::Void)
}

pub fn builtin_registry() -> InterfaceRegistry {
    [
        InterfaceDesc::new(GREETER).with_method(greet_method()),
        InterfaceDesc::new(JOURNAL).with_method(write_method()),
    ]
    .into_iter()
    .collect()
}

pub struct Greeter(CompositeProxy);

impl Interface for Greeter {
    const ID: &'static str = GREETER;

    fn wrap(proxy: CompositeProxy) -> Self {
        Self(proxy)
    }
}

impl Greeter {
    /// `None` when the foreign greeter answers null.
    pub fn greet(&self, name: &str) -> Result<Option<String>, CallError> {
        match self.0.invoke(&Self::ID.into(), &greet_method(), vec![name.into()])? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(greeting)) => Ok(Some(greeting)),
            Some(value) => Err(CallError::UnexpectedReturn {
                method: signature::encode_method(&greet_method()),
                value,
            }),
        }
    }
}

pub struct Journal(CompositeProxy);

impl Interface for Journal {
    const ID: &'static str = JOURNAL;

    fn wrap(proxy: CompositeProxy) -> Self {
        Self(proxy)
    }
}

impl Journal {
    pub fn write(&self, line: &str) -> Result<(), CallError> {
        self.0.invoke(&Self::ID.into(), &write_method(), vec![line.into()])?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub proxy: String,
    pub greetings: Vec<String>,
    pub journal: Vec<String>,
    pub equals_self: bool,
    pub open_channels_after_drop: usize,
}

/// Builds one proxy over a greeter and a journal living in a loopback runtime
/// and drives it with the configured names.
pub fn run(config: &BridgeConfig, main_context: Arc<dyn MainContext>) -> Result<DemoReport> {
    let runtime = LoopbackRuntime::start(RuntimeId(config.runtime_id))?;
    let resolver: Arc<dyn InterfaceResolver> = match &config.summary_path {
        Some(path) => Arc::new(
            InterfaceRegistry::load(path)
                .with_context(|| format!("Failed to load interface summary {:?}", path))?,
        ),
        None => Arc::new(builtin_registry()),
    };

    let greeting = config.greeting.clone();
    let greet_key = signature::encode_method(&greet_method());
    let greeter = ForeignImplementation::new().on(greet_key, move |call| {
        Ok(Value::from(format!("{}, {}", greeting, call.str_arg(0)?)))
    });

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let journal = ForeignImplementation::new().on_async(signature::encode_method(&write_method()), move |call| {
        let line = call.str_arg(0)?.to_string();
        sink.lock()
            .map_err(|_| api::ForeignError::new("journal poisoned"))?
            .push(line);
        Ok(())
    });

    let mut factory = ProxyFactory::new(
        runtime.id(),
        Arc::new(runtime.clone()),
        resolver,
        main_context,
    );
    let handle = runtime.register(greeter);
    factory.add_implementation(GREETER, handle.channel, handle.function_pointer, config.async_methods.clone())?;
    let journal_async = journal.async_methods();
    let handle = runtime.register(journal);
    factory.add_implementation(JOURNAL, handle.channel, handle.function_pointer, journal_async)?;

    let proxy = factory.build()?;
    info!("Built {:?}", proxy);

    let greeter = proxy
        .cast::<Greeter>()
        .ok_or_else(|| anyhow!("{} does not implement {}", proxy, GREETER))?;
    let journal = proxy
        .cast::<Journal>()
        .ok_or_else(|| anyhow!("{} does not implement {}", proxy, JOURNAL))?;

    let mut greetings = Vec::with_capacity(config.names.len());
    for name in &config.names {
        journal.write(&format!("greeting {}", name))?;
        let greeting = greeter
            .greet(name)?
            .with_context(|| format!("Greeter answered null for {}", name))?;
        debug!("{} -> {}", name, greeting);
        greetings.push(greeting);
    }

    let equals_self = proxy
        .call(GREETER, "equals", vec![proxy.as_value()])?
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let proxy_name = proxy.to_string();

    drop(greeter);
    drop(journal);
    drop(proxy);
    let open_channels_after_drop = runtime.open_channels();
    runtime.shutdown();

    let journal = lines
        .lock()
        .map_err(|_| anyhow!("journal poisoned"))?
        .clone();
    Ok(DemoReport {
        proxy: proxy_name,
        greetings,
        journal,
        equals_self,
        open_channels_after_drop,
    })
}
