use api::{MainThread, NoMainContext, RuntimeId, Value};
use dispatch::{CallError, ProxyFactory};
use loopback::{ForeignImplementation, LoopbackRuntime};
use portbridge::demo::{self, Greeter, GREETER, JOURNAL};
use portbridge::{load_config, BridgeConfig};
use std::fs;
use std::sync::Arc;

fn greeter_answering(id: i64, reply: Value) -> Greeter {
    let runtime = LoopbackRuntime::start(RuntimeId(id)).unwrap();
    let handle = runtime.register(
        ForeignImplementation::new()
            .on("greet(Ljava/lang/String;)Ljava/lang/String;", move |_| Ok(reply.clone())),
    );
    let mut factory = ProxyFactory::new(
        runtime.id(),
        Arc::new(runtime.clone()),
        Arc::new(demo::builtin_registry()),
        Arc::new(NoMainContext),
    );
    factory
        .add_implementation(GREETER, handle.channel, handle.function_pointer, Vec::<String>::new())
        .unwrap();
    factory.build().unwrap().cast::<Greeter>().unwrap()
}

#[test]
fn test_demo_with_default_config() {
    let _ = env_logger::builder().is_test(true).try_init();

    let report = demo::run(&BridgeConfig::default(), Arc::new(NoMainContext)).unwrap();
    assert_eq!(report.greetings, vec!["Hello, Ada", "Hello, Grace"]);
    assert_eq!(report.journal, vec!["greeting Ada", "greeting Grace"]);
    assert!(report.equals_self);
    assert!(report.proxy.starts_with(&format!("{}@", GREETER)));
    assert_eq!(report.open_channels_after_drop, 0);
}

#[test]
fn test_demo_entering_runtime_from_main_thread() {
    let config = BridgeConfig {
        greeting: "Hi".to_string(),
        names: vec!["Linus".to_string()],
        ..Default::default()
    };

    let report = demo::run(&config, Arc::new(MainThread::current())).unwrap();
    assert_eq!(report.greetings, vec!["Hi, Linus"]);
    assert_eq!(report.journal, vec!["greeting Linus"]);
}

#[test]
fn test_config_written_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let created = load_config(&path).unwrap();
    assert_eq!(created, BridgeConfig::default());
    assert!(path.exists());

    let reloaded = load_config(&path).unwrap();
    assert_eq!(reloaded, created);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "runtime_id": 9, "async_methods": ["ping()V"] }"#).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.runtime_id, 9);
    assert_eq!(config.async_methods, vec!["ping()V"]);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.greeting, "Hello");
    assert!(config.mark_main_thread);
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ runtime_id: ").unwrap();

    assert!(load_config(&path).is_err());
}

#[test]
fn test_demo_uses_interface_summary() {
    let dir = tempfile::tempdir().unwrap();
    let summary = dir.path().join("summary.json");
    fs::write(
        &summary,
        format!(
            r#"[
                {{ "id": "{}", "methods": [ {{ "name": "greet", "params": ["java.lang.String"], "ret": "java.lang.String" }} ] }},
                {{ "id": "{}", "methods": [ {{ "name": "write", "params": ["java.lang.String"] }} ] }}
            ]"#,
            GREETER, JOURNAL
        ),
    )
    .unwrap();

    let config = BridgeConfig {
        summary_path: Some(summary),
        names: vec!["Ada".to_string()],
        ..Default::default()
    };
    let report = demo::run(&config, Arc::new(NoMainContext)).unwrap();
    assert_eq!(report.greetings, vec!["Hello, Ada"]);
}

#[test]
fn test_summary_missing_an_interface_fails_build() {
    let dir = tempfile::tempdir().unwrap();
    let summary = dir.path().join("summary.json");
    fs::write(&summary, format!(r#"[ {{ "id": "{}" }} ]"#, GREETER)).unwrap();

    let config = BridgeConfig {
        summary_path: Some(summary),
        ..Default::default()
    };
    let err = demo::run(&config, Arc::new(NoMainContext)).unwrap_err();
    assert!(err.to_string().contains(JOURNAL), "unexpected error: {:#}", err);
}

#[test]
fn test_greeter_keeps_null_and_rejects_non_strings() {
    let null = greeter_answering(41, Value::Null);
    assert_eq!(null.greet("Ada").unwrap(), None);

    let number = greeter_answering(42, Value::Int(7));
    match number.greet("Ada") {
        Err(CallError::UnexpectedReturn { method, value }) => {
            assert_eq!(method, "greet(Ljava/lang/String;)Ljava/lang/String;");
            assert_eq!(value, Value::Int(7));
        }
        other => panic!("unexpected: {:?}", other),
    }
}
