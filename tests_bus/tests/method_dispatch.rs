//! Routing of method calls: handlers, error replies, timeouts and
//! continuations

use bus_api::BusError;
use bus_types::{error_names, ObjectPath};
use dispatch::interfaces::introspectable::Introspect;
use dispatch::interfaces::peer::Ping;
use dispatch::{CallResult, InterfaceDescriptor, MethodDescriptor, Object, Service};
use parking_lot::Mutex;
use sim_bus::SimulatedBus;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tests_bus::test_service::{self, Echo, Exclusive, Method, Stall, EXPECTED_VALUE, PATH};
use tests_bus::{export_test_service, TestPeer, TestSkeleton, EMPTY_ECHO_ERROR};

/// A method the skeleton never installs
struct Missing;

impl MethodDescriptor for Missing {
    type Interface = test_service::Service;
    const NAME: &'static str = "Missing";
    type Args = ();
    type Reply = ();
}

struct Fixture {
    _server: TestPeer,
    skeleton: TestSkeleton,
    client: TestPeer,
}

impl Fixture {
    fn start(sim: &SimulatedBus) -> Self {
        let server = TestPeer::start(sim).expect("server");
        let skeleton = export_test_service(&server.bus).expect("export");
        let client = TestPeer::start(sim).expect("client");
        Self {
            _server: server,
            skeleton,
            client,
        }
    }

    fn stub(&self, path: &str) -> Arc<Object> {
        Service::use_service_for::<test_service::Service>(&self.client.bus)
            .unwrap()
            .object_for_path(ObjectPath::new(path).unwrap())
    }
}

#[test]
fn test_unknown_method_is_an_error_result() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);

    let result = fixture
        .stub(PATH)
        .invoke_method_synchronously::<Missing>(())
        .unwrap();

    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::UNKNOWN_METHOD), "{error}");
}

#[test]
fn test_unknown_object_is_an_error_result() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);

    let result = fixture
        .stub("/no/such/object")
        .invoke_method_synchronously::<Method>(())
        .unwrap();

    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::UNKNOWN_OBJECT), "{error}");
}

#[test]
fn test_unanswered_call_times_out() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);

    let started = Instant::now();
    let result = fixture
        .stub(PATH)
        .invoke_method_synchronously::<Stall>(())
        .unwrap();

    assert!(started.elapsed() >= Stall::DEFAULT_TIMEOUT);
    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::NO_REPLY), "{error}");
    assert_eq!(fixture.client.bus.pending_calls(), 0);
}

#[test]
fn test_typed_handler_replies_and_fails() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);
    let stub = fixture.stub(PATH);

    let echoed = stub
        .invoke_method_synchronously::<Echo>(("ping".to_string(),))
        .unwrap();
    assert_eq!(echoed.value().map(String::as_str), Some("ping"));

    let refused = stub
        .invoke_method_synchronously::<Echo>((String::new(),))
        .unwrap();
    let error = refused.error().expect("error result");
    assert!(error.starts_with(EMPTY_ECHO_ERROR), "{error}");
    assert!(error.ends_with("nothing to echo"), "{error}");
}

#[test]
fn test_asynchronous_call_runs_continuation() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);
    let (tx, rx) = mpsc::channel::<CallResult<String>>();
    let tx = Mutex::new(tx);

    fixture
        .stub(PATH)
        .invoke_method_asynchronously::<Echo, _>(("later".to_string(),), move |result| {
            let _ = tx.lock().send(result);
        })
        .unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(result.into_value().as_deref(), Some("later"));
}

#[test]
fn test_asynchronous_timeout_reaches_continuation() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);
    let (tx, rx) = mpsc::channel::<CallResult<()>>();
    let tx = Mutex::new(tx);

    fixture
        .stub(PATH)
        .invoke_method_asynchronously::<Stall, _>((), move |result| {
            let _ = tx.lock().send(result);
        })
        .unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::NO_REPLY), "{error}");
}

#[test]
fn test_synchronous_only_method_refuses_asynchronous_call() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);
    let stub = fixture.stub(PATH);

    let err = stub
        .invoke_method_asynchronously::<Exclusive, _>((), |_| {})
        .unwrap_err();
    assert!(matches!(err, BusError::SynchronousOnly(_)), "{err}");
    assert_eq!(fixture.client.bus.pending_calls(), 0);

    let result = stub.invoke_method_synchronously::<Exclusive>(()).unwrap();
    assert!(!result.is_error(), "{:?}", result.error());
}

#[test]
fn test_blocking_call_from_handler_is_refused() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);
    let relay = fixture
        .skeleton
        .service
        .add_object_for_path(ObjectPath::new("/relay").unwrap())
        .unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let weak = Arc::downgrade(&relay);
    relay
        .install_method_handler::<Method, _>(move |call| {
            let Some(relay) = weak.upgrade() else {
                return;
            };
            let nested = Object::remote(
                Arc::clone(relay.bus()),
                relay.bus().unique_name().clone(),
                ObjectPath::new(PATH).unwrap(),
            );
            let outcome = nested.invoke_method_synchronously::<Ping>(());
            let _ = tx
                .lock()
                .send(matches!(outcome, Err(BusError::CalledFromDispatchThread)));
            relay.reply(call, &EXPECTED_VALUE);
        })
        .unwrap();

    let result = fixture
        .stub("/relay")
        .invoke_method_synchronously::<Method>(())
        .unwrap();

    assert_eq!(result.value(), Some(&EXPECTED_VALUE));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
}

#[test]
fn test_introspection_lists_members_and_children() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);

    let xml = fixture
        .stub(PATH)
        .invoke_method_synchronously::<Introspect>(())
        .unwrap()
        .into_result()
        .unwrap();

    assert!(xml.contains(&format!(
        "<interface name=\"{}\">",
        <test_service::Service as InterfaceDescriptor>::NAME
    )));
    assert!(xml.contains("<method name=\"Echo\">"));
    assert!(xml.contains("<property name=\"Dummy\" type=\"x\" access=\"readwrite\"/>"));
    assert!(xml.contains("<property name=\"Label\" type=\"s\" access=\"read\"/>"));
    assert!(xml.contains("<signal name=\"Dummy\">"));
    assert!(xml.contains("org.freedesktop.DBus.Properties"));

    let parent = fixture
        .stub("/this/is/unlikely")
        .invoke_method_synchronously::<Introspect>(())
        .unwrap()
        .into_result()
        .unwrap();
    assert!(parent.contains("<node name=\"to\"/>"), "{parent}");
}

#[test]
fn test_ping_is_answered_by_every_object() {
    let sim = SimulatedBus::new();
    let fixture = Fixture::start(&sim);

    let result = fixture.stub(PATH).invoke_method_synchronously::<Ping>(()).unwrap();

    assert!(!result.is_error(), "{:?}", result.error());
}

#[test]
fn test_calls_are_pumped_inline_without_dispatch_loop() {
    let sim = SimulatedBus::new();
    let server = TestPeer::start(&sim).expect("server");
    let _skeleton = export_test_service(&server.bus).expect("export");
    let client = TestPeer::connect(&sim).expect("client");

    let value = Service::use_service_for::<test_service::Service>(&client.bus)
        .unwrap()
        .object_for_path(ObjectPath::new(PATH).unwrap())
        .invoke_method_synchronously::<Method>(())
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(value, EXPECTED_VALUE);
}

#[test]
fn test_unexported_objects_stop_answering() {
    let sim = SimulatedBus::new();
    let server = TestPeer::start(&sim).expect("server");
    let client = TestPeer::start(&sim).expect("client");
    let TestSkeleton { service, object } = export_test_service(&server.bus).expect("export");
    let path = ObjectPath::new(PATH).unwrap();
    assert!(server.bus.exported_paths().contains(&path));

    drop(service);
    drop(object);
    assert!(server.bus.exported_paths().is_empty());

    // Address the connection directly; the well-known name is gone
    let result = Object::remote(
        Arc::clone(&client.bus),
        server.bus.unique_name().clone(),
        path,
    )
    .invoke_method_synchronously::<Method>(())
    .unwrap();
    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::UNKNOWN_OBJECT), "{error}");
}

#[test]
fn test_typed_handlers_do_not_keep_the_bus_alive() {
    let sim = SimulatedBus::new();
    let peer = TestPeer::connect(&sim).expect("connect");
    let skeleton = export_test_service(&peer.bus).expect("export");
    let before = Arc::strong_count(&peer.bus);

    skeleton
        .object
        .install_typed_handler::<Method, _>(|()| Ok(EXPECTED_VALUE + 1))
        .unwrap();

    assert_eq!(Arc::strong_count(&peer.bus), before);
}
