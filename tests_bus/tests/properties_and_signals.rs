//! Properties served by exported objects and signal subscriptions

use bus_api::BusError;
use bus_types::{error_names, BusName, ObjectPath};
use dispatch::interfaces::properties::{self, PropertiesChanged, PropertiesChangedArgs};
use dispatch::{InterfaceDescriptor, Object, PropertyDescriptor, Service};
use parking_lot::Mutex;
use sim_bus::SimulatedBus;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tests_bus::test_service::{self, signals, Method, EXPECTED_VALUE, PATH};
use tests_bus::test_service::properties::{Dummy, Label};
use tests_bus::{export_test_service, TestPeer, TestSkeleton};
use wire::Variant;

/// A property the skeleton never registers
struct Unregistered;

impl PropertyDescriptor for Unregistered {
    type Interface = test_service::Service;
    const NAME: &'static str = "Unregistered";
    type Value = u32;
    const WRITABLE: bool = true;
}

const TIMEOUT: Duration = Duration::from_secs(5);

fn interface() -> String {
    <test_service::Service as InterfaceDescriptor>::NAME.to_string()
}

fn connect_pair(sim: &SimulatedBus) -> (TestPeer, TestSkeleton, TestPeer, Arc<Object>) {
    let server = TestPeer::start(sim).expect("server");
    let skeleton = export_test_service(&server.bus).expect("export");
    let client = TestPeer::start(sim).expect("client");
    let stub = Service::use_service_for::<test_service::Service>(&client.bus)
        .unwrap()
        .object_for_path(ObjectPath::new(PATH).unwrap());
    (server, skeleton, client, stub)
}

#[test]
fn test_read_only_property_is_refused_before_sending() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, client, stub) = connect_pair(&sim);

    let err = stub
        .get_property::<Label>()
        .set_value(&"renamed".to_string())
        .unwrap_err();

    assert!(matches!(err, BusError::ReadOnlyProperty { .. }), "{err}");
    assert_eq!(client.bus.pending_calls(), 0);
    assert_eq!(stub.get_property::<Label>().value().unwrap(), "skeleton");
}

#[test]
fn test_raw_set_of_read_only_property_is_rejected_remotely() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, _client, stub) = connect_pair(&sim);

    let result = stub
        .invoke_method_synchronously::<properties::Set>((
            interface(),
            "Label".to_string(),
            Variant::new(&"renamed".to_string()),
        ))
        .unwrap();

    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::PROPERTY_READ_ONLY), "{error}");
}

#[test]
fn test_set_with_wrong_type_is_rejected() {
    let sim = SimulatedBus::new();
    let (_server, skeleton, _client, stub) = connect_pair(&sim);

    let result = stub
        .invoke_method_synchronously::<properties::Set>((
            interface(),
            "Dummy".to_string(),
            Variant::new(&"not a number".to_string()),
        ))
        .unwrap();

    let error = result.error().expect("error result");
    assert!(error.starts_with(error_names::INVALID_ARGS), "{error}");
    let local = skeleton.object.get_property::<Dummy>();
    assert_eq!(local.value().unwrap(), EXPECTED_VALUE);
}

#[test]
fn test_unknown_property_fails_remotely() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, _client, stub) = connect_pair(&sim);

    let err = stub.get_property::<Unregistered>().value().unwrap_err();

    match err {
        BusError::CallFailed(reason) => {
            assert!(reason.starts_with(error_names::UNKNOWN_PROPERTY), "{reason}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unset_property() {
    let sim = SimulatedBus::new();
    let (_server, skeleton, _client, stub) = connect_pair(&sim);
    let local = skeleton.object.get_property::<Unregistered>();

    let err = local.value().unwrap_err();
    assert!(matches!(err, BusError::PropertyUnset { .. }), "{err}");

    let err = stub.get_property::<Unregistered>().value().unwrap_err();
    match err {
        BusError::CallFailed(reason) => {
            assert!(reason.starts_with(error_names::FAILED), "{reason}")
        }
        other => panic!("unexpected error: {other}"),
    }

    local.set_value(&7).unwrap();
    assert_eq!(stub.get_property::<Unregistered>().value().unwrap(), 7);
}

#[test]
fn test_get_all_lists_set_properties() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, _client, stub) = connect_pair(&sim);

    let all = stub
        .invoke_method_synchronously::<properties::GetAll>((interface(),))
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(all["Dummy"].get::<i64>().unwrap(), EXPECTED_VALUE);
    assert_eq!(all["Label"].get::<String>().unwrap(), "skeleton");
}

#[test]
fn test_local_change_emits_properties_changed() {
    let sim = SimulatedBus::new();
    let (_server, skeleton, _client, stub) = connect_pair(&sim);
    let (tx, rx) = mpsc::channel::<PropertiesChangedArgs>();
    let tx = Mutex::new(tx);

    let changes = stub.get_signal::<PropertiesChanged>();
    changes
        .connect(move |args| {
            let _ = tx.lock().send(args);
        })
        .unwrap();

    skeleton.object.get_property::<Dummy>().set_value(&7).unwrap();

    let args = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(args.interface, interface());
    assert_eq!(args.changed.get("Dummy"), Some(&Variant::new(&7i64)));
    assert!(args.invalidated.is_empty());
}

#[test]
fn test_dropping_last_signal_handle_unsubscribes() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, _client, stub) = connect_pair(&sim);

    let (first_tx, first_rx) = mpsc::channel::<i64>();
    let first_tx = Mutex::new(first_tx);
    let first = stub.get_signal::<signals::Dummy>();
    first
        .connect(move |value| {
            let _ = first_tx.lock().send(value);
        })
        .unwrap();
    drop(first);

    // The subscriber closure went away with the route
    assert_eq!(first_rx.recv_timeout(TIMEOUT), Err(RecvTimeoutError::Disconnected));

    let (second_tx, second_rx) = mpsc::channel::<i64>();
    let second_tx = Mutex::new(second_tx);
    let second = stub.get_signal::<signals::Dummy>();
    second
        .connect(move |value| {
            let _ = second_tx.lock().send(value);
        })
        .unwrap();

    let value = stub
        .invoke_method_synchronously::<Method>(())
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(value, EXPECTED_VALUE);
    assert_eq!(second_rx.recv_timeout(TIMEOUT), Ok(EXPECTED_VALUE));
    assert_eq!(second.subscriber_count(), 1);
}

#[test]
fn test_several_subscribers_share_one_subscription() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, _client, stub) = connect_pair(&sim);
    let (tx, rx) = mpsc::channel::<(usize, i64)>();
    let tx = Arc::new(Mutex::new(tx));

    let signal = stub.get_signal::<signals::Dummy>();
    for index in 0..2 {
        let tx = Arc::clone(&tx);
        signal
            .connect(move |value| {
                let _ = tx.lock().send((index, value));
            })
            .unwrap();
    }
    assert_eq!(signal.subscriber_count(), 2);

    stub.invoke_method_synchronously::<Method>(()).unwrap();

    let mut seen = vec![
        rx.recv_timeout(TIMEOUT).unwrap(),
        rx.recv_timeout(TIMEOUT).unwrap(),
    ];
    seen.sort();
    assert_eq!(seen, vec![(0, EXPECTED_VALUE), (1, EXPECTED_VALUE)]);
}

#[test]
fn test_signals_are_told_apart_by_sending_service() {
    let sim = SimulatedBus::new();
    let (_server, _skeleton, client, stub) = connect_pair(&sim);

    let other = TestPeer::start(&sim).expect("other");
    let other_service = Service::add_service_named(
        &other.bus,
        BusName::new("org.example.Other").unwrap(),
        Service::default_request_name_flags(),
    )
    .unwrap();
    let other_object = other_service
        .add_object_for_path(ObjectPath::new(PATH).unwrap())
        .unwrap();
    let other_stub = Service::use_service(&client.bus, "org.example.Other")
        .unwrap()
        .object_for_path(ObjectPath::new(PATH).unwrap());

    let (tx, rx) = mpsc::channel::<(&'static str, i64)>();
    let tx = Arc::new(Mutex::new(tx));
    let test_signal = stub.get_signal::<signals::Dummy>();
    let other_signal = other_stub.get_signal::<signals::Dummy>();
    for (origin, signal) in [("test", &test_signal), ("other", &other_signal)] {
        let tx = Arc::clone(&tx);
        signal
            .connect(move |value| {
                let _ = tx.lock().send((origin, value));
            })
            .unwrap();
    }

    other_object.emit_signal::<signals::Dummy>(&7).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(("other", 7)));

    stub.invoke_method_synchronously::<Method>(()).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(("test", EXPECTED_VALUE)));
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn test_signals_follow_the_name_to_its_new_owner() {
    let sim = SimulatedBus::new();
    let (_server, skeleton, _client, stub) = connect_pair(&sim);
    let (tx, rx) = mpsc::channel::<i64>();
    let tx = Mutex::new(tx);
    let signal = stub.get_signal::<signals::Dummy>();
    signal
        .connect(move |value| {
            let _ = tx.lock().send(value);
        })
        .unwrap();

    let TestSkeleton {
        service,
        object: previous,
    } = skeleton;
    drop(service);
    let successor = TestPeer::start(&sim).expect("successor");
    let replacement = export_test_service(&successor.bus).expect("export");

    previous.emit_signal::<signals::Dummy>(&1).unwrap();
    replacement.object.emit_signal::<signals::Dummy>(&2).unwrap();

    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(2));
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    );
}
