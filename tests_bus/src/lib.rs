//! Bus Test Utilities
//!
//! This crate provides shared utilities for end-to-end tests of the
//! dispatch engine running over a simulated bus.
//!
//! ## Test Philosophy
//!
//! - **Real threads**: every peer runs its dispatch loop on its own thread,
//!   so blocking calls exercise the cross-thread completion handoff
//! - **Wire fidelity**: peers only talk through encoded frames
//! - **Both sides**: skeletons and stubs are built from the same descriptors

use bus_api::{BusError, Executor};
use bus_types::ObjectPath;
use dispatch::{Bus, ConnectionConfig, MethodError, Object, Service, ThreadExecutor};
use sim_bus::SimulatedBus;
use test_service::{properties, signals, Echo, Exclusive, Method, Stall, EXPECTED_VALUE, PATH};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Descriptors of the interface the tests export and call
pub mod test_service {
    use dispatch::{InterfaceDescriptor, MethodDescriptor};
    use std::time::Duration;

    /// Object path the skeleton exports
    pub const PATH: &str = "/this/is/unlikely/to/exist/Service";

    /// Value the skeleton's method returns and its signal carries
    pub const EXPECTED_VALUE: i64 = 42;

    pub struct Service;

    impl InterfaceDescriptor for Service {
        const NAME: &'static str = "org.freedesktop.dbus.test.Service";
    }

    /// `Method() -> x`
    pub struct Method;

    impl MethodDescriptor for Method {
        type Interface = Service;
        const NAME: &'static str = "Method";
        type Args = ();
        type Reply = i64;
    }

    /// `Echo(s) -> s`
    pub struct Echo;

    impl MethodDescriptor for Echo {
        type Interface = Service;
        const NAME: &'static str = "Echo";
        type Args = (String,);
        type Reply = String;
    }

    /// A method whose handler never answers
    pub struct Stall;

    impl MethodDescriptor for Stall {
        type Interface = Service;
        const NAME: &'static str = "Stall";
        const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);
        type Args = ();
        type Reply = ();
    }

    /// A method that may only be invoked synchronously
    pub struct Exclusive;

    impl MethodDescriptor for Exclusive {
        type Interface = Service;
        const NAME: &'static str = "Exclusive";
        const CALL_SYNCHRONOUSLY: bool = true;
        type Args = ();
        type Reply = ();
    }

    pub mod properties {
        use super::Service;
        use dispatch::PropertyDescriptor;

        pub struct Dummy;

        impl PropertyDescriptor for Dummy {
            type Interface = Service;
            const NAME: &'static str = "Dummy";
            type Value = i64;
            const WRITABLE: bool = true;
        }

        pub struct Label;

        impl PropertyDescriptor for Label {
            type Interface = Service;
            const NAME: &'static str = "Label";
            type Value = String;
            const WRITABLE: bool = false;
        }
    }

    pub mod signals {
        use super::Service;
        use dispatch::SignalDescriptor;

        pub struct Dummy;

        impl SignalDescriptor for Dummy {
            type Interface = Service;
            const NAME: &'static str = "Dummy";
            type Value = i64;
        }
    }
}

/// Installs a test-friendly tracing subscriber once; later calls are no-ops
///
/// Output is controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connection settings for tests: short polls, short default timeout
pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_default_call_timeout(Duration::from_secs(5))
}

/// One connection to a simulated bus, optionally with a running dispatch
/// loop on its own thread
pub struct TestPeer {
    pub bus: Arc<Bus>,
    dispatch: Option<JoinHandle<Result<(), BusError>>>,
}

impl TestPeer {
    /// Connects without starting a dispatch loop
    pub fn connect(sim: &SimulatedBus) -> Result<Self, BusError> {
        init_tracing();
        let transport = Arc::new(sim.connect()?);
        let bus = Bus::with_config(transport, test_config());
        let poll_interval = bus.config().poll_interval();
        bus.install_executor(Arc::new(ThreadExecutor::with_poll_interval(poll_interval)));
        Ok(Self {
            bus,
            dispatch: None,
        })
    }

    /// Connects and runs the dispatch loop on a dedicated thread
    pub fn start(sim: &SimulatedBus) -> Result<Self, BusError> {
        let mut peer = Self::connect(sim)?;
        peer.run_dispatch();
        Ok(peer)
    }

    /// Starts the dispatch loop and waits until it is running
    pub fn run_dispatch(&mut self) {
        let bus = Arc::clone(&self.bus);
        let handle = thread::spawn(move || bus.run());
        let executor = self.bus.executor();
        while executor.as_ref().is_some_and(|e| !e.is_running()) && !handle.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        self.dispatch = Some(handle);
    }

    /// Waits for the dispatch loop to end on its own
    pub fn join(&mut self) -> Result<(), BusError> {
        match self.dispatch.take() {
            Some(handle) => handle.join().unwrap_or(Err(BusError::ConnectionClosed)),
            None => Ok(()),
        }
    }

    /// Stops the dispatch loop and waits for it
    pub fn shutdown(&mut self) -> Result<(), BusError> {
        if self.dispatch.is_some() {
            self.bus.stop();
        }
        self.join()
    }
}

impl Drop for TestPeer {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// The exporting side of the test service
pub struct TestSkeleton {
    pub service: Arc<Service>,
    pub object: Arc<Object>,
}

/// Error name the `Echo` handler answers an empty string with
pub const EMPTY_ECHO_ERROR: &str = "org.freedesktop.dbus.test.Error.Empty";

/// Claims the test service on `bus` and exports its object
///
/// `Method` replies with [`EXPECTED_VALUE`] and then emits the `Dummy`
/// signal carrying the same value. `Dummy` starts at [`EXPECTED_VALUE`].
pub fn export_test_service(bus: &Arc<Bus>) -> Result<TestSkeleton, BusError> {
    let service = Service::add_service::<test_service::Service>(
        bus,
        Service::default_request_name_flags(),
    )?;
    let object = service.add_object_for_path(ObjectPath::new(PATH)?)?;
    object
        .get_property::<properties::Dummy>()
        .set_value(&EXPECTED_VALUE)?;
    object
        .get_property::<properties::Label>()
        .set_value(&"skeleton".to_string())?;
    object.get_signal::<signals::Dummy>();

    let weak = Arc::downgrade(&object);
    object.install_method_handler::<Method, _>(move |call| {
        let Some(object) = weak.upgrade() else {
            return;
        };
        object.reply(call, &EXPECTED_VALUE);
        if let Err(err) = object.emit_signal::<signals::Dummy>(&EXPECTED_VALUE) {
            tracing::warn!(error = %err, "failed to emit test signal");
        }
    })?;
    object.install_typed_handler::<Echo, _>(|(text,)| {
        if text.is_empty() {
            Err(MethodError::new(EMPTY_ECHO_ERROR, "nothing to echo"))
        } else {
            Ok(text)
        }
    })?;
    object.install_method_handler::<Stall, _>(|_| {})?;
    object.install_typed_handler::<Exclusive, _>(|()| Ok(()))?;

    Ok(TestSkeleton { service, object })
}
