//! Named endpoints
//!
//! A [`Service`] is either a name this connection owns, under which it
//! exports objects, or a reference to a name owned elsewhere that calls are
//! addressed to. Referencing never touches the bus; claiming asks the
//! daemon and fails unless the connection ends up as primary owner.

use crate::bus::Bus;
use crate::interfaces::dbus;
use crate::object::Object;
use crate::traits::InterfaceDescriptor;
use bus_api::BusError;
use bus_types::{BusName, ObjectPath, RequestNameFlags, RequestNameReply};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub struct Service {
    bus: Arc<Bus>,
    name: BusName,
    owned: bool,
    objects: Mutex<BTreeMap<ObjectPath, Arc<Object>>>,
}

impl Service {
    /// Replace an existing owner, refuse to be replaced, queue if refused
    pub fn default_request_name_flags() -> RequestNameFlags {
        RequestNameFlags::default()
    }

    /// Claims the name of interface `I` under `flags`
    pub fn add_service<I: InterfaceDescriptor>(
        bus: &Arc<Bus>,
        flags: RequestNameFlags,
    ) -> Result<Arc<Self>, BusError> {
        Self::add_service_named(bus, BusName::new(I::NAME)?, flags)
    }

    /// Claims `name` under `flags`
    ///
    /// Succeeds only when the daemon makes this connection the primary
    /// owner. A request that was merely queued is withdrawn again.
    pub fn add_service_named(
        bus: &Arc<Bus>,
        name: BusName,
        flags: RequestNameFlags,
    ) -> Result<Arc<Self>, BusError> {
        let refused = |reason: String| BusError::NameAcquisition {
            name: name.to_string(),
            reason,
        };
        let code = dbus::request_name(bus, &name, flags)?
            .into_result()
            .map_err(|err| refused(err.to_string()))?;
        match RequestNameReply::from_code(code) {
            Some(reply) if reply.is_owner() => {
                tracing::info!(%name, %reply, flags = flags.bits(), "service name acquired");
                Ok(Arc::new(Self {
                    bus: Arc::clone(bus),
                    name,
                    owned: true,
                    objects: Mutex::new(BTreeMap::new()),
                }))
            }
            Some(RequestNameReply::InQueue) => {
                if let Err(err) = dbus::release_name_no_reply(bus, &name) {
                    tracing::warn!(%name, error = %err, "failed to leave name queue");
                }
                Err(refused("queued behind the current owner".to_string()))
            }
            Some(RequestNameReply::Exists) => {
                Err(refused("name has an owner that cannot be replaced".to_string()))
            }
            _ => Err(refused(format!("unexpected reply code {}", code))),
        }
    }

    /// References `name` without claiming it
    pub fn use_service(bus: &Arc<Bus>, name: &str) -> Result<Arc<Self>, BusError> {
        Ok(Arc::new(Self {
            bus: Arc::clone(bus),
            name: BusName::new(name)?,
            owned: false,
            objects: Mutex::new(BTreeMap::new()),
        }))
    }

    /// References the name of interface `I` without claiming it
    pub fn use_service_for<I: InterfaceDescriptor>(bus: &Arc<Bus>) -> Result<Arc<Self>, BusError> {
        Self::use_service(bus, I::NAME)
    }

    /// Exports a new object at `path`, owned by this service
    ///
    /// Only services that claimed their name may export objects.
    pub fn add_object_for_path(&self, path: ObjectPath) -> Result<Arc<Object>, BusError> {
        if !self.owned {
            return Err(BusError::NameNotOwned(self.name.to_string()));
        }
        let mut objects = self.objects.lock();
        if objects.contains_key(&path) {
            return Err(BusError::DuplicateObjectPath(path.to_string()));
        }
        let object = Object::exported(Arc::clone(&self.bus), self.name.clone(), path.clone())?;
        objects.insert(path, Arc::clone(&object));
        Ok(object)
    }

    /// Handle for calls against `path` under this service's name
    pub fn object_for_path(&self, path: ObjectPath) -> Arc<Object> {
        Object::remote(Arc::clone(&self.bus), self.name.clone(), path)
    }

    pub fn root_object(&self) -> Arc<Object> {
        self.object_for_path(ObjectPath::root())
    }

    pub fn name(&self) -> &BusName {
        &self.name
    }

    /// Whether this connection claimed the name
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("owned", &self.owned)
            .field("objects", &self.objects.lock().len())
            .finish()
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        for object in self.objects.get_mut().values() {
            self.bus.unexport(object);
        }
        if self.owned {
            if let Err(err) = dbus::release_name_no_reply(&self.bus, &self.name) {
                tracing::warn!(name = %self.name, error = %err, "failed to release service name");
            }
        }
    }
}
