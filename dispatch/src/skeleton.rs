//! Exporting and consuming sides of one interface
//!
//! A [`Skeleton`] owns the interface's name on the bus and exports objects
//! under it. A [`Stub`] references the same name from another connection
//! and calls into it as if it were local.

use crate::bus::Bus;
use crate::object::Object;
use crate::service::Service;
use crate::traits::InterfaceDescriptor;
use bus_api::BusError;
use bus_types::{ObjectPath, RequestNameFlags};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Skeleton<I: InterfaceDescriptor> {
    service: Arc<Service>,
    _interface: PhantomData<fn() -> I>,
}

impl<I: InterfaceDescriptor> Skeleton<I> {
    /// Claims `I::NAME` with the default flags
    pub fn new(bus: &Arc<Bus>) -> Result<Self, BusError> {
        Self::with_flags(bus, Service::default_request_name_flags())
    }

    pub fn with_flags(bus: &Arc<Bus>, flags: RequestNameFlags) -> Result<Self, BusError> {
        Ok(Self {
            service: Service::add_service::<I>(bus, flags)?,
            _interface: PhantomData,
        })
    }

    pub fn bus(&self) -> &Arc<Bus> {
        self.service.bus()
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn add_object(&self, path: ObjectPath) -> Result<Arc<Object>, BusError> {
        self.service.add_object_for_path(path)
    }
}

impl<I: InterfaceDescriptor> fmt::Debug for Skeleton<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skeleton")
            .field("interface", &I::NAME)
            .field("service", &self.service)
            .finish()
    }
}

pub struct Stub<I: InterfaceDescriptor> {
    service: Arc<Service>,
    _interface: PhantomData<fn() -> I>,
}

impl<I: InterfaceDescriptor> Stub<I> {
    /// References `I::NAME`; never fails because the name has no owner yet
    pub fn new(bus: &Arc<Bus>) -> Result<Self, BusError> {
        Ok(Self {
            service: Service::use_service_for::<I>(bus)?,
            _interface: PhantomData,
        })
    }

    pub fn bus(&self) -> &Arc<Bus> {
        self.service.bus()
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn object(&self, path: ObjectPath) -> Arc<Object> {
        self.service.object_for_path(path)
    }
}

impl<I: InterfaceDescriptor> Clone for Stub<I> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            _interface: PhantomData,
        }
    }
}

impl<I: InterfaceDescriptor> fmt::Debug for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("interface", &I::NAME)
            .field("service", &self.service)
            .finish()
    }
}
