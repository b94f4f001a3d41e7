//! Typed property handles

use crate::interfaces::properties;
use crate::object::Object;
use crate::traits::{InterfaceDescriptor, PropertyDescriptor};
use bus_api::BusError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use wire::Variant;

/// Handle on property `P` of one object
///
/// On an exported object the value lives locally and reads and writes never
/// leave the process; every write is announced with `PropertiesChanged`.
/// On a remote object each access is a synchronous `Get` or `Set` call.
pub struct Property<P: PropertyDescriptor> {
    object: Arc<Object>,
    _descriptor: PhantomData<fn() -> P>,
}

impl<P: PropertyDescriptor> Property<P> {
    pub(crate) fn new(object: Arc<Object>) -> Self {
        Self {
            object,
            _descriptor: PhantomData,
        }
    }

    pub fn object(&self) -> &Arc<Object> {
        &self.object
    }

    fn interface() -> String {
        <P::Interface as InterfaceDescriptor>::NAME.to_string()
    }

    pub fn value(&self) -> Result<P::Value, BusError> {
        if self.object.is_exported() {
            return self.object.load_property::<P>();
        }
        let variant = self
            .object
            .invoke_method_synchronously::<properties::Get>((Self::interface(), P::NAME.to_string()))?
            .into_result()
            .map_err(|err| BusError::CallFailed(err.to_string()))?;
        Ok(variant.get::<P::Value>()?)
    }

    pub fn set_value(&self, value: &P::Value) -> Result<(), BusError> {
        if self.object.is_exported() {
            self.object.store_property::<P>(value);
            return Ok(());
        }
        if !P::WRITABLE {
            return Err(BusError::ReadOnlyProperty {
                interface: Self::interface(),
                name: P::NAME.to_string(),
            });
        }
        self.object
            .invoke_method_synchronously::<properties::Set>((
                Self::interface(),
                P::NAME.to_string(),
                Variant::new(value),
            ))?
            .into_result()
            .map_err(|err| BusError::CallFailed(err.to_string()))
    }
}

impl<P: PropertyDescriptor> Clone for Property<P> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.object))
    }
}

impl<P: PropertyDescriptor> fmt::Debug for Property<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("interface", &<P::Interface as InterfaceDescriptor>::NAME)
            .field("name", &P::NAME)
            .field("path", self.object.path())
            .finish()
    }
}
