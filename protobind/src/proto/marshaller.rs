//! Marshaller factories and the per-payload-type marshaller cache.
//!
//! The registry asks its factories in priority order and keeps the first positive answer
//! for the rest of its lifetime. Entries are never evicted.
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::rpc_types::error::{Error, Result};
use super::type_model::{TypeDescriptor, TypeKind, WellKnownType};

/// How a resolved marshaller encodes its payload. The codec behind it is opaque here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Message,
    Enum,
    Scalar,
    Empty,
}

/// Handle to a per-type serialization strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marshaller {
    pub payload_type: String,
    pub encoding: Encoding,
    pub factory: &'static str,
}

#[auto_impl::auto_impl(&, Arc, Box)]
pub trait MarshallerFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_serialize(&self, ty: &TypeDescriptor) -> bool;

    fn create_marshaller(&self, ty: &TypeDescriptor) -> Result<Marshaller>;
}

/// Default factory: accepts anything the protobuf codec can carry as a single payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtobufMarshallerFactory;

impl MarshallerFactory for ProtobufMarshallerFactory {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    fn can_serialize(&self, ty: &TypeDescriptor) -> bool {
        match &ty.kind {
            TypeKind::Message(_) | TypeKind::Enum(_) | TypeKind::WellKnown(_) => true,
            TypeKind::Scalar(_) => true,
            // a repeated payload needs a wrapper message first
            TypeKind::RepeatedOf(_) => false,
        }
    }

    fn create_marshaller(&self, ty: &TypeDescriptor) -> Result<Marshaller> {
        if !self.can_serialize(ty) {
            return Err(Error::SerializationUnavailable(ty.name.clone()));
        }
        let encoding = match &ty.kind {
            TypeKind::WellKnown(WellKnownType::Empty) => Encoding::Empty,
            TypeKind::Enum(_) => Encoding::Enum,
            TypeKind::Scalar(_) => Encoding::Scalar,
            _ => Encoding::Message,
        };
        Ok(Marshaller {
            payload_type: ty.name.clone(),
            encoding,
            factory: self.name(),
        })
    }
}

/// A cached resolution: the payload type and the factory that accepted it.
#[derive(Clone)]
pub struct MarshallerBinding {
    pub payload_type: Arc<TypeDescriptor>,
    pub factory: Option<Arc<dyn MarshallerFactory>>,
    pub marshaller: Arc<Marshaller>,
}

impl fmt::Debug for MarshallerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallerBinding")
            .field("payload_type", &self.payload_type.name)
            .field("factory", &self.marshaller.factory)
            .finish()
    }
}

pub struct MarshallerRegistry {
    factories: Vec<Arc<dyn MarshallerFactory>>,
    cache: DashMap<String, MarshallerBinding>,
}

impl fmt::Debug for MarshallerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallerRegistry")
            .field(
                "factories",
                &self.factories.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Default for MarshallerRegistry {
    fn default() -> Self {
        Self::new(vec![Arc::new(ProtobufMarshallerFactory)])
    }
}

impl MarshallerRegistry {
    pub fn new(factories: Vec<Arc<dyn MarshallerFactory>>) -> Self {
        let ret = Self {
            factories,
            cache: DashMap::new(),
        };
        ret.seed_empty();
        ret
    }

    fn seed_empty(&self) {
        let empty = Arc::new(TypeDescriptor::well_known(WellKnownType::Empty));
        let marshaller = Arc::new(Marshaller {
            payload_type: empty.name.clone(),
            encoding: Encoding::Empty,
            factory: "builtin",
        });
        self.cache.insert(
            empty.name.clone(),
            MarshallerBinding {
                payload_type: empty,
                factory: None,
                marshaller,
            },
        );
    }

    pub fn factories(&self) -> &[Arc<dyn MarshallerFactory>] {
        &self.factories
    }

    /// The first factory, in priority order, that accepts the type.
    pub fn try_get_factory(&self, ty: &TypeDescriptor) -> Option<Arc<dyn MarshallerFactory>> {
        if let Some(hit) = self.cache.get(&ty.name) {
            if let Some(factory) = &hit.factory {
                return Some(factory.clone());
            }
        }
        self.factories
            .iter()
            .find(|f| f.can_serialize(ty))
            .cloned()
    }

    pub fn can_serialize(&self, ty: &TypeDescriptor) -> bool {
        self.cache.contains_key(&ty.name) || self.try_get_factory(ty).is_some()
    }

    /// Resolves and caches the marshaller for a payload type. Concurrent first requests for
    /// the same type resolve at most once; every caller sees the winning binding.
    pub fn get_marshaller(&self, ty: &Arc<TypeDescriptor>) -> Result<Arc<Marshaller>> {
        if let Some(hit) = self.cache.get(&ty.name) {
            return Ok(hit.marshaller.clone());
        }
        let binding = self
            .cache
            .entry(ty.name.clone())
            .or_try_insert_with(|| {
                let factory = self
                    .factories
                    .iter()
                    .find(|f| f.can_serialize(ty))
                    .cloned()
                    .ok_or_else(|| Error::SerializationUnavailable(ty.name.clone()))?;
                let marshaller = Arc::new(factory.create_marshaller(ty)?);
                tracing::debug!(payload = %ty.name, factory = factory.name(), "marshaller resolved");
                Ok::<_, Error>(MarshallerBinding {
                    payload_type: ty.clone(),
                    factory: Some(factory),
                    marshaller,
                })
            })?;
        Ok(binding.marshaller.clone())
    }

    pub fn binding(&self, type_name: &str) -> Option<MarshallerBinding> {
        self.cache.get(type_name).map(|r| r.value().clone())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
