//! IDL-agnostic type model built from host type references.
//!
//! Descriptors are cached twice: by host identity (so describing the same host type again
//! returns the same `Arc`) and by IDL name (so two different shapes claiming one name are
//! reported as a collision instead of being merged). Message fields reference other
//! messages and enums by name, which keeps recursive data contracts representable.
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::host::{ContractSet, DataType, EnumDef, MessageDef, Primitive, TypeRef};
use super::rpc_types::error::{Error, Result};

pub const GUID_DEFAULT: &str = "00000000-0000-0000-0000-000000000000";

/// Largest field number proto3 accepts.
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    Primitive(Primitive),
    /// 128-bit identifier carried as a string.
    Guid,
}

impl ScalarType {
    pub fn idl_name(&self) -> &'static str {
        match self {
            ScalarType::Primitive(p) => p.keyword(),
            ScalarType::Guid => "string",
        }
    }

    /// The host default when the IDL's own zero value cannot express it.
    pub fn suppressed_default(&self) -> Option<&'static str> {
        match self {
            ScalarType::Guid => Some(GUID_DEFAULT),
            ScalarType::Primitive(_) => None,
        }
    }

    /// The well-known wrapper used when the scalar is a bare response.
    pub fn wrapper(&self) -> WellKnownType {
        match self {
            ScalarType::Primitive(p) => WellKnownType::Wrapper(*p),
            ScalarType::Guid => WellKnownType::Wrapper(Primitive::String),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WellKnownType {
    Empty,
    Timestamp,
    Duration,
    Wrapper(Primitive),
}

impl WellKnownType {
    pub fn short_name(&self) -> &'static str {
        match self {
            WellKnownType::Empty => "Empty",
            WellKnownType::Timestamp => "Timestamp",
            WellKnownType::Duration => "Duration",
            WellKnownType::Wrapper(p) => match p {
                Primitive::Bool => "BoolValue",
                Primitive::Int32 => "Int32Value",
                Primitive::Int64 => "Int64Value",
                Primitive::UInt32 => "UInt32Value",
                Primitive::UInt64 => "UInt64Value",
                Primitive::Float => "FloatValue",
                Primitive::Double => "DoubleValue",
                Primitive::String => "StringValue",
                Primitive::Bytes => "BytesValue",
            },
        }
    }

    pub fn idl_name(&self) -> String {
        format!(".google.protobuf.{}", self.short_name())
    }

    pub fn import_path(&self) -> &'static str {
        match self {
            WellKnownType::Empty => "google/protobuf/empty.proto",
            WellKnownType::Timestamp => "google/protobuf/timestamp.proto",
            WellKnownType::Duration => "google/protobuf/duration.proto",
            WellKnownType::Wrapper(_) => "google/protobuf/wrappers.proto",
        }
    }
}

/// The type of a message field. Messages and enums are referenced by IDL name and can be
/// resolved through [`TypeModel::by_name`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(ScalarType),
    WellKnown(WellKnownType),
    Message(String),
    Enum(String),
    Repeated(Box<FieldType>),
}

impl FieldType {
    pub fn is_repeated(&self) -> bool {
        matches!(self, FieldType::Repeated(_))
    }

    /// The field type with any repetition stripped.
    pub fn element(&self) -> &FieldType {
        match self {
            FieldType::Repeated(inner) => inner.element(),
            other => other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{}", s.idl_name()),
            FieldType::WellKnown(w) => write!(f, "{}", w.idl_name()),
            FieldType::Message(name) | FieldType::Enum(name) => write!(f, "{}", name),
            FieldType::Repeated(inner) => write!(f, "repeated {}", inner),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub position: u32,
    /// Set when the host default cannot be expressed as the IDL zero value; holds the
    /// default that could not be applied.
    pub suppressed_default: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType, position: u32) -> Self {
        let suppressed_default = match ty.element() {
            FieldType::Scalar(s) if !ty.is_repeated() => {
                s.suppressed_default().map(str::to_string)
            }
            _ => None,
        };
        Self {
            name: name.into(),
            ty,
            position,
            suppressed_default,
        }
    }

    pub fn default_value_suppressed(&self) -> bool {
        self.suppressed_default.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub name: String,
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Message(Vec<FieldDescriptor>),
    Enum(Vec<EnumValue>),
    WellKnown(WellKnownType),
    Scalar(ScalarType),
    RepeatedOf(Arc<TypeDescriptor>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeOrigin {
    /// Declared in the contract set, identified by qualified host name.
    Declared(String),
    /// Invented by the synthesizer.
    Synthesized,
    Builtin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub origin: TypeOrigin,
}

impl TypeDescriptor {
    pub fn message(name: impl Into<String>, fields: Vec<FieldDescriptor>, origin: TypeOrigin) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Message(fields),
            origin,
        }
    }

    pub fn well_known(w: WellKnownType) -> Self {
        Self {
            name: w.idl_name(),
            kind: TypeKind::WellKnown(w),
            origin: TypeOrigin::Builtin,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self.kind, TypeKind::Message(_))
    }

    pub fn is_empty_marker(&self) -> bool {
        matches!(self.kind, TypeKind::WellKnown(WellKnownType::Empty))
    }

    /// Whether the type can stand alone as a request or response message.
    pub fn is_message_like(&self) -> bool {
        match &self.kind {
            TypeKind::Message(_) => true,
            TypeKind::WellKnown(_) => true,
            _ => false,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        match &self.kind {
            TypeKind::Message(fields) => fields,
            _ => &[],
        }
    }

    /// Name without the well-known package prefix, used when deriving wrapper names.
    pub fn short_name(&self) -> &str {
        match &self.kind {
            TypeKind::WellKnown(w) => w.short_name(),
            _ => &self.name,
        }
    }

    /// An enum lacking a zero value cannot honour "the default is the first value".
    pub fn missing_zero_value(&self) -> bool {
        match &self.kind {
            TypeKind::Enum(values) => !values.iter().any(|v| v.value == 0),
            _ => false,
        }
    }
}

/// State of one root `describe` call: the data contracts on the current path, and every
/// cache entry created since the root call began so a failed root can take them back.
#[derive(Default)]
struct Visit {
    stack: HashSet<String>,
    by_host: Vec<(String, Arc<TypeDescriptor>)>,
    by_name: Vec<(String, Arc<TypeDescriptor>)>,
}

pub struct TypeModel {
    contracts: Arc<ContractSet>,
    by_host: DashMap<String, Arc<TypeDescriptor>>,
    by_name: DashMap<String, Arc<TypeDescriptor>>,
}

impl fmt::Debug for TypeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeModel")
            .field("namespace", &self.contracts.namespace)
            .field("cached", &self.by_host.len())
            .finish()
    }
}

impl TypeModel {
    pub fn new(contracts: Arc<ContractSet>) -> Self {
        Self {
            contracts,
            by_host: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    pub fn contracts(&self) -> &Arc<ContractSet> {
        &self.contracts
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.by_name.get(name).map(|r| r.value().clone())
    }

    pub fn well_known(&self, w: WellKnownType) -> Arc<TypeDescriptor> {
        // builtins never collide with declared names: those cannot start with '.'
        let desc = Arc::new(TypeDescriptor::well_known(w));
        self.by_name
            .entry(desc.name.clone())
            .or_insert(desc)
            .value()
            .clone()
    }

    /// Describes a host type. Idempotent: the same host type yields the same `Arc`.
    pub fn describe(&self, ty: &TypeRef) -> Result<Arc<TypeDescriptor>> {
        let key = ty.to_string();
        if let Some(hit) = self.by_host.get(&key) {
            return Ok(hit.value().clone());
        }
        let mut visit = Visit::default();
        let ret = self.describe_uncached(ty, &mut visit);
        if ret.is_err() {
            self.rollback(visit);
        }
        ret
    }

    /// Drops descriptors cached during a failed root call. A peer described while the root
    /// was in progress may still point back at the root by name.
    fn rollback(&self, visit: Visit) {
        for (key, desc) in visit.by_host {
            self.by_host.remove_if(&key, |_, v| Arc::ptr_eq(v, &desc));
        }
        for (name, desc) in visit.by_name {
            self.by_name.remove_if(&name, |_, v| Arc::ptr_eq(v, &desc));
        }
    }

    fn cache_host(
        &self,
        key: String,
        desc: Arc<TypeDescriptor>,
        visit: &mut Visit,
    ) -> Arc<TypeDescriptor> {
        match self.by_host.entry(key) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                visit.by_host.push((e.key().clone(), desc.clone()));
                e.insert(desc.clone());
                desc
            }
        }
    }

    fn describe_uncached(&self, ty: &TypeRef, visit: &mut Visit) -> Result<Arc<TypeDescriptor>> {
        let desc = match ty {
            TypeRef::Void | TypeRef::Task(None) => return Ok(self.well_known(WellKnownType::Empty)),
            TypeRef::DateTime => return Ok(self.well_known(WellKnownType::Timestamp)),
            TypeRef::TimeSpan => return Ok(self.well_known(WellKnownType::Duration)),
            TypeRef::Task(Some(inner)) => return self.describe_uncached(inner, visit),
            TypeRef::Primitive(p) => TypeDescriptor {
                name: p.keyword().to_string(),
                kind: TypeKind::Scalar(ScalarType::Primitive(*p)),
                origin: TypeOrigin::Builtin,
            },
            TypeRef::Guid => TypeDescriptor {
                name: "guid".to_string(),
                kind: TypeKind::Scalar(ScalarType::Guid),
                origin: TypeOrigin::Builtin,
            },
            TypeRef::List(inner) => {
                if matches!(**inner, TypeRef::List(_) | TypeRef::Stream(_)) {
                    return Err(Error::SerializationUnavailable(ty.to_string()));
                }
                let element = self.describe_uncached(inner, visit)?;
                TypeDescriptor {
                    name: format!("repeated {}", element.name),
                    kind: TypeKind::RepeatedOf(element),
                    origin: TypeOrigin::Builtin,
                }
            }
            TypeRef::Named(name) => return self.describe_named(name, visit),
            TypeRef::Stream(_) => {
                return Err(Error::InvalidInput(format!(
                    "{} is only valid as a parameter or return type",
                    ty
                )))
            }
            TypeRef::CallContext | TypeRef::Cancellation => {
                return Err(Error::InvalidInput(format!("{} is not a payload type", ty)))
            }
            TypeRef::Generic(name) => {
                return Err(Error::Contract(format!(
                    "generic parameter {} is not bound to a concrete type",
                    name
                )))
            }
        };
        Ok(self.cache_host(ty.to_string(), Arc::new(desc), visit))
    }

    fn describe_named(&self, name: &str, visit: &mut Visit) -> Result<Arc<TypeDescriptor>> {
        if let Some(hit) = self.by_host.get(name) {
            return Ok(hit.value().clone());
        }
        let data_type = self
            .contracts
            .data_type(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown type {}", name)))?;
        let host_id = self.contracts.qualified_name(data_type);

        visit.stack.insert(name.to_string());
        let desc = match data_type {
            DataType::Message(m) => self.describe_message(m, host_id, visit),
            DataType::Enum(e) => Ok(Self::describe_enum(e, host_id)),
        };
        visit.stack.remove(name);

        let (desc, created) = self.insert_name(desc?)?;
        if created {
            visit.by_name.push((desc.name.clone(), desc.clone()));
        }
        Ok(self.cache_host(name.to_string(), desc, visit))
    }

    fn describe_message(
        &self,
        m: &MessageDef,
        host_id: String,
        visit: &mut Visit,
    ) -> Result<TypeDescriptor> {
        let members: Vec<_> = m.fields.iter().filter(|f| f.data_member).collect();

        let mut next = members.iter().filter_map(|f| f.order).max().unwrap_or(0);
        let mut taken = HashSet::new();
        let mut fields = Vec::with_capacity(members.len());
        for member in members {
            let position = match member.order {
                Some(0) => {
                    return Err(Error::Contract(format!(
                        "{}.{} uses field number 0",
                        m.name, member.name
                    )))
                }
                Some(order) if order > MAX_FIELD_NUMBER => {
                    return Err(Error::Contract(format!(
                        "{}.{} uses field number {}, above the maximum {}",
                        m.name, member.name, order, MAX_FIELD_NUMBER
                    )))
                }
                Some(order) => order,
                None => {
                    next = next
                        .checked_add(1)
                        .filter(|n| *n <= MAX_FIELD_NUMBER)
                        .ok_or_else(|| {
                            Error::Contract(format!(
                                "{}.{} has no field number left above {}",
                                m.name, member.name, next
                            ))
                        })?;
                    next
                }
            };
            if !taken.insert(position) {
                return Err(Error::Contract(format!(
                    "{} assigns field number {} more than once",
                    m.name, position
                )));
            }
            let ty = self
                .field_type_inner(&member.ty, visit)
                .map_err(|e| match e {
                    Error::InvalidInput(msg) => {
                        Error::InvalidInput(format!("{}.{}: {}", m.name, member.name, msg))
                    }
                    e => e,
                })?;
            fields.push(FieldDescriptor::new(member.name.clone(), ty, position));
        }
        fields.sort_by_key(|f| f.position);

        Ok(TypeDescriptor::message(
            m.name.clone(),
            fields,
            TypeOrigin::Declared(host_id),
        ))
    }

    fn describe_enum(e: &EnumDef, host_id: String) -> TypeDescriptor {
        TypeDescriptor {
            name: e.name.clone(),
            kind: TypeKind::Enum(
                e.values
                    .iter()
                    .map(|v| EnumValue {
                        name: v.name.clone(),
                        value: v.value,
                    })
                    .collect(),
            ),
            origin: TypeOrigin::Declared(host_id),
        }
    }

    /// Maps a host type used as a message member to its field type, describing any
    /// referenced data contracts along the way.
    pub fn field_type(&self, ty: &TypeRef) -> Result<FieldType> {
        let mut visit = Visit::default();
        let ret = self.field_type_inner(ty, &mut visit);
        if ret.is_err() {
            self.rollback(visit);
        }
        ret
    }

    fn field_type_inner(&self, ty: &TypeRef, visit: &mut Visit) -> Result<FieldType> {
        let ret = match ty {
            TypeRef::Primitive(p) => FieldType::Scalar(ScalarType::Primitive(*p)),
            TypeRef::Guid => FieldType::Scalar(ScalarType::Guid),
            TypeRef::DateTime => FieldType::WellKnown(WellKnownType::Timestamp),
            TypeRef::TimeSpan => FieldType::WellKnown(WellKnownType::Duration),
            TypeRef::List(inner) => match **inner {
                TypeRef::List(_) | TypeRef::Stream(_) => {
                    return Err(Error::SerializationUnavailable(ty.to_string()))
                }
                _ => FieldType::Repeated(Box::new(self.field_type_inner(inner, visit)?)),
            },
            TypeRef::Named(name) if visit.stack.contains(name) => FieldType::Message(name.clone()),
            TypeRef::Named(name) => {
                let desc = self.describe_named(name, visit)?;
                match desc.kind {
                    TypeKind::Enum(_) => FieldType::Enum(desc.name.clone()),
                    _ => FieldType::Message(desc.name.clone()),
                }
            }
            TypeRef::Stream(_) | TypeRef::Task(_) => {
                return Err(Error::SerializationUnavailable(ty.to_string()))
            }
            TypeRef::Void | TypeRef::CallContext | TypeRef::Cancellation => {
                return Err(Error::InvalidInput(format!("{} cannot be a field type", ty)))
            }
            TypeRef::Generic(name) => {
                return Err(Error::Contract(format!(
                    "generic parameter {} is not bound to a concrete type",
                    name
                )))
            }
        };
        Ok(ret)
    }

    /// Registers a descriptor under its IDL name. Re-registering an identical shape returns
    /// the already registered `Arc`; a different shape under the same name is a collision.
    pub fn register(&self, desc: TypeDescriptor) -> Result<Arc<TypeDescriptor>> {
        self.insert_name(desc).map(|(desc, _)| desc)
    }

    fn insert_name(&self, desc: TypeDescriptor) -> Result<(Arc<TypeDescriptor>, bool)> {
        match self.by_name.entry(desc.name.clone()) {
            Entry::Occupied(e) if e.get().kind != desc.kind => {
                tracing::warn!(name = %desc.name, "type name collision");
                Err(Error::NamingCollision(desc.name))
            }
            Entry::Occupied(e) => Ok((e.get().clone(), false)),
            Entry::Vacant(e) => {
                let desc = Arc::new(desc);
                e.insert(desc.clone());
                Ok((desc, true))
            }
        }
    }

    /// Checks that every message and enum reachable from `desc` is still described.
    pub fn ensure_complete(&self, desc: &TypeDescriptor) -> Result<()> {
        fn walk(types: &TypeModel, ty: &FieldType, seen: &mut HashSet<String>) -> Result<()> {
            match ty {
                FieldType::Message(name) | FieldType::Enum(name) => {
                    if !seen.insert(name.clone()) {
                        return Ok(());
                    }
                    let desc = types.by_name(name).ok_or_else(|| {
                        Error::SerializationUnavailable(format!(
                            "{} (referenced but not describable)",
                            name
                        ))
                    })?;
                    for field in desc.fields() {
                        walk(types, &field.ty, seen)?;
                    }
                    Ok(())
                }
                FieldType::Repeated(inner) => walk(types, inner, seen),
                FieldType::Scalar(_) | FieldType::WellKnown(_) => Ok(()),
            }
        }

        let mut seen = HashSet::new();
        match &desc.kind {
            TypeKind::RepeatedOf(inner) => self.ensure_complete(inner),
            _ => {
                seen.insert(desc.name.clone());
                for field in desc.fields() {
                    walk(self, &field.ty, &mut seen)?;
                }
                Ok(())
            }
        }
    }
}
