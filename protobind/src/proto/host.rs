//! Structural description of the host contracts: data contracts, enums, service interfaces
//! and implementing classes, plus the small type-expression language used to reference them.
//!
//! A [`ContractSet`] is normally loaded from TOML:
//!
//! ```toml
//! namespace = "Demo.Contracts"
//!
//! [[message]]
//! name = "MyRequest"
//! fields = [{ name = "Id", type = "int32", order = 1 }]
//!
//! [[interface]]
//! name = "IMyService"
//! service = {}
//!
//! [[interface.method]]
//! name = "Unary"
//! operation = {}
//! params = [{ name = "request", type = "MyRequest" }, { name = "ctx", type = "context" }]
//! returns = "task<MyResponse>"
//! ```
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::rpc_types::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
    Bytes,
}

impl Primitive {
    pub fn keyword(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        }
    }

    fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "bool" => Primitive::Bool,
            "int32" | "int" => Primitive::Int32,
            "int64" | "long" => Primitive::Int64,
            "uint32" | "uint" => Primitive::UInt32,
            "uint64" | "ulong" => Primitive::UInt64,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "string" => Primitive::String,
            "bytes" => Primitive::Bytes,
            _ => return None,
        })
    }
}

/// A raw `Name<Arg, ...>` expression, before keywords are interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeExpr {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (idx, arg) in self.args.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl FromStr for TypeExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = ExprParser { src: s, pos: 0 };
        let expr = parser.parse_expr()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(expr)
    }
}

impl TryFrom<String> for TypeExpr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeExpr> for String {
    fn from(value: TypeExpr) -> Self {
        value.to_string()
    }
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl ExprParser<'_> {
    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn error(&self, what: &str) -> Error {
        Error::InvalidInput(format!(
            "malformed type expression {:?} at offset {}: {}",
            self.src, self.pos, what
        ))
    }

    fn parse_expr(&mut self) -> Result<TypeExpr> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        let name = self.src[start..self.pos].to_string();

        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some('<') {
            self.pos += 1;
            loop {
                args.push(self.parse_expr()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }
        Ok(TypeExpr { name, args })
    }
}

/// A reference to a host type as it appears in a member, parameter or return position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Primitive(Primitive),
    Guid,
    DateTime,
    TimeSpan,
    Void,
    CallContext,
    Cancellation,
    /// A data contract or enum declared in the [`ContractSet`].
    Named(String),
    /// A generic parameter of an interface that no inheriting interface bound.
    Generic(String),
    /// Eagerly materialised ordered sequence.
    List(Box<TypeRef>),
    /// Lazy, possibly infinite sequence.
    Stream(Box<TypeRef>),
    /// Asynchronous result, `None` for the no-payload form.
    Task(Option<Box<TypeRef>>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn stream(inner: TypeRef) -> Self {
        TypeRef::Stream(Box::new(inner))
    }

    pub fn is_call_context(&self) -> bool {
        matches!(self, TypeRef::CallContext | TypeRef::Cancellation)
    }

    pub fn contains_generic(&self) -> bool {
        match self {
            TypeRef::Generic(_) => true,
            TypeRef::List(inner) | TypeRef::Stream(inner) => inner.contains_generic(),
            TypeRef::Task(Some(inner)) => inner.contains_generic(),
            _ => false,
        }
    }

    /// Replaces named references to generic parameters: bound ones take their argument,
    /// unbound ones become [`TypeRef::Generic`].
    pub fn substitute(&self, bound: &HashMap<String, TypeRef>, unbound: &[String]) -> TypeRef {
        match self {
            TypeRef::Named(name) => match bound.get(name) {
                Some(arg) => arg.clone(),
                None if unbound.iter().any(|g| g == name) => TypeRef::Generic(name.clone()),
                None => self.clone(),
            },
            TypeRef::List(inner) => TypeRef::List(Box::new(inner.substitute(bound, unbound))),
            TypeRef::Stream(inner) => TypeRef::Stream(Box::new(inner.substitute(bound, unbound))),
            TypeRef::Task(Some(inner)) => {
                TypeRef::Task(Some(Box::new(inner.substitute(bound, unbound))))
            }
            other => other.clone(),
        }
    }

    fn from_expr(expr: &TypeExpr) -> Result<Self> {
        let single_arg = || -> Result<TypeRef> {
            match expr.args.as_slice() {
                [arg] => TypeRef::from_expr(arg),
                _ => Err(Error::InvalidInput(format!(
                    "{} expects exactly one type argument: {}",
                    expr.name, expr
                ))),
            }
        };

        let ret = match expr.name.as_str() {
            "list" => TypeRef::List(Box::new(single_arg()?)),
            "stream" => TypeRef::Stream(Box::new(single_arg()?)),
            "task" if expr.args.is_empty() => TypeRef::Task(None),
            "task" => TypeRef::Task(Some(Box::new(single_arg()?))),
            _ if !expr.args.is_empty() => {
                return Err(Error::InvalidInput(format!(
                    "generic type {} cannot be used as a payload type",
                    expr
                )))
            }
            "guid" => TypeRef::Guid,
            "datetime" => TypeRef::DateTime,
            "timespan" => TypeRef::TimeSpan,
            "void" => TypeRef::Void,
            "context" => TypeRef::CallContext,
            "cancellation" => TypeRef::Cancellation,
            name => match Primitive::from_keyword(name) {
                Some(p) => TypeRef::Primitive(p),
                None => TypeRef::Named(name.to_string()),
            },
        };
        Ok(ret)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p.keyword()),
            TypeRef::Guid => write!(f, "guid"),
            TypeRef::DateTime => write!(f, "datetime"),
            TypeRef::TimeSpan => write!(f, "timespan"),
            TypeRef::Void => write!(f, "void"),
            TypeRef::CallContext => write!(f, "context"),
            TypeRef::Cancellation => write!(f, "cancellation"),
            TypeRef::Named(name) | TypeRef::Generic(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "list<{}>", inner),
            TypeRef::Stream(inner) => write!(f, "stream<{}>", inner),
            TypeRef::Task(None) => write!(f, "task"),
            TypeRef::Task(Some(inner)) => write!(f, "task<{}>", inner),
        }
    }
}

impl FromStr for TypeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeRef::from_expr(&s.parse()?)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_void() -> TypeRef {
    TypeRef::Void
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemberDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default = "default_true")]
    pub data_member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub fields: Vec<MemberDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValueDef {
    pub name: String,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub values: Vec<EnumValueDef>,
}

/// Service-contract tag, with an optional name override.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceAttr {
    #[serde(default)]
    pub name: Option<String>,
}

/// Operation-contract tag. `ignore` opts a method out under the implicit convention.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperationAttr {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ignore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub operation: Option<OperationAttr>,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default = "default_void")]
    pub returns: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub service: Option<ServiceAttr>,
    #[serde(default)]
    pub bases: Vec<TypeExpr>,
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub implements: Vec<TypeExpr>,
}

/// A declared data type: either a message-shaped data contract or an enum.
#[derive(Debug, Clone, Copy)]
pub enum DataType<'a> {
    Message(&'a MessageDef),
    Enum(&'a EnumDef),
}

/// A declared service candidate: an interface or an implementing class.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Interface(&'a InterfaceDef),
    Class(&'a ClassDef),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSet {
    #[serde(default)]
    pub namespace: String,
    #[serde(default, rename = "message")]
    pub messages: Vec<MessageDef>,
    #[serde(default, rename = "enum")]
    pub enums: Vec<EnumDef>,
    #[serde(default, rename = "interface")]
    pub interfaces: Vec<InterfaceDef>,
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassDef>,
}

impl ContractSet {
    pub fn from_toml(s: &str) -> Result<Self> {
        let set: ContractSet = toml::from_str(s)
            .map_err(|e| Error::InvalidInput(format!("failed to parse contract set: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    /// Rejects duplicate declarations. Two data types sharing a name are a collision
    /// unless they are declared identically.
    pub fn validate(&self) -> Result<()> {
        let mut messages: HashMap<&str, &MessageDef> = HashMap::new();
        for m in &self.messages {
            if let Some(prev) = messages.insert(&m.name, m) {
                if prev != m {
                    return Err(Error::NamingCollision(m.name.clone()));
                }
            }
        }
        let mut enums: HashMap<&str, &EnumDef> = HashMap::new();
        for e in &self.enums {
            if messages.contains_key(e.name.as_str()) {
                return Err(Error::NamingCollision(e.name.clone()));
            }
            if let Some(prev) = enums.insert(&e.name, e) {
                if prev != e {
                    return Err(Error::NamingCollision(e.name.clone()));
                }
            }
        }

        let mut candidates = HashSet::new();
        for name in self
            .interfaces
            .iter()
            .map(|i| &i.name)
            .chain(self.classes.iter().map(|c| &c.name))
        {
            if !candidates.insert(name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "{} is declared more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn data_type(&self, name: &str) -> Option<DataType<'_>> {
        if let Some(m) = self.messages.iter().find(|m| m.name == name) {
            return Some(DataType::Message(m));
        }
        self.enums
            .iter()
            .find(|e| e.name == name)
            .map(DataType::Enum)
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceDef> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn candidate(&self, name: &str) -> Option<Candidate<'_>> {
        if let Some(c) = self.classes.iter().find(|c| c.name == name) {
            return Some(Candidate::Class(c));
        }
        self.interface(name).map(Candidate::Interface)
    }

    pub fn namespace_of<'a>(&'a self, own: &'a Option<String>) -> &'a str {
        own.as_deref().unwrap_or(&self.namespace)
    }

    /// Identity of a declared data type: its namespace-qualified name.
    pub fn qualified_name(&self, data_type: DataType<'_>) -> String {
        let (ns, name) = match data_type {
            DataType::Message(m) => (self.namespace_of(&m.namespace), &m.name),
            DataType::Enum(e) => (self.namespace_of(&e.namespace), &e.name),
        };
        if ns.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", ns, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("int", TypeRef::Primitive(Primitive::Int32))]
    #[case("string", TypeRef::Primitive(Primitive::String))]
    #[case("guid", TypeRef::Guid)]
    #[case("task", TypeRef::Task(None))]
    #[case("MyRequest", TypeRef::named("MyRequest"))]
    #[case("stream< MyRequest >", TypeRef::stream(TypeRef::named("MyRequest")))]
    #[case(
        "task<list<ConferenceOverview>>",
        TypeRef::Task(Some(Box::new(TypeRef::list(TypeRef::named("ConferenceOverview")))))
    )]
    fn parse_type_ref(#[case] src: &str, #[case] expected: TypeRef) {
        assert_eq!(src.parse::<TypeRef>().unwrap(), expected);
    }

    #[rstest::rstest]
    #[case("")]
    #[case("list")]
    #[case("list<a, b>")]
    #[case("Foo<int>")]
    #[case("stream<A")]
    #[case("A B")]
    fn reject_malformed_type_ref(#[case] src: &str) {
        assert!(matches!(
            src.parse::<TypeRef>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn base_expression_keeps_arguments() {
        let expr: TypeExpr = "ISomeGenericService<MyRequest, list<int>>".parse().unwrap();
        assert_eq!(expr.name, "ISomeGenericService");
        assert_eq!(expr.args.len(), 2);
        assert_eq!(expr.to_string(), "ISomeGenericService<MyRequest, list<int>>");
    }

    #[test]
    fn substitute_generics() {
        let ty: TypeRef = "task<TResult>".parse().unwrap();
        let mut bound = HashMap::new();
        bound.insert("TResult".to_string(), TypeRef::named("MyResponse"));
        assert_eq!(
            ty.substitute(&bound, &[]),
            "task<MyResponse>".parse().unwrap()
        );

        let unbound = ty.substitute(&HashMap::new(), &["TResult".to_string()]);
        assert!(unbound.contains_generic());
    }

    #[test]
    fn duplicate_data_types_collide() {
        let src = r#"
[[message]]
name = "A"
fields = [{ name = "X", type = "int32" }]

[[message]]
name = "A"
fields = [{ name = "X", type = "string" }]
"#;
        assert_eq!(
            ContractSet::from_toml(src).unwrap_err(),
            Error::NamingCollision("A".to_string())
        );
    }

    #[test]
    fn load_contract_set() {
        let src = r#"
namespace = "Demo"

[[enum]]
name = "Category"
values = [{ name = "Default", value = 0 }]

[[interface]]
name = "IGreeter"
service = { name = "Hello" }

[[interface.method]]
name = "Greet"
operation = {}
params = [{ name = "name", type = "string" }]
returns = "task<string>"
"#;
        let set = ContractSet::from_toml(src).unwrap();
        let iface = set.interface("IGreeter").unwrap();
        assert_eq!(iface.service.as_ref().unwrap().name.as_deref(), Some("Hello"));
        assert_eq!(iface.methods[0].returns.to_string(), "task<string>");
        let category = set.data_type("Category").unwrap();
        assert_eq!(set.qualified_name(category), "Demo.Category");
    }
}
