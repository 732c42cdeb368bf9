use crate::InterfaceId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Shape of a parameter or return type as seen by the foreign side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeDesc {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Array(Box<TypeDesc>),
    /// Fully qualified reference type name, e.g. `java.lang.String`.
    Reference(String),
    /// Anything the summary could not describe.
    Unsupported,
}

impl TypeDesc {
    pub fn reference(name: impl Into<String>) -> Self {
        TypeDesc::Reference(name.into())
    }

    pub fn array_of(element: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(element))
    }

    pub fn string() -> Self {
        TypeDesc::reference("java.lang.String")
    }

    pub fn object() -> Self {
        TypeDesc::reference("java.lang.Object")
    }

    fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(element) = text.strip_suffix("[]") {
            return match TypeDesc::parse(element) {
                TypeDesc::Unsupported | TypeDesc::Void => TypeDesc::Unsupported,
                element => TypeDesc::array_of(element),
            };
        }
        match text {
            "void" => TypeDesc::Void,
            "boolean" => TypeDesc::Boolean,
            "byte" => TypeDesc::Byte,
            "char" => TypeDesc::Char,
            "short" => TypeDesc::Short,
            "int" => TypeDesc::Int,
            "long" => TypeDesc::Long,
            "float" => TypeDesc::Float,
            "double" => TypeDesc::Double,
            name if is_qualified_name(name) => TypeDesc::Reference(name.to_string()),
            _ => TypeDesc::Unsupported,
        }
    }
}

fn is_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

impl From<&str> for TypeDesc {
    fn from(text: &str) -> Self {
        TypeDesc::parse(text)
    }
}

impl From<String> for TypeDesc {
    fn from(text: String) -> Self {
        TypeDesc::parse(&text)
    }
}

impl From<TypeDesc> for String {
    fn from(ty: TypeDesc) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => f.write_str("void"),
            TypeDesc::Boolean => f.write_str("boolean"),
            TypeDesc::Byte => f.write_str("byte"),
            TypeDesc::Char => f.write_str("char"),
            TypeDesc::Short => f.write_str("short"),
            TypeDesc::Int => f.write_str("int"),
            TypeDesc::Long => f.write_str("long"),
            TypeDesc::Float => f.write_str("float"),
            TypeDesc::Double => f.write_str("double"),
            TypeDesc::Array(element) => write!(f, "{}[]", element),
            TypeDesc::Reference(name) => f.write_str(name),
            TypeDesc::Unsupported => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDesc {
    pub name: String,
    #[serde(default)]
    pub params: Vec<TypeDesc>,
    #[serde(default = "void")]
    pub ret: TypeDesc,
}

fn void() -> TypeDesc {
    TypeDesc::Void
}

impl MethodDesc {
    pub fn new(name: impl Into<String>, params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDesc {
    pub id: InterfaceId,
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
}

impl InterfaceDesc {
    pub fn new(id: impl Into<InterfaceId>) -> Self {
        Self {
            id: id.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown interface: {0}")]
    UnknownInterface(InterfaceId),
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Failed to read interface summary: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed interface summary: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Turns an interface identity into a description a proxy can be built from.
pub trait InterfaceResolver: Send + Sync {
    fn resolve(&self, id: &InterfaceId) -> Result<InterfaceDesc, ResolveError>;
}

/// In-memory interface descriptions, optionally loaded from a JSON summary.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: HashMap<InterfaceId, InterfaceDesc>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the description for `desc.id`.
    pub fn insert(&mut self, desc: InterfaceDesc) {
        self.interfaces.insert(desc.id.clone(), desc);
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn from_json_str(json: &str) -> Result<Self, SummaryError> {
        let descs: Vec<InterfaceDesc> = serde_json::from_str(json)?;
        Ok(descs.into_iter().collect())
    }

    pub fn load(path: &Path) -> Result<Self, SummaryError> {
        let file = File::open(path)?;
        let descs: Vec<InterfaceDesc> = serde_json::from_reader(BufReader::new(file))?;
        debug!("Loaded {} interface descriptions from {:?}", descs.len(), path);
        Ok(descs.into_iter().collect())
    }
}

impl FromIterator<InterfaceDesc> for InterfaceRegistry {
    fn from_iter<I: IntoIterator<Item = InterfaceDesc>>(iter: I) -> Self {
        let mut registry = InterfaceRegistry::new();
        for desc in iter {
            registry.insert(desc);
        }
        registry
    }
}

impl InterfaceResolver for InterfaceRegistry {
    fn resolve(&self, id: &InterfaceId) -> Result<InterfaceDesc, ResolveError> {
        self.interfaces
            .get(id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownInterface(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_parse() {
        assert_eq!(TypeDesc::from("int"), TypeDesc::Int);
        assert_eq!(TypeDesc::from("java.lang.String"), TypeDesc::string());
        assert_eq!(
            TypeDesc::from("long[][]"),
            TypeDesc::array_of(TypeDesc::array_of(TypeDesc::Long))
        );
        assert_eq!(
            TypeDesc::from("com.example.Outer$Inner"),
            TypeDesc::reference("com.example.Outer$Inner")
        );
        assert_eq!(TypeDesc::from("java.util.List<String>"), TypeDesc::Unsupported);
        assert_eq!(TypeDesc::from("void[]"), TypeDesc::Unsupported);
        assert_eq!(TypeDesc::from(""), TypeDesc::Unsupported);
    }

    #[test]
    fn test_registry_from_summary() {
        let json = r#"[
            {
                "id": "com.example.Greeter",
                "methods": [
                    { "name": "greet", "params": ["java.lang.String"], "ret": "java.lang.String" },
                    { "name": "reset" }
                ]
            }
        ]"#;

        let registry = InterfaceRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 1);

        let greeter = registry.resolve(&"com.example.Greeter".into()).unwrap();
        assert_eq!(greeter.methods.len(), 2);
        assert_eq!(greeter.methods[0].params, vec![TypeDesc::string()]);
        assert_eq!(greeter.methods[1].ret, TypeDesc::Void);
    }

    #[test]
    fn test_registry_unknown_interface() {
        let registry = InterfaceRegistry::new();
        match registry.resolve(&"com.example.Missing".into()) {
            Err(ResolveError::UnknownInterface(id)) => assert_eq!(id.as_str(), "com.example.Missing"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_summary() {
        assert!(matches!(
            InterfaceRegistry::from_json_str("{ not json"),
            Err(SummaryError::Parse(_))
        ));
    }
}
