//! Class records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::event_source::ClassDefRecord;
use crate::shared::constants::sentinel_names;
use crate::shared::models::{ClassKey, ObjectHash};

/// Element types of primitive arrays, indexed by their dump type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::Boolean,
        PrimitiveType::Char,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name of the array class, e.g. `[I`
    pub fn array_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "[Z",
            PrimitiveType::Char => "[C",
            PrimitiveType::Float => "[F",
            PrimitiveType::Double => "[D",
            PrimitiveType::Byte => "[B",
            PrimitiveType::Short => "[S",
            PrimitiveType::Int => "[I",
            PrimitiveType::Long => "[J",
        }
    }

    pub fn from_array_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.array_name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Char => "char",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
        }
    }

    /// Element width in bytes
    pub fn width(self) -> u64 {
        match self {
            PrimitiveType::Boolean | PrimitiveType::Byte => 1,
            PrimitiveType::Char | PrimitiveType::Short => 2,
            PrimitiveType::Float | PrimitiveType::Int => 4,
            PrimitiveType::Double | PrimitiveType::Long => 8,
        }
    }
}

/// Class name, or which kind of unknown it stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassName {
    Named(String),
    /// Array class whose element type is unknown
    UnknownArray,
    /// Non-array class never defined in the dump
    UnknownNonArray,
    /// Primitive array with a type code outside the known table
    UnknownArrayType,
}

impl ClassName {
    pub fn named(name: impl Into<String>) -> Self {
        ClassName::Named(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClassName::Named(name) => name,
            ClassName::UnknownArray => sentinel_names::UNKNOWN_ARRAY,
            ClassName::UnknownNonArray => sentinel_names::UNKNOWN_NON_ARRAY,
            ClassName::UnknownArrayType => sentinel_names::UNKNOWN_ARRAY_TYPE,
        }
    }

    /// Real name, `None` for sentinels
    pub fn real(&self) -> Option<&str> {
        match self {
            ClassName::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ClassName::Named(_))
    }

    pub fn is_array(&self) -> bool {
        match self {
            ClassName::Named(name) => name.starts_with('['),
            ClassName::UnknownArray | ClassName::UnknownArrayType => true,
            ClassName::UnknownNonArray => false,
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the array class whose elements are `element`
pub fn array_name_for(element: &str) -> String {
    if element.starts_with('[') {
        format!("[{}", element)
    } else {
        format!("[L{};", element)
    }
}

/// Superclass as recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuperRef {
    /// Root of the hierarchy
    None,
    Known(u64),
    /// The dump did not record it
    Unknown,
}

/// Instance size of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceSize {
    Known(u64),
    /// Upper bound derived from the spacing of instances
    Estimated(u64),
    Unknown,
}

impl InstanceSize {
    /// Fold in an observed upper bound. Known sizes never change and an
    /// estimate only shrinks.
    pub fn refine(self, observed: u64) -> Self {
        match self {
            InstanceSize::Known(_) => self,
            InstanceSize::Estimated(current) if current <= observed => self,
            InstanceSize::Estimated(_) | InstanceSize::Unknown => InstanceSize::Estimated(observed),
        }
    }

    pub fn value(self) -> Option<u64> {
        match self {
            InstanceSize::Known(size) | InstanceSize::Estimated(size) => Some(size),
            InstanceSize::Unknown => None,
        }
    }

    pub fn is_estimate(self) -> bool {
        matches!(self, InstanceSize::Estimated(_))
    }
}

/// Element type of an array class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Not an array class
    None,
    Class(ClassKey),
    Primitive(PrimitiveType),
    /// An array whose element type is unknown
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub key: ClassKey,
    pub name: ClassName,
    pub super_ref: SuperRef,
    pub instance_size: InstanceSize,
    pub component: Component,
    pub methods: Vec<String>,
    /// Outbound references in dump order (statics, loader, constants)
    pub references: Vec<u64>,
    pub hash: ObjectHash,
    /// Fabricated by the reconstruction rather than read from the dump
    pub synthesized: bool,
}

impl ClassRecord {
    pub fn from_def(def: &ClassDefRecord) -> Self {
        let super_ref = match def.super_address {
            None => SuperRef::Unknown,
            Some(0) => SuperRef::None,
            Some(address) => SuperRef::Known(address),
        };
        let component = match PrimitiveType::from_array_name(&def.name) {
            Some(primitive) => Component::Primitive(primitive),
            None if def.name.starts_with('[') => Component::Unknown,
            None => Component::None,
        };
        Self {
            key: ClassKey::Address(def.address),
            name: ClassName::Named(def.name.clone()),
            super_ref,
            instance_size: def
                .instance_size
                .map_or(InstanceSize::Unknown, InstanceSize::Known),
            component,
            methods: def.methods.clone(),
            references: def.references.clone(),
            hash: def.hash,
            synthesized: false,
        }
    }

    /// Placeholder for a class the dump never defined
    pub fn placeholder(key: ClassKey, name: ClassName, component: Component) -> Self {
        Self {
            key,
            name,
            super_ref: SuperRef::Unknown,
            instance_size: InstanceSize::Unknown,
            component,
            methods: Vec::new(),
            references: Vec::new(),
            hash: ObjectHash::Unhashed,
            synthesized: true,
        }
    }

    pub fn address(&self) -> u64 {
        self.key.address()
    }

    pub fn is_array(&self) -> bool {
        self.component != Component::None || self.name.is_array()
    }

    /// Shrink a synthesized class's size estimate; real classes keep theirs
    pub fn refine_size(&mut self, observed: u64) {
        if self.synthesized {
            self.instance_size = self.instance_size.refine(observed);
        }
    }
}
