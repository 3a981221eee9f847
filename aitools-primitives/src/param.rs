//! Parameter descriptors for tool input schemas.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// JSON type of a tool parameter.
///
/// Unrecognised type tags degrade to [`ParamType::String`] when deserialised,
/// matching how inferred schemas treat parameters without a known type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ParamType {
    /// JSON string. Also the fallback for unknown types.
    #[default]
    String,
    /// JSON integer.
    Integer,
    /// JSON number (floating point).
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParamType {
    /// Returns the JSON-Schema type tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Maps a JSON-Schema type tag, falling back to `String` for anything
    /// unrecognised.
    #[must_use]
    pub fn from_schema_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    /// Maps the final path segment of a Rust type through the fixed
    /// type table. Unknown types map to `String`.
    #[must_use]
    pub fn from_rust_type(ident: &str) -> Self {
        match ident {
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" | "NonZeroU32" | "NonZeroU64" | "NonZeroUsize" => Self::Integer,
            "f32" | "f64" => Self::Number,
            "bool" => Self::Boolean,
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" => Self::Array,
            "HashMap" | "BTreeMap" | "Map" => Self::Object,
            _ => Self::String,
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(Error::UnknownParamType { name: other.into() }),
        }
    }
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        Self::from_schema_name(&value)
    }
}

/// Static declaration of one tool parameter.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ParamDescriptor {
    name: String,
    #[serde(rename = "type")]
    ty: ParamType,
    #[serde(default = "required_default")]
    required: bool,
}

const fn required_default() -> bool {
    true
}

impl ParamDescriptor {
    /// Declares a required parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    /// Marks the parameter as optional; it is left out of `required`.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter type.
    #[must_use]
    pub const fn ty(&self) -> ParamType {
        self.ty
    }

    /// Returns `true` when callers must supply this parameter.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}
