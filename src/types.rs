use std::fmt;

/// A resolved Dux type.
///
/// Primitives are unit variants, so two `i32`s are always the same value and
/// comparing types is plain `==`. Aggregates carry their element type or
/// struct name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    U8,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    /// `[N]T`, or `[]T` when the length is not known yet.
    Array(Box<Type>, Option<u32>),
    Struct(String),
}

/// Source spelling of every primitive type.
static PRIMITIVES: &[(&str, Type)] = &[
    ("u8", Type::U8),
    ("i32", Type::I32),
    ("i64", Type::I64),
    ("f32", Type::F32),
    ("f64", Type::F64),
    ("bool", Type::Bool),
    ("string", Type::Str),
];

impl Type {
    /// Look up a primitive type by its source name.
    pub fn primitive(name: &str) -> Option<Type> {
        PRIMITIVES
            .iter()
            .find(|(spelling, _)| *spelling == name)
            .map(|(_, ty)| ty.clone())
    }

    /// The spelling of this type in the emitted IR.
    pub fn llvm_name(&self) -> String {
        match self {
            Type::U8 => "i8".to_string(),
            Type::I32 => "i32".to_string(),
            Type::I64 => "i64".to_string(),
            Type::F32 => "float".to_string(),
            Type::F64 => "double".to_string(),
            Type::Bool => "i1".to_string(),
            Type::Str => "ptr".to_string(),
            Type::Array(elem, Some(len)) => format!("[{} x {}]", len, elem.llvm_name()),
            Type::Array(_, None) => "ptr".to_string(),
            Type::Struct(name) => format!("%{}", name),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::U8 | Type::I32 | Type::I64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem, _) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::U8 => write!(f, "u8"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Array(elem, Some(len)) => write!(f, "[{}]{}", len, elem),
            Type::Array(elem, None) => write!(f, "[]{}", elem),
            Type::Struct(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_lookup() {
        assert_eq!(Type::primitive("i32"), Some(Type::I32));
        assert_eq!(Type::primitive("f32"), Some(Type::F32));
        assert_eq!(Type::primitive("Point"), None);
    }

    #[test]
    fn test_llvm_names() {
        assert_eq!(Type::Bool.llvm_name(), "i1");
        assert_eq!(Type::F64.llvm_name(), "double");
        assert_eq!(Type::Array(Box::new(Type::I32), Some(4)).llvm_name(), "[4 x i32]");
        assert_eq!(Type::Struct("Point".into()).llvm_name(), "%Point");
    }

    #[test]
    fn test_source_spelling_round_trips_through_display() {
        let ty = Type::Array(Box::new(Type::U8), Some(16));
        assert_eq!(ty.to_string(), "[16]u8");
        assert_eq!(Type::Array(Box::new(Type::I64), None).to_string(), "[]i64");
    }
}
