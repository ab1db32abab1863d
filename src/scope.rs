use crate::types::Type;
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    /// `None` for functions without `-> type`.
    pub ret: Option<Type>,
}

/// Symbol table shared by the parser and the semantic analyzer.
///
/// Variables live in one flat namespace that is reset per function body.
/// Functions and structs stay visible for the whole compilation unit, so a
/// call may refer to a function declared further down the file.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Type>,
    functions: HashMap<String, Signature>,
    structs: HashMap<String, IndexMap<String, Type>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any earlier binding of the same name.
    pub fn add_var(&mut self, name: &str, ty: Type) {
        self.vars.insert(name.to_string(), ty);
    }

    pub fn var(&self, name: &str) -> Option<&Type> {
        self.vars.get(name)
    }

    pub fn reset_vars(&mut self) {
        self.vars.clear();
    }

    pub fn add_function(&mut self, name: &str, signature: Signature) {
        self.functions.insert(name.to_string(), signature);
    }

    pub fn function(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    pub fn add_struct(&mut self, name: &str, fields: IndexMap<String, Type>) {
        self.structs.insert(name.to_string(), fields);
    }

    pub fn has_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn struct_fields(&self, name: &str) -> Option<&IndexMap<String, Type>> {
        self.structs.get(name)
    }

    /// Position and type of `field` inside struct `name`.
    pub fn struct_field(&self, name: &str, field: &str) -> Option<(usize, &Type)> {
        self.structs
            .get(name)?
            .get_full(field)
            .map(|(index, _, ty)| (index, ty))
    }
}
