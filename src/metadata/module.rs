//! The module arena: every type, method, field and embedded resource of the
//! protected assembly, addressable by metadata token.
//!
//! The arena is the contract between the external assembly reader and the
//! devirtualization core. The reader populates it once; the pipeline only
//! reads from it, which is what allows per-method translation to fan out
//! across worker threads without synchronization.
//!
//! Iteration over methods and types is insertion-ordered, so discovery and
//! matching are deterministic for a given input.

use rustc_hash::FxHashMap;

use crate::metadata::{
    method::{MethodBody, MethodDef},
    token::Token,
};

/// One type entry in the arena.
///
/// External references (BCL types like `System.Array`) and definitions from
/// the protected module share this representation; the pipeline never needs
/// to distinguish them.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// The arena address of this type.
    pub token: Token,
    /// Namespace portion, possibly empty.
    pub namespace: String,
    /// Simple name.
    pub name: String,
    /// Enclosing type for nested types.
    pub enclosing: Option<Token>,
}

/// One field entry in the arena.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The arena address of this field.
    pub token: Token,
    /// Simple name.
    pub name: String,
    /// Arena address of the declaring type.
    pub declaring_type: Token,
    /// RVA-backed initial data, when the field maps a data segment.
    pub rva_data: Option<Vec<u8>>,
}

/// An embedded (manifest) resource.
#[derive(Debug, Clone)]
pub struct EmbeddedResource {
    /// Manifest name the getter references.
    pub name: String,
    /// Raw resource bytes.
    pub data: Vec<u8>,
}

/// The assembly arena the pipeline operates on.
pub struct Module {
    name: String,
    types: FxHashMap<Token, TypeDef>,
    methods: FxHashMap<Token, MethodDef>,
    fields: FxHashMap<Token, FieldDef>,
    resources: Vec<EmbeddedResource>,
    type_order: Vec<Token>,
    method_order: Vec<Token>,
    type_names: FxHashMap<String, Token>,
}

impl Module {
    /// Create an empty arena for the named module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            types: FxHashMap::default(),
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            resources: Vec::new(),
            type_order: Vec::new(),
            method_order: Vec::new(),
            type_names: FxHashMap::default(),
        }
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a type. Enclosing types must be inserted before their nested
    /// types so the full-name index stays consistent.
    pub fn add_type(&mut self, type_def: TypeDef) {
        let token = type_def.token;
        let full_name = self.compute_type_full_name(&type_def);
        self.type_names.insert(full_name, token);
        if self.types.insert(token, type_def).is_none() {
            self.type_order.push(token);
        }
    }

    /// Insert a method (definition or external member reference).
    pub fn add_method(&mut self, method: MethodDef) {
        let token = method.token;
        if self.methods.insert(token, method).is_none() {
            self.method_order.push(token);
        }
    }

    /// Insert a field.
    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.insert(field.token, field);
    }

    /// Insert an embedded resource.
    pub fn add_resource(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.resources.push(EmbeddedResource {
            name: name.into(),
            data,
        });
    }

    /// Look up a type by token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        self.types.get(&token)
    }

    /// Look up a method by token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        self.methods.get(&token)
    }

    /// Look up a field by token.
    #[must_use]
    pub fn field(&self, token: Token) -> Option<&FieldDef> {
        self.fields.get(&token)
    }

    /// Look up a method body by token; `None` for bodiless entries too.
    #[must_use]
    pub fn method_body(&self, token: Token) -> Option<&MethodBody> {
        self.methods.get(&token).and_then(|m| m.body.as_ref())
    }

    /// All methods, in insertion order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.method_order.iter().filter_map(|t| self.methods.get(t))
    }

    /// All methods declared by `declaring_type`, in insertion order.
    pub fn methods_of(&self, declaring_type: Token) -> impl Iterator<Item = &MethodDef> {
        self.methods()
            .filter(move |m| m.declaring_type == declaring_type)
    }

    /// All types, in insertion order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.type_order.iter().filter_map(|t| self.types.get(t))
    }

    /// All embedded resources.
    #[must_use]
    pub fn resources(&self) -> &[EmbeddedResource] {
        &self.resources
    }

    /// Look up an embedded resource by manifest name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&EmbeddedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// The full name of a type (`"Ns.Outer+Inner"`), walking the nesting
    /// chain.
    #[must_use]
    pub fn type_full_name(&self, token: Token) -> Option<String> {
        let type_def = self.types.get(&token)?;
        Some(self.compute_type_full_name(type_def))
    }

    /// The full name of a method or field (`"Ns.Type::Name"`).
    #[must_use]
    pub fn member_full_name(&self, token: Token) -> Option<String> {
        let (declaring, name) = if let Some(method) = self.methods.get(&token) {
            (method.declaring_type, method.name.as_str())
        } else if let Some(field) = self.fields.get(&token) {
            (field.declaring_type, field.name.as_str())
        } else {
            return None;
        };

        let declaring = self.type_full_name(declaring)?;
        Some(format!("{declaring}::{name}"))
    }

    /// Resolve a full type name back to its arena token.
    #[must_use]
    pub fn type_by_full_name(&self, full_name: &str) -> Option<Token> {
        self.type_names.get(full_name).copied()
    }

    /// Resolve a member by its declaring type's full name and simple name.
    #[must_use]
    pub fn method_by_name(&self, declaring_full_name: &str, name: &str) -> Option<&MethodDef> {
        let declaring = self.type_by_full_name(declaring_full_name)?;
        self.methods_of(declaring).find(|m| m.name == name)
    }

    /// Resolve a field by its declaring type's full name and simple name.
    #[must_use]
    pub fn field_by_name(&self, declaring_full_name: &str, name: &str) -> Option<&FieldDef> {
        let declaring = self.type_by_full_name(declaring_full_name)?;
        self.fields
            .values()
            .find(|f| f.declaring_type == declaring && f.name == name)
    }

    fn compute_type_full_name(&self, type_def: &TypeDef) -> String {
        let own = if type_def.namespace.is_empty() {
            type_def.name.clone()
        } else {
            format!("{}.{}", type_def.namespace, type_def.name)
        };

        match type_def.enclosing {
            Some(outer) => match self.type_full_name(outer) {
                Some(outer_name) => format!("{outer_name}+{}", type_def.name),
                None => own,
            },
            None => own,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::MethodFlags;

    fn module_with_types() -> Module {
        let mut module = Module::new("test.exe");
        module.add_type(TypeDef {
            token: Token::new(0x0200_0001),
            namespace: "Ns".to_string(),
            name: "Outer".to_string(),
            enclosing: None,
        });
        module.add_type(TypeDef {
            token: Token::new(0x0200_0002),
            namespace: String::new(),
            name: "Inner".to_string(),
            enclosing: Some(Token::new(0x0200_0001)),
        });
        module
    }

    #[test]
    fn test_type_full_names() {
        let module = module_with_types();
        assert_eq!(
            module.type_full_name(Token::new(0x0200_0001)).unwrap(),
            "Ns.Outer"
        );
        assert_eq!(
            module.type_full_name(Token::new(0x0200_0002)).unwrap(),
            "Ns.Outer+Inner"
        );
    }

    #[test]
    fn test_type_by_full_name() {
        let module = module_with_types();
        assert_eq!(
            module.type_by_full_name("Ns.Outer+Inner"),
            Some(Token::new(0x0200_0002))
        );
        assert_eq!(module.type_by_full_name("Ns.Missing"), None);
    }

    #[test]
    fn test_member_full_name_and_lookup() {
        let mut module = module_with_types();
        module.add_method(MethodDef {
            token: Token::new(0x0600_0001),
            name: "Run".to_string(),
            declaring_type: Token::new(0x0200_0001),
            return_type: Token::new(0x0200_0001),
            flags: MethodFlags::PUBLIC,
            body: None,
        });

        assert_eq!(
            module.member_full_name(Token::new(0x0600_0001)).unwrap(),
            "Ns.Outer::Run"
        );
        assert!(module.method_by_name("Ns.Outer", "Run").is_some());
        assert!(module.method_by_name("Ns.Outer", "Missing").is_none());
    }

    #[test]
    fn test_resources() {
        let mut module = Module::new("test.exe");
        module.add_resource("payload", vec![1, 2, 3]);
        assert_eq!(module.resource("payload").unwrap().data, vec![1, 2, 3]);
        assert!(module.resource("other").is_none());
        assert_eq!(module.resources().len(), 1);
    }

    #[test]
    fn test_method_iteration_is_insertion_ordered() {
        let mut module = module_with_types();
        for row in [3u32, 1, 2] {
            module.add_method(MethodDef {
                token: Token::new(0x0600_0000 | row),
                name: format!("M{row}"),
                declaring_type: Token::new(0x0200_0001),
                return_type: Token::new(0x0200_0001),
                flags: MethodFlags::empty(),
                body: None,
            });
        }
        let names: Vec<&str> = module.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["M3", "M1", "M2"]);
    }
}
