//! Parsing of assembly-qualified type names.
//!
//! The token-resolver stream identifies types by their assembly-qualified
//! reflection name (`"Ns.Outer+Inner[], mscorlib, Version=..."`). [`TypeName`]
//! splits such a string into the assembly full name, the element name, and the
//! stack of type modifiers, so operand tokens can be resolved back to concrete
//! arena entries.

use crate::Result;

/// A single type modifier suffix, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    /// Single-dimensional, zero-based array (`[]`)
    Array,
    /// Unmanaged pointer (`*`)
    Pointer,
    /// Managed by-reference (`&`)
    ByRef,
}

/// A parsed assembly-qualified type name.
///
/// Separates the assembly full name from the type portion, strips the modifier
/// suffixes (`[]`, `*`, `&`) into a stack ordered the way they were declared,
/// and exposes the `+`-separated nesting chain.
///
/// # Examples
///
/// ```rust
/// use eazdevirt::metadata::typename::{TypeModifier, TypeName};
///
/// let tn = TypeName::parse("System.Int32[], mscorlib, Version=4.0.0.0")?;
/// assert_eq!(tn.element_name(), "System.Int32");
/// assert_eq!(tn.modifiers(), &[TypeModifier::Array]);
/// assert_eq!(tn.assembly(), Some("mscorlib, Version=4.0.0.0"));
/// # Ok::<(), eazdevirt::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    raw: String,
    assembly: Option<String>,
    element_name: String,
    modifiers: Vec<TypeModifier>,
}

impl TypeName {
    /// Parse an assembly-qualified (or bare) type name.
    ///
    /// The assembly part starts at the first comma outside any bracket pair,
    /// so generic instantiations with embedded qualified arguments
    /// (`` List`1[[System.Int32, mscorlib]] ``) keep their arguments intact.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the type portion is empty.
    pub fn parse(input: &str) -> Result<TypeName> {
        let raw = input.trim();

        let mut depth = 0usize;
        let mut split = raw.len();
        for (index, ch) in raw.char_indices() {
            match ch {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    split = index;
                    break;
                }
                _ => {}
            }
        }

        let type_part = raw[..split].trim();
        let assembly = if split < raw.len() {
            let name = raw[split + 1..].trim();
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        } else {
            None
        };

        if type_part.is_empty() {
            return Err(malformed_error!("Empty type name in '{raw}'"));
        }

        // Modifiers are stripped from the end; reversing restores declaration
        // order ("T[]*" is array-of-T, then pointer-to-that).
        let mut element = type_part;
        let mut modifiers = Vec::new();
        loop {
            if let Some(stripped) = element.strip_suffix("[]") {
                modifiers.push(TypeModifier::Array);
                element = stripped.trim_end();
            } else if let Some(stripped) = element.strip_suffix('*') {
                modifiers.push(TypeModifier::Pointer);
                element = stripped.trim_end();
            } else if let Some(stripped) = element.strip_suffix('&') {
                modifiers.push(TypeModifier::ByRef);
                element = stripped.trim_end();
            } else {
                break;
            }
        }
        modifiers.reverse();

        if element.is_empty() {
            return Err(malformed_error!("Type name '{raw}' is only modifiers"));
        }

        Ok(TypeName {
            raw: raw.to_string(),
            assembly,
            element_name: element.to_string(),
            modifiers,
        })
    }

    /// The original input, trimmed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The assembly full name, if the input was assembly-qualified.
    #[must_use]
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    /// The type name with modifiers stripped (`"Ns.Outer+Inner"`).
    #[must_use]
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    /// The modifier stack in declaration order.
    #[must_use]
    pub fn modifiers(&self) -> &[TypeModifier] {
        &self.modifiers
    }

    /// True when the element name contains a `+` nesting separator.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.element_name.contains('+')
    }

    /// The `+`-separated nesting chain, outermost first.
    pub fn nesting_chain(&self) -> impl Iterator<Item = &str> {
        self.element_name.split('+')
    }
}
