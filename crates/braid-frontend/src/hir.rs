//! HIR - the component graph handed to instantiation
//!
//! A Braid program is a set of named components: modules (leaves) and
//! configurations (internal wiring of component references). Components may
//! be generic over types and compile-time constants; instantiation replaces
//! every generic reference with a freshly named concrete copy.

use serde::{Deserialize, Serialize};

/// Whole-program component graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hir {
    /// Program name
    pub name: String,
    /// Components in this program
    pub components: Vec<HirComponent>,
}

impl Hir {
    /// Look up a component by name
    pub fn component(&self, name: &str) -> Option<&HirComponent> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// A named component: module, configuration, or pre-compiled binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirComponent {
    /// Component name, unique within one version of the program
    pub name: String,
    /// Whether the component is generic (declares parameters)
    pub is_generic: bool,
    /// Generic parameters
    pub generics: Vec<HirGeneric>,
    /// Component kind and body
    pub kind: HirComponentKind,
    /// Instantiation decisions that produced this component, if any
    pub provenance: Option<Vec<InstantiationOrigin>>,
}

impl HirComponent {
    /// Whether the component is a configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, HirComponentKind::Configuration(_))
    }

    /// Configuration body, if the component is a configuration
    pub fn configuration(&self) -> Option<&HirConfigurationBody> {
        match &self.kind {
            HirComponentKind::Configuration(body) => Some(body),
            _ => None,
        }
    }

    /// Mutable configuration body, if the component is a configuration
    pub fn configuration_mut(&mut self) -> Option<&mut HirConfigurationBody> {
        match &mut self.kind {
            HirComponentKind::Configuration(body) => Some(body),
            _ => None,
        }
    }

    /// Declarations of the component body; empty for binary components
    pub fn declarations(&self) -> &[HirDeclaration] {
        match &self.kind {
            HirComponentKind::Module(body) => &body.declarations,
            HirComponentKind::Configuration(body) => &body.declarations,
            HirComponentKind::Binary => &[],
        }
    }

    /// Mutable declarations of the component body
    pub fn declarations_mut(&mut self) -> &mut [HirDeclaration] {
        match &mut self.kind {
            HirComponentKind::Module(body) => &mut body.declarations,
            HirComponentKind::Configuration(body) => &mut body.declarations,
            HirComponentKind::Binary => &mut [],
        }
    }
}

/// Component kind in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirComponentKind {
    /// Leaf component: declarations only, no internal component references
    Module(HirModuleBody),
    /// Component with internal wiring
    Configuration(HirConfigurationBody),
    /// Pre-compiled opaque component, never instantiated
    Binary,
}

/// Generic parameter in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirGeneric {
    /// Parameter name
    pub name: String,
    /// Parameter kind
    pub param_type: HirGenericType,
}

/// Generic parameter kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirGenericType {
    /// Type parameter
    Type,
    /// Compile-time constant parameter of the given type
    Const(HirType),
}

/// Module body in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirModuleBody {
    /// Declarations
    pub declarations: Vec<HirDeclaration>,
}

/// Configuration body in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirConfigurationBody {
    /// Ordered component references forming the wiring list
    pub refs: Vec<HirComponentRef>,
    /// Local declarations
    pub declarations: Vec<HirDeclaration>,
    /// Wiring connections
    pub connections: Vec<HirConnection>,
}

/// Component reference inside a configuration's wiring list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirComponentRef {
    /// Name of the referenced component
    pub target: String,
    /// Local alias for the referenced component
    pub alias: Option<String>,
    /// Whether the target is generic and this reference instantiates it
    pub is_generic: bool,
    /// Arguments supplied to a generic target
    pub arguments: Vec<HirGenericArg>,
}

impl HirComponentRef {
    /// The name used locally to refer to the target: alias if present,
    /// otherwise the target name itself
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.target)
    }
}

/// Argument supplied to a generic component reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirGenericArg {
    /// Concrete type argument
    Type(HirType),
    /// Compile-time constant argument
    Const(HirExpression),
}

/// Wiring connection between two endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirConnection {
    /// Source endpoint
    pub from: HirEndpoint,
    /// Destination endpoint
    pub to: HirEndpoint,
    /// Connection kind
    pub kind: HirConnectionKind,
}

/// Connection kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirConnectionKind {
    /// Equate two entities
    Equate,
    /// Route one entity to another
    Link,
}

/// One side of a connection: an entity, optionally dereferenced through
/// a component's local name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirEndpoint {
    /// Local name of the component the entity belongs to, if dereferenced
    pub component: Option<String>,
    /// Entity name
    pub entity: String,
    /// Unique name of the declaration this endpoint resolves to
    pub resolved: Option<String>,
}

/// Declaration inside a module or configuration body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirDeclaration {
    /// Source-visible name
    pub name: String,
    /// Program-unique name; remangled per instantiated copy
    pub unique_name: String,
    /// Declared definition
    pub def: HirDeclDef,
}

/// Declaration definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirDeclDef {
    /// Type alias
    Typedef {
        /// Aliased type
        ty: HirType,
    },
    /// Composite type
    Struct {
        /// Members
        members: Vec<HirStructMember>,
    },
    /// Compile-time constant
    Constant {
        /// Constant type
        ty: HirType,
        /// Constant value
        value: HirExpression,
    },
    /// Function
    Function {
        /// Return type
        ret: HirType,
        /// Parameters
        params: Vec<HirFunctionParam>,
        /// Local variables
        locals: Vec<HirLocal>,
    },
}

/// Struct member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirStructMember {
    /// Member name
    pub name: String,
    /// Program-unique name; remangled per instantiated copy
    pub unique_name: String,
    /// Member type
    pub ty: HirType,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirFunctionParam {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: HirType,
}

/// Function-local variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirLocal {
    /// Variable name
    pub name: String,
    /// Program-unique name; remangled per instantiated copy
    pub unique_name: String,
    /// Variable type
    pub ty: HirType,
    /// Initializer
    pub init: Option<HirExpression>,
}

/// Type in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirType {
    /// Boolean
    Bool,
    /// Bit vector of fixed width
    Bit(u32),
    /// Signed integer of fixed width
    Int(u32),
    /// Reference to a declared type by source-visible name
    Named {
        /// Type name
        name: String,
        /// Unique name of the declaration this type resolves to
        resolved: Option<String>,
    },
    /// Reference to a generic type parameter
    Param(String),
    /// Type declared by another component, dereferenced through its
    /// local name
    ComponentEntity {
        /// Local name of the owning component
        component: String,
        /// Entity name inside the owning component
        entity: String,
        /// Unique name of the declaration this type resolves to
        resolved: Option<String>,
    },
    /// Array with an element type and a size expression
    Array(Box<HirType>, Box<HirExpression>),
}

/// Expression in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirExpression {
    /// Literal value
    Literal(HirLiteral),
    /// Reference to a generic constant parameter
    Param(String),
    /// Reference to a declaration by source-visible name
    Ident {
        /// Referenced name
        name: String,
        /// Unique name of the declaration this reference resolves to
        resolved: Option<String>,
    },
    /// Entity of another component, dereferenced through its local name
    ComponentDeref {
        /// Local name of the owning component
        component: String,
        /// Entity name inside the owning component
        entity: String,
        /// Unique name of the declaration this reference resolves to
        resolved: Option<String>,
    },
    /// Member of a composite value
    MemberAccess {
        /// Base expression
        base: Box<HirExpression>,
        /// Member name
        member: String,
        /// Unique name of the member declaration
        resolved: Option<String>,
    },
    /// Binary expression
    Binary {
        /// Operator
        op: HirBinaryOp,
        /// Left operand
        left: Box<HirExpression>,
        /// Right operand
        right: Box<HirExpression>,
    },
}

/// Literal in HIR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirLiteral {
    /// Integer literal
    Integer(u64),
    /// Boolean literal
    Boolean(bool),
    /// String literal
    Str(String),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HirBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
}

/// One instantiation decision: which generic component was instantiated
/// and under which local name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationOrigin {
    /// Name of the generic component that was instantiated
    pub component: String,
    /// Local name assigned at the instantiating reference
    pub alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_prefers_alias() {
        let mut r = HirComponentRef {
            target: "Queue".to_string(),
            alias: None,
            is_generic: true,
            arguments: vec![],
        };
        assert_eq!(r.local_name(), "Queue");

        r.alias = Some("Q".to_string());
        assert_eq!(r.local_name(), "Q");
    }

    #[test]
    fn test_component_lookup() {
        let hir = Hir {
            name: "app".to_string(),
            components: vec![HirComponent {
                name: "Main".to_string(),
                is_generic: false,
                generics: vec![],
                kind: HirComponentKind::Module(HirModuleBody {
                    declarations: vec![],
                }),
                provenance: None,
            }],
        };

        assert!(hir.component("Main").is_some());
        assert!(hir.component("Missing").is_none());
    }
}
