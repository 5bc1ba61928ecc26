//! Copy and substitution of generic component definitions
//!
//! Produces a structurally independent copy of a generic component for one
//! reference site: every instance-unique identifier is remangled, every
//! generic parameter reference is replaced by the bound argument, and a
//! discovery pass reports the generic references newly exposed inside the
//! copy together with an owner map for back-reference rewriting.

use indexmap::IndexMap;
use tracing::debug;

use crate::hir::{
    HirComponent, HirComponentKind, HirDeclDef, HirDeclaration, HirExpression, HirGenericArg,
    HirGenericType, HirType, InstantiationOrigin,
};
use crate::instantiation::error::{InconsistencyError, Result};
use crate::mangle::NameMangler;

/// Binding of one generic component's formal parameters to the concrete
/// arguments supplied at a single reference site. Scoped to exactly one
/// instantiation step.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionBinding {
    /// Type parameters bound to concrete types
    types: IndexMap<String, HirType>,
    /// Constant parameters bound to concrete expressions
    consts: IndexMap<String, HirExpression>,
}

impl SubstitutionBinding {
    /// Pair the generic's formal parameters with the reference's arguments,
    /// positionally. Arity disagreement means upstream validation failed.
    pub fn for_reference(
        generic: &HirComponent,
        target: &str,
        arguments: &[HirGenericArg],
    ) -> Result<Self> {
        if generic.generics.len() != arguments.len() {
            return Err(InconsistencyError::ArgumentCountMismatch {
                component: target.to_string(),
                expected: generic.generics.len(),
                actual: arguments.len(),
            }
            .into());
        }

        let mut binding = SubstitutionBinding::default();
        for (param, arg) in generic.generics.iter().zip(arguments) {
            match (&param.param_type, arg) {
                (HirGenericType::Type, HirGenericArg::Type(ty)) => {
                    binding.types.insert(param.name.clone(), ty.clone());
                }
                (HirGenericType::Const(_), HirGenericArg::Const(value)) => {
                    binding.consts.insert(param.name.clone(), value.clone());
                }
                // Kind agreement between parameter and argument is checked
                // before instantiation; an unbound parameter is left intact.
                _ => {}
            }
        }
        Ok(binding)
    }

    pub fn bind_type(&mut self, param: String, ty: HirType) {
        self.types.insert(param, ty);
    }

    pub fn bind_const(&mut self, param: String, value: HirExpression) {
        self.consts.insert(param, value);
    }
}

/// Old unique name to new unique name, for one copy. The same old name
/// always maps to the same new name within a single copy.
#[derive(Debug, Clone, Default)]
pub struct NamesMap {
    map: IndexMap<String, String>,
}

impl NamesMap {
    /// Allocate a fresh name for every instance-unique identifier declared
    /// in the component, in declaration order.
    fn build(component: &HirComponent, mangler: &mut NameMangler) -> Self {
        let mut names = NamesMap::default();
        for declaration in component.declarations() {
            names.allocate(&declaration.unique_name, mangler);
            match &declaration.def {
                HirDeclDef::Struct { members } => {
                    for member in members {
                        names.allocate(&member.unique_name, mangler);
                    }
                }
                HirDeclDef::Function { locals, .. } => {
                    for local in locals {
                        names.allocate(&local.unique_name, mangler);
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn allocate(&mut self, old: &str, mangler: &mut NameMangler) {
        if !self.map.contains_key(old) {
            let fresh = mangler.remangle(old);
            self.map.insert(old.to_string(), fresh);
        }
    }

    /// New name for an old unique name, if the copy renamed it.
    pub fn get(&self, old: &str) -> Option<&str> {
        self.map.get(old).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, old: &str, new: &str) {
        self.map.insert(old.to_string(), new.to_string());
    }

    /// Rewrite a `resolved` cache through the map, leaving entries that
    /// resolve outside the copy untouched.
    pub(crate) fn rewrite(&self, resolved: &mut Option<String>) {
        if let Some(old) = resolved {
            if let Some(new) = self.map.get(old) {
                *old = new.clone();
            }
        }
    }
}

/// Owner map: unique name of a composite declaration to its members'
/// source-visible names and their unique names. Built after substitution,
/// when member ownership is finally known.
pub type OwnerMap = IndexMap<String, IndexMap<String, String>>;

/// Everything the driver needs to splice one copy into the program.
#[derive(Debug, Clone, Default)]
pub struct ReferenceUpdatePlan {
    /// Old unique name to new unique name
    pub names: NamesMap,
    /// Member ownership inside the copy
    pub owners: OwnerMap,
}

/// Result of instantiating a generic component once.
#[derive(Debug)]
pub struct InstantiatedCopy {
    /// The concrete, freshly named copy
    pub component: HirComponent,
    /// Rewrite plan for the instantiating configuration
    pub plan: ReferenceUpdatePlan,
    /// Targets of generic references exposed inside the copy; the child
    /// frame's work list
    pub pending_generics: Vec<String>,
}

/// Instantiate `template` once for a reference that bound its parameters
/// as described by `binding`.
pub fn instantiate_once(
    template: &HirComponent,
    binding: &SubstitutionBinding,
    chain: &[InstantiationOrigin],
    mangler: &mut NameMangler,
) -> InstantiatedCopy {
    // Structural deep copy: the owned clone shares no nodes with the
    // template, and the names map below is the old-to-new correspondence.
    let mut component = template.clone();

    let names = NamesMap::build(&component, mangler);
    remangle_component(&mut component, &names);
    substitute_component(&mut component, binding);

    let (pending_generics, owners) = discover(&component);

    component.is_generic = false;
    component.generics.clear();
    component.name = mangler.mangle(&template.name);
    component.provenance = Some(chain.to_vec());

    debug!(
        "instantiated '{}' as '{}': {} renamed identifiers, {} pending generic references",
        template.name,
        component.name,
        names.len(),
        pending_generics.len()
    );

    InstantiatedCopy {
        component,
        plan: ReferenceUpdatePlan { names, owners },
        pending_generics,
    }
}

/// Rename every occurrence of the copy's instance-unique identifiers.
fn remangle_component(component: &mut HirComponent, names: &NamesMap) {
    for declaration in component.declarations_mut() {
        remangle_declaration(declaration, names);
    }

    if let HirComponentKind::Configuration(body) = &mut component.kind {
        for connection in &mut body.connections {
            names.rewrite(&mut connection.from.resolved);
            names.rewrite(&mut connection.to.resolved);
        }
    }
}

fn remangle_declaration(declaration: &mut HirDeclaration, names: &NamesMap) {
    if let Some(new) = names.get(&declaration.unique_name) {
        declaration.unique_name = new.to_string();
    }

    match &mut declaration.def {
        HirDeclDef::Typedef { ty } => *ty = remangle_type(ty, names),
        HirDeclDef::Struct { members } => {
            for member in members {
                if let Some(new) = names.get(&member.unique_name) {
                    member.unique_name = new.to_string();
                }
                member.ty = remangle_type(&member.ty, names);
            }
        }
        HirDeclDef::Constant { ty, value } => {
            *ty = remangle_type(ty, names);
            *value = remangle_expr(value, names);
        }
        HirDeclDef::Function { ret, params, locals } => {
            *ret = remangle_type(ret, names);
            for param in params {
                param.ty = remangle_type(&param.ty, names);
            }
            for local in locals {
                if let Some(new) = names.get(&local.unique_name) {
                    local.unique_name = new.to_string();
                }
                local.ty = remangle_type(&local.ty, names);
                if let Some(init) = &local.init {
                    local.init = Some(remangle_expr(init, names));
                }
            }
        }
    }
}

fn remangle_type(ty: &HirType, names: &NamesMap) -> HirType {
    match ty {
        HirType::Named { name, resolved } => {
            let mut resolved = resolved.clone();
            names.rewrite(&mut resolved);
            HirType::Named {
                name: name.clone(),
                resolved,
            }
        }
        HirType::Array(elem, size) => HirType::Array(
            Box::new(remangle_type(elem, names)),
            Box::new(remangle_expr(size, names)),
        ),
        _ => ty.clone(),
    }
}

fn remangle_expr(expr: &HirExpression, names: &NamesMap) -> HirExpression {
    match expr {
        HirExpression::Ident { name, resolved } => {
            let mut resolved = resolved.clone();
            names.rewrite(&mut resolved);
            HirExpression::Ident {
                name: name.clone(),
                resolved,
            }
        }
        HirExpression::MemberAccess {
            base,
            member,
            resolved,
        } => {
            let mut resolved = resolved.clone();
            names.rewrite(&mut resolved);
            HirExpression::MemberAccess {
                base: Box::new(remangle_expr(base, names)),
                member: member.clone(),
                resolved,
            }
        }
        HirExpression::Binary { op, left, right } => HirExpression::Binary {
            op: *op,
            left: Box::new(remangle_expr(left, names)),
            right: Box::new(remangle_expr(right, names)),
        },
        _ => expr.clone(),
    }
}

/// Replace every reference to a formal generic parameter with the bound
/// concrete type or expression. Purely structural; well-formedness was
/// checked before instantiation.
fn substitute_component(component: &mut HirComponent, binding: &SubstitutionBinding) {
    for declaration in component.declarations_mut() {
        substitute_declaration(declaration, binding);
    }

    if let HirComponentKind::Configuration(body) = &mut component.kind {
        // Arguments of the copy's own references may mention the copy's
        // parameters; substituting here is what lets a generic refer to
        // another generic.
        for reference in &mut body.refs {
            for argument in &mut reference.arguments {
                match argument {
                    HirGenericArg::Type(ty) => *ty = substitute_type(ty, binding),
                    HirGenericArg::Const(value) => *value = substitute_expr(value, binding),
                }
            }
        }
    }
}

fn substitute_declaration(declaration: &mut HirDeclaration, binding: &SubstitutionBinding) {
    match &mut declaration.def {
        HirDeclDef::Typedef { ty } => *ty = substitute_type(ty, binding),
        HirDeclDef::Struct { members } => {
            for member in members {
                member.ty = substitute_type(&member.ty, binding);
            }
        }
        HirDeclDef::Constant { ty, value } => {
            *ty = substitute_type(ty, binding);
            *value = substitute_expr(value, binding);
        }
        HirDeclDef::Function { ret, params, locals } => {
            *ret = substitute_type(ret, binding);
            for param in params {
                param.ty = substitute_type(&param.ty, binding);
            }
            for local in locals {
                local.ty = substitute_type(&local.ty, binding);
                if let Some(init) = &local.init {
                    local.init = Some(substitute_expr(init, binding));
                }
            }
        }
    }
}

fn substitute_type(ty: &HirType, binding: &SubstitutionBinding) -> HirType {
    match ty {
        HirType::Param(name) => binding
            .types
            .get(name)
            .cloned()
            .unwrap_or_else(|| ty.clone()),
        HirType::Array(elem, size) => HirType::Array(
            Box::new(substitute_type(elem, binding)),
            Box::new(substitute_expr(size, binding)),
        ),
        _ => ty.clone(),
    }
}

fn substitute_expr(expr: &HirExpression, binding: &SubstitutionBinding) -> HirExpression {
    match expr {
        HirExpression::Param(name) => binding
            .consts
            .get(name)
            .cloned()
            .unwrap_or_else(|| expr.clone()),
        HirExpression::Binary { op, left, right } => HirExpression::Binary {
            op: *op,
            left: Box::new(substitute_expr(left, binding)),
            right: Box::new(substitute_expr(right, binding)),
        },
        HirExpression::MemberAccess {
            base,
            member,
            resolved,
        } => HirExpression::MemberAccess {
            base: Box::new(substitute_expr(base, binding)),
            member: member.clone(),
            resolved: resolved.clone(),
        },
        _ => expr.clone(),
    }
}

/// Enumerate the generic references still present inside the copy and map
/// members of composite declarations to their declaring entity.
fn discover(component: &HirComponent) -> (Vec<String>, OwnerMap) {
    let mut pending = Vec::new();
    if let HirComponentKind::Configuration(body) = &component.kind {
        for reference in &body.refs {
            if reference.is_generic {
                pending.push(reference.target.clone());
            }
        }
    }

    let mut owners = OwnerMap::new();
    for declaration in component.declarations() {
        if let HirDeclDef::Struct { members } = &declaration.def {
            let entry = members
                .iter()
                .map(|m| (m.name.clone(), m.unique_name.clone()))
                .collect();
            owners.insert(declaration.unique_name.clone(), entry);
        }
    }

    (pending, owners)
}
