//! Reference-site rewriting in the instantiating configuration
//!
//! After a copy is produced, the consumed reference must target the copy
//! instead of the generic template, and every dereference through the
//! reference's local name must resolve inside the copy.

use crate::hir::{
    HirConfigurationBody, HirDeclDef, HirDeclaration, HirEndpoint, HirExpression, HirGenericArg,
    HirType,
};
use crate::instantiation::specialize::ReferenceUpdatePlan;

/// Rewrite the reference at `ref_index` to target `copy_name` and update
/// all dependent back-references in the same configuration body.
pub fn rewrite_reference_site(
    body: &mut HirConfigurationBody,
    ref_index: usize,
    copy_name: &str,
    plan: &ReferenceUpdatePlan,
) {
    let local_name = {
        let reference = &mut body.refs[ref_index];
        let local_name = reference.local_name().to_string();

        reference.target = copy_name.to_string();
        reference.is_generic = false;
        reference.arguments.clear();
        // Installing the previous local name as the alias keeps every
        // existing use of that name valid after the target was renamed.
        reference.alias = Some(local_name.clone());

        local_name
    };

    for (index, reference) in body.refs.iter_mut().enumerate() {
        if index == ref_index {
            continue;
        }
        for argument in &mut reference.arguments {
            match argument {
                HirGenericArg::Type(ty) => rewrite_type(ty, &local_name, plan),
                HirGenericArg::Const(value) => rewrite_expr(value, &local_name, plan),
            }
        }
    }

    for declaration in &mut body.declarations {
        rewrite_declaration(declaration, &local_name, plan);
    }

    for connection in &mut body.connections {
        rewrite_endpoint(&mut connection.from, &local_name, plan);
        rewrite_endpoint(&mut connection.to, &local_name, plan);
    }
}

fn rewrite_endpoint(endpoint: &mut HirEndpoint, local_name: &str, plan: &ReferenceUpdatePlan) {
    if endpoint.component.as_deref() == Some(local_name) {
        plan.names.rewrite(&mut endpoint.resolved);
    }
}

fn rewrite_declaration(
    declaration: &mut HirDeclaration,
    local_name: &str,
    plan: &ReferenceUpdatePlan,
) {
    match &mut declaration.def {
        HirDeclDef::Typedef { ty } => rewrite_type(ty, local_name, plan),
        HirDeclDef::Struct { members } => {
            for member in members {
                rewrite_type(&mut member.ty, local_name, plan);
            }
        }
        HirDeclDef::Constant { ty, value } => {
            rewrite_type(ty, local_name, plan);
            rewrite_expr(value, local_name, plan);
        }
        HirDeclDef::Function { ret, params, locals } => {
            rewrite_type(ret, local_name, plan);
            for param in params {
                rewrite_type(&mut param.ty, local_name, plan);
            }
            for local in locals {
                rewrite_type(&mut local.ty, local_name, plan);
                if let Some(init) = &mut local.init {
                    rewrite_expr(init, local_name, plan);
                }
            }
        }
    }
}

fn rewrite_type(ty: &mut HirType, local_name: &str, plan: &ReferenceUpdatePlan) {
    match ty {
        HirType::ComponentEntity {
            component,
            resolved,
            ..
        } if component == local_name => {
            plan.names.rewrite(resolved);
        }
        HirType::Array(elem, size) => {
            rewrite_type(elem, local_name, plan);
            rewrite_expr(size, local_name, plan);
        }
        _ => {}
    }
}

fn rewrite_expr(expr: &mut HirExpression, local_name: &str, plan: &ReferenceUpdatePlan) {
    match expr {
        HirExpression::ComponentDeref {
            component,
            resolved,
            ..
        } if component == local_name => {
            plan.names.rewrite(resolved);
        }
        HirExpression::MemberAccess {
            base,
            member,
            resolved,
        } => {
            rewrite_expr(base, local_name, plan);

            // Member ownership is only known once the copy exists; the
            // owner map resolves members of entities declared in it.
            if let Some(owner) = deref_target(base, local_name) {
                if let Some(members) = plan.owners.get(owner) {
                    if let Some(new) = members.get(member.as_str()) {
                        *resolved = Some(new.clone());
                    }
                } else {
                    plan.names.rewrite(resolved);
                }
            }
        }
        HirExpression::Binary { left, right, .. } => {
            rewrite_expr(left, local_name, plan);
            rewrite_expr(right, local_name, plan);
        }
        _ => {}
    }
}

/// Unique name the base resolves to, when it dereferences an entity
/// through the rewritten reference's local name.
fn deref_target<'a>(base: &'a HirExpression, local_name: &str) -> Option<&'a str> {
    match base {
        HirExpression::ComponentDeref {
            component,
            resolved: Some(unique),
            ..
        } if component == local_name => Some(unique),
        _ => None,
    }
}
