//! Pass 2a: C3 linearization of each contract's base list and import of the
//! inherited scope members.

use rustc_hash::FxHashSet;

use crate::ast::ContractDefinition;
use crate::errors::{Diagnostic, Fatal, FatalError};

use super::ids::DeclId;
use super::scope::{DeclKind, ScopeTable};
use super::Annotations;

/// Resolve the base list (already bound by the reference resolver), run the
/// C3 merge, and record the linearization annotations.
pub fn linearize(
    contract: &ContractDefinition,
    scopes: &ScopeTable,
    annotations: &mut Annotations,
    diagnostics: &mut Vec<Diagnostic>,
) -> Fatal<()> {
    let contract_decl = annotations.decl_of[&contract.id];

    let mut direct_bases = Vec::with_capacity(contract.bases.len());
    for base in &contract.bases {
        let referenced = annotations
            .referenced_declaration
            .get(&base.base_name.id)
            .copied();
        let base_decl = match referenced {
            Some(decl) if scopes.decl(decl).kind == DeclKind::Contract => decl,
            _ => {
                diagnostics.push(Diagnostic::type_error(
                    base.base_name.span,
                    "Contract expected.",
                ));
                return Err(FatalError);
            }
        };
        direct_bases.push((base_decl, base.base_name.span));
    }

    // Bases mentioned later are pushed to the front so they can override
    // members of bases mentioned earlier; each base also contributes its own
    // already-computed linearization.
    let mut input: Vec<Vec<DeclId>> = Vec::with_capacity(direct_bases.len() + 1);
    for (base_decl, span) in direct_bases.iter().rev() {
        match annotations.linearized_base_contracts.get(base_decl) {
            Some(bases_bases) if !bases_bases.is_empty() => input.push(bases_bases.clone()),
            _ => {
                diagnostics.push(Diagnostic::type_error(
                    *span,
                    "Definition of base has to precede definition of derived contract",
                ));
                return Err(FatalError);
            }
        }
    }
    let mut direct = Vec::with_capacity(direct_bases.len() + 1);
    direct.push(contract_decl);
    direct.extend(direct_bases.iter().rev().map(|(decl, _)| *decl));
    input.push(direct);

    let result = match c3_merge(input) {
        Some(result) => result,
        None => {
            diagnostics.push(Diagnostic::type_error(
                contract.span,
                "Linearization of inheritance graph impossible",
            ));
            return Err(FatalError);
        }
    };

    let dependencies: FxHashSet<DeclId> = result[1..].iter().copied().collect();
    annotations
        .linearized_base_contracts
        .insert(contract_decl, result);
    annotations
        .contract_dependencies
        .insert(contract_decl, dependencies);
    Ok(())
}

/// The classical head/tail merge. A head may be appended to the result when
/// it appears in no list's tail; lists are scanned left to right, which makes
/// the tie-break deterministic. Returns `None` when no candidate remains.
pub fn c3_merge(mut lists: Vec<Vec<DeclId>>) -> Option<Vec<DeclId>> {
    lists.retain(|list| !list.is_empty());
    let mut result = Vec::new();
    while !lists.is_empty() {
        let candidate = lists
            .iter()
            .map(|list| list[0])
            .find(|head| lists.iter().all(|list| !list[1..].contains(head)))?;
        result.push(candidate);
        for list in &mut lists {
            list.retain(|entry| *entry != candidate);
        }
        lists.retain(|list| !list.is_empty());
    }
    Some(result)
}

/// Copy every declaration made in `base` that is visible in derived
/// contracts into the scope of `contract`. Imported overloads extend the
/// existing buckets; clashes with own members are ignored here and surface
/// later as override or overload errors.
pub fn import_inherited_scope(
    contract_decl: DeclId,
    base_decl: DeclId,
    scopes: &mut ScopeTable,
) {
    let (Some(contract_scope), Some(base_scope)) =
        (scopes.scope_of(contract_decl), scopes.scope_of(base_decl))
    else {
        return;
    };
    for (_, bucket) in scopes.declarations_in(base_scope) {
        for decl in bucket {
            let info = scopes.decl(decl);
            if info.scope == Some(base_scope) && info.is_visible_in_derived_contracts() {
                let _ = scopes.register(contract_scope, decl);
            }
        }
    }
}
