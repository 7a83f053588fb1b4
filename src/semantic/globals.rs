//! The built-in global declarations seeded into the root scope once per
//! analysis session.

use crate::ast::{NodeId, Visibility};
use crate::span::Span;

use super::scope::{DeclInfo, DeclKind, ScopeTable, GLOBAL_SCOPE};
use super::types::{FunctionLocation, FunctionType, MagicKind, Type};
use super::Annotations;

/// Node id used for declarations that have no AST node.
const SYNTHETIC: NodeId = NodeId(u32::MAX);

/// Populate the global scope with the magic variables and builtin functions.
pub fn seed(scopes: &mut ScopeTable, annotations: &mut Annotations) {
    let builtin_function = |params: Vec<Type>, returns: Vec<Type>, location: FunctionLocation| {
        Type::Function(Box::new(FunctionType::new(params, returns, location)))
    };
    let hash_function = |location: FunctionLocation, returns: Type| {
        let mut function = FunctionType::new(vec![], vec![returns], location);
        function.arbitrary_parameters = true;
        Type::Function(Box::new(function))
    };

    let builtins: Vec<(&str, Type)> = vec![
        ("block", Type::Magic(MagicKind::Block)),
        ("msg", Type::Magic(MagicKind::Message)),
        ("tx", Type::Magic(MagicKind::Transaction)),
        ("now", Type::uint256()),
        (
            "suicide",
            builtin_function(vec![Type::address()], vec![], FunctionLocation::Suicide),
        ),
        (
            "selfdestruct",
            builtin_function(vec![Type::address()], vec![], FunctionLocation::Suicide),
        ),
        (
            "sha3",
            hash_function(FunctionLocation::Sha3, Type::FixedBytes(32)),
        ),
        (
            "keccak256",
            hash_function(FunctionLocation::Sha3, Type::FixedBytes(32)),
        ),
        (
            "sha256",
            hash_function(FunctionLocation::Sha256, Type::FixedBytes(32)),
        ),
        (
            "ripemd160",
            hash_function(FunctionLocation::Ripemd160, Type::FixedBytes(20)),
        ),
        (
            "ecrecover",
            builtin_function(
                vec![
                    Type::FixedBytes(32),
                    Type::uint(8),
                    Type::FixedBytes(32),
                    Type::FixedBytes(32),
                ],
                vec![Type::address()],
                FunctionLocation::EcRecover,
            ),
        ),
        (
            "addmod",
            builtin_function(
                vec![Type::uint256(), Type::uint256(), Type::uint256()],
                vec![Type::uint256()],
                FunctionLocation::AddMod,
            ),
        ),
        (
            "mulmod",
            builtin_function(
                vec![Type::uint256(), Type::uint256(), Type::uint256()],
                vec![Type::uint256()],
                FunctionLocation::MulMod,
            ),
        ),
    ];

    for (name, ty) in builtins {
        let decl = scopes.add_decl(DeclInfo {
            name: name.to_string(),
            kind: DeclKind::Builtin,
            node: SYNTHETIC,
            visibility: Visibility::Public,
            span: Span::dummy(),
            scope: None,
            is_constructor: false,
        });
        // Never mutated afterwards; clashes cannot occur in a fresh scope.
        let _ = scopes.register(GLOBAL_SCOPE, decl);
        annotations.builtin_types.insert(decl, ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_are_resolvable() {
        let mut scopes = ScopeTable::new();
        let mut annotations = Annotations::default();
        seed(&mut scopes, &mut annotations);

        for name in ["block", "msg", "tx", "now", "sha3", "keccak256", "ecrecover"] {
            let found = scopes.resolve_name(GLOBAL_SCOPE, name, false);
            assert_eq!(found.len(), 1, "missing builtin {name}");
            assert!(annotations.builtin_types.contains_key(&found[0]));
        }
    }
}
