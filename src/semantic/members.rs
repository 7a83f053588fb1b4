//! Type-directed member tables and the types of declarations used as
//! values.

use rustc_hash::FxHashSet;

use crate::ast::Visibility;

use super::ids::DeclId;
use super::scope::{DeclKind, ScopeTable};
use super::types::{
    selector, ArrayKind, ArrayType, DataLocation, FunctionLocation, FunctionType, MagicKind, Type,
};
use super::{Annotations, NodeIndex};

/// One entry of a member table.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    pub declaration: Option<DeclId>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberList(pub Vec<Member>);

impl MemberList {
    pub fn members_by_name(&self, name: &str) -> Vec<Member> {
        self.0
            .iter()
            .filter(|member| member.name == name)
            .cloned()
            .collect()
    }
}

/// The type a declaration denotes when referenced by name, or `None` when it
/// cannot be determined yet (e.g. an untyped `var` before inference).
pub fn decl_value_type(
    decl: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<Type> {
    let info = scopes.decl(decl);
    match info.kind {
        DeclKind::Contract => Some(Type::TypeType(Box::new(Type::Contract(decl)))),
        DeclKind::Struct => Some(Type::TypeType(Box::new(Type::Struct {
            decl,
            location: DataLocation::Storage,
        }))),
        DeclKind::Enum => Some(Type::TypeType(Box::new(Type::Enum(decl)))),
        DeclKind::EnumValue => {
            let parent = scopes.owner(info.scope?)?;
            Some(Type::Enum(parent))
        }
        DeclKind::Function => {
            function_type(decl, false, scopes, nodes, annotations).map(|f| Type::Function(Box::new(f)))
        }
        DeclKind::Modifier => {
            let definition = nodes.modifier(info.node);
            let mut params = Vec::with_capacity(definition.parameters.len());
            for param in &definition.parameters {
                params.push(annotations.types.get(&param.id)?.clone());
            }
            Some(Type::Modifier(params))
        }
        DeclKind::Event => {
            event_type(decl, scopes, nodes, annotations).map(|f| Type::Function(Box::new(f)))
        }
        DeclKind::StateVariable | DeclKind::LocalVariable | DeclKind::Parameter => {
            annotations.types.get(&info.node).cloned()
        }
        DeclKind::Builtin => annotations.builtin_types.get(&decl).cloned(),
    }
}

/// Build the function type of a function definition. Parameter types must
/// already be annotated; returns `None` otherwise.
pub fn function_type(
    decl: DeclId,
    external: bool,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<FunctionType> {
    let definition = nodes.function(scopes.decl(decl).node);
    let mut parameter_types = Vec::with_capacity(definition.parameters.len());
    let mut parameter_names = Vec::with_capacity(definition.parameters.len());
    for param in &definition.parameters {
        parameter_types.push(annotations.types.get(&param.id)?.clone());
        parameter_names.push(param.name.clone());
    }
    let mut return_types = Vec::with_capacity(definition.return_parameters.len());
    let mut return_names = Vec::with_capacity(definition.return_parameters.len());
    for param in &definition.return_parameters {
        return_types.push(annotations.types.get(&param.id)?.clone());
        return_names.push(param.name.clone());
    }
    let location = if external {
        FunctionLocation::External
    } else {
        FunctionLocation::Internal
    };
    let mut function = FunctionType::new(parameter_types, return_types, location);
    function.parameter_names = parameter_names;
    function.return_names = return_names;
    function.declaration = Some(decl);
    Some(function)
}

/// The callable type of an event (`Transfer(a, b)` inside a body).
pub fn event_type(
    decl: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<FunctionType> {
    let definition = nodes.event(scopes.decl(decl).node);
    let mut parameter_types = Vec::with_capacity(definition.parameters.len());
    let mut parameter_names = Vec::with_capacity(definition.parameters.len());
    for param in &definition.parameters {
        parameter_types.push(annotations.types.get(&param.id)?.clone());
        parameter_names.push(param.name.clone());
    }
    let mut function = FunctionType::new(parameter_types, vec![], FunctionLocation::Event);
    function.parameter_names = parameter_names;
    function.declaration = Some(decl);
    Some(function)
}

/// The accessor function a public state variable contributes to the external
/// interface: mapping keys and array indices become parameters.
pub fn accessor_type(
    decl: DeclId,
    scopes: &ScopeTable,
    annotations: &Annotations,
) -> Option<FunctionType> {
    let info = scopes.decl(decl);
    let mut current = annotations.types.get(&info.node)?.clone();
    let mut parameter_types = Vec::new();
    loop {
        match current {
            Type::Mapping { key, value } => {
                parameter_types.push(*key);
                current = *value;
            }
            Type::Array(array) if !array.is_byte_array() => {
                parameter_types.push(Type::uint256());
                current = array.base.clone();
            }
            _ => break,
        }
    }
    let mut function = FunctionType::new(parameter_types, vec![current], FunctionLocation::External);
    function.declaration = Some(decl);
    Some(function)
}

/// The memory constructor of a struct: one parameter per member, over the
/// full member count. Members that cannot live outside storage keep their
/// slot (so arity checks see every member) and are additionally listed by
/// name for the error message.
pub fn struct_constructor_type(
    decl: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<(FunctionType, Vec<String>)> {
    let definition = nodes.strukt(scopes.decl(decl).node);
    let mut parameter_types = Vec::with_capacity(definition.members.len());
    let mut parameter_names = Vec::with_capacity(definition.members.len());
    let mut missing_in_memory = Vec::new();
    for member in &definition.members {
        let member_type = annotations.types.get(&member.id)?.clone();
        if member_type.can_live_outside_storage() {
            parameter_types.push(member_type.copy_for_location_if_reference(DataLocation::Memory));
        } else {
            missing_in_memory.push(member.name.clone());
            parameter_types.push(member_type);
        }
        parameter_names.push(member.name.clone());
    }
    let mut function = FunctionType::new(
        parameter_types,
        vec![Type::Struct {
            decl,
            location: DataLocation::Memory,
        }],
        FunctionLocation::Internal,
    );
    function.parameter_names = parameter_names;
    function.declaration = Some(decl);
    Some((function, missing_in_memory))
}

/// The constructor type of a contract: the declared constructor's
/// parameters, or an empty parameter list when none is declared.
pub fn constructor_type(
    contract: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<FunctionType> {
    match constructor_of(contract, scopes, nodes, annotations) {
        Some(constructor) => {
            let mut function = function_type(constructor, false, scopes, nodes, annotations)?;
            function.location = FunctionLocation::Creation;
            Some(function)
        }
        None => Some(FunctionType::new(
            vec![],
            vec![],
            FunctionLocation::Creation,
        )),
    }
}

/// The declared constructor of a contract, if any.
pub fn constructor_of(
    contract: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Option<DeclId> {
    let definition = nodes.contract(scopes.decl(contract).node);
    definition
        .functions
        .iter()
        .find(|f| f.name == definition.name)
        .and_then(|f| annotations.decl_of.get(&f.id).copied())
}

/// Whether a declaration contributes to the external ABI of its contract.
pub fn is_part_of_external_interface(decl: DeclId, scopes: &ScopeTable) -> bool {
    let info = scopes.decl(decl);
    match info.kind {
        DeclKind::Function => {
            info.visibility >= Visibility::Public && !info.is_constructor && !info.name.is_empty()
        }
        DeclKind::StateVariable => info.visibility >= Visibility::Public,
        _ => false,
    }
}

/// The deduplicated external interface of a contract across its
/// linearization: `(signature, selector, declaration, function type)`.
pub fn interface_functions(
    contract: DeclId,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> Vec<(String, [u8; 4], DeclId, FunctionType)> {
    let mut functions_seen: FxHashSet<String> = FxHashSet::default();
    let mut signatures_seen: FxHashSet<String> = FxHashSet::default();
    let mut result = Vec::new();

    let linearized = match annotations.linearized_base_contracts.get(&contract) {
        Some(linearized) => linearized.clone(),
        None => vec![contract],
    };
    for base in linearized {
        let definition = nodes.contract(scopes.decl(base).node);
        for function in &definition.functions {
            let Some(&decl) = annotations.decl_of.get(&function.id) else {
                continue;
            };
            if !is_part_of_external_interface(decl, scopes) {
                continue;
            }
            let Some(ftype) = function_type(decl, true, scopes, nodes, annotations) else {
                continue;
            };
            let Some(signature) = ftype.external_signature(&function.name) else {
                continue;
            };
            if signatures_seen.insert(signature.clone()) {
                functions_seen.insert(function.name.clone());
                let hash = selector(&signature);
                result.push((signature, hash, decl, ftype));
            }
        }
        for variable in &definition.state_variables {
            let Some(&decl) = annotations.decl_of.get(&variable.id) else {
                continue;
            };
            if !is_part_of_external_interface(decl, scopes) || functions_seen.contains(&variable.name)
            {
                continue;
            }
            let Some(accessor) = accessor_type(decl, scopes, annotations) else {
                continue;
            };
            let Some(signature) = accessor.external_signature(&variable.name) else {
                continue;
            };
            functions_seen.insert(variable.name.clone());
            let hash = selector(&signature);
            result.push((signature, hash, decl, accessor));
        }
    }
    result
}

/// The member table of a type.
pub fn members_of(
    ty: &Type,
    scopes: &ScopeTable,
    nodes: &NodeIndex,
    annotations: &Annotations,
) -> MemberList {
    let mut members = Vec::new();
    match ty {
        Type::Contract(decl) => {
            for (_, _, function_decl, ftype) in
                interface_functions(*decl, scopes, nodes, annotations)
            {
                members.push(Member {
                    name: scopes.decl(function_decl).name.clone(),
                    ty: Type::Function(Box::new(ftype)),
                    declaration: Some(function_decl),
                });
            }
            members.extend(address_members());
        }
        Type::Integer { .. } if ty.is_address() => members.extend(address_members()),
        Type::Struct { decl, location } => {
            let definition = nodes.strukt(scopes.decl(*decl).node);
            for field in &definition.members {
                let Some(field_type) = annotations.types.get(&field.id) else {
                    continue;
                };
                if *location != DataLocation::Storage && !field_type.can_live_outside_storage() {
                    continue;
                }
                members.push(Member {
                    name: field.name.clone(),
                    ty: field_type.copy_for_location_if_reference(*location),
                    declaration: annotations.decl_of.get(&field.id).copied(),
                });
            }
        }
        Type::Array(array) => {
            members.push(Member {
                name: "length".to_string(),
                ty: Type::uint256(),
                declaration: None,
            });
            if array.location == DataLocation::Storage
                && array.is_dynamically_sized()
                && array.kind != ArrayKind::String
            {
                members.push(Member {
                    name: "push".to_string(),
                    ty: Type::Function(Box::new(FunctionType::new(
                        vec![array.base.clone()],
                        vec![Type::uint256()],
                        FunctionLocation::Internal,
                    ))),
                    declaration: None,
                });
            }
        }
        Type::Function(function) => members.extend(function_members(function)),
        Type::Magic(kind) => members.extend(magic_members(*kind)),
        Type::TypeType(inner) => match inner.as_ref() {
            Type::Enum(decl) => {
                let definition = match nodes.get(scopes.decl(*decl).node) {
                    super::NodeRef::Enum(definition) => definition,
                    _ => return MemberList(members),
                };
                for value in &definition.values {
                    members.push(Member {
                        name: value.name.clone(),
                        ty: Type::Enum(*decl),
                        declaration: annotations.decl_of.get(&value.id).copied(),
                    });
                }
            }
            Type::Contract(decl) => {
                // Qualified access to a contract's functions: library calls
                // and explicit base references.
                let contract_node = nodes.contract(scopes.decl(*decl).node);
                let location = if contract_node.is_library {
                    FunctionLocation::CallCode
                } else {
                    FunctionLocation::Internal
                };
                let linearized = annotations
                    .linearized_base_contracts
                    .get(decl)
                    .cloned()
                    .unwrap_or_else(|| vec![*decl]);
                for base in linearized {
                    let definition = nodes.contract(scopes.decl(base).node);
                    for function in &definition.functions {
                        let Some(&function_decl) = annotations.decl_of.get(&function.id) else {
                            continue;
                        };
                        if scopes.decl(function_decl).is_constructor || function.name.is_empty() {
                            continue;
                        }
                        if let Some(mut ftype) =
                            function_type(function_decl, false, scopes, nodes, annotations)
                        {
                            ftype.location = location;
                            members.push(Member {
                                name: function.name.clone(),
                                ty: Type::Function(Box::new(ftype)),
                                declaration: Some(function_decl),
                            });
                        }
                    }
                }
            }
            _ => {}
        },
        _ => {}
    }
    MemberList(members)
}

/// Members every address-valued expression exposes.
fn address_members() -> Vec<Member> {
    let function = |params: Vec<Type>,
                    returns: Vec<Type>,
                    location: FunctionLocation,
                    arbitrary: bool| {
        let mut ftype = FunctionType::new(params, returns, location);
        ftype.arbitrary_parameters = arbitrary;
        Type::Function(Box::new(ftype))
    };
    vec![
        Member {
            name: "balance".to_string(),
            ty: Type::uint256(),
            declaration: None,
        },
        Member {
            name: "send".to_string(),
            ty: function(
                vec![Type::uint256()],
                vec![Type::Bool],
                FunctionLocation::Send,
                false,
            ),
            declaration: None,
        },
        Member {
            name: "transfer".to_string(),
            ty: function(vec![Type::uint256()], vec![], FunctionLocation::Transfer, false),
            declaration: None,
        },
        Member {
            name: "call".to_string(),
            ty: function(vec![], vec![Type::Bool], FunctionLocation::Bare, true),
            declaration: None,
        },
        Member {
            name: "callcode".to_string(),
            ty: function(vec![], vec![Type::Bool], FunctionLocation::BareCallCode, true),
            declaration: None,
        },
        Member {
            name: "delegatecall".to_string(),
            ty: function(
                vec![],
                vec![Type::Bool],
                FunctionLocation::BareDelegateCall,
                true,
            ),
            declaration: None,
        },
    ]
}

/// `.gas` and `.value` on callable function values; each returns a copy of
/// the function with the corresponding flag set.
fn function_members(function: &FunctionType) -> Vec<Member> {
    let mut members = Vec::new();
    let callable_externally = matches!(
        function.location,
        FunctionLocation::External
            | FunctionLocation::Creation
            | FunctionLocation::Bare
            | FunctionLocation::BareCallCode
            | FunctionLocation::BareDelegateCall
    );
    if callable_externally && !function.gas_set {
        let mut with_gas = function.clone();
        with_gas.gas_set = true;
        let setter = FunctionType::new(
            vec![Type::uint256()],
            vec![Type::Function(Box::new(with_gas))],
            FunctionLocation::SetGas,
        );
        members.push(Member {
            name: "gas".to_string(),
            ty: Type::Function(Box::new(setter)),
            declaration: None,
        });
    }
    let accepts_value = matches!(
        function.location,
        FunctionLocation::External | FunctionLocation::Creation
    );
    if accepts_value && !function.value_set {
        let mut with_value = function.clone();
        with_value.value_set = true;
        let setter = FunctionType::new(
            vec![Type::uint256()],
            vec![Type::Function(Box::new(with_value))],
            FunctionLocation::SetValue,
        );
        members.push(Member {
            name: "value".to_string(),
            ty: Type::Function(Box::new(setter)),
            declaration: None,
        });
    }
    members
}

fn magic_members(kind: MagicKind) -> Vec<Member> {
    let value = |name: &str, ty: Type| Member {
        name: name.to_string(),
        ty,
        declaration: None,
    };
    match kind {
        MagicKind::Block => vec![
            value("coinbase", Type::address()),
            value("timestamp", Type::uint256()),
            value("difficulty", Type::uint256()),
            value("number", Type::uint256()),
            value("gaslimit", Type::uint256()),
            value(
                "blockhash",
                Type::Function(Box::new(FunctionType::new(
                    vec![Type::uint256()],
                    vec![Type::FixedBytes(32)],
                    FunctionLocation::BlockHash,
                ))),
            ),
        ],
        MagicKind::Message => vec![
            value("sender", Type::address()),
            value("gas", Type::uint256()),
            value("value", Type::uint256()),
            value(
                "data",
                Type::Array(Box::new(ArrayType::bytes(DataLocation::CallData))),
            ),
            value("sig", Type::FixedBytes(4)),
        ],
        MagicKind::Transaction => vec![
            value("origin", Type::address()),
            value("gasprice", Type::uint256()),
        ],
    }
}
