pub mod globals;
pub mod ids;
pub mod inheritance;
pub mod members;
pub mod registration;
pub mod resolve;
pub mod scope;
pub mod typecheck;
pub mod types;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    Block, ContractDefinition, EnumDefinition, EnumValue, EventDefinition, FunctionDefinition,
    ModifierDefinition, NodeId, SourceUnit, Statement, StmtKind, StructDefinition,
    VariableDeclaration,
};
use crate::errors::{contains_error, Diagnostic};
use ids::DeclId;
use scope::ScopeTable;
use types::Type;

/// A typed borrow of a declaration node, for id-based lookup.
#[derive(Clone, Copy)]
pub enum NodeRef<'ast> {
    Contract(&'ast ContractDefinition),
    Struct(&'ast StructDefinition),
    Enum(&'ast EnumDefinition),
    EnumValue(&'ast EnumValue),
    Function(&'ast FunctionDefinition),
    Modifier(&'ast ModifierDefinition),
    Event(&'ast EventDefinition),
    Variable(&'ast VariableDeclaration),
}

/// Maps declaration node ids back to their AST nodes. The AST is the arena;
/// this index is the only way analysis code reaches a node from a `DeclId`.
pub struct NodeIndex<'ast> {
    map: FxHashMap<NodeId, NodeRef<'ast>>,
}

impl<'ast> NodeIndex<'ast> {
    pub fn build(unit: &'ast SourceUnit) -> Self {
        let mut map = FxHashMap::default();
        for contract in &unit.contracts {
            map.insert(contract.id, NodeRef::Contract(contract));
            for strukt in &contract.structs {
                map.insert(strukt.id, NodeRef::Struct(strukt));
                for member in &strukt.members {
                    map.insert(member.id, NodeRef::Variable(member));
                }
            }
            for en in &contract.enums {
                map.insert(en.id, NodeRef::Enum(en));
                for value in &en.values {
                    map.insert(value.id, NodeRef::EnumValue(value));
                }
            }
            for variable in &contract.state_variables {
                map.insert(variable.id, NodeRef::Variable(variable));
            }
            for event in &contract.events {
                map.insert(event.id, NodeRef::Event(event));
                for param in &event.parameters {
                    map.insert(param.id, NodeRef::Variable(param));
                }
            }
            for modifier in &contract.modifiers {
                map.insert(modifier.id, NodeRef::Modifier(modifier));
                for param in &modifier.parameters {
                    map.insert(param.id, NodeRef::Variable(param));
                }
                index_block(&modifier.body, &mut map);
            }
            for function in &contract.functions {
                map.insert(function.id, NodeRef::Function(function));
                for param in function
                    .parameters
                    .iter()
                    .chain(function.return_parameters.iter())
                {
                    map.insert(param.id, NodeRef::Variable(param));
                }
                if let Some(body) = &function.body {
                    index_block(body, &mut map);
                }
            }
        }
        Self { map }
    }

    pub fn get(&self, id: NodeId) -> NodeRef<'ast> {
        self.map[&id]
    }

    pub fn contract(&self, id: NodeId) -> &'ast ContractDefinition {
        match self.map[&id] {
            NodeRef::Contract(node) => node,
            _ => unreachable!("node {id:?} is not a contract"),
        }
    }

    pub fn strukt(&self, id: NodeId) -> &'ast StructDefinition {
        match self.map[&id] {
            NodeRef::Struct(node) => node,
            _ => unreachable!("node {id:?} is not a struct"),
        }
    }

    pub fn function(&self, id: NodeId) -> &'ast FunctionDefinition {
        match self.map[&id] {
            NodeRef::Function(node) => node,
            _ => unreachable!("node {id:?} is not a function"),
        }
    }

    pub fn modifier(&self, id: NodeId) -> &'ast ModifierDefinition {
        match self.map[&id] {
            NodeRef::Modifier(node) => node,
            _ => unreachable!("node {id:?} is not a modifier"),
        }
    }

    pub fn event(&self, id: NodeId) -> &'ast EventDefinition {
        match self.map[&id] {
            NodeRef::Event(node) => node,
            _ => unreachable!("node {id:?} is not an event"),
        }
    }

    pub fn variable(&self, id: NodeId) -> &'ast VariableDeclaration {
        match self.map[&id] {
            NodeRef::Variable(node) => node,
            _ => unreachable!("node {id:?} is not a variable"),
        }
    }
}

/// Index local variable declarations inside a body.
fn index_block<'ast>(block: &'ast Block, map: &mut FxHashMap<NodeId, NodeRef<'ast>>) {
    for statement in &block.statements {
        index_statement(statement, map);
    }
}

fn index_statement<'ast>(statement: &'ast Statement, map: &mut FxHashMap<NodeId, NodeRef<'ast>>) {
    match &statement.kind {
        StmtKind::Block(block) => index_block(block, map),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            index_statement(then_branch, map);
            if let Some(else_branch) = else_branch {
                index_statement(else_branch, map);
            }
        }
        StmtKind::While { body, .. } => index_statement(body, map),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                index_statement(init, map);
            }
            index_statement(body, map);
        }
        StmtKind::VariableDeclaration(variable) => {
            map.insert(variable.id, NodeRef::Variable(variable));
        }
        _ => {}
    }
}

/// All annotations produced by the passes, keyed by node or declaration id.
/// Each entry is written at most once per pass and read-only afterwards.
#[derive(Default)]
pub struct Annotations {
    /// Expression types, plus the declared/inferred type of each variable
    /// declaration (keyed by the declaration's node id).
    pub types: FxHashMap<NodeId, Type>,
    pub referenced_declaration: FxHashMap<NodeId, DeclId>,
    /// Candidate sets recorded for overloaded names; pruned by the checker.
    pub overloaded_declarations: FxHashMap<NodeId, Vec<DeclId>>,
    /// Argument types seen at a call site, stored on the callee node.
    pub argument_types: FxHashMap<NodeId, Vec<Type>>,
    pub is_lvalue: FxHashSet<NodeId>,
    pub lvalue_requested: FxHashSet<NodeId>,
    pub is_struct_constructor_call: FxHashSet<NodeId>,
    pub is_type_conversion: FxHashSet<NodeId>,
    pub common_type: FxHashMap<NodeId, Type>,
    /// Return statement -> the function whose return parameters apply.
    pub function_return_parameters: FxHashMap<NodeId, DeclId>,
    /// Identifier -> the contract inside which it was resolved.
    pub contract_scope: FxHashMap<NodeId, DeclId>,
    /// Declaration node -> its entry in the declaration table.
    pub decl_of: FxHashMap<NodeId, DeclId>,
    /// Types of the seeded global declarations.
    pub builtin_types: FxHashMap<DeclId, Type>,
    /// Function -> local variables declared in its body, in source order.
    pub function_locals: FxHashMap<DeclId, Vec<DeclId>>,
    pub canonical_name: FxHashMap<DeclId, String>,
    /// Derived-to-base, starting with the contract itself.
    pub linearized_base_contracts: FxHashMap<DeclId, Vec<DeclId>>,
    pub contract_dependencies: FxHashMap<DeclId, FxHashSet<DeclId>>,
    pub is_fully_implemented: FxHashMap<DeclId, bool>,
}

/// The result of semantic analysis.
pub struct AnalysisResult {
    pub scopes: ScopeTable,
    pub annotations: Annotations,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    /// Analysis succeeded iff no non-warning diagnostic was recorded.
    pub fn succeeded(&self) -> bool {
        !contains_error(&self.diagnostics)
    }
}

/// Run all semantic analysis passes on a parsed source unit.
pub fn analyze(unit: &SourceUnit) -> AnalysisResult {
    let nodes = NodeIndex::build(unit);
    let mut scopes = ScopeTable::new();
    let mut annotations = Annotations::default();
    let mut diagnostics = Vec::new();

    globals::seed(&mut scopes, &mut annotations);

    // Pass 1: build the scope tree and register every declaration.
    if registration::register_declarations(unit, &mut scopes, &mut annotations, &mut diagnostics)
        .is_err()
    {
        return AnalysisResult {
            scopes,
            annotations,
            diagnostics,
        };
    }

    // Pass 2: per contract, linearize bases, import inherited scope, and
    // bind every reference. A fatal error abandons the contract and
    // continues with the next sibling.
    let mut failed: FxHashSet<NodeId> = FxHashSet::default();
    for contract in &unit.contracts {
        if resolve::resolve_contract(contract, &nodes, &mut scopes, &mut annotations, &mut diagnostics)
            .is_err()
        {
            failed.insert(contract.id);
        }
    }

    // Pass 3: type checking, skipping contracts whose resolution bailed.
    for contract in &unit.contracts {
        if failed.contains(&contract.id) {
            continue;
        }
        let _ = typecheck::check_contract(contract, &nodes, &scopes, &mut annotations, &mut diagnostics);
    }

    AnalysisResult {
        scopes,
        annotations,
        diagnostics,
    }
}
