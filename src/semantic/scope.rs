use rustc_hash::FxHashMap;

use crate::ast::{NodeId, Visibility};
use crate::span::Span;

use super::ids::{DeclId, ScopeId};

/// What a registered declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Contract,
    Struct,
    Enum,
    EnumValue,
    Function,
    Modifier,
    Event,
    StateVariable,
    LocalVariable,
    Parameter,
    /// Seeded global (magic variable or builtin function).
    Builtin,
}

impl DeclKind {
    /// Whether declarations of this kind open a nested scope.
    pub fn opens_scope(self) -> bool {
        matches!(
            self,
            DeclKind::Contract
                | DeclKind::Struct
                | DeclKind::Enum
                | DeclKind::Function
                | DeclKind::Modifier
                | DeclKind::Event
        )
    }
}

/// Metadata for a declaration. The AST node itself stays in the tree; this
/// record carries what the scope machinery needs without chasing the node.
#[derive(Debug, Clone)]
pub struct DeclInfo {
    pub name: String,
    pub kind: DeclKind,
    pub node: NodeId,
    pub visibility: Visibility,
    pub span: Span,
    /// Scope this declaration was registered into (`None` for globals).
    pub scope: Option<ScopeId>,
    /// Set during registration for functions named after their contract.
    pub is_constructor: bool,
}

impl DeclInfo {
    /// External declarations are not reachable by unqualified name from
    /// inside the contract; they live in the invisible bucket.
    pub fn is_visible_in_contract(&self) -> bool {
        self.visibility != Visibility::External
    }

    pub fn is_visible_in_derived_contracts(&self) -> bool {
        self.is_visible_in_contract()
            && self.visibility >= Visibility::Internal
            && !self.is_constructor
    }
}

/// A lexical scope: name buckets ordered by registration, so overload sets
/// keep the derived-before-base order the importer establishes.
pub struct Scope {
    pub owner: Option<DeclId>,
    pub parent: Option<ScopeId>,
    declarations: FxHashMap<String, Vec<DeclId>>,
    invisible: FxHashMap<String, Vec<DeclId>>,
}

/// The scope tree plus the declaration arena it indexes into.
pub struct ScopeTable {
    scopes: Vec<Scope>,
    decls: Vec<DeclInfo>,
    by_owner: FxHashMap<DeclId, ScopeId>,
}

pub const GLOBAL_SCOPE: ScopeId = ScopeId(0);

impl ScopeTable {
    pub fn new() -> Self {
        let global = Scope {
            owner: None,
            parent: None,
            declarations: FxHashMap::default(),
            invisible: FxHashMap::default(),
        };
        Self {
            scopes: vec![global],
            decls: Vec::new(),
            by_owner: FxHashMap::default(),
        }
    }

    pub fn add_decl(&mut self, info: DeclInfo) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(info);
        id
    }

    pub fn decl(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut DeclInfo {
        &mut self.decls[id.0 as usize]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Open the scope owned by `owner` under `parent`.
    pub fn create_scope(&mut self, owner: DeclId, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            owner: Some(owner),
            parent: Some(parent),
            declarations: FxHashMap::default(),
            invisible: FxHashMap::default(),
        });
        self.by_owner.insert(owner, id);
        id
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.0 as usize].parent
    }

    pub fn owner(&self, id: ScopeId) -> Option<DeclId> {
        self.scopes[id.0 as usize].owner
    }

    /// The scope a declaration opened, if it opened one.
    pub fn scope_of(&self, owner: DeclId) -> Option<ScopeId> {
        self.by_owner.get(&owner).copied()
    }

    /// Register `decl` in `scope`. On a name conflict, returns the
    /// earliest-registered conflicting declaration.
    pub fn register(&mut self, scope: ScopeId, decl: DeclId) -> Result<(), DeclId> {
        let info = self.decls[decl.0 as usize].clone();
        if info.name.is_empty() {
            // The fallback function has no name to register.
            return Ok(());
        }
        if !info.is_visible_in_contract() {
            let bucket = self.scopes[scope.0 as usize]
                .invisible
                .entry(info.name)
                .or_default();
            if !bucket.contains(&decl) {
                bucket.push(decl);
            }
            return Ok(());
        }

        let compatible = {
            let existing = self.scopes[scope.0 as usize].declarations.get(&info.name);
            match existing {
                None => true,
                Some(bucket) => match info.kind {
                    DeclKind::Function => bucket
                        .iter()
                        .all(|d| self.decls[d.0 as usize].kind == DeclKind::Function),
                    DeclKind::Modifier => bucket
                        .iter()
                        .all(|d| self.decls[d.0 as usize].kind == DeclKind::Modifier),
                    _ => bucket.is_empty(),
                },
            }
        };
        if !compatible {
            let first = self.scopes[scope.0 as usize].declarations[&info.name][0];
            return Err(first);
        }
        let bucket = self.scopes[scope.0 as usize]
            .declarations
            .entry(info.name)
            .or_default();
        if !bucket.contains(&decl) {
            bucket.push(decl);
        }
        Ok(())
    }

    /// All declarations bound to `name`, walking the parent chain when
    /// `recursive` and stopping at the first scope that defines it.
    pub fn resolve_name(&self, scope: ScopeId, name: &str, recursive: bool) -> Vec<DeclId> {
        let mut current = Some(scope);
        while let Some(sid) = current {
            let s = &self.scopes[sid.0 as usize];
            if let Some(bucket) = s.declarations.get(name) {
                return bucket.clone();
            }
            if !recursive {
                break;
            }
            current = s.parent;
        }
        Vec::new()
    }

    /// Resolve a dotted path: the first segment recursively, every further
    /// segment inside the scope opened by the previous result. Returns the
    /// final declaration only when each step is unique.
    pub fn resolve_path(&self, scope: ScopeId, path: &[String]) -> Option<DeclId> {
        let mut candidates = self.resolve_name(scope, &path[0], true);
        for segment in &path[1..] {
            if candidates.len() != 1 {
                return None;
            }
            let inner = self.scope_of(candidates[0])?;
            candidates = self.resolve_name(inner, segment, false);
        }
        if candidates.len() == 1 {
            Some(candidates[0])
        } else {
            None
        }
    }

    /// Visible name buckets of a scope, for the inherited-scope import.
    pub fn declarations_in(&self, scope: ScopeId) -> Vec<(String, Vec<DeclId>)> {
        let mut entries: Vec<(String, Vec<DeclId>)> = self.scopes[scope.0 as usize]
            .declarations
            .iter()
            .map(|(name, bucket)| (name.clone(), bucket.clone()))
            .collect();
        // Hash-map iteration order must not leak into diagnostics ordering.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, kind: DeclKind) -> DeclInfo {
        DeclInfo {
            name: name.into(),
            kind,
            node: NodeId(0),
            visibility: Visibility::Public,
            span: Span::dummy(),
            scope: None,
            is_constructor: false,
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut table = ScopeTable::new();
        let id = table.add_decl(decl("x", DeclKind::StateVariable));
        table.register(GLOBAL_SCOPE, id).unwrap();
        assert_eq!(table.resolve_name(GLOBAL_SCOPE, "x", false), vec![id]);
        assert!(table.resolve_name(GLOBAL_SCOPE, "y", false).is_empty());
    }

    #[test]
    fn functions_overload() {
        let mut table = ScopeTable::new();
        let a = table.add_decl(decl("f", DeclKind::Function));
        let b = table.add_decl(decl("f", DeclKind::Function));
        table.register(GLOBAL_SCOPE, a).unwrap();
        table.register(GLOBAL_SCOPE, b).unwrap();
        assert_eq!(table.resolve_name(GLOBAL_SCOPE, "f", false), vec![a, b]);
    }

    #[test]
    fn variable_conflicts_with_function() {
        let mut table = ScopeTable::new();
        let f = table.add_decl(decl("f", DeclKind::Function));
        let v = table.add_decl(decl("f", DeclKind::StateVariable));
        table.register(GLOBAL_SCOPE, f).unwrap();
        assert_eq!(table.register(GLOBAL_SCOPE, v), Err(f));
    }

    #[test]
    fn external_declaration_is_invisible() {
        let mut table = ScopeTable::new();
        let mut info = decl("f", DeclKind::Function);
        info.visibility = Visibility::External;
        let f = table.add_decl(info);
        table.register(GLOBAL_SCOPE, f).unwrap();
        assert!(table.resolve_name(GLOBAL_SCOPE, "f", false).is_empty());
    }

    #[test]
    fn recursive_lookup_stops_at_first_match() {
        let mut table = ScopeTable::new();
        let outer = table.add_decl(decl("x", DeclKind::StateVariable));
        table.register(GLOBAL_SCOPE, outer).unwrap();

        let owner = table.add_decl(decl("C", DeclKind::Contract));
        table.register(GLOBAL_SCOPE, owner).unwrap();
        let inner_scope = table.create_scope(owner, GLOBAL_SCOPE);

        // Outer x is found through the parent chain.
        assert_eq!(table.resolve_name(inner_scope, "x", true), vec![outer]);

        let inner = table.add_decl(decl("x", DeclKind::LocalVariable));
        table.register(inner_scope, inner).unwrap();
        assert_eq!(table.resolve_name(inner_scope, "x", true), vec![inner]);
        // Non-recursive lookup sees only the scope itself.
        assert_eq!(table.resolve_name(GLOBAL_SCOPE, "x", false), vec![outer]);
    }

    #[test]
    fn path_resolution() {
        let mut table = ScopeTable::new();
        let contract = table.add_decl(decl("C", DeclKind::Contract));
        table.register(GLOBAL_SCOPE, contract).unwrap();
        let contract_scope = table.create_scope(contract, GLOBAL_SCOPE);
        let strukt = table.add_decl(decl("S", DeclKind::Struct));
        table.register(contract_scope, strukt).unwrap();

        let path = vec!["C".to_string(), "S".to_string()];
        assert_eq!(table.resolve_path(GLOBAL_SCOPE, &path), Some(strukt));
        let missing = vec!["C".to_string(), "T".to_string()];
        assert_eq!(table.resolve_path(GLOBAL_SCOPE, &missing), None);
    }
}
