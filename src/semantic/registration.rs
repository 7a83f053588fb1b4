//! Pass 1: walk the AST once, open a scope per contract, struct, enum,
//! event, function, and modifier, and register every declaration in its
//! enclosing scope.

use crate::ast::{
    Block, ContractDefinition, EnumDefinition, EventDefinition, FunctionDefinition,
    ModifierDefinition, NodeId, SourceUnit, Statement, StmtKind, StructDefinition,
    VariableDeclaration, Visibility,
};
use crate::errors::{Diagnostic, Fatal};
use crate::span::Span;

use super::ids::{DeclId, ScopeId};
use super::scope::{DeclInfo, DeclKind, ScopeTable, GLOBAL_SCOPE};
use super::Annotations;

pub fn register_declarations(
    unit: &SourceUnit,
    scopes: &mut ScopeTable,
    annotations: &mut Annotations,
    diagnostics: &mut Vec<Diagnostic>,
) -> Fatal<()> {
    let mut registrar = Registrar {
        scopes,
        annotations,
        diagnostics,
        current_scope: GLOBAL_SCOPE,
        current_function: None,
    };
    for contract in &unit.contracts {
        registrar.register_contract(contract)?;
    }
    Ok(())
}

struct Registrar<'a> {
    scopes: &'a mut ScopeTable,
    annotations: &'a mut Annotations,
    diagnostics: &'a mut Vec<Diagnostic>,
    current_scope: ScopeId,
    current_function: Option<DeclId>,
}

impl Registrar<'_> {
    fn declare(
        &mut self,
        node: NodeId,
        name: &str,
        kind: DeclKind,
        visibility: Visibility,
        span: Span,
        is_constructor: bool,
    ) -> DeclId {
        let id = self.scopes.add_decl(DeclInfo {
            name: name.to_string(),
            kind,
            node,
            visibility,
            span,
            scope: Some(self.current_scope),
            is_constructor,
        });
        if let Err(conflicting) = self.scopes.register(self.current_scope, id) {
            let previous = self.scopes.decl(conflicting).span;
            // The error attaches to whichever declaration comes later in the
            // source; the secondary note points at the earlier one.
            let (first, second) = if span.start < previous.start {
                (span, previous)
            } else {
                (previous, span)
            };
            self.diagnostics.push(
                Diagnostic::declaration_error(second, "Identifier already declared.")
                    .with_secondary(first, "The previous declaration is here:"),
            );
        }
        self.annotations.decl_of.insert(node, id);
        id
    }

    fn enter_scope(&mut self, owner: DeclId) {
        self.current_scope = self.scopes.create_scope(owner, self.current_scope);
    }

    fn close_scope(&mut self) {
        if let Some(parent) = self.scopes.parent(self.current_scope) {
            self.current_scope = parent;
        }
    }

    /// Dotted concatenation of the enclosing declarations' names,
    /// outermost first.
    fn current_canonical_name(&self) -> String {
        let mut parts = Vec::new();
        let mut scope = Some(self.current_scope);
        while let Some(sid) = scope {
            if let Some(owner) = self.scopes.owner(sid) {
                parts.push(self.scopes.decl(owner).name.clone());
            }
            scope = self.scopes.parent(sid);
        }
        parts.reverse();
        parts.join(".")
    }

    fn register_contract(&mut self, contract: &ContractDefinition) -> Fatal<()> {
        let decl = self.declare(
            contract.id,
            &contract.name,
            DeclKind::Contract,
            Visibility::Public,
            contract.span,
            false,
        );
        self.enter_scope(decl);
        let canonical = self.current_canonical_name();
        self.annotations.canonical_name.insert(decl, canonical);

        for strukt in &contract.structs {
            self.register_struct(strukt);
        }
        for en in &contract.enums {
            self.register_enum(en);
        }
        for variable in &contract.state_variables {
            self.declare(
                variable.id,
                &variable.name,
                DeclKind::StateVariable,
                variable.visibility,
                variable.span,
                false,
            );
        }
        for event in &contract.events {
            self.register_event(event);
        }
        for modifier in &contract.modifiers {
            self.register_modifier(modifier);
        }
        for function in &contract.functions {
            self.register_function(function, &contract.name);
        }

        self.close_scope();
        Ok(())
    }

    fn register_struct(&mut self, strukt: &StructDefinition) {
        let decl = self.declare(
            strukt.id,
            &strukt.name,
            DeclKind::Struct,
            Visibility::Public,
            strukt.span,
            false,
        );
        self.enter_scope(decl);
        let canonical = self.current_canonical_name();
        self.annotations.canonical_name.insert(decl, canonical);
        for member in &strukt.members {
            self.declare(
                member.id,
                &member.name,
                DeclKind::LocalVariable,
                Visibility::Internal,
                member.span,
                false,
            );
        }
        self.close_scope();
    }

    fn register_enum(&mut self, en: &EnumDefinition) {
        let decl = self.declare(
            en.id,
            &en.name,
            DeclKind::Enum,
            Visibility::Public,
            en.span,
            false,
        );
        self.enter_scope(decl);
        let canonical = self.current_canonical_name();
        self.annotations.canonical_name.insert(decl, canonical);
        for value in &en.values {
            self.declare(
                value.id,
                &value.name,
                DeclKind::EnumValue,
                Visibility::Public,
                value.span,
                false,
            );
        }
        self.close_scope();
    }

    fn register_event(&mut self, event: &EventDefinition) {
        let decl = self.declare(
            event.id,
            &event.name,
            DeclKind::Event,
            Visibility::Public,
            event.span,
            false,
        );
        self.enter_scope(decl);
        for param in &event.parameters {
            self.declare(
                param.id,
                &param.name,
                DeclKind::Parameter,
                Visibility::Internal,
                param.span,
                false,
            );
        }
        self.close_scope();
    }

    fn register_modifier(&mut self, modifier: &ModifierDefinition) {
        let decl = self.declare(
            modifier.id,
            &modifier.name,
            DeclKind::Modifier,
            Visibility::Internal,
            modifier.span,
            false,
        );
        self.enter_scope(decl);
        self.current_function = Some(decl);
        for param in &modifier.parameters {
            self.declare(
                param.id,
                &param.name,
                DeclKind::Parameter,
                Visibility::Internal,
                param.span,
                false,
            );
        }
        self.register_block(&modifier.body);
        self.current_function = None;
        self.close_scope();
    }

    fn register_function(&mut self, function: &FunctionDefinition, contract_name: &str) {
        let is_constructor = function.name == contract_name;
        let decl = self.declare(
            function.id,
            &function.name,
            DeclKind::Function,
            function.visibility,
            function.span,
            is_constructor,
        );
        self.enter_scope(decl);
        self.current_function = Some(decl);
        for param in function
            .parameters
            .iter()
            .chain(function.return_parameters.iter())
        {
            self.declare(
                param.id,
                &param.name,
                DeclKind::Parameter,
                Visibility::Internal,
                param.span,
                false,
            );
        }
        if let Some(body) = &function.body {
            self.register_block(body);
        }
        self.current_function = None;
        self.close_scope();
    }

    /// Locals are function-scoped (JavaScript-style): every declaration in
    /// the body lands in the function's scope, regardless of block nesting.
    fn register_block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.register_statement(statement);
        }
    }

    fn register_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StmtKind::Block(block) => self.register_block(block),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.register_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.register_statement(else_branch);
                }
            }
            StmtKind::While { body, .. } => self.register_statement(body),
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.register_statement(init);
                }
                self.register_statement(body);
            }
            StmtKind::VariableDeclaration(variable) => {
                self.register_local(variable);
            }
            _ => {}
        }
    }

    fn register_local(&mut self, variable: &VariableDeclaration) {
        let decl = self.declare(
            variable.id,
            &variable.name,
            DeclKind::LocalVariable,
            Visibility::Internal,
            variable.span,
            false,
        );
        if let Some(function) = self.current_function {
            self.annotations
                .function_locals
                .entry(function)
                .or_default()
                .push(decl);
        }
    }
}
