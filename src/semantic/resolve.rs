//! Pass 2b: bind every identifier, user-defined type name, and modifier
//! invocation to a declaration. Member accesses are type-directed and stay
//! unresolved until the type checker.
//!
//! Each contract is traversed twice: signatures and type names first, so all
//! declaration types are known before any body is processed, then the
//! function and modifier bodies.

use crate::ast::{
    Block, ContractDefinition, Expression, ExprKind, Identifier, NodeId, Statement, StmtKind,
    StorageLocation, TypeName, TypeNameKind, VariableDeclaration,
};
use crate::errors::{Diagnostic, Fatal, FatalError};
use crate::span::Span;

use super::ids::{DeclId, ScopeId};
use super::inheritance;
use super::members;
use super::scope::{DeclKind, ScopeTable, GLOBAL_SCOPE};
use super::types::{parse_integer_literal, DataLocation, Type};
use super::{Annotations, NodeIndex};

/// Which slot a variable declaration occupies; decides its default data
/// location.
#[derive(Clone, Copy, PartialEq, Eq)]
enum VarContext {
    StateVariable,
    StructMember,
    EventParameter,
    Parameter { external: bool },
    ReturnParameter,
    Local,
}

pub fn resolve_contract(
    contract: &ContractDefinition,
    nodes: &NodeIndex,
    scopes: &mut ScopeTable,
    annotations: &mut Annotations,
    diagnostics: &mut Vec<Diagnostic>,
) -> Fatal<()> {
    let contract_decl = annotations.decl_of[&contract.id];

    // Base names (and base constructor arguments) are resolved against the
    // global scope, before the contract's own scope exists as a lookup root.
    {
        let mut resolver = Resolver {
            nodes,
            scopes,
            annotations,
            diagnostics,
            current_scope: GLOBAL_SCOPE,
            current_contract: contract_decl,
            return_function: None,
        };
        for base in &contract.bases {
            resolver.resolve_identifier(&base.base_name)?;
            for argument in &base.arguments {
                resolver.resolve_expression(argument)?;
            }
        }
    }

    inheritance::linearize(contract, scopes, annotations, diagnostics)?;
    let linearized = annotations.linearized_base_contracts[&contract_decl].clone();
    for base in &linearized[1..] {
        inheritance::import_inherited_scope(contract_decl, *base, scopes);
    }

    let contract_scope = match scopes.scope_of(contract_decl) {
        Some(scope) => scope,
        None => return Err(FatalError),
    };

    let mut resolver = Resolver {
        nodes,
        scopes,
        annotations,
        diagnostics,
        current_scope: contract_scope,
        current_contract: contract_decl,
        return_function: None,
    };

    // Phase one: type names and signatures.
    for strukt in &contract.structs {
        resolver.enter(strukt.id);
        for member in &strukt.members {
            resolver.resolve_variable(member, VarContext::StructMember)?;
        }
        resolver.current_scope = contract_scope;
    }
    for variable in &contract.state_variables {
        resolver.resolve_variable(variable, VarContext::StateVariable)?;
        if let Some(value) = &variable.value {
            resolver.resolve_expression(value)?;
        }
    }
    for event in &contract.events {
        resolver.enter(event.id);
        for param in &event.parameters {
            resolver.resolve_variable(param, VarContext::EventParameter)?;
        }
        resolver.current_scope = contract_scope;
    }
    for modifier in &contract.modifiers {
        resolver.enter(modifier.id);
        for param in &modifier.parameters {
            resolver.resolve_variable(param, VarContext::Parameter { external: false })?;
        }
        resolver.current_scope = contract_scope;
    }
    for function in &contract.functions {
        resolver.enter(function.id);
        let external = function.visibility == crate::ast::Visibility::External;
        for param in &function.parameters {
            resolver.resolve_variable(param, VarContext::Parameter { external })?;
        }
        for param in &function.return_parameters {
            resolver.resolve_variable(param, VarContext::ReturnParameter)?;
        }
        resolver.current_scope = contract_scope;
    }

    // Phase two: bodies.
    for modifier in &contract.modifiers {
        resolver.enter(modifier.id);
        resolver.return_function = None;
        resolver.resolve_block(&modifier.body)?;
        resolver.current_scope = contract_scope;
    }
    for function in &contract.functions {
        resolver.enter(function.id);
        resolver.return_function = annotations_decl(resolver.annotations, function.id);
        for invocation in &function.modifiers {
            resolver.resolve_identifier(&invocation.name)?;
            for argument in &invocation.arguments {
                resolver.resolve_expression(argument)?;
            }
        }
        if let Some(body) = &function.body {
            resolver.resolve_block(body)?;
        }
        resolver.return_function = None;
        resolver.current_scope = contract_scope;
    }

    Ok(())
}

fn annotations_decl(annotations: &Annotations, node: NodeId) -> Option<DeclId> {
    annotations.decl_of.get(&node).copied()
}

struct Resolver<'a, 'ast> {
    nodes: &'a NodeIndex<'ast>,
    scopes: &'a ScopeTable,
    annotations: &'a mut Annotations,
    diagnostics: &'a mut Vec<Diagnostic>,
    current_scope: ScopeId,
    current_contract: DeclId,
    /// Function whose return parameters apply to `return` statements; `None`
    /// inside modifiers.
    return_function: Option<DeclId>,
}

impl Resolver<'_, '_> {
    /// Switch into the scope opened by the declaration behind `node`.
    fn enter(&mut self, node: NodeId) {
        if let Some(decl) = self.annotations.decl_of.get(&node) {
            if let Some(scope) = self.scopes.scope_of(*decl) {
                self.current_scope = scope;
            }
        }
    }

    fn resolve_identifier(&mut self, identifier: &Identifier) -> Fatal<()> {
        self.resolve_name_at(identifier.id, &identifier.name, identifier.span)
    }

    fn resolve_name_at(&mut self, node: NodeId, name: &str, span: Span) -> Fatal<()> {
        let candidates = self.scopes.resolve_name(self.current_scope, name, true);
        if candidates.is_empty() {
            self.diagnostics
                .push(Diagnostic::declaration_error(span, "Undeclared identifier."));
            return Err(FatalError);
        }
        self.annotations
            .contract_scope
            .insert(node, self.current_contract);
        if candidates.len() == 1 {
            self.annotations
                .referenced_declaration
                .insert(node, candidates[0]);
            return Ok(());
        }
        let cleaned = self.cleaned_declarations(&candidates, span)?;
        if cleaned.len() == 1 {
            self.annotations.referenced_declaration.insert(node, cleaned[0]);
        } else {
            self.annotations.overloaded_declarations.insert(node, cleaned);
        }
        Ok(())
    }

    /// Collapse an overload set to one representative per argument-type
    /// equivalence class, keeping the first (most derived) of each class.
    fn cleaned_declarations(&mut self, candidates: &[DeclId], span: Span) -> Fatal<Vec<DeclId>> {
        if !candidates
            .iter()
            .all(|decl| self.scopes.decl(*decl).kind == DeclKind::Function)
        {
            return Ok(candidates.to_vec());
        }
        let mut unique: Vec<(DeclId, super::types::FunctionType)> = Vec::new();
        for &candidate in candidates {
            let function_type = match members::function_type(
                candidate,
                false,
                self.scopes,
                self.nodes,
                self.annotations,
            ) {
                Some(function_type) => function_type,
                None => {
                    self.diagnostics.push(Diagnostic::declaration_error(
                        span,
                        "Function type can not be used in this context.",
                    ));
                    return Err(FatalError);
                }
            };
            if !unique
                .iter()
                .any(|(_, existing)| existing.has_equal_argument_types(&function_type))
            {
                unique.push((candidate, function_type));
            }
        }
        Ok(unique.into_iter().map(|(decl, _)| decl).collect())
    }

    /// Turn a type name into a type, binding user-defined names on the way.
    fn resolve_type_name(&mut self, type_name: &TypeName) -> Fatal<Type> {
        match &type_name.kind {
            TypeNameKind::Elementary(elementary) => Ok(Type::from_elementary(*elementary)),
            TypeNameKind::UserDefined(path) => {
                let decl = match self.scopes.resolve_path(self.current_scope, path) {
                    Some(decl) => decl,
                    None => {
                        self.diagnostics.push(Diagnostic::declaration_error(
                            type_name.span,
                            "Identifier not found or not unique.",
                        ));
                        return Err(FatalError);
                    }
                };
                self.annotations
                    .referenced_declaration
                    .insert(type_name.id, decl);
                match self.scopes.decl(decl).kind {
                    DeclKind::Contract => Ok(Type::Contract(decl)),
                    DeclKind::Struct => Ok(Type::Struct {
                        decl,
                        location: DataLocation::Storage,
                    }),
                    DeclKind::Enum => Ok(Type::Enum(decl)),
                    _ => {
                        self.diagnostics.push(Diagnostic::type_error(
                            type_name.span,
                            "Name has to refer to a struct, enum or contract.",
                        ));
                        Err(FatalError)
                    }
                }
            }
            TypeNameKind::Mapping { key, value } => {
                let key_type = self.resolve_type_name(key)?;
                let value_type = self.resolve_type_name(value)?;
                Ok(Type::Mapping {
                    key: Box::new(key_type),
                    value: Box::new(value_type),
                })
            }
            TypeNameKind::Array { base, length } => {
                let base_type = self.resolve_type_name(base)?;
                let length_value = match length {
                    None => None,
                    Some(expression) => match &expression.kind {
                        ExprKind::Literal(crate::ast::Literal::Number(text)) => {
                            match parse_integer_literal(text).and_then(|v| v.to_biguint()) {
                                Some(value) => Some(value),
                                None => {
                                    self.diagnostics.push(Diagnostic::type_error(
                                        expression.span,
                                        "Invalid array length.",
                                    ));
                                    return Err(FatalError);
                                }
                            }
                        }
                        _ => {
                            self.diagnostics.push(Diagnostic::type_error(
                                expression.span,
                                "Invalid array length.",
                            ));
                            return Err(FatalError);
                        }
                    },
                };
                Ok(Type::Array(Box::new(super::types::ArrayType::new(
                    DataLocation::Storage,
                    base_type,
                    length_value,
                ))))
            }
        }
    }

    /// Resolve a variable's declared type and record it with the data
    /// location its context dictates. Untyped `var` declarations stay
    /// unannotated until the checker infers them.
    fn resolve_variable(
        &mut self,
        variable: &VariableDeclaration,
        context: VarContext,
    ) -> Fatal<()> {
        let Some(type_name) = &variable.type_name else {
            return Ok(());
        };
        let resolved = self.resolve_type_name(type_name)?;
        let location = match context {
            VarContext::StateVariable | VarContext::StructMember => DataLocation::Storage,
            VarContext::EventParameter | VarContext::ReturnParameter => DataLocation::Memory,
            VarContext::Parameter { external: true } => DataLocation::CallData,
            VarContext::Parameter { external: false } => DataLocation::Memory,
            VarContext::Local => match variable.location {
                Some(StorageLocation::Memory) => DataLocation::Memory,
                // Reference-typed locals default to storage pointers.
                Some(StorageLocation::Storage) | None => DataLocation::Storage,
            },
        };
        let located = resolved.copy_for_location_if_reference(location);
        self.annotations.types.insert(variable.id, located);
        Ok(())
    }

    fn resolve_block(&mut self, block: &Block) -> Fatal<()> {
        for statement in &block.statements {
            self.resolve_statement(statement)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &Statement) -> Fatal<()> {
        match &statement.kind {
            StmtKind::Block(block) => self.resolve_block(block),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition)?;
                self.resolve_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                self.resolve_expression(condition)?;
                self.resolve_statement(body)
            }
            StmtKind::For {
                init,
                condition,
                loop_expr,
                body,
            } => {
                if let Some(init) = init {
                    self.resolve_statement(init)?;
                }
                if let Some(condition) = condition {
                    self.resolve_expression(condition)?;
                }
                if let Some(loop_expr) = loop_expr {
                    self.resolve_expression(loop_expr)?;
                }
                self.resolve_statement(body)
            }
            StmtKind::Continue | StmtKind::Break | StmtKind::Placeholder => Ok(()),
            StmtKind::Return(expression) => {
                if let Some(function) = self.return_function {
                    self.annotations
                        .function_return_parameters
                        .insert(statement.id, function);
                }
                if let Some(expression) = expression {
                    self.resolve_expression(expression)?;
                }
                Ok(())
            }
            StmtKind::VariableDeclaration(variable) => {
                self.resolve_variable(variable, VarContext::Local)?;
                if let Some(value) = &variable.value {
                    self.resolve_expression(value)?;
                }
                Ok(())
            }
            StmtKind::Expression(expression) => self.resolve_expression(expression),
        }
    }

    fn resolve_expression(&mut self, expression: &Expression) -> Fatal<()> {
        match &expression.kind {
            ExprKind::Identifier(name) => {
                self.resolve_name_at(expression.id, name, expression.span)
            }
            ExprKind::Literal(_) | ExprKind::ElementaryTypeName(_) => Ok(()),
            ExprKind::Unary { sub, .. } => self.resolve_expression(sub),
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expression(left)?;
                self.resolve_expression(right)
            }
            ExprKind::Assignment { lhs, rhs, .. } => {
                self.resolve_expression(lhs)?;
                self.resolve_expression(rhs)
            }
            ExprKind::FunctionCall {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee)?;
                for argument in arguments {
                    self.resolve_expression(argument)?;
                }
                Ok(())
            }
            ExprKind::New { contract_name } => self.resolve_identifier(contract_name),
            // Member lookup is type-directed; only the base is resolvable
            // here.
            ExprKind::MemberAccess { expr, .. } => self.resolve_expression(expr),
            ExprKind::IndexAccess { base, index } => {
                self.resolve_expression(base)?;
                if let Some(index) = index {
                    self.resolve_expression(index)?;
                }
                Ok(())
            }
        }
    }
}
