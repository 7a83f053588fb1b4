//! Pass 3: assign a type to every expression, run overload resolution at
//! call sites, validate statements, and perform the whole-contract checks
//! (duplicates, overrides, abstractness, external clashes, library and
//! struct rules).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    AssignmentOp, BinaryOp, Block, ContractDefinition, EventDefinition, Expression, ExprKind,
    FunctionDefinition, InheritanceSpecifier, Literal, ModifierDefinition, ModifierInvocation,
    Statement, StmtKind, UnaryOp, VariableDeclaration, Visibility,
};
use crate::errors::{Diagnostic, Fatal, FatalError};
use crate::span::Span;

use super::ids::DeclId;
use super::members;
use super::scope::{DeclKind, ScopeTable};
use super::types::{
    parse_integer_literal, smallest_integer_type, DataLocation, FunctionType, Type, TypeEnv,
};
use super::{Annotations, NodeIndex};

pub fn check_contract<'ast>(
    contract: &'ast ContractDefinition,
    nodes: &NodeIndex<'ast>,
    scopes: &ScopeTable,
    annotations: &mut Annotations,
    diagnostics: &mut Vec<Diagnostic>,
) -> Fatal<()> {
    let contract_decl = annotations.decl_of[&contract.id];
    let linearized = annotations.linearized_base_contracts.clone();
    let mut checker = TypeChecker {
        nodes,
        scopes,
        annotations,
        diagnostics,
        linearized,
        current_contract: contract_decl,
    };
    checker.check(contract)
}

struct TypeChecker<'a, 'ast> {
    nodes: &'a NodeIndex<'ast>,
    scopes: &'a ScopeTable,
    annotations: &'a mut Annotations,
    diagnostics: &'a mut Vec<Diagnostic>,
    /// Owned copy so a `TypeEnv` can be built while annotations are mutable.
    linearized: FxHashMap<DeclId, Vec<DeclId>>,
    current_contract: DeclId,
}

impl<'ast> TypeChecker<'_, 'ast> {
    fn env(&self) -> TypeEnv<'_> {
        TypeEnv::new(self.scopes, &self.linearized)
    }

    fn type_error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::type_error(span, message));
    }

    fn fatal_type_error(&mut self, span: Span, message: impl Into<String>) -> FatalError {
        self.type_error(span, message);
        FatalError
    }

    // ── Contract-level checks ───────────────────────────────────

    fn check(&mut self, contract: &'ast ContractDefinition) -> Fatal<()> {
        self.annotations
            .is_fully_implemented
            .insert(self.current_contract, true);

        for strukt in &contract.structs {
            self.check_struct(strukt)?;
        }
        for base in &contract.bases {
            self.check_inheritance_specifier(base)?;
        }

        self.check_duplicate_functions(contract);
        self.check_illegal_overrides();
        self.check_abstract_functions();
        self.check_abstract_constructors();

        if let Some(constructor) = contract.functions.iter().find(|f| f.name == contract.name) {
            if !constructor.return_parameters.is_empty() {
                self.type_error(
                    constructor.span,
                    "Non-empty \"returns\" directive for constructor.",
                );
            }
        }

        let mut fallback_seen = false;
        for function in &contract.functions {
            if function.name.is_empty() {
                if fallback_seen {
                    self.diagnostics.push(Diagnostic::declaration_error(
                        function.span,
                        "Only one fallback function is allowed.",
                    ));
                } else {
                    fallback_seen = true;
                    if !function.parameters.is_empty() {
                        self.type_error(function.span, "Fallback function cannot take parameters.");
                    }
                }
            }
            if !function.is_implemented() {
                self.annotations
                    .is_fully_implemented
                    .insert(self.current_contract, false);
            }
        }

        for variable in &contract.state_variables {
            self.check_variable_declaration(variable, true)?;
        }
        for event in &contract.events {
            self.check_event(event)?;
        }
        for modifier in &contract.modifiers {
            self.check_modifier(modifier)?;
        }
        for function in &contract.functions {
            self.check_function(function)?;
        }

        self.check_external_type_clashes();
        self.check_signature_hash_collisions(contract);

        if contract.is_library {
            self.check_library_requirements(contract);
        }
        Ok(())
    }

    fn check_struct(&mut self, strukt: &crate::ast::StructDefinition) -> Fatal<()> {
        for member in &strukt.members {
            if let Some(member_type) = self.annotations.types.get(&member.id) {
                if !member_type.can_be_stored() {
                    self.type_error(member.span, "Type cannot be used in struct.");
                }
            }
        }
        let decl = self.annotations.decl_of[&strukt.id];
        let mut parents = FxHashSet::default();
        self.check_struct_recursion(decl, &mut parents)
    }

    /// DFS from the struct, tracking ancestors; a member referencing an
    /// ancestor struct by value is a fatal recursive definition.
    fn check_struct_recursion(
        &mut self,
        decl: DeclId,
        parents: &mut FxHashSet<DeclId>,
    ) -> Fatal<()> {
        if parents.contains(&decl) {
            let span = self.scopes.decl(decl).span;
            self.diagnostics.push(Diagnostic::parser_error(
                span,
                "Recursive struct definition.",
            ));
            return Err(FatalError);
        }
        parents.insert(decl);
        let definition = self.nodes.strukt(self.scopes.decl(decl).node);
        for member in &definition.members {
            if let Some(Type::Struct { decl: inner, .. }) =
                self.annotations.types.get(&member.id).cloned()
            {
                self.check_struct_recursion(inner, parents)?;
            }
        }
        parents.remove(&decl);
        Ok(())
    }

    fn check_inheritance_specifier(&mut self, base: &'ast InheritanceSpecifier) -> Fatal<()> {
        let Some(&base_decl) = self
            .annotations
            .referenced_declaration
            .get(&base.base_name.id)
        else {
            return Ok(());
        };
        let base_node = self.nodes.contract(self.scopes.decl(base_decl).node);
        if base_node.is_library {
            self.type_error(base.span, "Libraries cannot be inherited from.");
        }

        let mut argument_types = Vec::with_capacity(base.arguments.len());
        for argument in &base.arguments {
            argument_types.push((self.check_expression(argument)?, argument.span));
        }

        let Some(constructor) =
            members::constructor_type(base_decl, self.scopes, self.nodes, self.annotations)
        else {
            return Ok(());
        };
        let parameter_types = constructor.parameter_types;
        if !base.arguments.is_empty() && parameter_types.len() != base.arguments.len() {
            self.type_error(
                base.span,
                format!(
                    "Wrong argument count for constructor call: {} arguments given but expected {}.",
                    base.arguments.len(),
                    parameter_types.len()
                ),
            );
            return Ok(());
        }
        for ((argument_type, span), parameter) in argument_types.iter().zip(&parameter_types) {
            if !argument_type.is_implicitly_convertible_to(parameter, &self.env()) {
                let message = format!(
                    "Invalid type for argument in constructor call. \
                     Invalid implicit conversion from {} to {} requested.",
                    argument_type.describe(&self.env()),
                    parameter.describe(&self.env())
                );
                self.type_error(*span, message);
            }
        }
        Ok(())
    }

    /// Overloads within one contract must differ in argument types; at most
    /// one constructor is permitted.
    fn check_duplicate_functions(&mut self, contract: &'ast ContractDefinition) {
        let mut functions: FxHashMap<&str, Vec<&'ast FunctionDefinition>> = FxHashMap::default();
        for function in &contract.functions {
            functions.entry(&function.name).or_default().push(function);
        }

        if let Some(constructors) = functions.get(contract.name.as_str()) {
            if constructors.len() > 1 {
                let mut diagnostic = Diagnostic::declaration_error(
                    constructors[0].span,
                    "More than one constructor defined.",
                );
                for other in &constructors[1..] {
                    diagnostic =
                        diagnostic.with_secondary(other.span, "Another declaration is here:");
                }
                self.diagnostics.push(diagnostic);
            }
        }

        for overloads in functions.values() {
            for i in 0..overloads.len() {
                for j in i + 1..overloads.len() {
                    let (Some(first), Some(second)) = (
                        self.definition_function_type(overloads[i]),
                        self.definition_function_type(overloads[j]),
                    ) else {
                        continue;
                    };
                    if first.has_equal_argument_types(&second) {
                        self.diagnostics.push(
                            Diagnostic::declaration_error(
                                overloads[j].span,
                                "Function with same name and arguments defined twice.",
                            )
                            .with_secondary(overloads[i].span, "Other declaration is here:"),
                        );
                    }
                }
            }
        }
    }

    fn definition_function_type(&self, function: &FunctionDefinition) -> Option<FunctionType> {
        let decl = self.annotations.decl_of.get(&function.id)?;
        members::function_type(*decl, false, self.scopes, self.nodes, self.annotations)
    }

    /// Walked derived-to-base, so the error is attached to the derived site.
    fn check_illegal_overrides(&mut self) {
        let linearized = self.linearized_of(self.current_contract);
        let mut functions: FxHashMap<String, Vec<(FunctionType, Span, Visibility, bool)>> =
            FxHashMap::default();
        let mut modifiers: FxHashMap<String, (Vec<Type>, Span)> = FxHashMap::default();

        for contract_decl in linearized {
            let definition = self.nodes.contract(self.scopes.decl(contract_decl).node);
            for function in &definition.functions {
                if function.name == definition.name {
                    // Constructors neither override nor get overridden.
                    continue;
                }
                if let Some((_, modifier_span)) = modifiers.get(&function.name) {
                    let span = *modifier_span;
                    self.type_error(span, "Override changes function to modifier.");
                }
                let Some(function_type) = self.definition_function_type(function) else {
                    continue;
                };
                let mut errors: Vec<Span> = Vec::new();
                if let Some(overriding) = functions.get(&function.name) {
                    for (overriding_type, span, visibility, is_const) in overriding {
                        if !overriding_type.has_equal_argument_types(&function_type) {
                            continue;
                        }
                        if *visibility != function.visibility
                            || *is_const != function.is_declared_const
                            || *overriding_type != function_type
                        {
                            errors.push(*span);
                        }
                    }
                }
                for span in errors {
                    self.type_error(span, "Override changes extended function signature.");
                }
                functions.entry(function.name.clone()).or_default().push((
                    function_type,
                    function.span,
                    function.visibility,
                    function.is_declared_const,
                ));
            }
            for modifier in &definition.modifiers {
                let parameter_types: Vec<Type> = modifier
                    .parameters
                    .iter()
                    .filter_map(|p| self.annotations.types.get(&p.id).cloned())
                    .collect();
                match modifiers.get(&modifier.name) {
                    None => {
                        modifiers.insert(
                            modifier.name.clone(),
                            (parameter_types, modifier.span),
                        );
                    }
                    Some((override_types, span)) => {
                        if *override_types != parameter_types {
                            let span = *span;
                            self.type_error(span, "Override changes modifier signature.");
                        }
                    }
                }
                if functions.get(&modifier.name).is_some_and(|f| !f.is_empty()) {
                    let span = modifiers[&modifier.name].1;
                    self.type_error(span, "Override changes modifier to function.");
                }
            }
        }
    }

    /// Scan base-to-derived: a (name, argument-class) is implemented if any
    /// definition in the chain has a body; an unimplemented leftover marks
    /// the contract abstract.
    fn check_abstract_functions(&mut self) {
        let mut functions: FxHashMap<String, Vec<(FunctionType, bool)>> = FxHashMap::default();
        let linearized = self.linearized_of(self.current_contract);
        for contract_decl in linearized.into_iter().rev() {
            let definition = self.nodes.contract(self.scopes.decl(contract_decl).node);
            for function in &definition.functions {
                let Some(function_type) = self.definition_function_type(function) else {
                    continue;
                };
                let overloads = functions.entry(function.name.clone()).or_default();
                match overloads
                    .iter_mut()
                    .find(|(existing, _)| existing.has_equal_argument_types(&function_type))
                {
                    None => overloads.push((function_type, function.is_implemented())),
                    Some((_, implemented)) => {
                        if *implemented {
                            if !function.is_implemented() {
                                self.type_error(
                                    function.span,
                                    "Redeclaring an already implemented function as abstract",
                                );
                            }
                        } else if function.is_implemented() {
                            *implemented = true;
                        }
                    }
                }
            }
        }
        for overloads in functions.values() {
            if overloads.iter().any(|(_, implemented)| !implemented) {
                self.annotations
                    .is_fully_implemented
                    .insert(self.current_contract, false);
                return;
            }
        }
    }

    /// Every base constructor that takes arguments must receive them, either
    /// from some base list or from a constructor's modifier invocation.
    fn check_abstract_constructors(&mut self) {
        let linearized = self.linearized_of(self.current_contract);
        let mut arguments_needed: FxHashSet<DeclId> = FxHashSet::default();
        for &contract_decl in &linearized {
            if contract_decl == self.current_contract {
                continue;
            }
            if let Some(constructor) =
                members::constructor_of(contract_decl, self.scopes, self.nodes, self.annotations)
            {
                let definition = self.nodes.function(self.scopes.decl(constructor).node);
                if !definition.parameters.is_empty() {
                    arguments_needed.insert(contract_decl);
                }
            }
        }

        for &contract_decl in &linearized {
            if let Some(constructor) =
                members::constructor_of(contract_decl, self.scopes, self.nodes, self.annotations)
            {
                let definition = self.nodes.function(self.scopes.decl(constructor).node);
                for invocation in &definition.modifiers {
                    if let Some(&target) = self
                        .annotations
                        .referenced_declaration
                        .get(&invocation.name.id)
                    {
                        if self.scopes.decl(target).kind == DeclKind::Contract {
                            arguments_needed.remove(&target);
                        }
                    }
                }
            }
            let definition = self.nodes.contract(self.scopes.decl(contract_decl).node);
            for base in &definition.bases {
                if let Some(&target) = self
                    .annotations
                    .referenced_declaration
                    .get(&base.base_name.id)
                {
                    if !base.arguments.is_empty() {
                        arguments_needed.remove(&target);
                    }
                }
            }
        }
        if !arguments_needed.is_empty() {
            self.annotations
                .is_fully_implemented
                .insert(self.current_contract, false);
        }
    }

    /// Across the linearization, externally visible declarations sharing an
    /// external signature must have equal argument-type vectors.
    fn check_external_type_clashes(&mut self) {
        let mut externals: FxHashMap<String, Vec<(Span, FunctionType)>> = FxHashMap::default();
        for contract_decl in self.linearized_of(self.current_contract) {
            let definition = self.nodes.contract(self.scopes.decl(contract_decl).node);
            for function in &definition.functions {
                let Some(&decl) = self.annotations.decl_of.get(&function.id) else {
                    continue;
                };
                if !members::is_part_of_external_interface(decl, self.scopes) {
                    continue;
                }
                let Some(function_type) =
                    members::function_type(decl, true, self.scopes, self.nodes, self.annotations)
                else {
                    continue;
                };
                if let Some(signature) = function_type.external_signature(&function.name) {
                    externals
                        .entry(signature)
                        .or_default()
                        .push((function.span, function_type));
                }
            }
            for variable in &definition.state_variables {
                let Some(&decl) = self.annotations.decl_of.get(&variable.id) else {
                    continue;
                };
                if !members::is_part_of_external_interface(decl, self.scopes) {
                    continue;
                }
                let Some(accessor) = members::accessor_type(decl, self.scopes, self.annotations)
                else {
                    continue;
                };
                if let Some(signature) = accessor.external_signature(&variable.name) {
                    externals
                        .entry(signature)
                        .or_default()
                        .push((variable.span, accessor));
                }
            }
        }

        let mut signatures: Vec<&String> = externals.keys().collect();
        signatures.sort();
        let mut errors: Vec<Span> = Vec::new();
        for signature in signatures {
            let entries = &externals[signature];
            for i in 0..entries.len() {
                for j in i + 1..entries.len() {
                    if !entries[i].1.has_equal_argument_types(&entries[j].1) {
                        errors.push(entries[j].0);
                    }
                }
            }
        }
        for span in errors {
            self.type_error(
                span,
                "Function overload clash during conversion to external types for arguments.",
            );
        }
    }

    /// The 4-byte selectors of distinct external signatures must be
    /// pairwise distinct.
    fn check_signature_hash_collisions(&mut self, contract: &ContractDefinition) {
        let interface = members::interface_functions(
            self.current_contract,
            self.scopes,
            self.nodes,
            self.annotations,
        );
        let mut hashes: FxHashSet<[u8; 4]> = FxHashSet::default();
        for (signature, hash, _, _) in interface {
            if !hashes.insert(hash) {
                self.type_error(
                    contract.span,
                    format!("Function signature hash collision for {signature}"),
                );
            }
        }
    }

    fn check_library_requirements(&mut self, contract: &ContractDefinition) {
        if !contract.bases.is_empty() {
            self.type_error(contract.span, "Library is not allowed to inherit.");
        }
        for variable in &contract.state_variables {
            if !variable.is_constant {
                self.type_error(
                    variable.span,
                    "Library cannot have non-constant state variables",
                );
            }
        }
    }

    fn linearized_of(&self, contract: DeclId) -> Vec<DeclId> {
        self.linearized
            .get(&contract)
            .cloned()
            .unwrap_or_else(|| vec![contract])
    }

    // ── Definitions ─────────────────────────────────────────────

    fn check_function(&mut self, function: &'ast FunctionDefinition) -> Fatal<()> {
        for variable in function
            .parameters
            .iter()
            .chain(function.return_parameters.iter())
        {
            if let Some(var_type) = self.annotations.types.get(&variable.id).cloned() {
                if !var_type.can_live_outside_storage() {
                    self.type_error(variable.span, "Type is required to live outside storage.");
                }
                if function.visibility >= Visibility::Public && var_type.external_type().is_none() {
                    self.type_error(
                        variable.span,
                        "Internal type is not allowed for public and external functions.",
                    );
                }
            }
        }
        let is_constructor = self
            .annotations
            .decl_of
            .get(&function.id)
            .map_or(false, |decl| self.scopes.decl(*decl).is_constructor);
        let bases = if is_constructor {
            self.linearized_of(self.current_contract)
        } else {
            Vec::new()
        };
        for invocation in &function.modifiers {
            self.check_modifier_invocation(invocation, &bases)?;
        }
        if let Some(body) = &function.body {
            self.check_block(body)?;
        }
        Ok(())
    }

    fn check_modifier(&mut self, modifier: &'ast ModifierDefinition) -> Fatal<()> {
        self.check_block(&modifier.body)
    }

    fn check_modifier_invocation(
        &mut self,
        invocation: &'ast ModifierInvocation,
        bases: &[DeclId],
    ) -> Fatal<()> {
        let mut argument_types = Vec::with_capacity(invocation.arguments.len());
        for argument in &invocation.arguments {
            argument_types.push((self.check_expression(argument)?, argument.span));
        }
        let Some(&decl) = self
            .annotations
            .referenced_declaration
            .get(&invocation.name.id)
        else {
            return Ok(());
        };

        let parameters: Option<Vec<Type>> = match self.scopes.decl(decl).kind {
            DeclKind::Modifier => {
                let definition = self.nodes.modifier(self.scopes.decl(decl).node);
                Some(
                    definition
                        .parameters
                        .iter()
                        .filter_map(|p| self.annotations.types.get(&p.id).cloned())
                        .collect(),
                )
            }
            DeclKind::Contract if bases.contains(&decl) => {
                match members::constructor_of(decl, self.scopes, self.nodes, self.annotations) {
                    Some(constructor) => {
                        let definition = self.nodes.function(self.scopes.decl(constructor).node);
                        Some(
                            definition
                                .parameters
                                .iter()
                                .filter_map(|p| self.annotations.types.get(&p.id).cloned())
                                .collect(),
                        )
                    }
                    None => Some(Vec::new()),
                }
            }
            _ => None,
        };
        let Some(parameters) = parameters else {
            self.type_error(
                invocation.span,
                "Referenced declaration is neither modifier nor base class.",
            );
            return Ok(());
        };
        if parameters.len() != invocation.arguments.len() {
            self.type_error(
                invocation.span,
                format!(
                    "Wrong argument count for modifier invocation: {} arguments given but expected {}.",
                    invocation.arguments.len(),
                    parameters.len()
                ),
            );
            return Ok(());
        }
        for ((argument_type, span), parameter) in argument_types.iter().zip(&parameters) {
            if !argument_type.is_implicitly_convertible_to(parameter, &self.env()) {
                let message = format!(
                    "Invalid type for argument in modifier invocation. \
                     Invalid implicit conversion from {} to {} requested.",
                    argument_type.describe(&self.env()),
                    parameter.describe(&self.env())
                );
                self.type_error(*span, message);
            }
        }
        Ok(())
    }

    fn check_event(&mut self, event: &'ast EventDefinition) -> Fatal<()> {
        let mut num_indexed = 0;
        for variable in &event.parameters {
            if variable.is_indexed {
                num_indexed += 1;
            }
            if num_indexed > 3 {
                self.type_error(event.span, "More than 3 indexed arguments for event.");
            }
            if let Some(var_type) = self.annotations.types.get(&variable.id).cloned() {
                if !var_type.can_live_outside_storage() {
                    self.type_error(variable.span, "Type is required to live outside storage.");
                }
                if var_type.external_type().is_none() {
                    self.type_error(
                        variable.span,
                        "Internal type is not allowed as event parameter type.",
                    );
                }
            }
        }
        Ok(())
    }

    /// Shared between state variables and locals; `is_state` selects which
    /// rule set applies.
    fn check_variable_declaration(
        &mut self,
        variable: &'ast VariableDeclaration,
        is_state: bool,
    ) -> Fatal<()> {
        if variable.is_constant {
            if !is_state {
                self.type_error(variable.span, "Illegal use of \"constant\" specifier.");
            }
            if variable.value.is_none() {
                self.type_error(variable.span, "Uninitialized \"constant\" variable.");
            }
            if let Some(declared) = self.annotations.types.get(&variable.id) {
                let const_implemented = declared.is_value_type()
                    || matches!(declared, Type::Array(array) if array.is_byte_array());
                if !const_implemented {
                    self.type_error(
                        variable.span,
                        "Illegal use of \"constant\" specifier. \"constant\" \
                         is not yet implemented for this type.",
                    );
                }
            }
        }

        let declared = self.annotations.types.get(&variable.id).cloned();
        let var_type = match declared {
            Some(declared) => {
                if let Some(value) = &variable.value {
                    self.expect_type(value, &declared)?;
                } else if !is_state
                    && declared.is_reference_type()
                    && declared.data_location() == Some(DataLocation::Storage)
                {
                    self.diagnostics.push(Diagnostic::warning(
                        variable.span,
                        format!(
                            "Uninitialized storage pointer. Did you mean '<type> memory {}'?",
                            variable.name
                        ),
                    ));
                }
                declared
            }
            None => {
                // `var`: the initializer's mobile type becomes the type.
                let Some(value) = &variable.value else {
                    return Err(
                        self.fatal_type_error(variable.span, "Assignment necessary for type detection.")
                    );
                };
                let value_type = self.check_expression(value)?;
                if let Type::IntegerConstant(constant) = &value_type {
                    if smallest_integer_type(constant).is_none() {
                        let message = format!(
                            "Invalid integer constant {}.",
                            value_type.describe(&self.env())
                        );
                        return Err(self.fatal_type_error(value.span, message));
                    }
                }
                if value_type == Type::Void {
                    return Err(
                        self.fatal_type_error(variable.span, "Variable cannot have void type.")
                    );
                }
                let Some(mobile) = value_type.mobile_type() else {
                    return Err(
                        self.fatal_type_error(variable.span, "Variable cannot have void type.")
                    );
                };
                self.annotations.types.insert(variable.id, mobile.clone());
                mobile
            }
        };

        if !is_state {
            if matches!(
                var_type.data_location(),
                Some(DataLocation::Memory) | Some(DataLocation::CallData)
            ) && !var_type.can_live_outside_storage()
            {
                let message = format!(
                    "Type {} is only valid in storage.",
                    var_type.describe(&self.env())
                );
                self.type_error(variable.span, message);
            }
        } else if variable.visibility >= Visibility::Public {
            let decl = self.annotations.decl_of[&variable.id];
            let externally_valid = members::accessor_type(decl, self.scopes, self.annotations)
                .map_or(false, |accessor| {
                    accessor
                        .parameter_types
                        .iter()
                        .chain(accessor.return_types.iter())
                        .all(|t| t.external_type().is_some())
                });
            if !externally_valid {
                self.type_error(
                    variable.span,
                    "Internal type is not allowed for public state variables.",
                );
            }
        }
        Ok(())
    }

    // ── Statements ──────────────────────────────────────────────

    fn check_block(&mut self, block: &'ast Block) -> Fatal<()> {
        for statement in &block.statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, statement: &'ast Statement) -> Fatal<()> {
        match &statement.kind {
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expect_type(condition, &Type::Bool)?;
                self.check_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                self.expect_type(condition, &Type::Bool)?;
                self.check_statement(body)
            }
            StmtKind::For {
                init,
                condition,
                loop_expr,
                body,
            } => {
                if let Some(init) = init {
                    self.check_statement(init)?;
                }
                if let Some(condition) = condition {
                    self.expect_type(condition, &Type::Bool)?;
                }
                if let Some(loop_expr) = loop_expr {
                    self.check_expression(loop_expr)?;
                }
                self.check_statement(body)
            }
            StmtKind::Continue | StmtKind::Break | StmtKind::Placeholder => Ok(()),
            StmtKind::Return(expression) => self.check_return(statement, expression.as_ref()),
            StmtKind::VariableDeclaration(variable) => {
                self.check_variable_declaration(variable, false)
            }
            StmtKind::Expression(expression) => {
                let expression_type = self.check_expression(expression)?;
                if let Type::IntegerConstant(constant) = &expression_type {
                    if smallest_integer_type(constant).is_none() {
                        self.type_error(expression.span, "Invalid integer constant.");
                    }
                }
                Ok(())
            }
        }
    }

    fn check_return(
        &mut self,
        statement: &'ast Statement,
        expression: Option<&'ast Expression>,
    ) -> Fatal<()> {
        let Some(expression) = expression else {
            return Ok(());
        };
        let expression_type = self.check_expression(expression)?;
        let Some(&function) = self
            .annotations
            .function_return_parameters
            .get(&statement.id)
        else {
            self.type_error(statement.span, "Return arguments not allowed.");
            return Ok(());
        };
        let definition = self.nodes.function(self.scopes.decl(function).node);
        if definition.return_parameters.len() != 1 {
            self.type_error(
                statement.span,
                "Different number of arguments in return statement than in returns declaration.",
            );
            return Ok(());
        }
        let Some(expected) = self
            .annotations
            .types
            .get(&definition.return_parameters[0].id)
            .cloned()
        else {
            return Ok(());
        };
        if !expression_type.is_implicitly_convertible_to(&expected, &self.env()) {
            let message = format!(
                "Return argument type {} is not implicitly convertible to expected type \
                 (type of first return variable) {}.",
                expression_type.describe(&self.env()),
                expected.describe(&self.env())
            );
            self.type_error(expression.span, message);
        }
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────

    fn check_expression(&mut self, expression: &'ast Expression) -> Fatal<Type> {
        let expression_type = match &expression.kind {
            ExprKind::Literal(literal) => self.check_literal(literal, expression.span)?,
            ExprKind::ElementaryTypeName(elementary) => {
                Type::TypeType(Box::new(Type::from_elementary(*elementary)))
            }
            ExprKind::Identifier(_) => self.check_identifier(expression)?,
            ExprKind::Unary { op, sub } => self.check_unary(*op, sub, expression.span)?,
            ExprKind::Binary { op, left, right } => {
                self.check_binary(expression, *op, left, right)?
            }
            ExprKind::Assignment { op, lhs, rhs } => {
                self.check_assignment(expression, *op, lhs, rhs)?
            }
            ExprKind::FunctionCall {
                callee,
                arguments,
                names,
            } => self.check_function_call(expression, callee, arguments, names)?,
            ExprKind::New { contract_name } => self.check_new(expression, contract_name)?,
            ExprKind::MemberAccess { expr, member } => {
                self.check_member_access(expression, expr, member)?
            }
            ExprKind::IndexAccess { base, index } => {
                self.check_index_access(expression, base, index.as_deref())?
            }
        };
        self.annotations
            .types
            .insert(expression.id, expression_type.clone());
        Ok(expression_type)
    }

    fn check_literal(&mut self, literal: &Literal, span: Span) -> Fatal<Type> {
        match literal {
            Literal::Number(text) => match parse_integer_literal(text) {
                Some(value) => Ok(Type::IntegerConstant(value)),
                None => Err(self.fatal_type_error(span, "Invalid literal value.")),
            },
            Literal::Bool(_) => Ok(Type::Bool),
            Literal::String(text) => Ok(Type::StringLiteral(text.clone())),
        }
    }

    /// If the resolver deferred to a candidate set, prune it with the
    /// argument types recorded at the call site; exactly one winner must
    /// remain.
    fn check_identifier(&mut self, expression: &'ast Expression) -> Fatal<Type> {
        let node = expression.id;
        let span = expression.span;
        let decl = match self.annotations.referenced_declaration.get(&node) {
            Some(decl) => *decl,
            None => {
                let Some(argument_types) = self.annotations.argument_types.get(&node).cloned()
                else {
                    return Err(self.fatal_type_error(span, "Unable to determine overloaded type."));
                };
                let overloads = self
                    .annotations
                    .overloaded_declarations
                    .get(&node)
                    .cloned()
                    .unwrap_or_default();
                if overloads.is_empty() {
                    return Err(
                        self.fatal_type_error(span, "No candidates for overload resolution found.")
                    );
                }
                let winner = if overloads.len() == 1 {
                    overloads[0]
                } else {
                    let mut candidates = Vec::new();
                    for candidate in overloads {
                        let Some(candidate_type) = members::decl_value_type(
                            candidate,
                            self.scopes,
                            self.nodes,
                            self.annotations,
                        ) else {
                            continue;
                        };
                        if let Type::Function(function) = candidate_type {
                            if function.can_take_arguments(&argument_types, &self.env()) {
                                candidates.push(candidate);
                            }
                        }
                    }
                    match candidates.len() {
                        0 => {
                            return Err(self.fatal_type_error(
                                span,
                                "No matching declaration found after argument-dependent lookup.",
                            ))
                        }
                        1 => candidates[0],
                        _ => {
                            return Err(self.fatal_type_error(
                                span,
                                "No unique declaration found after argument-dependent lookup.",
                            ))
                        }
                    }
                };
                self.annotations.referenced_declaration.insert(node, winner);
                winner
            }
        };

        if self.decl_is_lvalue(decl) {
            self.annotations.is_lvalue.insert(node);
        }
        match members::decl_value_type(decl, self.scopes, self.nodes, self.annotations) {
            Some(decl_type) => Ok(decl_type),
            None => Err(self.fatal_type_error(
                span,
                "Declaration referenced before type could be determined.",
            )),
        }
    }

    fn decl_is_lvalue(&self, decl: DeclId) -> bool {
        let info = self.scopes.decl(decl);
        match info.kind {
            DeclKind::StateVariable | DeclKind::LocalVariable => {
                !self.nodes.variable(info.node).is_constant
            }
            DeclKind::Parameter => {
                // Parameters of external functions are read-only.
                let Some(owner_scope) = info.scope else {
                    return true;
                };
                let Some(owner) = self.scopes.owner(owner_scope) else {
                    return true;
                };
                let owner_info = self.scopes.decl(owner);
                if owner_info.kind != DeclKind::Function {
                    return true;
                }
                let function = self.nodes.function(owner_info.node);
                !(function.visibility == Visibility::External
                    && function.parameters.iter().any(|p| p.id == info.node))
            }
            _ => false,
        }
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        sub: &'ast Expression,
        span: Span,
    ) -> Fatal<Type> {
        let sub_type = if matches!(op, UnaryOp::Inc | UnaryOp::Dec | UnaryOp::Delete) {
            self.require_lvalue(sub)?
        } else {
            self.check_expression(sub)?
        };
        match sub_type.unary_operator_result(op) {
            Some(result) => Ok(result),
            None => {
                let message = format!(
                    "Unary operator {} cannot be applied to type {}",
                    op.as_str(),
                    sub_type.describe(&self.env())
                );
                self.type_error(span, message);
                Ok(sub_type)
            }
        }
    }

    fn check_binary(
        &mut self,
        expression: &'ast Expression,
        op: BinaryOp,
        left: &'ast Expression,
        right: &'ast Expression,
    ) -> Fatal<Type> {
        let left_type = self.check_expression(left)?;
        let right_type = self.check_expression(right)?;
        let common = match left_type.binary_operator_result(op, &right_type, &self.env()) {
            Some(common) => common,
            None => {
                let message = format!(
                    "Operator {} not compatible with types {} and {}",
                    op.as_str(),
                    left_type.describe(&self.env()),
                    right_type.describe(&self.env())
                );
                self.type_error(expression.span, message);
                left_type
            }
        };
        self.annotations
            .common_type
            .insert(expression.id, common.clone());
        if op.is_compare() {
            Ok(Type::Bool)
        } else {
            Ok(common)
        }
    }

    fn check_assignment(
        &mut self,
        expression: &'ast Expression,
        op: AssignmentOp,
        lhs: &'ast Expression,
        rhs: &'ast Expression,
    ) -> Fatal<Type> {
        let lhs_type = self.require_lvalue(lhs)?;
        if matches!(lhs_type, Type::Mapping { .. }) {
            self.type_error(expression.span, "Mappings cannot be assigned to.");
            self.check_expression(rhs)?;
            return Ok(lhs_type);
        }
        match op.binary_op() {
            None => {
                self.expect_type(rhs, &lhs_type)?;
            }
            Some(binary) => {
                let rhs_type = self.check_expression(rhs)?;
                let result = lhs_type.binary_operator_result(binary, &rhs_type, &self.env());
                if result.as_ref() != Some(&lhs_type) {
                    let message = format!(
                        "Operator {} not compatible with types {} and {}",
                        op.as_str(),
                        lhs_type.describe(&self.env()),
                        rhs_type.describe(&self.env())
                    );
                    self.type_error(expression.span, message);
                }
            }
        }
        Ok(lhs_type)
    }

    fn check_function_call(
        &mut self,
        expression: &'ast Expression,
        callee: &'ast Expression,
        arguments: &'ast [Expression],
        names: &[String],
    ) -> Fatal<Type> {
        let positional = names.is_empty();

        // Argument types first: they drive overload resolution in the
        // callee.
        let mut argument_types = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let argument_type = self.check_expression(argument)?;
            if positional {
                argument_types.push(argument_type);
            }
        }
        if positional {
            self.annotations
                .argument_types
                .insert(callee.id, argument_types.clone());
        }

        let callee_type = self.check_expression(callee)?;

        let is_struct_constructor = matches!(
            &callee_type,
            Type::TypeType(inner) if matches!(inner.as_ref(), Type::Struct { .. })
        );
        let is_type_conversion =
            matches!(&callee_type, Type::TypeType(_)) && !is_struct_constructor;
        if is_struct_constructor {
            self.annotations
                .is_struct_constructor_call
                .insert(expression.id);
        }
        if is_type_conversion {
            self.annotations.is_type_conversion.insert(expression.id);
        }

        if is_type_conversion {
            let Type::TypeType(inner) = callee_type else {
                unreachable!("type conversion callee is a type name");
            };
            let mut result = *inner;
            if arguments.len() != 1 {
                self.type_error(
                    expression.span,
                    "Exactly one argument expected for explicit type conversion.",
                );
            } else if !positional {
                self.type_error(
                    expression.span,
                    "Type conversion cannot allow named arguments.",
                );
            } else {
                let argument_type = argument_types[0].clone();
                // The data location of reference arguments is preserved.
                if let Some(location) = argument_type.data_location() {
                    result = result.copy_for_location_if_reference(location);
                }
                if !argument_type.is_explicitly_convertible_to(&result, &self.env()) {
                    self.type_error(expression.span, "Explicit type conversion not allowed.");
                }
            }
            return Ok(result);
        }

        let mut members_missing_in_memory = Vec::new();
        let function_type: Option<FunctionType> = if is_struct_constructor {
            let Type::TypeType(inner) = &callee_type else {
                unreachable!("struct constructor callee is a type name");
            };
            let Type::Struct { decl, .. } = inner.as_ref() else {
                unreachable!("struct constructor names a struct");
            };
            match members::struct_constructor_type(*decl, self.scopes, self.nodes, self.annotations)
            {
                Some((constructor, missing)) => {
                    members_missing_in_memory = missing;
                    Some(constructor)
                }
                None => None,
            }
        } else if let Type::Function(function) = &callee_type {
            Some(function.as_ref().clone())
        } else {
            None
        };

        let Some(function_type) = function_type else {
            self.type_error(expression.span, "Type is not callable");
            return Ok(Type::Void);
        };

        let result = function_type
            .return_types
            .first()
            .cloned()
            .unwrap_or(Type::Void);

        let parameter_types = &function_type.parameter_types;
        if !function_type.arbitrary_parameters && parameter_types.len() != arguments.len() {
            let mut message = format!(
                "Wrong argument count for function call: {} arguments given but expected {}.",
                arguments.len(),
                parameter_types.len()
            );
            if is_struct_constructor && !members_missing_in_memory.is_empty() {
                message += " Members that have to be skipped in memory:";
                for member in &members_missing_in_memory {
                    message += " ";
                    message += member;
                }
            }
            self.type_error(expression.span, message);
        } else if positional {
            if !function_type.arbitrary_parameters {
                for (argument, parameter) in arguments.iter().zip(parameter_types.iter()) {
                    // Mapping-valued struct members keep their slot for the
                    // arity check but take no checkable argument in memory.
                    if is_struct_constructor && !parameter.can_live_outside_storage() {
                        continue;
                    }
                    let argument_type = self.annotations.types[&argument.id].clone();
                    if !argument_type.is_implicitly_convertible_to(parameter, &self.env()) {
                        let message = format!(
                            "Invalid type for argument in function call. \
                             Invalid implicit conversion from {} to {} requested.",
                            argument_type.describe(&self.env()),
                            parameter.describe(&self.env())
                        );
                        self.type_error(argument.span, message);
                    }
                }
            }
        } else {
            // Call by named arguments.
            let parameter_names = &function_type.parameter_names;
            if function_type.arbitrary_parameters {
                self.type_error(
                    expression.span,
                    "Named arguments cannnot be used for functions that take arbitrary parameters.",
                );
            } else if parameter_names.len() > names.len() {
                self.type_error(expression.span, "Some argument names are missing.");
            } else if parameter_names.len() < names.len() {
                self.type_error(expression.span, "Too many arguments.");
            } else {
                let mut duplication = false;
                for i in 0..names.len() {
                    for j in i + 1..names.len() {
                        if names[i] == names[j] {
                            duplication = true;
                            self.type_error(arguments[i].span, "Duplicate named argument.");
                        }
                    }
                }
                if !duplication {
                    for (name, argument) in names.iter().zip(arguments.iter()) {
                        match parameter_names.iter().position(|p| p == name) {
                            Some(index) => {
                                let argument_type = self.annotations.types[&argument.id].clone();
                                let parameter = &parameter_types[index];
                                if !argument_type.is_implicitly_convertible_to(parameter, &self.env())
                                {
                                    let message = format!(
                                        "Invalid type for argument in function call. \
                                         Invalid implicit conversion from {} to {} requested.",
                                        argument_type.describe(&self.env()),
                                        parameter.describe(&self.env())
                                    );
                                    self.type_error(argument.span, message);
                                }
                            }
                            None => {
                                self.type_error(
                                    expression.span,
                                    "Named argument does not match function declaration.",
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    fn check_new(
        &mut self,
        expression: &'ast Expression,
        contract_name: &'ast crate::ast::Identifier,
    ) -> Fatal<Type> {
        let Some(&target) = self
            .annotations
            .referenced_declaration
            .get(&contract_name.id)
        else {
            return Err(self.fatal_type_error(expression.span, "Identifier is not a contract."));
        };
        if self.scopes.decl(target).kind != DeclKind::Contract {
            return Err(self.fatal_type_error(expression.span, "Identifier is not a contract."));
        }
        if !self
            .annotations
            .is_fully_implemented
            .get(&target)
            .copied()
            .unwrap_or(true)
        {
            self.type_error(
                expression.span,
                "Trying to create an instance of an abstract contract.",
            );
        }
        let scope_contract = self
            .annotations
            .contract_scope
            .get(&contract_name.id)
            .copied()
            .unwrap_or(self.current_contract);
        if self.linearized_of(target).contains(&scope_contract) {
            self.type_error(
                expression.span,
                "Circular reference for contract creation: cannot create instance of derived or same contract.",
            );
        }
        let Some(mut constructor) =
            members::constructor_type(target, self.scopes, self.nodes, self.annotations)
        else {
            return Err(self.fatal_type_error(expression.span, "Identifier is not a contract."));
        };
        constructor.return_types = vec![Type::Contract(target)];
        Ok(Type::Function(Box::new(constructor)))
    }

    fn check_member_access(
        &mut self,
        expression: &'ast Expression,
        base: &'ast Expression,
        member_name: &str,
    ) -> Fatal<Type> {
        let base_type = self.check_expression(base)?;
        let argument_types = self.annotations.argument_types.get(&expression.id).cloned();

        let member_list =
            members::members_of(&base_type, self.scopes, self.nodes, self.annotations);
        let mut possible = member_list.members_by_name(member_name);
        if possible.len() > 1 {
            if let Some(argument_types) = &argument_types {
                possible.retain(|member| match &member.ty {
                    Type::Function(function) => {
                        function.can_take_arguments(argument_types, &self.env())
                    }
                    _ => true,
                });
            }
        }

        if possible.is_empty() {
            let storage_type = base_type.copy_for_location_if_reference(DataLocation::Storage);
            let in_storage =
                members::members_of(&storage_type, self.scopes, self.nodes, self.annotations);
            if !in_storage.members_by_name(member_name).is_empty() {
                let message = format!(
                    "Member \"{member_name}\" is not available in {} outside of storage.",
                    base_type.describe(&self.env())
                );
                return Err(self.fatal_type_error(expression.span, message));
            }
            let message = format!(
                "Member \"{member_name}\" not found or not visible after argument-dependent \
                 lookup in {}",
                base_type.describe(&self.env())
            );
            return Err(self.fatal_type_error(expression.span, message));
        }
        if possible.len() > 1 {
            let message = format!(
                "Member \"{member_name}\" not unique after argument-dependent lookup in {}",
                base_type.describe(&self.env())
            );
            return Err(self.fatal_type_error(expression.span, message));
        }

        let member = possible.remove(0);
        if let Some(declaration) = member.declaration {
            self.annotations
                .referenced_declaration
                .insert(expression.id, declaration);
        }
        match &base_type {
            Type::Struct { .. } => {
                self.annotations.is_lvalue.insert(expression.id);
            }
            Type::Array(array) => {
                if member_name == "length"
                    && array.location == DataLocation::Storage
                    && array.is_dynamically_sized()
                {
                    self.annotations.is_lvalue.insert(expression.id);
                }
            }
            _ => {}
        }
        Ok(member.ty)
    }

    fn check_index_access(
        &mut self,
        expression: &'ast Expression,
        base: &'ast Expression,
        index: Option<&'ast Expression>,
    ) -> Fatal<Type> {
        let base_type = self.check_expression(base)?;
        match base_type {
            Type::Array(array) => {
                match index {
                    None => {
                        self.type_error(expression.span, "Index expression cannot be omitted.");
                    }
                    Some(index) => {
                        if array.kind == super::types::ArrayKind::String {
                            self.type_error(
                                expression.span,
                                "Index access for string is not possible.",
                            );
                            self.check_expression(index)?;
                        } else {
                            self.expect_type(index, &Type::uint256())?;
                            if let Some(Type::IntegerConstant(value)) =
                                self.annotations.types.get(&index.id)
                            {
                                if let Some(length) = &array.length {
                                    let in_bounds = value
                                        .to_biguint()
                                        .map_or(false, |value| value < *length);
                                    if !in_bounds {
                                        self.type_error(
                                            expression.span,
                                            "Out of bounds array access.",
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
                if array.location != DataLocation::CallData {
                    self.annotations.is_lvalue.insert(expression.id);
                }
                if array.is_byte_array() {
                    Ok(Type::FixedBytes(1))
                } else {
                    Ok(array.base.clone())
                }
            }
            Type::Mapping { key, value } => {
                match index {
                    None => {
                        self.type_error(expression.span, "Index expression cannot be omitted.");
                    }
                    Some(index) => {
                        self.expect_type(index, &key)?;
                    }
                }
                self.annotations.is_lvalue.insert(expression.id);
                Ok(*value)
            }
            Type::TypeType(inner) => match index {
                None => Ok(Type::TypeType(Box::new(Type::Array(Box::new(
                    super::types::ArrayType::new(DataLocation::Memory, *inner, None),
                ))))),
                Some(index) => {
                    let index_type = self.check_expression(index)?;
                    match index_type {
                        Type::IntegerConstant(value) => match value.to_biguint() {
                            Some(length) => Ok(Type::TypeType(Box::new(Type::Array(Box::new(
                                super::types::ArrayType::new(
                                    DataLocation::Memory,
                                    *inner,
                                    Some(length),
                                ),
                            ))))),
                            None => {
                                Err(self.fatal_type_error(index.span, "Integer constant expected."))
                            }
                        },
                        _ => Err(self.fatal_type_error(index.span, "Integer constant expected.")),
                    }
                }
            },
            other => {
                let message = format!(
                    "Indexed expression has to be a type, mapping or array (is {})",
                    other.describe(&self.env())
                );
                Err(self.fatal_type_error(base.span, message))
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn expect_type(&mut self, expression: &'ast Expression, expected: &Type) -> Fatal<()> {
        let actual = self.check_expression(expression)?;
        if !actual.is_implicitly_convertible_to(expected, &self.env()) {
            let message = format!(
                "Type {} is not implicitly convertible to expected type {}.",
                actual.describe(&self.env()),
                expected.describe(&self.env())
            );
            self.type_error(expression.span, message);
        }
        Ok(())
    }

    fn require_lvalue(&mut self, expression: &'ast Expression) -> Fatal<Type> {
        let expression_type = self.check_expression(expression)?;
        if !self.annotations.is_lvalue.contains(&expression.id) {
            self.type_error(expression.span, "Expression has to be an lvalue.");
        }
        self.annotations.lvalue_requested.insert(expression.id);
        Ok(expression_type)
    }
}
