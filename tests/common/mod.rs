//! AST construction helpers shared by the integration tests. The parser is
//! an external collaborator, so tests build the tree directly.

use pactum::ast::*;
use pactum::errors::Severity;
use pactum::semantic::AnalysisResult;
use pactum::span::Span;

pub struct Builder {
    ids: IdGenerator,
    pos: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
            pos: 0,
        }
    }

    fn id(&mut self) -> NodeId {
        self.ids.fresh()
    }

    /// Spans advance monotonically, so build order stands in for source
    /// order.
    fn span(&mut self) -> Span {
        let span = Span::new(self.pos, self.pos + 5);
        self.pos += 10;
        span
    }

    // ── Type names ──────────────────────────────────────────────

    pub fn elem(&mut self, elementary: ElementaryTypeName) -> TypeName {
        TypeName {
            id: self.id(),
            kind: TypeNameKind::Elementary(elementary),
            span: self.span(),
        }
    }

    pub fn uint(&mut self) -> TypeName {
        self.elem(ElementaryTypeName::Uint(256))
    }

    pub fn uint_n(&mut self, bits: u16) -> TypeName {
        self.elem(ElementaryTypeName::Uint(bits))
    }

    pub fn address(&mut self) -> TypeName {
        self.elem(ElementaryTypeName::Address)
    }

    pub fn bool_type(&mut self) -> TypeName {
        self.elem(ElementaryTypeName::Bool)
    }

    pub fn bytes_n(&mut self, n: u8) -> TypeName {
        self.elem(ElementaryTypeName::FixedBytes(n))
    }

    pub fn user_type(&mut self, path: &[&str]) -> TypeName {
        TypeName {
            id: self.id(),
            kind: TypeNameKind::UserDefined(path.iter().map(|s| s.to_string()).collect()),
            span: self.span(),
        }
    }

    pub fn mapping(&mut self, key: TypeName, value: TypeName) -> TypeName {
        TypeName {
            id: self.id(),
            kind: TypeNameKind::Mapping {
                key: Box::new(key),
                value: Box::new(value),
            },
            span: self.span(),
        }
    }

    pub fn array_of(&mut self, base: TypeName, length: Option<Expression>) -> TypeName {
        TypeName {
            id: self.id(),
            kind: TypeNameKind::Array {
                base: Box::new(base),
                length: length.map(Box::new),
            },
            span: self.span(),
        }
    }

    // ── Expressions ─────────────────────────────────────────────

    fn expr(&mut self, kind: ExprKind) -> Expression {
        Expression {
            id: self.id(),
            kind,
            span: self.span(),
        }
    }

    pub fn ident(&mut self, name: &str) -> Expression {
        self.expr(ExprKind::Identifier(name.to_string()))
    }

    pub fn number(&mut self, text: &str) -> Expression {
        self.expr(ExprKind::Literal(Literal::Number(text.to_string())))
    }

    pub fn bool_lit(&mut self, value: bool) -> Expression {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string_lit(&mut self, value: &str) -> Expression {
        self.expr(ExprKind::Literal(Literal::String(value.to_string())))
    }

    pub fn elem_expr(&mut self, elementary: ElementaryTypeName) -> Expression {
        self.expr(ExprKind::ElementaryTypeName(elementary))
    }

    pub fn unary(&mut self, op: UnaryOp, sub: Expression) -> Expression {
        self.expr(ExprKind::Unary {
            op,
            sub: Box::new(sub),
        })
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn assign(&mut self, lhs: Expression, rhs: Expression) -> Expression {
        self.expr(ExprKind::Assignment {
            op: AssignmentOp::Assign,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn compound_assign(
        &mut self,
        op: AssignmentOp,
        lhs: Expression,
        rhs: Expression,
    ) -> Expression {
        self.expr(ExprKind::Assignment {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn call(&mut self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        self.expr(ExprKind::FunctionCall {
            callee: Box::new(callee),
            arguments,
            names: Vec::new(),
        })
    }

    pub fn named_call(
        &mut self,
        callee: Expression,
        arguments: Vec<Expression>,
        names: &[&str],
    ) -> Expression {
        self.expr(ExprKind::FunctionCall {
            callee: Box::new(callee),
            arguments,
            names: names.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn member(&mut self, base: Expression, name: &str) -> Expression {
        self.expr(ExprKind::MemberAccess {
            expr: Box::new(base),
            member: name.to_string(),
        })
    }

    pub fn index(&mut self, base: Expression, index: Option<Expression>) -> Expression {
        self.expr(ExprKind::IndexAccess {
            base: Box::new(base),
            index: index.map(Box::new),
        })
    }

    pub fn new_expr(&mut self, contract_name: &str) -> Expression {
        let name = self.identifier(contract_name);
        self.expr(ExprKind::New {
            contract_name: name,
        })
    }

    pub fn identifier(&mut self, name: &str) -> Identifier {
        Identifier {
            id: self.id(),
            name: name.to_string(),
            span: self.span(),
        }
    }

    // ── Statements ──────────────────────────────────────────────

    fn stmt(&mut self, kind: StmtKind) -> Statement {
        Statement {
            id: self.id(),
            kind,
            span: self.span(),
        }
    }

    pub fn expr_stmt(&mut self, expression: Expression) -> Statement {
        self.stmt(StmtKind::Expression(expression))
    }

    pub fn ret(&mut self, expression: Option<Expression>) -> Statement {
        self.stmt(StmtKind::Return(expression))
    }

    pub fn var_stmt(&mut self, variable: VariableDeclaration) -> Statement {
        self.stmt(StmtKind::VariableDeclaration(variable))
    }

    pub fn if_stmt(&mut self, condition: Expression, then_branch: Statement) -> Statement {
        self.stmt(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: None,
        })
    }

    pub fn while_stmt(&mut self, condition: Expression, body: Statement) -> Statement {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
        })
    }

    pub fn placeholder(&mut self) -> Statement {
        self.stmt(StmtKind::Placeholder)
    }

    // ── Declarations ────────────────────────────────────────────

    pub fn var(
        &mut self,
        name: &str,
        type_name: Option<TypeName>,
        value: Option<Expression>,
    ) -> VariableDeclaration {
        VariableDeclaration {
            id: self.id(),
            name: name.to_string(),
            type_name,
            value,
            visibility: Visibility::Internal,
            is_constant: false,
            is_indexed: false,
            location: None,
            span: self.span(),
        }
    }

    pub fn param(&mut self, name: &str, type_name: TypeName) -> VariableDeclaration {
        self.var(name, Some(type_name), None)
    }

    pub fn function(
        &mut self,
        name: &str,
        parameters: Vec<VariableDeclaration>,
        return_parameters: Vec<VariableDeclaration>,
        body: Option<Vec<Statement>>,
    ) -> FunctionDefinition {
        FunctionDefinition {
            id: self.id(),
            name: name.to_string(),
            visibility: Visibility::Public,
            is_declared_const: false,
            parameters,
            return_parameters,
            modifiers: Vec::new(),
            body: body.map(|statements| Block { statements }),
            span: self.span(),
        }
    }

    pub fn strukt(&mut self, name: &str, members: Vec<VariableDeclaration>) -> StructDefinition {
        StructDefinition {
            id: self.id(),
            name: name.to_string(),
            members,
            span: self.span(),
        }
    }

    pub fn enum_def(&mut self, name: &str, values: &[&str]) -> EnumDefinition {
        let id = self.id();
        let span = self.span();
        let values = values
            .iter()
            .map(|value| EnumValue {
                id: self.id(),
                name: value.to_string(),
                span: self.span(),
            })
            .collect();
        EnumDefinition {
            id,
            name: name.to_string(),
            values,
            span,
        }
    }

    pub fn event(&mut self, name: &str, parameters: Vec<VariableDeclaration>) -> EventDefinition {
        EventDefinition {
            id: self.id(),
            name: name.to_string(),
            parameters,
            span: self.span(),
        }
    }

    pub fn modifier(
        &mut self,
        name: &str,
        parameters: Vec<VariableDeclaration>,
        statements: Vec<Statement>,
    ) -> ModifierDefinition {
        ModifierDefinition {
            id: self.id(),
            name: name.to_string(),
            parameters,
            body: Block { statements },
            span: self.span(),
        }
    }

    pub fn invocation(&mut self, name: &str, arguments: Vec<Expression>) -> ModifierInvocation {
        let name = self.identifier(name);
        ModifierInvocation {
            id: self.id(),
            name,
            arguments,
            span: self.span(),
        }
    }

    pub fn base(&mut self, name: &str, arguments: Vec<Expression>) -> InheritanceSpecifier {
        let base_name = self.identifier(name);
        InheritanceSpecifier {
            id: self.id(),
            base_name,
            arguments,
            span: self.span(),
        }
    }

    pub fn contract(&mut self, name: &str) -> ContractDefinition {
        ContractDefinition {
            id: self.id(),
            name: name.to_string(),
            is_library: false,
            bases: Vec::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            state_variables: Vec::new(),
            events: Vec::new(),
            modifiers: Vec::new(),
            functions: Vec::new(),
            span: self.span(),
        }
    }
}

pub fn unit(contracts: Vec<ContractDefinition>) -> SourceUnit {
    SourceUnit { contracts }
}

// ── Result helpers ──────────────────────────────────────────────

pub fn errors_of(result: &AnalysisResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.message.clone())
        .collect()
}

pub fn has_diagnostic(result: &AnalysisResult, severity: Severity, fragment: &str) -> bool {
    result
        .diagnostics
        .iter()
        .any(|d| d.severity == severity && d.message.contains(fragment))
}

pub fn assert_error(result: &AnalysisResult, severity: Severity, fragment: &str) {
    assert!(
        has_diagnostic(result, severity, fragment),
        "expected {severity:?} containing {fragment:?}, got: {:?}",
        result
            .diagnostics
            .iter()
            .map(|d| format!("{:?}: {}", d.severity, d.message))
            .collect::<Vec<_>>()
    );
}

pub fn assert_clean(result: &AnalysisResult) {
    assert!(
        result.succeeded(),
        "expected analysis to succeed, got: {:?}",
        errors_of(result)
    );
}
