//! The input AST for one source unit.
//!
//! The tree is produced by the parser and is immutable during analysis; all
//! analysis output lives in side tables keyed by [`NodeId`]. Every node that
//! can carry an annotation has a stable id assigned at construction time.

use crate::span::Span;

/// Stable identifier of an AST node, assigned by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Hands out fresh node ids during AST construction.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// One parsed source unit: an ordered list of contract definitions.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub contracts: Vec<ContractDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Internal,
    Public,
    External,
}

/// Declared data location keyword on a variable, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    Storage,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ContractDefinition {
    pub id: NodeId,
    pub name: String,
    pub is_library: bool,
    pub bases: Vec<InheritanceSpecifier>,
    pub structs: Vec<StructDefinition>,
    pub enums: Vec<EnumDefinition>,
    pub state_variables: Vec<VariableDeclaration>,
    pub events: Vec<EventDefinition>,
    pub modifiers: Vec<ModifierDefinition>,
    pub functions: Vec<FunctionDefinition>,
    pub span: Span,
}

/// A base-contract mention in a contract header, with optional constructor
/// arguments (`is Base(1, 2)`).
#[derive(Debug, Clone)]
pub struct InheritanceSpecifier {
    pub id: NodeId,
    pub base_name: Identifier,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDefinition {
    pub id: NodeId,
    pub name: String,
    pub members: Vec<VariableDeclaration>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDefinition {
    pub id: NodeId,
    pub name: String,
    pub values: Vec<EnumValue>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

/// A function definition. An empty name marks the fallback function; a name
/// equal to the enclosing contract's marks the constructor.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub name: String,
    pub visibility: Visibility,
    pub is_declared_const: bool,
    pub parameters: Vec<VariableDeclaration>,
    pub return_parameters: Vec<VariableDeclaration>,
    pub modifiers: Vec<ModifierInvocation>,
    /// `None` for abstract functions (declared but not implemented).
    pub body: Option<Block>,
    pub span: Span,
}

impl FunctionDefinition {
    pub fn is_implemented(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ModifierDefinition {
    pub id: NodeId,
    pub name: String,
    pub parameters: Vec<VariableDeclaration>,
    pub body: Block,
    pub span: Span,
}

/// A modifier usage on a function: either a declared modifier or, on a
/// constructor, a base contract with constructor arguments.
#[derive(Debug, Clone)]
pub struct ModifierInvocation {
    pub id: NodeId,
    pub name: Identifier,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EventDefinition {
    pub id: NodeId,
    pub name: String,
    pub parameters: Vec<VariableDeclaration>,
    pub span: Span,
}

/// A variable declaration: state variable, parameter, struct member, event
/// parameter, or local. A missing type name means `var` (inferred).
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub name: String,
    pub type_name: Option<TypeName>,
    pub value: Option<Expression>,
    pub visibility: Visibility,
    pub is_constant: bool,
    pub is_indexed: bool,
    pub location: Option<StorageLocation>,
    pub span: Span,
}

// ── Type names ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeName {
    pub id: NodeId,
    pub kind: TypeNameKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeNameKind {
    Elementary(ElementaryTypeName),
    /// Dotted path to a contract, struct, or enum (`A.B.C`).
    UserDefined(Vec<String>),
    Mapping {
        key: Box<TypeName>,
        value: Box<TypeName>,
    },
    Array {
        base: Box<TypeName>,
        length: Option<Box<Expression>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementaryTypeName {
    /// Signed integer of the given bit width (8, 16, …, 256).
    Int(u16),
    /// Unsigned integer of the given bit width.
    Uint(u16),
    /// Fixed-size byte sequence, 1..=32 bytes.
    FixedBytes(u8),
    Address,
    Bool,
    /// Dynamically-sized byte array.
    Bytes,
    String,
}

// ── Statements ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Block),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        loop_expr: Option<Expression>,
        body: Box<Statement>,
    },
    Continue,
    Break,
    Return(Option<Expression>),
    VariableDeclaration(VariableDeclaration),
    Expression(Expression),
    /// The `_` statement inside modifier bodies.
    Placeholder,
}

// ── Expressions ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Identifier {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Identifier(String),
    Literal(Literal),
    /// An elementary type name in expression position (`uint(x)`, `uint[5]`).
    ElementaryTypeName(ElementaryTypeName),
    Unary {
        op: UnaryOp,
        sub: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assignment {
        op: AssignmentOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    FunctionCall {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        /// Argument names for named calls (`f({x: 1})`); empty = positional.
        names: Vec<String>,
    },
    New {
        contract_name: Identifier,
    },
    MemberAccess {
        expr: Box<Expression>,
        member: String,
    },
    IndexAccess {
        base: Box<Expression>,
        index: Option<Box<Expression>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Decimal or `0x`-prefixed number, kept textual for exact-value parsing.
    Number(String),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
    Inc,
    Dec,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Neg => "-",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::Exp
        )
    }

    pub fn is_bit(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEq => "<=",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
}

impl AssignmentOp {
    /// The binary operator a compound assignment expands to.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::BitAndAssign => Some(BinaryOp::BitAnd),
            AssignmentOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignmentOp::BitXorAssign => Some(BinaryOp::BitXor),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentOp::Assign => "=",
            AssignmentOp::AddAssign => "+=",
            AssignmentOp::SubAssign => "-=",
            AssignmentOp::MulAssign => "*=",
            AssignmentOp::DivAssign => "/=",
            AssignmentOp::ModAssign => "%=",
            AssignmentOp::BitAndAssign => "&=",
            AssignmentOp::BitOrAssign => "|=",
            AssignmentOp::BitXorAssign => "^=",
        }
    }
}
