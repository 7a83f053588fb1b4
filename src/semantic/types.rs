//! The type algebra: convertibility, operator results, canonical external
//! signatures, and exact integer-constant arithmetic.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};
use rustc_hash::FxHashMap;

use crate::ast::{BinaryOp, ElementaryTypeName, UnaryOp};

use super::ids::DeclId;
use super::scope::ScopeTable;

/// Where a reference type's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLocation {
    Storage,
    Memory,
    CallData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerModifier {
    Signed,
    Unsigned,
    /// The 160-bit account-address flavor; its own sub-lattice.
    Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicKind {
    Block,
    Message,
    Transaction,
}

/// How a function value is invoked once code is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionLocation {
    Internal,
    External,
    Creation,
    CallCode,
    DelegateCall,
    Bare,
    BareCallCode,
    BareDelegateCall,
    Send,
    Transfer,
    Sha3,
    Sha256,
    Ripemd160,
    EcRecover,
    AddMod,
    MulMod,
    Suicide,
    Event,
    SetGas,
    SetValue,
    BlockHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Ordinary,
    /// `bytes`: dynamically-sized byte array.
    Bytes,
    /// `string`: a byte array with text semantics and no index access.
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub location: DataLocation,
    pub base: Type,
    /// `None` for dynamically-sized arrays.
    pub length: Option<BigUint>,
    pub kind: ArrayKind,
}

impl ArrayType {
    pub fn new(location: DataLocation, base: Type, length: Option<BigUint>) -> Self {
        Self {
            location,
            base,
            length,
            kind: ArrayKind::Ordinary,
        }
    }

    pub fn bytes(location: DataLocation) -> Self {
        Self {
            location,
            base: Type::FixedBytes(1),
            length: None,
            kind: ArrayKind::Bytes,
        }
    }

    pub fn string(location: DataLocation) -> Self {
        Self {
            location,
            base: Type::FixedBytes(1),
            length: None,
            kind: ArrayKind::String,
        }
    }

    pub fn is_dynamically_sized(&self) -> bool {
        self.length.is_none()
    }

    pub fn is_byte_array(&self) -> bool {
        matches!(self.kind, ArrayKind::Bytes | ArrayKind::String)
    }
}

/// A function type: parameter and return vectors plus the invocation flavor.
///
/// Equality ignores names and the originating declaration; two function types
/// are equal when locations, parameter types, return types, and the
/// gas/value flags agree.
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub parameter_types: Vec<Type>,
    pub return_types: Vec<Type>,
    pub parameter_names: Vec<String>,
    pub return_names: Vec<String>,
    pub location: FunctionLocation,
    pub arbitrary_parameters: bool,
    pub gas_set: bool,
    pub value_set: bool,
    pub declaration: Option<DeclId>,
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
            && self.parameter_types == other.parameter_types
            && self.return_types == other.return_types
            && self.arbitrary_parameters == other.arbitrary_parameters
            && self.gas_set == other.gas_set
            && self.value_set == other.value_set
    }
}

impl Eq for FunctionType {}

impl FunctionType {
    pub fn new(
        parameter_types: Vec<Type>,
        return_types: Vec<Type>,
        location: FunctionLocation,
    ) -> Self {
        Self {
            parameter_types,
            return_types,
            parameter_names: Vec::new(),
            return_names: Vec::new(),
            location,
            arbitrary_parameters: false,
            gas_set: false,
            value_set: false,
            declaration: None,
        }
    }

    /// Argument-type equivalence: same arity and pairwise equal parameter
    /// types. Drives duplicate-function and override checks.
    pub fn has_equal_argument_types(&self, other: &FunctionType) -> bool {
        self.parameter_types == other.parameter_types
    }

    /// Whether a call with the given argument types can bind to this
    /// function (arity plus implicit convertibility per argument).
    pub fn can_take_arguments(&self, args: &[Type], env: &TypeEnv) -> bool {
        if !self.arbitrary_parameters && args.len() != self.parameter_types.len() {
            return false;
        }
        if self.arbitrary_parameters {
            return true;
        }
        args.iter()
            .zip(self.parameter_types.iter())
            .all(|(arg, param)| arg.is_implicitly_convertible_to(param, env))
    }

    /// Canonical ABI signature, or `None` when a parameter has no external
    /// counterpart.
    pub fn external_signature(&self, name: &str) -> Option<String> {
        let mut parts = Vec::with_capacity(self.parameter_types.len());
        for param in &self.parameter_types {
            parts.push(param.external_type()?.canonical_name()?);
        }
        Some(format!("{}({})", name, parts.join(",")))
    }
}

/// The first four bytes of the Keccak-256 hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    use tiny_keccak::{Hasher, Keccak};
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(signature.as_bytes());
    keccak.finalize(&mut output);
    [output[0], output[1], output[2], output[3]]
}

/// Declaration facts the algebra needs: names for messages and the
/// inheritance relation for contract convertibility.
pub struct TypeEnv<'a> {
    pub scopes: &'a ScopeTable,
    pub linearized: &'a FxHashMap<DeclId, Vec<DeclId>>,
}

impl<'a> TypeEnv<'a> {
    pub fn new(
        scopes: &'a ScopeTable,
        linearized: &'a FxHashMap<DeclId, Vec<DeclId>>,
    ) -> Self {
        Self { scopes, linearized }
    }

    pub fn decl_name(&self, id: DeclId) -> &str {
        &self.scopes.decl(id).name
    }

    /// True iff `base` appears in the linearization of `derived` (including
    /// `derived` itself).
    pub fn is_base_of(&self, base: DeclId, derived: DeclId) -> bool {
        base == derived
            || self
                .linearized
                .get(&derived)
                .map_or(false, |bases| bases.contains(&base))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer {
        bits: u16,
        modifier: IntegerModifier,
    },
    FixedBytes(u8),
    Bool,
    /// The type of a numeric literal before a concrete width is forced.
    IntegerConstant(BigInt),
    StringLiteral(String),
    Contract(DeclId),
    Struct {
        decl: DeclId,
        location: DataLocation,
    },
    Enum(DeclId),
    Array(Box<ArrayType>),
    Mapping {
        key: Box<Type>,
        value: Box<Type>,
    },
    Function(Box<FunctionType>),
    Modifier(Vec<Type>),
    /// A type name used as a value (`MyStruct` in `MyStruct(x)`).
    TypeType(Box<Type>),
    Magic(MagicKind),
    Void,
}

impl Type {
    pub fn uint(bits: u16) -> Type {
        Type::Integer {
            bits,
            modifier: IntegerModifier::Unsigned,
        }
    }

    pub fn int(bits: u16) -> Type {
        Type::Integer {
            bits,
            modifier: IntegerModifier::Signed,
        }
    }

    pub fn uint256() -> Type {
        Type::uint(256)
    }

    pub fn address() -> Type {
        Type::Integer {
            bits: 160,
            modifier: IntegerModifier::Address,
        }
    }

    pub fn constant(value: impl Into<BigInt>) -> Type {
        Type::IntegerConstant(value.into())
    }

    pub fn from_elementary(name: ElementaryTypeName) -> Type {
        match name {
            ElementaryTypeName::Int(bits) => Type::int(bits),
            ElementaryTypeName::Uint(bits) => Type::uint(bits),
            ElementaryTypeName::FixedBytes(n) => Type::FixedBytes(n),
            ElementaryTypeName::Address => Type::address(),
            ElementaryTypeName::Bool => Type::Bool,
            ElementaryTypeName::Bytes => Type::Array(Box::new(ArrayType::bytes(DataLocation::Storage))),
            ElementaryTypeName::String => {
                Type::Array(Box::new(ArrayType::string(DataLocation::Storage)))
            }
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(
            self,
            Type::Integer {
                modifier: IntegerModifier::Address,
                ..
            }
        )
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Type::Integer { .. }
                | Type::FixedBytes(_)
                | Type::Bool
                | Type::IntegerConstant(_)
                | Type::Contract(_)
                | Type::Enum(_)
        )
    }

    pub fn is_reference_type(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Struct { .. })
    }

    pub fn data_location(&self) -> Option<DataLocation> {
        match self {
            Type::Array(array) => Some(array.location),
            Type::Struct { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// Clone at `location` if this is a reference type, identity otherwise.
    pub fn copy_for_location_if_reference(&self, location: DataLocation) -> Type {
        match self {
            Type::Array(array) => {
                let mut array = array.clone();
                array.location = location;
                Type::Array(array)
            }
            Type::Struct { decl, .. } => Type::Struct {
                decl: *decl,
                location,
            },
            _ => self.clone(),
        }
    }

    pub fn is_implicitly_convertible_to(&self, to: &Type, env: &TypeEnv) -> bool {
        if self == to {
            return true;
        }
        match (self, to) {
            (
                Type::Integer {
                    bits: from_bits,
                    modifier: from_mod,
                },
                Type::Integer {
                    bits: to_bits,
                    modifier: to_mod,
                },
            ) => {
                if to_bits < from_bits {
                    return false;
                }
                match from_mod {
                    IntegerModifier::Address => *to_mod == IntegerModifier::Address,
                    IntegerModifier::Signed => *to_mod == IntegerModifier::Signed,
                    IntegerModifier::Unsigned => {
                        *to_mod == IntegerModifier::Unsigned
                            || (*to_mod == IntegerModifier::Signed && to_bits > from_bits)
                    }
                }
            }
            // Equal widths only; checked by the `self == to` fast path.
            (Type::FixedBytes(_), Type::FixedBytes(_)) => false,
            (Type::IntegerConstant(value), Type::Integer { bits, modifier }) => {
                constant_fits(value, *bits, *modifier)
            }
            (Type::IntegerConstant(a), Type::IntegerConstant(b)) => a == b,
            (Type::StringLiteral(text), Type::FixedBytes(n)) => text.len() <= *n as usize,
            (Type::StringLiteral(_), Type::Array(array)) => array.is_byte_array(),
            (Type::Contract(from), Type::Contract(to_contract)) => {
                env.is_base_of(*to_contract, *from)
            }
            (Type::Contract(_), Type::Integer { modifier, .. }) => {
                *modifier == IntegerModifier::Address
            }
            (Type::Enum(_), Type::Integer { modifier, .. }) => {
                *modifier != IntegerModifier::Address
            }
            (
                Type::Struct { decl: from, .. },
                Type::Struct {
                    decl: to_struct, ..
                },
            ) => from == to_struct,
            (Type::Array(from), Type::Array(to_array)) => {
                if from.kind != to_array.kind {
                    return false;
                }
                if from.is_byte_array() {
                    return true;
                }
                from.base == to_array.base
                    && (to_array.is_dynamically_sized() || from.length == to_array.length)
            }
            _ => false,
        }
    }

    pub fn is_explicitly_convertible_to(&self, to: &Type, env: &TypeEnv) -> bool {
        if self.is_implicitly_convertible_to(to, env) {
            return true;
        }
        match (self, to) {
            // Any integer to any integer, truncation allowed.
            (Type::Integer { .. }, Type::Integer { .. }) => true,
            (Type::Integer { .. }, Type::FixedBytes(_)) => !self.is_address(),
            (Type::FixedBytes(_), Type::Integer { .. }) => true,
            (Type::FixedBytes(_), Type::FixedBytes(_)) => true,
            // Bool and integers interconvert, except to address. Explicit
            // conversions are not transitive here.
            (Type::Bool, Type::Integer { modifier, .. }) => *modifier != IntegerModifier::Address,
            (Type::Integer { .. }, Type::Bool) => !self.is_address(),
            (Type::IntegerConstant(_), _) => match self.mobile_type() {
                Some(mobile) => mobile.is_explicitly_convertible_to(to, env),
                None => false,
            },
            (Type::Integer { modifier, .. }, Type::Contract(_)) => {
                *modifier == IntegerModifier::Address
            }
            (Type::Integer { modifier, .. }, Type::Enum(_)) => {
                *modifier != IntegerModifier::Address
            }
            (Type::Enum(_), Type::Integer { .. }) => true,
            // Up- and downcasts within one hierarchy.
            (Type::Contract(from), Type::Contract(to_contract)) => {
                env.is_base_of(*to_contract, *from) || env.is_base_of(*from, *to_contract)
            }
            _ => false,
        }
    }

    /// Result type of `self op other`, or `None` when the combination is
    /// illegal. Compare operators yield the common type here; the checker
    /// turns that into `bool`.
    pub fn binary_operator_result(&self, op: BinaryOp, other: &Type, env: &TypeEnv) -> Option<Type> {
        if op == BinaryOp::And || op == BinaryOp::Or {
            return if *self == Type::Bool && *other == Type::Bool {
                Some(Type::Bool)
            } else {
                None
            };
        }

        match (self, other) {
            (Type::IntegerConstant(left), Type::IntegerConstant(right))
                if op.is_arithmetic() || op.is_bit() =>
            {
                constant_binary_result(op, left, right).map(Type::IntegerConstant)
            }
            (Type::Integer { .. }, _)
            | (Type::IntegerConstant(_), _)
                if matches!(other, Type::Integer { .. } | Type::IntegerConstant(_)) =>
            {
                let common = common_type(self, other, env)?;
                if common.is_address() && !op.is_compare() {
                    return None;
                }
                if op.is_compare() || op.is_arithmetic() || op.is_bit() {
                    Some(common)
                } else {
                    None
                }
            }
            (Type::FixedBytes(n), Type::FixedBytes(m)) if n == m => {
                if op.is_compare() || op.is_bit() {
                    Some(self.clone())
                } else {
                    None
                }
            }
            (Type::Bool, Type::Bool) if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) => {
                Some(Type::Bool)
            }
            _ => None,
        }
    }

    /// Result type of a unary operator, or `None` when inapplicable. Lvalue
    /// requirements for `++`, `--`, and `delete` are the caller's job.
    pub fn unary_operator_result(&self, op: UnaryOp) -> Option<Type> {
        match op {
            UnaryOp::Not => {
                if *self == Type::Bool {
                    Some(Type::Bool)
                } else {
                    None
                }
            }
            UnaryOp::BitNot => match self {
                Type::Integer { .. } if !self.is_address() => Some(self.clone()),
                Type::FixedBytes(_) => Some(self.clone()),
                Type::IntegerConstant(value) => {
                    // Two's complement: ~x == -x - 1.
                    Some(Type::IntegerConstant(-value - BigInt::one()))
                }
                _ => None,
            },
            UnaryOp::Neg => match self {
                Type::Integer { .. } if !self.is_address() => Some(self.clone()),
                Type::IntegerConstant(value) => Some(Type::IntegerConstant(-value)),
                _ => None,
            },
            UnaryOp::Inc | UnaryOp::Dec => match self {
                Type::Integer { .. } if !self.is_address() => Some(self.clone()),
                _ => None,
            },
            UnaryOp::Delete => match self {
                Type::Integer { .. }
                | Type::FixedBytes(_)
                | Type::Bool
                | Type::Enum(_)
                | Type::Contract(_)
                | Type::Array(_)
                | Type::Struct { .. } => Some(Type::Void),
                _ => None,
            },
        }
    }

    /// The concrete type an expression of this type adopts when stored:
    /// integer constants collapse to their smallest representable integer
    /// type, everything else is unchanged.
    pub fn mobile_type(&self) -> Option<Type> {
        match self {
            Type::IntegerConstant(value) => smallest_integer_type(value),
            _ => Some(self.clone()),
        }
    }

    /// Whether a value of this type can be a struct member or state
    /// variable.
    pub fn can_be_stored(&self) -> bool {
        !matches!(
            self,
            Type::Function(_)
                | Type::Modifier(_)
                | Type::TypeType(_)
                | Type::Magic(_)
                | Type::Void
                | Type::IntegerConstant(_)
                | Type::StringLiteral(_)
        )
    }

    /// Mappings (and arrays of them) are storage-only.
    pub fn can_live_outside_storage(&self) -> bool {
        match self {
            Type::Mapping { .. } => false,
            Type::Array(array) => array.base.can_live_outside_storage(),
            _ => true,
        }
    }

    /// The type this converts to when crossing the external ABI boundary,
    /// or `None` for internal-only types.
    pub fn external_type(&self) -> Option<Type> {
        match self {
            Type::Integer { .. } | Type::FixedBytes(_) | Type::Bool => Some(self.clone()),
            Type::Contract(_) => Some(Type::address()),
            Type::Array(array) => match array.kind {
                ArrayKind::Bytes | ArrayKind::String => {
                    let mut external = array.as_ref().clone();
                    external.location = DataLocation::Memory;
                    Some(Type::Array(Box::new(external)))
                }
                ArrayKind::Ordinary => {
                    let base = array.base.external_type()?;
                    Some(Type::Array(Box::new(ArrayType::new(
                        DataLocation::Memory,
                        base,
                        array.length.clone(),
                    ))))
                }
            },
            _ => None,
        }
    }

    /// The ABI-canonical name used in external signatures.
    pub fn canonical_name(&self) -> Option<String> {
        match self {
            Type::Integer { bits, modifier } => Some(match modifier {
                IntegerModifier::Address => "address".to_string(),
                IntegerModifier::Signed => format!("int{bits}"),
                IntegerModifier::Unsigned => format!("uint{bits}"),
            }),
            Type::FixedBytes(n) => Some(format!("bytes{n}")),
            Type::Bool => Some("bool".to_string()),
            Type::Contract(_) => Some("address".to_string()),
            Type::Array(array) => match array.kind {
                ArrayKind::Bytes => Some("bytes".to_string()),
                ArrayKind::String => Some("string".to_string()),
                ArrayKind::Ordinary => {
                    let base = array.base.canonical_name()?;
                    Some(match &array.length {
                        Some(length) => format!("{base}[{length}]"),
                        None => format!("{base}[]"),
                    })
                }
            },
            _ => None,
        }
    }

    /// Human-readable form for diagnostics.
    pub fn describe(&self, env: &TypeEnv) -> String {
        match self {
            Type::Integer { bits, modifier } => match modifier {
                IntegerModifier::Address => "address".to_string(),
                IntegerModifier::Signed => format!("int{bits}"),
                IntegerModifier::Unsigned => format!("uint{bits}"),
            },
            Type::FixedBytes(n) => format!("bytes{n}"),
            Type::Bool => "bool".to_string(),
            Type::IntegerConstant(value) => format!("int_const {value}"),
            Type::StringLiteral(text) => format!("literal_string \"{text}\""),
            Type::Contract(decl) => format!("contract {}", env.decl_name(*decl)),
            Type::Struct { decl, location } => format!(
                "struct {} {}",
                env.decl_name(*decl),
                location_suffix(*location)
            ),
            Type::Enum(decl) => format!("enum {}", env.decl_name(*decl)),
            Type::Array(array) => {
                let body = match array.kind {
                    ArrayKind::Bytes => "bytes".to_string(),
                    ArrayKind::String => "string".to_string(),
                    ArrayKind::Ordinary => match &array.length {
                        Some(length) => format!("{}[{length}]", array.base.describe(env)),
                        None => format!("{}[]", array.base.describe(env)),
                    },
                };
                format!("{body} {}", location_suffix(array.location))
            }
            Type::Mapping { key, value } => {
                format!("mapping({} => {})", key.describe(env), value.describe(env))
            }
            Type::Function(function) => {
                let params: Vec<String> = function
                    .parameter_types
                    .iter()
                    .map(|t| t.describe(env))
                    .collect();
                let returns: Vec<String> = function
                    .return_types
                    .iter()
                    .map(|t| t.describe(env))
                    .collect();
                if returns.is_empty() {
                    format!("function ({})", params.join(","))
                } else {
                    format!("function ({}) returns ({})", params.join(","), returns.join(","))
                }
            }
            Type::Modifier(params) => {
                let params: Vec<String> = params.iter().map(|t| t.describe(env)).collect();
                format!("modifier ({})", params.join(","))
            }
            Type::TypeType(inner) => format!("type({})", inner.describe(env)),
            Type::Magic(kind) => match kind {
                MagicKind::Block => "block".to_string(),
                MagicKind::Message => "msg".to_string(),
                MagicKind::Transaction => "tx".to_string(),
            },
            Type::Void => "void".to_string(),
        }
    }
}

fn location_suffix(location: DataLocation) -> &'static str {
    match location {
        DataLocation::Storage => "storage",
        DataLocation::Memory => "memory",
        DataLocation::CallData => "calldata",
    }
}

/// The common type of two operands: whichever mobile type the other operand
/// converts into.
pub fn common_type(a: &Type, b: &Type, env: &TypeEnv) -> Option<Type> {
    let a_mobile = a.mobile_type()?;
    let b_mobile = b.mobile_type()?;
    if b.is_implicitly_convertible_to(&a_mobile, env) {
        Some(a_mobile)
    } else if a.is_implicitly_convertible_to(&b_mobile, env) {
        Some(b_mobile)
    } else {
        None
    }
}

fn constant_fits(value: &BigInt, bits: u16, modifier: IntegerModifier) -> bool {
    match modifier {
        IntegerModifier::Address => {
            !value.is_negative() && value.bits() <= 160
        }
        IntegerModifier::Unsigned => !value.is_negative() && value.bits() <= u64::from(bits),
        IntegerModifier::Signed => {
            let bound = BigInt::one() << (u32::from(bits) - 1);
            *value >= -bound.clone() && *value < bound
        }
    }
}

/// The smallest integer type that can represent `value`, or `None` when not
/// even 256 bits suffice.
pub fn smallest_integer_type(value: &BigInt) -> Option<Type> {
    let mut bits = 8u16;
    while bits <= 256 {
        let modifier = if value.is_negative() {
            IntegerModifier::Signed
        } else {
            IntegerModifier::Unsigned
        };
        if constant_fits(value, bits, modifier) {
            return Some(Type::Integer { bits, modifier });
        }
        bits += 8;
    }
    None
}

/// Exact arithmetic on integer constants. `None` marks an undefined result
/// (division by zero, oversized exponent).
fn constant_binary_result(op: BinaryOp, left: &BigInt, right: &BigInt) -> Option<BigInt> {
    match op {
        BinaryOp::Add => Some(left + right),
        BinaryOp::Sub => Some(left - right),
        BinaryOp::Mul => Some(left * right),
        BinaryOp::Div => {
            if right.is_zero() {
                None
            } else {
                Some(left / right)
            }
        }
        BinaryOp::Mod => {
            if right.is_zero() {
                None
            } else {
                Some(left % right)
            }
        }
        BinaryOp::Exp => {
            if right.is_negative() {
                return None;
            }
            let exponent = right.to_u32()?;
            Some(Pow::pow(left, exponent))
        }
        BinaryOp::BitAnd => Some(left & right),
        BinaryOp::BitOr => Some(left | right),
        BinaryOp::BitXor => Some(left ^ right),
        _ => None,
    }
}

/// Parse a decimal or `0x`-prefixed literal into an exact constant.
pub fn parse_integer_literal(text: &str) -> Option<BigInt> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        BigInt::parse_bytes(hex.as_bytes(), 16)
    } else {
        BigInt::parse_bytes(text.as_bytes(), 10)
    }
    .and_then(|value| {
        if value.sign() == Sign::Minus {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn env_fixtures() -> (ScopeTable, FxHashMap<DeclId, Vec<DeclId>>) {
        (ScopeTable::new(), FxHashMap::default())
    }

    #[test]
    fn integer_widening() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        assert!(Type::uint(8).is_implicitly_convertible_to(&Type::uint(16), &env));
        assert!(!Type::uint(16).is_implicitly_convertible_to(&Type::uint(8), &env));
        // Unsigned to signed only if strictly wider.
        assert!(Type::uint(8).is_implicitly_convertible_to(&Type::int(16), &env));
        assert!(!Type::uint(8).is_implicitly_convertible_to(&Type::int(8), &env));
        assert!(!Type::int(8).is_implicitly_convertible_to(&Type::uint(16), &env));
    }

    #[test]
    fn address_is_its_own_lattice() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        assert!(!Type::address().is_implicitly_convertible_to(&Type::uint256(), &env));
        assert!(!Type::uint(160).is_implicitly_convertible_to(&Type::address(), &env));
        assert!(Type::address().is_implicitly_convertible_to(&Type::address(), &env));
        // But explicit conversion between integers is unrestricted.
        assert!(Type::address().is_explicitly_convertible_to(&Type::uint256(), &env));
    }

    #[test]
    fn bool_explicit_but_not_to_address() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        assert!(Type::Bool.is_explicitly_convertible_to(&Type::uint(8), &env));
        assert!(!Type::Bool.is_explicitly_convertible_to(&Type::address(), &env));
        assert!(!Type::Bool.is_implicitly_convertible_to(&Type::uint(8), &env));
    }

    #[test]
    fn constant_fitting_boundaries() {
        let two_pow_256 = BigInt::one() << 256u32;
        assert_eq!(smallest_integer_type(&two_pow_256), None);
        assert_eq!(
            smallest_integer_type(&(two_pow_256 - BigInt::one())),
            Some(Type::uint256())
        );
        assert_eq!(smallest_integer_type(&BigInt::from(255)), Some(Type::uint(8)));
        assert_eq!(smallest_integer_type(&BigInt::from(256)), Some(Type::uint(16)));
        assert_eq!(smallest_integer_type(&BigInt::from(-128)), Some(Type::int(8)));
        assert_eq!(smallest_integer_type(&BigInt::from(-129)), Some(Type::int(16)));
    }

    #[test]
    fn constant_convertibility_tracks_value() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        let thousand = Type::constant(1000);
        assert!(thousand.is_implicitly_convertible_to(&Type::uint(16), &env));
        assert!(!thousand.is_implicitly_convertible_to(&Type::uint(8), &env));
        let addr = Type::constant(0x1234);
        assert!(addr.is_implicitly_convertible_to(&Type::address(), &env));
        let negative = Type::constant(-1);
        assert!(!negative.is_implicitly_convertible_to(&Type::address(), &env));
        assert!(negative.is_implicitly_convertible_to(&Type::int(8), &env));
    }

    #[test]
    fn constant_arithmetic_is_exact() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        let a = Type::constant(7);
        let b = Type::constant(3);
        assert_eq!(
            a.binary_operator_result(BinaryOp::Mul, &b, &env),
            Some(Type::constant(21))
        );
        assert_eq!(
            a.binary_operator_result(BinaryOp::Div, &Type::constant(0), &env),
            None
        );
        let big = Type::constant(2);
        assert_eq!(
            big.binary_operator_result(BinaryOp::Exp, &Type::constant(255), &env),
            Some(Type::IntegerConstant(BigInt::one() << 255u32))
        );
    }

    #[test]
    fn mixed_constant_integer_widens() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        // uint8 + 1000 → common type uint16.
        let result = Type::uint(8).binary_operator_result(
            BinaryOp::Add,
            &Type::constant(1000),
            &env,
        );
        assert_eq!(result, Some(Type::uint(16)));
    }

    #[test]
    fn address_has_no_arithmetic() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        assert_eq!(
            Type::address().binary_operator_result(BinaryOp::Add, &Type::address(), &env),
            None
        );
        assert_eq!(
            Type::address().binary_operator_result(BinaryOp::Eq, &Type::address(), &env),
            Some(Type::address())
        );
    }

    #[test]
    fn fixed_bytes_operators() {
        let (scopes, lin) = env_fixtures();
        let env = TypeEnv::new(&scopes, &lin);
        let b4 = Type::FixedBytes(4);
        assert_eq!(
            b4.binary_operator_result(BinaryOp::BitXor, &Type::FixedBytes(4), &env),
            Some(b4.clone())
        );
        assert_eq!(
            b4.binary_operator_result(BinaryOp::BitXor, &Type::FixedBytes(8), &env),
            None
        );
        assert_eq!(
            b4.binary_operator_result(BinaryOp::Add, &Type::FixedBytes(4), &env),
            None
        );
    }

    #[test]
    fn unary_results() {
        assert_eq!(Type::Bool.unary_operator_result(UnaryOp::Not), Some(Type::Bool));
        assert_eq!(Type::uint(8).unary_operator_result(UnaryOp::Not), None);
        assert_eq!(
            Type::uint(8).unary_operator_result(UnaryOp::Inc),
            Some(Type::uint(8))
        );
        assert_eq!(Type::address().unary_operator_result(UnaryOp::BitNot), None);
        assert_eq!(
            Type::constant(5).unary_operator_result(UnaryOp::BitNot),
            Some(Type::constant(-6))
        );
    }

    #[test]
    fn mappings_are_storage_bound() {
        let mapping = Type::Mapping {
            key: Box::new(Type::uint256()),
            value: Box::new(Type::uint256()),
        };
        assert!(!mapping.can_live_outside_storage());
        let array_of_mapping = Type::Array(Box::new(ArrayType::new(
            DataLocation::Storage,
            mapping,
            None,
        )));
        assert!(!array_of_mapping.can_live_outside_storage());
        assert!(Type::uint256().can_live_outside_storage());
    }

    #[test]
    fn external_signatures() {
        let f = FunctionType::new(
            vec![Type::uint256(), Type::address()],
            vec![Type::Bool],
            FunctionLocation::External,
        );
        assert_eq!(
            f.external_signature("transfer").as_deref(),
            Some("transfer(uint256,address)")
        );

        let with_array = FunctionType::new(
            vec![Type::Array(Box::new(ArrayType::new(
                DataLocation::Memory,
                Type::uint(8),
                Some(BigUint::from(4u32)),
            )))],
            vec![],
            FunctionLocation::External,
        );
        assert_eq!(
            with_array.external_signature("g").as_deref(),
            Some("g(uint8[4])")
        );
    }

    #[test]
    fn mapping_has_no_external_signature() {
        let f = FunctionType::new(
            vec![Type::Mapping {
                key: Box::new(Type::uint256()),
                value: Box::new(Type::uint256()),
            }],
            vec![],
            FunctionLocation::External,
        );
        assert_eq!(f.external_signature("f"), None);
    }

    #[test]
    fn selector_of_known_signature() {
        // The canonical ERC-20 transfer selector.
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn signature_round_trip() {
        // Parsing a produced signature recovers the original type vector.
        fn parse_type(text: &str) -> Type {
            if let Some(open) = text.rfind('[') {
                let base = parse_type(&text[..open]);
                let inner = &text[open + 1..text.len() - 1];
                let length = if inner.is_empty() {
                    None
                } else {
                    Some(inner.parse::<u64>().unwrap().into())
                };
                return Type::Array(Box::new(ArrayType::new(
                    DataLocation::Memory,
                    base,
                    length,
                )));
            }
            match text {
                "bool" => Type::Bool,
                "address" => Type::address(),
                "bytes" => Type::Array(Box::new(ArrayType::bytes(DataLocation::Memory))),
                "string" => Type::Array(Box::new(ArrayType::string(DataLocation::Memory))),
                _ if text.starts_with("uint") => Type::uint(text[4..].parse().unwrap()),
                _ if text.starts_with("int") => Type::int(text[3..].parse().unwrap()),
                _ if text.starts_with("bytes") => Type::FixedBytes(text[5..].parse().unwrap()),
                other => panic!("unexpected canonical name {other}"),
            }
        }

        let params = vec![
            Type::uint256(),
            Type::address(),
            Type::FixedBytes(32),
            Type::Array(Box::new(ArrayType::new(
                DataLocation::Memory,
                Type::int(64),
                None,
            ))),
            Type::Array(Box::new(ArrayType::string(DataLocation::Memory))),
        ];
        let f = FunctionType::new(params.clone(), vec![], FunctionLocation::External);
        let sig = f.external_signature("f").unwrap();
        let inner = &sig[2..sig.len() - 1];
        let reparsed: Vec<Type> = inner.split(',').map(parse_type).collect();
        let externals: Vec<Type> = params.iter().map(|p| p.external_type().unwrap()).collect();
        assert_eq!(reparsed, externals);
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse_integer_literal("1234"), Some(BigInt::from(1234)));
        assert_eq!(parse_integer_literal("0x1234"), Some(BigInt::from(0x1234)));
        assert_eq!(parse_integer_literal("zzz"), None);
    }
}
