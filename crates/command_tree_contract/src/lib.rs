//! Shared command contracts used by the command tree engine and its platform adapters.
//!
//! This crate is intentionally runtime-agnostic. It defines serializable argument values, parser
//! type keys and parameters, declarative specifiers, failure kinds, and command metadata without
//! depending on the engine, a sender type, or any executor.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value bound to a non-literal component after a successful parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ArgValue {
    /// Boolean value, also used for presence flags.
    Bool(bool),
    /// Integral value of any width.
    Int(i64),
    /// Floating point value of any width.
    Float(f64),
    /// Single character.
    Char(char),
    /// Text value, including greedy joins and choices.
    Text(String),
}

impl ArgValue {
    /// Returns the canonical type key of the stored value.
    pub fn type_key(&self) -> TypeKey {
        match self {
            Self::Bool(_) => TypeKey::Boolean,
            Self::Int(_) => TypeKey::Long,
            Self::Float(_) => TypeKey::Double,
            Self::Char(_) => TypeKey::Char,
            Self::Text(_) => TypeKey::String,
        }
    }
}

/// Conversion from a bound [`ArgValue`] into a concrete Rust type.
pub trait FromArgValue: Sized {
    /// Converts `value`, returning `None` when the variant or width does not fit.
    fn from_arg(value: &ArgValue) -> Option<Self>;
}

macro_rules! int_from_arg {
    ($($ty:ty),*) => {
        $(
            impl FromArgValue for $ty {
                fn from_arg(value: &ArgValue) -> Option<Self> {
                    match value {
                        ArgValue::Int(raw) => <$ty>::try_from(*raw).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_from_arg!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromArgValue for f64 {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(raw) => Some(*raw),
            ArgValue::Int(raw) => Some(*raw as f64),
            _ => None,
        }
    }
}

impl FromArgValue for f32 {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        f64::from_arg(value).map(|raw| raw as f32)
    }
}

impl FromArgValue for bool {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(raw) => Some(*raw),
            _ => None,
        }
    }
}

impl FromArgValue for char {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Char(raw) => Some(*raw),
            _ => None,
        }
    }
}

impl FromArgValue for String {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Text(raw) => Some(raw.clone()),
            ArgValue::Char(raw) => Some(raw.to_string()),
            _ => None,
        }
    }
}

impl FromArgValue for ArgValue {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        Some(value.clone())
    }
}

/// Semantic type key used to look up parser suppliers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKey {
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Boolean.
    Boolean,
    /// Single character.
    Char,
    /// Text.
    String,
    /// Caller-defined type registered by name.
    Custom(String),
}

impl TypeKey {
    /// Resolves a type name or primitive alias (`i32`, `int`, `bool`, ...) to its key.
    ///
    /// Unknown names become [`TypeKey::Custom`] so that caller-registered suppliers can be found.
    pub fn from_name(raw: &str) -> Self {
        Self::Custom(raw.to_string()).canonical()
    }

    /// Maps primitive aliases onto their canonical key before registry lookup.
    pub fn canonical(&self) -> Self {
        let Self::Custom(name) = self else {
            return self.clone();
        };
        match name.to_ascii_lowercase().as_str() {
            "i8" | "byte" => Self::Byte,
            "i16" | "short" => Self::Short,
            "i32" | "int" | "integer" => Self::Integer,
            "i64" | "long" => Self::Long,
            "f32" | "float" => Self::Float,
            "f64" | "double" => Self::Double,
            "bool" | "boolean" => Self::Boolean,
            "char" | "character" => Self::Char,
            "str" | "string" | "text" => Self::String,
            _ => self.clone(),
        }
    }

    /// Whether the key is one of the built-in numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.canonical(),
            Self::Byte | Self::Short | Self::Integer | Self::Long | Self::Float | Self::Double
        )
    }

    /// Whether the key is an integral numeric type.
    pub fn is_integral(&self) -> bool {
        matches!(
            self.canonical(),
            Self::Byte | Self::Short | Self::Integer | Self::Long
        )
    }

    /// Display name used in syntax strings.
    pub fn display_name(&self) -> String {
        match self {
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Integer => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Boolean => "bool".to_string(),
            Self::Char => "char".to_string(),
            Self::String => "string".to_string(),
            Self::Custom(name) => name.clone(),
        }
    }
}

/// Rust types with a registered default parser key.
pub trait ArgumentType: FromArgValue {
    /// Registry key for the type.
    fn type_key() -> TypeKey;
}

macro_rules! argument_type {
    ($($ty:ty => $key:ident),* $(,)?) => {
        $(
            impl ArgumentType for $ty {
                fn type_key() -> TypeKey {
                    TypeKey::$key
                }
            }
        )*
    };
}

argument_type!(
    i8 => Byte,
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    char => Char,
    String => String,
);

/// Well-known parser parameter keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKey {
    /// Inclusive lower numeric bound.
    RangeMin,
    /// Inclusive upper numeric bound.
    RangeMax,
    /// String parsing consumes all remaining tokens.
    Greedy,
    /// Fixed set of accepted words.
    Choices,
    /// Caller-defined parameter.
    Custom(String),
}

/// Parser parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean switch.
    Bool(bool),
    /// Integral value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// List of words.
    List(Vec<String>),
}

/// Parameter set passed to parser factories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParserParameters(BTreeMap<ParameterKey, ParamValue>);

impl ParserParameters {
    /// Empty parameter set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn store(&mut self, key: ParameterKey, value: ParamValue) {
        self.0.insert(key, value);
    }

    /// Builder-style [`ParserParameters::store`].
    pub fn with(mut self, key: ParameterKey, value: ParamValue) -> Self {
        self.store(key, value);
        self
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &ParameterKey) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &ParameterKey) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a boolean parameter, `false` when absent or of another shape.
    pub fn flag(&self, key: &ParameterKey) -> bool {
        matches!(self.0.get(key), Some(ParamValue::Bool(true)))
    }

    /// Merges `other` into `self`.
    ///
    /// Keys only present on one side are kept regardless of merge order. When both sides hold the
    /// same key, the value from `other` (the last applied set) wins.
    pub fn merge(&mut self, other: ParserParameters) {
        self.0.extend(other.0);
    }

    /// Whether no parameter is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates stored parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParameterKey, &ParamValue)> {
        self.0.iter()
    }
}

/// Declarative specifier attached to an argument declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Specifier {
    /// Inclusive numeric range; an empty bound is left open.
    Range {
        /// Lower bound text.
        min: Option<String>,
        /// Upper bound text.
        max: Option<String>,
    },
    /// Consume all remaining tokens.
    Greedy,
    /// Accept one of a fixed set of words.
    Choices {
        /// Accepted words.
        values: Vec<String>,
    },
    /// Caller-defined specifier.
    Custom {
        /// Specifier name used for mapper lookup.
        name: String,
        /// Raw specifier payload.
        value: String,
    },
}

impl Specifier {
    /// Mapper lookup key.
    pub fn kind(&self) -> SpecifierKind {
        match self {
            Self::Range { .. } => SpecifierKind::Range,
            Self::Greedy => SpecifierKind::Greedy,
            Self::Choices { .. } => SpecifierKind::Choices,
            Self::Custom { name, .. } => SpecifierKind::Custom(name.clone()),
        }
    }
}

/// Specifier discriminant used as annotation mapper key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecifierKind {
    /// [`Specifier::Range`].
    Range,
    /// [`Specifier::Greedy`].
    Greedy,
    /// [`Specifier::Choices`].
    Choices,
    /// [`Specifier::Custom`] with the given name.
    Custom(String),
}

/// How many tokens a component consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArityClass {
    /// Fixed text path segment.
    Literal,
    /// Exactly one token.
    Single,
    /// Order-independent marker, optionally followed by a value token.
    Flag,
    /// All remaining tokens, final position only.
    Greedy,
}

/// Literal matching policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiteralCase {
    /// Literal text must match exactly.
    #[default]
    Sensitive,
    /// Literal text matches ignoring case.
    Insensitive,
}

impl LiteralCase {
    /// Compares a literal against input text under this policy.
    pub fn matches(self, literal: &str, input: &str) -> bool {
        match self {
            Self::Sensitive => literal == input,
            Self::Insensitive => literal.to_lowercase() == input.to_lowercase(),
        }
    }

    /// Whether `literal` starts with `prefix` under this policy.
    pub fn starts_with(self, literal: &str, prefix: &str) -> bool {
        match self {
            Self::Sensitive => literal.starts_with(prefix),
            Self::Insensitive => literal.to_lowercase().starts_with(&prefix.to_lowercase()),
        }
    }
}

/// Registration-time policy for sibling non-literal components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// A node may carry at most one non-literal child.
    #[default]
    Reject,
    /// Several non-literal children are allowed; the first one in registration order that
    /// parses wins.
    RegistrationOrder,
}

/// Failure categories with an explicit fallback order for handler lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Catch-all root.
    Any,
    /// Any failure raised while resolving a command.
    Parse,
    /// No child matched at a node.
    Syntax,
    /// A component rejected its token(s).
    ArgumentParse,
    /// No root literal matched.
    NoSuchCommand,
    /// The sender lacks the command permission.
    NoPermission,
    /// The sender does not satisfy the command sender requirement.
    InvalidSender,
    /// The handler failed.
    Execution,
    /// A post-processing stage vetoed the attempt.
    Vetoed,
    /// The attempt was cancelled before its handler started.
    Cancelled,
}

impl FailureKind {
    /// Declared parent kind, `None` for [`FailureKind::Any`].
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Any => None,
            Self::Parse | Self::Execution | Self::Vetoed | Self::Cancelled => Some(Self::Any),
            Self::Syntax
            | Self::ArgumentParse
            | Self::NoSuchCommand
            | Self::NoPermission
            | Self::InvalidSender => Some(Self::Parse),
        }
    }

    /// This kind followed by its ancestors up to [`FailureKind::Any`].
    pub fn lineage(self) -> Vec<Self> {
        let mut out = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            out.push(parent);
            current = parent;
        }
        out
    }
}

/// Optional metadata attached to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMeta {
    /// Short description.
    pub description: Option<String>,
    /// Permission required to run the command.
    pub permission: Option<String>,
    /// Hidden commands are callable but omitted from listings.
    pub hidden: bool,
}

/// Serializable description of one component in a command path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Component name.
    pub name: String,
    /// Arity class.
    pub arity: ArityClass,
    /// Parser type key, when built from the registry.
    pub type_key: Option<TypeKey>,
    /// Whether the component must be present.
    pub required: bool,
    /// Literal or flag aliases.
    pub aliases: Vec<String>,
}

/// Serializable description of a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Rendered syntax such as `math add <x> <y>`.
    pub syntax: String,
    /// Positional components followed by flags.
    pub components: Vec<ComponentDescriptor>,
    /// Command metadata.
    pub meta: CommandMeta,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn primitive_aliases_resolve_to_canonical_keys() {
        assert_eq!(TypeKey::from_name("i32"), TypeKey::Integer);
        assert_eq!(TypeKey::from_name("INT"), TypeKey::Integer);
        assert_eq!(TypeKey::from_name("bool"), TypeKey::Boolean);
        assert_eq!(
            TypeKey::from_name("player"),
            TypeKey::Custom("player".to_string())
        );
        assert_eq!(TypeKey::Long.canonical(), TypeKey::Long);
    }

    #[test]
    fn merge_keeps_disjoint_keys_in_any_order() {
        let min = ParserParameters::empty().with(ParameterKey::RangeMin, ParamValue::Int(1));
        let max = ParserParameters::empty().with(ParameterKey::RangeMax, ParamValue::Int(9));

        let mut forward = min.clone();
        forward.merge(max.clone());
        let mut backward = max;
        backward.merge(min);

        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_conflicts_take_last_applied_value() {
        let mut params = ParserParameters::empty().with(ParameterKey::RangeMin, ParamValue::Int(1));
        params.merge(ParserParameters::empty().with(ParameterKey::RangeMin, ParamValue::Int(5)));
        assert_eq!(
            params.get(&ParameterKey::RangeMin),
            Some(&ParamValue::Int(5))
        );
    }

    #[test]
    fn failure_lineage_ends_at_any() {
        assert_eq!(
            FailureKind::Syntax.lineage(),
            vec![FailureKind::Syntax, FailureKind::Parse, FailureKind::Any]
        );
        assert_eq!(
            FailureKind::Execution.lineage(),
            vec![FailureKind::Execution, FailureKind::Any]
        );
        assert_eq!(FailureKind::Any.lineage(), vec![FailureKind::Any]);
    }

    #[test]
    fn int_values_convert_with_width_checks() {
        assert_eq!(i32::from_arg(&ArgValue::Int(42)), Some(42));
        assert_eq!(i8::from_arg(&ArgValue::Int(300)), None);
        assert_eq!(f64::from_arg(&ArgValue::Int(2)), Some(2.0));
        assert_eq!(String::from_arg(&ArgValue::Int(2)), None);
    }

    #[test]
    fn failure_kind_serializes_kebab_case() {
        let raw = serde_json::to_string(&FailureKind::NoSuchCommand).expect("serialize");
        assert_eq!(raw, "\"no-such-command\"");
    }
}
