//! Immutable argument components: literals, typed values, flags, and greedy tails.

use std::{fmt, sync::Arc};

use command_tree_contract::{
    ArityClass, ComponentDescriptor, LiteralCase, ParserParameters, TypeKey,
};

use crate::{context::CommandContext, parser::SharedParser};

/// Caller-supplied value hints for a component, given the partial token.
pub type SuggestionProvider<C> = Arc<dyn Fn(&CommandContext<C>, &str) -> Vec<String> + Send + Sync>;

/// Named node of a command path.
///
/// Builder methods consume `self`; a component never changes once it is part of a command.
pub struct CommandComponent<C> {
    name: String,
    arity: ArityClass,
    aliases: Vec<String>,
    parser: Option<SharedParser<C>>,
    type_key: Option<TypeKey>,
    parameters: ParserParameters,
    required: bool,
    default_value: Option<String>,
    suggestions: Option<SuggestionProvider<C>>,
    description: Option<String>,
}

impl<C> Clone for CommandComponent<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            arity: self.arity,
            aliases: self.aliases.clone(),
            parser: self.parser.clone(),
            type_key: self.type_key.clone(),
            parameters: self.parameters.clone(),
            required: self.required,
            default_value: self.default_value.clone(),
            suggestions: self.suggestions.clone(),
            description: self.description.clone(),
        }
    }
}

impl<C> fmt::Debug for CommandComponent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandComponent")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("aliases", &self.aliases)
            .field("type_key", &self.type_key)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}

impl<C> CommandComponent<C> {
    /// Fixed path segment.
    pub fn literal(name: impl Into<String>) -> Self {
        Self::bare(name.into(), ArityClass::Literal, None)
    }

    /// Required single-token component with an explicit parser.
    pub fn required(name: impl Into<String>, parser: SharedParser<C>) -> Self {
        Self::bare(name.into(), ArityClass::Single, Some(parser))
    }

    /// Optional single-token component with an explicit parser.
    pub fn optional(name: impl Into<String>, parser: SharedParser<C>) -> Self {
        Self::required(name, parser).into_optional()
    }

    /// Required component consuming every remaining token.
    pub fn greedy(name: impl Into<String>, parser: SharedParser<C>) -> Self {
        Self::bare(name.into(), ArityClass::Greedy, Some(parser))
    }

    /// Presence flag binding `true` when given.
    pub fn flag(name: impl Into<String>) -> Self {
        let mut component = Self::bare(name.into(), ArityClass::Flag, None);
        component.required = false;
        component
    }

    /// Flag followed by one value token parsed with `parser`.
    pub fn value_flag(name: impl Into<String>, parser: SharedParser<C>) -> Self {
        let mut component = Self::bare(name.into(), ArityClass::Flag, Some(parser));
        component.required = false;
        component
    }

    pub(crate) fn typed(
        name: impl Into<String>,
        arity: ArityClass,
        type_key: TypeKey,
        parameters: ParserParameters,
        parser: SharedParser<C>,
    ) -> Self {
        let mut component = Self::bare(name.into(), arity, Some(parser));
        component.type_key = Some(type_key);
        component.parameters = parameters;
        component
    }

    fn bare(name: String, arity: ArityClass, parser: Option<SharedParser<C>>) -> Self {
        Self {
            name,
            arity,
            aliases: Vec::new(),
            parser,
            type_key: None,
            parameters: ParserParameters::empty(),
            required: true,
            default_value: None,
            suggestions: None,
            description: None,
        }
    }

    /// Adds alternative spellings for literals and flags.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Raw text parsed when the component is omitted; makes the component optional.
    pub fn with_default(mut self, raw: impl Into<String>) -> Self {
        self.default_value = Some(raw.into());
        self.into_optional()
    }

    /// Replaces the parser's value hints.
    pub fn with_suggestions<F>(mut self, provider: F) -> Self
    where
        F: Fn(&CommandContext<C>, &str) -> Vec<String> + Send + Sync + 'static,
    {
        self.suggestions = Some(Arc::new(provider));
        self
    }

    /// Short help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks a non-literal component optional.
    pub fn into_optional(mut self) -> Self {
        if self.arity != ArityClass::Literal {
            self.required = false;
        }
        self
    }

    /// Turns a typed single-value component into a value flag.
    pub fn into_flag(mut self) -> Self {
        self.arity = ArityClass::Flag;
        self.required = false;
        self.default_value = None;
        self
    }

    /// Component name; also the key of its bound value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arity class.
    pub fn arity(&self) -> ArityClass {
        self.arity
    }

    /// Alternative spellings.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Parser, absent for literals and presence flags.
    pub fn parser(&self) -> Option<&SharedParser<C>> {
        self.parser.as_ref()
    }

    /// Registry type key, when the component was built from the registry.
    pub fn type_key(&self) -> Option<&TypeKey> {
        self.type_key.as_ref()
    }

    /// Parser parameters the component was built with.
    pub fn parameters(&self) -> &ParserParameters {
        &self.parameters
    }

    /// Whether the component must appear in the input.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Raw default value.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Help text.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether this is a literal.
    pub fn is_literal(&self) -> bool {
        self.arity == ArityClass::Literal
    }

    /// Whether this is a flag.
    pub fn is_flag(&self) -> bool {
        self.arity == ArityClass::Flag
    }

    /// Whether this flag takes a value token.
    pub fn takes_value(&self) -> bool {
        self.is_flag() && self.parser.is_some()
    }

    /// Names the literal answers to.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `token` selects this literal.
    pub fn matches_literal(&self, token: &str, case: LiteralCase) -> bool {
        self.is_literal() && self.names().any(|name| case.matches(name, token))
    }

    /// Whether `token` is a marker for this flag: `-name`, `--name`, or `-alias`.
    pub fn matches_flag(&self, token: &str) -> bool {
        if !self.is_flag() {
            return false;
        }
        if let Some(long) = token.strip_prefix("--") {
            return long == self.name;
        }
        token
            .strip_prefix('-')
            .is_some_and(|short| self.names().any(|name| name == short))
    }

    /// Whether two same-named components could share one tree node.
    pub fn signature_matches(&self, other: &Self) -> bool {
        if self.arity != other.arity || self.required != other.required {
            return false;
        }
        if self.is_literal() {
            return true;
        }
        if self.default_value != other.default_value {
            return false;
        }
        match (&self.type_key, &other.type_key) {
            (Some(left), Some(right)) => left == right && self.parameters == other.parameters,
            (None, None) => match (&self.parser, &other.parser) {
                (Some(left), Some(right)) => Arc::ptr_eq(left, right),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// Rendering used in syntax strings and error messages.
    pub fn display(&self) -> String {
        match self.arity {
            ArityClass::Literal => self.name.clone(),
            ArityClass::Flag => format!("[-{}]", self.name),
            ArityClass::Greedy if self.required => format!("<{}...>", self.name),
            ArityClass::Greedy => format!("[{}...]", self.name),
            ArityClass::Single if self.required => format!("<{}>", self.name),
            ArityClass::Single => format!("[{}]", self.name),
        }
    }

    /// Flag marker offered during suggestion.
    pub fn flag_marker(&self) -> String {
        format!("-{}", self.name)
    }

    /// Value hints for `input`: the component provider, else the parser's own hints.
    pub fn suggest(&self, context: &CommandContext<C>, input: &str) -> Vec<String> {
        if let Some(provider) = &self.suggestions {
            return provider(context, input);
        }
        self.parser
            .as_ref()
            .map(|parser| parser.suggestions(context, input))
            .unwrap_or_default()
    }

    /// Serializable description.
    pub fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: self.name.clone(),
            arity: self.arity,
            type_key: self.type_key.clone(),
            required: self.required,
            aliases: self.aliases.clone(),
        }
    }
}
