//! Registration and command-attempt failures.

use std::sync::Arc;

use command_tree_contract::FailureKind;
use thiserror::Error;

/// Error type returned by command handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why a parser rejected its input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseFailureReason {
    /// The queue was empty.
    #[error("no input was provided")]
    NoInput,
    /// Unparsable or out-of-range number.
    #[error("`{input}` is not a number in the range {min} to {max}")]
    Number {
        /// Offending token.
        input: String,
        /// Inclusive lower bound.
        min: String,
        /// Inclusive upper bound.
        max: String,
    },
    /// Unrecognized boolean word.
    #[error("`{input}` is not a boolean")]
    Boolean {
        /// Offending token.
        input: String,
    },
    /// Token is not exactly one character.
    #[error("`{input}` is not a single character")]
    Char {
        /// Offending token.
        input: String,
    },
    /// Token is not one of the accepted words.
    #[error("`{input}` is not one of: {}", .choices.join(", "))]
    Choice {
        /// Offending token.
        input: String,
        /// Accepted words.
        choices: Vec<String>,
    },
    /// Value flag given without its value.
    #[error("flag `{flag}` requires a value")]
    MissingFlagValue {
        /// Flag name.
        flag: String,
    },
    /// Flag given more than once.
    #[error("flag `{flag}` was given more than once")]
    DuplicateFlag {
        /// Flag name.
        flag: String,
    },
    /// Caller-defined parser failure.
    #[error("{0}")]
    Custom(String),
}

/// Parser failure with the position of the offending token in the original input.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{reason} (at token {position})")]
pub struct ParseFailure {
    /// Failure reason.
    pub reason: ParseFailureReason,
    /// Index of the offending token in the original input.
    pub position: usize,
}

impl ParseFailure {
    /// Creates a failure at `position`.
    pub fn new(reason: ParseFailureReason, position: usize) -> Self {
        Self { reason, position }
    }
}

/// Failure of one command attempt.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// No child matched at a node, input ended early, or tokens were left over.
    #[error(
        "invalid syntax at {}: expected {}; usage: {syntax}",
        .token.as_deref().unwrap_or("end of input"),
        expected_text(.expected)
    )]
    Syntax {
        /// Syntax of the closest registered command.
        syntax: String,
        /// Offending token, `None` when input ended early.
        token: Option<String>,
        /// Component names that would have been accepted.
        expected: Vec<String>,
    },
    /// A component's parser rejected its token(s).
    #[error("invalid value for {component}: {cause}")]
    ArgumentParse {
        /// Display form of the component, such as `<x>`.
        component: String,
        /// Underlying conversion failure.
        #[source]
        cause: ParseFailure,
    },
    /// The first token matched no root command.
    #[error("unknown command `{token}`")]
    NoSuchCommand {
        /// Offending token, empty for blank input.
        token: String,
    },
    /// The sender lacks the command permission.
    #[error("missing permission `{permission}`")]
    NoPermission {
        /// Required permission.
        permission: String,
    },
    /// The sender does not satisfy the command sender requirement.
    #[error("this command can only be used by {required}")]
    InvalidSender {
        /// Label of the required sender kind.
        required: String,
    },
    /// The handler failed, or a parser, stage, or handler panicked.
    #[error("command `{command}` failed: {cause}")]
    Execution {
        /// Syntax of the failing command, or the raw input when none was resolved.
        command: String,
        /// Original handler failure.
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// A post-processing stage vetoed the attempt.
    #[error("rejected by {stage}: {reason}")]
    Vetoed {
        /// Stage name.
        stage: String,
        /// Rejection reason.
        reason: String,
    },
    /// The attempt was cancelled before its handler started.
    #[error("command cancelled")]
    Cancelled,
}

fn expected_text(expected: &[String]) -> String {
    if expected.is_empty() {
        "no further arguments".to_string()
    } else {
        expected.join(" | ")
    }
}

impl CommandError {
    /// Failure kind used for exception handler lookup.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Syntax { .. } => FailureKind::Syntax,
            Self::ArgumentParse { .. } => FailureKind::ArgumentParse,
            Self::NoSuchCommand { .. } => FailureKind::NoSuchCommand,
            Self::NoPermission { .. } => FailureKind::NoPermission,
            Self::InvalidSender { .. } => FailureKind::InvalidSender,
            Self::Execution { .. } => FailureKind::Execution,
            Self::Vetoed { .. } => FailureKind::Vetoed,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Wraps a handler failure.
    pub fn execution(command: impl Into<String>, cause: HandlerError) -> Self {
        Self::Execution {
            command: command.into(),
            cause: Arc::from(cause),
        }
    }

    /// Converts the error into a conventional exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Syntax { .. } | Self::ArgumentParse { .. } | Self::InvalidSender { .. } => 2,
            Self::NoSuchCommand { .. } => 3,
            Self::NoPermission { .. } | Self::Vetoed { .. } => 4,
            Self::Execution { .. } => 5,
            Self::Cancelled => 130,
        }
    }
}

/// Failure while building or registering commands, parsers, or engine configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// A command without components.
    #[error("a command needs at least one component")]
    EmptyCommand,
    /// The first positional component is not a literal.
    #[error("command must start with a literal, found `{component}`")]
    RootNotLiteral {
        /// Offending component.
        component: String,
    },
    /// A command without handler.
    #[error("command `{syntax}` has no handler")]
    MissingHandler {
        /// Command syntax.
        syntax: String,
    },
    /// Greedy component followed by another positional component.
    #[error("greedy component `{component}` must be the last component")]
    GreedyNotLast {
        /// Offending component.
        component: String,
    },
    /// Required component declared after an optional one.
    #[error("required component `{component}` follows an optional component")]
    RequiredAfterOptional {
        /// Offending component.
        component: String,
    },
    /// Component name repeated inside one command.
    #[error("component name `{name}` is used twice")]
    DuplicateName {
        /// Repeated name.
        name: String,
    },
    /// Sibling with the same name but a different definition.
    #[error("`{name}` is already registered here with a different definition")]
    NameClash {
        /// Clashing name.
        name: String,
    },
    /// Two siblings could match the same input.
    #[error(
        "ambiguous node: {child} cannot be added under {parent} (children: {})",
        .siblings.join(", ")
    )]
    AmbiguousNode {
        /// Parent node display.
        parent: String,
        /// Rejected child display.
        child: String,
        /// Existing children.
        siblings: Vec<String>,
    },
    /// Same path registered twice.
    #[error("command `{syntax}` is already registered")]
    DuplicateCommand {
        /// Command syntax.
        syntax: String,
    },
    /// Numeric range with minimum above maximum.
    #[error("invalid range: minimum {min} exceeds maximum {max}")]
    InvalidRange {
        /// Declared minimum.
        min: String,
        /// Declared maximum.
        max: String,
    },
    /// Parser parameter of the wrong shape or outside the type's domain.
    #[error("invalid parser parameter {key}: {message}")]
    InvalidParameter {
        /// Parameter key.
        key: String,
        /// Explanation.
        message: String,
    },
    /// No parser supplier for the requested type.
    #[error("no parser is registered for type `{type_name}`")]
    UnknownType {
        /// Requested type.
        type_name: String,
    },
    /// Malformed declarative syntax.
    #[error("invalid command syntax `{syntax}`: {message}")]
    InvalidSyntax {
        /// Offending syntax string.
        syntax: String,
        /// Explanation.
        message: String,
    },
    /// Mutation attempted while command attempts still hold the engine.
    #[error("the engine cannot be modified while commands are in flight")]
    EngineInUse,
}
