//! Argument parser abstraction, standard parsers, and the parser registry.

pub mod registry;
pub mod standard;

use std::sync::Arc;

use command_tree_contract::ArgValue;

use crate::{context::CommandContext, error::ParseFailure, tokens::TokenQueue};

pub use registry::{AnnotationMapper, ParserRegistry, ParserSupplier};
pub use standard::{
    BooleanParser, CharParser, ChoiceParser, FloatParser, IntegerParser, StringParser,
};

/// Converts tokens from the head of a queue into a typed value.
///
/// Implementations must be pure functions of their inputs: the tree calls them speculatively
/// during disambiguation and suggestion walks, on copies of the queue.
pub trait ArgumentParser<C>: Send + Sync {
    /// Consumes one or more tokens from `input` and returns the bound value.
    fn parse(&self, context: &CommandContext<C>, input: &mut TokenQueue)
        -> Result<ArgValue, ParseFailure>;

    /// Value-space hints for the partial token `input`.
    fn suggestions(&self, _context: &CommandContext<C>, _input: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Shared parser handle stored on components.
pub type SharedParser<C> = Arc<dyn ArgumentParser<C>>;
