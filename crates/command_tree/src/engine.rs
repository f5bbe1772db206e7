//! Shared read-only engine state and the parse, gate, and execute steps of one attempt.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use command_tree_contract::{AmbiguityPolicy, LiteralCase};
use tracing::{debug, warn};

use crate::{
    command::Command,
    context::{CommandContext, CommandResult},
    error::CommandError,
    exception::ExceptionController,
    parser::ParserRegistry,
    postprocess::PostprocessingPipeline,
    tokens::TokenQueue,
    tree::CommandTree,
};

/// Tree, parser registry, post-processing stages, and exception table.
///
/// Shared behind an `Arc` by every in-flight attempt; it is only mutated during setup, through
/// [`crate::CommandManager`].
#[derive(Debug)]
pub struct CommandEngine<C> {
    pub(crate) tree: CommandTree<C>,
    pub(crate) registry: ParserRegistry<C>,
    pub(crate) postprocessing: PostprocessingPipeline<C>,
    pub(crate) exceptions: ExceptionController<C>,
}

impl<C: 'static> CommandEngine<C> {
    /// Empty engine with the standard parsers.
    pub fn new(case: LiteralCase, ambiguity: AmbiguityPolicy) -> Self {
        Self {
            tree: CommandTree::new(case, ambiguity),
            registry: ParserRegistry::new(),
            postprocessing: PostprocessingPipeline::default(),
            exceptions: ExceptionController::new(),
        }
    }
}

impl<C> CommandEngine<C> {
    /// Command tree.
    pub fn tree(&self) -> &CommandTree<C> {
        &self.tree
    }

    /// Parser registry.
    pub fn parser_registry(&self) -> &ParserRegistry<C> {
        &self.registry
    }

    /// Post-processing pipeline.
    pub fn postprocessing(&self) -> &PostprocessingPipeline<C> {
        &self.postprocessing
    }

    /// Exception handler table.
    pub fn exceptions(&self) -> &ExceptionController<C> {
        &self.exceptions
    }

    /// Resolves the command for `input`.
    ///
    /// # Errors
    ///
    /// Returns the tree's parse failure after routing it through the exception table. A
    /// panicking parser is reported as [`CommandError::Execution`] against the raw input.
    pub fn resolve(
        &self,
        context: &mut CommandContext<C>,
        input: TokenQueue,
    ) -> Result<Arc<Command<C>>, CommandError> {
        let raw = input.iter().collect::<Vec<_>>().join(" ");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.tree.parse(context, input)));
        let error = match outcome {
            Ok(Ok(command)) => return Ok(command),
            Ok(Err(error)) => error,
            Err(payload) => CommandError::execution(
                raw,
                panic_message("parser", payload.as_ref()).into(),
            ),
        };
        Err(self.fail(context.sender(), error))
    }

    /// Runs post-processing and then the handler of an already resolved command.
    ///
    /// `cancel` is checked before each step; once the handler started it is no longer consulted.
    /// A panicking stage or handler is reported as [`CommandError::Execution`].
    ///
    /// # Errors
    ///
    /// Returns the first failure after routing it through the exception table.
    pub fn dispatch(
        &self,
        mut context: CommandContext<C>,
        command: Arc<Command<C>>,
        cancel: &AtomicBool,
    ) -> Result<CommandResult<C>, CommandError> {
        if cancel.load(Ordering::SeqCst) {
            return Err(self.cancelled(&context, &command));
        }
        let accepted = panic::catch_unwind(AssertUnwindSafe(|| {
            self.postprocessing.accept(&mut context, &command)
        }));
        let rejection = match accepted {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(payload) => Some(CommandError::execution(
                command.syntax(),
                panic_message("post-processing", payload.as_ref()).into(),
            )),
        };
        if let Some(error) = rejection {
            return Err(self.fail(context.sender(), error));
        }
        if cancel.load(Ordering::SeqCst) {
            return Err(self.cancelled(&context, &command));
        }

        debug!(syntax = %command.syntax(), "executing command");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.invoke(&mut context)));
        let cause = match outcome {
            Ok(Ok(())) => return Ok(CommandResult::new(context)),
            Ok(Err(cause)) => cause,
            Err(payload) => panic_message("handler", payload.as_ref()).into(),
        };
        let error = CommandError::execution(command.syntax(), cause);
        Err(self.fail(context.sender(), error))
    }

    /// Resolves and dispatches in one step.
    ///
    /// # Errors
    ///
    /// Returns the first failure of either step.
    pub fn run(
        &self,
        mut context: CommandContext<C>,
        input: TokenQueue,
        cancel: &AtomicBool,
    ) -> Result<CommandResult<C>, CommandError> {
        if cancel.load(Ordering::SeqCst) {
            return Err(self.fail(context.sender(), CommandError::Cancelled));
        }
        let command = self.resolve(&mut context, input)?;
        self.dispatch(context, command, cancel)
    }

    fn cancelled(&self, context: &CommandContext<C>, command: &Command<C>) -> CommandError {
        warn!(syntax = %command.syntax(), "command cancelled before its handler started");
        self.fail(context.sender(), CommandError::Cancelled)
    }

    fn fail(&self, sender: &C, error: CommandError) -> CommandError {
        debug!(kind = ?error.kind(), %error, "command attempt failed");
        self.exceptions.handle(sender, &error);
        error
    }
}

/// Text of a caught panic, prefixed with the step that raised it.
pub(crate) fn panic_message(step: &str, payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("{step} panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("{step} panicked: {message}")
    } else {
        format!("{step} panicked")
    }
}
