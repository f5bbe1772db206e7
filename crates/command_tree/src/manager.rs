//! Command manager: setup-phase registration and the execute / suggest surface.

use std::{fmt, sync::Arc};

use command_tree_contract::{AmbiguityPolicy, CommandDescriptor, FailureKind, LiteralCase};
use tracing::debug;

use crate::{
    command::{Command, CommandBuilder},
    config::{ConfigError, CoordinatorKind, EngineConfig},
    context::CommandContext,
    engine::CommandEngine,
    error::{CommandError, HandlerError, RegistrationError},
    execution::{
        CommandFuture, DeferredCoordinator, ExecutionCoordinator, ImmediateCoordinator,
    },
    parser::ParserRegistry,
    postprocess::{CommandPostprocessor, PermissionChecker},
    syntax::CommandSyntax,
    tokens::TokenQueue,
};

/// Owns the engine and the coordinator.
///
/// Registration needs exclusive access to the engine and fails with
/// [`RegistrationError::EngineInUse`] while an attempt still holds it, so attempts read the
/// engine without locking.
pub struct CommandManager<C> {
    engine: Arc<CommandEngine<C>>,
    coordinator: Arc<dyn ExecutionCoordinator<C>>,
}

impl<C> fmt::Debug for CommandManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("tree", self.engine.tree())
            .field("postprocessing", self.engine.postprocessing())
            .field("exceptions", self.engine.exceptions())
            .finish_non_exhaustive()
    }
}

impl<C: Send + 'static> CommandManager<C> {
    /// Manager with default tree policies and the given coordinator.
    pub fn new(coordinator: Arc<dyn ExecutionCoordinator<C>>) -> Self {
        Self::with_tree_settings(LiteralCase::default(), AmbiguityPolicy::default(), coordinator)
    }

    /// Manager running every attempt on the calling thread.
    pub fn immediate() -> Self {
        Self::new(Arc::new(ImmediateCoordinator))
    }

    /// Manager with explicit tree policies.
    pub fn with_tree_settings(
        case: LiteralCase,
        ambiguity: AmbiguityPolicy,
        coordinator: Arc<dyn ExecutionCoordinator<C>>,
    ) -> Self {
        Self {
            engine: Arc::new(CommandEngine::new(case, ambiguity)),
            coordinator,
        }
    }

    /// Manager built from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Executor`] when the deferred thread pool cannot be started.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let execution = config.execution;
        let coordinator: Arc<dyn ExecutionCoordinator<C>> = match execution.coordinator {
            CoordinatorKind::Immediate => Arc::new(ImmediateCoordinator),
            CoordinatorKind::Deferred => Arc::new(
                DeferredCoordinator::thread_pool(execution.pool_size, execution.synchronous_parsing)
                    .map_err(|err| ConfigError::Executor {
                        message: err.to_string(),
                    })?,
            ),
        };
        debug!(?config, "command manager configured");
        Ok(Self::with_tree_settings(
            config.parsing.literal_case,
            config.parsing.ambiguity,
            coordinator,
        ))
    }

    fn engine_mut(&mut self) -> Result<&mut CommandEngine<C>, RegistrationError> {
        Arc::get_mut(&mut self.engine).ok_or(RegistrationError::EngineInUse)
    }

    /// Shared engine.
    pub fn engine(&self) -> &Arc<CommandEngine<C>> {
        &self.engine
    }

    /// Replaces the coordinator.
    pub fn set_coordinator(&mut self, coordinator: Arc<dyn ExecutionCoordinator<C>>) {
        self.coordinator = coordinator;
    }

    /// Parser registry.
    pub fn parser_registry(&self) -> &ParserRegistry<C> {
        self.engine.parser_registry()
    }

    /// Mutable parser registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EngineInUse`] while attempts are in flight.
    pub fn parser_registry_mut(&mut self) -> Result<&mut ParserRegistry<C>, RegistrationError> {
        Ok(&mut self.engine_mut()?.registry)
    }

    /// Empty command builder.
    pub fn builder(&self) -> CommandBuilder<C> {
        Command::builder()
    }

    /// Builder parsed from a declarative syntax string with this manager's registry.
    ///
    /// # Errors
    ///
    /// Returns the syntax or registry error.
    pub fn syntax(&self, raw: &str) -> Result<CommandBuilder<C>, RegistrationError> {
        CommandSyntax::parse(self.engine.parser_registry(), raw)
    }

    /// Inserts a built command into the tree.
    ///
    /// # Errors
    ///
    /// Returns the tree's registration error, or [`RegistrationError::EngineInUse`].
    pub fn register(&mut self, command: Command<C>) -> Result<Arc<Command<C>>, RegistrationError> {
        self.engine_mut()?.tree.insert(command)
    }

    /// Parses `raw`, attaches `handler`, and registers the result.
    ///
    /// # Errors
    ///
    /// Returns the syntax, validation, or tree error.
    pub fn register_syntax<F>(
        &mut self,
        raw: &str,
        handler: F,
    ) -> Result<Arc<Command<C>>, RegistrationError>
    where
        F: Fn(&mut CommandContext<C>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let command = self.syntax(raw)?.handler(handler).build()?;
        self.register(command)
    }

    /// Appends a post-processing stage.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EngineInUse`] while attempts are in flight.
    pub fn register_postprocessor<P>(&mut self, stage: P) -> Result<(), RegistrationError>
    where
        P: CommandPostprocessor<C> + 'static,
    {
        self.engine_mut()?.postprocessing.register(Arc::new(stage));
        Ok(())
    }

    /// Registers the failure handler for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EngineInUse`] while attempts are in flight.
    pub fn register_exception_handler<F>(
        &mut self,
        kind: FailureKind,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&C, &CommandError) + Send + Sync + 'static,
    {
        self.engine_mut()?.exceptions.register_handler(kind, handler);
        Ok(())
    }

    /// Replaces the permission capability.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EngineInUse`] while attempts are in flight.
    pub fn set_permission_checker<P>(&mut self, checker: P) -> Result<(), RegistrationError>
    where
        P: PermissionChecker<C> + 'static,
    {
        self.engine_mut()?
            .postprocessing
            .set_permission_checker(Arc::new(checker));
        Ok(())
    }

    /// Runs `raw`, split on whitespace, for `sender`.
    pub fn execute(&self, sender: C, raw: &str) -> CommandFuture<C> {
        self.execute_tokens(sender, TokenQueue::from_input(raw))
    }

    /// Runs already tokenized input for `sender`.
    pub fn execute_tokens(&self, sender: C, input: TokenQueue) -> CommandFuture<C> {
        debug!(tokens = input.len(), "executing input");
        self.coordinator
            .coordinate(Arc::clone(&self.engine), CommandContext::new(sender), input)
    }

    /// Completions for the last word of `partial`, limited to commands `sender` may run.
    pub fn suggest(&self, sender: C, partial: &str) -> Vec<String> {
        let pipeline = self.engine.postprocessing();
        self.engine.tree().suggest(
            CommandContext::new(sender),
            TokenQueue::for_suggestions(partial),
            &|sender, command| pipeline.permits(sender, command),
        )
    }

    /// Registered commands in registration order.
    pub fn commands(&self) -> &[Arc<Command<C>>] {
        self.engine.tree().commands()
    }

    /// Descriptors of every non-hidden command in registration order.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.commands()
            .iter()
            .filter(|command| !command.meta().hidden)
            .map(|command| command.descriptor())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn registration_fails_while_an_attempt_holds_the_engine() {
        let mut manager = CommandManager::<()>::immediate();
        manager
            .register_syntax("ping", |_| Ok(()))
            .expect("register");
        let held = Arc::clone(manager.engine());
        assert_eq!(
            manager.register_syntax("pong", |_| Ok(())).err(),
            Some(RegistrationError::EngineInUse)
        );
        drop(held);
        assert!(manager.register_syntax("pong", |_| Ok(())).is_ok());
    }

    #[test]
    fn immediate_attempt_resolves_before_returning() {
        let mut manager = CommandManager::<()>::immediate();
        manager
            .register_syntax("echo <text:string...>", |_| Ok(()))
            .expect("register");
        let future = manager.execute((), "echo hello  world");
        assert!(future.is_ready());
        let result = block_on(future).expect("success");
        assert_eq!(
            result.context().get::<String>("text").as_deref(),
            Some("hello world")
        );
        assert!(result.context().is_processed());
    }

    #[test]
    fn descriptors_skip_hidden_commands() {
        let mut manager = CommandManager::<()>::immediate();
        manager.register_syntax("status", |_| Ok(())).expect("register");
        let hidden = manager
            .syntax("debug")
            .expect("syntax")
            .hidden()
            .handler(|_| Ok(()))
            .build()
            .expect("build");
        manager.register(hidden).expect("register");
        let syntaxes = manager
            .descriptors()
            .into_iter()
            .map(|descriptor| descriptor.syntax)
            .collect::<Vec<_>>();
        assert_eq!(syntaxes, vec!["status".to_string()]);
        assert_eq!(manager.commands().len(), 2);
    }
}
