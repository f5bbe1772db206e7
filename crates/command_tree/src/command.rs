//! Registered commands and the fluent builder producing them.

use std::{collections::HashSet, fmt, sync::Arc};

use command_tree_contract::{ArityClass, CommandDescriptor, CommandMeta};

use crate::{
    component::CommandComponent,
    context::CommandContext,
    error::{HandlerError, RegistrationError},
};

/// Handler invoked with the bound context once every gate accepted the attempt.
pub type CommandHandler<C> =
    Arc<dyn Fn(&mut CommandContext<C>) -> Result<(), HandlerError> + Send + Sync>;

/// Restricts a command to senders satisfying a predicate.
pub struct SenderRequirement<C> {
    label: String,
    predicate: Arc<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Clone for SenderRequirement<C> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for SenderRequirement<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderRequirement")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<C> SenderRequirement<C> {
    /// Creates a requirement; `label` names the accepted sender kind in errors.
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Accepted sender kind.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether `sender` qualifies.
    pub fn accepts(&self, sender: &C) -> bool {
        (self.predicate)(sender)
    }
}

/// Immutable command: positional path, flags, handler, and metadata.
pub struct Command<C> {
    components: Vec<CommandComponent<C>>,
    flags: Vec<(usize, CommandComponent<C>)>,
    handler: CommandHandler<C>,
    meta: CommandMeta,
    sender_requirement: Option<SenderRequirement<C>>,
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("syntax", &self.syntax())
            .field("meta", &self.meta)
            .field("sender_requirement", &self.sender_requirement)
            .finish_non_exhaustive()
    }
}

impl<C> Command<C> {
    /// Starts a builder.
    pub fn builder() -> CommandBuilder<C> {
        CommandBuilder::new()
    }

    /// Positional components, root first.
    pub fn components(&self) -> &[CommandComponent<C>] {
        &self.components
    }

    /// Flags with the path depth they attach to.
    ///
    /// Depth `n` means the flag becomes visible once the first `n` positional components matched.
    pub fn flags(&self) -> &[(usize, CommandComponent<C>)] {
        &self.flags
    }

    /// Flags attached at `depth`.
    pub fn flags_at(&self, depth: usize) -> impl Iterator<Item = &CommandComponent<C>> {
        self.flags
            .iter()
            .filter(move |(at, _)| *at == depth)
            .map(|(_, flag)| flag)
    }

    /// Whether the command declares a flag called `name`.
    pub fn declares_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|(_, flag)| flag.name() == name)
    }

    /// Flag called `name`.
    pub fn flag(&self, name: &str) -> Option<&CommandComponent<C>> {
        self.flags
            .iter()
            .map(|(_, flag)| flag)
            .find(|flag| flag.name() == name)
    }

    /// Command metadata.
    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    /// Required permission, if any.
    pub fn permission(&self) -> Option<&str> {
        self.meta.permission.as_deref()
    }

    /// Sender restriction, if any.
    pub fn sender_requirement(&self) -> Option<&SenderRequirement<C>> {
        self.sender_requirement.as_ref()
    }

    /// Rendered syntax such as `math add <x> [y] [-v]`.
    pub fn syntax(&self) -> String {
        self.components
            .iter()
            .map(CommandComponent::display)
            .chain(self.flags.iter().map(|(_, flag)| flag.display()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serializable description.
    pub fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor {
            syntax: self.syntax(),
            components: self
                .components
                .iter()
                .chain(self.flags.iter().map(|(_, flag)| flag))
                .map(CommandComponent::descriptor)
                .collect(),
            meta: self.meta.clone(),
        }
    }

    pub(crate) fn invoke(&self, context: &mut CommandContext<C>) -> Result<(), HandlerError> {
        (self.handler)(context)
    }
}

/// Fluent builder for [`Command`].
pub struct CommandBuilder<C> {
    components: Vec<CommandComponent<C>>,
    flags: Vec<(usize, CommandComponent<C>)>,
    handler: Option<CommandHandler<C>>,
    meta: CommandMeta,
    sender_requirement: Option<SenderRequirement<C>>,
}

impl<C> Default for CommandBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandBuilder<C> {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            flags: Vec::new(),
            handler: None,
            meta: CommandMeta::default(),
            sender_requirement: None,
        }
    }

    /// Appends a literal.
    pub fn literal(self, name: impl Into<String>) -> Self {
        self.argument(CommandComponent::literal(name))
    }

    /// Appends a literal answering to several spellings.
    pub fn literal_with_aliases<I, S>(self, name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argument(CommandComponent::literal(name).with_aliases(aliases))
    }

    /// Appends a component; flags attach at the current depth.
    pub fn argument(mut self, component: CommandComponent<C>) -> Self {
        if component.is_flag() {
            self.flags.push((self.components.len(), component));
        } else {
            self.components.push(component);
        }
        self
    }

    /// Appends a flag at the current depth.
    pub fn flag(self, component: CommandComponent<C>) -> Self {
        let component = if component.is_flag() {
            component
        } else {
            component.into_flag()
        };
        self.argument(component)
    }

    /// Requires `permission` from the sender.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.meta.permission = Some(permission.into());
        self
    }

    /// Short help text.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    /// Omits the command from suggestions and listings.
    pub fn hidden(mut self) -> Self {
        self.meta.hidden = true;
        self
    }

    /// Restricts accepted senders.
    pub fn sender_requirement(mut self, requirement: SenderRequirement<C>) -> Self {
        self.sender_requirement = Some(requirement);
        self
    }

    /// Sets the handler.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut CommandContext<C>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets an already shared handler.
    pub fn shared_handler(mut self, handler: CommandHandler<C>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validates the path and freezes the command.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the path is empty, does not start with a literal, places
    /// a greedy component anywhere but last, puts a required component after an optional one,
    /// repeats a name, or has no handler.
    pub fn build(self) -> Result<Command<C>, RegistrationError> {
        let Some(first) = self.components.first() else {
            return Err(RegistrationError::EmptyCommand);
        };
        if !first.is_literal() {
            return Err(RegistrationError::RootNotLiteral {
                component: first.display(),
            });
        }
        if let Some((_, flag)) = self.flags.iter().find(|(depth, _)| *depth == 0) {
            return Err(RegistrationError::RootNotLiteral {
                component: flag.display(),
            });
        }

        let last = self.components.len() - 1;
        let mut seen_optional = false;
        for (index, component) in self.components.iter().enumerate() {
            if component.arity() == ArityClass::Greedy && index != last {
                return Err(RegistrationError::GreedyNotLast {
                    component: component.display(),
                });
            }
            if component.is_required() && seen_optional {
                return Err(RegistrationError::RequiredAfterOptional {
                    component: component.display(),
                });
            }
            seen_optional |= !component.is_required();
        }

        let mut names = HashSet::new();
        let bound = self
            .components
            .iter()
            .filter(|component| !component.is_literal())
            .chain(self.flags.iter().map(|(_, flag)| flag));
        for component in bound {
            if !names.insert(component.name()) {
                return Err(RegistrationError::DuplicateName {
                    name: component.name().to_string(),
                });
            }
        }

        let Some(handler) = self.handler else {
            let syntax = self
                .components
                .iter()
                .map(CommandComponent::display)
                .collect::<Vec<_>>()
                .join(" ");
            return Err(RegistrationError::MissingHandler { syntax });
        };

        Ok(Command {
            components: self.components,
            flags: self.flags,
            handler,
            meta: self.meta,
            sender_requirement: self.sender_requirement,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::{IntegerParser, SharedParser, StringParser};

    fn int() -> SharedParser<()> {
        Arc::new(IntegerParser::new(i64::MIN, i64::MAX).expect("range"))
    }

    fn noop(_: &mut CommandContext<()>) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn builder_renders_syntax_with_flags_last() {
        let command = Command::builder()
            .literal("math")
            .literal("add")
            .argument(CommandComponent::required("x", int()))
            .flag(CommandComponent::flag("verbose"))
            .argument(CommandComponent::optional("y", int()))
            .handler(noop)
            .build()
            .expect("valid");
        assert_eq!(command.syntax(), "math add <x> [y] [-verbose]");
        assert_eq!(command.flags()[0].0, 3);
        assert!(command.declares_flag("verbose"));
    }

    #[test]
    fn invalid_paths_are_rejected() {
        assert_eq!(
            CommandBuilder::<()>::new().handler(noop).build().err(),
            Some(RegistrationError::EmptyCommand)
        );
        assert!(matches!(
            Command::builder()
                .argument(CommandComponent::required("x", int()))
                .handler(noop)
                .build(),
            Err(RegistrationError::RootNotLiteral { .. })
        ));
        assert!(matches!(
            Command::builder()
                .literal("say")
                .argument(CommandComponent::greedy(
                    "msg",
                    Arc::new(StringParser::greedy()) as SharedParser<()>
                ))
                .argument(CommandComponent::required("x", int()))
                .handler(noop)
                .build(),
            Err(RegistrationError::GreedyNotLast { .. })
        ));
        assert!(matches!(
            Command::builder()
                .literal("math")
                .argument(CommandComponent::optional("x", int()))
                .argument(CommandComponent::required("y", int()))
                .handler(noop)
                .build(),
            Err(RegistrationError::RequiredAfterOptional { .. })
        ));
        assert_eq!(
            Command::builder()
                .literal("math")
                .argument(CommandComponent::required("x", int()))
                .flag(CommandComponent::flag("x"))
                .handler(noop)
                .build()
                .err(),
            Some(RegistrationError::DuplicateName {
                name: "x".to_string()
            })
        );
        assert_eq!(
            Command::<()>::builder().literal("math").build().err(),
            Some(RegistrationError::MissingHandler {
                syntax: "math".to_string()
            })
        );
    }

    #[test]
    fn descriptor_lists_flags_after_positionals() {
        let command = Command::builder()
            .literal("say")
            .flag(CommandComponent::flag("loud"))
            .permission("chat.say")
            .handler(noop)
            .build()
            .expect("valid");
        let descriptor = command.descriptor();
        assert_eq!(descriptor.components.len(), 2);
        assert_eq!(descriptor.components[1].name, "loud");
        assert_eq!(descriptor.meta.permission.as_deref(), Some("chat.say"));
    }
}
