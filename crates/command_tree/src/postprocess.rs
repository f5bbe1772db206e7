//! Gates run between a successful parse and the handler.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{command::Command, context::CommandContext, error::CommandError};

/// One post-processing stage; returning an error vetoes the attempt.
pub trait CommandPostprocessor<C>: Send + Sync {
    /// Stage name used in logs and veto errors.
    fn name(&self) -> &str;

    /// Inspects the resolved command and its bound context.
    ///
    /// # Errors
    ///
    /// Any error stops the pipeline and is returned as the attempt's failure.
    fn accept(&self, context: &mut CommandContext<C>, command: &Command<C>)
        -> Result<(), CommandError>;
}

/// Stage backed by a closure.
pub struct FnPostprocessor<F> {
    name: String,
    stage: F,
}

impl<F> FnPostprocessor<F> {
    /// Wraps `stage` under `name`.
    pub fn new(name: impl Into<String>, stage: F) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }
}

impl<C, F> CommandPostprocessor<C> for FnPostprocessor<F>
where
    F: Fn(&mut CommandContext<C>, &Command<C>) -> Result<(), CommandError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(
        &self,
        context: &mut CommandContext<C>,
        command: &Command<C>,
    ) -> Result<(), CommandError> {
        (self.stage)(context, command)
    }
}

/// Capability answering whether a sender holds a permission string.
pub trait PermissionChecker<C>: Send + Sync {
    /// Whether `sender` holds `permission`.
    fn has_permission(&self, sender: &C, permission: &str) -> bool;
}

impl<C, F> PermissionChecker<C> for F
where
    F: Fn(&C, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, sender: &C, permission: &str) -> bool {
        self(sender, permission)
    }
}

/// Grants every permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<C> PermissionChecker<C> for AllowAll {
    fn has_permission(&self, _sender: &C, _permission: &str) -> bool {
        true
    }
}

/// Ordered chain: sender requirement, permission, user stages, accepting marker.
pub struct PostprocessingPipeline<C> {
    permissions: Arc<dyn PermissionChecker<C>>,
    stages: Vec<Arc<dyn CommandPostprocessor<C>>>,
}

impl<C> fmt::Debug for PostprocessingPipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostprocessingPipeline")
            .field(
                "stages",
                &self.stages.iter().map(|stage| stage.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<C> Default for PostprocessingPipeline<C> {
    fn default() -> Self {
        Self::new(Arc::new(AllowAll))
    }
}

impl<C> PostprocessingPipeline<C> {
    /// Pipeline consulting `permissions` and no user stages.
    pub fn new(permissions: Arc<dyn PermissionChecker<C>>) -> Self {
        Self {
            permissions,
            stages: Vec::new(),
        }
    }

    /// Replaces the permission capability.
    pub fn set_permission_checker(&mut self, permissions: Arc<dyn PermissionChecker<C>>) {
        self.permissions = permissions;
    }

    /// Permission capability.
    pub fn permission_checker(&self) -> &dyn PermissionChecker<C> {
        self.permissions.as_ref()
    }

    /// Appends a user stage; stages run in registration order.
    pub fn register(&mut self, stage: Arc<dyn CommandPostprocessor<C>>) {
        self.stages.push(stage);
    }

    /// Number of user stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no user stage is registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether `sender` may run `command`, ignoring user stages.
    pub fn permits(&self, sender: &C, command: &Command<C>) -> bool {
        let sender_ok = command
            .sender_requirement()
            .is_none_or(|requirement| requirement.accepts(sender));
        let permission_ok = command
            .permission()
            .is_none_or(|permission| self.permissions.has_permission(sender, permission));
        sender_ok && permission_ok
    }

    /// Runs every stage; the first rejection stops the chain.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Vetoed`] for an already processed context,
    /// [`CommandError::InvalidSender`], [`CommandError::NoPermission`], or the error of the first
    /// rejecting user stage.
    pub fn accept(
        &self,
        context: &mut CommandContext<C>,
        command: &Command<C>,
    ) -> Result<(), CommandError> {
        if context.is_processed() {
            return Err(CommandError::Vetoed {
                stage: "accepting".to_string(),
                reason: "context was already processed".to_string(),
            });
        }
        if let Some(requirement) = command.sender_requirement() {
            if !requirement.accepts(context.sender()) {
                return Err(CommandError::InvalidSender {
                    required: requirement.label().to_string(),
                });
            }
        }
        if let Some(permission) = command.permission() {
            if !self.permissions.has_permission(context.sender(), permission) {
                debug!(%permission, "permission denied");
                return Err(CommandError::NoPermission {
                    permission: permission.to_string(),
                });
            }
        }
        for stage in &self.stages {
            stage.accept(context, command).inspect_err(|error| {
                debug!(stage = stage.name(), %error, "stage rejected command");
            })?;
        }
        context.mark_processed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{command::SenderRequirement, error::HandlerError};

    #[derive(Debug)]
    struct Sender {
        player: bool,
        permissions: Vec<&'static str>,
    }

    fn noop(_: &mut CommandContext<Sender>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn pipeline() -> PostprocessingPipeline<Sender> {
        PostprocessingPipeline::new(Arc::new(|sender: &Sender, permission: &str| {
            sender.permissions.iter().any(|held| *held == permission)
        }))
    }

    fn gated() -> Command<Sender> {
        Command::builder()
            .literal("kick")
            .permission("mod.kick")
            .sender_requirement(SenderRequirement::new("players", |sender: &Sender| {
                sender.player
            }))
            .handler(noop)
            .build()
            .expect("command")
    }

    #[test]
    fn built_in_stages_run_before_user_stages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline();
        let counter = Arc::clone(&calls);
        pipeline.register(Arc::new(FnPostprocessor::new(
            "count",
            move |_: &mut CommandContext<Sender>, _: &Command<Sender>| -> Result<(), CommandError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )));

        let mut console = CommandContext::new(Sender {
            player: false,
            permissions: vec!["mod.kick"],
        });
        assert!(matches!(
            pipeline.accept(&mut console, &gated()),
            Err(CommandError::InvalidSender { required }) if required == "players"
        ));

        let mut guest = CommandContext::new(Sender {
            player: true,
            permissions: Vec::new(),
        });
        assert!(matches!(
            pipeline.accept(&mut guest, &gated()),
            Err(CommandError::NoPermission { permission }) if permission == "mod.kick"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!guest.is_processed());

        let mut moderator = CommandContext::new(Sender {
            player: true,
            permissions: vec!["mod.kick"],
        });
        pipeline.accept(&mut moderator, &gated()).expect("accepted");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(moderator.is_processed());
    }

    #[test]
    fn processed_context_is_vetoed() {
        let pipeline = pipeline();
        let mut context = CommandContext::new(Sender {
            player: true,
            permissions: vec!["mod.kick"],
        });
        pipeline.accept(&mut context, &gated()).expect("first pass");
        assert!(matches!(
            pipeline.accept(&mut context, &gated()),
            Err(CommandError::Vetoed { .. })
        ));
    }

    #[test]
    fn user_stage_veto_stops_the_chain() {
        let mut pipeline = pipeline();
        pipeline.register(Arc::new(FnPostprocessor::new(
            "cooldown",
            |_: &mut CommandContext<Sender>, _: &Command<Sender>| -> Result<(), CommandError> {
                Err(CommandError::Vetoed {
                    stage: "cooldown".to_string(),
                    reason: "try again later".to_string(),
                })
            },
        )));
        let mut context = CommandContext::new(Sender {
            player: true,
            permissions: vec!["mod.kick"],
        });
        assert!(matches!(
            pipeline.accept(&mut context, &gated()),
            Err(CommandError::Vetoed { stage, .. }) if stage == "cooldown"
        ));
        assert!(!context.is_processed());
    }
}
