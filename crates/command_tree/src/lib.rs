//! Sender-agnostic engine for registering, parsing, disambiguating, and dispatching textual
//! commands.
//!
//! Commands are paths of [`CommandComponent`]s registered into a [`CommandTree`]. An attempt
//! walks the tree over a [`TokenQueue`], binds values into a [`CommandContext`], passes the
//! [`PostprocessingPipeline`], and runs the handler where the [`ExecutionCoordinator`] decides.
//! Failures are routed through the [`ExceptionController`] and returned through the
//! [`CommandFuture`].
//!
//! ```
//! use command_tree::CommandManager;
//! use futures::executor::block_on;
//!
//! let mut manager = CommandManager::<()>::immediate();
//! manager
//!     .register_syntax("math add <x:int> <y:int>", |context| {
//!         let sum = context.get::<i64>("x").unwrap_or(0) + context.get::<i64>("y").unwrap_or(0);
//!         context.set_meta("sum", sum.to_string());
//!         Ok(())
//!     })
//!     .expect("register");
//!
//! let result = block_on(manager.execute((), "math add 2 3")).expect("run");
//! assert_eq!(result.context().meta("sum"), Some("5"));
//! assert_eq!(manager.suggest((), "math a"), vec!["add"]);
//! ```

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod command;
pub mod component;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exception;
pub mod execution;
pub mod manager;
pub mod parser;
pub mod postprocess;
pub mod syntax;
pub mod tokens;
pub mod tree;

pub use command::{Command, CommandBuilder, CommandHandler, SenderRequirement};
pub use command_tree_contract as contract;
pub use component::{CommandComponent, SuggestionProvider};
pub use config::{ConfigError, CoordinatorKind, EngineConfig, ExecutionConfig, ParsingConfig};
pub use context::{CommandContext, CommandResult, PROCESSED_KEY};
pub use engine::CommandEngine;
pub use error::{CommandError, HandlerError, ParseFailure, ParseFailureReason, RegistrationError};
pub use exception::{ExceptionController, ExceptionHandler};
pub use execution::{
    CancelHandle, CommandExecutor, CommandFuture, CommandOutcome, DeferredCoordinator,
    ExecutionCoordinator, ImmediateCoordinator, InlineExecutor, Task,
};
pub use manager::CommandManager;
pub use parser::{ArgumentParser, ParserRegistry, SharedParser};
pub use postprocess::{
    AllowAll, CommandPostprocessor, FnPostprocessor, PermissionChecker, PostprocessingPipeline,
};
pub use syntax::CommandSyntax;
pub use tokens::TokenQueue;
pub use tree::CommandTree;
