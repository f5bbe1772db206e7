//! Line-oriented adapter over the command engine.
//!
//! Owns shell-style tokenization, the demo sender and its permission set, and the small line
//! protocol used by the binary: `?partial` lists completions, `:commands` dumps descriptors as
//! JSON, and anything else runs as a command.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::collections::BTreeSet;

use command_tree::{
    CommandError, CommandManager, ConfigError, EngineConfig, RegistrationError, TokenQueue,
};
use command_tree_contract::FailureKind;
use futures::executor::block_on;
use thiserror::Error;
use tracing::info;

/// Meta key handlers use for the text printed after a successful command.
pub const OUTPUT_KEY: &str = "output";

/// Permission granting everything.
pub const WILDCARD: &str = "*";

/// Line tokenization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// A backslash ended the line.
    #[error("dangling escape sequence")]
    DanglingEscape,
    /// A quote was never closed.
    #[error("unterminated quoted string")]
    UnterminatedQuote,
}

/// REPL startup failure.
#[derive(Debug, Error)]
pub enum ReplError {
    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A demo command could not be registered.
    #[error("failed to register demo commands: {0}")]
    Registration(#[from] RegistrationError),
}

/// Splits `line` into words, honoring single and double quotes and backslash escapes.
///
/// # Errors
///
/// Returns [`TokenizeError`] for a trailing backslash or an unclosed quote.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars();
    let mut quote = None::<char>;

    while let Some(ch) = chars.next() {
        match quote {
            Some(active) if ch == active => quote = None,
            Some(_) if ch == '\\' => {
                current.push(chars.next().ok_or(TokenizeError::DanglingEscape)?);
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                quoted = true;
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            None if ch == '\\' => {
                current.push(chars.next().ok_or(TokenizeError::DanglingEscape)?);
            }
            None => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err(TokenizeError::UnterminatedQuote);
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Sender driving the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplSender {
    /// Display name.
    pub name: String,
    /// Granted permissions; [`WILDCARD`] grants all of them.
    pub permissions: BTreeSet<String>,
}

impl ReplSender {
    /// Sender with no permissions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: BTreeSet::new(),
        }
    }

    /// Adds `permission`.
    pub fn grant(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Whether the sender holds `permission`.
    pub fn holds(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD) || self.permissions.contains(permission)
    }
}

fn sender_holds(sender: &ReplSender, permission: &str) -> bool {
    sender.holds(permission)
}

/// Manager configured from `config` with the demo commands registered.
///
/// # Errors
///
/// Returns [`ReplError`] when the coordinator cannot start or a command fails to register.
pub fn demo_manager(config: &EngineConfig) -> Result<CommandManager<ReplSender>, ReplError> {
    let mut manager = CommandManager::from_config(config)?;
    manager.set_permission_checker(sender_holds)?;
    manager.register_exception_handler(FailureKind::Any, |sender: &ReplSender, error| {
        info!(sender = %sender.name, code = error.exit_code(), %error, "command failed");
    })?;

    manager.register_syntax("math add <x:int> <y:int>", |context| {
        let sum = context.get_or::<i64>("x", 0) + context.get_or::<i64>("y", 0);
        context.set_meta(OUTPUT_KEY, sum.to_string());
        Ok(())
    })?;
    manager.register_syntax("echo <text:string...>", |context| {
        let text = context.get_or("text", String::new());
        context.set_meta(OUTPUT_KEY, text);
        Ok(())
    })?;
    let say = manager
        .syntax("say <msg:string...> [-loud|l]")?
        .description("Repeats a message, optionally shouting it.")
        .handler(|context| {
            let msg = context.get_or("msg", String::new());
            let msg = if context.flag("loud") {
                msg.to_uppercase()
            } else {
                msg
            };
            let line = format!("{} says: {msg}", context.sender().name);
            context.set_meta(OUTPUT_KEY, line);
            Ok(())
        })
        .build()?;
    manager.register(say)?;
    let reload = manager
        .syntax("admin reload")?
        .permission("admin.reload")
        .description("Pretends to reload the server.")
        .handler(|context| {
            context.set_meta(OUTPUT_KEY, "reloaded");
            Ok(())
        })
        .build()?;
    manager.register(reload)?;

    Ok(manager)
}

/// Result of evaluating one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Nothing to print.
    Empty,
    /// Lines for standard output.
    Output(Vec<String>),
    /// A failure message and its exit code.
    Failure {
        /// Human-readable message.
        message: String,
        /// Conventional exit code of the failure.
        code: i32,
    },
}

/// One sender evaluating lines against a manager.
#[derive(Debug)]
pub struct ReplSession {
    manager: CommandManager<ReplSender>,
    sender: ReplSender,
}

impl ReplSession {
    /// Session for `sender`.
    pub fn new(manager: CommandManager<ReplSender>, sender: ReplSender) -> Self {
        Self { manager, sender }
    }

    /// Active sender.
    pub fn sender(&self) -> &ReplSender {
        &self.sender
    }

    /// Evaluates one input line.
    pub fn eval_line(&self, line: &str) -> Evaluation {
        if let Some(partial) = line.strip_prefix('?') {
            return Evaluation::Output(self.manager.suggest(self.sender.clone(), partial));
        }
        if line.trim() == ":commands" {
            return match serde_json::to_string_pretty(&self.manager.descriptors()) {
                Ok(json) => Evaluation::Output(vec![json]),
                Err(err) => Evaluation::Failure {
                    message: err.to_string(),
                    code: 5,
                },
            };
        }

        let tokens = match tokenize(line) {
            Ok(tokens) if tokens.is_empty() => return Evaluation::Empty,
            Ok(tokens) => tokens,
            Err(err) => {
                return Evaluation::Failure {
                    message: err.to_string(),
                    code: 2,
                }
            }
        };
        let future = self
            .manager
            .execute_tokens(self.sender.clone(), TokenQueue::new(tokens));
        match block_on(future) {
            Ok(result) => match result.context().meta(OUTPUT_KEY) {
                Some(output) => Evaluation::Output(vec![output.to_string()]),
                None => Evaluation::Empty,
            },
            Err(err) => failure(&err),
        }
    }
}

fn failure(error: &CommandError) -> Evaluation {
    Evaluation::Failure {
        message: error.to_string(),
        code: error.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn session(sender: ReplSender) -> ReplSession {
        let manager = demo_manager(&EngineConfig::default()).expect("manager");
        ReplSession::new(manager, sender)
    }

    fn output(lines: &[&str]) -> Evaluation {
        Evaluation::Output(lines.iter().map(|line| line.to_string()).collect())
    }

    #[test]
    fn tokenizes_quotes_and_escapes() {
        assert_eq!(
            tokenize("say \"hello world\" it\\'s 'a b'").expect("tokens"),
            vec!["say", "hello world", "it's", "a b"]
        );
        assert_eq!(tokenize("echo ''").expect("tokens"), vec!["echo", ""]);
        assert!(tokenize("   ").expect("tokens").is_empty());
    }

    #[test]
    fn rejects_broken_quoting() {
        assert_eq!(tokenize("echo \"open"), Err(TokenizeError::UnterminatedQuote));
        assert_eq!(tokenize("echo trailing\\"), Err(TokenizeError::DanglingEscape));
    }

    #[test]
    fn runs_demo_commands() {
        let session = session(ReplSender::new("alex"));
        assert_eq!(session.eval_line("math add 2 3"), output(&["5"]));
        assert_eq!(session.eval_line("echo 'a  b' c"), output(&["a  b c"]));
        assert_eq!(
            session.eval_line("say -l hi there"),
            output(&["alex says: HI THERE"])
        );
        assert_eq!(session.eval_line(""), Evaluation::Empty);
    }

    #[test]
    fn admin_commands_need_the_grant() {
        let denied = session(ReplSender::new("guest")).eval_line("admin reload");
        assert!(matches!(denied, Evaluation::Failure { code: 4, .. }));
        let admin = session(ReplSender::new("root").grant(WILDCARD));
        assert_eq!(admin.eval_line("admin reload"), output(&["reloaded"]));
    }

    #[test]
    fn failures_carry_exit_codes() {
        let session = session(ReplSender::new("alex"));
        match session.eval_line("math add 2") {
            Evaluation::Failure { message, code } => {
                assert_eq!(code, 2);
                assert!(message.ends_with("; usage: math add <x> <y>"), "{message}");
                assert_eq!(message.matches("usage:").count(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            session.eval_line("launch"),
            Evaluation::Failure { code: 3, .. }
        ));
        assert!(matches!(
            session.eval_line("echo \"open"),
            Evaluation::Failure { code: 2, .. }
        ));
    }

    #[test]
    fn suggestions_hide_forbidden_commands() {
        let guest = session(ReplSender::new("guest"));
        assert_eq!(guest.eval_line("?"), output(&["math", "echo", "say"]));
        let admin = session(ReplSender::new("root").grant("admin.reload"));
        assert_eq!(admin.eval_line("?ad"), output(&["admin"]));
        assert_eq!(admin.eval_line("?admin "), output(&["reload"]));
    }

    #[test]
    fn lists_descriptors_as_json() {
        let session = session(ReplSender::new("alex"));
        let Evaluation::Output(lines) = session.eval_line(":commands") else {
            panic!("expected output");
        };
        let descriptors: serde_json::Value = serde_json::from_str(&lines[0]).expect("json");
        let syntaxes = descriptors
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|descriptor| descriptor["syntax"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            syntaxes,
            vec!["math add <x> <y>", "echo <text...>", "say <msg...> [-loud]", "admin reload"]
        );
    }
}
