//! Ordered command trie with registration-time ambiguity checks, parsing, and suggestions.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use command_tree_contract::{AmbiguityPolicy, ArgValue, ArityClass, LiteralCase};
use tracing::{debug, info};

use crate::{
    command::Command,
    component::CommandComponent,
    context::CommandContext,
    error::{CommandError, ParseFailure, ParseFailureReason, RegistrationError},
    tokens::TokenQueue,
};

const ROOT_DISPLAY: &str = "<root>";

struct Node<C> {
    component: Option<CommandComponent<C>>,
    children: Vec<Node<C>>,
    flags: Vec<CommandComponent<C>>,
    command: Option<Arc<Command<C>>>,
}

impl<C> Clone for Node<C> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            children: self.children.clone(),
            flags: self.flags.clone(),
            command: self.command.clone(),
        }
    }
}

impl<C> Node<C> {
    fn root() -> Self {
        Self::with_component(None)
    }

    fn with_component(component: Option<CommandComponent<C>>) -> Self {
        Self {
            component,
            children: Vec::new(),
            flags: Vec::new(),
            command: None,
        }
    }

    fn display(&self) -> String {
        self.component
            .as_ref()
            .map(CommandComponent::display)
            .unwrap_or_else(|| ROOT_DISPLAY.to_string())
    }

    fn component(&self) -> Option<&CommandComponent<C>> {
        self.component.as_ref()
    }

    fn is_literal(&self) -> bool {
        self.component().is_some_and(CommandComponent::is_literal)
    }

    fn child_displays(&self) -> Vec<String> {
        self.children.iter().map(Node::display).collect()
    }

    fn first_command(&self) -> Option<&Arc<Command<C>>> {
        self.command
            .as_ref()
            .or_else(|| self.children.iter().find_map(Node::first_command))
    }

    fn first_syntax(&self) -> String {
        self.first_command()
            .map(|command| command.syntax())
            .unwrap_or_default()
    }

    fn reaches(&self, sender: &C, allowed: &dyn Fn(&C, &Command<C>) -> bool) -> bool {
        self.command
            .as_ref()
            .is_some_and(|command| !command.meta().hidden && allowed(sender, command.as_ref()))
            || self.children.iter().any(|child| child.reaches(sender, allowed))
    }

    fn non_literal_children(&self) -> impl Iterator<Item = &Node<C>> {
        self.children.iter().filter(|child| !child.is_literal())
    }

    /// Flags on this node and on every node reachable through non-literal edges only.
    fn chain_flags<'t>(&'t self, out: &mut Vec<&'t CommandComponent<C>>) {
        out.extend(self.flags.iter());
        for child in self.non_literal_children() {
            child.chain_flags(out);
        }
    }
}

/// Command trie rooted at a component-less node.
pub struct CommandTree<C> {
    root: Node<C>,
    case: LiteralCase,
    ambiguity: AmbiguityPolicy,
    commands: Vec<Arc<Command<C>>>,
}

impl<C> fmt::Debug for CommandTree<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("case", &self.case)
            .field("ambiguity", &self.ambiguity)
            .field(
                "commands",
                &self
                    .commands
                    .iter()
                    .map(|command| command.syntax())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<C> Default for CommandTree<C> {
    fn default() -> Self {
        Self::new(LiteralCase::default(), AmbiguityPolicy::default())
    }
}

impl<C> CommandTree<C> {
    /// Empty tree with the given literal case and sibling ambiguity policies.
    pub fn new(case: LiteralCase, ambiguity: AmbiguityPolicy) -> Self {
        Self {
            root: Node::root(),
            case,
            ambiguity,
            commands: Vec::new(),
        }
    }

    /// Literal matching policy.
    pub fn literal_case(&self) -> LiteralCase {
        self.case
    }

    /// Sibling ambiguity policy.
    pub fn ambiguity_policy(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    /// Registered commands in registration order.
    pub fn commands(&self) -> &[Arc<Command<C>>] {
        &self.commands
    }

    /// Inserts `command`, rejecting any structural ambiguity.
    ///
    /// The tree is left unchanged when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NameClash`], [`RegistrationError::AmbiguousNode`], or
    /// [`RegistrationError::DuplicateCommand`].
    pub fn insert(&mut self, command: Command<C>) -> Result<Arc<Command<C>>, RegistrationError> {
        let command = Arc::new(command);
        let mut root = self.root.clone();
        let mut node = &mut root;
        for (depth, component) in command.components().iter().enumerate() {
            let index = self.child_index(node, component)?;
            node = &mut node.children[index];
            for flag in command.flags_at(depth + 1) {
                attach_flag(node, flag)?;
            }
        }
        if node.command.is_some() {
            return Err(RegistrationError::DuplicateCommand {
                syntax: command.syntax(),
            });
        }
        node.command = Some(Arc::clone(&command));
        verify_optional_reach(&root)?;
        verify_flag_markers(&root, &[])?;

        self.root = root;
        self.commands.push(Arc::clone(&command));
        info!(syntax = %command.syntax(), "command registered");
        Ok(command)
    }

    fn child_index(
        &self,
        node: &mut Node<C>,
        component: &CommandComponent<C>,
    ) -> Result<usize, RegistrationError> {
        let existing = node.children.iter().position(|child| {
            child
                .component()
                .is_some_and(|known| known.name() == component.name())
        });
        if let Some(index) = existing {
            let known = node.children[index]
                .component()
                .ok_or_else(|| RegistrationError::NameClash {
                    name: component.name().to_string(),
                })?;
            if !known.signature_matches(component) {
                return Err(RegistrationError::NameClash {
                    name: component.name().to_string(),
                });
            }
            if component.is_literal() {
                let added = component
                    .aliases()
                    .iter()
                    .filter(|alias| !known.aliases().contains(alias))
                    .cloned()
                    .collect::<Vec<_>>();
                if !added.is_empty() {
                    self.check_literal_names(node, Some(index), component, &added)?;
                    if let Some(known) = node.children[index].component.take() {
                        node.children[index].component = Some(known.with_aliases(added));
                    }
                }
            }
            return Ok(index);
        }

        if component.is_literal() {
            let names = component.names().map(str::to_string).collect::<Vec<_>>();
            self.check_literal_names(node, None, component, &names)?;
        } else if self.ambiguity == AmbiguityPolicy::Reject
            && node.non_literal_children().next().is_some()
        {
            return Err(ambiguous(node, component));
        }
        node.children
            .push(Node::with_component(Some(component.clone())));
        Ok(node.children.len() - 1)
    }

    fn check_literal_names(
        &self,
        node: &Node<C>,
        skip: Option<usize>,
        component: &CommandComponent<C>,
        names: &[String],
    ) -> Result<(), RegistrationError> {
        let collides = node
            .children
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .filter_map(|(_, child)| child.component())
            .filter(|sibling| sibling.is_literal())
            .any(|sibling| {
                sibling
                    .names()
                    .any(|taken| names.iter().any(|name| self.case.matches(taken, name)))
            });
        if collides {
            return Err(ambiguous(node, component));
        }
        Ok(())
    }

    /// Resolves the unique command matching `input`, binding values into `context`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoSuchCommand`] when the first token selects no root literal,
    /// [`CommandError::Syntax`] when no child matches deeper, input ends early, or tokens are left
    /// over, and [`CommandError::ArgumentParse`] when a parser rejects its token(s).
    pub fn parse(
        &self,
        context: &mut CommandContext<C>,
        mut input: TokenQueue,
    ) -> Result<Arc<Command<C>>, CommandError> {
        let Some(first) = input.peek() else {
            return Err(CommandError::NoSuchCommand {
                token: String::new(),
            });
        };
        if !self
            .root
            .children
            .iter()
            .any(|child| {
                child
                    .component()
                    .is_some_and(|c| c.matches_literal(first, self.case))
            })
        {
            return Err(CommandError::NoSuchCommand {
                token: first.to_string(),
            });
        }

        let mut node = &self.root;
        let mut path_flags = Vec::new();
        let mut bound_flags = Vec::new();
        loop {
            let mut visible = path_flags.clone();
            node.chain_flags(&mut visible);
            peel_flags(context, &mut input, &visible, &mut bound_flags)?;
            path_flags.extend(node.flags.iter());

            let Some(head) = input.peek() else {
                let command = self.fill_defaults(context, node)?;
                return accept(command, &bound_flags);
            };

            if node.children.is_empty() {
                return Err(CommandError::Syntax {
                    syntax: node.first_syntax(),
                    token: Some(head.to_string()),
                    expected: Vec::new(),
                });
            }

            if let Some(child) = node.children.iter().find(|child| {
                child
                    .component()
                    .is_some_and(|c| c.matches_literal(head, self.case))
            }) {
                input.pop();
                node = child;
                continue;
            }

            let mut failure = None;
            let mut matched = None;
            for child in node.non_literal_children() {
                let Some(component) = child.component() else {
                    continue;
                };
                match parse_component(context, component, &input) {
                    Ok((value, rest)) => {
                        matched = Some((child, component, value, rest));
                        break;
                    }
                    Err(error) => {
                        failure.get_or_insert(error);
                    }
                }
            }
            match (matched, failure) {
                (Some((child, component, value, rest)), _) => {
                    debug!(component = %component.display(), "bound value");
                    context.store(component.name(), value);
                    input = rest;
                    node = child;
                }
                (None, Some(error)) => return Err(error),
                (None, None) => {
                    return Err(CommandError::Syntax {
                        syntax: node.first_syntax(),
                        token: Some(head.to_string()),
                        expected: node.child_displays(),
                    });
                }
            }
        }
    }

    fn fill_defaults<'t>(
        &'t self,
        context: &mut CommandContext<C>,
        mut node: &'t Node<C>,
    ) -> Result<&'t Arc<Command<C>>, CommandError> {
        loop {
            if let Some(command) = &node.command {
                return Ok(command);
            }
            let optional = node.non_literal_children().find(|child| {
                child
                    .component()
                    .is_some_and(|component| !component.is_required())
            });
            let Some((child, component)) =
                optional.and_then(|child| child.component().map(|component| (child, component)))
            else {
                return Err(CommandError::Syntax {
                    syntax: node.first_syntax(),
                    token: None,
                    expected: node.child_displays(),
                });
            };
            if let Some(raw) = component.default_value() {
                let (value, _) = parse_component(context, component, &TokenQueue::from_input(raw))?;
                context.store(component.name(), value);
            }
            node = child;
        }
    }

    /// Completions for the last token of `input`, in registration order and deduplicated.
    ///
    /// `allowed` decides which commands the sender may see; branches reaching only hidden or
    /// disallowed commands are skipped. Parser failures prune their branch only. The walk binds
    /// values into its own `context` and has no other effect.
    pub fn suggest(
        &self,
        mut context: CommandContext<C>,
        mut input: TokenQueue,
        allowed: &dyn Fn(&C, &Command<C>) -> bool,
    ) -> Vec<String> {
        let mut node = &self.root;
        let mut path_flags = Vec::new();
        let mut used = HashSet::new();
        loop {
            let mut visible = path_flags.clone();
            node.chain_flags(&mut visible);

            if let Some(flag) = skip_flags(&mut input, &visible, &mut used) {
                let partial = input.iter().last().unwrap_or_default();
                return filter_values(flag.suggest(&context, partial), partial);
            }
            path_flags.extend(node.flags.iter());

            let Some(head) = input.peek() else {
                return Vec::new();
            };
            if input.len() == 1 {
                return self.complete(&context, node, &visible, &used, head, allowed);
            }

            let sender = context.sender();
            let reachable = |child: &&Node<C>| child.reaches(sender, allowed);
            if let Some(child) = node.children.iter().filter(reachable).find(|child| {
                child
                    .component()
                    .is_some_and(|c| c.matches_literal(head, self.case))
            }) {
                input.pop();
                node = child;
                continue;
            }

            let mut next = None;
            for child in node.non_literal_children().filter(reachable) {
                let Some(component) = child.component() else {
                    continue;
                };
                if component.arity() == ArityClass::Greedy {
                    let partial = input.iter().last().unwrap_or_default();
                    let mut out = flag_markers(&visible, &used, partial);
                    out.extend(filter_values(component.suggest(&context, partial), partial));
                    return dedupe(out);
                }
                if let Ok((value, rest)) = parse_component(&context, component, &input) {
                    next = Some((child, component, value, rest));
                    break;
                }
            }
            let Some((child, component, value, rest)) = next else {
                return Vec::new();
            };
            if rest.is_empty() {
                let partial = input.iter().last().unwrap_or_default();
                let mut out = flag_markers(&visible, &used, partial);
                out.extend(filter_values(component.suggest(&context, partial), partial));
                return dedupe(out);
            }
            context.store(component.name(), value);
            input = rest;
            node = child;
        }
    }

    fn complete(
        &self,
        context: &CommandContext<C>,
        node: &Node<C>,
        visible: &[&CommandComponent<C>],
        used: &HashSet<String>,
        partial: &str,
        allowed: &dyn Fn(&C, &Command<C>) -> bool,
    ) -> Vec<String> {
        let mut out = flag_markers(visible, used, partial);
        for child in node
            .children
            .iter()
            .filter(|child| child.reaches(context.sender(), allowed))
        {
            let Some(component) = child.component() else {
                continue;
            };
            if component.is_literal() {
                out.extend(
                    component
                        .names()
                        .filter(|name| self.case.starts_with(name, partial))
                        .map(str::to_string),
                );
            } else {
                out.extend(filter_values(component.suggest(context, partial), partial));
            }
        }
        dedupe(out)
    }
}

fn ambiguous<C>(node: &Node<C>, component: &CommandComponent<C>) -> RegistrationError {
    RegistrationError::AmbiguousNode {
        parent: node.display(),
        child: component.display(),
        siblings: node.child_displays(),
    }
}

fn attach_flag<C>(node: &mut Node<C>, flag: &CommandComponent<C>) -> Result<(), RegistrationError> {
    match node.flags.iter().find(|known| known.name() == flag.name()) {
        Some(known) if known.signature_matches(flag) => Ok(()),
        Some(_) => Err(RegistrationError::NameClash {
            name: flag.name().to_string(),
        }),
        None => {
            node.flags.push(flag.clone());
            Ok(())
        }
    }
}

/// Flags visible together at a node must not share a marker, or `-x` would bind whichever was
/// attached first.
fn verify_flag_markers<'t, C>(
    node: &'t Node<C>,
    path: &[&'t CommandComponent<C>],
) -> Result<(), RegistrationError> {
    let mut visible = path.to_vec();
    node.chain_flags(&mut visible);
    let mut owners = HashMap::new();
    for flag in &visible {
        for marker in flag.names() {
            match owners.insert(marker, flag.name()) {
                Some(owner) if owner != flag.name() => {
                    return Err(RegistrationError::AmbiguousNode {
                        parent: node.display(),
                        child: flag.display(),
                        siblings: visible.iter().map(|flag| flag.display()).collect(),
                    });
                }
                _ => {}
            }
        }
    }
    let mut path = path.to_vec();
    path.extend(node.flags.iter());
    node.children
        .iter()
        .try_for_each(|child| verify_flag_markers(child, &path))
}

/// A node that runs a command must not also reach another command through an optional child.
fn verify_optional_reach<C>(node: &Node<C>) -> Result<(), RegistrationError> {
    if node.command.is_some() {
        let optional = node.non_literal_children().find_map(|child| {
            child
                .component()
                .filter(|component| !component.is_required())
        });
        if let Some(component) = optional {
            return Err(ambiguous(node, component));
        }
    }
    node.children.iter().try_for_each(verify_optional_reach)
}

fn parse_component<C>(
    context: &CommandContext<C>,
    component: &CommandComponent<C>,
    input: &TokenQueue,
) -> Result<(ArgValue, TokenQueue), CommandError> {
    let mut attempt = input.clone();
    let result = match component.parser() {
        Some(parser) => parser.parse(context, &mut attempt),
        None => Err(ParseFailure::new(
            ParseFailureReason::Custom(format!("`{}` has no parser", component.name())),
            attempt.position(),
        )),
    };
    result
        .map(|value| (value, attempt))
        .map_err(|cause| CommandError::ArgumentParse {
            component: component.display(),
            cause,
        })
}

fn peel_flags<C>(
    context: &mut CommandContext<C>,
    input: &mut TokenQueue,
    visible: &[&CommandComponent<C>],
    bound: &mut Vec<String>,
) -> Result<(), CommandError> {
    let mut index = 0;
    while let Some(token) = input.get(index) {
        let Some(flag) = visible.iter().copied().find(|flag| flag.matches_flag(token)) else {
            index += 1;
            continue;
        };
        let position = input.position_at(index);
        let name = flag.name().to_string();
        if bound.contains(&name) {
            return Err(CommandError::ArgumentParse {
                component: flag.display(),
                cause: ParseFailure::new(
                    ParseFailureReason::DuplicateFlag { flag: name },
                    position,
                ),
            });
        }
        input.remove(index);
        match flag.parser() {
            None => context.store(name.clone(), ArgValue::Bool(true)),
            Some(parser) => {
                let mut tail = input.split_off(index);
                if tail.is_empty() {
                    return Err(CommandError::ArgumentParse {
                        component: flag.display(),
                        cause: ParseFailure::new(
                            ParseFailureReason::MissingFlagValue { flag: name },
                            tail.position(),
                        ),
                    });
                }
                let value = parser
                    .parse(context, &mut tail)
                    .map_err(|cause| CommandError::ArgumentParse {
                        component: flag.display(),
                        cause,
                    })?;
                context.store(name.clone(), value);
                input.append(tail);
            }
        }
        debug!(flag = %name, "flag bound");
        bound.push(name);
    }
    Ok(())
}

fn accept<C>(
    command: &Arc<Command<C>>,
    bound_flags: &[String],
) -> Result<Arc<Command<C>>, CommandError> {
    if let Some(name) = bound_flags.iter().find(|name| !command.declares_flag(name)) {
        return Err(CommandError::Syntax {
            syntax: command.syntax(),
            token: Some(format!("-{name}")),
            expected: Vec::new(),
        });
    }
    Ok(Arc::clone(command))
}

/// Drops flag markers and their value tokens from every token but the last, the way parsing
/// peels them. Returns the value flag whose value is the last token.
fn skip_flags<'t, C>(
    input: &mut TokenQueue,
    visible: &[&'t CommandComponent<C>],
    used: &mut HashSet<String>,
) -> Option<&'t CommandComponent<C>> {
    let mut index = 0;
    while index + 1 < input.len() {
        let Some(flag) = input
            .get(index)
            .and_then(|token| visible.iter().copied().find(|flag| flag.matches_flag(token)))
        else {
            index += 1;
            continue;
        };
        input.remove(index);
        used.insert(flag.name().to_string());
        if flag.takes_value() {
            if index + 1 == input.len() {
                return Some(flag);
            }
            input.remove(index);
        }
    }
    None
}

/// Markers of unused visible flags, offered only once the partial starts a flag.
fn flag_markers<C>(
    visible: &[&CommandComponent<C>],
    used: &HashSet<String>,
    partial: &str,
) -> Vec<String> {
    if !partial.starts_with('-') {
        return Vec::new();
    }
    visible
        .iter()
        .filter(|flag| !used.contains(flag.name()))
        .map(|flag| flag.flag_marker())
        .filter(|marker| marker.starts_with(partial))
        .collect()
}

fn filter_values(values: Vec<String>, partial: &str) -> Vec<String> {
    let prefix = partial.to_lowercase();
    values
        .into_iter()
        .filter(|value| value.to_lowercase().starts_with(&prefix))
        .collect()
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{parser::ParserRegistry, syntax::CommandSyntax};

    fn tree_with(
        case: LiteralCase,
        ambiguity: AmbiguityPolicy,
        syntaxes: &[&str],
    ) -> CommandTree<()> {
        let registry = ParserRegistry::new();
        let mut tree = CommandTree::new(case, ambiguity);
        for raw in syntaxes {
            let command = CommandSyntax::parse(&registry, raw)
                .expect("syntax")
                .handler(|_: &mut CommandContext<()>| Ok(()))
                .build()
                .expect("command");
            tree.insert(command).expect("insert");
        }
        tree
    }

    fn tree(syntaxes: &[&str]) -> CommandTree<()> {
        tree_with(LiteralCase::Sensitive, AmbiguityPolicy::Reject, syntaxes)
    }

    fn try_insert(tree: &mut CommandTree<()>, raw: &str) -> Result<(), RegistrationError> {
        let registry = ParserRegistry::new();
        let command = CommandSyntax::parse(&registry, raw)?
            .handler(|_: &mut CommandContext<()>| Ok(()))
            .build()?;
        tree.insert(command).map(|_| ())
    }

    fn parse(
        tree: &CommandTree<()>,
        raw: &str,
    ) -> Result<(String, CommandContext<()>), CommandError> {
        let mut context = CommandContext::new(());
        let command = tree.parse(&mut context, TokenQueue::from_input(raw))?;
        Ok((command.syntax(), context))
    }

    fn suggest(tree: &CommandTree<()>, raw: &str) -> Vec<String> {
        tree.suggest(CommandContext::new(()), TokenQueue::for_suggestions(raw), &|_, _| true)
    }

    #[test]
    fn shared_prefixes_merge_into_one_branch() {
        let tree = tree(&["math add <x:int> <y:int>", "math sub <x:int> <y:int>"]);
        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].children.len(), 2);
        let (syntax, context) = parse(&tree, "math sub 5 2").expect("parse");
        assert_eq!(syntax, "math sub <x> <y>");
        assert_eq!(context.get::<i32>("x"), Some(5));
    }

    #[test]
    fn premature_end_lists_expected_children() {
        let tree = tree(&["math add <x:int> <y:int>"]);
        match parse(&tree, "math").map(|(syntax, _)| syntax) {
            Err(CommandError::Syntax {
                token, expected, ..
            }) => {
                assert_eq!(token, None);
                assert_eq!(expected, vec!["add".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_root_and_blank_input_are_no_such_command() {
        let tree = tree(&["ping"]);
        assert!(matches!(
            parse(&tree, "pong"),
            Err(CommandError::NoSuchCommand { token }) if token == "pong"
        ));
        assert!(matches!(
            parse(&tree, "   "),
            Err(CommandError::NoSuchCommand { token }) if token.is_empty()
        ));
    }

    #[test]
    fn leftover_tokens_are_a_syntax_error() {
        let tree = tree(&["ping"]);
        match parse(&tree, "ping now") {
            Err(CommandError::Syntax {
                syntax,
                token,
                expected,
            }) => {
                assert_eq!(syntax, "ping");
                assert_eq!(token.as_deref(), Some("now"));
                assert!(expected.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_optional_uses_default() {
        let tree = tree(&["add <x:int> [y:int=5]"]);
        let (_, context) = parse(&tree, "add 1").expect("parse");
        assert_eq!(context.get::<i32>("y"), Some(5));
        let (_, context) = parse(&tree, "add 1 2").expect("parse");
        assert_eq!(context.get::<i32>("y"), Some(2));
    }

    #[test]
    fn flags_may_appear_anywhere_after_their_node() {
        let tree = tree(&["say <msg:string...> [-loud] [-times:int]"]);
        let (_, context) = parse(&tree, "say -times 3 hello -loud world").expect("parse");
        assert!(context.flag("loud"));
        assert_eq!(context.get::<i32>("times"), Some(3));
        assert_eq!(context.get::<String>("msg").as_deref(), Some("hello world"));
    }

    #[test]
    fn repeated_or_valueless_flags_fail() {
        let tree = tree(&["say <msg:string...> [-loud] [-times:int]"]);
        assert!(matches!(
            parse(&tree, "say -loud hi -loud"),
            Err(CommandError::ArgumentParse { cause, .. })
                if matches!(cause.reason, ParseFailureReason::DuplicateFlag { .. })
        ));
        assert!(matches!(
            parse(&tree, "say hi -times"),
            Err(CommandError::ArgumentParse { cause, .. })
                if matches!(cause.reason, ParseFailureReason::MissingFlagValue { .. })
        ));
    }

    #[test]
    fn flags_of_a_sibling_command_are_rejected() {
        let tree = tree(&["mode on [-force]", "mode off"]);
        assert!(parse(&tree, "mode on -force").is_ok());
        assert!(matches!(
            parse(&tree, "mode off -force"),
            Err(CommandError::Syntax { .. })
        ));
    }

    #[test]
    fn second_non_literal_sibling_is_ambiguous_by_default() {
        let mut tree = tree(&["give <amount:int>"]);
        assert!(matches!(
            try_insert(&mut tree, "give <item:string>"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert_eq!(tree.commands().len(), 1);
    }

    #[test]
    fn registration_order_breaks_sibling_ties() {
        let tree = tree_with(
            LiteralCase::Sensitive,
            AmbiguityPolicy::RegistrationOrder,
            &["pick <n:int>", "pick <name:string>"],
        );
        assert_eq!(parse(&tree, "pick 5").expect("int").0, "pick <n>");
        assert_eq!(parse(&tree, "pick five").expect("string").0, "pick <name>");

        let reversed = tree_with(
            LiteralCase::Sensitive,
            AmbiguityPolicy::RegistrationOrder,
            &["pick <name:string>", "pick <n:int>"],
        );
        assert_eq!(parse(&reversed, "pick 5").expect("string").0, "pick <name>");
    }

    #[test]
    fn duplicate_paths_and_clashes_are_rejected() {
        let mut tree = tree(&["math add <x:int>"]);
        assert!(matches!(
            try_insert(&mut tree, "math add <x:int>"),
            Err(RegistrationError::DuplicateCommand { .. })
        ));
        assert!(matches!(
            try_insert(&mut tree, "math add <x:string> <y:int>"),
            Err(RegistrationError::NameClash { .. })
        ));
        assert!(matches!(
            try_insert(&mut tree, "maths|math"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert!(try_insert(&mut tree, "math add").is_ok());
    }

    #[test]
    fn command_node_cannot_reach_another_through_an_optional_child() {
        let mut tree = tree(&["list"]);
        assert!(matches!(
            try_insert(&mut tree, "list [page:int]"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert!(try_insert(&mut tree, "list <page:int>").is_ok());
    }

    #[test]
    fn literal_case_policy_applies_to_parse() {
        let tree = tree_with(LiteralCase::Insensitive, AmbiguityPolicy::Reject, &["Ping"]);
        assert!(parse(&tree, "PING").is_ok());
    }

    #[test]
    fn suggestions_follow_registration_order() {
        let tree = tree(&["math sub <x:int>", "math add|plus <x:int>", "mode <m:(fast|slow)>"]);
        assert_eq!(suggest(&tree, ""), vec!["math", "mode"]);
        assert_eq!(suggest(&tree, "math "), vec!["sub", "add", "plus"]);
        assert_eq!(suggest(&tree, "math p"), vec!["plus"]);
        assert_eq!(suggest(&tree, "mode f"), vec!["fast"]);
        assert!(suggest(&tree, "math add x ").is_empty());
    }

    #[test]
    fn suggestions_offer_unused_flag_markers() {
        let tree = tree(&["say <msg:string...> [-loud] [-times:int]"]);
        assert_eq!(suggest(&tree, "say -"), vec!["-loud", "-times"]);
        assert_eq!(suggest(&tree, "say -loud -"), vec!["-times"]);
    }

    #[test]
    fn colliding_flag_markers_are_rejected() {
        let mut tree = CommandTree::default();
        assert!(matches!(
            try_insert(&mut tree, "say <m:string...> [-loud|l] [-list|l]"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert!(tree.commands().is_empty());

        try_insert(&mut tree, "give <amount:int> [-silent|s]").expect("give");
        assert!(matches!(
            try_insert(&mut tree, "give <amount:int> <target:string> [-sneaky|s]"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert!(matches!(
            try_insert(&mut tree, "give <amount:int> <target:string> [-s]"),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
        assert_eq!(tree.commands().len(), 1);

        try_insert(&mut tree, "team add [-silent|s]").expect("team add");
        try_insert(&mut tree, "team remove [-sneaky|s]").expect("team remove");
    }

    #[test]
    fn flag_suggestions_follow_the_parse_walk_past_greedy_values() {
        let tree = tree(&[
            "say <msg:string...> [-loud] [-times:int]",
            "give <amount:int> [-silent]",
        ]);
        assert_eq!(suggest(&tree, "say hi -"), vec!["-loud", "-times"]);
        assert_eq!(suggest(&tree, "say hi -loud there -"), vec!["-times"]);
        assert_eq!(suggest(&tree, "say -times 3 hi -l"), vec!["-loud"]);
        assert_eq!(suggest(&tree, "give 5 -"), vec!["-silent"]);
        assert!(suggest(&tree, "say hi").is_empty());
        assert!(parse(&tree, "say hi -loud").is_ok());
    }

    #[test]
    fn hidden_and_disallowed_branches_are_not_suggested() {
        let registry = ParserRegistry::new();
        let mut tree = CommandTree::default();
        for (raw, hidden) in [("status", false), ("debug", true), ("admin reload", false)] {
            let mut builder = CommandSyntax::parse(&registry, raw)
                .expect("syntax")
                .handler(|_: &mut CommandContext<()>| Ok(()));
            if hidden {
                builder = builder.hidden();
            }
            tree.insert(builder.build().expect("command")).expect("insert");
        }
        let allowed = |_: &(), command: &Command<()>| !command.syntax().starts_with("admin");
        assert_eq!(
            tree.suggest(CommandContext::new(()), TokenQueue::for_suggestions(""), &allowed),
            vec!["status"]
        );
        assert!(parse(&tree, "debug").is_ok());
    }

    #[test]
    fn suggestion_walk_is_idempotent() {
        let tree = tree(&["math add <x:int{0..20}> <y:int>"]);
        let first = suggest(&tree, "math add 1");
        assert_eq!(first, suggest(&tree, "math add 1"));
        assert_eq!(first[0], "1");
    }
}
