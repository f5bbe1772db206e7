//! Token queue consumed by parsers, left to right.

use std::collections::VecDeque;

/// Ordered remaining input tokens of one parse attempt.
///
/// Every token remembers its index in the original input so failures can report a position even
/// after flags have been peeled out of the middle of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenQueue {
    tokens: VecDeque<(usize, String)>,
    end: usize,
}

impl TokenQueue {
    /// Creates a queue from already tokenized input.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(Into::into)
            .enumerate()
            .collect::<VecDeque<_>>();
        let end = tokens.len();
        Self { tokens, end }
    }

    /// Splits raw input on whitespace.
    pub fn from_input(input: &str) -> Self {
        Self::new(input.split_whitespace())
    }

    /// Splits partial input for suggestion walks.
    ///
    /// A trailing whitespace starts a new, empty token and blank input yields one empty token, so
    /// the last token is always the partial word being completed.
    pub fn for_suggestions(input: &str) -> Self {
        let mut tokens = input.split_whitespace().map(str::to_string).collect::<Vec<_>>();
        let ends_with_space = input
            .chars()
            .last()
            .map(char::is_whitespace)
            .unwrap_or(true);
        if ends_with_space {
            tokens.push(String::new());
        }
        Self::new(tokens)
    }

    /// Returns the head token.
    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(|(_, token)| token.as_str())
    }

    /// Removes and returns the head token.
    pub fn pop(&mut self) -> Option<String> {
        self.tokens.pop_front().map(|(_, token)| token)
    }

    /// Original index of the head token, or the input length when exhausted.
    pub fn position(&self) -> usize {
        self.tokens
            .front()
            .map(|(index, _)| *index)
            .unwrap_or(self.end)
    }

    /// Number of remaining tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether every token has been consumed.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at `index` counted from the head.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(|(_, token)| token.as_str())
    }

    /// Remaining tokens, head first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|(_, token)| token.as_str())
    }

    /// Consumes every remaining token.
    pub fn drain(&mut self) -> Vec<String> {
        self.tokens.drain(..).map(|(_, token)| token).collect()
    }

    pub(crate) fn position_at(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map(|(position, _)| *position)
            .unwrap_or(self.end)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<String> {
        self.tokens.remove(index).map(|(_, token)| token)
    }

    pub(crate) fn split_off(&mut self, index: usize) -> TokenQueue {
        TokenQueue {
            tokens: self.tokens.split_off(index),
            end: self.end,
        }
    }

    pub(crate) fn append(&mut self, mut tail: TokenQueue) {
        self.tokens.append(&mut tail.tokens);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn positions_survive_removal_from_the_middle() {
        let mut queue = TokenQueue::from_input("say -loud hello world");
        assert_eq!(queue.pop().as_deref(), Some("say"));
        assert_eq!(queue.remove(0).as_deref(), Some("-loud"));
        assert_eq!(queue.position(), 2);
        assert_eq!(queue.drain(), vec!["hello", "world"]);
        assert_eq!(queue.position(), 4);
    }

    #[test]
    fn suggestion_input_always_ends_with_partial_token() {
        assert_eq!(
            TokenQueue::for_suggestions("math ").iter().collect::<Vec<_>>(),
            vec!["math", ""]
        );
        assert_eq!(
            TokenQueue::for_suggestions("math a").iter().collect::<Vec<_>>(),
            vec!["math", "a"]
        );
        assert_eq!(
            TokenQueue::for_suggestions("").iter().collect::<Vec<_>>(),
            vec![""]
        );
    }

    #[test]
    fn split_and_append_restore_order() {
        let mut queue = TokenQueue::from_input("a b c d");
        let mut tail = queue.split_off(2);
        assert_eq!(tail.pop().as_deref(), Some("c"));
        queue.append(tail);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec!["a", "b", "d"]);
    }
}
