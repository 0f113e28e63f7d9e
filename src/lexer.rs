//! Tokenization is an external collaborator, per `spec.md` §1's Non-goals
//! and §9's "global mutable state" design note: the core only needs a
//! `Lexer` trait to drive ingest, plus an explicit [`LabelStack`] value in
//! place of the original's process-wide label stack global.
//!
//! [`WhitespaceLexer`] is the one concrete lexer this crate ships — enough
//! for tests and the CLI's `ingest` subcommand — recognizing `[label]` /
//! `[/label]` markers around whitespace-split words.

use crate::error::{Error, Result};
use crate::{LabelId, Pos};

/// One lexical event: a word at the current position, or a label region
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    LabelOpen(String),
    LabelClose(String),
}

/// Turns a byte stream into a sequence of [`Token`]s. Implementations
/// decide what counts as a word and how label markers are spelled; the core
/// only consumes the resulting stream.
pub trait Lexer {
    fn next_token(&mut self) -> Option<Token>;
}

/// Tracks which labels are currently open for the document being ingested,
/// replacing the original library's process-wide label-stack global with an
/// explicit value threaded through the ingest call.
///
/// Rejects overlapping regions of the *same* label id, per `spec.md` §9
/// Open Question #4 ("overlapping or nested fields of the same label id are
/// not defined by the source — forbid them at ingest").
#[derive(Debug, Default)]
pub struct LabelStack {
    open: Vec<(LabelId, Pos)>,
}

impl LabelStack {
    pub fn new() -> LabelStack {
        LabelStack { open: Vec::new() }
    }

    /// Open a field at `pos`. Distinct label ids may nest freely; a second
    /// open of the same label id before its matching close is rejected.
    pub fn push(&mut self, label: LabelId, pos: Pos) -> Result<()> {
        if self.open.iter().any(|&(l, _)| l == label) {
            return Err(Error::FormatError(format!(
                "label {} opened again before its previous span closed",
                label
            )));
        }
        self.open.push((label, pos));
        Ok(())
    }

    /// Close the most recently opened span of `label`, returning its start
    /// position (the caller pairs it with the current position to form the
    /// `[start, end)` boundary-marker append).
    pub fn pop(&mut self, label: LabelId) -> Result<Pos> {
        match self.open.iter().rposition(|&(l, _)| l == label) {
            Some(idx) => Ok(self.open.remove(idx).1),
            None => Err(Error::FormatError(format!("label {} closed without a matching open", label))),
        }
    }

    pub fn is_open(&self, label: LabelId) -> bool {
        self.open.iter().any(|&(l, _)| l == label)
    }

    /// Labels currently open, in nesting order (outermost first).
    pub fn active_labels(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.open.iter().map(|&(l, _)| l)
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Splits on ASCII whitespace; recognizes `[name]`/`[/name]` as label
/// open/close markers rather than words.
pub struct WhitespaceLexer<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> WhitespaceLexer<'a> {
    pub fn new(text: &'a str) -> WhitespaceLexer<'a> {
        WhitespaceLexer { words: text.split_whitespace() }
    }
}

impl<'a> Lexer for WhitespaceLexer<'a> {
    fn next_token(&mut self) -> Option<Token> {
        let raw = self.words.next()?;
        if let Some(name) = raw.strip_prefix("[/").and_then(|s| s.strip_suffix(']')) {
            Some(Token::LabelClose(name.to_lowercase()))
        } else if let Some(name) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(Token::LabelOpen(name.to_lowercase()))
        } else {
            Some(Token::Word(raw.to_lowercase()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_words_and_markers() {
        let mut lexer = WhitespaceLexer::new("[title] a b [/title] c");
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token() {
            tokens.push(tok);
        }
        assert_eq!(
            tokens,
            vec![
                Token::LabelOpen("title".into()),
                Token::Word("a".into()),
                Token::Word("b".into()),
                Token::LabelClose("title".into()),
                Token::Word("c".into()),
            ]
        );
    }

    #[test]
    fn rejects_overlapping_same_label() {
        let mut stack = LabelStack::new();
        stack.push(1, 0).unwrap();
        let err = stack.push(1, 3).unwrap_err();
        assert!(matches!(err, Error::FormatError(_)));
    }

    #[test]
    fn distinct_labels_may_nest() {
        let mut stack = LabelStack::new();
        stack.push(1, 0).unwrap();
        stack.push(2, 1).unwrap();
        assert_eq!(stack.pop(2).unwrap(), 1);
        assert_eq!(stack.pop(1).unwrap(), 0);
        assert!(stack.is_empty());
    }

    #[test]
    fn close_without_open_is_an_error() {
        let mut stack = LabelStack::new();
        assert!(stack.pop(9).is_err());
    }
}
