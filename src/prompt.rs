//! Operator interaction: asking for a query and picking result lines
//!
//! The session only sees the [`QueryProvider`] and [`SelectionProvider`]
//! traits. [`TerminalPrompt`] talks to a human on stdin/stdout;
//! [`ScriptedPrompt`] replays canned answers for tests and unattended runs.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

/// Supplies the next search query
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Next query text, or `None` when the operator is done
    async fn query(&self) -> Result<Option<String>>;
}

/// Picks lines out of a search listing
#[async_trait]
pub trait SelectionProvider: Send + Sync {
    /// Indices of the chosen lines, in the order they should be requested
    ///
    /// May be empty. Indices outside `0..lines.len()` are dropped by the caller.
    async fn select(&self, lines: &[String]) -> Result<Vec<usize>>;
}

/// Parse an operator's selection such as `"0 2, 5-7"`
///
/// Tokens are separated by whitespace or commas; `a-b` is an inclusive range.
/// Tokens that are not numbers are ignored.
///
/// # Examples
///
/// ```
/// use ircget::prompt::parse_selection;
///
/// assert_eq!(parse_selection("0 2,5-7"), vec![0, 2, 5, 6, 7]);
/// assert_eq!(parse_selection("x 3"), vec![3]);
/// ```
pub fn parse_selection(input: &str) -> Vec<usize> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .flat_map(|token| match token.split_once('-') {
            Some((start, end)) => match (start.parse::<usize>(), end.parse::<usize>()) {
                (Ok(start), Ok(end)) if start <= end => (start..=end).collect(),
                _ => Vec::new(),
            },
            None => token.parse::<usize>().into_iter().collect(),
        })
        .collect()
}

/// Interactive prompt on stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Print `prompt` and read one line; `None` on end of input
    async fn read_line(prompt: String) -> Result<Option<String>> {
        spawn_blocking(move || -> std::io::Result<Option<String>> {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;

            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim().to_string()))
        })
        .await
        .map_err(|e| Error::Prompt(format!("prompt task failed: {}", e)))?
        .map_err(|e| Error::Prompt(e.to_string()))
    }
}

#[async_trait]
impl QueryProvider for TerminalPrompt {
    async fn query(&self) -> Result<Option<String>> {
        loop {
            match Self::read_line("Search for (ctrl+c to exit): ".to_string()).await? {
                None => return Ok(None),
                Some(query) if query.is_empty() => continue,
                Some(query) => return Ok(Some(query)),
            }
        }
    }
}

#[async_trait]
impl SelectionProvider for TerminalPrompt {
    async fn select(&self, lines: &[String]) -> Result<Vec<usize>> {
        let mut menu = String::new();
        for (i, line) in lines.iter().enumerate() {
            menu.push_str(&format!("[{i}] {line}\n"));
        }
        menu.push_str("Selection (line numbers, e.g. 0 2 5-7): ");

        Ok(Self::read_line(menu)
            .await?
            .map(|input| parse_selection(&input))
            .unwrap_or_default())
    }
}

/// Replays pre-recorded queries and selections
///
/// Once the queries run out, [`query`](QueryProvider::query) returns `None`,
/// which ends the session. Once the selections run out, nothing is selected.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    queries: Mutex<VecDeque<String>>,
    selections: Mutex<VecDeque<Vec<usize>>>,
    shown: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    /// Script the given answers
    pub fn new<Q, S>(queries: Q, selections: S) -> Self
    where
        Q: IntoIterator,
        Q::Item: Into<String>,
        S: IntoIterator<Item = Vec<usize>>,
    {
        Self {
            queries: Mutex::new(queries.into_iter().map(Into::into).collect()),
            selections: Mutex::new(selections.into_iter().collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Every listing passed to [`select`](SelectionProvider::select) so far
    pub async fn shown_listings(&self) -> Vec<Vec<String>> {
        self.shown.lock().await.clone()
    }

    /// Queries not yet handed out
    pub async fn remaining_queries(&self) -> usize {
        self.queries.lock().await.len()
    }
}

#[async_trait]
impl QueryProvider for ScriptedPrompt {
    async fn query(&self) -> Result<Option<String>> {
        Ok(self.queries.lock().await.pop_front())
    }
}

#[async_trait]
impl SelectionProvider for ScriptedPrompt {
    async fn select(&self, lines: &[String]) -> Result<Vec<usize>> {
        self.shown.lock().await.push(lines.to_vec());
        Ok(self.selections.lock().await.pop_front().unwrap_or_default())
    }
}
