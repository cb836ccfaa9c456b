use std::collections::BTreeSet;
use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Unrecoverable problems while loading a grammar description. Authoring
/// faults inside a single rule are not errors: they are logged and the rule
/// (or condition) is skipped.
#[derive(Debug, Error)]
pub enum GrammarError {
  #[error("cannot read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{origin}: semantic function '{function}' used, but no <SEMDB> section precedes it")]
  MissingSemdb { origin: String, function: String },

  #[error("{origin}: {message}")]
  Syntax { origin: String, message: String },
}

impl GrammarError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

/// Shape faults in a parse tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
  #[error("no head child under node '{0}'")]
  NoHead(String),
}

/// Splits a `|`-separated list of values into a set, dropping empty pieces.
///
/// ```
/// let set = chunkdep::utils::split_set("a|b||a");
/// assert_eq!(set.len(), 2);
/// assert!(set.contains("a") && set.contains("b"));
/// ```
pub fn split_set(s: &str) -> BTreeSet<String> {
  s.split('|')
    .filter(|v| !v.is_empty())
    .map(|v| v.to_string())
    .collect()
}

/// Splits `top:rest` into its first segment and the remainder (possibly empty).
pub fn split_top(path: &str) -> (&str, &str) {
  match path.find(':') {
    Some(idx) => (&path[..idx], &path[idx + 1..]),
    None => (path, ""),
  }
}
