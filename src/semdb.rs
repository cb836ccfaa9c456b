use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::utils::{Err, GrammarError};
use crate::word::Word;

/// Parent senses farther away than this are not explored
pub const MAX_PARENT_DEPTH: usize = 16;

/// What the semantic database knows about one sense
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenseInfo {
  pub parents: Vec<String>,
  /// Top-ontology tags
  pub tonto: Vec<String>,
  pub semfile: String,
  /// Synonym words of the sense
  pub words: Vec<String>,
}

/// Read-only access to a word-sense database
pub trait SemanticDb: Send + Sync {
  /// Senses of a word, most likely first. `pos` is the coarse category (first tag char).
  fn senses_of(&self, form: &str, lemma: &str, pos: &str) -> Vec<String>;

  fn info_of(&self, sense: &str) -> Option<SenseInfo>;
}

/// Senses to use for `word`: the annotated ones if present, otherwise a
/// database lookup.
pub fn senses_for(db: &dyn SemanticDb, word: &Word) -> Vec<String> {
  if word.senses.is_empty() {
    db.senses_of(&word.lc_form(), &word.lemma, word.pos_prefix())
  } else {
    word.senses.clone()
  }
}

/// Visits `senses` and then their ancestors breadth-first, each sense at most
/// once and never deeper than `MAX_PARENT_DEPTH`. Stops as soon as `visit`
/// returns true, and returns whether it did.
pub fn walk_with_parents(
  db: &dyn SemanticDb,
  senses: Vec<String>,
  mut visit: impl FnMut(&SenseInfo) -> bool,
) -> bool {
  let mut seen = HashSet::new();
  let mut queue = senses.into_iter().map(|s| (s, 0)).collect::<VecDeque<_>>();

  while let Some((sense, depth)) = queue.pop_front() {
    if !seen.insert(sense.clone()) {
      continue;
    }
    let info = match db.info_of(&sense) {
      Some(info) => info,
      None => continue,
    };
    if visit(&info) {
      return true;
    }
    if depth < MAX_PARENT_DEPTH {
      queue.extend(info.parents.into_iter().map(|p| (p, depth + 1)));
    } else {
      tracing::debug!("sense {} reached the parent depth bound", sense);
    }
  }
  false
}

/// An in-memory sense table.
///
/// Text form, one entry per line, `%` starts a comment:
///
/// ```text
/// sense 02121620-n parents=02120997-n tonto=Animal,Living semfile=noun.animal words=cat,true_cat
/// word cat n 02121620-n 02985606-n
/// ```
#[derive(Debug, Clone, Default)]
pub struct SenseTable {
  words: HashMap<(String, String), Vec<String>>,
  senses: HashMap<String, SenseInfo>,
}

impl SenseTable {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add_word(&mut self, lemma: &str, pos: &str, senses: &[&str]) {
    self
      .words
      .entry((lemma.to_string(), pos.to_string()))
      .or_default()
      .extend(senses.iter().map(|s| s.to_string()));
  }

  pub fn add_sense(&mut self, sense: &str, info: SenseInfo) {
    self.senses.insert(sense.to_string(), info);
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
    let path = path.as_ref();
    let src = fs::read_to_string(path).map_err(|e| GrammarError::io(path, e))?;
    src.parse().map_err(|e: Err| GrammarError::Syntax {
      origin: path.display().to_string(),
      message: e.to_string(),
    })
  }
}

fn split_list(v: &str) -> Vec<String> {
  v.split(',')
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string())
    .collect()
}

impl FromStr for SenseTable {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut table = SenseTable::new();
    for (lnum, line) in s.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('%') {
        continue;
      }
      let mut fields = line.split_whitespace();
      match fields.next() {
        Some("sense") => {
          let sense = fields
            .next()
            .ok_or_else(|| format!("line {}: sense without id", lnum + 1))?;
          let mut info = SenseInfo::default();
          for field in fields {
            match field.split_once('=') {
              Some(("parents", v)) => info.parents = split_list(v),
              Some(("tonto", v)) => info.tonto = split_list(v),
              Some(("semfile", v)) => info.semfile = v.to_string(),
              Some(("words", v)) => info.words = split_list(v),
              _ => return Err(format!("line {}: bad sense field {}", lnum + 1, field).into()),
            }
          }
          table.add_sense(sense, info);
        }
        Some("word") => {
          let (lemma, pos) = match (fields.next(), fields.next()) {
            (Some(lemma), Some(pos)) => (lemma, pos),
            _ => return Err(format!("line {}: word needs lemma and pos", lnum + 1).into()),
          };
          let senses = fields.collect::<Vec<_>>();
          table.add_word(lemma, pos, &senses);
        }
        Some(other) => return Err(format!("line {}: unknown entry {}", lnum + 1, other).into()),
        None => {}
      }
    }
    Ok(table)
  }
}

impl SemanticDb for SenseTable {
  fn senses_of(&self, form: &str, lemma: &str, pos: &str) -> Vec<String> {
    self
      .words
      .get(&(lemma.to_string(), pos.to_string()))
      .or_else(|| self.words.get(&(form.to_string(), pos.to_string())))
      .cloned()
      .unwrap_or_default()
  }

  fn info_of(&self, sense: &str) -> Option<SenseInfo> {
    self.senses.get(sense).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TABLE: &str = "
    % toy hierarchy
    sense cat-n parents=feline-n tonto=Animal semfile=noun.animal words=cat
    sense feline-n parents=carnivore-n words=feline,felid
    sense carnivore-n parents=cat-n words=carnivore
    word cat n cat-n
  ";

  #[test]
  fn test_read_table() {
    let t: SenseTable = TABLE.parse().unwrap();
    assert_eq!(t.senses_of("cats", "cat", "n"), vec!["cat-n"]);
    assert!(t.senses_of("cat", "cat", "v").is_empty());
    assert_eq!(t.info_of("cat-n").unwrap().semfile, "noun.animal");
  }

  #[test]
  fn test_walk_terminates_on_cycles() {
    let t: SenseTable = TABLE.parse().unwrap();
    let mut visited = 0;
    let found = walk_with_parents(&t, vec!["cat-n".to_string()], |_| {
      visited += 1;
      false
    });
    assert!(!found);
    assert_eq!(visited, 3);
  }

  #[test]
  fn test_walk_finds_ancestor() {
    let t: SenseTable = TABLE.parse().unwrap();
    assert!(walk_with_parents(&t, vec!["cat-n".to_string()], |info| {
      info.words.iter().any(|w| w == "felid")
    }));
  }

  #[test]
  fn test_reject_unknown_entry() {
    assert!("lemma cat".parse::<SenseTable>().is_err());
  }
}
