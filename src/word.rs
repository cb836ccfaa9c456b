use std::fmt;

use crate::dep_tree::DepTree;
use crate::parse_tree::ParseTree;

/// A token of the sentence as delivered by the tagging stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
  pub form: String,
  pub lemma: String,
  pub tag: String,
  /// Position of the token in the sentence, starting at 0
  pub position: usize,
  /// Ranked word senses, if the sense annotator ran
  pub senses: Vec<String>,
}

impl Word {
  pub fn new(form: &str, lemma: &str, tag: &str, position: usize) -> Self {
    Self {
      form: form.to_string(),
      lemma: lemma.to_string(),
      tag: tag.to_string(),
      position,
      senses: Vec::new(),
    }
  }

  pub fn lc_form(&self) -> String {
    self.form.to_lowercase()
  }

  /// First character of the tag, used as coarse category in semantic lookups
  pub fn pos_prefix(&self) -> &str {
    match self.tag.char_indices().nth(1) {
      Some((idx, _)) => &self.tag[..idx],
      None => &self.tag,
    }
  }
}

impl fmt::Display for Word {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.form, self.lemma, self.tag)
  }
}

/// A sentence with its k-best analyses. `parse_trees[k]` starts as the chunker
/// output for the k-th tag sequence and is replaced by the completed tree;
/// `dep_trees[k]` is filled by the dependency stage.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
  pub words: Vec<Word>,
  pub parse_trees: Vec<ParseTree>,
  pub dep_trees: Vec<DepTree>,
}

impl Sentence {
  pub fn new(words: Vec<Word>) -> Self {
    Self {
      words,
      ..Default::default()
    }
  }

  /// Builds a sentence from a single chunker forest, taking the words from its leaves
  pub fn from_parse_tree(tree: ParseTree) -> Self {
    let words = tree.words().cloned().collect();
    Self {
      words,
      parse_trees: vec![tree],
      dep_trees: Vec::new(),
    }
  }

  pub fn num_kbest(&self) -> usize {
    self.parse_trees.len()
  }
}
