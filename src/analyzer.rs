use rayon::prelude::*;
use std::mem;

use crate::completer::{Session, complete};
use crate::dep_tree::DepTree;
use crate::expression::Resources;
use crate::grammar::Grammar;
use crate::labeler::label;
use crate::parse_tree::ParseTree;
use crate::semdb::SemanticDb;
use crate::word::Sentence;

/// Turns chunker output into complete constituency trees and labeled
/// dependency trees. Holds only read-only data, so one analyzer can serve
/// many threads.
pub struct Analyzer {
  grammar: Grammar,
  semdb: Option<Box<dyn SemanticDb>>,
}

impl Analyzer {
  /// Semantic conditions use the grammar's own sense table, if it has one
  pub fn new(grammar: Grammar) -> Self {
    Self {
      grammar,
      semdb: None,
    }
  }

  /// Uses `db` for semantic conditions instead of the grammar's sense table
  pub fn with_semdb(mut self, db: impl SemanticDb + 'static) -> Self {
    self.semdb = Some(Box::new(db));
    self
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  fn resources(&self) -> Resources<'_> {
    let semdb = self.semdb.as_deref().or_else(|| {
      self
        .grammar
        .sense_table
        .as_ref()
        .map(|t| t as &dyn SemanticDb)
    });
    Resources {
      word_classes: &self.grammar.word_classes,
      pair_classes: &self.grammar.pair_classes,
      semdb,
    }
  }

  /// Completes one chunker forest with a fresh session
  pub fn complete_tree(&self, pt: ParseTree) -> ParseTree {
    complete(&self.grammar, pt, &mut Session::new(), &self.resources())
  }

  /// Converts a complete tree and labels its edges
  pub fn dependencies(&self, pt: &ParseTree) -> DepTree {
    let mut dt = DepTree::from_parse_tree(pt);
    label(&self.grammar, &mut dt, &self.resources());
    dt
  }

  /// Replaces every k-best chunker forest of `s` by its completed tree
  pub fn complete_parse_tree(&self, s: &mut Sentence) {
    s.parse_trees = mem::take(&mut s.parse_trees)
      .into_iter()
      .map(|pt| self.complete_tree(pt))
      .collect();
  }

  /// Completes every k-best tree of `s` and fills in its dependency trees
  pub fn analyze(&self, s: &mut Sentence) {
    self.complete_parse_tree(s);
    s.dep_trees = s.parse_trees.iter().map(|pt| self.dependencies(pt)).collect();
  }

  /// `analyze` over many sentences in parallel
  pub fn analyze_all(&self, sentences: &mut [Sentence]) {
    sentences.par_iter_mut().for_each(|s| self.analyze(s));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::semdb::SenseTable;

  #[test]
  fn test_analyze_kbest() {
    let g: Grammar = "<GRPAR>
      1 - - (sn,grup-verb) - top_right RELABEL -
      </GRPAR>
      <GRLAB>
      grup-verb subj d.label=sn
      </GRLAB>"
      .parse()
      .unwrap();
    let analyzer = Analyzer::new(g);

    let first: ParseTree = "(S (sn (+n cats/cat/NNS)) (grup-verb (+v purr/purr/VBP)))"
      .parse()
      .unwrap();
    let second: ParseTree = "(S (grup-verb (+v cats/cat/VBZ)) (grup-verb (+v purr/purr/VBP)))"
      .parse()
      .unwrap();
    let mut s = Sentence::from_parse_tree(first);
    s.parse_trees.push(second);

    analyzer.analyze(&mut s);
    assert_eq!(s.num_kbest(), 2);
    assert_eq!(s.dep_trees.len(), 2);

    let dt = &s.dep_trees[0];
    assert_eq!(dt.word(dt.root()).form, "purr");
    assert_eq!(dt.label(dt.children(dt.root())[0]), "subj");

    let dt = &s.dep_trees[1];
    assert_eq!(dt.word(dt.root()).form, "cats");
    assert_eq!(dt.label(dt.children(dt.root())[0]), "modnomatch");
  }

  #[test]
  fn test_external_semdb() {
    let dir = std::env::temp_dir().join(format!("chunkdep-analyzer-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("empty.dat"), "% nothing\n").unwrap();
    let src = "<SEMDB>\nempty.dat\n</SEMDB>\n<GRLAB>\ngrup-verb animate d.tonto=Animal\n</GRLAB>";
    let g = Grammar::parse_with_base(src, &dir).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let pt: ParseTree = "(grup-verb (sn (+n cats/cat/NNS)) (+v purr/purr/VBP))"
      .parse()
      .unwrap();

    let plain = Analyzer::new(g);
    let dt = plain.dependencies(&pt);
    assert_eq!(dt.label(dt.children(dt.root())[0]), "modnomatch");

    let table: SenseTable = "sense cat-1 tonto=Animal\nword cat N cat-1".parse().unwrap();
    let with_db = Analyzer::new(plain.grammar).with_semdb(table);
    let dt = with_db.dependencies(&pt);
    assert_eq!(dt.label(dt.children(dt.root())[0]), "animate");
  }

  #[test]
  fn test_analyze_all_matches_sequential() {
    let g: Grammar = "<GRPAR>
      1 - - (sn,grup-verb) - top_right RELABEL -
      </GRPAR>"
      .parse()
      .unwrap();
    let analyzer = Analyzer::new(g);
    let forests = [
      "(S (sn (+n cats/cat/NNS)) (grup-verb (+v purr/purr/VBP)))",
      "(S (sn (+n dogs/dog/NNS)) (grup-verb (+v bark/bark/VBP)) (sn (+n loud/loud/JJ)))",
    ];

    let mut parallel = forests
      .iter()
      .map(|f| Sentence::from_parse_tree(f.parse().unwrap()))
      .collect::<Vec<_>>();
    analyzer.analyze_all(&mut parallel);

    for (f, s) in forests.iter().zip(&parallel) {
      let mut one = Sentence::from_parse_tree(f.parse().unwrap());
      analyzer.analyze(&mut one);
      assert_eq!(one.dep_trees, s.dep_trees);
    }
  }
}
