use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::dep_tree::DepTree;
use crate::semdb::{SemanticDb, senses_for, walk_with_parents};
use crate::tree::NodeIdx;
use crate::utils::{Err, split_top};

/// Set of `class#lemma` (word classes) or `class#v1#v2` (pair classes) keys
pub type ClassSet = HashSet<String>;

/// The read-only context rule evaluation draws from
#[derive(Clone, Copy)]
pub struct Resources<'a> {
  pub word_classes: &'a ClassSet,
  pub pair_classes: &'a ClassSet,
  pub semdb: Option<&'a dyn SemanticDb>,
}

/// Where a node path starts from, relative to the (parent, daughter) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTop {
  /// `p`
  Parent,
  /// `d`
  Daughter,
  /// `As`: every other child of the parent must satisfy the test
  AllSiblings,
  /// `Es`: some other child of the parent must satisfy the test
  SomeSibling,
}

impl PathTop {
  /// The quantifier flips under a negated condition
  pub fn negated(self) -> Self {
    match self {
      Self::AllSiblings => Self::SomeSibling,
      Self::SomeSibling => Self::AllSiblings,
      other => other,
    }
  }
}

/// A node reference like `p:sn:s-adj`: a starting node followed by a chain of
/// linked constituent labels to descend through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
  pub top: PathTop,
  pub steps: Vec<String>,
}

impl FromStr for NodePath {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (top, rest) = split_top(s);
    let top = match top {
      "p" => PathTop::Parent,
      "d" => PathTop::Daughter,
      "As" => PathTop::AllSiblings,
      "Es" => PathTop::SomeSibling,
      _ => return Err(format!("unknown node reference '{}'", top).into()),
    };
    let steps = if rest.is_empty() {
      Vec::new()
    } else {
      rest.split(':').map(|s| s.to_string()).collect()
    };
    Ok(Self { top, steps })
  }
}

impl fmt::Display for NodePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let top = match self.top {
      PathTop::Parent => "p",
      PathTop::Daughter => "d",
      PathTop::AllSiblings => "As",
      PathTop::SomeSibling => "Es",
    };
    write!(f, "{}", top)?;
    for step in &self.steps {
      write!(f, ":{}", step)?;
    }
    Ok(())
  }
}

impl NodePath {
  /// Every node the path reaches, in tree order. May be empty.
  pub fn resolve(&self, dt: &DepTree, parent: NodeIdx, daughter: NodeIdx) -> Vec<NodeIdx> {
    let mut out = Vec::new();
    match self.top {
      PathTop::Parent => descend(dt, parent, &self.steps, &mut out),
      PathTop::Daughter => descend(dt, daughter, &self.steps, &mut out),
      PathTop::AllSiblings | PathTop::SomeSibling => {
        for &s in dt.children(parent) {
          if s != daughter {
            descend(dt, s, &self.steps, &mut out);
          }
        }
      }
    }
    out
  }
}

fn descend(dt: &DepTree, node: NodeIdx, steps: &[String], out: &mut Vec<NodeIdx>) {
  match steps.split_first() {
    None => out.push(node),
    Some((label, rest)) => {
      for &c in dt.children(node) {
        if dt.get(c).link_label == *label {
          descend(dt, c, rest, out);
        }
      }
    }
  }
}

/// Word attribute a pair-class test compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAttr {
  Lemma,
  Pos,
  Label,
}

impl FromStr for PairAttr {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "lemma" => Ok(Self::Lemma),
      "pos" => Ok(Self::Pos),
      "label" => Ok(Self::Label),
      _ => Err(format!("attribute '{}' is not supported in pair classes", s).into()),
    }
  }
}

impl PairAttr {
  fn value<'t>(self, dt: &'t DepTree, n: NodeIdx) -> &'t str {
    match self {
      Self::Lemma => &dt.word(n).lemma,
      Self::Pos => &dt.word(n).tag,
      Self::Label => &dt.get(n).link_label,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
  Left,
  Right,
}

/// Test applied to a single resolved node
#[derive(Debug, Clone)]
pub enum NodeTest {
  Lemma(BTreeSet<String>),
  /// Unanchored search over the tag
  Pos(Regex),
  /// Linked constituent label; a value ending in `*` matches by prefix
  Label(BTreeSet<String>),
  WordClass(BTreeSet<String>),
  Tonto(BTreeSet<String>),
  SemFile(BTreeSet<String>),
  Synon(BTreeSet<String>),
  /// Like `Synon`, also trying the ancestors of every sense
  Asynon(BTreeSet<String>),
}

impl NodeTest {
  pub fn is_semantic(&self) -> bool {
    matches!(
      self,
      Self::Tonto(_) | Self::SemFile(_) | Self::Synon(_) | Self::Asynon(_)
    )
  }

  pub fn eval(&self, dt: &DepTree, n: NodeIdx, res: &Resources) -> bool {
    let word = dt.word(n);
    match self {
      Self::Lemma(values) => values.contains(&word.lemma),
      Self::Pos(re) => re.is_match(&word.tag),
      Self::Label(values) => label_matches(values, &dt.get(n).link_label),
      Self::WordClass(classes) => classes
        .iter()
        .any(|c| res.word_classes.contains(&format!("{}#{}", c, word.lemma))),
      _ => {
        let db = match res.semdb {
          Some(db) => db,
          None => {
            tracing::warn!("semantic condition evaluated without a semantic database");
            return false;
          }
        };
        let senses = senses_for(db, word);
        match self {
          Self::Tonto(values) => senses.iter().any(|s| {
            db.info_of(s)
              .is_some_and(|info| info.tonto.iter().any(|t| values.contains(t)))
          }),
          Self::SemFile(values) => senses
            .iter()
            .any(|s| db.info_of(s).is_some_and(|info| values.contains(&info.semfile))),
          Self::Synon(values) => senses.iter().any(|s| {
            db.info_of(s)
              .is_some_and(|info| info.words.iter().any(|w| values.contains(w)))
          }),
          Self::Asynon(values) => walk_with_parents(db, senses, |info| {
            info.words.iter().any(|w| values.contains(w))
          }),
          _ => false,
        }
      }
    }
  }
}

fn label_matches(values: &BTreeSet<String>, label: &str) -> bool {
  values.iter().any(|v| match v.find('*') {
    Some(star) => label.starts_with(&v[..star]),
    None => v == label,
  })
}

/// Two nodes and the attribute to take from each, checked against pair classes
#[derive(Debug, Clone)]
pub struct PairTest {
  pub first: (NodePath, PairAttr),
  pub second: (NodePath, PairAttr),
  pub classes: BTreeSet<String>,
}

impl PairTest {
  pub fn eval(&self, dt: &DepTree, n1: NodeIdx, n2: NodeIdx, res: &Resources) -> bool {
    let v1 = self.first.1.value(dt, n1);
    let v2 = self.second.1.value(dt, n2);
    let found = self
      .classes
      .iter()
      .any(|c| res.pair_classes.contains(&format!("{}#{}#{}", c, v1, v2)));
    tracing::trace!("pair [{},{}] in {:?}: {}", v1, v2, self.classes, found);
    found
  }
}

/// Boolean condition over a (parent, daughter) pair of dependency nodes
#[derive(Debug, Clone)]
pub enum Expr {
  And(Vec<Expr>),
  Not(Box<Expr>),
  /// Word order of daughter against parent. `of` is `Parent` or `Daughter`.
  Side { of: PathTop, side: Side },
  PairClass(PairTest),
  Node { path: NodePath, test: NodeTest },
}

impl Expr {
  pub fn check(&self, dt: &DepTree, parent: NodeIdx, daughter: NodeIdx, res: &Resources) -> bool {
    match self {
      Self::And(list) => list.iter().all(|e| e.check(dt, parent, daughter, res)),
      Self::Not(e) => !e.check(dt, parent, daughter, res),
      Self::Side { of, side } => {
        let (d, p) = (dt.position(daughter), dt.position(parent));
        match (of, side) {
          (PathTop::Daughter, Side::Left) | (PathTop::Parent, Side::Right) => d < p,
          (PathTop::Parent, Side::Left) | (PathTop::Daughter, Side::Right) => d > p,
          _ => false,
        }
      }
      Self::PairClass(pair) => {
        let mut nodes = pair.first.0.resolve(dt, parent, daughter);
        nodes.extend(pair.second.0.resolve(dt, parent, daughter));
        match nodes[..] {
          [n1, n2, ..] => pair.eval(dt, n1, n2, res),
          _ => false,
        }
      }
      Self::Node { path, test } => {
        let nodes = path.resolve(dt, parent, daughter);
        if nodes.is_empty() {
          return false;
        }
        if path.top == PathTop::AllSiblings {
          nodes.iter().all(|&n| test.eval(dt, n, res))
        } else {
          nodes.iter().any(|&n| test.eval(dt, n, res))
        }
      }
    }
  }

  pub fn uses_semantics(&self) -> bool {
    match self {
      Self::And(list) => list.iter().any(|e| e.uses_semantics()),
      Self::Not(e) => e.uses_semantics(),
      Self::Node { test, .. } => test.is_semantic(),
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse_tree::ParseTree;
  use crate::semdb::SenseTable;
  use maplit::{btreeset, hashset};

  fn sample() -> DepTree {
    let pt: ParseTree = "(grup-verb
        (sn (espec (+j the/the/DT)) (+n cat/cat/NN))
        (+v eats/eat/VBZ)
        (sn (+n fish/fish/NN)))"
      .parse()
      .unwrap();
    DepTree::from_parse_tree(&pt)
  }

  fn node(path: &str, test: NodeTest) -> Expr {
    Expr::Node {
      path: path.parse().unwrap(),
      test,
    }
  }

  fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
  }

  #[test]
  fn test_path_resolution() {
    let dt = sample();
    let p = dt.root();
    let cat = dt.children(p)[0];
    let fish = dt.children(p)[1];
    let path: NodePath = "p:sn".parse().unwrap();
    assert_eq!(path.resolve(&dt, p, cat), vec![cat, fish]);
    let path: NodePath = "As".parse().unwrap();
    assert_eq!(path.resolve(&dt, p, cat), vec![fish]);
    let path: NodePath = "d:espec".parse().unwrap();
    assert_eq!(path.resolve(&dt, p, cat).len(), 1);
    assert_eq!(path.to_string(), "d:espec");
    assert!("x:sn".parse::<NodePath>().is_err());
  }

  #[test]
  fn test_label_and_lemma() {
    let dt = sample();
    let (empty, none) = (ClassSet::new(), ClassSet::new());
    let res = Resources {
      word_classes: &empty,
      pair_classes: &none,
      semdb: None,
    };
    let p = dt.root();
    let cat = dt.children(p)[0];
    assert!(node("d", NodeTest::Label(set(&["sn"]))).check(&dt, p, cat, &res));
    assert!(node("d", NodeTest::Label(set(&["s*"]))).check(&dt, p, cat, &res));
    assert!(!node("d", NodeTest::Label(set(&["sp"]))).check(&dt, p, cat, &res));
    assert!(node("p", NodeTest::Lemma(set(&["eat"]))).check(&dt, p, cat, &res));
    assert!(node("p", NodeTest::Pos(Regex::new("^V").unwrap())).check(&dt, p, cat, &res));
    assert!(node("p:sn", NodeTest::Lemma(set(&["fish"]))).check(&dt, p, cat, &res));
  }

  #[test]
  fn test_sibling_quantifiers() {
    let dt = sample();
    let (empty, none) = (ClassSet::new(), ClassSet::new());
    let res = Resources {
      word_classes: &empty,
      pair_classes: &none,
      semdb: None,
    };
    let p = dt.root();
    let cat = dt.children(p)[0];
    assert!(node("As", NodeTest::Lemma(set(&["fish"]))).check(&dt, p, cat, &res));
    assert!(node("Es", NodeTest::Lemma(set(&["fish"]))).check(&dt, p, cat, &res));
    assert!(!node("Es", NodeTest::Lemma(set(&["cat"]))).check(&dt, p, cat, &res));
  }

  #[test]
  fn test_unresolved_path_is_false() {
    let dt = sample();
    let (empty, none) = (ClassSet::new(), ClassSet::new());
    let res = Resources {
      word_classes: &empty,
      pair_classes: &none,
      semdb: None,
    };
    let p = dt.root();
    let cat = dt.children(p)[0];
    let e = node("d:sp", NodeTest::Lemma(set(&["the"])));
    assert!(!e.check(&dt, p, cat, &res));
    assert!(Expr::Not(Box::new(e)).check(&dt, p, cat, &res));
  }

  #[test]
  fn test_side() {
    let dt = sample();
    let (empty, none) = (ClassSet::new(), ClassSet::new());
    let res = Resources {
      word_classes: &empty,
      pair_classes: &none,
      semdb: None,
    };
    let p = dt.root();
    let (cat, fish) = (dt.children(p)[0], dt.children(p)[1]);
    let left = Expr::Side {
      of: PathTop::Daughter,
      side: Side::Left,
    };
    let right_of_parent = Expr::Side {
      of: PathTop::Parent,
      side: Side::Right,
    };
    assert!(left.check(&dt, p, cat, &res));
    assert!(!left.check(&dt, p, fish, &res));
    assert!(right_of_parent.check(&dt, p, cat, &res));
  }

  #[test]
  fn test_classes() {
    let dt = sample();
    let words = hashset! {"animal#cat".to_string()};
    let pairs = hashset! {"eater#eat#cat".to_string()};
    let res = Resources {
      word_classes: &words,
      pair_classes: &pairs,
      semdb: None,
    };
    let p = dt.root();
    let (cat, fish) = (dt.children(p)[0], dt.children(p)[1]);
    let class = node("d", NodeTest::WordClass(btreeset! {"animal".to_string()}));
    assert!(class.check(&dt, p, cat, &res));
    assert!(!class.check(&dt, p, fish, &res));

    let pair = Expr::PairClass(PairTest {
      first: ("p".parse().unwrap(), PairAttr::Lemma),
      second: ("d".parse().unwrap(), PairAttr::Lemma),
      classes: btreeset! {"eater".to_string()},
    });
    assert!(pair.check(&dt, p, cat, &res));
    assert!(!pair.check(&dt, p, fish, &res));
  }

  #[test]
  fn test_asynon_climbs_parents() {
    let dt = sample();
    let table: SenseTable = "
      sense cat-1 parents=feline-1 words=cat,puss tonto=Animal
      sense feline-1 words=feline
      word cat N cat-1
    "
    .parse()
    .unwrap();
    let (empty, none) = (ClassSet::new(), ClassSet::new());
    let res = Resources {
      word_classes: &empty,
      pair_classes: &none,
      semdb: Some(&table),
    };
    let p = dt.root();
    let cat = dt.children(p)[0];
    assert!(node("d", NodeTest::Synon(set(&["puss"]))).check(&dt, p, cat, &res));
    assert!(!node("d", NodeTest::Synon(set(&["feline"]))).check(&dt, p, cat, &res));
    assert!(node("d", NodeTest::Asynon(set(&["feline"]))).check(&dt, p, cat, &res));
    assert!(node("d", NodeTest::Tonto(set(&["Animal"]))).check(&dt, p, cat, &res));
  }
}
