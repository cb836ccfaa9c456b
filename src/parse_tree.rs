use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use crate::parse_grammar::{needed_char, needed_re, optional_char, optional_re, skip_whitespace};
use crate::tree::{NodeIdx, Tree, render};
use crate::utils::{Err, TreeError};
use crate::word::Word;

/// A node of a constituency tree. Internal nodes carry only a label, leaves
/// also carry their token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
  pub label: String,
  pub word: Option<Word>,
  /// Whether this node is the head of its sibling group
  pub head: bool,
  /// 1-based ordinal of the chunk this node is the root of, if any
  pub chunk: Option<usize>,
  pub id: Option<String>,
}

impl ParseNode {
  pub fn new(label: &str) -> Self {
    Self {
      label: label.to_string(),
      word: None,
      head: false,
      chunk: None,
      id: None,
    }
  }

  pub fn leaf(label: &str, word: Word) -> Self {
    Self {
      word: Some(word),
      ..Self::new(label)
    }
  }

  pub fn with_head(mut self, head: bool) -> Self {
    self.head = head;
    self
  }
}

/// A constituency tree plus its two derived indices: node-by-id and
/// node-by-word-position. The indices are only valid after
/// `rebuild_node_index` (or `build_node_index`) has run on the current shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
  tree: Tree<ParseNode>,
  node_index: HashMap<String, NodeIdx>,
  word_index: Vec<Option<NodeIdx>>,
}

impl Deref for ParseTree {
  type Target = Tree<ParseNode>;

  fn deref(&self) -> &Self::Target {
    &self.tree
  }
}

impl DerefMut for ParseTree {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.tree
  }
}

impl From<Tree<ParseNode>> for ParseTree {
  fn from(tree: Tree<ParseNode>) -> Self {
    let mut pt = Self {
      tree,
      node_index: HashMap::new(),
      word_index: Vec::new(),
    };
    pt.rebuild_node_index();
    pt
  }
}

impl ParseTree {
  pub fn new(root: ParseNode) -> Self {
    Self::from(Tree::new(root))
  }

  pub fn label(&self, idx: NodeIdx) -> &str {
    &self.get(idx).label
  }

  pub fn word(&self, idx: NodeIdx) -> Option<&Word> {
    self.get(idx).word.as_ref()
  }

  /// The words of the tree, in leaf order
  pub fn words(&self) -> impl Iterator<Item = &Word> + '_ {
    self
      .leaves(self.root())
      .into_iter()
      .filter_map(move |n| self.word(n))
  }

  /// The child of `idx` marked as head
  pub fn head_child(&self, idx: NodeIdx) -> Result<NodeIdx, TreeError> {
    self
      .children(idx)
      .iter()
      .copied()
      .find(|&c| self.get(c).head)
      .ok_or_else(|| TreeError::NoHead(self.label(idx).to_string()))
  }

  /// Like `head_child`, but a missing head is reported and the first child is
  /// used instead. Returns None only for leaves.
  pub fn head_child_or_first(&self, idx: NodeIdx) -> Option<NodeIdx> {
    let first = *self.children(idx).first()?;
    match self.head_child(idx) {
      Ok(head) => Some(head),
      Err(e) => {
        tracing::warn!("{}. Check the chunking grammar and the completion rules.", e);
        Some(first)
      }
    }
  }

  /// Follows head children down to the head leaf of the subtree
  pub fn head_leaf(&self, mut idx: NodeIdx) -> NodeIdx {
    while let Some(head) = self.head_child_or_first(idx) {
      idx = head;
    }
    idx
  }

  pub fn head_word(&self, idx: NodeIdx) -> Option<&Word> {
    self.word(self.head_leaf(idx))
  }

  pub fn head_label(&self, idx: NodeIdx) -> &str {
    self.label(self.head_leaf(idx))
  }

  /// Position of the head word, or None when the head chain breaks (as under
  /// the chunker's fake root)
  pub fn head_position(&self, mut idx: NodeIdx) -> Option<usize> {
    while !self.is_leaf(idx) {
      idx = self.head_child(idx).ok()?;
    }
    self.word(idx).map(|w| w.position)
  }

  fn leaf_position(&self, leaf: NodeIdx) -> usize {
    self.word(leaf).map(|w| w.position).unwrap_or(0)
  }

  /// Token span `(first, last)` subsumed by `idx`
  pub fn span(&self, idx: NodeIdx) -> (usize, usize) {
    (
      self.leaf_position(self.leftmost_leaf(idx)),
      self.leaf_position(self.rightmost_leaf(idx)),
    )
  }

  /// `a` c-commands `b`: neither dominates the other and the first branching
  /// node above `a` dominates `b`.
  pub fn c_commands(&self, a: NodeIdx, b: NodeIdx) -> bool {
    if self.is_root(a) || self.is_root(b) {
      return false;
    }

    let mut parent = match self.parent(a) {
      Some(p) => p,
      None => return false,
    };
    while !self.is_root(parent) && self.num_children(parent) == 1 && parent != b {
      match self.parent(parent) {
        Some(p) => parent = p,
        None => break,
      }
    }

    if self.is_root(parent) && self.num_children(parent) == 1 {
      return false;
    }
    if parent == b {
      return false;
    }
    self.is_ancestor(parent, b)
  }

  /// Assigns fresh `sid.N` ids in preorder and rebuilds both indices
  pub fn build_node_index(&mut self, sentence_id: &str) {
    let nodes = self.preorder(self.root()).collect::<Vec<_>>();
    for (i, n) in nodes.into_iter().enumerate() {
      self.get_mut(n).id = Some(format!("{}.{}", sentence_id, i));
    }
    self.rebuild_node_index();
  }

  /// Rebuilds both indices from the current shape, keeping existing ids
  pub fn rebuild_node_index(&mut self) {
    let mut node_index = HashMap::new();
    let mut word_index: Vec<Option<NodeIdx>> = Vec::new();
    for n in self.tree.preorder(self.tree.root()) {
      let node = self.tree.get(n);
      if let Some(id) = &node.id {
        node_index.insert(id.clone(), n);
      }
      if let Some(w) = &node.word {
        if w.position >= word_index.len() {
          word_index.resize(w.position + 1, None);
        }
        word_index[w.position] = Some(n);
      }
    }
    self.node_index = node_index;
    self.word_index = word_index;
  }

  pub fn node_by_id(&self, id: &str) -> Option<NodeIdx> {
    self.node_index.get(id).copied()
  }

  pub fn node_by_pos(&self, pos: usize) -> Option<NodeIdx> {
    self.word_index.get(pos).copied().flatten()
  }

  /// Lowest node subsuming the whole span i..=j, found by climbing from the
  /// leaf at i while the span still starts at i and ends before j.
  pub fn subsuming_node(&self, i: usize, j: usize) -> Option<NodeIdx> {
    let mut node = self.node_by_pos(i)?;
    while !self.is_root(node) {
      let (first, last) = self.span(node);
      if !(last < j && first == i) {
        break;
      }
      node = self.parent(node)?;
    }
    Some(node)
  }

  /// Highest node subsuming the longest span i..=k with k <= j
  pub fn left_subsuming_node(&self, i: usize, j: usize) -> Option<NodeIdx> {
    let mut prev = self.root();
    let mut node = self.node_by_pos(i)?;
    while !self.is_root(node) {
      let (first, last) = self.span(node);
      if !(last < j && first == i) {
        break;
      }
      prev = node;
      node = self.parent(node)?;
    }
    Some(self.within_or(node, prev, i, j))
  }

  /// Highest node subsuming the longest span k..=j with i <= k
  pub fn right_subsuming_node(&self, i: usize, j: usize) -> Option<NodeIdx> {
    let mut prev = self.root();
    let mut node = self.node_by_pos(j)?;
    while !self.is_root(node) {
      let (first, last) = self.span(node);
      if !(last == j && first > i) {
        break;
      }
      prev = node;
      node = self.parent(node)?;
    }
    Some(self.within_or(node, prev, i, j))
  }

  // if the climb overshot the bounds, fall back to the last node inside them
  fn within_or(&self, node: NodeIdx, prev: NodeIdx, i: usize, j: usize) -> NodeIdx {
    let (first, last) = self.span(node);
    if last > j || first < i { prev } else { node }
  }
}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let show = |n: &ParseNode, _leaf: bool| {
      let head = if n.head { "+" } else { "" };
      match &n.word {
        Some(w) => format!("{}{} {}", head, n.label, w),
        None => format!("{}{}", head, n.label),
      }
    };
    write!(f, "{}", render(&self.tree, self.root(), &show))
  }
}

type ParseResult<'a, T> = Result<(T, &'a str), Err>;

fn read_node<'a>(
  tree: &mut Option<Tree<ParseNode>>,
  position: &mut usize,
  s: &'a str,
) -> ParseResult<'a, NodeIdx> {
  regex_static!(LABEL, r"[^\s()/+][^\s()/]*");
  regex_static!(WORD, r"[^\s()/]+/[^\s()/]+/[^\s()/]+");

  let (_, s) = needed_char('(', s)?;
  let s = skip_whitespace(s);
  let (plus, s) = optional_char('+', s);
  let (label, s) = needed_re(&*LABEL, s).map_err(|e| format!("node label: {}", e))?;
  let node = ParseNode::new(label).with_head(plus.is_some());
  let idx = match tree {
    Some(t) => t.alloc(node),
    None => {
      let t = Tree::new(node);
      let root = t.root();
      *tree = Some(t);
      root
    }
  };

  let mut rem = skip_whitespace(s);
  if let (Some(token), s) = optional_re(&*WORD, rem) {
    let mut parts = token.split('/');
    let (form, lemma, tag) = match (parts.next(), parts.next(), parts.next()) {
      (Some(form), Some(lemma), Some(tag)) => (form, lemma, tag),
      _ => return Err(format!("malformed word {}", token).into()),
    };
    if let Some(t) = tree {
      t.get_mut(idx).word = Some(Word::new(form, lemma, tag, *position));
    }
    *position += 1;
    let (_, s) = needed_char(')', skip_whitespace(s))?;
    return Ok((idx, s));
  }

  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(')', rem) {
      let childless = tree.as_ref().is_some_and(|t| t.is_leaf(idx));
      if childless {
        return Err(format!("node '{}' has neither word nor children", label).into());
      }
      return Ok((idx, s));
    }
    let (child, s) = read_node(tree, position, rem)?;
    if let Some(t) = tree {
      t.hang_last(idx, child);
    }
    rem = s;
  }
}

impl FromStr for ParseTree {
  type Err = Err;

  /// Reads a bracketed tree: `(label child ...)` for internal nodes,
  /// `(label form/lemma/tag)` for leaves, `+` before a label marks a head.
  /// Word positions are assigned left to right from 0.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut tree = None;
    let mut position = 0;
    let (_, rest) = read_node(&mut tree, &mut position, skip_whitespace(s))?;
    if !skip_whitespace(rest).is_empty() {
      return Err(format!("trailing input after tree: {}", rest).into());
    }
    tree
      .map(ParseTree::from)
      .ok_or_else(|| "empty tree".into())
  }
}
