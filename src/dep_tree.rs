use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::parse_tree::ParseTree;
use crate::tree::{NodeIdx, Tree, render};
use crate::word::Word;

/// A node of a dependency tree: one word, the function label of the edge to
/// its governor, and a link to the constituent it projects in the parse tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DepNode {
  /// Dependency function, empty until labeled
  pub label: String,
  pub word: Word,
  /// Highest constituent headed by this word
  pub link: NodeIdx,
  /// Label of `link`, copied so rule evaluation needs only the dependency tree
  pub link_label: String,
  pub chunk: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepTree {
  tree: Tree<DepNode>,
  word_index: Vec<Option<NodeIdx>>,
}

impl Deref for DepTree {
  type Target = Tree<DepNode>;

  fn deref(&self) -> &Self::Target {
    &self.tree
  }
}

impl DerefMut for DepTree {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.tree
  }
}

impl From<Tree<DepNode>> for DepTree {
  fn from(tree: Tree<DepNode>) -> Self {
    let mut dt = Self {
      tree,
      word_index: Vec::new(),
    };
    dt.rebuild_node_index();
    dt
  }
}

impl DepTree {
  pub fn label(&self, idx: NodeIdx) -> &str {
    &self.get(idx).label
  }

  pub fn word(&self, idx: NodeIdx) -> &Word {
    &self.get(idx).word
  }

  pub fn position(&self, idx: NodeIdx) -> usize {
    self.word(idx).position
  }

  /// Rebuilds the position index from the current shape
  pub fn rebuild_node_index(&mut self) {
    let mut word_index: Vec<Option<NodeIdx>> = Vec::new();
    for n in self.tree.preorder(self.tree.root()) {
      let pos = self.tree.get(n).word.position;
      if pos >= word_index.len() {
        word_index.resize(pos + 1, None);
      }
      word_index[pos] = Some(n);
    }
    self.word_index = word_index;
  }

  pub fn node_by_pos(&self, pos: usize) -> Option<NodeIdx> {
    self.word_index.get(pos).copied().flatten()
  }

  /// Position of the first word in the span of `idx`
  pub fn first_word(&self, idx: NodeIdx) -> usize {
    self
      .preorder(idx)
      .map(|n| self.position(n))
      .min()
      .unwrap_or_else(|| self.position(idx))
  }

  /// Position of the last word in the span of `idx`
  pub fn last_word(&self, idx: NodeIdx) -> usize {
    self
      .preorder(idx)
      .map(|n| self.position(n))
      .max()
      .unwrap_or_else(|| self.position(idx))
  }

  /// Converts a complete constituency tree into a head-driven dependency tree.
  /// The head child of every constituent is promoted; the other children
  /// become its dependents, keeping sentence order.
  pub fn from_parse_tree(pt: &ParseTree) -> Self {
    let root = pt.root();
    let mut dt = Self::from(convert(pt, root, root));
    dt.rebuild_node_index();
    dt
  }
}

fn convert(pt: &ParseTree, node: NodeIdx, link: NodeIdx) -> Tree<DepNode> {
  let pn = pt.get(node);

  let mut result = match pt.head_child_or_first(node) {
    None => {
      let word = match &pn.word {
        Some(w) => w.clone(),
        None => {
          tracing::warn!("leaf '{}' carries no word", pn.label);
          Word::new("", "", "", 0)
        }
      };
      Tree::new(DepNode {
        label: String::new(),
        word,
        link,
        link_label: pt.label(link).to_string(),
        chunk: None,
      })
    }
    Some(head) => {
      // a head child keeps projecting the constituent that linked to us
      let link = if pn.head { link } else { node };
      let mut result = convert(pt, head, link);
      let top = result.root();

      let children = pt.children(node);
      let at = children.iter().position(|&c| c == head).unwrap_or(0);

      for &k in &children[at + 1..] {
        if pt.get(k).head {
          tracing::warn!("more than one head under '{}', only the first prevails", pn.label);
        }
        let sub = result.graft(convert(pt, k, k));
        result.hang_last(top, sub);
      }
      for &k in children[..at].iter().rev() {
        if pt.get(k).head {
          tracing::warn!("more than one head under '{}', only the first prevails", pn.label);
        }
        let sub = result.graft(convert(pt, k, k));
        result.hang_first(top, sub);
      }
      result
    }
  };

  if let Some(chunk) = pn.chunk {
    let top = result.root();
    result.get_mut(top).chunk = Some(chunk);
  }
  result
}

impl fmt::Display for DepTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let show = |n: &DepNode, _leaf: bool| format!("{}/{}/{}", n.link_label, n.label, n.word);
    write!(f, "{}", render(&self.tree, self.root(), &show))
  }
}
