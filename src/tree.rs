use std::fmt;

/// Index type for the tree arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub u32);

impl fmt::Display for NodeIdx {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq)]
struct Slot<T> {
  value: T,
  parent: Option<NodeIdx>,
  children: Vec<NodeIdx>,
}

/// An ordered rooted tree whose nodes live in an arena and are addressed by
/// stable `NodeIdx` handles. Grafting and detaching only rewrite parent/child
/// links, so handles never dangle. Nodes that are detached and never hung
/// again stay in the arena, unreachable from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<T> {
  slots: Vec<Slot<T>>,
  root: NodeIdx,
}

impl<T> Tree<T> {
  /// A one-node tree
  pub fn new(value: T) -> Self {
    Self {
      slots: vec![Slot {
        value,
        parent: None,
        children: Vec::new(),
      }],
      root: NodeIdx(0),
    }
  }

  /// Allocates a detached node
  pub fn alloc(&mut self, value: T) -> NodeIdx {
    let idx = self.slots.len() as u32;
    self.slots.push(Slot {
      value,
      parent: None,
      children: Vec::new(),
    });
    NodeIdx(idx)
  }

  pub fn root(&self) -> NodeIdx {
    self.root
  }

  /// Makes `idx` the root, detaching it from its parent first
  pub fn set_root(&mut self, idx: NodeIdx) {
    self.detach(idx);
    self.root = idx;
  }

  pub fn is_root(&self, idx: NodeIdx) -> bool {
    idx == self.root
  }

  pub fn get(&self, idx: NodeIdx) -> &T {
    &self.slots[idx.0 as usize].value
  }

  pub fn get_mut(&mut self, idx: NodeIdx) -> &mut T {
    &mut self.slots[idx.0 as usize].value
  }

  pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
    self.slots[idx.0 as usize].parent
  }

  pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
    &self.slots[idx.0 as usize].children
  }

  pub fn num_children(&self, idx: NodeIdx) -> usize {
    self.children(idx).len()
  }

  pub fn is_leaf(&self, idx: NodeIdx) -> bool {
    self.children(idx).is_empty()
  }

  /// Removes `idx` from its parent's children. The subtree below it is untouched.
  pub fn detach(&mut self, idx: NodeIdx) {
    if let Some(parent) = self.slots[idx.0 as usize].parent.take() {
      self.slots[parent.0 as usize].children.retain(|&c| c != idx);
    }
  }

  /// Hangs `child` (with its subtree) under `parent` at position `at`,
  /// removing it from wherever it was before.
  pub fn hang_at(&mut self, parent: NodeIdx, at: usize, child: NodeIdx) {
    debug_assert!(
      !self.is_ancestor(child, parent),
      "cannot hang a node under its own descendant"
    );
    self.detach(child);
    let children = &mut self.slots[parent.0 as usize].children;
    let at = at.min(children.len());
    children.insert(at, child);
    self.slots[child.0 as usize].parent = Some(parent);
  }

  /// Hangs `child` as the last child of `parent`
  pub fn hang_last(&mut self, parent: NodeIdx, child: NodeIdx) {
    let at = self.num_children(parent);
    self.hang_at(parent, at, child);
  }

  /// Hangs `child` as the first child of `parent`
  pub fn hang_first(&mut self, parent: NodeIdx, child: NodeIdx) {
    self.hang_at(parent, 0, child);
  }

  /// Puts the detached node `new` where `old` is, and detaches `old`.
  /// If `old` was the root, `new` becomes the root.
  pub fn replace(&mut self, old: NodeIdx, new: NodeIdx) {
    self.detach(new);
    match self.parent(old) {
      Some(parent) => {
        let at = self.position_in_parent(old).unwrap_or(0);
        self.slots[parent.0 as usize].children[at] = new;
        self.slots[new.0 as usize].parent = Some(parent);
        self.slots[old.0 as usize].parent = None;
      }
      None => {
        if self.root == old {
          self.root = new;
        }
      }
    }
  }

  /// Index of `idx` among its parent's children
  pub fn position_in_parent(&self, idx: NodeIdx) -> Option<usize> {
    let parent = self.parent(idx)?;
    self.children(parent).iter().position(|&c| c == idx)
  }

  /// Is `a` a (non-strict) ancestor of `d`?
  pub fn is_ancestor(&self, a: NodeIdx, d: NodeIdx) -> bool {
    let mut cur = Some(d);
    while let Some(n) = cur {
      if n == a {
        return true;
      }
      cur = self.parent(n);
    }
    false
  }

  /// All nodes below (and including) `from`, in preorder
  pub fn preorder(&self, from: NodeIdx) -> Preorder<'_, T> {
    Preorder {
      tree: self,
      stack: vec![from],
    }
  }

  /// Leaves below `from`, left to right
  pub fn leaves(&self, from: NodeIdx) -> Vec<NodeIdx> {
    self.preorder(from).filter(|&n| self.is_leaf(n)).collect()
  }

  pub fn leftmost_leaf(&self, mut idx: NodeIdx) -> NodeIdx {
    while let Some(&first) = self.children(idx).first() {
      idx = first;
    }
    idx
  }

  pub fn rightmost_leaf(&self, mut idx: NodeIdx) -> NodeIdx {
    while let Some(&last) = self.children(idx).last() {
      idx = last;
    }
    idx
  }

  /// Moves every node of `other` into this arena. Returns the new handle of
  /// `other`'s root, detached.
  pub fn graft(&mut self, other: Tree<T>) -> NodeIdx {
    let offset = self.slots.len() as u32;
    let shift = |n: NodeIdx| NodeIdx(n.0 + offset);
    let root = shift(other.root);
    for slot in other.slots {
      self.slots.push(Slot {
        value: slot.value,
        parent: slot.parent.map(shift),
        children: slot.children.into_iter().map(shift).collect(),
      });
    }
    root
  }
}

/// Preorder walk over a subtree
pub struct Preorder<'a, T> {
  tree: &'a Tree<T>,
  stack: Vec<NodeIdx>,
}

impl<T> Iterator for Preorder<'_, T> {
  type Item = NodeIdx;

  fn next(&mut self) -> Option<NodeIdx> {
    let idx = self.stack.pop()?;
    self
      .stack
      .extend(self.tree.children(idx).iter().rev().copied());
    Some(idx)
  }
}

/// Renders a subtree as `(value child child ...)`, one child per indented line
pub(crate) fn render<T>(tree: &Tree<T>, idx: NodeIdx, show: &dyn Fn(&T, bool) -> String) -> String {
  let children = tree.children(idx);
  let mut out = format!("({}", show(tree.get(idx), children.is_empty()));
  if children.len() == 1 && tree.is_leaf(children[0]) {
    out.push(' ');
    out.push_str(&render(tree, children[0], show));
  } else {
    for &child in children {
      for line in render(tree, child, show).lines() {
        out.push_str("\n  ");
        out.push_str(line);
      }
    }
  }
  out.push(')');
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> (Tree<&'static str>, [NodeIdx; 5]) {
    // (a (b d e) c)
    let mut t = Tree::new("a");
    let a = t.root();
    let b = t.alloc("b");
    let c = t.alloc("c");
    let d = t.alloc("d");
    let e = t.alloc("e");
    t.hang_last(a, b);
    t.hang_last(a, c);
    t.hang_last(b, d);
    t.hang_last(b, e);
    (t, [a, b, c, d, e])
  }

  #[test]
  fn test_preorder_and_leaves() {
    let (t, [a, b, c, d, e]) = sample();
    assert_eq!(t.preorder(a).collect::<Vec<_>>(), vec![a, b, d, e, c]);
    assert_eq!(t.leaves(a), vec![d, e, c]);
    assert_eq!(t.leftmost_leaf(a), d);
    assert_eq!(t.rightmost_leaf(a), c);
    assert_eq!(t.rightmost_leaf(b), e);
  }

  #[test]
  fn test_hang_moves_subtree() {
    let (mut t, [a, b, c, d, _e]) = sample();
    t.hang_first(c, d);
    assert_eq!(t.children(b).len(), 1);
    assert_eq!(t.parent(d), Some(c));
    assert_eq!(t.preorder(a).map(|n| *t.get(n)).collect::<String>(), "abecd");
  }

  #[test]
  fn test_replace_keeps_position() {
    let (mut t, [a, b, _c, _d, _e]) = sample();
    let x = t.alloc("x");
    t.replace(b, x);
    assert_eq!(t.children(a)[0], x);
    assert_eq!(t.parent(b), None);
    assert_eq!(t.parent(x), Some(a));
    assert!(!t.is_ancestor(a, b));
  }

  #[test]
  fn test_graft_other_arena() {
    let (mut t, [_a, _b, c, ..]) = sample();
    let mut other = Tree::new("y");
    let z = other.alloc("z");
    let oroot = other.root();
    other.hang_last(oroot, z);
    let y = t.graft(other);
    t.hang_last(c, y);
    assert_eq!(
      t.preorder(t.root()).map(|n| *t.get(n)).collect::<String>(),
      "abdecyz"
    );
  }

  #[test]
  fn test_set_root_detaches() {
    let (mut t, [a, b, ..]) = sample();
    t.set_root(b);
    assert!(t.is_root(b));
    assert_eq!(t.children(a).len(), 1);
    assert_eq!(t.preorder(t.root()).count(), 3);
  }
}
