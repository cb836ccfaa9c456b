use std::collections::{BTreeSet, HashMap};

use crate::expression::Resources;
use crate::grammar::Grammar;
use crate::parse_tree::{ParseNode, ParseTree};
use crate::rules::{CompleterRule, Operation, Relabel};
use crate::tree::NodeIdx;

/// Flag every session starts with
pub const INIT_FLAG: &str = "INIT";

/// Mutable state of one tree completion: active flags, plus graft points
/// found while checking rules in the current round.
#[derive(Debug, Clone)]
pub struct Session {
  pub active_flags: BTreeSet<String>,
  last: HashMap<(usize, usize), NodeIdx>,
}

impl Default for Session {
  fn default() -> Self {
    Self::new()
  }
}

impl Session {
  pub fn new() -> Self {
    Self {
      active_flags: [INIT_FLAG.to_string()].into_iter().collect(),
      last: HashMap::new(),
    }
  }

  pub(crate) fn remember(&mut self, rule: usize, pos: usize, node: NodeIdx) {
    self.last.insert((rule, pos), node);
  }

  pub(crate) fn forget(&mut self, rule: usize, pos: usize) {
    self.last.remove(&(rule, pos));
  }

  pub(crate) fn recall(&self, rule: usize, pos: usize) -> Option<NodeIdx> {
    self.last.get(&(rule, pos)).copied()
  }

  /// Graft points are only valid for the round that found them
  pub fn clear_matches(&mut self) {
    self.last.clear();
  }
}

fn relabel(pt: &mut ParseTree, left: NodeIdx, right: NodeIdx, relabel: &Relabel) {
  if let Some(label) = &relabel.left {
    pt.get_mut(left).label = label.clone();
  }
  if let Some(label) = &relabel.right {
    pt.get_mut(right).label = label.clone();
  }
}

/// Joins the chunks `left` and `right` (at `pos` and `pos + 1`) as `rule`
/// says, returning the root of the joined chunk.
fn apply_rule(
  pt: &mut ParseTree,
  rule: &CompleterRule,
  pos: usize,
  left: NodeIdx,
  right: NodeIdx,
  session: &mut Session,
) -> NodeIdx {
  session.active_flags.extend(rule.flags_on.iter().cloned());
  for flag in &rule.flags_off {
    session.active_flags.remove(flag);
  }

  let graft_point = || {
    let found = session.recall(rule.id, pos);
    if found.is_none() {
      tracing::warn!("[{}] lost its graft point, joining at the top", rule.origin);
    }
    found.unwrap_or(left)
  };

  tracing::debug!(
    "applying {} to {} and {}",
    rule,
    pt.label(left),
    pt.label(right)
  );
  match &rule.operation {
    Operation::TopLeft(labels) => {
      pt.get_mut(right).head = false;
      pt.get_mut(left).head = true;
      relabel(pt, left, right, labels);
      pt.hang_last(left, right);
      left
    }
    Operation::TopRight(labels) => {
      pt.get_mut(left).head = false;
      pt.get_mut(right).head = true;
      relabel(pt, left, right, labels);
      pt.hang_first(right, left);
      right
    }
    Operation::LastLeft(_) => {
      let at = graft_point();
      pt.get_mut(right).head = false;
      pt.hang_last(at, right);
      left
    }
    Operation::CoverLastLeft(_) => {
      let covered = graft_point();
      pt.get_mut(right).head = pt.get(covered).head;
      pt.get_mut(covered).head = false;
      if covered == left {
        pt.hang_first(right, left);
        return right;
      }
      pt.replace(covered, right);
      pt.hang_first(right, covered);
      left
    }
  }
}

/// Completes a chunker forest into a single tree. The chunks under the
/// start-label root are joined pairwise, best rule first, until one remains.
/// Trees with another root label are returned as they are.
pub fn complete(
  grammar: &Grammar,
  mut pt: ParseTree,
  session: &mut Session,
  res: &Resources,
) -> ParseTree {
  let root = pt.root();
  if pt.label(root) != grammar.start || pt.is_leaf(root) {
    return pt;
  }

  let mut chunks = Vec::with_capacity(pt.num_children(root));
  for (ord, chunk) in pt.children(root).to_vec().into_iter().enumerate() {
    pt.detach(chunk);
    let chunk = if pt.is_leaf(chunk) {
      // a bare word gets a constituent of its own to graft onto
      let node = pt.get(chunk);
      let wrapper = ParseNode {
        id: node.id.as_ref().map(|id| format!("{}x", id)),
        ..ParseNode::new(&node.label)
      };
      let wrapper = pt.alloc(wrapper);
      pt.get_mut(chunk).head = true;
      pt.hang_last(wrapper, chunk);
      wrapper
    } else {
      chunk
    };
    pt.get_mut(chunk).chunk = Some(ord + 1);
    chunks.push(chunk);
  }

  while chunks.len() > 1 {
    tracing::trace!(
      "remaining chunks: {}",
      chunks
        .iter()
        .map(|&c| pt.label(c))
        .collect::<Vec<_>>()
        .join(" ")
    );

    let mut best_pos = 0;
    let mut best = grammar.find_best_rule(&pt, &chunks, 0, session, res);
    for pos in 1..chunks.len() - 1 {
      let rule = grammar.find_best_rule(&pt, &chunks, pos, session, res);
      if rule.priority.beats(best.priority) {
        best = rule;
        best_pos = pos;
      }
    }
    tracing::debug!("best rule {} at chunk {}", best, best_pos);

    let joined = apply_rule(
      &mut pt,
      best,
      best_pos,
      chunks[best_pos],
      chunks[best_pos + 1],
      session,
    );
    chunks[best_pos] = joined;
    chunks.remove(best_pos + 1);
    session.clear_matches();
  }

  pt.set_root(chunks[0]);
  pt.rebuild_node_index();
  pt
}
