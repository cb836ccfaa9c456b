use crate::dep_tree::DepTree;
use crate::expression::Resources;
use crate::grammar::Grammar;
use crate::tree::NodeIdx;

/// Label of the dependency root
pub const TOP_LABEL: &str = "top";
/// Given when the grammar has no rules for the ancestor's constituent
pub const NO_RULE: &str = "modnorule";
/// Given when rules exist for the ancestor but none holds
pub const NO_MATCH: &str = "modnomatch";

/// Labels every edge of `dt` top-down. Each dependent gets the label of the
/// first rule for its ancestor's constituent that holds, skipping unique
/// labels some sibling already carries.
pub fn label(grammar: &Grammar, dt: &mut DepTree, res: &Resources) {
  let root = dt.root();
  dt.get_mut(root).label = TOP_LABEL.to_string();
  label_below(grammar, dt, root, res);
}

fn label_below(grammar: &Grammar, dt: &mut DepTree, ancestor: NodeIdx, res: &Resources) {
  for d in dt.children(ancestor).to_vec() {
    let label = choose_label(grammar, dt, ancestor, d, res);
    dt.get_mut(d).label = label.to_string();
    label_below(grammar, dt, d, res);
  }
}

fn choose_label<'g>(
  grammar: &'g Grammar,
  dt: &DepTree,
  ancestor: NodeIdx,
  d: NodeIdx,
  res: &Resources,
) -> &'g str {
  let key = &dt.get(ancestor).link_label;
  let rules = match grammar.labeler_rules(key) {
    Some(rules) => rules,
    None => {
      tracing::debug!("no labeling rules under {}", key);
      return NO_RULE;
    }
  };

  for rule in rules {
    let taken = grammar.is_unique(&rule.label)
      && dt
        .children(ancestor)
        .iter()
        .any(|&s| dt.label(s) == rule.label);
    if taken {
      tracing::trace!("[{}] skipped, unique label {} already present", rule.origin, rule.label);
      continue;
    }
    if rule.expr.check(dt, ancestor, d, res) {
      tracing::debug!(
        "[{}] {} --{}--> {}",
        rule.origin,
        dt.word(ancestor).form,
        rule.label,
        dt.word(d).form
      );
      return &rule.label;
    }
  }
  NO_MATCH
}
