use multimap::MultiMap;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::completer::Session;
use crate::expression::{ClassSet, Resources};
use crate::parse_tree::ParseTree;
use crate::rules::{
  ChunkAttr, ChunkRef, ChunkSide, CompleterRule, ContextSlot, LabelerRule,
  MatchingAttrib, MatchingCondition, Operation,
};
use crate::semdb::{SenseTable, senses_for, walk_with_parents};
use crate::tree::NodeIdx;

/// Label of the chunker's fake root when none is configured
pub const DEFAULT_START: &str = "S";

/// Completion and labeling rules plus the class sets they refer to. Read-only
/// once loaded; all per-sentence state lives in a `Session`.
#[derive(Debug, Default)]
pub struct Grammar {
  /// Root label of chunker output that still needs completing
  pub start: String,
  pub(crate) completer: MultiMap<(String, String), CompleterRule>,
  pub(crate) labeler: HashMap<String, Vec<LabelerRule>>,
  pub(crate) unique: HashSet<String>,
  pub word_classes: ClassSet,
  pub pair_classes: ClassSet,
  /// Sense table named by the `<SEMDB>` section, if any
  pub sense_table: Option<SenseTable>,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "% start: {}", self.start)?;
    writeln!(
      f,
      "% classes: {} words, {} pairs",
      self.word_classes.len(),
      self.pair_classes.len()
    )?;
    write!(f, "% unique:")?;
    for label in self.unique.iter() {
      write!(f, " {}", label)?;
    }
    writeln!(f)?;

    for (_, rules) in self.completer.iter_all() {
      for rule in rules {
        writeln!(f, "{}", rule)?;
      }
    }
    for rule in self.labeler.values().flatten() {
      writeln!(f, "[{}] {} {}", rule.origin, rule.ancestor, rule.label)?;
    }

    Ok(())
  }
}

impl Grammar {
  pub fn new() -> Self {
    Self {
      start: DEFAULT_START.to_string(),
      ..Default::default()
    }
  }

  /// Replaces the chunker root label
  pub fn with_start(mut self, start: &str) -> Self {
    self.start = start.to_string();
    self
  }

  pub fn num_completer_rules(&self) -> usize {
    self.completer.iter_all().map(|(_, v)| v.len()).sum()
  }

  pub fn num_labeler_rules(&self) -> usize {
    self.labeler.values().map(|v| v.len()).sum()
  }

  pub fn is_unique(&self, label: &str) -> bool {
    self.unique.contains(label)
  }

  /// Labeler rules for dependents of an ancestor linked to `ancestor`
  pub fn labeler_rules(&self, ancestor: &str) -> Option<&[LabelerRule]> {
    self.labeler.get(ancestor).map(|v| v.as_slice())
  }

  pub(crate) fn add_completer_rule(&mut self, rule: CompleterRule) {
    let key = (rule.left.label.clone(), rule.right.label.clone());
    self.completer.insert(key, rule);
  }

  pub(crate) fn add_labeler_rule(&mut self, rule: LabelerRule) {
    self
      .labeler
      .entry(rule.ancestor.clone())
      .or_insert_with(Vec::new)
      .push(rule);
  }

  /// Does `chunk` satisfy `cond`? Attributes are checked on the chunk's head word.
  pub fn match_condition(&self, pt: &ParseTree, chunk: NodeIdx, cond: &MatchingCondition) -> bool {
    let ok = if pt.label(chunk) != cond.label {
      false
    } else if cond.attrs.is_empty() {
      true
    } else {
      match pt.word(pt.head_leaf(chunk)) {
        None => false,
        Some(w) => cond.attrs.iter().all(|attr| match attr {
          MatchingAttrib::Lemma(lemma) => w.lemma == *lemma,
          MatchingAttrib::Form(form) => w.form == *form,
          MatchingAttrib::Pos(re) => re.is_match(&w.tag),
          MatchingAttrib::Class(class) => self
            .word_classes
            .contains(&format!("{}#{}", class, w.lemma)),
        }),
      }
    };
    let ok = ok != cond.negated;
    tracing::trace!("condition {} on {}: {}", cond, pt.label(chunk), ok);
    ok
  }

  fn slot_matches(&self, pt: &ParseTree, chunk: NodeIdx, slot: &ContextSlot) -> bool {
    match slot {
      ContextSlot::Out => false,
      ContextSlot::Any | ContextSlot::Star => true,
      ContextSlot::Cond(cond) => self.match_condition(pt, chunk, cond),
    }
  }

  /// Matches context slots, nearest first, against `seq`, the chunks walking
  /// outwards from the candidate pair.
  pub fn match_side<'s>(
    &self,
    pt: &ParseTree,
    seq: &[NodeIdx],
    slots: impl IntoIterator<Item = &'s ContextSlot>,
  ) -> bool {
    let slots = slots.into_iter().collect::<Vec<_>>();
    let mut k = 0;
    let mut j = 0;
    while j < slots.len() {
      match slots[j] {
        ContextSlot::Out => {
          if k < seq.len() {
            return false;
          }
        }
        ContextSlot::Star => match slots.get(j + 1) {
          None | Some(ContextSlot::Out) => return true,
          Some(next) => {
            // no backtracking: the first chunk matching the next slot anchors it
            while k < seq.len() && !self.slot_matches(pt, seq[k], next) {
              k += 1;
            }
            if k == seq.len() {
              return false;
            }
            k += 1;
            j += 1;
          }
        },
        slot => {
          if k >= seq.len() || !self.slot_matches(pt, seq[k], slot) {
            return false;
          }
          k += 1;
        }
      }
      j += 1;
    }
    true
  }

  /// Both context windows of `rule` around the pair at `pos`, negated if the rule says so
  pub fn matching_context(
    &self,
    pt: &ParseTree,
    chunks: &[NodeIdx],
    pos: usize,
    rule: &CompleterRule,
  ) -> bool {
    let left = chunks[..pos].iter().rev().copied().collect::<Vec<_>>();
    let right = chunks.get(pos + 2..).unwrap_or(&[]);
    let ctx = &rule.context;
    let matched =
      self.match_side(pt, &left, ctx.left.iter().rev()) && self.match_side(pt, right, &ctx.right);
    let matched = matched != ctx.negated;
    tracing::trace!("context of [{}] at {}: {}", rule.origin, pos, matched);
    matched
  }

  fn locate(&self, pt: &ParseTree, chunks: &[NodeIdx], pos: usize, r: &ChunkRef) -> Vec<NodeIdx> {
    let start = match r.side {
      ChunkSide::Left => chunks[pos],
      ChunkSide::Right => chunks[pos + 1],
    };
    let mut found = vec![start];
    for step in &r.steps {
      found = found
        .into_iter()
        .flat_map(|n| pt.children(n).iter().copied())
        .filter(|&c| pt.label(c) == step.as_str())
        .collect();
    }
    found
  }

  fn extract_attr(&self, pt: &ParseTree, nodes: &[NodeIdx], attr: ChunkAttr, res: &Resources) -> Vec<String> {
    let mut values = Vec::new();
    for &n in nodes {
      let w = match pt.head_word(n) {
        Some(w) => w,
        None => continue,
      };
      match attr {
        ChunkAttr::Lemma => values.push(w.lemma.clone()),
        ChunkAttr::Pos => values.push(w.tag.clone()),
        _ => {
          let db = match res.semdb {
            Some(db) => db,
            None => {
              tracing::warn!("semantic pair condition evaluated without a semantic database");
              continue;
            }
          };
          let senses = senses_for(db, w);
          match attr {
            ChunkAttr::Asynon => {
              walk_with_parents(db, senses, |info| {
                values.extend(info.words.iter().cloned());
                false
              });
            }
            _ => {
              for info in senses.iter().filter_map(|s| db.info_of(s)) {
                match attr {
                  ChunkAttr::SemFile => values.push(info.semfile),
                  ChunkAttr::Tonto => values.extend(info.tonto),
                  _ => values.extend(info.words),
                }
              }
            }
          }
        }
      }
    }
    values
  }

  /// The pair-class condition of `rule`, if any, for the pair at `pos`
  pub fn matching_pair(
    &self,
    pt: &ParseTree,
    chunks: &[NodeIdx],
    pos: usize,
    rule: &CompleterRule,
    res: &Resources,
  ) -> bool {
    let pair = match &rule.pair {
      None => return true,
      Some(pair) => pair,
    };
    let n1 = self.locate(pt, chunks, pos, &pair.first);
    let n2 = self.locate(pt, chunks, pos, &pair.second);
    let v1 = self.extract_attr(pt, &n1, pair.first.attr, res);
    let v2 = self.extract_attr(pt, &n2, pair.second.attr, res);
    let matched = v1.iter().any(|a| {
      v2.iter()
        .any(|b| self.pair_classes.contains(&format!("{}#{}#{}", pair.class, a, b)))
    });
    tracing::trace!(
      "pair {} [{}]x[{}]: {}",
      pair.class,
      v1.join("/"),
      v2.join("/"),
      matched
    );
    matched
  }

  /// Whether the operation of `rule` can be carried out on the pair at `pos`.
  /// For operations grafting inside the left chunk, the graft point (the
  /// last node in preorder matching the rule's condition) is remembered in
  /// `session` for the rest of this round. `last_left` never grafts under a
  /// word leaf.
  pub fn matching_operation(
    &self,
    pt: &ParseTree,
    chunks: &[NodeIdx],
    pos: usize,
    rule: &CompleterRule,
    session: &mut Session,
  ) -> bool {
    let cond = match rule.operation.matching() {
      None => return true,
      Some(cond) => cond,
    };
    let (left, right) = (chunks[pos], chunks[pos + 1]);
    let under = matches!(rule.operation, Operation::LastLeft(_));

    let last = pt
      .preorder(left)
      .filter(|&n| !(under && pt.is_leaf(n)) && self.match_condition(pt, n, cond))
      .last();
    let last = match last {
      Some(n) => n,
      None => {
        session.forget(rule.id, pos);
        tracing::trace!("no {} node for [{}]", cond, rule.origin);
        return false;
      }
    };

    let position = |n: NodeIdx| pt.word(n).map(|w| w.position).unwrap_or(0);
    let head_end = position(pt.rightmost_leaf(last));
    let chunk_end = position(pt.rightmost_leaf(left));
    let child_begin = position(pt.leftmost_leaf(right));
    if chunk_end > head_end && chunk_end < child_begin {
      session.forget(rule.id, pos);
      tracing::trace!("[{}] would break projectivity", rule.origin);
      return false;
    }

    session.remember(rule.id, pos, last);
    true
  }

  /// Best rule for joining the chunks at `pos` and `pos + 1`. Falls back to
  /// the default rule when no rule survives every check.
  pub fn find_best_rule<'g>(
    &'g self,
    pt: &ParseTree,
    chunks: &[NodeIdx],
    pos: usize,
    session: &mut Session,
    res: &Resources,
  ) -> &'g CompleterRule {
    let key = (
      pt.label(chunks[pos]).to_string(),
      pt.label(chunks[pos + 1]).to_string(),
    );
    tracing::debug!("looking up rules for ({},{})", key.0, key.1);

    let mut best: Option<&CompleterRule> = None;
    for rule in self.completer.get_vec(&key).into_iter().flatten() {
      let ok = rule.enabling.enabled(&session.active_flags)
        && self.match_condition(pt, chunks[pos], &rule.left)
        && self.match_condition(pt, chunks[pos + 1], &rule.right)
        && self.matching_pair(pt, chunks, pos, rule, res)
        && self.matching_context(pt, chunks, pos, rule)
        && self.matching_operation(pt, chunks, pos, rule, session);
      tracing::trace!("candidate {}: {}", rule, if ok { "match" } else { "no match" });
      if ok && best.is_none_or(|b| rule.priority.beats(b.priority)) {
        best = Some(rule);
      }
    }

    best.unwrap_or_else(|| {
      tracing::debug!("no rule matches, using the default rule");
      CompleterRule::fallback()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::Priority;

  fn forest(labels: &[&str]) -> ParseTree {
    let chunks = labels
      .iter()
      .enumerate()
      .map(|(i, l)| format!("({} (+w w{}/w{}/W))", l, i, i))
      .collect::<Vec<_>>()
      .join(" ");
    format!("(S {})", chunks).parse().unwrap()
  }

  fn chunks(pt: &ParseTree) -> Vec<NodeIdx> {
    pt.children(pt.root()).to_vec()
  }

  fn only_rule<'g>(g: &'g Grammar, left: &str, right: &str) -> &'g CompleterRule {
    let key = (left.to_string(), right.to_string());
    &g.completer.get_vec(&key).unwrap()[0]
  }

  fn context_matches(context: &str, labels: &[&str], pos: usize) -> bool {
    let g: Grammar = format!("<GRPAR>\n1 - {} (p,q) - top_left RELABEL -\n</GRPAR>", context)
      .parse()
      .unwrap();
    let pt = forest(labels);
    g.matching_context(&pt, &chunks(&pt), pos, only_rule(&g, "p", "q"))
  }

  #[test]
  fn test_wildcard_context() {
    assert!(context_matches("y_*_x_$$", &["y", "a", "b", "x", "p", "q"], 4));
    assert!(context_matches("y_*_x_$$", &["y", "x", "p", "q"], 2));
    assert!(!context_matches("y_*_x_$$", &["a", "b", "x", "p", "q"], 3));
    assert!(!context_matches("y_*_x_$$", &["y", "a", "p", "q"], 2));
    // OUT after the wildcard holds up to the sentence start
    assert!(context_matches("OUT_*_x_$$", &["a", "b", "x", "p", "q"], 3));
  }

  #[test]
  fn test_context_slots() {
    assert!(context_matches("-", &["p", "q"], 0));
    assert!(context_matches("OUT_$$", &["p", "q", "z"], 0));
    assert!(!context_matches("OUT_$$", &["a", "p", "q"], 1));
    assert!(context_matches("$$_?_z", &["p", "q", "a", "z"], 0));
    assert!(!context_matches("$$_?_z", &["p", "q", "z"], 0));
    assert!(context_matches("$$_OUT", &["a", "p", "q"], 1));
    assert!(context_matches("!$$_OUT", &["p", "q", "a"], 0));
  }

  #[test]
  fn test_condition_attributes() {
    let mut g = Grammar::new();
    g.word_classes.insert("animal#cat".to_string());
    let pt: ParseTree = "(S (sn (espec (+j the/the/DT)) (+n Cat/cat/NN)))".parse().unwrap();
    let sn = chunks(&pt)[0];
    let cond = |s: &str| crate::parse_grammar::parse_matching_condition(s).unwrap();
    assert!(g.match_condition(&pt, sn, &cond("sn<cat>(Cat){^NN$}[animal]")));
    assert!(!g.match_condition(&pt, sn, &cond("sn<dog>")));
    assert!(!g.match_condition(&pt, sn, &cond("sp")));
    assert!(g.match_condition(&pt, sn, &cond("~sn<dog>")));
  }

  #[test]
  fn test_pair_condition() {
    let g: Grammar = "<PAIRS>
      eats eat fish
      </PAIRS>
      <GRPAR>
      1 - - (grup-verb,sn) eats::(L.lemma,R.lemma) top_left RELABEL -
      1 - - (grup-verb,sp) eats::(L.lemma,R:sn.lemma) top_left RELABEL -
      </GRPAR>"
      .parse()
      .unwrap();
    let no_db = Resources {
      word_classes: &g.word_classes,
      pair_classes: &g.pair_classes,
      semdb: None,
    };
    let pt: ParseTree = "(S
        (grup-verb (+v eats/eat/VBZ))
        (sn (+n fish/fish/NN))
        (sp (+p with/with/IN) (sn (+n fish/fish/NN))))"
      .parse()
      .unwrap();
    let cs = chunks(&pt);
    assert!(g.matching_pair(&pt, &cs, 0, only_rule(&g, "grup-verb", "sn"), &no_db));
    let sp_rule = only_rule(&g, "grup-verb", "sp");
    let moved = [cs[0], cs[2]];
    assert!(g.matching_pair(&pt, &moved, 0, sp_rule, &no_db));
    let wrong = [cs[1], cs[2]];
    assert!(!g.matching_pair(&pt, &wrong, 0, sp_rule, &no_db));
  }

  #[test]
  fn test_best_rule_per_pair() {
    let g: Grammar = "<GRPAR>
      0 - - (a,b) - top_left RELABEL x:-
      4 - - (a,b) - top_left RELABEL y:-
      4 - - (a,b) - top_left RELABEL z:-
      2 - $$_c (a,b) - top_left RELABEL w:-
      </GRPAR>"
      .parse()
      .unwrap();
    let pt = forest(&["a", "b"]);
    let no_classes = ClassSet::new();
    let res = Resources {
      word_classes: &no_classes,
      pair_classes: &no_classes,
      semdb: None,
    };
    let mut session = Session::new();
    let rule = g.find_best_rule(&pt, &chunks(&pt), 0, &mut session, &res);
    assert_eq!(rule.priority, Priority(4));
    assert!(rule.origin.ends_with(":3"));

    let pt = forest(&["c", "d"]);
    let rule = g.find_best_rule(&pt, &chunks(&pt), 0, &mut session, &res);
    assert!(rule.is_fallback());
  }

  #[test]
  fn test_graft_point_is_last_match() {
    let g: Grammar = "<GRPAR>\n1 - - (a,c) - last_left MATCHING sn\n</GRPAR>"
      .parse()
      .unwrap();
    let pt: ParseTree = "(S (a (sn (+n x/x/N)) (+h y/y/V) (sn (+n z/z/N))) (c (+w w/w/W)))"
      .parse()
      .unwrap();
    let cs = chunks(&pt);
    let rule = only_rule(&g, "a", "c");
    let mut session = Session::new();
    assert!(g.matching_operation(&pt, &cs, 0, rule, &mut session));
    let last = session.recall(rule.id, 0).unwrap();
    assert_eq!(pt.span(last), (2, 2));
  }
}
