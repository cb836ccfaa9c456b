use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::expression::Expr;

/// Rule priority. Positive values rank first, smallest first; zero and
/// negative values are fallbacks, ranked closest to zero first.
///
/// `Ord` sorts better priorities first, so the best of a set is its minimum.
///
/// ```
/// use chunkdep::rules::Priority;
/// let mut ps = vec![Priority(0), Priority(7), Priority(-2), Priority(3)];
/// ps.sort();
/// assert_eq!(ps, vec![Priority(3), Priority(7), Priority(0), Priority(-2)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Priority(pub i32);

impl Priority {
  fn rank(self) -> (bool, i64) {
    if self.0 > 0 {
      (false, self.0 as i64)
    } else {
      (true, -(self.0 as i64))
    }
  }

  /// Strictly preferred over `other`
  pub fn beats(self, other: Priority) -> bool {
    self < other
  }
}

impl Ord for Priority {
  fn cmp(&self, other: &Self) -> Ordering {
    self.rank().cmp(&other.rank())
  }
}

impl PartialOrd for Priority {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Extra requirement on the head word of a chunk
#[derive(Debug, Clone)]
pub enum MatchingAttrib {
  /// `<lemma>`
  Lemma(String),
  /// `(form)`
  Form(String),
  /// `[class]`, looked up as `class#lemma` in the word classes
  Class(String),
  /// `{regex}` searched in the tag
  Pos(Regex),
}

/// `[~]label<lemma>(form)[class]{pos}`: a chunk label plus optional head word
/// attributes. Negation applies to the whole condition.
#[derive(Debug, Clone, Default)]
pub struct MatchingCondition {
  pub negated: bool,
  pub label: String,
  pub attrs: Vec<MatchingAttrib>,
}

impl MatchingCondition {
  pub fn new(label: &str) -> Self {
    Self {
      label: label.to_string(),
      ..Default::default()
    }
  }
}

impl fmt::Display for MatchingCondition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.negated {
      write!(f, "~")?;
    }
    write!(f, "{}", self.label)?;
    for attr in &self.attrs {
      match attr {
        MatchingAttrib::Lemma(l) => write!(f, "<{}>", l)?,
        MatchingAttrib::Form(w) => write!(f, "({})", w)?,
        MatchingAttrib::Class(c) => write!(f, "[{}]", c)?,
        MatchingAttrib::Pos(re) => write!(f, "{{{}}}", re)?,
      }
    }
    Ok(())
  }
}

/// One position of a context window
#[derive(Debug, Clone)]
pub enum ContextSlot {
  /// `OUT`: the sequence ends here
  Out,
  /// `?`: any single chunk
  Any,
  /// `*`: any number of chunks up to the next slot
  Star,
  Cond(MatchingCondition),
}

/// Chunks required around the candidate pair. `left` is in sentence order,
/// so its last slot is the one next to the pair.
#[derive(Debug, Clone, Default)]
pub struct Context {
  pub negated: bool,
  pub left: Vec<ContextSlot>,
  pub right: Vec<ContextSlot>,
}

/// New root labels for the left and right chunk; None keeps the label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relabel {
  pub left: Option<String>,
  pub right: Option<String>,
}

/// How two adjacent chunks are joined
#[derive(Debug, Clone)]
pub enum Operation {
  /// Right chunk hangs as last child of the left root
  TopLeft(Relabel),
  /// Left chunk hangs as first child of the right root
  TopRight(Relabel),
  /// Right chunk hangs under the last node of the left chunk matching the condition
  LastLeft(MatchingCondition),
  /// Right chunk takes the place of the last matching node of the left chunk,
  /// which becomes a dependent of the right chunk
  CoverLastLeft(MatchingCondition),
}

impl Operation {
  pub fn name(&self) -> &'static str {
    match self {
      Self::TopLeft(_) => "top_left",
      Self::TopRight(_) => "top_right",
      Self::LastLeft(_) => "last_left",
      Self::CoverLastLeft(_) => "cover_last_left",
    }
  }

  /// The condition locating the graft point, for operations that need one
  pub fn matching(&self) -> Option<&MatchingCondition> {
    match self {
      Self::LastLeft(c) | Self::CoverLastLeft(c) => Some(c),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enabling {
  /// `-`
  Always,
  /// Enabled while any of these flags is active
  AnyOf(BTreeSet<String>),
}

impl Enabling {
  pub fn enabled(&self, active: &BTreeSet<String>) -> bool {
    match self {
      Self::Always => true,
      Self::AnyOf(flags) => flags.iter().any(|f| active.contains(f)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSide {
  /// `L`
  Left,
  /// `R`
  Right,
}

/// Head word attribute compared by a completer pair condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkAttr {
  Lemma,
  Pos,
  SemFile,
  Tonto,
  Synon,
  Asynon,
}

impl ChunkAttr {
  pub fn is_semantic(self) -> bool {
    !matches!(self, Self::Lemma | Self::Pos)
  }
}

/// `L[:path].attr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
  pub side: ChunkSide,
  pub steps: Vec<String>,
  pub attr: ChunkAttr,
}

/// `class::(L.attr,R.attr)`: the attribute values of the two located nodes
/// must form a pair of the class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCondition {
  pub class: String,
  pub first: ChunkRef,
  pub second: ChunkRef,
}

/// A rule joining two adjacent chunks
#[derive(Debug, Clone)]
pub struct CompleterRule {
  /// Unique within a grammar, keys the per-session match memo
  pub id: usize,
  pub priority: Priority,
  pub enabling: Enabling,
  pub left: MatchingCondition,
  pub right: MatchingCondition,
  pub pair: Option<PairCondition>,
  pub context: Context,
  pub operation: Operation,
  pub flags_on: BTreeSet<String>,
  pub flags_off: BTreeSet<String>,
  /// `file:line` of the rule, for diagnostics
  pub origin: String,
}

lazy_static! {
  /// The rule applied when nothing else matches: plain `top_left`, lowest priority
  pub static ref DEFAULT_RULE: CompleterRule = CompleterRule {
    id: usize::MAX,
    priority: Priority(0),
    enabling: Enabling::Always,
    left: MatchingCondition::default(),
    right: MatchingCondition::default(),
    pair: None,
    context: Context::default(),
    operation: Operation::TopLeft(Relabel::default()),
    flags_on: BTreeSet::new(),
    flags_off: BTreeSet::new(),
    origin: "default".to_string(),
  };
}

impl CompleterRule {
  pub fn fallback() -> &'static CompleterRule {
    &DEFAULT_RULE
  }

  pub fn is_fallback(&self) -> bool {
    self.id == usize::MAX
  }
}

impl fmt::Display for CompleterRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}] {} ({},{}) {}",
      self.origin,
      self.priority,
      self.left,
      self.right,
      self.operation.name()
    )
  }
}

/// Assigns `label` to a dependency under an ancestor linked to `ancestor`
/// when `expr` holds
#[derive(Debug, Clone)]
pub struct LabelerRule {
  pub ancestor: String,
  pub label: String,
  pub expr: Expr,
  pub origin: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_positive_priorities_rank_ascending() {
    assert!(Priority(1).beats(Priority(3)));
    assert!(Priority(3).beats(Priority(7)));
    assert!(!Priority(7).beats(Priority(3)));
  }

  #[test]
  fn test_positive_beats_fallbacks() {
    assert!(Priority(100).beats(Priority(0)));
    assert!(Priority(1).beats(Priority(-1)));
    assert!(!Priority(0).beats(Priority(9)));
  }

  #[test]
  fn test_fallbacks_rank_towards_zero() {
    assert!(Priority(0).beats(Priority(-1)));
    assert!(Priority(-1).beats(Priority(-5)));
  }

  #[test]
  fn test_equal_priorities_do_not_beat() {
    assert!(!Priority(5).beats(Priority(5)));
    assert!(!Priority(0).beats(Priority(0)));
    assert_eq!(Priority(5).cmp(&Priority(5)), Ordering::Equal);
  }

  #[test]
  fn test_enabling() {
    let active = ["INIT".to_string()].into_iter().collect::<BTreeSet<_>>();
    assert!(Enabling::Always.enabled(&BTreeSet::new()));
    let any = Enabling::AnyOf(["X".to_string(), "INIT".to_string()].into_iter().collect());
    assert!(any.enabled(&active));
    assert!(!any.enabled(&BTreeSet::new()));
  }

  #[test]
  fn test_single_fallback_rule() {
    let rule = CompleterRule::fallback();
    assert!(std::ptr::eq(rule, &*DEFAULT_RULE));
    assert!(rule.is_fallback());
    assert_eq!(rule.priority, Priority(0));
    assert!(matches!(&rule.operation, Operation::TopLeft(r) if *r == Relabel::default()));
  }

  #[test]
  fn test_display_condition() {
    let mut c = MatchingCondition::new("sn");
    c.negated = true;
    c.attrs.push(MatchingAttrib::Lemma("cat".into()));
    c.attrs.push(MatchingAttrib::Pos(Regex::new("^N").unwrap()));
    assert_eq!(c.to_string(), "~sn<cat>{^N}");
  }
}
