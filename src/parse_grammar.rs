//! Line-oriented loading of grammar descriptions, plus the small
//! recursive-descent helpers shared with the bracketed tree reader

use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Err;
use crate::expression::{Expr, NodePath, NodeTest, PairAttr, PairTest, PathTop, Side};
use crate::grammar::Grammar;
use crate::rules::{
  ChunkAttr, ChunkRef, ChunkSide, CompleterRule, Context, ContextSlot, Enabling, LabelerRule,
  MatchingAttrib, MatchingCondition, Operation, PairCondition, Priority, Relabel,
};
use crate::semdb::SenseTable;
use crate::utils::{GrammarError, split_set, split_top};

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// Try to consume a regex, returning None if it doesn't match
pub(crate) fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
pub(crate) fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, s).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
pub(crate) fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
pub(crate) fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", c, s).into())
  }
}

/// Tries to skip 1 or more \s characters
pub(crate) fn skip_whitespace(s: &str) -> &str {
  s.trim_start()
}

/// Parses `[~]label<lemma>(form)[class]{pos}`, each bracket at most once
pub fn parse_matching_condition(s: &str) -> Result<MatchingCondition, Err> {
  regex_static!(LABEL, r"[^~<(\[{\s][^<(\[{\s]*");

  let (tilde, s) = optional_char('~', s);
  let (label, mut rem) = needed_re(&*LABEL, s).map_err(|e| format!("condition label: {}", e))?;
  let mut cond = MatchingCondition {
    negated: tilde.is_some(),
    label: label.to_string(),
    attrs: Vec::new(),
  };

  let mut seen = Vec::new();
  while let Some(open) = rem.chars().next() {
    let close = match open {
      '<' => '>',
      '(' => ')',
      '[' => ']',
      '{' => '}',
      _ => return Err(format!("unexpected '{}' in condition {}", open, s).into()),
    };
    let end = rem
      .find(close)
      .ok_or_else(|| format!("missing closing {} in condition {}", close, s))?;
    if seen.contains(&open) {
      return Err(format!("duplicate {}{} in condition {}", open, close, s).into());
    }
    seen.push(open);

    let value = &rem[1..end];
    cond.attrs.push(match open {
      '<' => MatchingAttrib::Lemma(value.to_string()),
      '(' => MatchingAttrib::Form(value.to_string()),
      '[' => MatchingAttrib::Class(value.to_string()),
      _ => MatchingAttrib::Pos(Regex::new(value)?),
    });
    rem = &rem[end + 1..];
  }

  Ok(cond)
}

fn parse_context(s: &str) -> Result<Context, Err> {
  let (bang, s) = optional_char('!', s);
  let mut context = Context {
    negated: bang.is_some(),
    ..Default::default()
  };
  if s == "-" {
    return Ok(context);
  }

  let mut left = true;
  for slot in s.split('_') {
    let slot = match slot {
      "$$" => {
        left = false;
        continue;
      }
      "OUT" => ContextSlot::Out,
      "?" => ContextSlot::Any,
      "*" => ContextSlot::Star,
      cond => ContextSlot::Cond(parse_matching_condition(cond)?),
    };
    if left {
      context.left.push(slot);
    } else {
      context.right.push(slot);
    }
  }
  Ok(context)
}

/// `(left,right)`
fn parse_chunk_pair(s: &str) -> Result<(MatchingCondition, MatchingCondition), Err> {
  let inner = s
    .strip_prefix('(')
    .and_then(|s| s.strip_suffix(')'))
    .ok_or_else(|| format!("expected (leftChunk,rightChunk) at {}", s))?;
  let (left, right) = inner
    .split_once(',')
    .ok_or_else(|| format!("expected (leftChunk,rightChunk) at {}", s))?;
  Ok((parse_matching_condition(left)?, parse_matching_condition(right)?))
}

fn parse_chunk_ref(s: &str) -> Result<ChunkRef, Err> {
  let (node, attr) = s
    .rsplit_once('.')
    .ok_or_else(|| format!("missing attribute in {}", s))?;
  let (top, rest) = split_top(node);
  let side = match top {
    "L" => ChunkSide::Left,
    "R" => ChunkSide::Right,
    _ => return Err(format!("pair node must start with L or R: {}", s).into()),
  };
  let attr = match attr {
    "lemma" => ChunkAttr::Lemma,
    "pos" => ChunkAttr::Pos,
    "semfile" => ChunkAttr::SemFile,
    "tonto" => ChunkAttr::Tonto,
    "synon" => ChunkAttr::Synon,
    "asynon" => ChunkAttr::Asynon,
    _ => return Err(format!("unsupported pair attribute {}", attr).into()),
  };
  let steps = if rest.is_empty() {
    Vec::new()
  } else {
    rest.split(':').map(|s| s.to_string()).collect()
  };
  Ok(ChunkRef { side, steps, attr })
}

/// `class::(L[:path].attr,R[:path].attr)`
fn parse_pair_condition(s: &str) -> Result<PairCondition, Err> {
  let (class, rest) = s
    .split_once("::(")
    .ok_or_else(|| format!("expected class::(node,node) at {}", s))?;
  let rest = rest
    .strip_suffix(')')
    .ok_or_else(|| format!("missing ) at {}", s))?;
  let (first, second) = rest
    .split_once(',')
    .ok_or_else(|| format!("expected two nodes at {}", s))?;
  Ok(PairCondition {
    class: class.to_string(),
    first: parse_chunk_ref(first)?,
    second: parse_chunk_ref(second)?,
  })
}

fn parse_relabel(s: &str) -> Result<Relabel, Err> {
  if s == "-" {
    return Ok(Relabel::default());
  }
  let (left, right) = s
    .split_once(':')
    .ok_or_else(|| format!("invalid RELABEL value {}", s))?;
  let keep = |l: &str| (l != "-").then(|| l.to_string());
  Ok(Relabel {
    left: keep(left),
    right: keep(right),
  })
}

/// Incremental builder of a `Grammar` from the sections of a description.
struct Loader {
  grammar: Grammar,
  base: PathBuf,
  semdb_declared: bool,
  next_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
  Class,
  Pairs,
  Semdb,
  Grpar,
  Grlab,
  Unknown,
}

impl Section {
  fn from_name(name: &str) -> Self {
    match name {
      "CLASS" => Self::Class,
      "PAIRS" => Self::Pairs,
      "SEMDB" => Self::Semdb,
      "GRPAR" => Self::Grpar,
      "GRLAB" => Self::Grlab,
      _ => Self::Unknown,
    }
  }
}

fn read_file(path: &Path) -> Result<String, GrammarError> {
  fs::read_to_string(path).map_err(|e| GrammarError::io(path, e))
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| path.display().to_string())
}

impl Loader {
  fn new(base: &Path) -> Self {
    Self {
      grammar: Grammar::new(),
      base: base.to_path_buf(),
      semdb_declared: false,
      next_id: 0,
    }
  }

  fn resolve(&self, path: &str) -> PathBuf {
    let path = Path::new(path.trim_matches('"'));
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base.join(path)
    }
  }

  fn load(mut self, src: &str, origin: &str) -> Result<Grammar, GrammarError> {
    let mut section: Option<(Section, String)> = None;

    for (lnum, line) in src.lines().enumerate() {
      let line = line.trim();
      let at = format!("{}:{}", origin, lnum + 1);
      if line.is_empty() || line.starts_with('%') {
        continue;
      }

      if let Some(name) = line.strip_prefix("</").and_then(|l| l.strip_suffix('>')) {
        if !matches!(&section, Some((_, open)) if open == name) {
          return Err(GrammarError::Syntax {
            origin: at,
            message: format!("closing </{}> does not match the open section", name),
          });
        }
        section = None;
        continue;
      }
      if let Some(name) = line.strip_prefix('<').and_then(|l| l.strip_suffix('>')) {
        if let Some((_, open)) = &section {
          return Err(GrammarError::Syntax {
            origin: at,
            message: format!("section <{}> opened inside <{}>", name, open),
          });
        }
        let kind = Section::from_name(name);
        if kind == Section::Unknown {
          tracing::warn!("{}: unknown section <{}> ignored", at, name);
        }
        section = Some((kind, name.to_string()));
        continue;
      }

      match &section {
        None => tracing::warn!("{}: line outside of any section ignored", at),
        Some((kind, _)) => self.section_line(*kind, line, &at)?,
      }
    }

    if let Some((_, open)) = section {
      return Err(GrammarError::Syntax {
        origin: origin.to_string(),
        message: format!("section <{}> is never closed", open),
      });
    }

    tracing::debug!(
      "loaded {} completer rules and {} labeler rules from {}",
      self.grammar.num_completer_rules(),
      self.grammar.num_labeler_rules(),
      origin
    );
    Ok(self.grammar)
  }

  fn section_line(&mut self, kind: Section, line: &str, at: &str) -> Result<(), GrammarError> {
    let mut fields = line.split_whitespace();
    match kind {
      Section::Class | Section::Pairs => {
        let class = fields.next().unwrap_or_default();
        let values = fields.collect::<Vec<_>>();
        self.load_classes(kind, class, &values, at)?;
      }
      Section::Semdb => {
        if let Some(path) = fields.next() {
          let path = self.resolve(path);
          self.grammar.sense_table = Some(SenseTable::read_from_file(&path)?);
          self.semdb_declared = true;
        }
      }
      Section::Grpar | Section::Grlab => {
        if let (Some("#include"), Some(file)) = (fields.next(), fields.next()) {
          self.include(kind, file, at)?;
        } else if kind == Section::Grpar {
          self.completer_rule(line, at)?;
        } else {
          self.labeler_line(line, at)?;
        }
      }
      Section::Unknown => {}
    }
    Ok(())
  }

  fn include(&mut self, kind: Section, file: &str, at: &str) -> Result<(), GrammarError> {
    let path = self.resolve(file);
    let src = read_file(&path)?;
    let name = file_name(&path);
    for (lnum, line) in src.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('%') {
        continue;
      }
      let origin = format!("{}::{}:{}", at, name, lnum + 1);
      if kind == Section::Grpar {
        self.completer_rule(line, &origin)?;
      } else {
        self.labeler_line(line, &origin)?;
      }
    }
    Ok(())
  }

  fn load_classes(
    &mut self,
    kind: Section,
    class: &str,
    values: &[&str],
    at: &str,
  ) -> Result<(), GrammarError> {
    let mut keys = Vec::new();
    match values {
      [file] if file.len() > 1 && file.starts_with('"') && file.ends_with('"') => {
        for line in read_file(&self.resolve(file))?.lines() {
          let line = line.trim();
          if line.is_empty() || line.starts_with('%') {
            continue;
          }
          let mut key = class.to_string();
          for word in line.split_whitespace() {
            key.push('#');
            key.push_str(word);
          }
          keys.push(key);
        }
      }
      [] => tracing::warn!("{}: class {} without members", at, class),
      words => keys.push(format!("{}#{}", class, words.join("#"))),
    }

    if kind == Section::Class {
      self.grammar.word_classes.extend(keys);
    } else {
      self.grammar.pair_classes.extend(keys);
    }
    Ok(())
  }

  fn completer_rule(&mut self, line: &str, at: &str) -> Result<(), GrammarError> {
    match self.build_completer_rule(line, at) {
      Ok(rule) => {
        tracing::trace!("loaded rule {}", rule);
        self.grammar.add_completer_rule(rule);
        Ok(())
      }
      Err(e) => match e.downcast::<GrammarError>() {
        Ok(fatal) => Err(*fatal),
        Err(e) => {
          tracing::warn!("{}: {}. Rule will be ignored", at, e);
          Ok(())
        }
      },
    }
  }

  /// Authoring faults come back as plain errors; a `GrammarError` inside
  /// the box is a configuration error.
  fn build_completer_rule(&mut self, line: &str, at: &str) -> Result<CompleterRule, Err> {
    let mut fields = line.split_whitespace();
    let mut next = |what: &str| {
      fields
        .next()
        .ok_or_else(|| -> Err { format!("missing {}", what).into() })
    };
    let priority = next("priority")?;
    let flags = next("flags")?;
    let context = next("context")?;
    let chunks = next("chunk pair")?;
    let pair = next("pair condition")?;
    let operation = next("operation")?;
    let lit = next("RELABEL or MATCHING")?;
    let operand = next("operand")?;

    let priority = Priority(
      priority
        .parse()
        .map_err(|_| format!("invalid priority {}", priority))?,
    );
    let flags = split_set(flags);
    let enabling = if flags.contains("-") {
      Enabling::Always
    } else {
      Enabling::AnyOf(flags)
    };
    let context = parse_context(context)?;
    let (left, right) = parse_chunk_pair(chunks)?;
    let pair = match pair {
      "-" => None,
      p => Some(parse_pair_condition(p)?),
    };
    if let Some(p) = &pair {
      let semantic = p.first.attr.is_semantic() || p.second.attr.is_semantic();
      if semantic && !self.semdb_declared {
        return Err(Box::new(GrammarError::MissingSemdb {
          origin: at.to_string(),
          function: "pair".to_string(),
        }));
      }
    }

    let operation = match (operation, lit) {
      ("top_left", "RELABEL") => Operation::TopLeft(parse_relabel(operand)?),
      ("top_right", "RELABEL") => Operation::TopRight(parse_relabel(operand)?),
      ("last_left", "MATCHING") => Operation::LastLeft(parse_matching_condition(operand)?),
      ("cover_last_left", "MATCHING") => {
        Operation::CoverLastLeft(parse_matching_condition(operand)?)
      }
      ("top_left" | "top_right", _) => return Err(format!("{} requires RELABEL", operation).into()),
      ("last_left" | "cover_last_left", _) => {
        return Err(format!("{} requires MATCHING", operation).into());
      }
      _ => return Err(format!("invalid operation '{}'", operation).into()),
    };

    let mut flags_on = BTreeSet::new();
    let mut flags_off = BTreeSet::new();
    for flag in fields {
      if flag.starts_with('%') {
        break;
      } else if let Some(f) = flag.strip_prefix('+') {
        flags_on.insert(f.to_string());
      } else if let Some(f) = flag.strip_prefix('-') {
        flags_off.insert(f.to_string());
      } else {
        tracing::warn!("{}: flag {} must be toggled on (+) or off (-)", at, flag);
      }
    }

    let id = self.next_id;
    self.next_id += 1;
    Ok(CompleterRule {
      id,
      priority,
      enabling,
      left,
      right,
      pair,
      context,
      operation,
      flags_on,
      flags_off,
      origin: at.to_string(),
    })
  }

  fn labeler_line(&mut self, line: &str, at: &str) -> Result<(), GrammarError> {
    let mut fields = line.split_whitespace();
    let (ancestor, label) = match (fields.next(), fields.next()) {
      (Some("UNIQUE"), first) => {
        self.grammar.unique.extend(first.into_iter().chain(fields).map(|l| l.to_string()));
        return Ok(());
      }
      (Some(ancestor), Some(label)) => (ancestor, label),
      _ => {
        tracing::warn!("{}: labeling rule needs an ancestor and a label", at);
        return Ok(());
      }
    };

    let mut conds = Vec::new();
    for cond in fields {
      if let Some(e) = self.labeler_condition(cond, at)? {
        conds.push(e);
      }
    }

    tracing::trace!("loaded labeling rule {} -> {} [{}]", ancestor, label, at);
    self.grammar.add_labeler_rule(LabelerRule {
      ancestor: ancestor.to_string(),
      label: label.to_string(),
      expr: Expr::And(conds),
      origin: at.to_string(),
    });
    Ok(())
  }

  /// One `node.func=values` condition. Malformed conditions are reported
  /// and dropped; a semantic function without a `<SEMDB>` is fatal.
  fn labeler_condition(&self, cond: &str, at: &str) -> Result<Option<Expr>, GrammarError> {
    let (lhs, value) = match cond.split_once('=') {
      Some(split) => split,
      None => {
        tracing::warn!("{}: ignored incorrect condition {}", at, cond);
        return Ok(None);
      }
    };
    let (lhs, negated) = match lhs.strip_suffix('!') {
      Some(lhs) => (lhs, true),
      None => (lhs, false),
    };
    let (node, func) = match lhs.rsplit_once('.') {
      Some(split) => split,
      None => {
        tracing::warn!("{}: ignored incorrect condition {}", at, cond);
        return Ok(None);
      }
    };

    if matches!(func, "tonto" | "semfile" | "synon" | "asynon") && !self.semdb_declared {
      return Err(GrammarError::MissingSemdb {
        origin: at.to_string(),
        function: func.to_string(),
      });
    }

    match build_condition(node, func, value, negated) {
      Ok(e) => Ok(Some(if negated { Expr::Not(Box::new(e)) } else { e })),
      Err(e) => {
        tracing::warn!("{}: ignored condition {}: {}", at, cond, e);
        Ok(None)
      }
    }
  }
}

fn build_condition(node: &str, func: &str, value: &str, negated: bool) -> Result<Expr, Err> {
  let values = split_set(value);

  if func == "pairclass" {
    let inner = node
      .strip_prefix('[')
      .and_then(|n| n.strip_suffix(']'))
      .ok_or_else(|| format!("pair nodes must be written [n1.attr,n2.attr], got {}", node))?;
    let (first, second) = inner
      .split_once(',')
      .ok_or_else(|| format!("expected two nodes in {}", node))?;
    let side = |s: &str| -> Result<(NodePath, PairAttr), Err> {
      let (path, attr) = s
        .rsplit_once('.')
        .ok_or_else(|| format!("missing attribute in {}", s))?;
      Ok((path.parse()?, attr.parse()?))
    };
    return Ok(Expr::PairClass(PairTest {
      first: side(first)?,
      second: side(second)?,
      classes: values,
    }));
  }

  let mut path: NodePath = node.parse()?;
  if negated {
    path.top = path.top.negated();
  }

  if func == "side" {
    let side = match value {
      "left" => Side::Left,
      "right" => Side::Right,
      _ => return Err(format!("invalid side {}, must be 'left' or 'right'", value).into()),
    };
    if !path.steps.is_empty() || !matches!(path.top, PathTop::Parent | PathTop::Daughter) {
      return Err(format!("side only applies to p or d, not {}", node).into());
    }
    return Ok(Expr::Side { of: path.top, side });
  }

  let test = match func {
    "label" => NodeTest::Label(values),
    "lemma" => NodeTest::Lemma(values),
    "pos" => {
      let alternatives = values.into_iter().collect::<Vec<_>>().join("|");
      NodeTest::Pos(Regex::new(&alternatives)?)
    }
    "class" => NodeTest::WordClass(values),
    "tonto" => NodeTest::Tonto(values),
    "semfile" => NodeTest::SemFile(values),
    "synon" => NodeTest::Synon(values),
    "asynon" => NodeTest::Asynon(values),
    _ => return Err(format!("unknown function {}", func).into()),
  };
  Ok(Expr::Node { path, test })
}

impl Grammar {
  /// Loads a grammar description. Files it names resolve against its directory.
  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
    let path = path.as_ref();
    let src = read_file(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Loader::new(base).load(&src, &file_name(path))
  }

  /// Loads a grammar description given as text; files it names resolve against `base`
  pub fn parse_with_base(src: &str, base: &Path) -> Result<Self, GrammarError> {
    Loader::new(base).load(src, "<grammar>")
  }
}

impl FromStr for Grammar {
  type Err = GrammarError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse_with_base(s, Path::new("."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GRAMMAR: &str = r#"
    % toy grammar
    <CLASS>
    animal cat
    animal dog
    </CLASS>
    <PAIRS>
    eats eat fish
    </PAIRS>
    <GRPAR>
    1 - - (sn,grup-verb) - top_right RELABEL - % subject
    2 INIT|X !y_*_$$_OUT (grup-verb,sn<fish>) eats::(L.lemma,R.lemma) top_left RELABEL -:obj +DONE -INIT
    5 - - (grup-verb,sp) - last_left MATCHING sn{^N}
    5 - - (grup-verb,broken) - last_left RELABEL -
    x - - (a,b) - top_left RELABEL -
    </GRPAR>
    <GRLAB>
    UNIQUE subj obj
    grup-verb subj d.label=sn d.side=left
    grup-verb obj d.label=sn As.lemma!=rain p.class=animal
    grup-verb mod [p.lemma,d.lemma].pairclass=eats d.bogus=1 noequals
    </GRLAB>
  "#;

  #[test]
  fn test_matching_condition() {
    let c = parse_matching_condition("~sn<cat>(Cats)[animal]{^N}").unwrap();
    assert!(c.negated);
    assert_eq!(c.label, "sn");
    assert_eq!(c.attrs.len(), 4);
    assert_eq!(c.to_string(), "~sn<cat>(Cats)[animal]{^N}");

    assert!(parse_matching_condition("sn<cat").is_err());
    assert!(parse_matching_condition("sn<a><b>").is_err());
    assert_eq!(parse_matching_condition("grup-verb").unwrap().attrs.len(), 0);
  }

  #[test]
  fn test_context() {
    let c = parse_context("!y_*_$$_OUT").unwrap();
    assert!(c.negated);
    assert_eq!(c.left.len(), 2);
    assert!(matches!(c.left[1], ContextSlot::Star));
    assert!(matches!(c.right[..], [ContextSlot::Out]));
    let c = parse_context("-").unwrap();
    assert!(!c.negated && c.left.is_empty() && c.right.is_empty());
  }

  #[test]
  fn test_load_grammar() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    assert_eq!(g.start, "S");
    // the RELABEL/MATCHING mix-up and the bad priority are skipped
    assert_eq!(g.num_completer_rules(), 3);
    assert!(g.word_classes.contains("animal#dog"));
    assert!(g.pair_classes.contains("eats#eat#fish"));
    assert!(g.is_unique("subj") && g.is_unique("obj"));

    let key = ("grup-verb".to_string(), "sn".to_string());
    let rule = &g.completer.get_vec(&key).unwrap()[0];
    assert_eq!(rule.priority, Priority(2));
    assert!(rule.context.negated);
    assert_eq!(rule.flags_on.iter().collect::<Vec<_>>(), vec!["DONE"]);
    assert_eq!(rule.flags_off.iter().collect::<Vec<_>>(), vec!["INIT"]);
    match &rule.operation {
      Operation::TopLeft(r) => {
        assert_eq!(r.left, None);
        assert_eq!(r.right.as_deref(), Some("obj"));
      }
      other => panic!("unexpected operation {:?}", other),
    }
    let pair = rule.pair.as_ref().unwrap();
    assert_eq!(pair.class, "eats");
    assert_eq!(pair.second.side, ChunkSide::Right);

    let labels = g.labeler_rules("grup-verb").unwrap();
    assert_eq!(labels.len(), 3);
    match &labels[2].expr {
      // the bogus function and the condition without '=' are dropped
      Expr::And(conds) => assert_eq!(conds.len(), 1),
      other => panic!("unexpected expression {:?}", other),
    }
  }

  #[test]
  fn test_negated_sibling_quantifier_flips() {
    let g: Grammar = "<GRLAB>\ns x As.lemma!=a\n</GRLAB>".parse().unwrap();
    match &g.labeler_rules("s").unwrap()[0].expr {
      Expr::And(conds) => match &conds[0] {
        Expr::Not(inner) => match &**inner {
          Expr::Node { path, .. } => assert_eq!(path.top, PathTop::SomeSibling),
          other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
      },
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_semantic_function_needs_semdb() {
    let err = "<GRLAB>\ns x d.tonto=Animal\n</GRLAB>"
      .parse::<Grammar>()
      .unwrap_err();
    assert!(matches!(err, GrammarError::MissingSemdb { .. }));
  }

  #[test]
  fn test_unclosed_section() {
    let err = "<GRPAR>\n1 - - (a,b) - top_left RELABEL -\n"
      .parse::<Grammar>()
      .unwrap_err();
    assert!(matches!(err, GrammarError::Syntax { .. }));
  }

  #[test]
  fn test_missing_include_is_fatal() {
    let err = "<GRPAR>\n#include no/such/file.dat\n</GRPAR>"
      .parse::<Grammar>()
      .unwrap_err();
    assert!(matches!(err, GrammarError::Io { .. }));
  }

  #[test]
  fn test_files_resolve_against_grammar_dir() {
    let dir = std::env::temp_dir().join(format!("chunkdep-grammar-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("animals.dat"), "cat\n% comment\ndog\n").unwrap();
    fs::write(dir.join("extra.gram"), "3 - - (a,b) - top_right RELABEL -\n").unwrap();
    fs::write(dir.join("senses.dat"), "sense cat-1 tonto=Animal\nword cat N cat-1\n").unwrap();
    fs::write(
      dir.join("main.gram"),
      "<CLASS>\nanimal \"animals.dat\"\n</CLASS>\n<SEMDB>\nsenses.dat\n</SEMDB>\n\
       <GRPAR>\n#include extra.gram\n</GRPAR>\n<GRLAB>\ns x d.tonto=Animal\n</GRLAB>\n",
    )
    .unwrap();

    let g = Grammar::read_from_file(dir.join("main.gram")).unwrap();
    assert!(g.word_classes.contains("animal#cat"));
    assert!(g.word_classes.contains("animal#dog"));
    assert_eq!(g.num_completer_rules(), 1);
    assert!(g.sense_table.is_some());
    assert_eq!(g.num_labeler_rules(), 1);

    fs::remove_dir_all(&dir).unwrap();
  }
}
