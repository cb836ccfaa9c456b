use std::env;
use std::io;
use std::io::BufRead;
use std::process;

use tracing_subscriber::EnvFilter;

use chunkdep::{Analyzer, Err, Grammar, ParseTree, Sentence, SenseTable};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} GRAMMAR [options] < FORESTS

Reads bracketed chunker forests from stdin, one after the other, and prints
each completed tree followed by its labeled dependency tree.

Options:
  -h, --help           Print this message
  -s, --semdb TABLE    Use the sense table TABLE for semantic conditions
  -r, --start LABEL    Root label of incomplete forests (defaults to S)
  -n, --no-deps        Only print the completed trees",
    prog_name
  )
}

struct Args {
  filename: String,
  semdb: Option<String>,
  start: Option<String>,
  print_deps: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let prog_name = match iter.next() {
      Some(name) => name,
      None => return Err(Self::make_error_message("bad argument vector", "chunkdep")),
    };

    let mut filename: Option<String> = None;
    let mut semdb = None;
    let mut start = None;
    let mut print_deps = true;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-n" || o == "--no-deps" {
        print_deps = false;
      } else if o == "-s" || o == "--semdb" {
        semdb = match iter.next() {
          Some(table) => Some(table),
          None => return Err(Self::make_error_message("--semdb needs a file", prog_name)),
        };
      } else if o == "-r" || o == "--start" {
        start = match iter.next() {
          Some(label) => Some(label),
          None => return Err(Self::make_error_message("--start needs a label", prog_name)),
        };
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    match filename {
      Some(filename) => Ok(Self {
        filename,
        semdb,
        start,
        print_deps,
      }),
      None => Err(Self::make_error_message("missing grammar file", prog_name)),
    }
  }
}

fn load(opts: &Args) -> Result<Analyzer, Err> {
  let mut g = Grammar::read_from_file(&opts.filename)?;
  if let Some(start) = &opts.start {
    g = g.with_start(start);
  }
  tracing::info!("{}", g);

  let analyzer = Analyzer::new(g);
  Ok(match &opts.semdb {
    Some(path) => analyzer.with_semdb(SenseTable::read_from_file(path)?),
    None => analyzer,
  })
}

fn analyze(analyzer: &Analyzer, src: &str, print_deps: bool) {
  let forest = match src.parse::<ParseTree>() {
    Ok(pt) => pt,
    Err(e) => {
      eprintln!("skipping unreadable tree: {}", e);
      return;
    }
  };

  let mut s = Sentence::from_parse_tree(forest);
  analyzer.analyze(&mut s);
  for (pt, dt) in s.parse_trees.iter().zip(&s.dep_trees) {
    println!("{}", pt);
    if print_deps {
      println!("{}", dt);
    }
    println!();
  }
}

/// Net count of open brackets in `line`
fn depth_change(line: &str) -> isize {
  line
    .chars()
    .map(|c| match c {
      '(' => 1,
      ')' => -1,
      _ => 0,
    })
    .sum()
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let analyzer = match load(&opts) {
    Ok(analyzer) => analyzer,
    Err(e) => {
      eprintln!("cannot load grammar: {}", e);
      process::exit(1);
    }
  };

  // a forest may span several lines; it ends where its brackets balance
  let mut pending = String::new();
  let mut depth = 0;
  for line in io::stdin().lock().lines() {
    let line = line?;
    if pending.is_empty() && line.trim().is_empty() {
      continue;
    }
    depth += depth_change(&line);
    pending.push_str(&line);
    pending.push('\n');
    if depth <= 0 {
      analyze(&analyzer, &pending, opts.print_deps);
      pending.clear();
      depth = 0;
    }
  }
  if !pending.trim().is_empty() {
    analyze(&analyzer, &pending, opts.print_deps);
  }

  Ok(())
}
