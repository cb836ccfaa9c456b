#[macro_use]
extern crate lazy_static;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

pub mod analyzer;
pub mod completer;
pub mod dep_tree;
pub mod expression;
pub mod grammar;
pub mod labeler;
pub mod parse_grammar;
pub mod parse_tree;
pub mod rules;
pub mod semdb;
pub mod tree;
pub mod utils;
pub mod word;

pub use crate::analyzer::Analyzer;
pub use crate::completer::Session;
pub use crate::dep_tree::{DepNode, DepTree};
pub use crate::grammar::Grammar;
pub use crate::parse_tree::{ParseNode, ParseTree};
pub use crate::semdb::{SemanticDb, SenseInfo, SenseTable};
pub use crate::tree::{NodeIdx, Tree};
pub use crate::utils::{Err, GrammarError, TreeError};
pub use crate::word::{Sentence, Word};
