//! Template parsing and `{{ name }}` substitution.
//!
//! Templates are staged into image build contexts. A placeholder is a
//! variable name made of ASCII letters, digits and underscores between double
//! braces, with optional whitespace around the name:
//!
//! - `{{image_name}}`
//! - `{{ version }}`
//!
//! Anything else, including unclosed braces and braces around text that is not
//! a valid name, passes through unchanged. Substituted values are never
//! re-scanned.
//!
//! # Scope
//!
//! A [`TemplateEngine`] carries the process-wide global variables. Each
//! [`TemplateEngine::render`] call supplies local variables that override
//! globals of the same name.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use buildchain_lib::template::{MissingVariable, TemplateEngine};
//!
//! let global = BTreeMap::from([("y".to_string(), "b".to_string())]);
//! let engine = TemplateEngine::new(global, MissingVariable::Error);
//! let local = BTreeMap::from([("x".to_string(), "a".to_string())]);
//! assert_eq!(engine.render("{{x}}-{{ y }}", &local).unwrap(), "a-b");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub type Variables = BTreeMap<String, String>;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A variable reference to be resolved
  Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unresolved template variable: {0}")]
  UnresolvedVariable(String),
}

/// What to do with a placeholder whose name is not in scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingVariable {
  /// Fail with [`TemplateError::UnresolvedVariable`].
  #[default]
  Error,
  /// Substitute the empty string.
  Empty,
}

fn is_name(candidate: &str) -> bool {
  !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a string into literal and variable segments.
///
/// Parsing never fails: text that does not form a placeholder is literal.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(start) = rest.find(OPEN) {
    let after_open = &rest[start + OPEN.len()..];
    let name = after_open
      .find(CLOSE)
      .map(|end| (end, after_open[..end].trim()))
      .filter(|(_, name)| is_name(name));

    match name {
      Some((end, name)) => {
        literal.push_str(&rest[..start]);
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Variable(name.to_string()));
        rest = &after_open[end + CLOSE.len()..];
      }
      None => {
        // Not a placeholder here; keep one brace and rescan from the next
        // character so `{{{x}}}` still finds `{{x}}`.
        literal.push_str(&rest[..=start]);
        rest = &rest[start + 1..];
      }
    }
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

/// Renders templates against a global scope merged with per-call locals.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
  global: Variables,
  missing: MissingVariable,
}

impl TemplateEngine {
  pub fn new(global: Variables, missing: MissingVariable) -> Self {
    Self { global, missing }
  }

  /// Look up a name, locals first.
  pub fn lookup<'a>(&'a self, name: &str, local: &'a Variables) -> Option<&'a str> {
    local.get(name).or_else(|| self.global.get(name)).map(String::as_str)
  }

  /// Substitute every placeholder in `input`.
  ///
  /// # Errors
  ///
  /// With [`MissingVariable::Error`], fails on the first name that is in
  /// neither scope.
  pub fn render(&self, input: &str, local: &Variables) -> Result<String, TemplateError> {
    self.render_segments(&parse(input), local)
  }

  /// Substitute placeholders in pre-parsed segments.
  pub fn render_segments(&self, segments: &[Segment], local: &Variables) -> Result<String, TemplateError> {
    let mut result = String::new();

    for segment in segments {
      match segment {
        Segment::Literal(s) => result.push_str(s),
        Segment::Variable(name) => match (self.lookup(name, local), self.missing) {
          (Some(value), _) => result.push_str(value),
          (None, MissingVariable::Empty) => {}
          (None, MissingVariable::Error) => return Err(TemplateError::UnresolvedVariable(name.clone())),
        },
      }
    }

    Ok(result)
  }
}
