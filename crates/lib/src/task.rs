//! Task registry: memoized build steps.
//!
//! A task is identified by a [`TaskKey`] (step name plus argument tuple). Its
//! body runs at most once per registry; every later request for the same key
//! gets a clone of the stored result without re-running side effects. There
//! is no eviction or invalidation; the registry lives as long as the run.
//!
//! A body that fails stores nothing, so the key stays incomplete.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tracing::debug;

/// Identity of a build step: its name and stringified arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
  pub name: &'static str,
  pub args: Vec<String>,
}

impl TaskKey {
  pub fn new(name: &'static str) -> Self {
    Self { name, args: Vec::new() }
  }

  pub fn with_args<I, S>(name: &'static str, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name,
      args: args.into_iter().map(Into::into).collect(),
    }
  }
}

impl fmt::Display for TaskKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.args.is_empty() {
      write!(f, "{}", self.name)
    } else {
      write!(f, "{}({})", self.name, self.args.join(", "))
    }
  }
}

struct TaskEntry {
  result: Option<Box<dyn Any + Send>>,
  executions: usize,
}

/// Arena of tasks keyed by identity.
#[derive(Default)]
pub struct TaskRegistry {
  entries: HashMap<TaskKey, TaskEntry>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the memoized result for `key`, or run `body` once and store it.
  ///
  /// # Panics
  ///
  /// Panics if `key` was completed earlier with a different result type,
  /// which is a programming error in the caller.
  pub async fn get_or_try_run<T, E, F, Fut>(&mut self, key: TaskKey, body: F) -> Result<T, E>
  where
    T: Clone + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(cached) = self.get::<T>(&key) {
      debug!(task = %key, "task already complete");
      return Ok(cached);
    }

    debug!(task = %key, "running task");
    let outcome = body().await;

    let entry = self.entries.entry(key).or_insert(TaskEntry {
      result: None,
      executions: 0,
    });
    entry.executions += 1;

    let value = outcome?;
    entry.result = Some(Box::new(value.clone()));
    Ok(value)
  }

  /// The stored result for `key`, if it completed.
  pub fn get<T: Clone + 'static>(&self, key: &TaskKey) -> Option<T> {
    let result = self.entries.get(key)?.result.as_ref()?;
    match result.downcast_ref::<T>() {
      Some(value) => Some(value.clone()),
      None => panic!("task {key} completed with a different result type"),
    }
  }

  pub fn is_complete(&self, key: &TaskKey) -> bool {
    self.entries.get(key).is_some_and(|e| e.result.is_some())
  }

  /// How many times the body for `key` has been run.
  pub fn executions(&self, key: &TaskKey) -> usize {
    self.entries.get(key).map_or(0, |e| e.executions)
  }

  /// Completed task keys, sorted.
  pub fn completed(&self) -> Vec<&TaskKey> {
    let mut keys: Vec<&TaskKey> = self
      .entries
      .iter()
      .filter(|(_, e)| e.result.is_some())
      .map(|(k, _)| k)
      .collect();
    keys.sort();
    keys
  }

  pub fn len(&self) -> usize {
    self.completed().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Debug for TaskRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskRegistry").field("completed", &self.completed()).finish()
  }
}
