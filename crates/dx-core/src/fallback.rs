//! Ordered fallback chains.
//!
//! Repository URL, author email and hostname are each resolved from a list of
//! candidate producers evaluated left to right. The first producer that yields
//! a non-blank value wins; producers that fail or come back empty fall through.

use tracing::debug;

use crate::error::Result;

/// One candidate producer in a fallback chain.
pub struct Step<'a> {
    name: &'static str,
    produce: Box<dyn FnOnce() -> Result<Option<String>> + 'a>,
}

impl<'a> Step<'a> {
    /// A named producer. The name only appears in diagnostics.
    pub fn new(name: &'static str, produce: impl FnOnce() -> Result<Option<String>> + 'a) -> Self {
        Self {
            name,
            produce: Box::new(produce),
        }
    }

    /// A producer that cannot fail.
    pub fn value(name: &'static str, value: Option<String>) -> Self {
        Self::new(name, move || Ok(value))
    }
}

/// Evaluate `steps` in order and return the first non-blank value.
///
/// Later steps are never run once one succeeds. Errors are logged and treated
/// as an empty result.
pub fn first_non_empty<'a>(
    chain: &str,
    steps: impl IntoIterator<Item = Step<'a>>,
) -> Option<String> {
    for step in steps {
        match (step.produce)() {
            Ok(Some(value)) if !value.trim().is_empty() => {
                debug!(chain = %chain, step = step.name, "fallback step produced a value");
                return Some(value);
            }
            Ok(_) => {}
            Err(e) => {
                debug!(chain = %chain, step = step.name, error = %e, "fallback step failed");
            }
        }
    }
    None
}
