//! Error context utilities: attach human-readable context to any error and
//! walk/format the resulting chain.

use std::error::Error as StdError;
use std::fmt;

pub trait ErrorContext<T> {
    fn context(self, msg: impl Into<String>) -> Result<T, Box<dyn StdError + Send + Sync>>;

    fn with_context<F>(self, f: F) -> Result<T, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T, Box<dyn StdError + Send + Sync>> {
        self.map_err(|e| {
            Box::new(ContextError { message: msg.into(), source: Box::new(e) })
                as Box<dyn StdError + Send + Sync>
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            Box::new(ContextError { message: f(), source: Box::new(e) })
                as Box<dyn StdError + Send + Sync>
        })
    }
}

#[derive(Debug)]
struct ContextError {
    message: String,
    source: Box<dyn StdError + Send + Sync>,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source as &(dyn StdError + 'static))
    }
}

/// Walk `error.source()` and render each link on its own indented line.
pub fn format_error_chain(error: &dyn StdError) -> String {
    let mut result = format!("Error: {error}");
    let mut current = error.source();
    let mut level = 1;
    while let Some(source) = current {
        result.push_str(&format!("\n{:indent$}Caused by: {source}", "", indent = level * 2));
        current = source.source();
        level += 1;
    }
    result
}

pub fn root_cause(error: &dyn StdError) -> &dyn StdError {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

pub fn error_chain_length(error: &dyn StdError) -> usize {
    let mut count = 1;
    let mut current = error.source();
    while let Some(source) = current {
        count += 1;
        current = source.source();
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolingError;

    fn inner() -> Result<(), std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"))
    }

    fn middle() -> Result<(), Box<dyn StdError + Send + Sync>> {
        inner().context("failed to read configuration")
    }

    #[test]
    fn context_replaces_display_but_keeps_source() {
        let err = middle().unwrap_err();
        assert_eq!(err.to_string(), "failed to read configuration");
        assert!(format_error_chain(&*err).contains("file not found"));
    }

    #[test]
    fn root_cause_and_chain_length() {
        let err = middle().unwrap_err();
        assert_eq!(root_cause(&*err).to_string(), "file not found");
        assert_eq!(error_chain_length(&*err), 2);
    }

    #[test]
    fn single_error_has_chain_length_one() {
        let err = ToolingError::General("solo".into());
        assert_eq!(error_chain_length(&err), 1);
    }
}
