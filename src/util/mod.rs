//! Shared utilities

pub mod config;
pub mod context;
pub mod fs;
pub mod hash;
pub mod http;
pub mod process;
pub mod shell;
pub mod signal;

pub use config::Config;
pub use context::GlobalContext;

/// Format an error with its chain of causes (`outer: inner: root`).
pub fn display_error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_message = cause.to_string();
        // transparent wrappers repeat their inner message
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("loading failed")]
    struct Outer(#[source] io::Error);

    #[test]
    fn test_display_error_chain() {
        let err = Outer(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        assert_eq!(display_error_chain(&err), "loading failed: no such file");
    }
}
