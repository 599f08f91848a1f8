//! Session token sources
//!
//! The client never reads credentials from ambient state; a `TokenProvider` is
//! handed to the transport and asked for the current token on every request.
//! No token means the request goes out unauthenticated and the backend decides.

use std::fmt;
use std::path::PathBuf;

/// Supplies the bearer token attached to outgoing requests
pub trait TokenProvider: Send + Sync + fmt::Debug {
    /// Current token, or `None` to send the request without credentials
    fn token(&self) -> Option<String>;
}

/// No credentials at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// Fixed token, e.g. from a command-line flag
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        let token = self.0.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

// Tokens must not end up in logs
impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

/// Token persisted in a file, re-read on every request
///
/// A login flow elsewhere may rewrite the file; the next request picks the new
/// token up without rebuilding the client.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenProvider for FileTokenStore {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %err, "could not read token file");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken::new(" abc ").token(), Some("abc".to_string()));
        assert_eq!(StaticToken::new("   ").token(), None);
        assert_eq!(NoToken.token(), None);
    }

    #[test]
    fn test_static_token_debug_is_redacted() {
        let debug = format!("{:?}", StaticToken::new("secret"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_file_token_store_reads_on_every_call() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");
        let store = FileTokenStore::new(path.clone());

        assert_eq!(store.token(), None);

        std::fs::write(&path, "tok-123\n").unwrap();
        assert_eq!(store.token(), Some("tok-123".to_string()));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_empty_token_file_is_unauthenticated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");
        std::fs::write(&path, "  \n").unwrap();

        assert_eq!(FileTokenStore::new(path).token(), None);
    }
}
