use std::io;
use std::path::Path;

/// A loaded NS source file: a display name plus the LF-normalized body.
///
/// All downstream spans and line/column positions refer to the normalized
/// body, never to the raw on-disk bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub body: String,
}

impl Source {
    /// Create a source from a name and body, normalizing CRLF to LF.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into().replace("\r\n", "\n"),
        }
    }

    /// Load a source file from disk.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), body))
    }

    /// The 0-based `n`th line of the body, without its trailing newline.
    pub fn line(&self, n: usize) -> Option<&str> {
        self.body.split('\n').nth(n)
    }
}
