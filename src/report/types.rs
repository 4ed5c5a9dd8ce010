/// A single piece of feedback attached to one file of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    /// File path relative to the repository root (e.g., "src/auth/config.rs")
    pub path: String,
    /// Line offset within the file's diff
    pub position: u32,
    /// Comment text, rendered as-is
    pub body: String,
}

impl ReviewComment {
    pub fn new(path: impl Into<String>, position: u32, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            position,
            body: body.into(),
        }
    }
}
