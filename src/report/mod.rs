pub mod types;

pub use types::ReviewComment;

const PREAMBLE: &str = "### 📝 Automated Review Comments\n\n\
Thank you for raising this pull request. Below are the review comments:\n\n";

/// Render review comments as the Markdown body of a single issue comment.
///
/// The layout is fixed: a header and an explanatory line, then one bullet
/// block per comment in input order:
///
/// ### 📝 Automated Review Comments
///
/// Thank you for raising this pull request. Below are the review comments:
///
/// - **File:** `src/main.rs`
///   - **Position:** 1
///   - **Comment:** Please review this file.
///
/// Paths and bodies are inserted verbatim, without Markdown escaping.
pub fn render_comments(comments: &[ReviewComment]) -> String {
    let mut md = String::from(PREAMBLE);
    for comment in comments {
        md.push_str(&format!(
            "- **File:** `{}`\n  - **Position:** {}\n  - **Comment:** {}\n\n",
            comment.path, comment.position, comment.body
        ));
    }
    md
}
