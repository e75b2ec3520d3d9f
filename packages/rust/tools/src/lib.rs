//! Static analysis of Python code candidates: syntax validation and
//! cyclomatic complexity, both over a tree-sitter parse.

mod complexity;
mod validator;

pub use complexity::PythonComplexity;
pub use validator::PythonValidator;

use tree_sitter::{Parser, Tree};

/// Parse Python source. `None` only when the grammar cannot be loaded.
pub(crate) fn parse_python(code: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        tracing::error!(error = %e, "failed to load the Python grammar");
        return None;
    }
    parser.parse(code, None)
}
