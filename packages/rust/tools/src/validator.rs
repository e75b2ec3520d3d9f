use explainer_shared::{CodeValidationResult, CodeValidator};
use tree_sitter::Node;
use tracing::debug;

use crate::parse_python;

/// Syntax-only validation of Python source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonValidator;

impl CodeValidator for PythonValidator {
    fn validate(&self, code: &str) -> CodeValidationResult {
        if code.trim().is_empty() {
            return CodeValidationResult::invalid("Empty code", None, None);
        }
        let Some(tree) = parse_python(code) else {
            return CodeValidationResult::invalid("Python parser unavailable", None, None);
        };

        let root = tree.root_node();
        if !root.has_error() {
            return CodeValidationResult::ok();
        }

        let Some(node) = first_error(root) else {
            return CodeValidationResult::invalid("invalid syntax", None, None);
        };
        let pos = node.start_position();
        let (line, column) = (pos.row + 1, pos.column + 1);
        let error = if node.is_missing() {
            format!("invalid syntax: missing '{}' (line {line})", node.kind())
        } else {
            format!("invalid syntax (line {line})")
        };
        debug!(line, column, "syntax error found");
        CodeValidationResult::invalid(error, Some(line), Some(column))
    }
}

/// First ERROR or MISSING node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
