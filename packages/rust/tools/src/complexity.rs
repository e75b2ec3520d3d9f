use explainer_shared::{ComplexityAnalyzer, ComplexityBlock, ComplexityResult};
use tree_sitter::Node;

use crate::parse_python;

/// Node kinds that add one independent path through a function.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "for_in_clause",
    "if_clause",
    "case_clause",
];

/// Per-function cyclomatic complexity for Python source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonComplexity;

impl ComplexityAnalyzer for PythonComplexity {
    fn analyze(&self, code: &str) -> ComplexityResult {
        if code.trim().is_empty() {
            return summarize(Vec::new());
        }
        let Some(tree) = parse_python(code) else {
            return ComplexityResult {
                available: Some(false),
                error: Some("Python parser unavailable".into()),
                ..ComplexityResult::default()
            };
        };

        let mut blocks = Vec::new();
        collect_blocks(tree.root_node(), code.as_bytes(), None, &mut blocks);
        summarize(blocks)
    }
}

fn summarize(blocks: Vec<ComplexityBlock>) -> ComplexityResult {
    let max = blocks.iter().map(|b| b.complexity).max().unwrap_or(0);
    let avg = if blocks.is_empty() {
        0.0
    } else {
        blocks.iter().map(|b| f64::from(b.complexity)).sum::<f64>() / blocks.len() as f64
    };
    ComplexityResult {
        available: Some(true),
        avg_complexity: Some(avg),
        max_complexity: Some(max),
        blocks,
        error: None,
    }
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let kids: Vec<Node<'_>> = node.children(&mut cursor).collect();
    kids
}

fn name_of(node: Node<'_>, src: &[u8]) -> String {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(src).ok())
        .unwrap_or("<anonymous>")
        .to_string()
}

/// Walk definitions in document order. Methods are named `Class.method`;
/// functions nested in functions are their own unqualified blocks.
fn collect_blocks(node: Node<'_>, src: &[u8], class: Option<&str>, out: &mut Vec<ComplexityBlock>) {
    match node.kind() {
        "function_definition" => {
            let name = name_of(node, src);
            out.push(ComplexityBlock {
                name: class.map_or_else(|| name.clone(), |c| format!("{c}.{name}")),
                complexity: 1 + count_decisions(node),
                line: node.start_position().row + 1,
            });
            for child in children(node) {
                collect_blocks(child, src, None, out);
            }
        }
        "class_definition" => {
            let name = name_of(node, src);
            let qualified = class.map_or_else(|| name.clone(), |c| format!("{c}.{name}"));
            for child in children(node) {
                collect_blocks(child, src, Some(&qualified), out);
            }
        }
        _ => {
            for child in children(node) {
                collect_blocks(child, src, class, out);
            }
        }
    }
}

/// Decision points under `node`, stopping at nested definitions.
fn count_decisions(node: Node<'_>) -> u32 {
    children(node)
        .into_iter()
        .filter(|c| !matches!(c.kind(), "function_definition" | "class_definition"))
        .map(|c| u32::from(DECISION_KINDS.contains(&c.kind())) + count_decisions(c))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
def simple():
    return 1

def branchy(x):
    if x > 0 and x < 10:
        return [i for i in range(x) if i % 2]
    elif x == 0:
        return 0
    for _ in range(3):
        pass
    try:
        pass
    except ValueError:
        pass
    return 1 if x else 2

class Service:
    def handle(self, y):
        while y:
            y -= 1
        def inner():
            return None
        return inner
";

    fn block(name: &str, complexity: u32, line: usize) -> ComplexityBlock {
        ComplexityBlock {
            name: name.into(),
            complexity,
            line,
        }
    }

    #[test]
    fn per_function_complexity() {
        let result = PythonComplexity.analyze(SAMPLE);
        assert_eq!(
            result.blocks,
            vec![
                block("simple", 1, 1),
                block("branchy", 9, 4),
                block("Service.handle", 2, 18),
                block("inner", 1, 21),
            ]
        );
        assert_eq!(result.max_complexity, Some(9));
        assert_eq!(result.avg_complexity, Some(3.25));
        assert_eq!(result.available, Some(true));
        result.validate().expect("valid contract");
    }

    #[test]
    fn blank_and_function_free_code() {
        for code in ["", "   ", "x = 1\nprint(x)\n"] {
            let result = PythonComplexity.analyze(code);
            assert_eq!(result.available, Some(true));
            assert_eq!(result.avg_complexity, Some(0.0));
            assert_eq!(result.max_complexity, Some(0));
            assert!(result.blocks.is_empty());
        }
    }

    #[test]
    fn decorated_async_functions_are_found() {
        let result = PythonComplexity.analyze(concat!(
            "@app.websocket(\"/ws\")\nasync def ws(websocket):\n",
            "    while True:\n        await websocket.receive_text()\n",
        ));
        assert_eq!(result.blocks, vec![block("ws", 2, 2)]);
    }
}
