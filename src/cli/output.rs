//! CLI output: node listing and attribute presentation.

use colored::Colorize;

use crate::tree::Node;
use crate::value::Value;

/// Node name only, one per line.
pub fn format_node_brief(node: &Node) -> String {
    format!("{}\n", node.name.red())
}

/// Node name followed by its attributes, sorted and indented values.
pub fn format_node_full(node: &Node) -> String {
    let mut output = node.name.red().to_string();
    if node.data.is_empty() {
        output.push('\n');
        return output;
    }
    let mut keys: Vec<&String> = node.data.keys().collect();
    keys.sort();
    for key in keys {
        let value = &node.data[key.as_str()];
        output.push('\n');
        output.push_str(&format!("{}: ", key.green()));
        output.push_str(&format_value(value));
    }
    output.push('\n');
    output
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim_end_matches('\n').to_string(),
        Value::List(items) if items.iter().all(|item| matches!(item, Value::String(_))) => {
            let texts: Vec<String> = items.iter().map(Value::to_display_string).collect();
            join_human(&texts)
        }
        other => other.to_display_string(),
    }
}

/// Source files of a node, used in debug mode.
pub fn format_sources(node: &Node) -> String {
    let mut output = String::new();
    for source in &node.sources {
        output.push_str(&format!("{}\n", source.display().to_string().blue()));
    }
    output
}

/// Result summary: `0 objects`, `1 object`, `3 objects`.
pub fn listed(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

/// Join items into a human readable list: `a, b and c`.
fn join_human(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        _ => format!(
            "{} and {}",
            items[..items.len() - 1].join(", "),
            items[items.len() - 1]
        ),
    }
}
