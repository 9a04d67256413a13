use colored::{ColoredString, Colorize};
use declarative::{Declaration, RealizeResult};
use serde_json::Value;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Stack rendering
// ============================================================================

/// Last segment of a type token (`aws:s3/bucket:Bucket` -> `Bucket`)
pub fn short_kind(kind: &str) -> &str {
    kind.rsplit(':').next().unwrap_or(kind)
}

/// Icon for a node result
pub fn result_icon(result: &RealizeResult) -> ColoredString {
    match result {
        RealizeResult::Created => "✓".green(),
        RealizeResult::Failed { .. } => "✗".red(),
        RealizeResult::Skipped { .. } => "○".yellow(),
    }
}

/// One line of the declaration tree
pub fn declaration_line(decl: &Declaration) -> String {
    let indent = "  ".repeat(decl.depth + 1);
    let marker = if decl.component { "◆" } else { "+" };
    let mut line = format!("{indent}{} {} {}", marker, decl.identity, short_kind(&decl.kind));
    if let Some(provider) = &decl.provider {
        line.push_str(&format!(" → {provider}"));
    }
    line
}

/// Render an output value on one line
///
/// Strings print bare; multi-line strings only show their first line.
pub fn output_value(value: &Value) -> String {
    match value {
        Value::String(s) => match s.lines().count() {
            0 | 1 => s.clone(),
            n => format!("{} … ({n} lines)", s.lines().next().unwrap_or_default()),
        },
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_kind() {
        assert_eq!(short_kind("aws:s3/bucket:Bucket"), "Bucket");
        assert_eq!(short_kind("pulumi:providers:kubernetes"), "kubernetes");
        assert_eq!(short_kind("plain"), "plain");
    }

    #[test]
    fn test_output_value_shortens_documents() {
        assert_eq!(output_value(&json!("charts")), "charts");
        assert_eq!(output_value(&json!(3)), "3");
        assert_eq!(
            output_value(&json!("apiVersion: v1\nkind: Config\n")),
            "apiVersion: v1 … (2 lines)"
        );
    }

    #[test]
    fn test_declaration_line() {
        let decl = Declaration {
            identity: "demo-cluster".into(),
            kind: "eks:index:Cluster".into(),
            path: "demo/demo-cluster".into(),
            depth: 1,
            provider: None,
            deferred_inputs: vec![],
            literal_inputs: vec![],
            component: false,
        };
        assert_eq!(declaration_line(&decl), "    + demo-cluster Cluster");
    }
}
