//! Small accessors shared by the section parsers.
//!
//! Settings are written as child nodes with a single positional argument,
//! e.g. `listen "127.0.0.1:8080"` inside a `server { }` block.

use kdl::{KdlNode, KdlValue};

/// Find the child node `name` inside `node`'s block
fn child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|n| n.name().value() == name)
}

/// First positional argument of a node
fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

/// First positional argument as a string
pub fn get_first_arg_string(node: &KdlNode) -> Option<String> {
    first_arg(node)?.as_string().map(str::to_string)
}

/// String value of child setting `name`
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    child(node, name).and_then(get_first_arg_string)
}

/// Integer value of child setting `name`
pub fn get_int_entry(node: &KdlNode, name: &str) -> Option<i128> {
    child(node, name).and_then(|n| first_arg(n)?.as_integer())
}

/// Boolean value of child setting `name`
pub fn get_bool_entry(node: &KdlNode, name: &str) -> Option<bool> {
    child(node, name).and_then(|n| first_arg(n)?.as_bool())
}

/// All positional string arguments of child setting `name`
pub fn get_string_args(node: &KdlNode, name: &str) -> Vec<String> {
    child(node, name)
        .map(|n| {
            n.entries()
                .iter()
                .filter(|e| e.name().is_none())
                .filter_map(|e| e.value().as_string().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Non-negative integer setting, rejecting negative values
pub fn get_u64_entry(node: &KdlNode, name: &str) -> anyhow::Result<Option<u64>> {
    match get_int_entry(node, name) {
        None => Ok(None),
        Some(v) => u64::try_from(v)
            .map(Some)
            .map_err(|_| anyhow::anyhow!("'{}' must be a non-negative integer, got {}", name, v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdl::KdlDocument;

    fn block(text: &str) -> KdlNode {
        let doc: KdlDocument = text.parse().unwrap();
        doc.nodes()[0].clone()
    }

    #[test]
    fn test_entry_accessors() {
        let node = block(
            r#"
            server {
                listen "0.0.0.0:9000"
                request-timeout-secs 5
                verbose #true
                trusted-proxies "10.0.0.1" "10.0.0.2"
            }
            "#,
        );

        assert_eq!(get_string_entry(&node, "listen").as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(get_int_entry(&node, "request-timeout-secs"), Some(5));
        assert_eq!(get_bool_entry(&node, "verbose"), Some(true));
        assert_eq!(get_string_args(&node, "trusted-proxies"), vec!["10.0.0.1", "10.0.0.2"]);
        assert!(get_string_entry(&node, "missing").is_none());
        assert!(get_string_args(&node, "missing").is_empty());
    }

    #[test]
    fn test_negative_integer_rejected() {
        let node = block("auth { pull-interval-secs -5 }");
        assert!(get_u64_entry(&node, "pull-interval-secs").is_err());
        assert_eq!(get_u64_entry(&node, "other").unwrap(), None);
    }

    #[test]
    fn test_first_arg_string() {
        let node = block(r#"storage "primary" { }"#);
        assert_eq!(get_first_arg_string(&node).as_deref(), Some("primary"));
    }
}
