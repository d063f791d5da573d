//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use xml::ParserConfig;
use xml::reader::XmlEvent;

use crate::error::{Error, ParseError};
use crate::tree::{ConfigNode, ConfigTree};

const INDENT: usize = 4;

// ===== parsing =====

// Parses an XML configuration document. The document element is a wrapper
// (conventionally <configuration>) whose name is not part of the tree;
// its children are the top-level statements. Repeated sibling elements
// merge into one subtree.
pub(crate) fn parse(content: &str) -> Result<ConfigTree, Error> {
    let reader = ParserConfig::new()
        .trim_whitespace(true)
        .create_reader(content.as_bytes());

    let mut tree = ConfigTree::new();
    let mut stack: Vec<(String, ConfigNode)> = Vec::new();
    let mut seen_root = false;

    for event in reader {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => {
                if seen_root && stack.is_empty() {
                    return Err(ParseError::new(
                        None,
                        "multiple document elements",
                    )
                    .into());
                }
                seen_root = true;
                stack.push((name.local_name, ConfigNode::default()));
            }
            Ok(XmlEvent::Characters(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some((_, node)) = stack.last_mut() {
                    node.value = Some(text.to_owned());
                }
            }
            Ok(XmlEvent::EndElement { .. }) => {
                let Some((name, node)) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some((_, parent)) => {
                        parent.children.entry(name).or_default().merge(&node);
                    }
                    // The wrapper element closed; its children become the
                    // top of the tree.
                    None => tree.root = node,
                }
            }
            Ok(_) => (),
            Err(error) => {
                return Err(
                    ParseError::new(None, error.to_string()).into()
                );
            }
        }
    }

    if !seen_root {
        return Err(ParseError::new(None, "empty document").into());
    }
    Ok(tree)
}

// ===== rendering =====

pub(crate) fn render(tree: &ConfigTree) -> String {
    let mut out = String::from("<configuration>\n");
    render_children(&tree.root, 1, &mut out);
    out.push_str("</configuration>\n");
    out
}

fn render_children(node: &ConfigNode, depth: usize, out: &mut String) {
    let pad = " ".repeat(depth * INDENT);
    for (name, child) in &node.children {
        if child.children.is_empty() {
            match &child.value {
                Some(value) => out.push_str(&format!(
                    "{}<{}>{}</{}>\n",
                    pad,
                    name,
                    escape(value),
                    name
                )),
                None => out.push_str(&format!("{}<{}/>\n", pad, name)),
            }
        } else {
            out.push_str(&format!("{}<{}>\n", pad, name));
            render_children(child, depth + 1, out);
            out.push_str(&format!("{}</{}>\n", pad, name));
        }
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use crate::tree::{ConfigFormat, ConfigTree};

    const CONFIG: &str = "\
<configuration>
    <system>
        <host-name>gx1</host-name>
        <services>
            <ssh/>
        </services>
    </system>
</configuration>
";

    #[test]
    fn parse_and_lookup() {
        let tree = ConfigTree::parse(CONFIG, ConfigFormat::Xml).unwrap();
        assert_eq!(tree.leaf_value(&["system", "host-name"]), Some("gx1"));
        assert!(tree.find(&["system", "services", "ssh"]).is_some());
    }

    #[test]
    fn render_round_trip() {
        let tree = ConfigTree::parse(CONFIG, ConfigFormat::Xml).unwrap();
        let rendered = tree.to_xml();
        let reparsed = ConfigTree::parse(&rendered, ConfigFormat::Xml).unwrap();
        assert_eq!(tree, reparsed);
    }

    #[test]
    fn xml_and_text_agree() {
        let text_tree = ConfigTree::parse(
            "system {\n    host-name gx1;\n    services {\n        ssh;\n    }\n}\n",
            ConfigFormat::Text,
        )
        .unwrap();
        let xml_tree = ConfigTree::parse(CONFIG, ConfigFormat::Xml).unwrap();
        assert_eq!(text_tree, xml_tree);
    }

    #[test]
    fn repeated_siblings_merge() {
        let tree = ConfigTree::parse(
            "<configuration><system><host-name>gx1</host-name></system>\
             <system><location>lab-2</location></system></configuration>",
            ConfigFormat::Xml,
        )
        .unwrap();
        assert_eq!(tree.leaf_value(&["system", "host-name"]), Some("gx1"));
        assert_eq!(tree.leaf_value(&["system", "location"]), Some("lab-2"));
    }

    #[test]
    fn malformed_document_fails() {
        assert!(
            ConfigTree::parse("<configuration><system>", ConfigFormat::Xml)
                .is_err()
        );
    }
}
