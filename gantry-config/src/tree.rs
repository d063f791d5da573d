//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::set::SetLine;
use crate::{set, text, xml};

// Content formats accepted by configuration loads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(EnumAsInner)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigFormat {
    Text,
    Xml,
    SetCommands,
}

// How loaded content combines with the candidate configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Merge,
    Replace,
    Overwrite,
}

// Hierarchical device configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ConfigTree {
    pub(crate) root: ConfigNode,
}

// One configuration statement: an optional leaf value plus named children.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ConfigNode {
    pub(crate) value: Option<String>,
    pub(crate) children: BTreeMap<String, ConfigNode>,
}

// ===== impl ConfigFormat =====

impl ConfigFormat {
    // Checks that the content is structurally plausible for this format.
    //
    // The check is a cheap shape test performed before parsing so that a
    // mislabeled payload fails with `FormatMismatch` instead of a confusing
    // parse error deep inside the wrong parser.
    pub fn check(&self, content: &str) -> Result<(), Error> {
        let looks_like_xml = content.trim_start().starts_with('<');
        let looks_like_set = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .all(|line| {
                let mut words = line.split_whitespace();
                matches!(words.next(), Some("set") | Some("delete"))
            });

        let matches = match self {
            ConfigFormat::Xml => looks_like_xml,
            ConfigFormat::SetCommands => !looks_like_xml && looks_like_set,
            ConfigFormat::Text => !looks_like_xml && !looks_like_set,
        };
        if matches {
            Ok(())
        } else {
            Err(Error::FormatMismatch(*self))
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Text => write!(f, "text"),
            ConfigFormat::Xml => write!(f, "xml"),
            ConfigFormat::SetCommands => write!(f, "set"),
        }
    }
}

// ===== impl ConfigTree =====

impl ConfigTree {
    pub fn new() -> ConfigTree {
        ConfigTree::default()
    }

    // Parses a complete configuration in the given format. Set-command
    // content is applied line by line starting from an empty tree.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<ConfigTree, Error> {
        format.check(content)?;
        match format {
            ConfigFormat::Text => text::parse(content),
            ConfigFormat::Xml => xml::parse(content),
            ConfigFormat::SetCommands => {
                let mut tree = ConfigTree::new();
                tree.apply_set(content)?;
                Ok(tree)
            }
        }
    }

    // Loads content into this tree under the given merge policy.
    //
    // The tree is only modified if the whole load succeeds: parsing happens
    // up front and application of the parsed result cannot fail.
    pub fn load(
        &mut self,
        content: &str,
        format: ConfigFormat,
        policy: MergePolicy,
    ) -> Result<(), Error> {
        format.check(content)?;

        if format.is_set_commands() {
            // Set lines mutate the tree in place; only plain merges make
            // sense for them.
            if policy != MergePolicy::Merge {
                return Err(Error::PolicyConflict(format, policy));
            }
            return self.apply_set(content);
        }

        let loaded = match format {
            ConfigFormat::Text => text::parse(content)?,
            ConfigFormat::Xml => xml::parse(content)?,
            ConfigFormat::SetCommands => unreachable!(),
        };
        match policy {
            MergePolicy::Merge => self.merge(&loaded),
            MergePolicy::Replace => self.replace(&loaded),
            MergePolicy::Overwrite => *self = loaded,
        }
        Ok(())
    }

    // Recursive union; leaf values from `other` win.
    pub fn merge(&mut self, other: &ConfigTree) {
        self.root.merge(&other.root);
    }

    // Each top-level statement present in `other` replaces the
    // corresponding subtree wholesale.
    pub fn replace(&mut self, other: &ConfigTree) {
        for (name, node) in &other.root.children {
            self.root.children.insert(name.clone(), node.clone());
        }
    }

    // Applies set/delete lines in order. All lines are parsed before any
    // of them is applied, so a malformed payload leaves the tree untouched.
    pub fn apply_set(&mut self, content: &str) -> Result<(), Error> {
        let lines = set::parse_lines(content)?;
        for line in &lines {
            self.root.apply_set_line(line);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.root.value.is_none() && self.root.children.is_empty()
    }

    // Resolves a statement path to its node.
    pub fn find(&self, path: &[&str]) -> Option<&ConfigNode> {
        let mut node = &self.root;
        for word in path {
            node = node.children.get(*word)?;
        }
        Some(node)
    }

    // Convenience lookup for a leaf value.
    pub fn leaf_value(&self, path: &[&str]) -> Option<&str> {
        self.find(path).and_then(|node| node.value.as_deref())
    }

    // Canonical hierarchical text rendering. Children render in
    // deterministic (lexicographic) order, which makes the output stable
    // under parse/render round trips and suitable for line diffs.
    pub fn to_text(&self) -> String {
        text::render(self)
    }

    pub fn to_xml(&self) -> String {
        xml::render(self)
    }
}

// ===== impl ConfigNode =====

impl ConfigNode {
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.children
            .iter()
            .map(|(name, node)| (name.as_str(), node))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn merge(&mut self, other: &ConfigNode) {
        if other.value.is_some() {
            self.value = other.value.clone();
        }
        for (name, node) in &other.children {
            self.children.entry(name.clone()).or_default().merge(node);
        }
    }

    // Applies one set/delete line.
    //
    // Without a schema the tree cannot know which statements are
    // single-valued, so application is context sensitive: when the walk
    // reaches an existing leaf-with-value, the remaining words replace
    // that value (last-applied-wins); otherwise the words extend the
    // hierarchy as presence nodes.
    fn apply_set_line(&mut self, line: &SetLine) {
        match line {
            SetLine::Set(words) => {
                let mut node = self;
                let mut idx = 0;
                while idx < words.len() {
                    let word = &words[idx];
                    if idx + 1 < words.len()
                        && let Some(child) = node.children.get(word)
                        && child.value.is_some()
                        && child.children.is_empty()
                    {
                        let value = words[idx + 1..].join(" ");
                        node.children.get_mut(word).unwrap().value = Some(value);
                        return;
                    }
                    node = node.children.entry(word.clone()).or_default();
                    idx += 1;
                }
            }
            SetLine::Delete(words) => {
                self.delete_path(words);
            }
        }
    }

    // Removes the addressed subtree; absent paths are a no-op. A trailing
    // word matching a leaf value ("delete system host-name R1") also
    // removes the leaf.
    fn delete_path(&mut self, words: &[String]) {
        let Some((last, parents)) = words.split_last() else {
            return;
        };
        let mut node = self;
        for word in parents {
            match node.children.get_mut(word) {
                Some(child) => node = child,
                None => return,
            }
        }
        if node.children.remove(last).is_none()
            && node.value.as_deref() == Some(last.as_str())
        {
            node.value = None;
        }
    }
}

// ===== unit tests =====
