//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use itertools::{EitherOrBoth, Itertools};
use similar::{DiffOp, TextDiff};

use crate::tree::ConfigTree;

// One line-level configuration change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiffEntry {
    Added(String),
    Removed(String),
    Modified { old: String, new: String },
}

// Ordered line-level changes between two configurations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigDiff {
    entries: Vec<DiffEntry>,
}

// ===== impl ConfigDiff =====

impl ConfigDiff {
    // Computes the change sequence that turns `old` into `new`, over the
    // canonical text rendering of both trees.
    pub fn compute(old: &ConfigTree, new: &ConfigTree) -> ConfigDiff {
        let old_text = old.to_text();
        let new_text = new.to_text();
        let old_lines: Vec<&str> = old_text.lines().collect();
        let new_lines: Vec<&str> = new_text.lines().collect();

        let mut entries = Vec::new();
        let diff = TextDiff::from_lines(old_text.as_str(), new_text.as_str());
        for op in diff.ops() {
            match *op {
                DiffOp::Equal { .. } => (),
                DiffOp::Delete {
                    old_index, old_len, ..
                } => {
                    for line in &old_lines[old_index..old_index + old_len] {
                        entries.push(DiffEntry::Removed((*line).to_owned()));
                    }
                }
                DiffOp::Insert {
                    new_index, new_len, ..
                } => {
                    for line in &new_lines[new_index..new_index + new_len] {
                        entries.push(DiffEntry::Added((*line).to_owned()));
                    }
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    let removed = &old_lines[old_index..old_index + old_len];
                    let added = &new_lines[new_index..new_index + new_len];
                    for pair in removed.iter().zip_longest(added.iter()) {
                        entries.push(match pair {
                            EitherOrBoth::Both(old, new) => {
                                DiffEntry::Modified {
                                    old: (*old).to_owned(),
                                    new: (*new).to_owned(),
                                }
                            }
                            EitherOrBoth::Left(old) => {
                                DiffEntry::Removed((*old).to_owned())
                            }
                            EitherOrBoth::Right(new) => {
                                DiffEntry::Added((*new).to_owned())
                            }
                        });
                    }
                }
            }
        }

        ConfigDiff { entries }
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            match entry {
                DiffEntry::Added(line) => writeln!(f, "+ {}", line)?,
                DiffEntry::Removed(line) => writeln!(f, "- {}", line)?,
                DiffEntry::Modified { old, new } => {
                    writeln!(f, "- {}", old)?;
                    writeln!(f, "+ {}", new)?;
                }
            }
        }
        Ok(())
    }
}

// ===== unit tests =====
