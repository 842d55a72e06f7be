// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record classification against a compiled rule set.

use serde::Serialize;
use tracing::debug;

use crate::dataset::Record;

use super::rule_set::CompiledRules;

/// Path segment used when no rule accepts a record.
pub const UNASSIGNED: &str = "Unassigned";

/// Result of classifying one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Target group path, always terminated by the record's own kind
    pub path: Vec<String>,
    /// False when no rule matched and the record fell into `Unassigned`
    pub assigned: bool,
}

/// A record no rule accepted; kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnassignedRecord {
    pub kind: String,
    pub label: String,
}

impl std::fmt::Display for UnassignedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.kind, self.label)
    }
}

/// Assigns a group path to records using a compiled rule list.
///
/// Stateless apart from the borrowed rules: classification depends only on
/// rule order and record content.
#[derive(Debug, Clone, Copy)]
pub struct GroupClassifier<'r> {
    rules: &'r CompiledRules,
}

impl<'r> GroupClassifier<'r> {
    pub fn new(rules: &'r CompiledRules) -> Self {
        Self { rules }
    }

    /// Classify a record: first matching rule's target, plus the record kind.
    pub fn classify(&self, record: &Record) -> Classification {
        let (mut path, assigned) = match self.rules.first_match(&record.kind, &record.label) {
            Some(rule) => (rule.target.clone(), true),
            None => {
                debug!(kind = %record.kind, label = %record.label, "No rule matches record");
                (vec![UNASSIGNED.to_string()], false)
            }
        };
        path.push(record.kind.clone());
        Classification { path, assigned }
    }

    /// Every record no rule accepts, in input order.
    pub fn unassigned<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Vec<UnassignedRecord> {
        records
            .into_iter()
            .filter(|r| self.rules.first_match(&r.kind, &r.label).is_none())
            .map(|r| UnassignedRecord {
                kind: r.kind.clone(),
                label: r.label.clone(),
            })
            .collect()
    }
}
