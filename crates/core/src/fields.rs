// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Field projection for pipe rows.
//!
//! A pipe may declare a `fields_mapping`; rows are then projected to the
//! declared target fields only. An empty mapping is a transparent
//! pass-through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One `from → to` projection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub from: String,
    pub to: String,
}

/// Ordered set of projection rules applied to every row of a pipe.
///
/// Invariants: with no rules the output is identical to the input; with
/// rules the output keys are a subset of the declared `to` names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    rules: Vec<FieldRule>,
}

impl FieldMapping {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn is_passthrough(&self) -> bool {
        self.rules.is_empty()
    }

    /// Project a row. Source fields absent from the row are simply not
    /// emitted; nothing is invented.
    pub fn project(&self, row: Map<String, Value>) -> Map<String, Value> {
        if self.is_passthrough() {
            return row;
        }
        let mut out = Map::with_capacity(self.rules.len());
        for rule in &self.rules {
            if let Some(v) = row.get(&rule.from) {
                out.insert(rule.to.clone(), v.clone());
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod tests;
