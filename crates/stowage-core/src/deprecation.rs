//! Deprecated field reconciliation
//!
//! A rule names a deprecated field, how to read it and optionally how to move
//! its value onto the replacement. Moving never overwrites: if both sides are
//! set the rule reports a conflict and loading stops.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Reads the deprecated field, `None` when not in use
pub type Selector<C> = fn(&C) -> Option<JsonValue>;

/// Moves the deprecated value onto its replacement
pub type MapValue<C> = fn(&mut C) -> std::result::Result<(), String>;

pub struct DeprecatedField<C> {
    /// Dotted path of the deprecated field, used as the warning key
    pub key: &'static str,
    pub selector: Selector<C>,
    pub map_value: Option<MapValue<C>>,
}

/// Outcome of reconciling one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeprecationReport {
    /// Deprecated fields in use and their raw values
    pub warnings: BTreeMap<String, JsonValue>,
    pub conflicts: Vec<String>,
}

impl DeprecationReport {
    /// Fail on conflicts, otherwise hand back the warnings
    pub fn into_result(self) -> Result<BTreeMap<String, JsonValue>> {
        if self.conflicts.is_empty() {
            Ok(self.warnings)
        } else {
            Err(CoreError::DeprecationConflict {
                conflicts: self.conflicts,
            })
        }
    }
}

/// Apply every rule to `cfg`, collecting all warnings and conflicts
pub fn reconcile<C>(cfg: &mut C, rules: &[DeprecatedField<C>]) -> DeprecationReport {
    let mut report = DeprecationReport::default();

    for rule in rules {
        let Some(value) = (rule.selector)(cfg) else {
            continue;
        };
        report.warnings.insert(rule.key.to_string(), value);

        if let Some(map_value) = rule.map_value {
            if let Err(err) = map_value(cfg) {
                report.conflicts.push(format!("{}: {}", rule.key, err));
            }
        }
    }

    report
}
