use std::collections::HashMap;

use smallvec::SmallVec;

/// Visibility policy of an optional-content membership dictionary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OcPolicy {
    /// Visible if any listed group is on.
    #[default]
    AnyOn,
    /// Visible if every listed group is on.
    AllOn,
    /// Visible if any listed group is off.
    AnyOff,
    /// Visible if every listed group is off.
    AllOff,
}

/// Boolean visibility expression: `["And" | "Or" | "Not", operand...]` over group ids.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum VisibilityExpr {
    /// Operator name or group id.
    Name(String),
    /// Operator followed by operands.
    List(Vec<VisibilityExpr>),
}

/// Optional-content reference attached to marked content.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum OcDescriptor {
    /// A single optional-content group.
    #[serde(rename = "OCG")]
    Group {
        /// Group id.
        id: String,
    },
    /// A membership dictionary.
    #[serde(rename = "OCMD")]
    Membership {
        /// Member group ids.
        #[serde(default)]
        ids: Vec<String>,
        /// Policy used when no expression is given.
        #[serde(default)]
        policy: Option<OcPolicy>,
        /// Visibility expression, preferred over the policy.
        #[serde(default)]
        expression: Option<VisibilityExpr>,
    },
}

/// On/off state of the document's optional-content groups.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OptionalContentConfig {
    /// Visibility by group id.
    #[serde(default)]
    pub groups: HashMap<String, bool>,
}

impl OptionalContentConfig {
    /// Config with no groups; everything is visible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a group.
    pub fn with_group(mut self, id: impl Into<String>, visible: bool) -> Self {
        self.groups.insert(id.into(), visible);
        self
    }

    /// Toggle a group.
    pub fn set_visibility(&mut self, id: &str, visible: bool) {
        self.groups.insert(id.to_owned(), visible);
    }

    fn lookup(&self, id: &str) -> Option<bool> {
        let v = self.groups.get(id).copied();
        if v.is_none() {
            tracing::warn!(id, "optional content group not found; assuming visible");
        }
        v
    }

    /// Evaluate whether content tagged with `desc` is shown.
    pub fn is_visible(&self, desc: &OcDescriptor) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        match desc {
            OcDescriptor::Group { id } => self.lookup(id).unwrap_or(true),
            OcDescriptor::Membership {
                ids,
                policy,
                expression,
            } => {
                if let Some(expr) = expression {
                    return self.evaluate(expr);
                }
                // (state that decides early, result when no id decided)
                let (decisive, exhausted) = match policy.unwrap_or_default() {
                    OcPolicy::AnyOn => (true, false),
                    OcPolicy::AllOn => (false, true),
                    OcPolicy::AnyOff => (false, false),
                    OcPolicy::AllOff => (true, true),
                };
                for id in ids {
                    match self.lookup(id) {
                        None => return true,
                        Some(v) if v == decisive => return !exhausted,
                        Some(_) => {}
                    }
                }
                exhausted
            }
        }
    }

    fn evaluate(&self, expr: &VisibilityExpr) -> bool {
        let VisibilityExpr::List(items) = expr else {
            return true;
        };
        if items.len() < 2 {
            return true;
        }
        let op = match &items[0] {
            VisibilityExpr::Name(op) => op.as_str(),
            VisibilityExpr::List(_) => return true,
        };
        for operand in &items[1..] {
            let state = match operand {
                VisibilityExpr::List(_) => self.evaluate(operand),
                VisibilityExpr::Name(id) => match self.lookup(id) {
                    Some(v) => v,
                    None => return true,
                },
            };
            match op {
                "And" => {
                    if !state {
                        return false;
                    }
                }
                "Or" => {
                    if state {
                        return true;
                    }
                }
                "Not" => return !state,
                _ => {
                    tracing::warn!(op, "unknown visibility expression operator");
                    return true;
                }
            }
        }
        op == "And"
    }
}

/// Visibility flags of the currently open marked-content sequences.
#[derive(Clone, Debug, Default)]
pub(crate) struct MarkedContentStack {
    flags: SmallVec<[bool; 8]>,
}

impl MarkedContentStack {
    pub(crate) fn push(&mut self, visible: bool) {
        self.flags.push(visible);
    }

    pub(crate) fn pop(&mut self) {
        self.flags.pop();
    }

    /// Content is shown only while every enclosing sequence is visible.
    pub(crate) fn all_visible(&self) -> bool {
        self.flags.iter().all(|&v| v)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/content/optional.rs"]
mod tests;
