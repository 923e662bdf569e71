//! Extraction of assumable role ARNs from IAM policy documents.
//!
//! IAM is loose about JSON shapes: `Statement` may be a single object or a
//! list of objects, and `Action`/`Resource` may each be a string or a list of
//! strings. Both ambiguities are resolved here into plain vectors; nothing
//! past this module sees the raw shapes.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    constants::ASSUME_ROLE_ACTION,
    error::{Error, Result},
};

/// A JSON value that is either a single `T` or a list of them.
/// `Many` is tried first so that `OneOrMany<Value>` still splits arrays.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(rename = "Statement")]
    statement: OneOrMany<Value>,
}

/// One statement with its fields normalized to lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub effect: String,
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Normalize a raw statement object.
    ///
    /// Fails with [`Error::MalformedPolicyStatement`] naming the first missing field.
    fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::MalformedPolicyStatement("not an object"));
        }

        let actions = string_list(value.get("Action"))
            .ok_or(Error::MalformedPolicyStatement("missing Action"))?;
        let effect = value
            .get("Effect")
            .and_then(Value::as_str)
            .ok_or(Error::MalformedPolicyStatement("missing Effect"))?
            .to_string();
        let resources = string_list(value.get("Resource"))
            .ok_or(Error::MalformedPolicyStatement("missing Resource"))?;

        Ok(Self {
            actions,
            effect,
            resources,
        })
    }

    /// Only `Allow` statements naming `sts:AssumeRole` grant role assumption.
    pub fn allows_assume_role(&self) -> bool {
        self.effect == "Allow" && self.actions.iter().any(|a| a == ASSUME_ROLE_ACTION)
    }
}

/// Read a string-or-list field. An explicit `null` counts as missing;
/// non-string list items are dropped with a warning.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let value = value.filter(|v| !v.is_null())?;
    let items = OneOrMany::<Value>::deserialize(value).ok()?.into_vec();

    let strings = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            other => {
                warn!("Ignoring non-string policy value: {}", other);
                None
            }
        })
        .collect();
    Some(strings)
}

/// Parse a policy document into the role ARNs it allows assuming.
///
/// Malformed statements are skipped; the document as a whole must be valid
/// JSON with a `Statement` member.
pub fn parse(document: &str) -> Result<Vec<String>> {
    let doc: PolicyDocument = serde_json::from_str(document)
        .map_err(|e| Error::MalformedPolicyDocument(e.to_string()))?;

    let mut role_arns = Vec::new();
    for raw in doc.statement.into_vec() {
        let statement = match PolicyStatement::from_value(&raw) {
            Ok(statement) => statement,
            Err(e) => {
                warn!("Skipping policy statement: {e}");
                continue;
            }
        };

        if statement.allows_assume_role() {
            role_arns.extend(statement.resources);
        }
    }

    debug!("Roles parsed from policy document: {:?}", role_arns);
    Ok(role_arns)
}
