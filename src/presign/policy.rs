//! CloudFront custom policy document.
//!
//! Field names and nesting are fixed by the CloudFront verifier:
//!
//! ```text
//! {"Statement":[{"Resource":"<url>/*","Condition":{"DateLessThan":{"AWS:EpochTime":<secs>}}}]}
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "Condition")]
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "DateLessThan")]
    pub date_less_than: EpochTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTime {
    #[serde(rename = "AWS:EpochTime")]
    pub epoch_time: i64,
}

impl Policy {
    /// A single-statement policy granting `resource` until `expires_epoch`.
    pub fn new(resource: String, expires_epoch: i64) -> Self {
        Self {
            statement: vec![Statement {
                resource,
                condition: Condition {
                    date_less_than: EpochTime {
                        epoch_time: expires_epoch,
                    },
                },
            }],
        }
    }

    /// Compact JSON with fields in declaration order. These are the exact
    /// bytes that get signed and then encoded into the policy cookie.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_shape() {
        let policy = Policy::new("https://app.example/private/*".into(), 1_700_000_000);
        let bytes = policy.to_canonical_bytes().unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"Statement":[{"Resource":"https://app.example/private/*","Condition":{"DateLessThan":{"AWS:EpochTime":1700000000}}}]}"#
        );
    }

    #[test]
    fn test_deterministic() {
        let a = Policy::new("https://a/*".into(), 42).to_canonical_bytes().unwrap();
        let b = Policy::new("https://a/*".into(), 42).to_canonical_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_back() {
        let policy = Policy::new("https://a/b/*".into(), 7);
        let bytes = policy.to_canonical_bytes().unwrap();
        let parsed: Policy = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, policy);
        assert_eq!(parsed.statement.len(), 1);
    }
}
