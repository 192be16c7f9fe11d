use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// What the mutator does when an injector rejects a container.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Serialize, PartialEq)]
pub enum FailurePolicy {
    /// Stop at the first failing injection and report it.
    #[default]
    Reject,

    /// Log the failure and carry on with the pod as it was before the failing
    /// injection.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            Self::Reject => "Reject",
            Self::Skip => "Skip",
        };
        f.write_str(val)
    }
}

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            _ => Err(ParseFailurePolicyError::Invalid { value: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseFailurePolicyError {
    #[snafu(display("'{value}' is not a valid FailurePolicy"))]
    Invalid { value: String },
}
