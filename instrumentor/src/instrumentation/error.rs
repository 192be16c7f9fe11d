use std::fmt;

use snafu::Snafu;

/// How an existing environment variable binding obtains its value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvSource {
    /// A literal `value`.
    Value,
    /// A reference through `valueFrom` (secret, config map, downward API).
    ValueFrom,
}

impl fmt::Display for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("Value"),
            Self::ValueFrom => f.write_str("ValueFrom"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("the container defines env var value via {via}, envVar: {name}"))]
    ConflictingEnvVar { name: String, via: EnvSource },

    #[snafu(display(
        "annotation {annotation} contains invalid container names '{value}', only \
         [A-Za-z0-9,-] is allowed"
    ))]
    InvalidContainerNames { annotation: String, value: String },

    #[snafu(display("duplicated container names detected: [{}]", names.join(" ")))]
    DuplicatedContainerNames { names: Vec<String> },

    #[snafu(display(
        "incorrect instrumentation configuration - please provide container names for all \
         instrumentations"
    ))]
    MissingContainerNames,
}
