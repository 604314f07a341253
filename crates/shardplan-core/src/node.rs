//! Node identity: which slot of the CI fan-out this process is.
//!
//! Explicit values win. Otherwise the identity is read from the variables
//! CI providers export for parallel jobs:
//!
//! | Provider  | Index variable           | Total variable                 | Base |
//! |-----------|--------------------------|--------------------------------|------|
//! | CircleCI  | `CIRCLE_NODE_INDEX`      | `CIRCLE_NODE_TOTAL`            | 0    |
//! | Buildkite | `BUILDKITE_PARALLEL_JOB` | `BUILDKITE_PARALLEL_JOB_COUNT` | 0    |
//! | GitLab CI | `CI_NODE_INDEX`          | `CI_NODE_TOTAL`                | 1    |

use serde::Serialize;
use tracing::debug;

use crate::error::ConfigMismatch;

/// Zero-based node index and total node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeIdentity {
    pub index: u32,
    pub total: u32,
    /// Where the identity came from.
    pub source: &'static str,
}

struct Provider {
    name: &'static str,
    index_var: &'static str,
    total_var: &'static str,
    one_based: bool,
}

const PROVIDERS: &[Provider] = &[
    Provider {
        name: "circleci",
        index_var: "CIRCLE_NODE_INDEX",
        total_var: "CIRCLE_NODE_TOTAL",
        one_based: false,
    },
    Provider {
        name: "buildkite",
        index_var: "BUILDKITE_PARALLEL_JOB",
        total_var: "BUILDKITE_PARALLEL_JOB_COUNT",
        one_based: false,
    },
    Provider {
        name: "gitlab",
        index_var: "CI_NODE_INDEX",
        total_var: "CI_NODE_TOTAL",
        one_based: true,
    },
];

impl NodeIdentity {
    /// Resolve the identity from explicit values, falling back to provider
    /// variables looked up through `env`.
    pub fn resolve<F>(index: Option<u32>, total: Option<u32>, env: F) -> Result<Self, ConfigMismatch>
    where
        F: Fn(&str) -> Option<String>,
    {
        match (index, total) {
            (Some(index), Some(total)) => return Ok(Self::explicit(index, total)),
            (Some(_), None) => return Err(identity("--node-index given without --node-total")),
            (None, Some(_)) => return Err(identity("--node-total given without --node-index")),
            (None, None) => {}
        }

        for provider in PROVIDERS {
            let raw_index = env(provider.index_var);
            let raw_total = env(provider.total_var);
            let (raw_index, raw_total) = match (raw_index, raw_total) {
                (None, None) => continue,
                (Some(i), Some(t)) => (i, t),
                _ => {
                    return Err(identity(format!(
                        "{} sets only one of {} and {}",
                        provider.name, provider.index_var, provider.total_var
                    )))
                }
            };

            let index = parse_var(provider.index_var, &raw_index)?;
            let total = parse_var(provider.total_var, &raw_total)?;
            let index = if provider.one_based {
                index.checked_sub(1).ok_or_else(|| {
                    identity(format!("{} is 1-based but was 0", provider.index_var))
                })?
            } else {
                index
            };

            debug!(
                provider = provider.name,
                index, total, "detected node identity from CI environment"
            );
            return Ok(Self {
                index,
                total,
                source: provider.name,
            });
        }

        Err(identity(
            "no node index/total given; pass --node-index/--node-total or run under a CI \
             provider that exports them (CircleCI, Buildkite, GitLab)",
        ))
    }

    /// Resolve against the process environment.
    pub fn from_process_env(index: Option<u32>, total: Option<u32>) -> Result<Self, ConfigMismatch> {
        Self::resolve(index, total, |name| std::env::var(name).ok())
    }

    pub fn explicit(index: u32, total: u32) -> Self {
        Self {
            index,
            total,
            source: "explicit",
        }
    }
}

fn parse_var(name: &str, value: &str) -> Result<u32, ConfigMismatch> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| identity(format!("{name}={value:?} is not a non-negative integer")))
}

fn identity(message: impl Into<String>) -> ConfigMismatch {
    ConfigMismatch::Identity {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_wins_over_env() {
        let id = NodeIdentity::resolve(Some(1), Some(4), env(&[("CIRCLE_NODE_INDEX", "3")]))
            .unwrap();
        assert_eq!(id, NodeIdentity::explicit(1, 4));
    }

    #[test]
    fn test_half_explicit_is_error() {
        let err = NodeIdentity::resolve(Some(1), None, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigMismatch::Identity { .. }));
    }

    #[test]
    fn test_circleci_zero_based() {
        let id = NodeIdentity::resolve(
            None,
            None,
            env(&[("CIRCLE_NODE_INDEX", "2"), ("CIRCLE_NODE_TOTAL", "4")]),
        )
        .unwrap();
        assert_eq!((id.index, id.total, id.source), (2, 4, "circleci"));
    }

    #[test]
    fn test_gitlab_one_based() {
        let id = NodeIdentity::resolve(
            None,
            None,
            env(&[("CI_NODE_INDEX", "1"), ("CI_NODE_TOTAL", "3")]),
        )
        .unwrap();
        assert_eq!((id.index, id.total, id.source), (0, 3, "gitlab"));

        let err = NodeIdentity::resolve(
            None,
            None,
            env(&[("CI_NODE_INDEX", "0"), ("CI_NODE_TOTAL", "3")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("1-based"));
    }

    #[test]
    fn test_partial_provider_vars_are_error() {
        let err = NodeIdentity::resolve(None, None, env(&[("BUILDKITE_PARALLEL_JOB", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("buildkite sets only one"));
    }

    #[test]
    fn test_garbage_value_is_error() {
        let err = NodeIdentity::resolve(
            None,
            None,
            env(&[("CIRCLE_NODE_INDEX", "two"), ("CIRCLE_NODE_TOTAL", "4")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("CIRCLE_NODE_INDEX=\"two\""));
    }

    #[test]
    fn test_nothing_found_is_error() {
        let err = NodeIdentity::resolve(None, None, env(&[])).unwrap_err();
        assert!(err.to_string().contains("no node index/total given"));
    }
}
