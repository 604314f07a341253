//! Hierarchical test-group selectors.
//!
//! A selector names a node in the test tree using `::`-separated segments:
//!
//! - `*` → the root, every test
//! - `raftstore` → the `raftstore` suite and everything below it
//! - `raftstore::test_compact` → one group inside `raftstore`
//!
//! Matching is segment-wise, so `test_compact` never selects
//! `test_compact_log`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Selector that matches every test.
pub const ROOT: &str = "*";

/// Segment separator.
pub const SEPARATOR: &str = "::";

/// A named, hierarchical test-group selector.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestGroup(String);

impl TestGroup {
    /// Parse a selector string.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardplan_core::TestGroup;
    ///
    /// let suite = TestGroup::parse("raftstore").unwrap();
    /// let case = TestGroup::parse("raftstore::test_compact").unwrap();
    /// assert!(suite.contains(&case));
    /// assert!(!case.contains(&suite));
    ///
    /// assert!(TestGroup::parse("raftstore::").is_err());
    /// ```
    pub fn parse(selector: &str) -> PlanResult<Self> {
        let selector = selector.trim();
        let invalid = |reason: &str| PlanError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        if selector.is_empty() {
            return Err(invalid("empty selector"));
        }
        if selector == ROOT {
            return Ok(Self::root());
        }

        for segment in selector.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if segment == ROOT || segment.contains('*') {
                return Err(invalid("'*' is only valid as the whole selector"));
            }
            if segment.contains(':') {
                return Err(invalid("segments are separated by '::'"));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(invalid("whitespace is not allowed"));
            }
        }

        Ok(Self(selector.to_string()))
    }

    /// The root selector (`*`).
    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments; empty for the root.
    pub fn segments(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0.split(SEPARATOR).collect()
        }
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments().len()
    }

    /// True if `other` is this group or one of its descendants.
    pub fn contains(&self, other: &TestGroup) -> bool {
        if self.is_root() {
            return true;
        }
        if other.is_root() {
            return false;
        }
        other.0 == self.0
            || (other.0.starts_with(&self.0) && other.0[self.0.len()..].starts_with(SEPARATOR))
    }

    /// True if `other` is a descendant of this group, but not the group itself.
    pub fn strictly_contains(&self, other: &TestGroup) -> bool {
        self != other && self.contains(other)
    }
}

impl fmt::Display for TestGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TestGroup {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TestGroup> for String {
    fn from(group: TestGroup) -> Self {
        group.0
    }
}

impl std::str::FromStr for TestGroup {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered include and exclude selectors for one shard.
///
/// Evaluation is position independent: every include is applied first, then
/// anything matched by any exclude is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    pub include: Vec<TestGroup>,
    #[serde(default)]
    pub exclude: Vec<TestGroup>,
}

impl Selection {
    pub fn new(include: Vec<TestGroup>, exclude: Vec<TestGroup>) -> Self {
        Self { include, exclude }
    }

    /// Parse a selection from plain strings.
    pub fn parse<I, E>(include: I, exclude: E) -> PlanResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include = include
            .into_iter()
            .map(|s| TestGroup::parse(s.as_ref()))
            .collect::<PlanResult<Vec<_>>>()?;
        let exclude = exclude
            .into_iter()
            .map(|s| TestGroup::parse(s.as_ref()))
            .collect::<PlanResult<Vec<_>>>()?;
        Ok(Self { include, exclude })
    }

    /// Whether `test` is selected: matched by an include and by no exclude.
    pub fn selects(&self, test: &TestGroup) -> bool {
        self.include.iter().any(|inc| inc.contains(test))
            && !self.exclude.iter().any(|exc| exc.contains(test))
    }

    /// The entries of `universe` this selection runs, in universe order.
    pub fn effective<'a>(
        &'a self,
        universe: &'a [TestGroup],
    ) -> impl Iterator<Item = &'a TestGroup> + 'a {
        universe.iter().filter(move |test| self.selects(test))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }
}
