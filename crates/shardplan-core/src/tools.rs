//! External collaborators, configured by argv.
//!
//! The formatter, the working-tree check and the test runner are opaque
//! programs. This module only knows how to turn a resolved shard into an
//! argv for them.
//!
//! Test runners filter by name, not by `::` segment. With the default
//! [`FilterMatch::Substring`] a filter `raftstore::test_compact` also runs
//! `raftstore::test_compact_log`, so coverage checks model that
//! ([`TestTool::filter_selects`]). [`FilterMatch::Exact`] instead passes each
//! shard's declared universe entries verbatim with the exact flag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::resolve::ResolvedShard;
use crate::selector::{Selection, TestGroup};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split an argv (`[program, args..]`).
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=*@+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Test runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestTool {
    #[serde(default = "default_test_program")]
    pub program: String,

    #[serde(default = "default_test_args")]
    pub args: Vec<String>,

    /// Appended in benchmark mode.
    #[serde(default = "default_bench_args")]
    pub bench_args: Vec<String>,

    /// Emitted before the first filter; `None` puts filters straight after the args.
    #[serde(default = "default_filter_separator")]
    pub filter_separator: Option<String>,

    /// Flag prefixed to every exclude pattern.
    #[serde(default = "default_skip_flag")]
    pub skip_flag: String,

    /// How the runner matches filters against test names.
    #[serde(default)]
    pub filter_match: FilterMatch,

    /// Appended after the test names in [`FilterMatch::Exact`] mode.
    #[serde(default = "default_exact_flag")]
    pub exact_flag: String,
}

/// Filter semantics of the test runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMatch {
    /// Filters and skips match any test whose name contains them (libtest default).
    #[default]
    Substring,
    /// Each shard runs exactly its declared universe entries. Requires every
    /// revision to declare a universe of full test names.
    Exact,
}

impl Default for TestTool {
    fn default() -> Self {
        Self {
            program: default_test_program(),
            args: default_test_args(),
            bench_args: default_bench_args(),
            filter_separator: default_filter_separator(),
            skip_flag: default_skip_flag(),
            filter_match: FilterMatch::default(),
            exact_flag: default_exact_flag(),
        }
    }
}

impl TestTool {
    /// Build the argv running one shard.
    ///
    /// In substring mode a root include adds no filter: with no positional
    /// filter the test runner already runs everything. In exact mode the
    /// shard's universe entries are the filters; `None` means the shard
    /// selects no declared test and must not be run, since an unfiltered
    /// invocation would run the whole suite.
    pub fn invocation(&self, shard: &ResolvedShard, bench: bool) -> Option<Invocation> {
        let mut args = self.args.clone();
        if bench {
            args.extend(self.bench_args.iter().cloned());
        }

        let filters: Vec<String> = match self.filter_match {
            FilterMatch::Substring => {
                let mut filters: Vec<String> = if shard.include.iter().any(TestGroup::is_root) {
                    Vec::new()
                } else {
                    shard.include.iter().map(|g| g.to_string()).collect()
                };
                for exclude in &shard.exclude {
                    filters.push(self.skip_flag.clone());
                    filters.push(exclude.to_string());
                }
                filters
            }
            FilterMatch::Exact => {
                if shard.tests.is_empty() {
                    return None;
                }
                let mut filters: Vec<String> = shard.tests.iter().map(|g| g.to_string()).collect();
                filters.push(self.exact_flag.clone());
                filters
            }
        };

        if !filters.is_empty() {
            if let Some(separator) = &self.filter_separator {
                args.push(separator.clone());
            }
            args.extend(filters);
        }

        Some(Invocation::new(self.program.clone(), args))
    }

    /// Whether the runner, given `selection` as filters, would run `test`.
    ///
    /// Exact mode runs precisely the selected entries.
    pub fn filter_selects(&self, selection: &Selection, test: &TestGroup) -> bool {
        match self.filter_match {
            FilterMatch::Exact => selection.selects(test),
            FilterMatch::Substring => {
                let name = test.as_str();
                let included = selection.include.iter().any(TestGroup::is_root)
                    || selection
                        .include
                        .iter()
                        .any(|inc| name.contains(inc.as_str()));
                included
                    && !selection
                        .exclude
                        .iter()
                        .any(|exc| name.contains(exc.as_str()))
            }
        }
    }
}

/// All external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Formatter argv, run on the gate node.
    #[serde(default = "default_format")]
    pub format: Vec<String>,

    /// Working-tree-clean check argv; non-zero exit means formatting drifted.
    #[serde(default = "default_clean_check")]
    pub clean_check: Vec<String>,

    #[serde(default)]
    pub test: TestTool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            clean_check: default_clean_check(),
            test: TestTool::default(),
        }
    }
}

impl ToolConfig {
    pub fn validate(&self) -> PlanResult<()> {
        if self.format.is_empty() {
            return Err(PlanError::Tools {
                message: "`format` must name a program".into(),
            });
        }
        if self.clean_check.is_empty() {
            return Err(PlanError::Tools {
                message: "`clean_check` must name a program".into(),
            });
        }
        if self.test.program.trim().is_empty() {
            return Err(PlanError::Tools {
                message: "`test.program` must not be empty".into(),
            });
        }
        if self.test.skip_flag.trim().is_empty() {
            return Err(PlanError::Tools {
                message: "`test.skip_flag` must not be empty".into(),
            });
        }
        if self.test.filter_match == FilterMatch::Exact && self.test.exact_flag.trim().is_empty() {
            return Err(PlanError::Tools {
                message: "`test.exact_flag` must not be empty with `filter_match: exact`".into(),
            });
        }
        Ok(())
    }

    pub fn format_invocation(&self) -> PlanResult<Invocation> {
        Invocation::from_argv(&self.format).ok_or_else(|| PlanError::Tools {
            message: "`format` must name a program".into(),
        })
    }

    pub fn clean_check_invocation(&self) -> PlanResult<Invocation> {
        Invocation::from_argv(&self.clean_check).ok_or_else(|| PlanError::Tools {
            message: "`clean_check` must name a program".into(),
        })
    }
}

fn default_format() -> Vec<String> {
    argv(&["cargo", "fmt", "--all"])
}

fn default_clean_check() -> Vec<String> {
    argv(&["git", "diff-index", "--quiet", "HEAD", "--"])
}

fn default_test_program() -> String {
    "cargo".to_string()
}

fn default_test_args() -> Vec<String> {
    argv(&["test", "--workspace"])
}

fn default_bench_args() -> Vec<String> {
    argv(&["--features", "dev"])
}

fn default_filter_separator() -> Option<String> {
    Some("--".to_string())
}

fn default_skip_flag() -> String {
    "--skip".to_string()
}

fn default_exact_flag() -> String {
    "--exact".to_string()
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
