//! Exactly-once coverage analysis.
//!
//! Universe entries are treated as atomic units. For every entry we count
//! the plan entries whose selection runs it; the invariant holds when every
//! count is exactly one. A selector that reaches *inside* a universe entry
//! (an exclude below a selected entry, or an include below an unselected one)
//! splits the entry, so the count alone cannot be trusted and the plan is
//! reported as partial.
//!
//! [`analyze_with`] also checks the plan against the test runner's own
//! filter semantics. A plan can be exact under `::` segments and still run a
//! test twice, or not at all, once its selectors become name filters.

use serde::Serialize;
use tracing::warn;

use crate::plan::ShardPlan;
use crate::selector::TestGroup;
use crate::tools::TestTool;

/// A universe entry run by more than one plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub test: TestGroup,
    /// Ordinals of the plan entries that all run `test`.
    pub ordinals: Vec<usize>,
}

/// A selector that splits a universe entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialSplit {
    pub test: TestGroup,
    pub selector: TestGroup,
    pub ordinal: usize,
    pub kind: SelectorKind,
}

/// A universe entry the test runner's filters treat differently from the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterMismatch {
    pub test: TestGroup,
    pub ordinal: usize,
    /// Whether the plan assigns `test` to this entry.
    pub planned: bool,
    /// Whether the runner would actually run it there.
    pub filtered: bool,
}

/// A selector matching nothing in the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadSelector {
    pub selector: TestGroup,
    pub ordinal: usize,
    pub kind: SelectorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Include,
    Exclude,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

/// Result of checking a plan revision against its universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub revision: u32,
    /// False when the plan declares no universe.
    pub checked: bool,
    pub universe_size: usize,
    pub uncovered: Vec<TestGroup>,
    pub overlaps: Vec<Overlap>,
    pub partial: Vec<PartialSplit>,
    /// Empty unless produced by [`analyze_with`].
    pub filter_mismatches: Vec<FilterMismatch>,
    /// Warnings only; they do not affect [`CoverageReport::is_clean`].
    pub dead_selectors: Vec<DeadSelector>,
}

impl CoverageReport {
    pub fn is_clean(&self) -> bool {
        self.uncovered.is_empty()
            && self.overlaps.is_empty()
            && self.partial.is_empty()
            && self.filter_mismatches.is_empty()
    }

    /// One-line description of the violations.
    pub fn summary(&self) -> String {
        if !self.checked {
            return "no universe declared; coverage unchecked".to_string();
        }
        if self.is_clean() {
            return format!("all {} universe entries covered exactly once", self.universe_size);
        }

        let mut parts = Vec::new();
        if !self.uncovered.is_empty() {
            parts.push(format!(
                "{} uncovered ({})",
                self.uncovered.len(),
                join(self.uncovered.iter())
            ));
        }
        if !self.overlaps.is_empty() {
            parts.push(format!(
                "{} run more than once ({})",
                self.overlaps.len(),
                join(self.overlaps.iter().map(|o| &o.test))
            ));
        }
        if !self.partial.is_empty() {
            parts.push(format!(
                "{} split by finer selectors ({})",
                self.partial.len(),
                join(self.partial.iter().map(|p| &p.selector))
            ));
        }
        if !self.filter_mismatches.is_empty() {
            parts.push(format!(
                "{} filtered differently by the test tool ({})",
                self.filter_mismatches.len(),
                join(self.filter_mismatches.iter().map(|m| &m.test))
            ));
        }
        parts.join("; ")
    }
}

fn join<'a>(groups: impl Iterator<Item = &'a TestGroup>) -> String {
    groups.map(TestGroup::as_str).collect::<Vec<_>>().join(", ")
}

/// Check `plan` against its declared universe.
pub fn analyze(plan: &ShardPlan) -> CoverageReport {
    let universe = plan.universe();
    let mut report = CoverageReport {
        revision: plan.revision(),
        checked: !universe.is_empty(),
        universe_size: universe.len(),
        ..CoverageReport::default()
    };

    if universe.is_empty() {
        warn!(
            revision = plan.revision(),
            "plan declares no universe; skipping coverage check"
        );
        return report;
    }

    for test in universe {
        let owners: Vec<usize> = plan
            .assignments()
            .iter()
            .filter(|a| a.selection.selects(test))
            .map(|a| a.ordinal)
            .collect();
        match owners.len() {
            0 => report.uncovered.push(test.clone()),
            1 => {}
            _ => report.overlaps.push(Overlap {
                test: test.clone(),
                ordinals: owners,
            }),
        }
    }

    for assignment in plan.assignments() {
        let selection = &assignment.selection;
        for test in universe {
            let selected = selection.selects(test);
            for exclude in &selection.exclude {
                if selected && test.strictly_contains(exclude) {
                    report.partial.push(PartialSplit {
                        test: test.clone(),
                        selector: exclude.clone(),
                        ordinal: assignment.ordinal,
                        kind: SelectorKind::Exclude,
                    });
                }
            }
            for include in &selection.include {
                if !selected && test.strictly_contains(include) && !is_excluded(selection, include)
                {
                    report.partial.push(PartialSplit {
                        test: test.clone(),
                        selector: include.clone(),
                        ordinal: assignment.ordinal,
                        kind: SelectorKind::Include,
                    });
                }
            }
        }

        let related = |selector: &TestGroup| {
            universe
                .iter()
                .any(|test| selector.contains(test) || test.contains(selector))
        };
        for include in &selection.include {
            if !related(include) {
                report.dead_selectors.push(DeadSelector {
                    selector: include.clone(),
                    ordinal: assignment.ordinal,
                    kind: SelectorKind::Include,
                });
            }
        }
        for exclude in &selection.exclude {
            if !related(exclude) {
                report.dead_selectors.push(DeadSelector {
                    selector: exclude.clone(),
                    ordinal: assignment.ordinal,
                    kind: SelectorKind::Exclude,
                });
            }
        }
    }

    for dead in &report.dead_selectors {
        warn!(
            revision = plan.revision(),
            ordinal = dead.ordinal,
            selector = dead.selector.as_str(),
            kind = dead.kind.as_str(),
            "selector matches nothing in the universe"
        );
    }

    report
}

/// [`analyze`], plus the entries `tool` would run or skip against the plan.
pub fn analyze_with(plan: &ShardPlan, tool: &TestTool) -> CoverageReport {
    let mut report = analyze(plan);
    if !report.checked {
        return report;
    }

    for assignment in plan.assignments() {
        for test in plan.universe() {
            let planned = assignment.selection.selects(test);
            let filtered = tool.filter_selects(&assignment.selection, test);
            if planned != filtered {
                report.filter_mismatches.push(FilterMismatch {
                    test: test.clone(),
                    ordinal: assignment.ordinal,
                    planned,
                    filtered,
                });
            }
        }
    }
    report
}

/// An include that an exclude in the same selection fully removes never runs.
fn is_excluded(selection: &crate::selector::Selection, include: &TestGroup) -> bool {
    selection.exclude.iter().any(|exc| exc.contains(include))
}
