//! Validated shard plans.
//!
//! A [`ShardPlan`] is one revision of the node-to-suite table. Construction
//! validates the whole table up front, so every node index in
//! `0..partitions` is guaranteed an assignment and exactly one assignment
//! carries the format gate. Nothing is left to fall through at CI time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coverage::{self, CoverageReport};
use crate::error::{PlanError, PlanResult};
use crate::selector::{Selection, TestGroup};
use crate::tools::TestTool;

/// How node indices map onto plan entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// One entry per physical node, keyed by node index.
    Direct,
    /// Logical jobs dealt round-robin: job `j` runs on node `j % partitions`.
    Modulo,
}

impl AddressingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Modulo => "modulo",
        }
    }
}

impl std::fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan entry as authored: a node (direct mode) or a logical job (modulo mode).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    /// Node index. Required in direct mode, rejected in modulo mode.
    #[serde(default)]
    pub index: Option<u32>,

    /// Optional human label shown in output.
    #[serde(default)]
    pub name: Option<String>,

    /// Run the formatting gate before this entry's tests.
    #[serde(default)]
    pub format_gate: bool,

    pub include: Vec<TestGroup>,

    #[serde(default)]
    pub exclude: Vec<TestGroup>,
}

impl PlanEntry {
    /// Direct-mode entry for node `index`.
    pub fn node(index: u32, selection: Selection) -> Self {
        Self {
            index: Some(index),
            name: None,
            format_gate: false,
            include: selection.include,
            exclude: selection.exclude,
        }
    }

    /// Modulo-mode entry; its ordinal is its position in the job list.
    pub fn job(selection: Selection) -> Self {
        Self {
            index: None,
            name: None,
            format_gate: false,
            include: selection.include,
            exclude: selection.exclude,
        }
    }

    pub fn with_format_gate(mut self) -> Self {
        self.format_gate = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A validated plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// Node index (direct) or job ordinal (modulo).
    pub ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub format_gate: bool,
    pub selection: Selection,
}

impl Assignment {
    /// Display label: the name if present, else `#<ordinal>`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} (#{})", self.ordinal),
            None => format!("#{}", self.ordinal),
        }
    }
}

/// One revision of the shard table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    revision: u32,
    mode: AddressingMode,
    partitions: u32,
    assignments: Vec<Assignment>,
    universe: Vec<TestGroup>,
}

impl ShardPlan {
    /// Build and validate a plan revision.
    pub fn new(
        revision: u32,
        mode: AddressingMode,
        partitions: u32,
        entries: Vec<PlanEntry>,
        universe: Vec<TestGroup>,
    ) -> PlanResult<Self> {
        if partitions == 0 {
            return Err(PlanError::invalid(revision, "partitions must be at least 1"));
        }

        let assignments = match mode {
            AddressingMode::Direct => direct_assignments(revision, partitions, entries)?,
            AddressingMode::Modulo => modulo_assignments(revision, partitions, entries)?,
        };

        for assignment in &assignments {
            if assignment.selection.is_empty() {
                return Err(PlanError::invalid(
                    revision,
                    format!("entry {} has no include selectors", assignment.label()),
                ));
            }
        }

        let gates: Vec<String> = assignments
            .iter()
            .filter(|a| a.format_gate)
            .map(Assignment::label)
            .collect();
        match gates.len() {
            1 => {}
            0 => {
                return Err(PlanError::invalid(
                    revision,
                    "no entry carries format_gate; exactly one must",
                ))
            }
            _ => {
                return Err(PlanError::invalid(
                    revision,
                    format!("format_gate set on {} entries: {}", gates.len(), gates.join(", ")),
                ))
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for test in &universe {
            if !seen.insert(test) {
                return Err(PlanError::invalid(
                    revision,
                    format!("universe lists {test} more than once"),
                ));
            }
        }

        debug!(
            revision,
            mode = mode.as_str(),
            partitions,
            entries = assignments.len(),
            universe = universe.len(),
            "validated shard plan"
        );

        Ok(Self {
            revision,
            mode,
            partitions,
            assignments,
            universe,
        })
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Number of physical nodes the plan was authored for.
    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// All entries, ordered by ordinal.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Declared test universe (may be empty).
    pub fn universe(&self) -> &[TestGroup] {
        &self.universe
    }

    /// The node an entry runs on.
    pub fn node_of(&self, assignment: &Assignment) -> u32 {
        match self.mode {
            AddressingMode::Direct => assignment.ordinal as u32,
            AddressingMode::Modulo => (assignment.ordinal % self.partitions as usize) as u32,
        }
    }

    /// The single entry carrying the format gate.
    pub fn gate(&self) -> &Assignment {
        // Construction guarantees exactly one.
        self.assignments
            .iter()
            .find(|a| a.format_gate)
            .unwrap_or(&self.assignments[0])
    }

    /// Analyze the exactly-once coverage invariant as `tool` will filter it.
    pub fn coverage(&self, tool: &TestTool) -> CoverageReport {
        coverage::analyze_with(self, tool)
    }

    /// Fail with [`PlanError::Coverage`] unless coverage is clean.
    pub fn verify_coverage(&self, tool: &TestTool) -> PlanResult<CoverageReport> {
        let report = self.coverage(tool);
        if report.is_clean() {
            Ok(report)
        } else {
            Err(PlanError::Coverage {
                revision: self.revision,
                summary: report.summary(),
            })
        }
    }
}

fn direct_assignments(
    revision: u32,
    partitions: u32,
    entries: Vec<PlanEntry>,
) -> PlanResult<Vec<Assignment>> {
    let mut by_index: BTreeMap<u32, PlanEntry> = BTreeMap::new();
    for (position, entry) in entries.into_iter().enumerate() {
        let index = entry.index.ok_or_else(|| {
            PlanError::invalid(
                revision,
                format!("node entry at position {position} is missing `index`"),
            )
        })?;
        if index >= partitions {
            return Err(PlanError::invalid(
                revision,
                format!("node index {index} is out of range for {partitions} partitions"),
            ));
        }
        if by_index.insert(index, entry).is_some() {
            return Err(PlanError::invalid(
                revision,
                format!("node index {index} is assigned more than once"),
            ));
        }
    }

    let missing: Vec<String> = (0..partitions)
        .filter(|i| !by_index.contains_key(i))
        .map(|i| i.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PlanError::invalid(
            revision,
            format!("no entry for node index {}", missing.join(", ")),
        ));
    }

    Ok(by_index
        .into_iter()
        .map(|(index, entry)| assignment(index as usize, entry))
        .collect())
}

fn modulo_assignments(
    revision: u32,
    partitions: u32,
    entries: Vec<PlanEntry>,
) -> PlanResult<Vec<Assignment>> {
    if let Some(position) = entries.iter().position(|e| e.index.is_some()) {
        return Err(PlanError::invalid(
            revision,
            format!("job at position {position} sets `index`; modulo jobs are addressed by position"),
        ));
    }
    if entries.len() < partitions as usize {
        return Err(PlanError::invalid(
            revision,
            format!(
                "{} jobs cannot fill {partitions} partitions; some nodes would run nothing",
                entries.len()
            ),
        ));
    }

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(ordinal, entry)| assignment(ordinal, entry))
        .collect())
}

fn assignment(ordinal: usize, entry: PlanEntry) -> Assignment {
    Assignment {
        ordinal,
        name: entry.name,
        format_gate: entry.format_gate,
        selection: Selection::new(entry.include, entry.exclude),
    }
}
