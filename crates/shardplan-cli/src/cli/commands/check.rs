use serde_json::json;
use shardplan_core::{CoverageReport, ShardPlan};

use super::command_error::CommandError;
use super::load_plan;
use super::output::{envelope, print_json};
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::exit_codes::{SUCCESS, TEST_FAILED};

pub(crate) fn run(args: CheckArgs) -> anyhow::Result<i32> {
    match check(&args) {
        Ok(code) => Ok(code),
        Err(e) => e.into_exit_code(args.format, "check"),
    }
}

fn check(args: &CheckArgs) -> Result<i32, CommandError> {
    let doc = load_plan(&args.plan)?;
    let plans: Vec<&ShardPlan> = if args.all {
        doc.revisions().iter().collect()
    } else {
        vec![doc.select(args.plan.revision)?]
    };

    let tool = &doc.tools().test;
    let reports: Vec<CoverageReport> = plans.iter().map(|p| p.coverage(tool)).collect();
    let code = if reports.iter().all(CoverageReport::is_clean) {
        SUCCESS
    } else {
        TEST_FAILED
    };

    match args.format {
        OutputFormat::Text => {
            for report in &reports {
                print_report(report);
            }
        }
        OutputFormat::Json => {
            print_json(&envelope("check", code, json!({ "reports": reports })))?;
        }
    }
    Ok(code)
}

fn print_report(report: &CoverageReport) {
    let status = if !report.checked {
        "UNCHECKED"
    } else if report.is_clean() {
        "OK"
    } else {
        "FAIL"
    };
    println!("revision {}: {status}: {}", report.revision, report.summary());

    for test in &report.uncovered {
        println!("  uncovered: {test}");
    }
    for overlap in &report.overlaps {
        let ordinals: Vec<String> = overlap.ordinals.iter().map(|o| o.to_string()).collect();
        println!(
            "  overlap: {} (assignments {})",
            overlap.test,
            ordinals.join(", ")
        );
    }
    for split in &report.partial {
        println!(
            "  partial: {} {} of assignment {} splits {}",
            split.kind.as_str(),
            split.selector,
            split.ordinal,
            split.test
        );
    }
    for mismatch in &report.filter_mismatches {
        let (planned, filtered) = if mismatch.planned {
            ("runs", "skips")
        } else {
            ("skips", "runs")
        };
        println!(
            "  filter: assignment {} {planned} {} but the test tool {filtered} it",
            mismatch.ordinal, mismatch.test
        );
    }
    for dead in &report.dead_selectors {
        eprintln!(
            "  warning: {} {} of assignment {} matches no universe entry",
            dead.kind.as_str(),
            dead.selector,
            dead.ordinal
        );
    }
}
