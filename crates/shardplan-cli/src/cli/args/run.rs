use super::common::{NodeArgs, OutputFormat, PlanArgs};

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(flatten)]
    pub node: NodeArgs,

    /// Benchmark mode: append the test tool's bench_args
    #[arg(long, env = "SHARDPLAN_BENCH")]
    pub bench: bool,

    /// Print the invocations instead of running them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
