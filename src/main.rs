use anyhow::Result;
use tweetprep::{init_tracing_once, PipelineOptions, TweetPrep};

fn main() -> Result<()> {
    init_tracing_once();

    let mut opts = PipelineOptions::default().merge_env()?;
    let mut args = std::env::args().skip(1);
    if let Some(input) = args.next() {
        opts = opts.with_input(input);
    }
    if let Some(out) = args.next() {
        opts = opts.with_output_dir(out);
    }

    let run = TweetPrep::from_options(opts).run()?;
    let r = &run.report;
    println!(
        "{} records in {} groups (seed {}): {} stream, {} batch over {} days, {} outside both date lists",
        r.records, r.group_count, r.seed, r.stream_records, r.batch_records, r.batch_days, r.dropped_out_of_range
    );
    println!("Combined output: {}", run.outputs.combined.display());

    Ok(())
}
