use clap::Parser;
use std::ops::Range;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tceval::{
    evaluate_conf, EvaluationConfigBuilder, EvaluationMode, LabelIndex, Outcome, OutcomeRecord,
    OutcomeTable,
};

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, default_value_t = 1)]
    n_samples: u32,
    /// Outcome file to evaluate. A table is generated when missing.
    #[arg(short, long)]
    path: Option<PathBuf>,
    #[arg(short, long, default_value_t = EvaluationMode::MultiLabel)]
    mode: EvaluationMode,
    #[arg(short, long, default_value_t = 100_000)]
    instances: usize,
    #[arg(short, long, default_value_t = 90)]
    labels: usize,
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

fn generate_table(mode: EvaluationMode, instances: usize, label_count: usize) -> OutcomeTable {
    let labels = LabelIndex::new((0..label_count).map(|k| format!("label{:03}", k))).unwrap();
    let records = (0..instances).map(|i| {
        let outcome = match mode {
            EvaluationMode::SingleLabel => Outcome::SingleLabel {
                predicted: (i * 7) % label_count,
                gold: (i * 3) % label_count,
            },
            EvaluationMode::MultiLabel => Outcome::MultiLabel {
                predicted: (0..label_count)
                    .map(|k| ((i * 31 + k * 17) % 100) as f64 / 100.0)
                    .collect(),
                gold: (0..label_count)
                    .map(|k| if (i + k) % 3 == 0 { 1.0 } else { 0.0 })
                    .collect(),
                threshold: Some(0.5),
            },
        };
        OutcomeRecord::new(format!("doc{}", i), outcome)
    });
    OutcomeTable::from_records(mode, labels, records).unwrap()
}

fn main() {
    let args = Args::parse();
    let n_samples = args.n_samples;
    let iter = Range {
        start: 0,
        end: n_samples,
    };
    let table = match &args.path {
        Some(path) => OutcomeTable::from_path(path, args.mode).unwrap(),
        None => generate_table(args.mode, args.instances, args.labels),
    };
    let mut total_duration = Duration::ZERO;
    for _ in iter {
        let config = EvaluationConfigBuilder::default()
            .mode(args.mode)
            .individual_label_measures(true)
            .parallel(args.parallel)
            .build();
        let now = Instant::now();
        {
            evaluate_conf(&table, config).unwrap();
        }
        let elapsed = now.elapsed();
        total_duration += elapsed;
    }
    println!(
        "Total duration: {} with {n_samples} samples over {} instances",
        total_duration.as_secs_f64(),
        table.len()
    )
}
