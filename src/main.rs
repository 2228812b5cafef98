use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use visprep::{
    ConvertOptions, ExtractOptions, finalize_shard_names, run_convert, run_extract, run_filter,
    run_sample,
};

#[derive(Parser)]
#[command(name = "visprep", version, about = "Vision-language dataset preparation utilities")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a JSON/JSONL metadata file plus an image tree into Parquet shards
    Convert {
        /// JSON array or JSONL metadata file
        input: PathBuf,
        /// Directory the entries' relative image paths resolve against
        image_root: PathBuf,
        /// Destination directory for the shards
        out_dir: PathBuf,
        /// Source tag stamped on every record
        #[arg(long, default_value = "blip_laion_cc_sbu")]
        source_tag: String,
        /// Rows per shard file
        #[arg(long, default_value_t = 50_000)]
        records_per_shard: usize,
        /// Buffered rows per flush
        #[arg(long, default_value_t = 4096)]
        batch_rows: usize,
        /// Transform workers (default: min(32, cpus * 4))
        #[arg(long)]
        workers: Option<usize>,
        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Filter records by image-path substring, then down-sample to a target count
    Filter {
        /// JSON array or JSONL input file
        input: PathBuf,
        /// Filtered/sampled JSON array output file
        output: PathBuf,
        /// Exclude records whose image path contains this substring
        #[arg(long, default_value = "ocr_vqa")]
        exclude: String,
        /// Down-sample to this many records when more survive the filter
        #[arg(long, default_value_t = 60_000)]
        num_samples: usize,
        /// Sampling seed (fixed default for reproducible runs)
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Uniformly sample records from a dataset
    Sample {
        /// JSON array or JSONL input file
        input: PathBuf,
        /// Sampled JSON array output file
        output: PathBuf,
        /// Number of records to keep
        #[arg(long)]
        count: usize,
        /// Sampling seed (fixed default for reproducible runs)
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Rebuild image files and a JSON dataset from Parquet shards
    Extract {
        /// Directory holding *.parquet shards
        shard_dir: PathBuf,
        /// Output root; images land under <out_root>/images/
        out_root: PathBuf,
        /// Rebuilt JSON file (default: <out_root>/dataset.json)
        #[arg(long)]
        json_out: Option<PathBuf>,
        /// Decode/write workers (default: min(32, cpus * 4))
        #[arg(long)]
        workers: Option<usize>,
        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Embed the final shard total into shard file names
    Rename {
        /// Directory holding the shards
        dir: PathBuf,
        /// Shard file extension
        #[arg(long, default_value = "parquet")]
        ext: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Convert {
            input,
            image_root,
            out_dir,
            source_tag,
            records_per_shard,
            batch_rows,
            workers,
            no_progress,
        } => {
            let opts = ConvertOptions {
                input,
                image_root,
                out_dir,
                source_tag,
                records_per_shard,
                batch_rows,
                workers,
                progress: !no_progress,
            };
            run_convert(&opts)?;
        }
        Command::Filter {
            input,
            output,
            exclude,
            num_samples,
            seed,
        } => {
            run_filter(&input, &output, &exclude, num_samples, seed)?;
        }
        Command::Sample {
            input,
            output,
            count,
            seed,
        } => {
            run_sample(&input, &output, count, seed)?;
        }
        Command::Extract {
            shard_dir,
            out_root,
            json_out,
            workers,
            no_progress,
        } => {
            let json_out = json_out.unwrap_or_else(|| out_root.join("dataset.json"));
            let opts = ExtractOptions {
                shard_dir,
                out_root,
                json_out,
                workers,
                progress: !no_progress,
            };
            run_extract(&opts)?;
        }
        Command::Rename { dir, ext } => {
            let renamed = finalize_shard_names(&dir, &ext)?;
            tracing::info!(renamed, dir = %dir.display(), "shard names finalized");
        }
    }
    Ok(())
}
