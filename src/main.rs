use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use countmerge::{fetch, merge_counts, CollisionPolicy, FetchOptions, MergeOptions};
use peak_alloc::PeakAlloc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Parser)]
#[command(name = "countmerge")]
#[command(about = "Merge VERSE gene-count tables into one matrix, and fetch SRA reads")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Outer-join per-sample count tables on gene id into a single matrix
    Merge(MergeArgs),
    /// Download the SRA archive of an accession with `prefetch`
    Prefetch(PrefetchArgs),
    /// Extract and gzip FASTQ files from an SRA archive, then remove the archive
    Fastq(FastqArgs),
}

#[derive(Args)]
struct MergeArgs {
    #[arg(
        short = 'i',
        long = "input",
        required = true,
        num_args = 1..,
        value_name = "PATH",
        help = "Count tables from VERSE, one per sample; column order follows this list"
    )]
    input: Vec<PathBuf>,

    #[arg(
        short = 'o',
        long = "output",
        required = true,
        value_name = "PATH",
        help = "Output matrix path"
    )]
    output: PathBuf,

    #[arg(long = "header", help = "Skip the first line of every input as a header")]
    header: bool,

    #[arg(
        long = "strict-labels",
        help = "Fail when two inputs derive the same sample label instead of keeping the later one"
    )]
    strict_labels: bool,

    #[arg(
        long = "index-name",
        value_name = "NAME",
        default_value = "gene",
        help = "Header of the gene id column"
    )]
    index_name: String,

    #[arg(
        long = "delimiter",
        value_name = "CHAR",
        default_value_t = ',',
        help = "Output field delimiter"
    )]
    delimiter: char,
}

#[derive(Args)]
struct PrefetchArgs {
    #[arg(value_name = "ACCESSION", help = "SRA run accession, e.g. SRR000001")]
    accession: String,

    #[arg(value_name = "OUTDIR", help = "Directory to download into")]
    outdir: PathBuf,

    #[arg(long = "prefetch-bin", value_name = "BIN", default_value = "prefetch")]
    prefetch_bin: String,
}

#[derive(Args)]
struct FastqArgs {
    #[arg(value_name = "ARCHIVE", help = "Downloaded .sra archive")]
    archive: PathBuf,

    #[arg(value_name = "OUTDIR", help = "Directory for the FASTQ files")]
    outdir: PathBuf,

    #[arg(long = "fasterq-bin", value_name = "BIN", default_value = "fasterq-dump")]
    fasterq_bin: String,
}

impl MergeArgs {
    fn into_options(self) -> anyhow::Result<MergeOptions> {
        if !self.delimiter.is_ascii() {
            bail!(
                "The delimiter must be a single ASCII character, found {:?}",
                self.delimiter
            );
        }
        let collision = if self.strict_labels {
            CollisionPolicy::Error
        } else {
            CollisionPolicy::Overwrite
        };
        Ok(MergeOptions::new(self.input, self.output)
            .with_header(self.header)
            .with_collision(collision)
            .with_index_name(self.index_name)
            .with_delimiter(self.delimiter as u8))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Merge(args) => {
            let opts = args.into_options()?;
            let mat = merge_counts(&opts).with_context(|| {
                format!("Could not merge the count tables into {:?}", opts.output)
            })?;
            info!(
                "merged matrix has {} genes and {} samples",
                mat.n_genes(),
                mat.n_samples()
            );
        }
        Commands::Prefetch(args) => {
            let opts = FetchOptions {
                prefetch_bin: args.prefetch_bin,
                ..FetchOptions::default()
            };
            fetch::prefetch(&args.accession, &args.outdir, &opts)
                .with_context(|| format!("Could not prefetch {}", args.accession))?;
        }
        Commands::Fastq(args) => {
            let opts = FetchOptions {
                fasterq_bin: args.fasterq_bin,
                ..FetchOptions::default()
            };
            let files = fetch::dump_fastq(&args.archive, &args.outdir, &opts)
                .with_context(|| format!("Could not extract FASTQ from {:?}", args.archive))?;
            for f in files {
                info!("wrote {:?}", f);
            }
        }
    }

    info!(
        "finished in {:?}, peak memory {:.1} MB",
        start.elapsed(),
        PEAK_ALLOC.peak_usage_as_mb()
    );
    Ok(())
}
