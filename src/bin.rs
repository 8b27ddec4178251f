use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use itertools::izip;
use spz::{load, read_header, CoordinateSystem};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
enum Commands {
    /// Print the header and derived statistics of a .spz file
    Info {
        #[arg(value_name = "INPUT")]
        /// The input .spz file
        input: PathBuf,
    },

    /// Print the decoded gaussians of a .spz file
    Dump {
        #[arg(value_name = "INPUT")]
        /// The input .spz file
        input: PathBuf,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long, default_value = "debug")]
        format: DumpFormat,

        #[arg(short, long, default_value = "unspecified")]
        /// Coordinate system to convert into while loading.
        coordinate_system: CoordinateSystem,
    },

    /// Compare two .spz files gaussian by gaussian
    Diff {
        #[arg(value_name = "OLD")]
        old: PathBuf,
        #[arg(value_name = "NEW")]
        new: PathBuf,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() {
    better_panic::install();
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { input } => {
            info(&input).unwrap();
        }

        Commands::Dump { input, limit, format, coordinate_system } => {
            dump(&input, limit, format, coordinate_system).unwrap();
        }

        Commands::Diff { old, new, limit } => {
            diff(&old, &new, limit).unwrap();
        }
    }
}

fn info(input: &Path) -> Result<()> {
    let header = read_header(input)?;
    println!("{}", header.pretty_fmt());

    let splat = load(input, CoordinateSystem::Unspecified)?;
    println!("Bounding box: {}", splat.bbox());
    println!("Center: {}", splat.bbox().center());
    println!("Median ellipsoid volume: {}", splat.median_volume());
    Ok(())
}

#[derive(Clone, ValueEnum)]
enum DumpFormat {
    Debug,
    Pretty,
    Json,
}

fn dump(
    input: &Path,
    limit: Option<usize>,
    format: DumpFormat,
    coordinate_system: CoordinateSystem,
) -> Result<()> {
    let splat = load(input, coordinate_system)?;
    let limit = limit.unwrap_or(splat.num_points);

    match format {
        DumpFormat::Debug => {
            for g in splat.gaussians().take(limit) {
                println!("{:?}", g);
            }
        }
        DumpFormat::Pretty => {
            for g in splat.gaussians().take(limit) {
                println!("{:#?}", g);
            }
        }
        DumpFormat::Json => {
            let gaussians: Vec<_> = splat.gaussians().take(limit).collect();
            let json = serde_json::to_string_pretty(&gaussians)?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn diff(old: &Path, new: &Path, limit: Option<usize>) -> Result<()> {
    let old = load(old, CoordinateSystem::Unspecified)?;
    let new = load(new, CoordinateSystem::Unspecified)?;

    if old.num_points != new.num_points {
        println!("Different number of gaussians: {} vs {}", old.num_points, new.num_points);
        return Ok(());
    }

    let limit = limit.unwrap_or(old.num_points);
    let mut differing = 0;
    for (old, new) in izip!(old.gaussians(), new.gaussians()).take(limit) {
        if old != new {
            differing += 1;
            let old = format!("{:#?}", old);
            let new = format!("{:#?}", new);
            println!("{}", side_by_side(&old, &new));
        }
    }

    if differing == 0 {
        println!("Files are identical");
    }
    Ok(())
}

fn side_by_side(left: &str, right: &str) -> String {
    let left = left.lines();
    let left_max_len = left.clone().map(|l| l.len()).max().unwrap_or(0);
    let right = right.lines();

    left.zip(right)
        .map(|(l, r)| format!("{:<width$} | {}", l, r, width = left_max_len))
        .collect::<Vec<_>>()
        .join("\n")
}
