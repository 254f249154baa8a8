use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sa_tensor::{DEFAULT_CAPACITY, DEFAULT_TILE_SIZE};

#[derive(Debug, Parser)]
#[command(name = "systolic-gemm", version, about = "Tiled systolic-array matrix multiply offload")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Offload a multiply to the emulated accelerator and verify it.
    Run(RunArgs),
    /// Write a random matrix in the text input format.
    Generate(GenerateArgs),
    /// Write a kernel image.
    WriteImage(WriteImageArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Kernel image to program the device with.
    #[arg(long)]
    pub image: PathBuf,
    /// Text file holding the M x N left operand.
    #[arg(long, requires = "b")]
    pub a: Option<PathBuf>,
    /// Text file holding the N x P right operand.
    #[arg(long, requires = "a")]
    pub b: Option<PathBuf>,
    /// Rows of A.
    #[arg(long, default_value_t = 256)]
    pub m: usize,
    /// Columns of A and rows of B.
    #[arg(long, default_value_t = 256)]
    pub n: usize,
    /// Columns of B.
    #[arg(long, default_value_t = 256)]
    pub p: usize,
    /// Seed for randomly generated operands.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Give up waiting for the device after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Evaluate output tile-rows one at a time on the device.
    #[arg(long)]
    pub sequential: bool,
    /// Read inputs back after upload and check them.
    #[arg(long)]
    pub verify_upload: bool,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub rows: usize,
    #[arg(long)]
    pub cols: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct WriteImageArgs {
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE as u32)]
    pub tile_size: u32,
    /// Elements per working buffer.
    #[arg(long, default_value_t = DEFAULT_CAPACITY as u32)]
    pub capacity: u32,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["systolic-gemm", "run", "--image", "k.bin"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!((args.m, args.n, args.p), (256, 256, 256));
                assert!(args.a.is_none());
                assert!(args.timeout_ms.is_none());
                assert!(!args.sequential);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_input_files_come_in_pairs() {
        let res = Cli::try_parse_from(["systolic-gemm", "run", "--image", "k.bin", "--a", "a.txt"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_write_image_defaults() {
        let cli = Cli::try_parse_from(["systolic-gemm", "write-image", "--out", "k.bin"]).unwrap();
        match cli.command {
            Command::WriteImage(args) => {
                assert_eq!(args.tile_size, 16);
                assert_eq!(args.capacity, 1536 * 1536);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
