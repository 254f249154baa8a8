use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, info_span, Level};

use sa_io::{load_matrix, save_matrix};
use sa_runtime::{DriverConfig, EmulatedRuntime, HostDriver, KernelImage, WaitOptions};
use sa_tensor::storage::check_capacity;
use sa_tensor::{compare, ComputeBackend, CpuBackend, Matrix, Shape};

use crate::args::{GenerateArgs, RunArgs, WriteImageArgs};

/// Range of randomly generated element values.
const VALUE_RANGE: Range<i32> = -1024..1024;

/// Edge of the top-left block of A logged after loading.
const PREVIEW_DIM: usize = 10;

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Result<Matrix> {
    Ok(Matrix::from_fn(rows, cols, |_, _| rng.gen_range(VALUE_RANGE))?)
}

/// The top-left `dim x dim` block of `m`, one line per row.
fn preview(m: &Matrix, dim: usize) -> String {
    (0..m.rows().min(dim))
        .filter_map(|i| m.row(i))
        .map(|row| {
            row.iter()
                .take(dim)
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Offload, compute the reference, and compare. Returns whether the results match.
pub fn run(args: &RunArgs) -> Result<bool> {
    let image = fs::read(&args.image)
        .with_context(|| format!("cannot read kernel image {}", args.image.display()))?;
    let header = KernelImage::from_bytes(&image)
        .with_context(|| format!("invalid kernel image {}", args.image.display()))?;

    // Reject operands the programmed buffers cannot hold before building any.
    let capacity = header.capacity();
    check_capacity("a", Shape::new(args.m, args.n), capacity)?;
    check_capacity("b", Shape::new(args.n, args.p), capacity)?;
    check_capacity("c", Shape::new(args.m, args.p), capacity)?;

    let (a, b) = match (&args.a, &args.b) {
        (Some(a_path), Some(b_path)) => {
            let _span = info_span!("load inputs").entered();
            let a = load_matrix(a_path, args.m, args.n)
                .with_context(|| format!("cannot load {}", a_path.display()))?;
            let b = load_matrix(b_path, args.n, args.p)
                .with_context(|| format!("cannot load {}", b_path.display()))?;
            (a, b)
        }
        _ => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            let a = random_matrix(&mut rng, args.m, args.n)?;
            let b = random_matrix(&mut rng, args.n, args.p)?;
            (a, b)
        }
    };
    info!(a = %a.shape(), b = %b.shape(), "inputs ready");
    if tracing::enabled!(Level::DEBUG) {
        debug!("A top-left block:\n{}", preview(&a, PREVIEW_DIM));
    }

    let mut wait = WaitOptions::default();
    if let Some(ms) = args.timeout_ms {
        wait = wait.with_timeout(Duration::from_millis(ms));
    }
    let config = DriverConfig {
        wait,
        verify_upload: args.verify_upload,
    };
    let runtime = EmulatedRuntime::default().with_parallel(!args.sequential);
    let driver = HostDriver::new(runtime, config);

    let report = driver.run(&image, &a, &b).context("offload failed")?;
    println!("Using {}", report.device);
    if args.verify_upload {
        println!("Data verification successful. No mismatches found.");
    }

    let start = Instant::now();
    let expected = CpuBackend::new().matmul(&a, &b)?;
    let reference_time = start.elapsed();

    let t = &report.timings;
    println!("Upload time:    {:.3} ms", ms(t.upload));
    println!("Execution time: {:.3} ms ({:.3} GOPS)", ms(t.compute), report.gops());
    println!("Download time:  {:.3} ms", ms(t.download));
    println!("Reference time: {:.3} ms", ms(reference_time));

    let result = compare(&report.output, &expected)?;
    if let Some(mismatch) = result.first_mismatch {
        println!("Error: Result mismatch");
        println!("{mismatch}");
        println!("TEST FAILED");
        return Ok(false);
    }
    println!("TEST PASSED");
    Ok(true)
}

pub fn generate(args: &GenerateArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let m = random_matrix(&mut rng, args.rows, args.cols)?;
    save_matrix(&args.out, &m)
        .with_context(|| format!("cannot write {}", args.out.display()))?;
    info!(path = %args.out.display(), shape = %m.shape(), "wrote matrix");
    Ok(())
}

pub fn write_image(args: &WriteImageArgs) -> Result<()> {
    let image = KernelImage::new(args.tile_size, args.capacity);
    image
        .engine_config()
        .context("refusing to write an unusable image")?;
    let file = File::create(&args.out)
        .with_context(|| format!("cannot create {}", args.out.display()))?;
    let mut writer = BufWriter::new(file);
    image.write_to(&mut writer)?;
    writer.flush()?;
    info!(
        path = %args.out.display(),
        tile_size = args.tile_size,
        capacity = args.capacity,
        "wrote kernel image"
    );
    Ok(())
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}
