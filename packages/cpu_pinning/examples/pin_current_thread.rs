//! Pins the current thread to one processor, then to a set of processors.
//!
//! Set `RUST_LOG=cpu_pinning=debug` to see what is applied.

use cpu_pinning::{Affinity, CpuMask};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), cpu_pinning::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if !cpu_pinning::set_affinity(0) {
        eprintln!("Could not pin the current thread, continuing unpinned.");
    }

    let affinity = Affinity::new()?;
    let cores = affinity.count_cores();
    println!("The system has {cores} processors.");

    // Every other processor, so the selection has gaps in it.
    let mask = CpuMask::from_processors((0..cores).step_by(2))?;
    affinity.set_mask(&mask)?;

    println!("Pinned the current thread to processors {mask}.");

    Ok(())
}
