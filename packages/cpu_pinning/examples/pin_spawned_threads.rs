//! Spawns one thread per processor and pins each of them from the spawning thread.

use std::sync::{Arc, Barrier};
use std::thread;

use cpu_pinning::{Affinity, ThreadHandle};

fn main() -> Result<(), cpu_pinning::Error> {
    let affinity = Affinity::new()?;
    let cores = affinity.count_cores();

    // Workers wait here until the main thread has pinned all of them.
    let pinned = Arc::new(Barrier::new(cores as usize + 1));

    let workers = (0..cores)
        .map(|processor| {
            let pinned = Arc::clone(&pinned);

            thread::spawn(move || {
                pinned.wait();
                println!("Worker for processor {processor} is running.");

                // In a real service, you would start some work handler here.
            })
        })
        .collect::<Vec<_>>();

    for (processor, worker) in (0..cores).zip(&workers) {
        if let Err(e) = affinity.set_thread(ThreadHandle::of(worker), processor) {
            eprintln!("Could not pin worker to processor {processor}: {e}");
        }
    }

    pinned.wait();

    for worker in workers {
        worker.join().unwrap();
    }

    println!("All workers have finished.");

    Ok(())
}
