//! Pins real threads and reads the group affinity back from Windows.
//!
//! Every test does its work on a freshly spawned thread so the affinity of the test harness
//! threads is left alone.

#![cfg(windows)]

use std::thread;

use cpu_pinning::{Affinity, CpuMask, Error, ProcessorIndex, ThreadHandle};
use windows::Win32::System::SystemInformation::GROUP_AFFINITY;
use windows::Win32::System::Threading::{
    GetActiveProcessorCount, GetActiveProcessorGroupCount, GetCurrentThread,
    GetThreadGroupAffinity,
};

// Win32 error code for a handle that does not refer to an open object.
const ERROR_INVALID_HANDLE: i32 = 6;

/// The group affinity of the calling thread, as reported by the operating system.
fn current_group_affinity() -> GROUP_AFFINITY {
    let mut affinity = GROUP_AFFINITY::default();

    // SAFETY: The pseudo-handle always refers to the calling thread and the output structure
    // lives for the duration of the call.
    unsafe { GetThreadGroupAffinity(GetCurrentThread(), &raw mut affinity) }.unwrap();

    affinity
}

/// Global index of the first processor of each processor group.
fn group_starts() -> Vec<ProcessorIndex> {
    // SAFETY: No safety requirements.
    let group_count = unsafe { GetActiveProcessorGroupCount() };

    (0..group_count)
        .scan(0, |start, group| {
            let first = *start;
            // SAFETY: No safety requirements.
            *start += unsafe { GetActiveProcessorCount(group) };
            Some(first)
        })
        .collect()
}

fn on_new_thread<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
    thread::spawn(f).join().unwrap()
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn pins_current_thread_to_first_processor_of_each_group() {
    for (group, first_processor) in (0_u16..).zip(group_starts()) {
        let observed = on_new_thread(move || {
            Affinity::new().unwrap().set(first_processor).unwrap();
            current_group_affinity()
        });

        assert_eq!(observed.Group, group);
        assert_eq!(observed.Mask.count_ones(), 1);
    }
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn pins_current_thread_to_mask_within_group() {
    let starts = group_starts();
    let first_group_size = starts.get(1).copied().unwrap_or_else(|| {
        Affinity::new().unwrap().count_cores()
    });

    if first_group_size < 2 {
        eprintln!("Skipping test: not enough processors available.");
        return;
    }

    let mask = CpuMask::from_processors([0, 1]).unwrap();

    let observed = on_new_thread(move || {
        Affinity::new().unwrap().set_mask(&mask).unwrap();
        current_group_affinity()
    });

    assert_eq!(observed.Group, 0);
    assert_eq!(observed.Mask.count_ones(), 2);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn mask_spanning_groups_ends_in_last_group() {
    let starts = group_starts();

    let Some(&last_start) = starts.last().filter(|_| starts.len() >= 2) else {
        eprintln!("Skipping test: system has only one processor group.");
        return;
    };

    let last_group = u16::try_from(starts.len() - 1).unwrap();
    let mask = CpuMask::from_processors([0, last_start]).unwrap();

    let observed = on_new_thread(move || {
        Affinity::new().unwrap().set_mask(&mask).unwrap();
        current_group_affinity()
    });

    assert_eq!(observed.Group, last_group);
    assert_eq!(observed.Mask.count_ones(), 1);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn count_cores_matches_active_processors() {
    let starts = group_starts();
    let last_start = *starts.last().unwrap();

    // SAFETY: No safety requirements.
    let last_group_size =
        unsafe { GetActiveProcessorCount(u16::try_from(starts.len() - 1).unwrap()) };

    assert_eq!(
        Affinity::new().unwrap().count_cores(),
        last_start + last_group_size
    );
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn invalid_thread_handle_reports_win32_code() {
    let result = Affinity::new()
        .unwrap()
        .set_thread(ThreadHandle::from_raw(0), 0);

    assert!(matches!(
        result,
        Err(Error::Os { status, .. }) if status == ERROR_INVALID_HANDLE
    ));
}
