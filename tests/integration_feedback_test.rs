/*!
 * Feedback Scheduler Integration Tests
 * Usage accounting, load average, and recomputed priorities
 */

use minos_kernel::core::types::{PRI_DEFAULT, PRI_MAX};
use minos_kernel::{Kernel, KernelConfig};
use pretty_assertions::assert_eq;

#[test]
fn test_running_thread_accumulates_usage() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    assert_eq!(kernel.recent_cpu_x100(), 0);
    for _ in 0..10 {
        kernel.tick();
        kernel.preemption_point();
    }
    assert_eq!(kernel.recent_cpu_x100(), 1000);
}

#[test]
fn test_priority_drops_as_usage_grows() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    assert_eq!(kernel.get_priority(), PRI_DEFAULT);

    // After one refresh period: priority = 63 - recent_cpu/4 - 2*nice
    for _ in 0..4 {
        kernel.tick();
    }
    kernel.preemption_point();
    assert_eq!(kernel.get_priority(), PRI_MAX - 1);
}

#[test]
fn test_set_nice_reweights_priority() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    kernel.set_nice(5);
    assert_eq!(kernel.get_nice(), 5);
    assert_eq!(kernel.get_priority(), PRI_MAX - 10);

    kernel.set_nice(-30);
    assert_eq!(kernel.get_nice(), -20);
}

#[test]
fn test_set_priority_ignored_in_feedback_mode() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    kernel.set_priority(5);
    assert_eq!(kernel.get_priority(), PRI_DEFAULT);
}

#[test]
fn test_set_nice_ignored_in_static_mode() {
    let kernel = Kernel::boot(KernelConfig::default());
    kernel.set_nice(5);
    assert_eq!(kernel.get_nice(), 0);
    assert_eq!(kernel.get_priority(), PRI_DEFAULT);
}

#[test]
fn test_load_average_tracks_ready_threads() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    assert_eq!(kernel.load_avg_x100(), 0);

    // Two ready peers plus the running thread; they never get the CPU
    // because this thread never yields
    kernel.spawn("peer-a", PRI_DEFAULT, || {}).unwrap();
    kernel.spawn("peer-b", PRI_DEFAULT, || {}).unwrap();

    for _ in 0..100 {
        kernel.tick();
    }
    // One update: (59*0 + 3)/60 = 0.05, truncated at two decimals
    assert_eq!(kernel.load_avg_x100(), 4);
}

#[test]
fn test_usage_decays_at_second_boundary() {
    let kernel = Kernel::boot(KernelConfig::feedback());
    for _ in 0..100 {
        kernel.tick();
        kernel.preemption_point();
    }
    // recent_cpu grew to 100 then decayed once at the second boundary with
    // load 1/60: (2L/(2L+1)) * 100 with L = 0.0166..
    let usage = kernel.recent_cpu_x100();
    assert!(usage > 0 && usage < 1000, "usage {usage}");
}
