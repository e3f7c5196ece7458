//! Per-thread timing of operator assembly and linear solves.
//!
//! Compiled to no-ops unless the `timing` feature is enabled.
#![allow(unused)]
use std::cell::RefCell;
use std::time::Duration;

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    pub assembly_times: Vec<Duration>,
    pub linear_solve_times: Vec<Duration>,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        let total_assembly: Duration = self.assembly_times.iter().sum();
        let total_linear: Duration = self.linear_solve_times.iter().sum();

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "SOLVER TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "  Operator assembly:         {:>9.3}ms  ({} calls)",
            total_assembly.as_secs_f64() * 1000.0,
            self.assembly_times.len()
        );
        println!(
            "  Linear solve:              {:>9.3}ms  ({} calls)",
            total_linear.as_secs_f64() * 1000.0,
            self.linear_solve_times.len()
        );
        println!("{}\n", "=".repeat(60));
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMING_STATS.with(|stats| {
        *stats.borrow_mut() = TimingStats::new();
    });
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

#[cfg(feature = "timing")]
fn timed<F, R>(f: F, slot: fn(&mut TimingStats) -> &mut Vec<Duration>) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| slot(&mut stats.borrow_mut()).push(elapsed));
    result
}

#[cfg(feature = "timing")]
pub fn record_assembly<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    timed(f, |s| &mut s.assembly_times)
}

#[cfg(not(feature = "timing"))]
pub fn record_assembly<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    timed(f, |s| &mut s.linear_solve_times)
}

#[cfg(not(feature = "timing"))]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

/// Snapshot of this thread's timings.
#[cfg(feature = "timing")]
pub fn current_timing() -> TimingStats {
    TIMING_STATS.with(|stats| stats.borrow().clone())
}

#[cfg(not(feature = "timing"))]
pub fn current_timing() -> TimingStats {
    TimingStats::new()
}
