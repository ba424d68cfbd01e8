//! Per-frame work partitioning. A load balancer divides a channel's
//! assignment space (tile indices, typically) among the worker pool.
//! Policies trade contention against balance: cyclic and simple are
//! contention-free static splits, the work queue pulls blocks from a
//! shared counter.

use crate::context::{RenderContext, SetupContext};

use std::ops::Range;

pub mod cyclic;
pub mod simple;
pub mod work_queue;

pub use cyclic::CyclicLoadBalancer;
pub use simple::SimpleLoadBalancer;
pub use work_queue::WorkQueueLoadBalancer;

pub trait LoadBalancer: Send + Sync {
    /// Called once per pipeline configuration change, before any other
    /// setup; allocates per-channel state.
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize);

    /// (Re)initializes one channel to cover `num_assignments` units of
    /// work. Called whenever the channel's geometry changes.
    fn setup_display_channel(&mut self, context: &SetupContext, num_assignments: usize);

    /// Resets the calling worker's cursor for a new frame. Must be
    /// fenced by the frame barrier: no worker may ask for assignments
    /// until every worker's setup_frame has completed.
    fn setup_frame(&self, context: &RenderContext);

    /// The next `[start, end)` range of unit indices for this worker,
    /// or `None` when the frame's work is exhausted. Safe to call
    /// concurrently from all workers; no unit is handed out twice.
    fn next_assignment(&self, context: &RenderContext) -> Option<Range<usize>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testutil::TestHarness;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::sync::{Barrier, Mutex};

    /// Drains every worker serially and checks the union of returned
    /// ranges is exactly [0, num_assignments) with no overlap, in at
    /// most num_assignments successful calls combined.
    pub fn check_full_disjoint_coverage(
        balancer: &dyn LoadBalancer,
        harness: &TestHarness,
        num_procs: usize,
        num_assignments: usize,
    ) {
        let mut seen = BTreeSet::new();
        let mut successful_calls = 0;
        for proc in 0..num_procs {
            let frame = harness.frame_state(0);
            let rng = RefCell::new(Pcg32::seed_from_u64(proc as u64));
            let ctx = harness.render_context(proc, num_procs, &frame, &rng);
            balancer.setup_frame(&ctx);
            while let Some(range) = balancer.next_assignment(&ctx) {
                successful_calls += 1;
                assert!(successful_calls <= num_assignments);
                for unit in range {
                    assert!(seen.insert(unit), "unit {} assigned twice", unit);
                }
            }
            // Exhaustion is sticky until the next setup_frame.
            assert!(balancer.next_assignment(&ctx).is_none());
        }
        assert_eq!(seen.len(), num_assignments);
    }

    /// Hammers the balancer from `num_procs` real threads and checks
    /// disjoint full coverage of the assignment space. The barrier
    /// plays the role of the pipeline's frame barrier between
    /// setup_frame and the first assignment request.
    pub fn check_concurrent_coverage(
        balancer: &dyn LoadBalancer,
        harness: &TestHarness,
        num_procs: usize,
        num_assignments: usize,
        max_range: Option<usize>,
    ) {
        let claimed = Mutex::new(Vec::new());
        let barrier = Barrier::new(num_procs);
        crossbeam::thread::scope(|s| {
            for proc in 0..num_procs {
                let claimed = &claimed;
                let barrier = &barrier;
                s.spawn(move |_| {
                    let frame = harness.frame_state(0);
                    let rng = RefCell::new(Pcg32::seed_from_u64(proc as u64));
                    let ctx = harness.render_context(proc, num_procs, &frame, &rng);
                    balancer.setup_frame(&ctx);
                    barrier.wait();
                    let mut local = Vec::new();
                    while let Some(range) = balancer.next_assignment(&ctx) {
                        if let Some(max) = max_range {
                            assert!(range.end - range.start <= max);
                        }
                        local.push(range);
                    }
                    claimed.lock().unwrap().extend(local);
                });
            }
        })
        .unwrap();

        let mut seen = BTreeSet::new();
        for range in claimed.into_inner().unwrap() {
            for unit in range {
                assert!(seen.insert(unit), "unit {} assigned twice", unit);
            }
        }
        assert_eq!(seen.len(), num_assignments);
    }
}
