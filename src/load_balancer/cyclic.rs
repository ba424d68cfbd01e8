use crate::context::{RenderContext, SetupContext};
use crate::load_balancer::LoadBalancer;

use crossbeam::utils::CachePadded;
use simple_error::{bail, SimpleResult};

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

// Each worker walks its own stripe of the assignment space, so the only
// state is a per-worker cursor. The starting offset rotates by one every
// frame so no worker is stuck with the same (possibly expensive) tiles
// forever.
struct ProcessorCursor {
    cur: AtomicUsize,
    count: AtomicUsize,
}

struct ChannelInfo {
    num_assignments: usize,
    cursors: Vec<CachePadded<ProcessorCursor>>,
}

pub struct CyclicLoadBalancer {
    channels: Vec<ChannelInfo>,
}

impl CyclicLoadBalancer {
    pub fn new() -> Self {
        CyclicLoadBalancer {
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn LoadBalancer>> {
        if let Some(arg) = args.first() {
            bail!("unknown option for cyclic load balancer: {}", arg);
        }
        Ok(Box::new(CyclicLoadBalancer::new()))
    }
}

impl LoadBalancer for CyclicLoadBalancer {
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize) {
        self.channels.clear();
        for _ in 0..num_channels {
            let cursors = (0..context.num_procs)
                .map(|_| {
                    CachePadded::new(ProcessorCursor {
                        cur: AtomicUsize::new(0),
                        count: AtomicUsize::new(0),
                    })
                })
                .collect();
            self.channels.push(ChannelInfo {
                num_assignments: 0,
                cursors,
            });
        }
    }

    fn setup_display_channel(&mut self, context: &SetupContext, num_assignments: usize) {
        self.channels[context.channel_index].num_assignments = num_assignments;
    }

    fn setup_frame(&self, context: &RenderContext) {
        let channel = &self.channels[context.channel_index];
        let cursor = &channel.cursors[context.proc];
        // Only the owning worker touches its cursor, the padding just
        // keeps neighbors off the same cache line:
        let count = cursor.count.fetch_add(1, Ordering::Relaxed) + 1;
        cursor
            .cur
            .store((context.proc + count) % context.num_procs, Ordering::Relaxed);
    }

    fn next_assignment(&self, context: &RenderContext) -> Option<Range<usize>> {
        let channel = &self.channels[context.channel_index];
        let cursor = &channel.cursors[context.proc];
        let cur = cursor.cur.load(Ordering::Relaxed);
        if cur >= channel.num_assignments {
            return None;
        }
        cursor.cur.store(cur + context.num_procs, Ordering::Relaxed);
        Some(cur..cur + 1)
    }
}
