use crate::context::{RenderContext, SetupContext};
use crate::load_balancer::LoadBalancer;

use crossbeam::utils::CachePadded;
use simple_error::{bail, SimpleResult};

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

// One contiguous slab per worker, handed out in a single assignment.
// Zero contention, zero balance: a worker that lands on the hard part
// of the image just takes longer.
struct ChannelInfo {
    num_assignments: usize,
    done: Vec<CachePadded<AtomicBool>>,
}

pub struct SimpleLoadBalancer {
    channels: Vec<ChannelInfo>,
}

impl SimpleLoadBalancer {
    pub fn new() -> Self {
        SimpleLoadBalancer {
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn LoadBalancer>> {
        if let Some(arg) = args.first() {
            bail!("unknown option for simple load balancer: {}", arg);
        }
        Ok(Box::new(SimpleLoadBalancer::new()))
    }
}

impl LoadBalancer for SimpleLoadBalancer {
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize) {
        self.channels.clear();
        for _ in 0..num_channels {
            self.channels.push(ChannelInfo {
                num_assignments: 0,
                done: (0..context.num_procs)
                    .map(|_| CachePadded::new(AtomicBool::new(true)))
                    .collect(),
            });
        }
    }

    fn setup_display_channel(&mut self, context: &SetupContext, num_assignments: usize) {
        self.channels[context.channel_index].num_assignments = num_assignments;
    }

    fn setup_frame(&self, context: &RenderContext) {
        self.channels[context.channel_index].done[context.proc].store(false, Ordering::Relaxed);
    }

    fn next_assignment(&self, context: &RenderContext) -> Option<Range<usize>> {
        let channel = &self.channels[context.channel_index];
        if channel.done[context.proc].swap(true, Ordering::Relaxed) {
            return None;
        }
        // Integer split that spreads the remainder evenly:
        let n = channel.num_assignments;
        let start = n * context.proc / context.num_procs;
        let end = n * (context.proc + 1) / context.num_procs;
        if start == end {
            return None;
        }
        Some(start..end)
    }
}
