use crate::context::{RenderContext, SetupContext};
use crate::load_balancer::LoadBalancer;

use crossbeam::utils::CachePadded;
use simple_error::{bail, SimpleResult};

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_GRANULARITY: usize = 8;

// All workers pull fixed-size blocks from one shared counter. The
// counter is the contention point, so blocks are handed out a few
// assignments at a time instead of one by one.
struct ChannelInfo {
    num_assignments: usize,
    cursor: CachePadded<AtomicUsize>,
}

pub struct WorkQueueLoadBalancer {
    granularity: usize,
    channels: Vec<ChannelInfo>,
}

impl WorkQueueLoadBalancer {
    pub fn new(granularity: usize) -> Self {
        WorkQueueLoadBalancer {
            granularity,
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn LoadBalancer>> {
        let mut granularity = DEFAULT_GRANULARITY;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-granularity" => {
                    let value = match iter.next() {
                        Some(value) => value,
                        None => bail!("-granularity needs a value"),
                    };
                    granularity = match value.parse() {
                        Ok(g) if g > 0 => g,
                        _ => bail!("bad granularity: {}", value),
                    };
                }
                _ => bail!("unknown option for work queue load balancer: {}", arg),
            }
        }
        Ok(Box::new(WorkQueueLoadBalancer::new(granularity)))
    }
}

impl LoadBalancer for WorkQueueLoadBalancer {
    fn setup_begin(&mut self, _context: &SetupContext, num_channels: usize) {
        self.channels.clear();
        for _ in 0..num_channels {
            self.channels.push(ChannelInfo {
                num_assignments: 0,
                cursor: CachePadded::new(AtomicUsize::new(0)),
            });
        }
    }

    fn setup_display_channel(&mut self, context: &SetupContext, num_assignments: usize) {
        let channel = &mut self.channels[context.channel_index];
        channel.num_assignments = num_assignments;
        *channel.cursor.get_mut() = num_assignments;
    }

    fn setup_frame(&self, context: &RenderContext) {
        // One worker rewinds the shared counter; the frame barrier
        // keeps everyone else from claiming until it has.
        if context.proc == 0 {
            self.channels[context.channel_index]
                .cursor
                .store(0, Ordering::Release);
        }
    }

    fn next_assignment(&self, context: &RenderContext) -> Option<Range<usize>> {
        let channel = &self.channels[context.channel_index];
        let mut cur = channel.cursor.load(Ordering::Relaxed);
        loop {
            if cur >= channel.num_assignments {
                return None;
            }
            let end = (cur + self.granularity).min(channel.num_assignments);
            match channel
                .cursor
                .compare_exchange_weak(cur, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Some(cur..end),
                Err(now) => cur = now,
            }
        }
    }
}
