//! Work distribution for independent, frame-asynchronous jobs (object
//! updates, rebuilds). A producer fills a `TaskList`, hands it to the
//! shared `TaskQueue`, and workers drain it between or during frames.
//!
//! A task list moves through four phases: Open (tasks being pushed),
//! Assigning (workers claiming tickets via `pop`), Draining (claimed
//! tasks executing), Finished (remaining count hits zero and the
//! reduction fires exactly once).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type TaskFn = Box<dyn Fn() + Send + Sync>;

/// One unit of work. Identity is the insertion index within its list.
pub struct Task {
    task_id: usize,
    work: TaskFn,
}

impl Task {
    pub fn task_id(&self) -> usize {
        self.task_id
    }

    pub fn run(&self) {
        (self.work)();
    }
}

/// An insertion-ordered batch of tasks with atomic completion counting.
///
/// `num_assigned` only ever goes up and never passes the task count;
/// `num_remaining` only goes down, reaching zero exactly once, at which
/// point the reduction (if any) runs synchronously on the thread that
/// observed the transition.
pub struct TaskList {
    tasks: Vec<Task>,
    num_assigned: AtomicUsize,
    num_remaining: AtomicUsize,
    reduction: Option<TaskFn>,
}

impl TaskList {
    pub fn new() -> Self {
        TaskList {
            tasks: Vec::new(),
            num_assigned: AtomicUsize::new(0),
            num_remaining: AtomicUsize::new(0),
            reduction: None,
        }
    }

    pub fn with_reduction(reduction: TaskFn) -> Self {
        let mut list = TaskList::new();
        list.reduction = Some(reduction);
        list
    }

    /// Appends a task while the list is still Open. Takes `&mut self`
    /// on purpose: population must finish before assignment starts.
    pub fn push_back(&mut self, work: TaskFn) -> usize {
        let task_id = self.tasks.len();
        self.tasks.push(Task { task_id, work });
        self.num_remaining.fetch_add(1, Ordering::Relaxed);
        task_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, task_id: usize) -> &Task {
        &self.tasks[task_id]
    }

    /// Claims the next unassigned task index, or `None` once every
    /// ticket has been issued. The compare-exchange loop keeps
    /// `num_assigned` from ever passing the task count, so over-claiming
    /// is impossible rather than undefined.
    pub fn pop(&self) -> Option<usize> {
        let mut assigned = self.num_assigned.load(Ordering::Relaxed);
        loop {
            if assigned >= self.tasks.len() {
                return None;
            }
            match self.num_assigned.compare_exchange_weak(
                assigned,
                assigned + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(assigned),
                Err(current) => assigned = current,
            }
        }
    }

    pub fn num_assigned(&self) -> usize {
        self.num_assigned.load(Ordering::Relaxed)
    }

    pub fn num_remaining(&self) -> usize {
        self.num_remaining.load(Ordering::Acquire)
    }

    /// Reports one task finished. The caller must pass each claimed id
    /// exactly once. Whoever drops the count to zero runs the
    /// reduction.
    pub fn finish_task(&self, task_id: usize) {
        debug_assert!(task_id < self.tasks.len());
        let before = self.num_remaining.fetch_sub(1, Ordering::AcqRel);
        assert!(before > 0, "finish_task called more times than tasks exist");
        if before == 1 {
            if let Some(reduction) = &self.reduction {
                reduction();
            }
        }
    }
}

impl Default for TaskList {
    fn default() -> Self {
        TaskList::new()
    }
}

/// A claim on one task of one list, handed out by the queue.
pub struct TaskClaim {
    pub list: Arc<TaskList>,
    pub task_id: usize,
}

impl TaskClaim {
    pub fn run(&self) {
        self.list.task(self.task_id).run();
    }

    pub fn finish(&self) {
        self.list.finish_task(self.task_id);
    }
}

/// FIFO of pending task lists. One lock serializes the O(1) claim and
/// insert operations; it is never held across task execution. Lists
/// stay owned by their inserter (the queue keeps an `Arc`), and a list
/// leaves the queue as soon as its last ticket is claimed -- which can
/// be well before its tasks finish draining.
pub struct TaskQueue {
    lists: Mutex<VecDeque<Arc<TaskList>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            lists: Mutex::new(VecDeque::new()),
        }
    }

    pub fn insert(&self, new_work: Arc<TaskList>) {
        debug_assert!(!new_work.is_empty());
        let mut lists = self.lists.lock().unwrap();
        lists.push_back(new_work);
    }

    /// Claims the next task from the front-most non-exhausted list, or
    /// `None` if no work is pending.
    pub fn grab_work(&self) -> Option<TaskClaim> {
        let mut lists = self.lists.lock().unwrap();
        loop {
            let front = match lists.front() {
                Some(front) => Arc::clone(front),
                None => return None,
            };
            match front.pop() {
                Some(task_id) => {
                    // Last ticket issued: drop the list from rotation.
                    if task_id + 1 == front.len() {
                        lists.pop_front();
                    }
                    return Some(TaskClaim {
                        list: front,
                        task_id,
                    });
                }
                None => {
                    // Already exhausted (e.g. popped directly by an
                    // owner that also holds the Arc).
                    lists.pop_front();
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.lock().unwrap().is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        TaskQueue::new()
    }
}
