use crate::fragment::Fragment;

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where finished fragments land. Display backends and file codecs
/// consume images elsewhere; the pipeline only needs set/get and the
/// validity handshake.
pub trait Image: Send + Sync {
    fn set(&self, fragment: &Fragment);
    fn get(&self, fragment: &mut Fragment);
    /// (stereo, xres, yres)
    fn resolution(&self) -> (bool, usize, usize);
    fn set_valid(&self, to: bool);
    fn is_valid(&self) -> bool;
}

/// Flat RGB float buffer, one plane per eye.
///
/// Workers write fragments concurrently through a shared reference, so
/// the pixel store sits in an `UnsafeCell`. This is sound because the
/// load balancer hands every pixel to exactly one worker per frame;
/// nothing else writes between `setup_frame` barriers.
pub struct SimpleImage {
    stereo: bool,
    xres: usize,
    yres: usize,
    valid: AtomicBool,
    data: UnsafeCell<Vec<[f32; 3]>>,
}

unsafe impl Sync for SimpleImage {}

impl SimpleImage {
    pub fn new(stereo: bool, xres: usize, yres: usize) -> Self {
        let num_eyes = if stereo { 2 } else { 1 };
        SimpleImage {
            stereo,
            xres,
            yres,
            valid: AtomicBool::new(false),
            data: UnsafeCell::new(vec![[0.0; 3]; xres * yres * num_eyes]),
        }
    }

    fn index(&self, x: usize, y: usize, eye: usize) -> usize {
        (eye * self.yres + y) * self.xres + x
    }

    /// Read access for display/tests; only meaningful once the frame's
    /// writers are past the barrier.
    pub fn pixel(&self, x: usize, y: usize, eye: usize) -> [f32; 3] {
        let data = unsafe { &*self.data.get() };
        data[self.index(x, y, eye)]
    }
}

impl Image for SimpleImage {
    fn set(&self, fragment: &Fragment) {
        let data = unsafe { &mut *self.data.get() };
        for i in fragment.begin()..fragment.end() {
            let idx = self.index(
                fragment.x(i) as usize,
                fragment.y(i) as usize,
                fragment.eye(i) as usize,
            );
            data[idx] = [
                fragment.color[0][i],
                fragment.color[1][i],
                fragment.color[2][i],
            ];
        }
    }

    fn get(&self, fragment: &mut Fragment) {
        let data = unsafe { &*self.data.get() };
        for i in fragment.begin()..fragment.end() {
            let idx = self.index(
                fragment.x(i) as usize,
                fragment.y(i) as usize,
                fragment.eye(i) as usize,
            );
            for c in 0..3 {
                fragment.color[c][i] = data[idx][c];
            }
        }
    }

    fn resolution(&self) -> (bool, usize, usize) {
        (self.stereo, self.xres, self.yres)
    }

    fn set_valid(&self, to: bool) {
        self.valid.store(to, Ordering::Release);
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}
