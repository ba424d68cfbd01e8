use crate::context::{RenderContext, SetupContext};
use crate::image::Image;

pub mod tiled;

pub use tiled::TiledImageTraverser;

/// Walks the image plane, turning load balancer assignments into
/// fragments and handing them down the sampling stack.
pub trait ImageTraverser: Send + Sync {
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize);

    /// Recomputes the channel's tiling for its current resolution and
    /// returns how many assignments the load balancer should hand out
    /// per frame.
    fn setup_display_channel(&mut self, context: &SetupContext) -> usize;

    /// Per-frame hook; forwards down the stack so every stage sees the
    /// new frame exactly once per worker.
    fn setup_frame(&self, context: &RenderContext);

    /// Renders this worker's share of the frame into `image`. Returns
    /// once the load balancer runs dry.
    fn render_image(&self, context: &RenderContext, image: &dyn Image);
}
