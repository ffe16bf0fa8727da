use super::queue::DEFAULT_QUEUE_CAPACITY;

/// Construction parameters for a [`Renderer`](super::Renderer).
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Bytes reserved up front for queued commands.
    ///
    /// The queue grows past this when a frame submits more; the default
    /// (10 MiB) covers typical frames without growth.
    pub initial_queue_capacity: usize,

    /// Clear color submitted when the renderer starts.
    pub clear_color: [f32; 4],

    /// Log per-frame statistics at trace level.
    pub log_frame_stats: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            log_frame_stats: true,
        }
    }
}
