//! Channel-wide configuration.

/// Tunables for a [`crate::channel::Channel`].
///
/// A small typed struct, not a config-file loader: this is a library, not a
/// deployed service, so there is no on-disk configuration surface to parse.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum size of any single size-and-buffer field accepted from the
    /// wire. Defaults to [`courier_proto::DEFAULT_CEILING`] (16 MiB).
    pub framing_ceiling: usize,
    /// Whether `receive` asks the relay to long-poll.
    pub long_poll: bool,
    /// If `true`, `receive` reports per-item failures through the progress
    /// callback and continues; if `false` (default), the first per-item
    /// failure aborts the batch.
    pub continue_on_item_error: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            framing_ceiling: courier_proto::DEFAULT_CEILING,
            long_poll: true,
            continue_on_item_error: false,
        }
    }
}
