use serde::{Deserialize, Serialize};

/// Configuration for the marketplace module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketplaceConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Buffer of the notification broadcast bus; lagging subscribers
    /// lose the oldest events once this fills up.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            event_buffer: default_event_buffer(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_event_buffer() -> usize {
    256
}

fn default_max_message_length() -> usize {
    4000
}
