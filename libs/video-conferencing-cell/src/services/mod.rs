// libs/video-conferencing-cell/src/services/mod.rs

pub mod cloudflare;
pub mod registry;

pub use cloudflare::CloudflareRealtimeClient;
pub use registry::RouterRegistry;
