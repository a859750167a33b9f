pub mod core;

// Re-export main types for easier access
pub use self::core::{
    FanOutSettings, GradesSettings, IpsSettings, MoviesSettings, PipeworkConfig, PoolSettings,
    Settings, VowelsSettings,
};
