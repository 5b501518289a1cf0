pub mod persistence;
pub mod settings;

pub use persistence::{load_config, save_config, ENV_PREFIX};
pub use settings::{
    ChatSettings, QueueSettings, RoleSettings, SessionConfig, SetupSettings, SyncSettings, ThrottleMode,
};
