//! Configuration for wabridge: TOML schema, file discovery, `${ENV_VAR}`
//! substitution, and the environment overrides the deployment platform
//! sets (`PORT`, `BACKEND_URL`, `CHAT_ENGINE_URL`).

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::WabridgeConfig,
};
