//! CLI command implementations.
//!
//! | Module   | Commands handled                      |
//! |----------|---------------------------------------|
//! | `serve`  | `Serve`                               |
//! | `jobs`   | `Status`, `Progress`, `Cancel`, `Purge` |
//! | `config` | `Config`                              |

pub mod config;
pub mod jobs;
pub mod serve;

pub use config::cmd_config;
pub use jobs::{cmd_cancel, cmd_progress, cmd_purge, cmd_status};
pub use serve::{ServeOverrides, cmd_serve};
