//! Bundled plugins
//!
//! | kind                | effect                                         |
//! |---------------------|------------------------------------------------|
//! | `debug`             | logs the record and both graphs                |
//! | `demo`              | logs a greeting                                |
//! | `ntfy`              | posts `ex:message` to an ntfy topic            |
//! | `send_notification` | forwards `ex:notification` as JSON-LD to `ex:to` |

mod debug;
mod demo;
mod notification;
mod ntfy;

pub use debug::DebugPlugin;
pub use demo::DemoPlugin;
pub use notification::SendNotificationPlugin;
pub use ntfy::NtfyPlugin;

use serde_json::{Map, Value};

use super::PluginError;

/// Optional string list setting, e.g. `allowed_domains = ["example.org"]`
pub(crate) fn string_list(config: &Map<String, Value>, key: &str) -> Result<Vec<String>, PluginError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| PluginError::InvalidArgument {
                    name: key.to_string(),
                    reason: format!("expected a string, found {}", item),
                })
            })
            .collect(),
        Some(other) => Err(PluginError::InvalidArgument {
            name: key.to_string(),
            reason: format!("expected a list of strings, found {}", other),
        }),
    }
}
