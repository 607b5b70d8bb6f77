use crate::policy::registry::Plugin;
use crate::policy::{PluginError, PolicyRecord};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default)]
pub struct DemoPlugin;

impl Plugin for DemoPlugin {
    fn name(&self) -> &str {
        "demo"
    }

    fn execute(&self, _main: &Store, _policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        tracing::info!(
            executes = %policy.target,
            main_subject = %policy.main_subject,
            "hello from the demo plugin"
        );
        Ok(true)
    }
}
