use crate::parser::Format;
use crate::policy::registry::Plugin;
use crate::policy::{PluginError, PolicyRecord};
use crate::serializer::{default_prefixes, serialize};
use crate::store::Store;

/// Logs everything it is handed and succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn name(&self) -> &str {
        "debug"
    }

    fn execute(&self, main: &Store, policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        let prefixes = default_prefixes();
        let record = serde_json::to_string_pretty(policy)
            .map_err(|e| PluginError::Other(format!("policy record: {}", e)))?;
        let main_text = serialize(main, Format::JsonLd, &prefixes)?;
        let policy_text = serialize(policy_graph, Format::Turtle, &prefixes)?;

        tracing::info!(policy = %policy.node, "debug plugin called");
        tracing::info!("policy record:\n{}", record);
        tracing::info!("main graph:\n{}", main_text);
        tracing::info!("policy graph:\n{}", policy_text);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_n3;
    use crate::policy::DocumentContext;
    use crate::term::Term;

    #[test]
    fn test_debug_always_succeeds() {
        let store = parse_n3("<urn:a> <urn:p> _:x . _:x <urn:q> \"v\" .").unwrap();
        let policy = PolicyRecord::new(Term::uri("urn:p"), "urn:debug", &DocumentContext::default());
        assert!(DebugPlugin.execute(&store, &Store::new(), &policy).unwrap());
    }
}
