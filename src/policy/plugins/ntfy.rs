use serde_json::{Map, Value};

use super::string_list;
use crate::http_client;
use crate::policy::registry::Plugin;
use crate::policy::{args, PluginError, PolicyRecord};
use crate::store::Store;

pub const TOPIC_ENV: &str = "KOREO_NTFY_TOPIC";
const DEFAULT_SERVER: &str = "https://ntfy.sh";

/// Pushes the `ex:message` argument to an ntfy topic
///
/// The topic comes from `KOREO_NTFY_TOPIC`, else the `topic` setting of
/// the registry entry. `server` overrides the public ntfy.sh instance.
#[derive(Debug, Clone)]
pub struct NtfyPlugin {
    server: String,
    topic: Option<String>,
    allowed_domains: Vec<String>,
}

impl NtfyPlugin {
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, PluginError> {
        let topic = std::env::var(TOPIC_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| config.get("topic").and_then(Value::as_str).map(str::to_string));
        let server = config
            .get("server")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SERVER)
            .trim_end_matches('/')
            .to_string();

        Ok(NtfyPlugin {
            server,
            topic,
            allowed_domains: string_list(config, "allowed_domains")?,
        })
    }

    /// Topic URL for this plugin, falling back to the record's config
    pub fn topic_url(&self, policy: &PolicyRecord) -> Result<String, PluginError> {
        let topic = self
            .topic
            .as_deref()
            .or_else(|| policy.config_str("topic"))
            .ok_or_else(|| PluginError::MissingConfig("topic".to_string()))?;
        Ok(format!("{}/{}", self.server, topic))
    }
}

impl Plugin for NtfyPlugin {
    fn name(&self) -> &str {
        "ntfy"
    }

    fn execute(&self, _main: &Store, _policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        let url = self.topic_url(policy)?;
        let message = policy.arg_str(args::MESSAGE)?;

        tracing::info!(url = %url, "sending ntfy message");
        let status = http_client::post_with(
            http_client::get_sync_client(),
            &self.allowed_domains,
            &url,
            "text/plain; charset=UTF-8",
            &message,
        )?;
        tracing::debug!(status, "ntfy accepted message");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DocumentContext;
    use crate::term::Term;
    use serde_json::json;

    fn plugin(config: Value) -> NtfyPlugin {
        let mut plugin = NtfyPlugin::from_config(config.as_object().unwrap()).unwrap();
        // ignore whatever the test environment exports
        plugin.topic = config.get("topic").and_then(Value::as_str).map(str::to_string);
        plugin
    }

    fn record() -> PolicyRecord {
        PolicyRecord::new(Term::uri("urn:p"), "urn:ntfy", &DocumentContext::default())
    }

    #[test]
    fn test_topic_url() {
        let ntfy = plugin(json!({ "topic": "alerts", "server": "https://push.example.org/" }));
        assert_eq!(ntfy.topic_url(&record()).unwrap(), "https://push.example.org/alerts");
    }

    #[test]
    fn test_topic_from_record_config() {
        let ntfy = plugin(json!({}));
        let mut policy = record();
        assert!(matches!(ntfy.topic_url(&policy), Err(PluginError::MissingConfig(_))));

        policy.config.insert("topic".into(), json!("later"));
        assert_eq!(ntfy.topic_url(&policy).unwrap(), "https://ntfy.sh/later");
    }

    #[test]
    fn test_missing_message() {
        let ntfy = plugin(json!({ "topic": "alerts" }));
        let err = ntfy.execute(&Store::new(), &Store::new(), &record()).unwrap_err();
        assert!(matches!(err, PluginError::MissingArgument(name) if name == args::MESSAGE));
    }

    #[test]
    fn test_allow_list_is_enforced() {
        let ntfy = plugin(json!({ "topic": "alerts", "allowed_domains": ["example.org"] }));
        let mut policy = record();
        policy.push_arg(args::MESSAGE, Term::literal("hi"));
        let err = ntfy.execute(&Store::new(), &Store::new(), &policy).unwrap_err();
        assert!(matches!(err, PluginError::Http(http_client::HttpError::DomainNotAllowed(_))));
    }
}
