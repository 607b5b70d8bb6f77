use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::string_list;
use crate::graph::{extract_graph, rename_subject_in_graph};
use crate::http_client;
use crate::policy::registry::Plugin;
use crate::policy::{args, PluginError, PolicyRecord};
use crate::serializer::frame_jsonld;
use crate::store::Store;
use crate::term::Term;

const CONTENT_TYPE: &str = "application/ld+json; charset=UTF-8";

/// Forwards the `ex:notification` resource of a policy to the inbox named
/// by `ex:to`
///
/// The notification subgraph is cut out of the policy graph, given a fresh
/// `urn:uuid:` identity and POSTed as a single JSON-LD object rooted at
/// that identity. An empty notification graph
/// or a non-2xx answer is a failed outcome.
#[derive(Debug, Clone)]
pub struct SendNotificationPlugin {
    allowed_domains: Vec<String>,
    context: IndexMap<String, String>,
}

impl SendNotificationPlugin {
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, PluginError> {
        let mut context = IndexMap::new();
        context.insert("as".to_string(), crate::term::ns::AS.to_string());
        if let Some(extra) = config.get("context") {
            let table = extra.as_object().ok_or_else(|| PluginError::InvalidArgument {
                name: "context".to_string(),
                reason: "expected a table of prefix = namespace".to_string(),
            })?;
            for (prefix, namespace) in table {
                let namespace = namespace.as_str().ok_or_else(|| PluginError::InvalidArgument {
                    name: format!("context.{}", prefix),
                    reason: "namespace must be a string".to_string(),
                })?;
                context.insert(prefix.clone(), namespace.to_string());
            }
        }

        Ok(SendNotificationPlugin {
            allowed_domains: string_list(config, "allowed_domains")?,
            context,
        })
    }

    /// Inbox URL and JSON-LD body, or `None` when there is nothing to send
    pub fn prepare(&self, policy_graph: &Store, policy: &PolicyRecord) -> Result<Option<(String, String)>, PluginError> {
        let to = policy.arg_str(args::TO)?;
        let notification = policy
            .arg(args::NOTIFICATION)
            .ok_or_else(|| PluginError::MissingArgument(args::NOTIFICATION.to_string()))?;

        let body = extract_graph(policy_graph, notification);
        if body.is_empty() {
            tracing::error!(notification = %notification, "notification has no triples in the policy graph");
            return Ok(None);
        }

        let id = Term::uri(format!("urn:uuid:{}", uuid::Uuid::new_v4()));
        let body = rename_subject_in_graph(&body, notification, &id);
        let text = frame_jsonld(&body, &id, &self.context)?;
        Ok(Some((to, text)))
    }
}

impl Plugin for SendNotificationPlugin {
    fn name(&self) -> &str {
        "send_notification"
    }

    fn execute(&self, _main: &Store, policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        let Some((to, body)) = self.prepare(policy_graph, policy)? else {
            return Ok(false);
        };

        tracing::info!(to = %to, "sending notification");
        match http_client::post_with(http_client::get_sync_client(), &self.allowed_domains, &to, CONTENT_TYPE, &body) {
            Ok(status) => {
                tracing::debug!(status, "notification accepted");
                Ok(true)
            }
            Err(http_client::HttpError::BadStatus(status)) => {
                tracing::error!(to = %to, status, "inbox rejected notification");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::parser::{parse, parse_n3, Format};
    use crate::policy::extract_policies;
    use crate::policy::DocumentContext;

    const POLICY: &str = "@prefix ex: <http://example.org/> .\n\
        @prefix fno: <https://w3id.org/function/ontology#> .\n\
        @prefix as: <https://www.w3.org/ns/activitystreams#> .\n\
        ex:p a fno:Execution ; fno:executes ex:Send ;\n\
            ex:to <INBOX> ;\n\
            ex:notification [ a as:Announce ; as:actor ex:alice ; as:object [ a as:Note ] ] .\n";

    /// Answer one request with `status` and hand back what was received
    fn serve_once(status: u16) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/inbox/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    length = value.trim().parse().unwrap();
                }
                let done = line == "\r\n";
                head.push_str(&line);
                if done {
                    break;
                }
            }
            let mut body = vec![0; length];
            reader.read_exact(&mut body).unwrap();
            let reply = format!("HTTP/1.1 {} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status);
            reader.get_mut().write_all(reply.as_bytes()).unwrap();
            head + &String::from_utf8(body).unwrap()
        });
        (url, handle)
    }

    fn setup(inbox: &str) -> (Store, PolicyRecord) {
        let store = parse_n3(&POLICY.replace("INBOX", inbox)).unwrap();
        let policy = extract_policies(&store, &DocumentContext::default())
            .into_values()
            .next()
            .unwrap();
        let policy_graph = extract_graph(&store, &policy.node);
        (policy_graph, policy)
    }

    fn plugin() -> SendNotificationPlugin {
        SendNotificationPlugin::from_config(&Map::new()).unwrap()
    }

    #[test]
    fn test_prepare_renames_notification() {
        let (graph, policy) = setup("http://example.org/inbox/");
        let (to, body) = plugin().prepare(&graph, &policy).unwrap().unwrap();
        assert_eq!(to, "http://example.org/inbox/");

        let sent = parse(&body, Format::JsonLd, None).unwrap().store;
        assert_eq!(sent.len(), 4);
        let subjects: Vec<String> = sent.subjects().iter().map(Term::value).collect();
        assert!(subjects.iter().any(|s| s.starts_with("urn:uuid:")));
    }

    #[test]
    fn test_body_is_one_object_rooted_at_new_id() {
        let (graph, policy) = setup("http://example.org/inbox/");
        let (_, body) = plugin().prepare(&graph, &policy).unwrap().unwrap();
        let doc: Value = serde_json::from_str(&body).unwrap();

        assert!(doc["@id"].as_str().unwrap().starts_with("urn:uuid:"));
        assert_eq!(doc["@context"]["as"], crate::term::ns::AS);
        assert_eq!(doc["@type"], "as:Announce");
        assert_eq!(doc["as:actor"]["@id"], "http://example.org/alice");
        assert_eq!(doc["as:object"]["@type"], "as:Note");
        assert!(doc.get("@graph").is_none());
    }

    #[test]
    fn test_missing_notification_graph() {
        let (_, policy) = setup("http://example.org/inbox/");
        assert!(plugin().prepare(&Store::new(), &policy).unwrap().is_none());
        assert!(!plugin().execute(&Store::new(), &Store::new(), &policy).unwrap());
    }

    #[test]
    fn test_bad_context_config() {
        let config = serde_json::json!({ "context": ["as"] });
        assert!(SendNotificationPlugin::from_config(config.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_posts_json_ld() {
        let (url, server) = serve_once(201);
        let (graph, policy) = setup(&url);
        assert!(plugin().execute(&Store::new(), &graph, &policy).unwrap());

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /inbox/"));
        assert!(request.contains("application/ld+json"));
        assert!(request.contains("urn:uuid:"));
    }

    #[test]
    fn test_rejected_post_is_a_failed_outcome() {
        let (url, server) = serve_once(400);
        let (graph, policy) = setup(&url);
        assert!(!plugin().execute(&Store::new(), &graph, &policy).unwrap());
        server.join().unwrap();
    }
}
