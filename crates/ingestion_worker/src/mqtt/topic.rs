use common::domain::{DomainError, DomainResult};

const ROOT: &str = "msh";
const PROTOCOL_VERSION: &str = "2";

/// Parts of a mesh MQTT topic, used to label the per-message span
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTopic {
    /// Region path between the root and the protocol version (e.g. `US/bayarea`)
    pub region: String,
    /// `e` (encrypted), `c`, `json`, `map`, `stat`, ...
    pub kind: String,
    pub channel: Option<String>,
    pub gateway_id: Option<String>,
}

/// Parse a topic in the format `msh/{region...}/2/{kind}/{channel}/{!gateway}`
///
/// Channel and gateway are optional since `map` and `stat` topics omit one or
/// both. Gateway ids are recognised by their leading `!`.
///
/// # Examples
/// ```
/// use ingestion_worker::mqtt::parse_topic;
///
/// let parsed = parse_topic("msh/US/2/e/LongFast/!abcd1234").unwrap();
/// assert_eq!(parsed.region, "US");
/// assert_eq!(parsed.channel.as_deref(), Some("LongFast"));
/// assert_eq!(parsed.gateway_id.as_deref(), Some("!abcd1234"));
/// ```
pub fn parse_topic(topic: &str) -> DomainResult<ParsedTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.first() != Some(&ROOT) {
        return Err(DomainError::InvalidTopic(format!(
            "topic '{}' does not start with '{}'",
            topic, ROOT
        )));
    }

    let version_idx = parts
        .iter()
        .position(|part| *part == PROTOCOL_VERSION)
        .ok_or_else(|| {
            DomainError::InvalidTopic(format!("topic '{}' has no protocol version", topic))
        })?;

    if version_idx < 2 {
        return Err(DomainError::InvalidTopic(format!(
            "topic '{}' has no region",
            topic
        )));
    }

    let kind = parts
        .get(version_idx + 1)
        .filter(|kind| !kind.is_empty())
        .ok_or_else(|| DomainError::InvalidTopic(format!("topic '{}' has no kind", topic)))?;

    let rest = &parts[version_idx + 2..];
    let channel = rest
        .iter()
        .find(|part| !part.is_empty() && !part.starts_with('!'))
        .map(|part| part.to_string());
    let gateway_id = rest
        .iter()
        .find(|part| part.starts_with('!'))
        .map(|part| part.to_string());

    Ok(ParsedTopic {
        region: parts[1..version_idx].join("/"),
        kind: kind.to_string(),
        channel,
        gateway_id,
    })
}
