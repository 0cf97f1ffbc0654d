use serde::{Deserialize, Serialize};

use crate::onvif::client::{ServiceClient, SoapClient};
use crate::onvif::endpoint::Endpoint;
use crate::onvif::error::Result;
use crate::onvif::soap::Namespace;
use crate::onvif::xml::XmlNode;

pub const NAMESPACES: &[Namespace] = &[
    ("wsa", "http://www.w3.org/2005/08/addressing"),
    ("tev", "http://www.onvif.org/ver10/events/wsdl"),
];

/// Summary of a `GetEventPropertiesResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProperties {
    pub topic_namespace_locations: Vec<String>,
    pub fixed_topic_set: bool,
    pub topic_expression_dialects: Vec<String>,
    pub message_content_filter_dialects: Vec<String>,
    /// Top-level topic names under `TopicSet`, e.g. `RuleEngine`, `VideoSource`.
    pub topics: Vec<String>,
}

impl EventProperties {
    pub fn from_node(response: &XmlNode) -> Self {
        let texts = |name: &str| -> Vec<String> {
            response
                .children_named(name)
                .map(|n| n.text().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        };

        Self {
            topic_namespace_locations: texts("TopicNamespaceLocation"),
            fixed_topic_set: response
                .text_at(&["FixedTopicSet"])
                .is_some_and(|v| v == "true"),
            topic_expression_dialects: texts("TopicExpressionDialect"),
            message_content_filter_dialects: texts("MessageContentFilterDialect"),
            topics: response
                .child("TopicSet")
                .map(|set| set.children().iter().map(|t| t.name().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Event service (`tev`).
#[derive(Clone)]
pub struct EventsService {
    service: ServiceClient,
}

impl EventsService {
    pub fn new(endpoint: Endpoint, soap: SoapClient) -> Self {
        Self {
            service: ServiceClient::new(endpoint, NAMESPACES, soap),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.service.endpoint()
    }

    pub async fn get_event_properties(&self) -> Result<EventProperties> {
        let response = self
            .service
            .request("GetEventProperties", "<tev:GetEventProperties/>")
            .await?;
        Ok(EventProperties::from_node(&response.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_properties() {
        let node = XmlNode::parse(
            r#"<tev:GetEventPropertiesResponse xmlns:tev="http://www.onvif.org/ver10/events/wsdl" xmlns:wstop="http://docs.oasis-open.org/wsn/t-1" xmlns:tns1="http://www.onvif.org/ver10/topics">
                <tev:TopicNamespaceLocation>http://www.onvif.org/onvif/ver10/topics/topicns.xml</tev:TopicNamespaceLocation>
                <wsnt:FixedTopicSet>true</wsnt:FixedTopicSet>
                <wstop:TopicSet>
                    <tns1:RuleEngine wstop:topic="true"/>
                    <tns1:VideoSource/>
                </wstop:TopicSet>
                <wsnt:TopicExpressionDialect>http://www.onvif.org/ver10/tev/topicExpression/ConcreteSet</wsnt:TopicExpressionDialect>
                <wsnt:TopicExpressionDialect>http://docs.oasis-open.org/wsn/t-1/TopicExpression/Concrete</wsnt:TopicExpressionDialect>
                <tev:MessageContentFilterDialect>http://www.onvif.org/ver10/tev/messageContentFilter/ItemFilter</tev:MessageContentFilterDialect>
            </tev:GetEventPropertiesResponse>"#,
        )
        .unwrap();

        let props = EventProperties::from_node(&node);
        assert!(props.fixed_topic_set);
        assert_eq!(props.topic_namespace_locations.len(), 1);
        assert_eq!(props.topic_expression_dialects.len(), 2);
        assert_eq!(props.message_content_filter_dialects.len(), 1);
        assert_eq!(props.topics, vec!["RuleEngine", "VideoSource"]);
    }
}
