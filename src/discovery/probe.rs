//! WS-Discovery Probe messages and ProbeMatch parsing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::onvif::soap::collapse_whitespace;
use crate::onvif::xml::XmlNode;

/// Device types probed in every round, in send order.
pub const DEVICE_TYPES: [&str; 3] = ["NetworkVideoTransmitter", "Device", "NetworkVideoDisplay"];

const SCOPE_NAME: &str = "onvif://www.onvif.org/name/";
const SCOPE_HARDWARE: &str = "onvif://www.onvif.org/hardware/";
const SCOPE_LOCATION: &str = "onvif://www.onvif.org/location/";

/// A device that answered a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Endpoint reference address, e.g. `urn:uuid:...`. Unique per device.
    pub urn: String,
    pub name: String,
    pub hardware: String,
    pub location: String,
    pub types: Vec<String>,
    pub xaddrs: Vec<String>,
    pub scopes: Vec<String>,
}

/// Builds one Probe envelope for `device_type` with `message_id` as its MessageID.
pub fn build_probe(device_type: &str, message_id: Uuid) -> String {
    let probe = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing">
  <s:Header>
    <a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action>
    <a:MessageID>uuid:{}</a:MessageID>
    <a:ReplyTo>
      <a:Address>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address>
    </a:ReplyTo>
    <a:To s:mustUnderstand="1">urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>
  </s:Header>
  <s:Body>
    <Probe xmlns="http://schemas.xmlsoap.org/ws/2005/04/discovery">
      <d:Types xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:dp0="http://www.onvif.org/ver10/network/wsdl">dp0:{}</d:Types>
    </Probe>
  </s:Body>
</s:Envelope>"#,
        message_id.hyphenated(),
        device_type
    );
    collapse_whitespace(&probe)
}

/// Extracts every acceptable ProbeMatch from a datagram.
///
/// Malformed datagrams yield nothing. A match needs an endpoint address, at
/// least one XAddr and at least one scope.
pub fn parse_probe_matches(datagram: &[u8]) -> Vec<DiscoveredDevice> {
    let Ok(text) = std::str::from_utf8(datagram) else {
        return Vec::new();
    };
    let Ok(envelope) = XmlNode::parse(text) else {
        return Vec::new();
    };
    let Some(matches) = envelope.path(&["Body", "ProbeMatches"]) else {
        return Vec::new();
    };

    matches
        .children_named("ProbeMatch")
        .filter_map(parse_probe_match)
        .collect()
}

fn parse_probe_match(node: &XmlNode) -> Option<DiscoveredDevice> {
    let urn = node.text_at(&["EndpointReference", "Address"])?.to_string();
    let xaddrs = tokens(node, "XAddrs");
    let scopes = tokens(node, "Scopes");
    if xaddrs.is_empty() || scopes.is_empty() {
        return None;
    }

    let mut device = DiscoveredDevice {
        urn,
        name: String::new(),
        hardware: String::new(),
        location: String::new(),
        types: tokens(node, "Types"),
        xaddrs,
        scopes: Vec::new(),
    };

    for scope in &scopes {
        if scope.starts_with(SCOPE_HARDWARE) {
            device.hardware = last_segment(scope);
        } else if scope.starts_with(SCOPE_LOCATION) {
            device.location = last_segment(scope);
        } else if scope.starts_with(SCOPE_NAME) {
            device.name = last_segment(scope).replace('_', " ");
        }
    }
    device.scopes = scopes;

    Some(device)
}

fn tokens(node: &XmlNode, name: &str) -> Vec<String> {
    node.text_at(&[name])
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn last_segment(scope: &str) -> String {
    scope.rsplit('/').next().unwrap_or_default().to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::probe_matches;
    use super::*;

    #[test]
    fn test_build_probe() {
        let id = Uuid::new_v4();
        let probe = build_probe("NetworkVideoTransmitter", id);

        let tree = XmlNode::parse(&probe).unwrap();
        assert_eq!(
            tree.text_at(&["Header", "Action"]),
            Some("http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe")
        );
        assert_eq!(
            tree.text_at(&["Header", "MessageID"]),
            Some(format!("uuid:{}", id).as_str())
        );
        assert_eq!(
            tree.text_at(&["Header", "To"]),
            Some("urn:schemas-xmlsoap-org:ws:2005:04:discovery")
        );
        assert_eq!(
            tree.text_at(&["Body", "Probe", "Types"]),
            Some("dp0:NetworkVideoTransmitter")
        );
        assert!(!probe.contains(">\n"));
    }

    #[test]
    fn test_parse_probe_match() {
        let datagram = probe_matches(&[(
            "urn:uuid:2419d68a-2dd2-21b2-a205-ec71db000001",
            "http://192.168.1.20/onvif/device_service http://[fe80::1]/onvif/device_service",
            "onvif://www.onvif.org/type/video_encoder onvif://www.onvif.org/name/Front_Door_Cam onvif://www.onvif.org/hardware/RLC-811A onvif://www.onvif.org/location/country/china",
        )]);

        let devices = parse_probe_matches(datagram.as_bytes());
        assert_eq!(devices.len(), 1);
        let device = &devices[0];
        assert_eq!(device.urn, "urn:uuid:2419d68a-2dd2-21b2-a205-ec71db000001");
        assert_eq!(device.name, "Front Door Cam");
        assert_eq!(device.hardware, "RLC-811A");
        assert_eq!(device.location, "china");
        assert_eq!(device.types, vec!["dn:NetworkVideoTransmitter", "tds:Device"]);
        assert_eq!(device.xaddrs.len(), 2);
        assert_eq!(device.scopes.len(), 4);
    }

    #[test]
    fn test_multiple_matches_in_one_datagram() {
        let datagram = probe_matches(&[
            ("urn:uuid:a", "http://10.0.0.1/onvif/device_service", "onvif://www.onvif.org/name/A"),
            ("urn:uuid:b", "http://10.0.0.2/onvif/device_service", "onvif://www.onvif.org/name/B"),
        ]);
        let urns: Vec<String> = parse_probe_matches(datagram.as_bytes())
            .into_iter()
            .map(|d| d.urn)
            .collect();
        assert_eq!(urns, vec!["urn:uuid:a", "urn:uuid:b"]);
    }

    #[test]
    fn test_rejects_incomplete_matches() {
        let datagram = probe_matches(&[
            ("", "http://10.0.0.1/onvif/device_service", "onvif://www.onvif.org/name/A"),
            ("urn:uuid:b", "", "onvif://www.onvif.org/name/B"),
            ("urn:uuid:c", "http://10.0.0.3/onvif/device_service", ""),
        ]);
        assert!(parse_probe_matches(datagram.as_bytes()).is_empty());
    }

    #[test]
    fn test_ignores_garbage() {
        assert!(parse_probe_matches(b"\xff\xfe").is_empty());
        assert!(parse_probe_matches(b"M-SEARCH * HTTP/1.1\r\n").is_empty());
        assert!(parse_probe_matches(b"<s:Envelope><s:Body/></s:Envelope>").is_empty());
    }
}
