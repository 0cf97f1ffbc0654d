use crate::onvif::auth::{ClockOffset, UsernameToken};
use crate::onvif::endpoint::Credentials;
use crate::onvif::error::Result;
use crate::onvif::xml::XmlNode;

pub const NS_SOAP_ENV: &str = "http://www.w3.org/2003/05/soap-envelope";

/// A namespace declaration added to the envelope, as `(prefix, uri)`.
pub type Namespace = (&'static str, &'static str);

/// Stateless SOAP 1.2 envelope codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoapCodec;

impl SoapCodec {
    pub fn new() -> Self {
        Self
    }

    /// Wraps `body` in an envelope. A WS-Security header is added when
    /// `credentials` carries a username; its timestamp is shifted by `offset`.
    pub fn encode(
        &self,
        body: &str,
        namespaces: &[Namespace],
        offset: ClockOffset,
        credentials: &Credentials,
    ) -> String {
        let mut soap = String::with_capacity(body.len() + 1024);
        soap.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        soap.push_str(&format!(r#"<s:Envelope xmlns:s="{}""#, NS_SOAP_ENV));
        for (prefix, uri) in namespaces {
            soap.push_str(&format!(r#" xmlns:{}="{}""#, prefix, uri));
        }
        soap.push('>');

        soap.push_str("<s:Header>");
        if !credentials.is_empty() {
            soap.push_str(&UsernameToken::new(credentials, offset).to_xml());
        }
        soap.push_str("</s:Header>");

        soap.push_str("<s:Body>");
        soap.push_str(body);
        soap.push_str("</s:Body>");
        soap.push_str("</s:Envelope>");

        collapse_whitespace(&soap)
    }

    /// Parses a response envelope into a prefix-free tree.
    pub fn decode(&self, envelope: &str) -> Result<XmlNode> {
        XmlNode::parse(envelope)
    }

    /// Reason text of a SOAP Fault, if the envelope carries one.
    pub fn extract_fault(&self, envelope: &XmlNode) -> Option<String> {
        let fault = envelope.path(&["Body", "Fault"])?;

        if let Some(reason) = fault.text_at(&["Reason", "Text"]) {
            return Some(reason.to_string());
        }

        let code = fault.text_at(&["Code", "Value"])?;
        match fault.text_at(&["Code", "Subcode", "Value"]) {
            Some(subcode) => Some(format!("{} {}", code, subcode)),
            None => Some(code.to_string()),
        }
    }
}

/// Removes whitespace that sits between two tags (`>\s+<` becomes `><`).
pub fn collapse_whitespace(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut pending = String::new();
    let mut after_tag = false;

    for ch in xml.chars() {
        if after_tag && ch.is_whitespace() {
            pending.push(ch);
            continue;
        }
        if ch != '<' {
            out.push_str(&pending);
        }
        pending.clear();
        out.push(ch);
        after_tag = ch == '>';
    }
    out.push_str(&pending);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onvif::error::OnvifError;

    const DEVICE_NS: &[Namespace] = &[
        ("tds", "http://www.onvif.org/ver10/device/wsdl"),
        ("tt", "http://www.onvif.org/ver10/schema"),
    ];

    #[test]
    fn test_encode_without_credentials() {
        let codec = SoapCodec::new();
        let soap = codec.encode(
            "<tds:GetCapabilities>\n  <tds:Category>All</tds:Category>\n</tds:GetCapabilities>",
            DEVICE_NS,
            ClockOffset::ZERO,
            &Credentials::default(),
        );

        assert!(soap.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope"#));
        assert!(soap.contains(r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#));
        assert!(soap.contains("<s:Header></s:Header>"));
        assert!(!soap.contains("UsernameToken"));
        assert!(soap.contains(
            "<s:Body><tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities></s:Body>"
        ));
    }

    #[test]
    fn test_encode_with_security_header() {
        let codec = SoapCodec::new();
        let soap = codec.encode(
            "<tds:GetDeviceInformation/>",
            DEVICE_NS,
            ClockOffset::from_millis(5_000),
            &Credentials::new("admin", "secret"),
        );

        let tree = codec.decode(&soap).unwrap();
        let token = tree
            .path(&["Header", "Security", "UsernameToken"])
            .unwrap();
        assert_eq!(token.text_at(&["Username"]), Some("admin"));
        assert!(token.text_at(&["Password"]).is_some());
        assert!(token.text_at(&["Nonce"]).is_some());
        assert!(token.text_at(&["Created"]).unwrap().ends_with('Z'));
        assert!(!soap.contains(">\n"));
    }

    #[test]
    fn test_round_trip_recovers_body() {
        let codec = SoapCodec::new();
        let fragment = r#"<trt:GetStreamUri><trt:StreamSetup><tt:Stream>RTP-Unicast</tt:Stream><tt:Transport><tt:Protocol>RTSP</tt:Protocol></tt:Transport></trt:StreamSetup><trt:ProfileToken>000</trt:ProfileToken></trt:GetStreamUri>"#;

        for credentials in [Credentials::default(), Credentials::new("admin", "pw")] {
            let soap = codec.encode(fragment, DEVICE_NS, ClockOffset::ZERO, &credentials);
            let tree = codec.decode(&soap).unwrap();
            let body = tree.child("Body").unwrap();
            assert_eq!(body.children().len(), 1);
            assert_eq!(body.children()[0], XmlNode::parse(fragment).unwrap());
        }
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("<a>\n  <b> x y </b>\t</a>"), "<a><b> x y </b></a>");
        assert_eq!(collapse_whitespace("<a>text </a>"), "<a>text </a>");
        assert_eq!(collapse_whitespace("<a/>  "), "<a/>  ");
    }

    #[test]
    fn test_extract_fault_reason() {
        let codec = SoapCodec::new();
        let tree = codec
            .decode(
                r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><env:Fault><env:Code><env:Value>env:Sender</env:Value><env:Subcode><env:Value>ter:NotAuthorized</env:Value></env:Subcode></env:Code><env:Reason><env:Text xml:lang="en">Sender not Authorized</env:Text></env:Reason></env:Fault></env:Body></env:Envelope>"#,
            )
            .unwrap();
        assert_eq!(codec.extract_fault(&tree).as_deref(), Some("Sender not Authorized"));
    }

    #[test]
    fn test_extract_fault_code_fallback() {
        let codec = SoapCodec::new();
        let tree = codec
            .decode(
                r#"<s:Envelope><s:Body><s:Fault><s:Code><s:Value>s:Receiver</s:Value><s:Subcode><s:Value>ter:ActionNotSupported</s:Value></s:Subcode></s:Code></s:Fault></s:Body></s:Envelope>"#,
            )
            .unwrap();
        assert_eq!(
            codec.extract_fault(&tree).as_deref(),
            Some("s:Receiver ter:ActionNotSupported")
        );
    }

    #[test]
    fn test_no_fault() {
        let codec = SoapCodec::new();
        let tree = codec
            .decode("<s:Envelope><s:Body><tds:GetHostnameResponse/></s:Body></s:Envelope>")
            .unwrap();
        assert_eq!(codec.extract_fault(&tree), None);
    }

    #[test]
    fn test_decode_error_is_parse_error() {
        let codec = SoapCodec::new();
        assert!(matches!(
            codec.decode("<s:Envelope><s:Body>"),
            Err(OnvifError::Parse(_))
        ));
    }
}
