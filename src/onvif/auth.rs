use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use quick_xml::escape::escape;
use sha1::{Digest, Sha1};

use crate::onvif::endpoint::Credentials;

const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const NS_WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Signed difference between the device clock and the local clock, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockOffset(i64);

impl ClockOffset {
    pub const ZERO: ClockOffset = ClockOffset(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Offset that maps `local` onto `device`.
    pub fn between(device: DateTime<Utc>, local: DateTime<Utc>) -> Self {
        Self((device - local).num_milliseconds())
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Local time shifted into the device's clock.
    pub fn apply(&self, local: DateTime<Utc>) -> DateTime<Utc> {
        local + Duration::milliseconds(self.0)
    }

    pub fn device_now(&self) -> DateTime<Utc> {
        self.apply(Utc::now())
    }
}

/// WS-Security `UsernameToken` with a `PasswordDigest` password.
#[derive(Debug, Clone)]
pub struct UsernameToken {
    pub username: String,
    pub nonce: [u8; 16],
    pub created: String,
    pub password_digest: String,
}

impl UsernameToken {
    /// Builds a token stamped with the device's notion of "now".
    pub fn new(credentials: &Credentials, offset: ClockOffset) -> Self {
        Self::with_nonce(credentials, offset.device_now(), rand::random())
    }

    pub fn with_nonce(credentials: &Credentials, created: DateTime<Utc>, nonce: [u8; 16]) -> Self {
        let created = created.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        // Base64(SHA1(nonce + created + password))
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(credentials.password.as_bytes());
        let password_digest = BASE64.encode(hasher.finalize());

        Self {
            username: credentials.username.clone(),
            nonce,
            created,
            password_digest,
        }
    }

    pub fn to_xml(&self) -> String {
        format!(
            r#"<Security s:mustUnderstand="1" xmlns="{wsse}">
  <UsernameToken>
    <Username>{user}</Username>
    <Password Type="{pwd_type}">{digest}</Password>
    <Nonce EncodingType="{nonce_type}">{nonce}</Nonce>
    <Created xmlns="{wsu}">{created}</Created>
  </UsernameToken>
</Security>"#,
            wsse = NS_WSSE,
            wsu = NS_WSU,
            user = escape(self.username.as_str()),
            pwd_type = PASSWORD_DIGEST_TYPE,
            digest = self.password_digest,
            nonce_type = NONCE_ENCODING_TYPE,
            nonce = BASE64.encode(self.nonce),
            created = self.created,
        )
    }
}
