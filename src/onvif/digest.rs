//! HTTP Digest authentication (RFC 2617) layered over an [`HttpTransport`].
//!
//! A request is sent as-is first. When the device answers `401` with a
//! `WWW-Authenticate: Digest ...` challenge, the request is re-issued exactly
//! once with an `Authorization` header. The nonce-count belongs to the
//! transport instance and only ever grows.

use md5::Md5;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::onvif::endpoint::Credentials;
use crate::onvif::error::Result;
use crate::onvif::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Anything other than `MD5` is hashed with SHA-256.
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("MD5") {
            DigestAlgorithm::Md5
        } else {
            DigestAlgorithm::Sha256
        }
    }

    pub fn hash(&self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(data.as_bytes())),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }
}

/// Parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    /// Algorithm token as sent by the device, `MD5` when omitted.
    pub algorithm: String,
}

impl DigestChallenge {
    /// Returns `None` for non-Digest challenges.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("Digest") {
            return None;
        }

        let params = parse_auth_params(params);
        // Some devices (e.g. DBPOWER) omit the algorithm entirely.
        let algorithm = params
            .get("algorithm")
            .cloned()
            .unwrap_or_else(|| "MD5".to_string());

        Some(Self {
            realm: params.get("realm").cloned().unwrap_or_default(),
            nonce: params.get("nonce").cloned().unwrap_or_default(),
            qop: params.get("qop").map(|qop| select_qop(qop)),
            opaque: params.get("opaque").cloned(),
            algorithm,
        })
    }

    pub fn hash_algorithm(&self) -> DigestAlgorithm {
        DigestAlgorithm::from_token(&self.algorithm)
    }
}

/// Every input to one digest response computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestParams<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub password: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub nonce: &'a str,
    pub nc: &'a str,
    pub cnonce: &'a str,
    pub qop: Option<&'a str>,
    pub algorithm: DigestAlgorithm,
}

/// `hash(HA1:nonce:nc:cnonce:qop:HA2)`, or `hash(HA1:nonce:HA2)` without qop.
pub fn digest_response(p: &DigestParams<'_>) -> String {
    let ha1 = p
        .algorithm
        .hash(&format!("{}:{}:{}", p.username, p.realm, p.password));
    let ha2 = p.algorithm.hash(&format!("{}:{}", p.method, p.uri));

    match p.qop {
        Some(qop) => p.algorithm.hash(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, p.nonce, p.nc, p.cnonce, qop, ha2
        )),
        None => p.algorithm.hash(&format!("{}:{}:{}", ha1, p.nonce, ha2)),
    }
}

/// Transport that answers Digest challenges transparently.
pub struct DigestAuthTransport<T = ReqwestTransport> {
    inner: T,
    nonce_count: AtomicU32,
}

impl<T: HttpTransport> DigestAuthTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            nonce_count: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Number of challenges answered so far by this instance.
    pub fn nonce_count(&self) -> u32 {
        self.nonce_count.load(Ordering::SeqCst)
    }

    pub async fn send(&self, request: HttpRequest, credentials: &Credentials) -> Result<HttpResponse> {
        let response = self.inner.execute(request.clone()).await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(DigestChallenge::parse);

        let Some(challenge) = challenge else {
            tracing::debug!("401 from {} without a Digest challenge", request.url);
            return Ok(response);
        };
        if credentials.is_empty() {
            tracing::debug!("Digest challenge from {} but no credentials configured", request.url);
            return Ok(response);
        }

        let authorization = self.authorization(&challenge, &request, credentials);
        tracing::debug!(
            "Answering Digest challenge from {} (realm={}, algorithm={})",
            request.url,
            challenge.realm,
            challenge.algorithm
        );

        let retry = request.header(AUTHORIZATION, &authorization)?;
        self.inner.execute(retry).await
    }

    fn authorization(
        &self,
        challenge: &DigestChallenge,
        request: &HttpRequest,
        credentials: &Credentials,
    ) -> String {
        let count = self.nonce_count.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let nc = format!("{:08x}", count);
        let cnonce = hex::encode(rand::random::<[u8; 8]>());
        let uri = request.request_uri();
        let method = request.method.as_str();

        let response = digest_response(&DigestParams {
            username: &credentials.username,
            realm: &challenge.realm,
            password: &credentials.password,
            method,
            uri: &uri,
            nonce: &challenge.nonce,
            nc: &nc,
            cnonce: &cnonce,
            qop: challenge.qop.as_deref(),
            algorithm: challenge.hash_algorithm(),
        });

        let mut fields = vec![
            format!(r#"username="{}""#, credentials.username),
            format!(r#"realm="{}""#, challenge.realm),
            format!(r#"nonce="{}""#, challenge.nonce),
            format!(r#"uri="{}""#, uri),
            format!("algorithm={}", challenge.algorithm),
        ];
        if let Some(qop) = &challenge.qop {
            fields.push(format!("qop={}", qop));
            fields.push(format!("nc={}", nc));
            fields.push(format!(r#"cnonce="{}""#, cnonce));
        }
        fields.push(format!(r#"response="{}""#, response));
        if let Some(opaque) = &challenge.opaque {
            fields.push(format!(r#"opaque="{}""#, opaque));
        }

        format!("Digest {}", fields.join(", "))
    }
}

/// Prefers `auth` when the device offers a list such as `auth,auth-int`.
fn select_qop(offered: &str) -> String {
    let options: Vec<&str> = offered.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if options.iter().any(|q| q.eq_ignore_ascii_case("auth")) {
        "auth".to_string()
    } else {
        options.first().copied().unwrap_or("auth").to_string()
    }
}

/// Splits `k=v, k="v, w"` pairs, unwrapping quoted-string values.
fn parse_auth_params(params: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape_next = false;

    for ch in params.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escape_next = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                insert_param(&mut map, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    insert_param(&mut map, &current);
    map
}

fn insert_param(map: &mut HashMap<String, String>, param: &str) {
    if let Some((key, value)) = param.trim().split_once('=') {
        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            map.insert(key, value.trim().to_string());
        }
    }
}
