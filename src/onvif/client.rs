use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;

use crate::onvif::digest::DigestAuthTransport;
use crate::onvif::endpoint::Endpoint;
use crate::onvif::error::{OnvifError, Result};
use crate::onvif::soap::{Namespace, SoapCodec};
use crate::onvif::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::onvif::xml::XmlNode;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Successful SOAP transaction.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    /// The `{operation}Response` element.
    pub body: XmlNode,
    /// Whole decoded envelope, kept for diagnostics.
    pub envelope: XmlNode,
    pub raw: String,
}

/// Sends SOAP envelopes through the digest transport and classifies the reply.
#[derive(Clone)]
pub struct SoapClient {
    transport: Arc<DigestAuthTransport<Box<dyn HttpTransport>>>,
    codec: SoapCodec,
}

impl SoapClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(timeout)?))
    }

    pub fn with_transport(transport: impl HttpTransport + 'static) -> Self {
        let transport: Box<dyn HttpTransport> = Box::new(transport);
        Self {
            transport: Arc::new(DigestAuthTransport::new(transport)),
            codec: SoapCodec::new(),
        }
    }

    pub fn codec(&self) -> &SoapCodec {
        &self.codec
    }

    pub fn transport(&self) -> &DigestAuthTransport<Box<dyn HttpTransport>> {
        &self.transport
    }

    /// Runs `operation` against `endpoint` with a fully built envelope.
    pub async fn call(&self, endpoint: &Endpoint, operation: &str, envelope: String) -> Result<SoapResponse> {
        tracing::trace!("Sending {} to {}: {}", operation, endpoint.url(), envelope);

        let length = envelope.len().to_string();
        let request = HttpRequest::new(Method::POST, endpoint.url().clone())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)?
            .header(CONTENT_LENGTH, &length)?
            .body(envelope);

        let response = self.transport.send(request, &endpoint.credentials()).await?;
        let status = response.status;
        let raw = response.text();
        tracing::trace!("Received {} for {}: {}", status, operation, raw);

        if !status.is_success() {
            let fault = self
                .codec
                .decode(&raw)
                .ok()
                .and_then(|tree| self.codec.extract_fault(&tree));
            return Err(match fault {
                Some(reason) => {
                    tracing::debug!("{} failed with HTTP {} and fault: {}", operation, status, reason);
                    OnvifError::RemoteFault(reason)
                }
                None => OnvifError::HttpStatus {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or_default().to_string(),
                },
            });
        }

        let envelope = self.codec.decode(&raw)?;
        if let Some(reason) = self.codec.extract_fault(&envelope) {
            return Err(OnvifError::RemoteFault(reason));
        }

        let response_name = format!("{}Response", operation);
        let body = envelope
            .path(&["Body", response_name.as_str()])
            .cloned()
            .ok_or_else(|| OnvifError::UnsupportedOperation(operation.to_string()))?;

        Ok(SoapResponse { body, envelope, raw })
    }
}

/// One ONVIF service on a device: endpoint, namespaces and the shared client.
#[derive(Clone)]
pub struct ServiceClient {
    endpoint: Endpoint,
    namespaces: &'static [Namespace],
    soap: SoapClient,
}

impl ServiceClient {
    pub fn new(endpoint: Endpoint, namespaces: &'static [Namespace], soap: SoapClient) -> Self {
        Self {
            endpoint,
            namespaces,
            soap,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn soap(&self) -> &SoapClient {
        &self.soap
    }

    /// Builds the envelope for `body` with the session's current credentials
    /// and clock offset, then performs the call.
    pub async fn request(&self, operation: &str, body: &str) -> Result<SoapResponse> {
        let envelope = self.soap.codec().encode(
            body,
            self.namespaces,
            self.endpoint.clock_offset(),
            &self.endpoint.credentials(),
        );
        self.soap.call(&self.endpoint, operation, envelope).await
    }
}
