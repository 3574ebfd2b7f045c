/*++

Licensed under the Apache-2.0 license.

File Name:

    server.rs

Abstract:

    Client side of the two provisioning server exchanges.

--*/

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use rkp_error::{ProvisionerError, ProvisionerResult};

use crate::ProvisionerConfig;

pub const EEK_PATH: &str = "/v1/eekchain";
pub const SIGN_PATH: &str = "/v1:signCertificates";
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

/// The remote signing service. Calls are never retried here.
pub trait ProvisioningServer {
    /// Fetch the encoded encryption key response.
    fn fetch_eek(&self, base_url: &str) -> ProvisionerResult<Vec<u8>>;

    /// Submit a CSR bundle and return the encoded signed certificates.
    fn sign_certificates(
        &self,
        base_url: &str,
        csr: &[u8],
        challenge: &[u8],
    ) -> ProvisionerResult<Vec<u8>>;
}

fn parse_url(url: &str) -> ProvisionerResult<Url> {
    Url::parse(url).map_err(|err| {
        log::error!("Invalid provisioning URL {url}: {err}");
        ProvisionerError::TRANSPORT_INVALID_URL
    })
}

pub fn eek_url(base_url: &str) -> ProvisionerResult<Url> {
    parse_url(&format!("{}{EEK_PATH}", base_url.trim_end_matches('/')))
}

/// The challenge goes in the query as UTF-8 text, with invalid sequences
/// replaced.
pub fn sign_url(base_url: &str, challenge: &[u8]) -> ProvisionerResult<Url> {
    let challenge = String::from_utf8_lossy(challenge);
    let mut url = parse_url(&format!("{}{SIGN_PATH}", base_url.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("challenge", &challenge);
    Ok(url)
}

/// [`ProvisioningServer`] over HTTPS.
pub struct HttpServer {
    client: Client,
    strict_http_status: bool,
}

impl HttpServer {
    pub fn new(config: &ProvisionerConfig) -> ProvisionerResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| {
                log::error!("Failed to build HTTP client: {err}");
                ProvisionerError::TRANSPORT_CLIENT_BUILD
            })?;
        Ok(Self {
            client,
            strict_http_status: config.strict_http_status,
        })
    }

    fn read_body(&self, what: &str, response: Response) -> ProvisionerResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            if self.strict_http_status {
                log::error!("Server returned {status} for {what}");
                return Err(ProvisionerError::TRANSPORT_BAD_STATUS);
            }
            log::warn!("Server returned {status} for {what}, reading body anyway");
        }
        let body = response.bytes().map_err(|err| {
            log::error!("Failed to read {what} response body: {err}");
            ProvisionerError::TRANSPORT_BODY_READ
        })?;
        log::debug!("Read {} byte {what} response", body.len());
        Ok(body.to_vec())
    }
}

impl ProvisioningServer for HttpServer {
    fn fetch_eek(&self, base_url: &str) -> ProvisionerResult<Vec<u8>> {
        let url = eek_url(base_url)?;
        log::info!("Fetching encryption key from {url}");
        let response = self.client.get(url).send().map_err(|err| {
            log::error!("Failed to fetch encryption key: {err}");
            ProvisionerError::TRANSPORT_REQUEST_FAILED
        })?;
        self.read_body("eekchain", response)
    }

    fn sign_certificates(
        &self,
        base_url: &str,
        csr: &[u8],
        challenge: &[u8],
    ) -> ProvisionerResult<Vec<u8>> {
        let url = sign_url(base_url, challenge)?;
        log::info!("Submitting {} byte CSR bundle", csr.len());
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(csr.to_vec())
            .send()
            .map_err(|err| {
                log::error!("Failed to submit CSR bundle: {err}");
                ProvisionerError::TRANSPORT_REQUEST_FAILED
            })?;
        self.read_body("signCertificates", response)
    }
}
