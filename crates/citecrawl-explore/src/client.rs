//! Metadata client for the Semantic Scholar paper endpoint

use citecrawl_core::http::TOO_MANY_REQUESTS;
use citecrawl_core::{HttpError, SHARED_RUNTIME};

use crate::paper::{MalformedRecord, PaperRecord};

/// Why a single lookup failed (never fatal to the run)
#[derive(Debug)]
pub enum LookupError {
    /// Transport error, timeout, or unexpected status
    Http(HttpError),
    /// 200 response whose body could not be normalized
    Malformed(MalformedRecord),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Malformed(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Outcome of one lookup attempt
#[derive(Debug)]
pub enum Signal {
    Success(PaperRecord),
    /// Service asked us to back off; identity should be rotated
    RateLimited,
    Failure(LookupError),
}

/// One outbound lookup per call, no internal retries.
///
/// Implementations classify every failure into [`Signal`] instead of
/// returning errors.
pub trait MetadataClient {
    fn lookup(&self, id: &str) -> Signal;
}

/// Client for `GET <base_url>/<paperId>`
pub struct S2Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl S2Client {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Send `x-api-key` with every lookup
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Endpoint for `id`.
    ///
    /// Characters such as `#`, `?` and spaces are percent-encoded; `/` is
    /// kept so DOI ids like `DOI:10.1145/3292500.3330701` reach the service
    /// as-is.
    pub fn paper_url(&self, id: &str) -> Result<reqwest::Url, HttpError> {
        let invalid = |message: String| HttpError::Http {
            status: None,
            message,
        };
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("invalid lookup URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("lookup URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(id.split('/'));
        Ok(url)
    }

    /// Fetch an IP echo endpoint through this client (egress check)
    pub fn egress_ip(&self, echo_url: &str) -> Result<String, HttpError> {
        let result: Result<String, reqwest::Error> = SHARED_RUNTIME.handle().block_on(async {
            self.http
                .get(echo_url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        });
        result
            .map(|text| text.trim().to_string())
            .map_err(|e| HttpError::from_reqwest(&e))
    }

    /// Body of a 2xx response, `None` on 429
    fn fetch(&self, url: reqwest::Url) -> Result<Option<Vec<u8>>, reqwest::Error> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut request = self.http.get(url);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }
            let response = request.send().await?;
            if response.status().as_u16() == TOO_MANY_REQUESTS {
                return Ok(None);
            }
            let body = response.error_for_status()?.bytes().await?;
            Ok(Some(body.to_vec()))
        })
    }
}

impl MetadataClient for S2Client {
    fn lookup(&self, id: &str) -> Signal {
        let url = match self.paper_url(id) {
            Ok(url) => url,
            Err(e) => return Signal::Failure(LookupError::Http(e)),
        };
        match self.fetch(url) {
            Ok(None) => Signal::RateLimited,
            Ok(Some(body)) => match PaperRecord::from_json(&body) {
                Ok(record) => Signal::Success(record),
                Err(e) => Signal::Failure(LookupError::Malformed(e)),
            },
            Err(e) => {
                let err = HttpError::from_reqwest(&e);
                if err.is_rate_limited() {
                    Signal::RateLimited
                } else {
                    Signal::Failure(LookupError::Http(err))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use citecrawl_core::{HttpSettings, build_client};
    use tokio::runtime::Runtime;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAPER: &str = r#"{"paperId": "abc", "title": "T", "authors": [{"name": "X"}],
        "year": 2020, "abstract": null, "citationVelocity": 1.5,
        "influentialCitationCount": 2, "citations": [{"paperId": "d"}, {"paperId": "e"}]}"#;

    // The client blocks on the shared runtime, so the mock server gets its own.
    fn test_runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn serve(rt: &Runtime, route: &str, response: ResponseTemplate) -> MockServer {
        rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(&server)
                .await;
            server
        })
    }

    fn client_for(server: &MockServer, timeout: Duration) -> S2Client {
        let settings = HttpSettings {
            timeout,
            ..Default::default()
        };
        S2Client::new(
            build_client(&settings).unwrap(),
            format!("{}/v1/paper/", server.uri()),
        )
    }

    #[test]
    fn paper_url_joins_single_slash() {
        let http = build_client(&HttpSettings::default()).unwrap();
        let client = S2Client::new(http, "https://api.semanticscholar.org/v1/paper/");
        assert_eq!(
            client.paper_url("arXiv:1705.10311").unwrap().as_str(),
            "https://api.semanticscholar.org/v1/paper/arXiv:1705.10311"
        );
    }

    #[test]
    fn paper_url_encodes_reserved_characters() {
        let http = build_client(&HttpSettings::default()).unwrap();
        let client = S2Client::new(http, "https://api.semanticscholar.org/v1/paper");
        assert_eq!(
            client.paper_url("a b#c?d").unwrap().as_str(),
            "https://api.semanticscholar.org/v1/paper/a%20b%23c%3Fd"
        );
        assert_eq!(
            client.paper_url("DOI:10.1145/3292500").unwrap().as_str(),
            "https://api.semanticscholar.org/v1/paper/DOI:10.1145/3292500"
        );
    }

    #[test]
    fn bad_base_url_is_failure() {
        let http = build_client(&HttpSettings::default()).unwrap();
        let client = S2Client::new(http, "not a url");
        assert!(matches!(
            client.lookup("abc"),
            Signal::Failure(LookupError::Http(HttpError::Http { status: None, .. }))
        ));
    }

    #[test]
    fn doi_id_reaches_the_service_path() {
        let rt = test_runtime();
        let server = serve(
            &rt,
            "/v1/paper/DOI:10.1145/3292500",
            ResponseTemplate::new(200).set_body_string(PAPER),
        );
        let client = client_for(&server, Duration::from_secs(5));
        assert!(matches!(client.lookup("DOI:10.1145/3292500"), Signal::Success(_)));
    }

    #[test]
    fn ok_response_is_success() {
        let rt = test_runtime();
        let server = serve(
            &rt,
            "/v1/paper/abc",
            ResponseTemplate::new(200).set_body_string(PAPER),
        );
        let client = client_for(&server, Duration::from_secs(5));

        match client.lookup("abc") {
            Signal::Success(record) => {
                assert_eq!(record.id, "abc");
                assert_eq!(record.citations, vec!["d", "e"]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn status_429_is_rate_limited() {
        let rt = test_runtime();
        let server = serve(&rt, "/v1/paper/abc", ResponseTemplate::new(429));
        let client = client_for(&server, Duration::from_secs(5));
        assert!(matches!(client.lookup("abc"), Signal::RateLimited));
    }

    #[test]
    fn status_404_is_failure() {
        let rt = test_runtime();
        let server = serve(&rt, "/v1/paper/abc", ResponseTemplate::new(404));
        let client = client_for(&server, Duration::from_secs(5));
        match client.lookup("abc") {
            Signal::Failure(LookupError::Http(e)) => assert_eq!(e.status(), Some(404)),
            other => panic!("expected HTTP failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_failure() {
        let rt = test_runtime();
        let server = serve(
            &rt,
            "/v1/paper/abc",
            ResponseTemplate::new(200).set_body_string(r#"{"paperId": "abc", "title": "T"}"#),
        );
        let client = client_for(&server, Duration::from_secs(5));
        assert!(matches!(
            client.lookup("abc"),
            Signal::Failure(LookupError::Malformed(MalformedRecord::MissingField(
                "citations"
            )))
        ));
    }

    #[test]
    fn slow_response_times_out_as_failure() {
        let rt = test_runtime();
        let server = serve(
            &rt,
            "/v1/paper/abc",
            ResponseTemplate::new(200)
                .set_body_string(PAPER)
                .set_delay(Duration::from_secs(3)),
        );
        let client = client_for(&server, Duration::from_millis(200));
        assert!(matches!(
            client.lookup("abc"),
            Signal::Failure(LookupError::Http(HttpError::Timeout))
        ));
    }

    #[test]
    fn api_key_header_is_sent() {
        let rt = test_runtime();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/paper/abc"))
                .and(header("x-api-key", "secret"))
                .respond_with(ResponseTemplate::new(200).set_body_string(PAPER))
                .mount(&server)
                .await;
            server
        });
        let client = client_for(&server, Duration::from_secs(5)).with_api_key(Some("secret".into()));
        assert!(matches!(client.lookup("abc"), Signal::Success(_)));
    }
}
