use std::time::Instant;

use tracing::debug;

use super::types::Outcome;
use crate::config::ProberConfig;

/// Performs a single health check against a target address.
///
/// Implementations never fail: transport problems come back as
/// [`Outcome::no_response`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Outcome;
}

/// HTTP/HTTPS GET prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(config: &ProberConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            // Upper bound for one probe: connect budget plus read budget
            .timeout(config.connect_timeout() + config.read_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &str) -> Outcome {
        let start = Instant::now();
        let result = self.client.get(target).send().await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(response) => Outcome::responded(response.status().as_u16(), elapsed_ms),
            Err(error) => {
                debug!(target, elapsed_ms, %error, "Probe got no response");
                Outcome::no_response(elapsed_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ProbeStatus;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_prober() -> HttpProber {
        HttpProber::new(&ProberConfig {
            connect_timeout_ms: 500,
            read_timeout_ms: 300,
            ..ProberConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reports_status_code_of_any_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let prober = fast_prober();

        let up = prober.probe(&format!("{}/up", server.uri())).await;
        assert_eq!(up.status, ProbeStatus::Responded(200));
        assert!(up.is_up());

        let down = prober.probe(&format!("{}/down", server.uri())).await;
        assert_eq!(down.status, ProbeStatus::Responded(500));
        assert!(!down.is_up());
    }

    #[tokio::test]
    async fn slow_response_is_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let outcome = fast_prober().probe(&format!("{}/slow", server.uri())).await;
        assert_eq!(outcome.status, ProbeStatus::NoResponse);
        assert!(outcome.elapsed_ms < 5_000);
    }

    #[tokio::test]
    async fn malformed_and_unresolvable_addresses_are_no_response() {
        let prober = fast_prober();

        assert_eq!(prober.probe("not a url").await.status, ProbeStatus::NoResponse);
        assert_eq!(
            prober.probe("http://does-not-exist.invalid/").await.status,
            ProbeStatus::NoResponse
        );
    }

    #[tokio::test]
    async fn refused_connection_is_no_response() {
        // Bind then drop to find a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = fast_prober().probe(&format!("http://127.0.0.1:{port}/")).await;
        assert_eq!(outcome.status, ProbeStatus::NoResponse);
    }
}
