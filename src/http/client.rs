//! reqwest-backed dispatcher with throttling, default headers and cookie support

use crate::core::config::HttpConfig;
use crate::error::AuditError;
use crate::http::dispatch::Dispatcher;
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, Outcome};
use crate::http::throttle::Throttle;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct HttpClient {
    client: Client,
    throttle: Throttle,
    default_headers: HashMap<String, String>,
    cookies: Option<String>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, AuditError> {
        if config.max_concurrency == 0 {
            return Err(AuditError::config("http.max_concurrency must be at least 1"));
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            throttle: Throttle::new(config.max_concurrency, config.requests_per_second),
            default_headers: config.headers.clone(),
            cookies: config.cookies.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    async fn send(&self, req: HttpRequest) -> HttpResponse {
        let timeout = req.timeout.unwrap_or(self.timeout);
        let url = req.url.clone();

        let mut headers = req.headers.clone();

        // session cookies go first, audited cookies from the request follow;
        // a single Cookie header carries both
        if let Some(ref cookies) = self.cookies {
            let combined = match req.header(header::COOKIE.as_str()) {
                Some(existing) => format!("{}; {}", cookies, existing),
                None => cookies.clone(),
            };
            match header::HeaderValue::from_str(&combined) {
                Ok(value) => {
                    headers.insert(header::COOKIE, value);
                }
                Err(_) => tracing::debug!("Dropping unsendable session cookie for {}", url),
            }
        }

        for (key, value) in &self.default_headers {
            let Ok(header_name) = header::HeaderName::from_bytes(key.as_bytes()) else {
                continue;
            };
            if headers.contains_key(&header_name) {
                continue;
            }
            if let Ok(header_value) = header::HeaderValue::from_str(value) {
                headers.insert(header_name, header_value);
            }
        }

        let mut request = self
            .client
            .request(req.method.clone(), req.url.clone())
            .timeout(timeout)
            .headers(headers);

        if let Some(body) = req.body {
            request = request.body(body);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return failure(url, e, start),
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let mut headers: HashMap<String, String> = HashMap::new();
        for (k, v) in response.headers().iter() {
            let value = v.to_str().unwrap_or("");
            match headers.get_mut(k.as_str()) {
                Some(existing) => {
                    // Set-Cookie values may contain commas, keep them line separated
                    let sep = if *k == header::SET_COOKIE { "\n" } else { ", " };
                    existing.push_str(sep);
                    existing.push_str(value);
                }
                None => {
                    headers.insert(k.to_string(), value.to_string());
                }
            }
        }

        let body = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => return failure(final_url, e, start),
        };

        HttpResponse::new(final_url, status, headers, body, start.elapsed().as_millis())
    }
}

fn failure(url: url::Url, err: reqwest::Error, start: Instant) -> HttpResponse {
    let outcome = if err.is_timeout() {
        Outcome::TimedOut
    } else {
        Outcome::ConnectionFailed(err.to_string())
    };
    tracing::debug!("Request to {} failed: {:?}", url, outcome);
    HttpResponse::failed(url, outcome, start.elapsed().as_millis())
}

#[async_trait]
impl Dispatcher for HttpClient {
    async fn submit(&self, request: HttpRequest) -> HttpResponse {
        let _permit = match self.throttle.acquire().await {
            Ok(p) => p,
            Err(_) => {
                return HttpResponse::failed(
                    request.url,
                    Outcome::ConnectionFailed("dispatcher shut down".to_string()),
                    0,
                )
            }
        };

        self.send(request).await
    }

    fn max_concurrency(&self) -> usize {
        self.throttle.limit()
    }

    fn set_max_concurrency(&self, limit: usize) {
        self.throttle.set_limit(limit);
    }
}
