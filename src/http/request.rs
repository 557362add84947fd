use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Method;
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Overrides the dispatcher's default timeout for this request only.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set request body from string
    pub fn set_body(&mut self, body: String) {
        self.body = Some(body.into_bytes());
    }

    /// Set a header. Names or values that are not valid HTTP are dropped.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(header_name), Ok(header_value)) => {
                self.headers.insert(header_name, header_value);
                true
            }
            _ => false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Append `name=value` pairs to the Cookie header, keeping whatever is there.
    pub fn add_cookies<'a, I>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut jar: Vec<String> = self
            .header(COOKIE.as_str())
            .map(|c| vec![c.to_string()])
            .unwrap_or_default();

        for (name, value) in cookies {
            let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
            jar.push(format!("{}={}", name, encoded));
        }

        if !jar.is_empty() {
            self.set_header(COOKIE.as_str(), &jar.join("; "));
        }
    }

    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request with an urlencoded body
    pub fn post(url: Url, body: String) -> Self {
        let mut req = Self::new(Method::POST, url);
        req.set_body(body);
        req.set_header("Content-Type", "application/x-www-form-urlencoded");
        req
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_cookies_appends() {
        let mut req = HttpRequest::get(Url::parse("http://example.com/").unwrap());
        req.add_cookies([("session", "abc")]);
        req.add_cookies([("probe", "a b;c")]);
        assert_eq!(req.header("cookie"), Some("session=abc; probe=a+b%3Bc"));
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let mut req = HttpRequest::get(Url::parse("http://example.com/").unwrap());
        assert!(!req.set_header("X-Test", "line\r\nbreak"));
        assert!(req.headers.is_empty());
    }
}
