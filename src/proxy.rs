//! Proxy configuration for a connect attempt, mirrored on the teacher's
//! `ProxyOptions` builder.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProxyOptions {
    url: Option<String>,
    auto: bool,
}

impl ProxyOptions {
    pub fn new() -> ProxyOptions {
        ProxyOptions::default()
    }

    /// Try to auto-detect the proxy from the environment.
    pub fn auto(&mut self) -> &mut ProxyOptions {
        self.auto = true;
        self.url = None;
        self
    }

    /// Use an explicit proxy URL.
    pub fn url(&mut self, url: &str) -> &mut ProxyOptions {
        self.url = Some(url.to_string());
        self.auto = false;
        self
    }

    pub fn resolved_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }
}
