use std::sync::Mutex;

use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::backend::core::error::CoordinatorError;

pub const APP_SCHEME: &str = "redbutton";
pub const DEV_HOST: &str = "localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkRequest {
    pub raw_url: String,
    pub token: Option<String>,
    pub is_register_route: bool,
}

impl DeepLinkRequest {
    pub fn parse(raw: &str) -> Result<Self, CoordinatorError> {
        let raw = raw.trim();
        let url = Url::parse(raw)
            .map_err(|err| CoordinatorError::MalformedInput(format!("deep link {raw:?}: {err}")))?;

        let token = url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
        // Custom-scheme links put `register` in the host slot.
        let is_register_route = raw.contains("/register") || url.path().contains("register");

        Ok(Self {
            raw_url: raw.to_string(),
            token,
            is_register_route,
        })
    }

    /// In-app route the main window should open. Needs both the register
    /// path and a token.
    pub fn registration_route(&self) -> Option<String> {
        if !self.is_register_route {
            return None;
        }
        let token = self.token.as_deref()?;
        let encoded: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
        Some(format!("register?token={encoded}"))
    }

    pub fn redacted_token(&self) -> String {
        self.token
            .as_deref()
            .map(redact_token)
            .unwrap_or_else(|| "none".to_string())
    }
}

/// Log-safe form of a registration token.
pub fn redact_token(token: &str) -> String {
    let head: String = token.chars().take(5).collect();
    format!("{head}...")
}

/// Recognizes deep links and holds the most recent one until the main
/// window can take it.
pub struct DeepLinkRouter {
    scheme: String,
    dev_host: String,
    pending: Mutex<Option<DeepLinkRequest>>,
}

impl Default for DeepLinkRouter {
    fn default() -> Self {
        Self::new(APP_SCHEME, DEV_HOST)
    }
}

impl DeepLinkRouter {
    pub fn new(scheme: impl Into<String>, dev_host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            dev_host: dev_host.into(),
            pending: Mutex::new(None),
        }
    }

    pub fn is_deep_link(&self, arg: &str) -> bool {
        arg.starts_with(&format!("{}://", self.scheme)) || arg.contains(&self.dev_host)
    }

    /// First launch argument that looks like a deep link.
    pub fn find_in_args<'a, I>(&self, args: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        args.into_iter()
            .map(String::as_str)
            .find(|arg| self.is_deep_link(arg))
    }

    /// Parses a URL and keeps it only if it leads somewhere.
    pub fn accept(&self, raw: &str) -> Option<DeepLinkRequest> {
        let request = match DeepLinkRequest::parse(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!("ignoring deep link: {err}");
                return None;
            }
        };
        info!(
            "deep link received: register={} token={}",
            request.is_register_route,
            request.redacted_token()
        );
        if request.registration_route().is_none() {
            debug!("deep link has no registration route or token, nothing to open");
            return None;
        }
        Some(request)
    }

    /// Holds a request for later; a newer one replaces an older one.
    pub fn defer(&self, request: DeepLinkRequest) {
        if let Ok(mut pending) = self.pending.lock() {
            if pending.replace(request).is_some() {
                debug!("replacing an older pending deep link");
            }
        }
    }

    pub fn take_pending(&self) -> Option<DeepLinkRequest> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }
}
