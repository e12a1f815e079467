use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfiguration,
    #[serde(default)]
    pub oauth: OAuthConfiguration,
    #[serde(default)]
    pub calendar: CalendarConfiguration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfiguration {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// UI route the authorization callback redirects back to.
    #[serde(default = "default_ui_redirect_url")]
    pub ui_redirect_url: String,

    #[serde(default = "default_authorization_ttl")]
    pub authorization_ttl_seconds: u64,

    #[serde(default)]
    pub secure_cookies: bool,
}

/// OAuth client settings. The credentials are optional so the server can
/// start without them; every authorization attempt re-checks them.
#[derive(Deserialize, Clone)]
pub struct OAuthConfiguration {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfiguration {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Service identity that owns every booked event.
    #[serde(default = "default_organizer_email")]
    pub organizer_email: String,

    pub organizer_name: Option<String>,

    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ui_redirect_url() -> String {
    "http://localhost:3000/surge".to_string()
}

fn default_authorization_ttl() -> u64 {
    600
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_refresh_token_ttl_days() -> i64 {
    30
}

fn default_api_base_url() -> String {
    gcal_api::BASE_URL.to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_organizer_email() -> String {
    "bookings@accelerator.example".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ui_redirect_url: default_ui_redirect_url(),
            authorization_ttl_seconds: default_authorization_ttl(),
            secure_cookies: false,
        }
    }
}

impl Default for OAuthConfiguration {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            refresh_token_ttl_days: default_refresh_token_ttl_days(),
        }
    }
}

impl Default for CalendarConfiguration {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            calendar_id: default_calendar_id(),
            organizer_email: default_organizer_email(),
            organizer_name: None,
            time_zone: default_time_zone(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for OAuthConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfiguration")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .finish()
    }
}

impl OAuthConfiguration {
    /// Names of the required settings that are unset or blank, in a stable
    /// order.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

impl Configuration {
    pub fn new() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(config::File::with_name("config"));
        }

        builder = builder
            .add_source(config::Environment::with_prefix("MENTOR_CALENDAR").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_missing_oauth_setting() {
        let oauth = OAuthConfiguration::default();
        assert_eq!(
            oauth.missing_settings(),
            vec!["client_id", "client_secret", "redirect_uri"]
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let oauth = OAuthConfiguration {
            client_id: Some("client".to_string()),
            client_secret: Some("   ".to_string()),
            redirect_uri: Some("http://localhost:8080/authorize/callback".to_string()),
            ..OAuthConfiguration::default()
        };
        assert_eq!(oauth.missing_settings(), vec!["client_secret"]);
    }

    #[test]
    fn debug_output_hides_client_secret() {
        let oauth = OAuthConfiguration {
            client_id: Some("client-123".to_string()),
            client_secret: Some("secret-456".to_string()),
            ..OAuthConfiguration::default()
        };
        let printed = format!("{:?}", oauth);
        assert!(printed.contains("client-123"));
        assert!(!printed.contains("secret-456"));
    }

    #[test]
    fn defaults_point_at_google() {
        let configuration = Configuration::default();
        assert_eq!(configuration.calendar.api_base_url, gcal_api::BASE_URL);
        assert_eq!(configuration.oauth.refresh_token_ttl_days, 30);
        assert_eq!(configuration.server.authorization_ttl_seconds, 600);
    }
}
