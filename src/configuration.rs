use serde;
use std::net::Ipv6Addr;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_SERVICE_NAME: &str = "send_message_service";
pub const DEFAULT_CLIENT_EXAMPLE: &str = "https://github.com/rb58853/fastchat-mcp";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub app_host: String,
    pub app_port: u16,
    pub service_name: String,
    /// Externally reachable base URL, e.g. `https://gateway.example.com`.
    /// Computed from the bound address when absent.
    #[serde(default)]
    pub expose_url: Option<String>,
    pub client_example: String,
    pub shutdown_timeout_secs: u64,
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Settings {
    /// Service name as it appears in URLs: spaces become underscores.
    pub fn mount_name(&self) -> String {
        self.service_name.trim().replace(' ', "_")
    }

    // Path of the protocol endpoint: /<service>/mcp
    pub fn mcp_path(&self) -> String {
        format!("/{}/mcp", self.mount_name())
    }

    pub fn advertised_base_url(&self, bound_port: u16) -> String {
        match &self.expose_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => {
                let host = match self.app_host.as_str() {
                    "0.0.0.0" | "::" | "" => "localhost".to_string(),
                    // IPv6 literals need brackets inside a URL
                    host if host.parse::<Ipv6Addr>().is_ok() => format!("[{}]", host),
                    host => host.to_string(),
                };
                format!("http://{}:{}", host, bound_port)
            }
        }
    }

    pub fn mcp_endpoint_url(&self, bound_port: u16) -> String {
        format!("{}{}", self.advertised_base_url(bound_port), self.mcp_path())
    }
}

pub fn get_configuration(overrides: Overrides) -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let file = overrides
        .config_file
        .clone()
        .unwrap_or_else(|| "configuration".to_string());

    let settings = config::Config::builder()
        .set_default("app_host", DEFAULT_HOST)?
        .set_default("app_port", i64::from(DEFAULT_PORT))?
        .set_default("service_name", DEFAULT_SERVICE_NAME)?
        .set_default("client_example", DEFAULT_CLIENT_EXAMPLE)?
        .set_default("shutdown_timeout_secs", 10_i64)?
        // .json, .toml, .yaml, .yml; an explicitly given file must exist
        .add_source(config::File::with_name(&file).required(overrides.config_file.is_some()))
        // GATEWAY_APP_PORT=9000, GATEWAY_EXPOSE_URL=https://...
        .add_source(config::Environment::with_prefix("GATEWAY"))
        .set_override_option("app_host", overrides.host)?
        .set_override_option("app_port", overrides.port.map(i64::from))?
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            app_host: DEFAULT_HOST.to_string(),
            app_port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            expose_url: None,
            client_example: DEFAULT_CLIENT_EXAMPLE.to_string(),
            shutdown_timeout_secs: 10,
        }
    }

    #[test]
    fn wildcard_host_is_advertised_as_localhost() {
        let settings = settings();
        assert_eq!(
            settings.mcp_endpoint_url(8765),
            "http://localhost:8765/send_message_service/mcp"
        );
    }

    #[test]
    fn concrete_host_is_advertised_verbatim() {
        let mut settings = settings();
        settings.app_host = "10.1.2.3".to_string();
        assert_eq!(settings.advertised_base_url(9000), "http://10.1.2.3:9000");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let mut settings = settings();
        settings.app_host = "::1".to_string();
        assert_eq!(
            settings.mcp_endpoint_url(8765),
            "http://[::1]:8765/send_message_service/mcp"
        );

        settings.app_host = "fe80::1".to_string();
        assert_eq!(settings.advertised_base_url(9000), "http://[fe80::1]:9000");

        settings.app_host = "::".to_string();
        assert_eq!(settings.advertised_base_url(9000), "http://localhost:9000");
    }

    #[test]
    fn expose_url_wins_and_loses_trailing_slash() {
        let mut settings = settings();
        settings.expose_url = Some("https://gw.example.com/".to_string());
        assert_eq!(
            settings.mcp_endpoint_url(8765),
            "https://gw.example.com/send_message_service/mcp"
        );
    }

    #[test]
    fn spaces_in_service_name_become_underscores() {
        let mut settings = settings();
        settings.service_name = "send message service".to_string();
        assert_eq!(settings.mcp_path(), "/send_message_service/mcp");
    }

    #[test]
    fn cli_overrides_beat_defaults() {
        let settings = get_configuration(Overrides {
            config_file: None,
            host: Some("127.0.0.1".to_string()),
            port: Some(9001),
        })
        .unwrap();

        assert_eq!(settings.app_host, "127.0.0.1");
        assert_eq!(settings.app_port, 9001);
    }
}
