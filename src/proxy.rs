use std::env;

/// Proxy environment injected into newly created workstations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub proxy: String,
    pub no_proxy: Option<String>,
}

/// Strategy for deployment-specific proxy configuration. The default does
/// nothing; environments that front workstations with an egress proxy plug
/// in their own provider.
pub trait ProxyProvider {
    fn resolve(&self, project: &str, name: &str) -> Option<ProxySettings>;
}

pub struct NoProxy;

impl ProxyProvider for NoProxy {
    fn resolve(&self, _project: &str, _name: &str) -> Option<ProxySettings> {
        None
    }
}

/// Proxy settings captured from `WKS_PROXY` / `WKS_NO_PROXY` at startup.
pub struct EnvProxy {
    proxy: String,
    no_proxy: Option<String>,
}

impl ProxyProvider for EnvProxy {
    fn resolve(&self, _project: &str, _name: &str) -> Option<ProxySettings> {
        Some(ProxySettings {
            proxy: self.proxy.clone(),
            no_proxy: self.no_proxy.clone(),
        })
    }
}

pub fn provider_from_env() -> Box<dyn ProxyProvider> {
    match env::var("WKS_PROXY") {
        Ok(proxy) if !proxy.trim().is_empty() => Box::new(EnvProxy {
            proxy,
            no_proxy: env::var("WKS_NO_PROXY").ok().filter(|v| !v.trim().is_empty()),
        }),
        _ => Box::new(NoProxy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_proxy_resolves_to_nothing() {
        assert_eq!(NoProxy.resolve("p", "ws1"), None);
    }

    #[test]
    fn env_proxy_returns_captured_settings() {
        let provider = EnvProxy {
            proxy: "http://proxy:3128".to_string(),
            no_proxy: Some("localhost,.internal".to_string()),
        };

        let settings = provider.resolve("p", "ws1").expect("settings");
        assert_eq!(settings.proxy, "http://proxy:3128");
        assert_eq!(settings.no_proxy.as_deref(), Some("localhost,.internal"));
    }
}
