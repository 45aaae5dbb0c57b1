//! Events published around each provider's lifecycle transitions:
//! one on registration, one on boot, one on shutdown.

#[derive(Debug, Clone)]
pub struct ProviderRegistered {
    pub name: &'static str,
}

#[derive(Debug, Clone)]
pub struct ProviderBooted {
    pub name: &'static str,
}

#[derive(Debug, Clone)]
pub struct ProviderShutDown {
    pub name: &'static str,
}
