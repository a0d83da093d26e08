//! Shop-wide settings: public read, admin write.

use tokio::sync::RwLock;

use posh_schemas::Settings;

pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Settings::default()),
        }
    }

    pub async fn get(&self) -> Settings {
        self.inner.read().await.clone()
    }

    pub async fn update(
        &self,
        currency: Option<String>,
        currency_symbol: Option<String>,
    ) -> Settings {
        let mut guard = self.inner.write().await;
        if let Some(c) = currency {
            guard.currency = c;
        }
        if let Some(s) = currency_symbol {
            guard.currency_symbol = s;
        }
        guard.clone()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}
