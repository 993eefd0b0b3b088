use std::sync::Arc;

use crate::{
    config::{AppConfig, Environment, JwtConfig, MailConfig, StoreBackend},
    mail::{Mailer, MemoryMailer},
    state::AppState,
};

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        store: StoreBackend::Memory,
        jwt: JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            issuer: "noted".into(),
            audience: "noted-users".into(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24 * 7,
        },
        mail: MailConfig {
            sender: "noreply@noted.local".into(),
            relay_url: None,
            relay_token: None,
        },
        frontend_url: "http://localhost:5173".into(),
        reset_ttl_minutes: 30,
        purge_interval_secs: 300,
        conceal_unknown_reset_email: false,
    }
}

pub fn memory_state() -> AppState {
    memory_state_with_mailer(Arc::new(MemoryMailer::new()))
}

pub fn memory_state_with_mailer(mailer: Arc<dyn Mailer>) -> AppState {
    AppState::in_memory(test_config(), mailer)
}

pub fn memory_state_with_config(config: AppConfig) -> AppState {
    AppState::in_memory(config, Arc::new(MemoryMailer::new()))
}
