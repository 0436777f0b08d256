use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fitgate::{
    api::ApiClient,
    chat::ChatStore,
    config::Config,
    error::ClientError,
    gate::{
        audio::ToneSink, CycleTimings, GateCycle, LogResultSink, ScanValidator, StdinScanSource,
    },
    notify::{LogAlertSink, NotificationFeed},
    realtime::{EventRouter, SocketSupervisor},
    session::SessionHandle,
};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fitgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting fitgate kiosk v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded (gate {})", config.gate_device_id);

    // Session + API client
    let session = SessionHandle::new();
    let api = Arc::new(ApiClient::new(&config, session.clone())?);

    let email = config
        .gate_login_email
        .clone()
        .ok_or_else(|| ClientError::Config("GATE_LOGIN_EMAIL not set".to_string()))?;
    let password = config
        .gate_login_password
        .clone()
        .ok_or_else(|| ClientError::Config("GATE_LOGIN_PASSWORD not set".to_string()))?;

    let auth = api.login(&email, &password).await?;
    tracing::info!("✅ Authenticated as {} ({})", auth.user.name, auth.user.role);

    // Shared stores + realtime supervisor
    let chats = Arc::new(Mutex::new(ChatStore::new()));
    let feed = Arc::new(Mutex::new(NotificationFeed::new(
        config.desktop_alerts,
        Some(Arc::new(LogAlertSink)),
    )));
    let router = Arc::new(EventRouter::new(chats, feed));
    let (supervisor, _outbound) = SocketSupervisor::new(&config, session.clone(), router);
    tokio::spawn(supervisor.run());
    tracing::info!("✅ Realtime supervisor started ({})", config.ws_url);

    // Entry-gate scan cycle
    #[cfg(feature = "audio")]
    let tones: Arc<dyn ToneSink> = Arc::new(fitgate::gate::audio::RodioToneSink);
    #[cfg(not(feature = "audio"))]
    let tones: Arc<dyn ToneSink> = Arc::new(fitgate::gate::audio::NullToneSink);

    let validator: Arc<dyn ScanValidator> = api;
    let mut cycle = GateCycle::new(
        Box::new(StdinScanSource::new()),
        validator,
        tones,
        Arc::new(LogResultSink),
        CycleTimings::from_config(&config),
    );
    tracing::info!("🚪 Entry gate ready; waiting for scans");

    cycle.run().await
}
