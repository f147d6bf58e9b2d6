use std::{net::SocketAddr, sync::Arc};

use derive_more::Deref;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    config::{AppConfig, StoreBackend},
    contact_store::{ContactStore, PgContactStore, RestContactStore},
    database::DbManager,
    email_client::{AudienceService, EmailDelivery},
    templ_manager::TemplateManager,
    EmailClient, Result,
};

// ###################################
// ->  Structs
// ###################################
pub struct App {
    pub app_state: AppState,
    pub listener: TcpListener,
}
impl App {
    pub fn new(app_state: AppState, listener: TcpListener) -> Self {
        App {
            app_state,
            listener,
        }
    }

    pub async fn build_from_config(config: AppConfig) -> Result<Self> {
        let sender = config.email_config.valid_sender()?;

        let contact_store: Arc<dyn ContactStore> = match config.store_config.backend {
            StoreBackend::Rest => Arc::new(RestContactStore::new(
                &config.store_config.url,
                &config.store_config.table,
                config.store_config.api_key.clone(),
                config.store_config.timeout(),
            )?),
            StoreBackend::Postgres => {
                let dm = DbManager::init(config.store_db_config()?).await?;
                dm.migrate().await?;
                Arc::new(PgContactStore::new(dm))
            }
        };
        info!(
            "{:<20} - {:?}",
            "Contact store:", config.store_config.backend
        );

        let tm = TemplateManager::init();
        let email_client = Arc::new(EmailClient::new(
            &config.email_config.url,
            sender,
            config.email_config.auth_token.clone(),
            config.email_config.timeout(),
        )?);

        let settings = SubscribeSettings {
            audience_id: config.email_config.audience_id().map(str::to_string),
            send_html: config.email_config.send_html,
            base_url: config.net_config.base_url,
            trust_forwarded_headers: config.net_config.trust_forwarded_headers,
        };
        if settings.audience_id.is_none() {
            info!("{:<20} - no audience configured", "Audience:");
        }

        let app_state = AppState::new(
            contact_store,
            email_client.clone(),
            email_client,
            tm,
            settings,
        );

        let addr = SocketAddr::from((config.net_config.host, config.net_config.app_port));
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("{:<20} - {}", "Listening on:", addr);

        let app = App::new(app_state, listener);
        Ok(app)
    }
}

/// Settings the subscribe route reads on every request.
#[derive(Debug, Clone)]
pub struct SubscribeSettings {
    /// Enrollment is skipped when `None`.
    pub audience_id: Option<String>,
    pub send_html: bool,
    pub base_url: String,
    pub trust_forwarded_headers: bool,
}

pub struct InternalState {
    pub contact_store: Arc<dyn ContactStore>,
    pub audience: Arc<dyn AudienceService>,
    pub email_delivery: Arc<dyn EmailDelivery>,
    pub templ_mgr: TemplateManager,
    pub settings: SubscribeSettings,
}

/// Application state containing all global data.
/// It implements `Deref` to easily access the fields on `InternalState`
/// Uses an `Arc` so it can be cloned around.
#[derive(Clone, Deref)]
pub struct AppState(Arc<InternalState>);

impl AppState {
    pub fn new(
        contact_store: Arc<dyn ContactStore>,
        audience: Arc<dyn AudienceService>,
        email_delivery: Arc<dyn EmailDelivery>,
        templ_mgr: TemplateManager,
        settings: SubscribeSettings,
    ) -> Self {
        AppState(Arc::new(InternalState {
            contact_store,
            audience,
            email_delivery,
            templ_mgr,
            settings,
        }))
    }
}
