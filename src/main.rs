use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use whatsapp_commerce_engine::cart::CartEngine;
use whatsapp_commerce_engine::config::Settings;
use whatsapp_commerce_engine::dispatcher::{run_idle_sweep, Dispatcher, LoggingTransport};
use whatsapp_commerce_engine::fsm::{SessionFsm, SessionFsmConfig};
use whatsapp_commerce_engine::intent::{ClassifierConfig, IntentClassifier};
use whatsapp_commerce_engine::pricing::DeliveryPricer;
use whatsapp_commerce_engine::remote::{BackoffMode, RemoteClient, RemoteClientConfig, RemoteMenuCatalog, RetryPolicy};
use whatsapp_commerce_engine::store::{ConversationStore, NoopConversationStore, RemoteConversationStore};
use whatsapp_commerce_engine::telemetry;
use whatsapp_commerce_engine::tenant::{StaticTenantLookup, TenantLookup, TenantProfile};
use whatsapp_commerce_engine::types::{BranchId, ExtrasPriceTable, LatLng, SizeMultipliers, TenantId};
use whatsapp_commerce_engine::webhook::{router, WebhookState};

#[derive(Debug, Parser)]
#[command(name = "commerce-engine", version, about = "WhatsApp conversational commerce engine")]
struct Cli {
    /// Path to the settings file (without extension), resolved by the
    /// `config` crate against the working directory.
    #[arg(short, long, default_value = "engine")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config).unwrap_or_else(|err| {
        error!("failed to load settings from {:?}, using defaults: {err}", cli.config);
        Settings::default()
    });

    let retry = RetryPolicy {
        mode: BackoffMode::parse_config_str(&settings.remote.rate_limit_mode),
        base_delay: Duration::from_millis(settings.remote.retry_delay_ms),
        max_retries: settings.remote.max_retries,
    };
    let tenant_id = TenantId::new(settings.remote.tenant_sub_domain.clone());
    let tenant_lookup = StaticTenantLookup::new(TenantProfile {
        tenant: tenant_id.clone(),
        branch: BranchId::new(settings.remote.tenant_local_id.clone()),
        remote: Arc::new(RemoteClientConfig {
            base_url: settings.remote.base_url.clone(),
            api_key: settings.remote.api_key.clone(),
            request_timeout: settings.request_timeout(),
            retry,
            max_concurrent_requests: settings.remote.max_concurrent_requests,
            tenant_sub_domain: settings.remote.tenant_sub_domain.clone(),
            tenant_local_id: settings.remote.tenant_local_id.clone(),
        }),
        tax_rate: settings.pricing.tax_rate,
        restaurant_lat: settings.pricing.restaurant_lat,
        restaurant_lng: settings.pricing.restaurant_lng,
    });
    let profile = tenant_lookup
        .resolve(&tenant_id)
        .await
        .expect("static lookup always resolves its own tenant");

    let remote = RemoteClient::new((*profile.remote).clone())?;

    let catalog = Arc::new(RemoteMenuCatalog::new(
        remote.clone(),
        profile.remote.tenant_sub_domain.clone(),
        profile.branch.as_str().to_string(),
        Duration::from_secs(60),
    ));

    let extras_prices: rustc_hash::FxHashMap<_, _> = settings
        .pricing
        .extras_price_table
        .iter()
        .map(|(id, price)| {
            (
                whatsapp_commerce_engine::types::ExtraId::new(id.clone()),
                whatsapp_commerce_engine::types::Money::new(*price),
            )
        })
        .collect();

    let cart_engine = Arc::new(CartEngine::new(
        catalog,
        SizeMultipliers::default(),
        ExtrasPriceTable::new(extras_prices),
    ));

    let classifier = IntentClassifier::new(Arc::new(ClassifierConfig::default()));
    let fsm_config = SessionFsmConfig {
        restaurant_location: LatLng {
            lat: profile.restaurant_lat,
            lng: profile.restaurant_lng,
        },
        tax_rate: profile.tax_rate,
        step_deadline: Duration::from_secs(30),
        sub_domain: profile.remote.tenant_sub_domain.clone(),
        local_id: profile.branch.as_str().to_string(),
    };
    let fsm = Arc::new(SessionFsm::new(
        cart_engine,
        Arc::new(DeliveryPricer::new()),
        remote.clone(),
        classifier,
        fsm_config,
    ));

    let store: Arc<dyn ConversationStore> = if settings.conversation.sync_enabled {
        Arc::new(RemoteConversationStore::new(remote))
    } else {
        Arc::new(NoopConversationStore)
    };

    let dispatcher = Arc::new(Dispatcher::new(
        fsm,
        store,
        Arc::new(LoggingTransport),
        settings.session_idle_ttl(),
        settings.conversation.message_trail_cap,
        32,
    ));

    tokio::spawn(run_idle_sweep(Arc::clone(&dispatcher), Duration::from_secs(60)));

    #[cfg(feature = "monitoring")]
    let metrics_handle = if settings.monitoring.metrics_enabled {
        match telemetry::metrics_exporter::install() {
            Ok(handle) => Some(Arc::new(handle)),
            Err(err) => {
                error!("failed to install Prometheus recorder: {err}");
                None
            }
        }
    } else {
        None
    };

    let app = router(WebhookState {
        dispatcher,
        #[cfg(feature = "monitoring")]
        metrics_handle,
    });
    let listener = tokio::net::TcpListener::bind(settings.server_address()).await?;
    info!(address = %settings.server_address(), "commerce engine listening");
    axum::serve(listener, app).await?;
    Ok(())
}
