use std::sync::Arc;

use crate::auth::JwtService;
use crate::core::Config;
use crate::core::error::Result;
use crate::delivery::Dispatcher;
use crate::notify::{NotificationSink, Notifier, PushNotifier};
use crate::orders::OrderService;
use crate::payments::{FreemopayClient, PaymentGateway, PaymentService};
use crate::storage::Storage;
use crate::tracking::LocationTracker;

/// Services shared by every request
///
/// Cloning is cheap: every service holds `Arc`s or a clone of [`Storage`].
///
/// | Field | Role |
/// |-------|------|
/// | config | Immutable configuration |
/// | storage | redb database |
/// | jwt_service | Bearer token verification |
/// | orders | Placement, restaurant/client transitions, ratings |
/// | dispatcher | Driver eligibility, accept, delivery status |
/// | payments | Mobile-money initiation and reconciliation |
/// | tracker | Driver positions |
/// | notifier | Post-commit notification delivery |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: Storage,
    pub jwt_service: Arc<JwtService>,
    pub orders: OrderService,
    pub dispatcher: Dispatcher,
    pub payments: PaymentService,
    pub tracker: LocationTracker,
    pub notifier: Notifier,
}

impl ServerState {
    /// Wire the services around an opened storage
    ///
    /// The gateway and notification sink are injected so tests can run
    /// without network access.
    pub fn new(
        config: Config,
        storage: Storage,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let orders = OrderService::new(storage.clone());
        let dispatcher = Dispatcher::new(storage.clone(), config.earnings());
        let payments = PaymentService::new(
            storage.clone(),
            gateway,
            config.callback_url(),
            config.gateway_timeout(),
            config.reference_mismatch_policy,
        );
        let tracker = LocationTracker::new(storage.clone());
        let notifier = Notifier::new(sink, config.notify_timeout());

        Self {
            config,
            storage,
            jwt_service,
            orders,
            dispatcher,
            payments,
            tracker,
            notifier,
        }
    }

    /// Open the database under the work directory and wire production
    /// services (Freemopay gateway, inbox + Expo push)
    pub fn initialize(config: &Config) -> Result<Self> {
        let work_dir = std::path::Path::new(&config.work_dir);
        std::fs::create_dir_all(work_dir).map_err(|e| {
            crate::core::ServerError::Config(format!(
                "cannot create work dir {}: {e}",
                work_dir.display()
            ))
        })?;

        let storage = Storage::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "Database opened");

        if config.freemopay_app_key.is_empty() {
            if config.is_production() {
                return Err(crate::core::ServerError::Config(
                    "FREEMOPAY_APP_KEY is required in production".into(),
                ));
            }
            tracing::warn!("FREEMOPAY_APP_KEY not set, mobile-money payments will fail");
        }
        let gateway: Arc<dyn PaymentGateway> = Arc::new(FreemopayClient::new(
            &config.freemopay_base_url,
            &config.freemopay_app_key,
            &config.freemopay_secret_key,
        ));
        let sink: Arc<dyn NotificationSink> = Arc::new(PushNotifier::new(
            storage.clone(),
            &config.expo_push_url,
            config.push_enabled,
        ));

        Ok(Self::new(config.clone(), storage, gateway, sink))
    }
}
