//! The `serve` command: wire every adapter and run until Ctrl-C.

use std::error::Error;
use std::sync::Arc;

use tokio::task::JoinHandle;

use luftuj_adapter_modbus_tokio::ConnectionRegistry;
use luftuj_adapter_mqtt::MqttBridge;
use luftuj_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteSettingsRepository, SqliteTimelineRepository,
};
use luftuj_adapter_virtual::VirtualValves;
use luftuj_app::configuration::StoredConfiguration;
use luftuj_app::device::DeviceGateway;
use luftuj_app::discovery::DiscoveryScheduler;
use luftuj_app::ports::{ClientRegistry, ConfigurationSource, HomeBridge};
use luftuj_app::resolver::ActiveConfigResolver;
use luftuj_app::services::boost_service::BoostService;
use luftuj_app::services::command_router::{CommandRouter, Wakeups};
use luftuj_app::synchronizer::DeviceSynchronizer;
use luftuj_app::valve_manager::ValveManager;
use luftuj_domain::slug::slugify;

use crate::config::Config;

type Configuration = StoredConfiguration<SqliteSettingsRepository>;
type Gateway = DeviceGateway<Configuration, ConnectionRegistry>;
type Resolver = ActiveConfigResolver<
    Configuration,
    ConnectionRegistry,
    SqliteSettingsRepository,
    SqliteTimelineRepository,
    VirtualValves,
>;

/// Everything that only runs with a broker.
struct Bridged {
    bridge: Arc<MqttBridge>,
    synchronizer: Arc<DeviceSynchronizer<Configuration, ConnectionRegistry, MqttBridge>>,
    discovery: Arc<DiscoveryScheduler<Configuration, SqliteTimelineRepository, MqttBridge>>,
    router: JoinHandle<()>,
}

impl Bridged {
    async fn start(
        config: &Config,
        configuration: Configuration,
        gateway: Arc<Gateway>,
        resolver: &Resolver,
        settings: SqliteSettingsRepository,
        timeline: SqliteTimelineRepository,
    ) -> Self {
        // Topics need a unit name even before the unit is configured.
        let unit = match configuration.resolve().await {
            Ok(resolved) => resolved.unit,
            Err(err) => {
                tracing::warn!(error = %err, "unit not resolved, using configured code for topics");
                slugify(&config.hru.unit)
            }
        };

        let (bridge, events) = MqttBridge::start(&config.mqtt, &unit);
        let bridge = Arc::new(bridge);

        let synchronizer = Arc::new(DeviceSynchronizer::new(
            gateway,
            Arc::clone(&bridge),
            resolver.watch(),
        ));
        synchronizer.start(config.scheduler.poll());

        let discovery = Arc::new(DiscoveryScheduler::new(
            configuration,
            timeline.clone(),
            Arc::clone(&bridge),
        ));
        discovery.start(config.scheduler.discovery());

        let wakeups = Wakeups {
            reevaluate: resolver.reevaluate_trigger(),
            poll: synchronizer.trigger(),
            discovery: discovery.trigger(),
        };
        let router = CommandRouter::new(
            BoostService::new(settings, timeline),
            Arc::clone(&bridge),
            wakeups,
        );
        let router = tokio::spawn(router.run(events));

        Self {
            bridge,
            synchronizer,
            discovery,
            router,
        }
    }

    async fn stop(self) {
        self.synchronizer.stop();
        self.discovery.stop();
        if let Err(err) = self.bridge.shutdown().await {
            tracing::warn!(error = %err, "mqtt shutdown failed");
        }
        // The router ends once the bridge drops its event sender.
        self.router.abort();
    }
}

/// Run the controller until Ctrl-C.
///
/// # Errors
///
/// Returns an error when the database cannot be opened, the valves cannot
/// be loaded, or the signal handler cannot be installed.
pub async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let settings = SqliteSettingsRepository::new(pool.clone());
    let timeline = SqliteTimelineRepository::new(pool);

    // Device access
    let configuration = StoredConfiguration::new(settings.clone(), config.hru_settings());
    let registry = Arc::new(ConnectionRegistry::new(config.modbus.clone()));
    let gateway = Arc::new(DeviceGateway::new(
        configuration.clone(),
        Arc::clone(&registry),
    ));

    // Valves
    let valves = Arc::new(ValveManager::new(VirtualValves::new(&config.valves.dampers)));
    valves.start().await?;

    // Resolver
    let resolver: Arc<Resolver> = Arc::new(ActiveConfigResolver::new(
        Arc::clone(&gateway),
        settings.clone(),
        timeline.clone(),
        Arc::clone(&valves),
        config.scheduler.fallback,
    ));
    resolver.start(config.scheduler.tick());

    // Home Assistant
    let bridged = if config.mqtt.enabled {
        Some(Bridged::start(&config, configuration, gateway, &resolver, settings, timeline).await)
    } else {
        tracing::info!("mqtt disabled, running without Home Assistant");
        None
    };

    tracing::info!("luftujd running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    resolver.stop();
    if let Some(bridged) = bridged {
        bridged.stop().await;
    }
    valves.stop();
    registry.close_all().await;
    db.close().await;

    tracing::info!("luftujd stopped");
    Ok(())
}
