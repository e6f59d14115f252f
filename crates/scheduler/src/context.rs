//! Shared dependencies for scheduler processors.
//!
//! Constructed once at process start and passed by reference. Processors
//! hold no state of their own; correctness under concurrent runs rests on
//! the gatekeeper's atomic cache primitives, not on any lock here.

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use pulse_common::config::AppConfig;
use pulse_gatekeeper::Gatekeeper;
use pulse_transport::PushGatewayClient;

pub struct SchedulerContext {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub gatekeeper: Gatekeeper,
    pub gateway: PushGatewayClient,
    pub config: AppConfig,
}

impl SchedulerContext {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        gateway: PushGatewayClient,
        config: AppConfig,
    ) -> Self {
        let gatekeeper = Gatekeeper::new(
            pool.clone(),
            gateway.clone(),
            config.daily_cap_max,
            &config.default_timezone,
        );
        Self {
            pool,
            redis,
            gatekeeper,
            gateway,
            config,
        }
    }
}
