//! Route configuration

use actix_web::web;

use super::{configfiles, configs, notifications};

/// Config service routes.
pub fn config_routes() -> actix_web::Scope {
    web::scope("")
        .route(
            "/configs/{app_id}/{cluster}/{namespace}",
            web::get().to(configs::get_config),
        )
        .route(
            "/configfiles/json/{app_id}/{cluster}/{namespace}",
            web::get().to(configfiles::get_configfiles_json),
        )
        .route(
            "/configfiles/{app_id}/{cluster}/{namespace}",
            web::get().to(configfiles::get_configfiles),
        )
        .route(
            "/notifications/v2",
            web::get().to(notifications::get_notifications),
        )
}

/// Configure function for use with actix-web service configuration.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(config_routes());
}
