use crate::{
    api::{allocate, attendance, dashboard, guard, patrol, premise, shift},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-group limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct Limiters {
    allocate: Limiter,
    checkin: Limiter,
    patrol: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            allocate: build_limiter(config.rate_allocate_per_min).context("allocate limiter")?,
            checkin: build_limiter(config.rate_checkin_per_min).context("check-in limiter")?,
            patrol: build_limiter(config.rate_patrol_per_min).context("patrol limiter")?,
            protected: build_limiter(config.rate_protected_per_min).context("protected limiter")?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Option<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Arc::new(Governor::new(&cfg)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            // allocation
            .service(
                web::resource("/allocate")
                    .wrap(limiters.allocate.clone())
                    .route(web::post().to(allocate::allocate)),
            )
            .service(
                web::resource("/allocate/day")
                    .wrap(limiters.allocate.clone())
                    .route(web::post().to(allocate::allocate_day)),
            )
            .service(
                web::resource("/allocate/scan_guard")
                    .wrap(limiters.allocate.clone())
                    .route(web::post().to(allocate::scan_guard)),
            )
            .service(
                web::resource("/assignments/recent")
                    .route(web::get().to(allocate::recent_assignments)),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .wrap(limiters.checkin.clone())
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/checkin")
                            .wrap(limiters.checkin.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(web::resource("/my").route(web::get().to(attendance::my_attendance))),
            )
            .service(
                web::scope("/patrols")
                    // /patrols
                    .service(
                        web::resource("")
                            .wrap(limiters.patrol.clone())
                            .route(web::get().to(patrol::list_patrols))
                            .route(web::post().to(patrol::create_patrol)),
                    )
                    .service(web::resource("/latest").route(web::get().to(patrol::latest_patrols)))
                    .service(web::resource("/heatmap").route(web::get().to(patrol::heatmap))),
            )
            .service(web::resource("/active-guards").route(web::get().to(patrol::active_guards)))
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/summary").route(web::get().to(dashboard::summary)))
                    .service(web::resource("/analytics").route(web::get().to(dashboard::analytics))),
            )
            .service(
                web::scope("/guards")
                    // /guards
                    .service(
                        web::resource("")
                            .route(web::get().to(guard::list_guards))
                            .route(web::post().to(guard::create_guard)),
                    )
                    // /guards/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(guard::get_guard))
                            .route(web::put().to(guard::update_guard))
                            .route(web::delete().to(guard::delete_guard)),
                    )
                    .service(web::resource("/{id}/qr").route(web::get().to(guard::guard_qr))),
            )
            .service(
                web::scope("/premises")
                    // /premises
                    .service(
                        web::resource("")
                            .route(web::get().to(premise::list_premises))
                            .route(web::post().to(premise::create_premise)),
                    )
                    // /premises/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(premise::get_premise))
                            .route(web::put().to(premise::update_premise))
                            .route(web::delete().to(premise::delete_premise)),
                    )
                    .service(web::resource("/{id}/qr").route(web::get().to(premise::premise_qr))),
            )
            .service(
                web::scope("/shifts")
                    // /shifts
                    .service(
                        web::resource("")
                            .route(web::get().to(shift::list_shifts))
                            .route(web::post().to(shift::create_shift)),
                    )
                    // /shifts/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(shift::get_shift))
                            .route(web::put().to(shift::update_shift))
                            .route(web::delete().to(shift::delete_shift)),
                    )
                    .service(web::resource("/{id}/assign").route(web::post().to(shift::assign_shift)))
                    .service(
                        web::resource("/{id}/patrols").route(web::get().to(patrol::shift_patrols)),
                    ),
            ),
    );
}
