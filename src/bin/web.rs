use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use coldmail_dns::dmarc::DmarcConfig;
use coldmail_dns::mx::EmailPlatform;
use coldmail_dns::orchestrator::{self, SetupEmailDnsConfig};
use coldmail_dns::polling::{self, EtaEstimate};
use coldmail_dns::provider::InMemoryDnsProvider;
use coldmail_dns::resolver::TrustDnsLookup;
use coldmail_dns::resolver::multi::MultiResolverQueryService;
use coldmail_dns::spf::{self, LookupOptions};
use coldmail_dns::status::StatusView;
use coldmail_dns::store::InMemoryStore;
use coldmail_dns::types::SessionId;
use env_logger::Env;
use serde::Deserialize;
use std::time::Duration;

struct AppState {
    provider: InMemoryDnsProvider,
    store: InMemoryStore,
    resolvers: MultiResolverQueryService,
    status: StatusView,
}

#[derive(Deserialize)]
struct SpfResolveQuery {
    domain: String,
}

async fn spf_resolve(query: web::Query<SpfResolveQuery>) -> impl Responder {
    let resolver = match TrustDnsLookup::new() {
        Ok(r) => r,
        Err(e) => return HttpResponse::InternalServerError().body(format!("DNS resolver error: {e}")),
    };
    let result = spf::resolve_spf(&resolver, &query.domain, LookupOptions::default()).await;
    HttpResponse::Ok().json(result)
}

#[derive(Deserialize)]
struct ProvisionRequest {
    domain: String,
    platform: String,
}

async fn provision_domain(
    state: web::Data<AppState>,
    domain_id: web::Path<uuid::Uuid>,
    req: web::Json<ProvisionRequest>,
) -> impl Responder {
    let platform = match req.platform.as_str() {
        "google-workspace" => EmailPlatform::GoogleWorkspace,
        "microsoft-365" => EmailPlatform::Microsoft365,
        _ => EmailPlatform::Custom,
    };

    let setup_config = SetupEmailDnsConfig {
        domain_id: coldmail_dns::types::DomainId(*domain_id),
        domain: req.domain.clone(),
        zone_handle: format!("zone-{}", req.domain),
        provider_token: "demo-token".to_string(),
        platform,
        custom_mx: None,
        existing_spf: None,
        additional_includes: vec![],
        dmarc: DmarcConfig {
            policy: Some(coldmail_dns::dmarc::DmarcPolicy::Quarantine),
            ..Default::default()
        },
        dkim: None,
        tracking: None,
        skip_duplicates: true,
    };

    let result = orchestrator::setup_email_dns(&setup_config, &[], 512, &state.provider, &state.store, 3600).await;
    state.status.invalidate_domain(setup_config.domain_id);
    HttpResponse::Ok().json(result)
}

async fn session_status(state: web::Data<AppState>, session_id: web::Path<uuid::Uuid>) -> impl Responder {
    match polling::check_polling_progress(SessionId(*session_id), &state.store, &state.resolvers).await {
        Ok(session) => {
            state.status.invalidate_domain(session.domain_id);
            let eta: EtaEstimate = polling::estimate_time_remaining(&session, Duration::from_secs(3600));
            HttpResponse::Ok().json(serde_json::json!({ "session": session, "eta": eta }))
        }
        Err(e) => HttpResponse::NotFound().body(e.to_string()),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    log::info!("Starting cold-email DNS provisioning service");

    let resolvers = MultiResolverQueryService::new(Duration::from_secs(5))
        .expect("failed to initialize resolver pool");

    let state = web::Data::new(AppState {
        provider: InMemoryDnsProvider::new(),
        store: InMemoryStore::new(),
        resolvers,
        status: StatusView::new(Duration::from_secs(10)),
    });

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Binding to {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/spf/resolve", web::get().to(spf_resolve))
            .route("/domains/{domain_id}/provision", web::post().to(provision_domain))
            .route("/sessions/{session_id}/status", web::get().to(session_status))
            .wrap(actix_web::middleware::Logger::default())
    })
        .workers(num_cpus::get())
        .keep_alive(std::time::Duration::from_secs(75))
        .max_connections(1_000)
        .bind((host.as_str(), port))?
        .run()
        .await
}
