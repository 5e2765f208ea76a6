//! HTTP routes
//!
//! Boot-time routes identify the caller by its TCP peer address. The plan
//! API accepts an explicit address so an operator can act on any host.

use crate::error::{ApiError, ErrorResponse};
use crate::files::read_static;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rackdirector_provision::{Advance, ProvisioningPlan};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, info};

const PXE_MENU_SUFFIX: &str = "pxelinux.cfg/default";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/config.ipxe", get(ipxe_script))
        .route("/installseed", get(install_seed))
        .route("/ipxe.efi", get(boot_file))
        .route("/bios/{*path}", get(boot_file))
        .route("/efi32/{*path}", get(boot_file))
        .route("/efi64/{*path}", get(boot_file))
        .route("/api/plan", get(get_plan).post(assign_plan))
        .route("/api/advanceplan", post(advance_plan))
        .fallback(not_found)
        .with_state(state)
}

/// IPv4 identity of the caller
fn peer_ipv4(peer: SocketAddr) -> Result<Ipv4Addr, ApiError> {
    match peer.ip() {
        IpAddr::V4(addr) => Ok(addr),
        IpAddr::V6(addr) => addr
            .to_ipv4_mapped()
            .ok_or(ApiError::UnsupportedPeer(peer.ip())),
    }
}

fn text(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ipxe_script(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, ApiError> {
    let address = peer_ipv4(peer)?;
    debug!(peer = %address, "iPXE script requested");
    Ok(text(state.service.ipxe_script(address)?))
}

async fn install_seed(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, ApiError> {
    let address = peer_ipv4(peer)?;
    info!(peer = %address, "Install content requested");
    Ok(text(state.service.install_content(address)?))
}

/// PXE menus under `/<arch>/pxelinux.cfg/default`, static files otherwise
async fn boot_file(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let path = uri.path();
    let is_menu = path
        .trim_start_matches('/')
        .split_once('/')
        .is_some_and(|(_, rest)| rest == PXE_MENU_SUFFIX);

    if is_menu {
        let address = peer_ipv4(peer)?;
        debug!(peer = %address, path = %path, "PXE menu requested");
        return Ok(text(state.service.pxe_menu_config(address)?));
    }

    let contents = read_static(&state.http_dir, path).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        contents,
    )
        .into_response())
}

/// Plan as reported by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub address: Ipv4Addr,
    pub plan: String,
    pub stages: Vec<String>,
    pub stage_index: usize,
    pub stage: String,
}

impl PlanResponse {
    fn new(address: Ipv4Addr, plan: ProvisioningPlan) -> Self {
        let stage = plan.current_stage().to_string();
        Self {
            address,
            plan: plan.name,
            stages: plan.stages,
            stage_index: plan.current,
            stage,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub address: Option<Ipv4Addr>,
}

async fn get_plan(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>, ApiError> {
    let address = match query.address {
        Some(address) => address,
        None => peer_ipv4(peer)?,
    };
    let plan = state.service.current_plan(address)?;
    Ok(Json(PlanResponse::new(address, plan)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignPlanRequest {
    pub address: Ipv4Addr,
    pub plan: String,
}

async fn assign_plan(
    State(state): State<AppState>,
    Json(request): Json<AssignPlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = state
        .service
        .assign_plan(request.address, &request.plan)
        .await?;
    Ok(Json(PlanResponse::new(request.address, plan)))
}

/// Outcome of advancing the caller's plan
#[derive(Debug, Serialize, Deserialize)]
pub struct AdvanceResponse {
    pub address: Ipv4Addr,
    pub plan: String,
    pub completed: bool,
    /// Stage entered; absent once the plan completes
    pub stage: Option<String>,
}

async fn advance_plan(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let address = peer_ipv4(peer)?;
    let response = match state.service.advance(address)? {
        Advance::Moved(plan) => AdvanceResponse {
            address,
            stage: Some(plan.current_stage().to_string()),
            plan: plan.name,
            completed: false,
        },
        Advance::Completed(plan) => AdvanceResponse {
            address,
            plan: plan.name,
            completed: true,
            stage: None,
        },
    };
    Ok(Json(response))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message: format!("{} not found", uri.path()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rackdirector_bmc::{BmcError, PowerControl};
    use rackdirector_inventory::HostDirectory;
    use rackdirector_provision::{
        BootAssets, ContentSettings, PlanCatalog, PlanRegistry, ProvisioningService,
        IPXE_TEMPLATE, PXE_MENU_TEMPLATE,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    const NODE01: [u8; 4] = [10, 0, 1, 20];

    #[derive(Default)]
    struct CountingPower {
        cycles: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PowerControl for CountingPower {
        async fn power_cycle(&self, bmc_hostname: &str) -> rackdirector_bmc::Result<()> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BmcError::CommandFailed {
                    target: bmc_hostname.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        state: AppState,
        power: Arc<CountingPower>,
        _http_dir: tempfile::TempDir,
    }

    fn fixture(power: CountingPower) -> Fixture {
        let directory = HostDirectory::from_json(
            r#"{"hosts": [{
                "hostname": "node01.lab.example",
                "interfaces": [{"device": "eth0", "port": "eth0", "ipv4": "10.0.1.20/24", "ipv4_gateway": "10.0.1.1"}],
                "bmc": {"hostname": "node01-bmc.lab.example", "port": "ipmi", "ipv4": "10.0.2.20/24"}
            }]}"#,
        )
        .unwrap();

        let mut assets = BootAssets::new(ContentSettings::default());
        assets
            .add_template(PXE_MENU_TEMPLATE, "DEFAULT {{ default_menu }}")
            .unwrap();
        assets
            .add_template(IPXE_TEMPLATE, "#!ipxe\nchain http://{{ server }}/{{ default_menu }}")
            .unwrap();
        assets
            .add_template("install-centos-8.template", "network --hostname={{ hostname }}")
            .unwrap();

        let http_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(http_dir.path().join("bios")).unwrap();
        std::fs::write(http_dir.path().join("bios/ldlinux.c32"), b"ldlinux").unwrap();
        std::fs::write(http_dir.path().join("ipxe.efi"), b"ipxe").unwrap();

        let power = Arc::new(power);
        let service = ProvisioningService::new(
            Arc::new(directory),
            Arc::new(PlanRegistry::new(PlanCatalog::default())),
            power.clone(),
            assets,
        );

        Fixture {
            state: AppState::new(Arc::new(service), http_dir.path()),
            power,
            _http_dir: http_dir,
        }
    }

    async fn send(
        state: &AppState,
        peer: SocketAddr,
        request: Request<Body>,
    ) -> (StatusCode, Vec<u8>) {
        let app = router(state.clone()).layer(MockConnectInfo(peer));
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn node01() -> SocketAddr {
        SocketAddr::from((NODE01, 40000))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn error_kind(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorResponse>(body).unwrap().error
    }

    #[tokio::test]
    async fn test_healthz() {
        let f = fixture(CountingPower::default());
        let (status, body) = send(&f.state, node01(), get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_pxe_menu_for_each_arch() {
        let f = fixture(CountingPower::default());

        for arch in ["bios", "efi32", "efi64"] {
            let uri = format!("/{}/pxelinux.cfg/default", arch);
            let (status, body) = send(&f.state, node01(), get(&uri)).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(body, b"DEFAULT localboot");
        }
    }

    #[tokio::test]
    async fn test_ipv4_mapped_peer() {
        let f = fixture(CountingPower::default());
        let mapped: SocketAddr = "[::ffff:10.0.1.20]:40000".parse().unwrap();

        let (status, body) = send(&f.state, mapped, get("/config.ipxe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"#!ipxe\nchain http://10.0.1.10/localboot");

        let v6: SocketAddr = "[2001:db8::20]:40000".parse().unwrap();
        let (status, body) = send(&f.state, v6, get("/config.ipxe")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&body), "unsupported_peer");
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let f = fixture(CountingPower::default());
        let stranger = SocketAddr::from(([10, 0, 1, 99], 40000));

        let (status, body) = send(&f.state, stranger, get("/bios/pxelinux.cfg/default")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&body), "host_not_found");
    }

    #[tokio::test]
    async fn test_static_files() {
        let f = fixture(CountingPower::default());

        let (status, body) = send(&f.state, node01(), get("/bios/ldlinux.c32")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ldlinux");

        let (status, body) = send(&f.state, node01(), get("/ipxe.efi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ipxe");

        let (status, _) = send(&f.state, node01(), get("/efi64/missing.efi")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&f.state, node01(), get("/bios/../../etc/passwd")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plan_lifecycle() {
        let f = fixture(CountingPower::default());

        let (status, body) = send(&f.state, node01(), get("/installseed")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_kind(&body), "not_in_install_stage");

        let (status, body) = send(
            &f.state,
            SocketAddr::from(([127, 0, 0, 1], 50000)),
            post_json(
                "/api/plan",
                serde_json::json!({"address": "10.0.1.20", "plan": "reinstall-centos-8"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let plan: PlanResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(plan.stage, "install-centos-8");
        assert_eq!(f.power.cycles.load(Ordering::SeqCst), 1);

        let (status, body) = send(&f.state, node01(), get("/api/plan")).await;
        assert_eq!(status, StatusCode::OK);
        let plan: PlanResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(plan.plan, "reinstall-centos-8");
        assert_eq!(plan.stage_index, 0);

        let (_, body) = send(&f.state, node01(), get("/bios/pxelinux.cfg/default")).await;
        assert_eq!(body, b"DEFAULT centos-8");

        let (status, body) = send(&f.state, node01(), get("/installseed")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"network --hostname=node01.lab.example");

        let (status, body) = send(
            &f.state,
            node01(),
            post_json(
                "/api/plan",
                serde_json::json!({"address": "10.0.1.20", "plan": "reinstall-centos-7"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_kind(&body), "plan_already_active");

        let request = Request::builder()
            .method("POST")
            .uri("/api/advanceplan")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&f.state, node01(), request).await;
        assert_eq!(status, StatusCode::OK);
        let advanced: AdvanceResponse = serde_json::from_slice(&body).unwrap();
        assert!(advanced.completed);
        assert_eq!(advanced.stage, None);

        let (status, body) = send(&f.state, node01(), get("/api/plan?address=10.0.1.20")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&body), "plan_not_found");

        let (_, body) = send(&f.state, node01(), get("/bios/pxelinux.cfg/default")).await;
        assert_eq!(body, b"DEFAULT localboot");
    }

    #[tokio::test]
    async fn test_assign_errors() {
        let f = fixture(CountingPower {
            fail: true,
            ..Default::default()
        });

        let (status, body) = send(
            &f.state,
            node01(),
            post_json(
                "/api/plan",
                serde_json::json!({"address": "10.0.1.20", "plan": "reinstall-windows"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&body), "unknown_plan");

        let (status, body) = send(
            &f.state,
            node01(),
            post_json(
                "/api/plan",
                serde_json::json!({"address": "10.0.1.20", "plan": "reinstall-centos-8"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error_kind(&body), "management_command_failure");

        // Plan survives the failed power cycle
        let (status, _) = send(&f.state, node01(), get("/api/plan")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_advance_without_plan() {
        let f = fixture(CountingPower::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/advanceplan")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&f.state, node01(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&body), "plan_not_found");
    }

    #[tokio::test]
    async fn test_fallback() {
        let f = fixture(CountingPower::default());
        let (status, body) = send(&f.state, node01(), get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&body), "not_found");
    }
}
