use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::constants::{
    MSG_BUSY, MSG_NFC_BLANK_TEXT, MSG_NFC_ERASE_OK, MSG_NFC_NO_TEXT, MSG_NFC_WRITE_NEEDS_LOT,
    MSG_NFC_WRITE_OK,
};
use crate::controller::TagController;
use crate::models::form::{Banner, FormFields, FormPhase};
use crate::models::tag::TagRow;
use crate::nfc::NfcBridge;
use crate::utils::{display_stamp, now_in};
use crate::view::{self, PageModel, TableModel};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Mutex<TagController>>,
    pub nfc: Arc<NfcBridge>,
    pub display_tz: Tz,
}

/// Create station routes
pub fn create_station_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/lookup", post(lookup))
        .route("/primary", post(primary))
        .route("/deregister", post(deregister))
        .route("/cancel", post(cancel))
        .route("/table/view", post(view_table))
        .route("/table/close", post(close_table))
        .route("/nfc/read", post(nfc_read))
        .route("/nfc/write", post(nfc_write))
        .route("/nfc/erase", post(nfc_erase))
        .route("/api/health", get(health_check))
        .route("/api/tags", get(get_tags))
}

fn page_model(controller: &TagController, nfc_available: bool) -> PageModel {
    PageModel {
        banner: controller.banner().cloned(),
        phase: controller.phase(),
        fields: controller.fields().clone(),
        offer_deregister: controller.offers_deregister(),
        has_selection: controller.has_selection(),
        table: controller.table_open().then(|| TableModel {
            rows: controller.cache().rows().to_vec(),
            status: controller.table_status().to_string(),
        }),
        nfc_available,
    }
}

/// Page shown when another event still holds the controller. No state is
/// touched; the operator retries once the in-flight request settles.
fn busy_page(nfc_available: bool) -> Html<String> {
    Html(view::render_page(&PageModel {
        banner: Some(Banner::error(MSG_BUSY)),
        phase: FormPhase::Hidden,
        fields: FormFields::default(),
        offer_deregister: false,
        has_selection: false,
        table: None,
        nfc_available,
    }))
}

/// Station page
/// GET /
async fn index(State(state): State<AppState>) -> Html<String> {
    match state.controller.try_lock() {
        Ok(controller) => Html(view::render_page(&page_model(
            &controller,
            state.nfc.available(),
        ))),
        Err(_) => busy_page(state.nfc.available()),
    }
}

/// Tag lookup
/// POST /lookup
async fn lookup(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.lookup().await;
    Redirect::to("/").into_response()
}

/// Register / Edit / Save, depending on the form state
/// POST /primary
async fn primary(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.primary().await;
    Redirect::to("/").into_response()
}

/// Remove the selected lot
/// POST /deregister
async fn deregister(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.deregister().await;
    Redirect::to("/").into_response()
}

/// Close the register panel
/// POST /cancel
async fn cancel(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.cancel();
    Redirect::to("/").into_response()
}

/// Refresh and show the tags table
/// POST /table/view
async fn view_table(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.view_table().await;
    Redirect::to("/").into_response()
}

/// Hide the tags table
/// POST /table/close
async fn close_table(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let Ok(mut controller) = state.controller.try_lock() else {
        return busy_page(state.nfc.available()).into_response();
    };
    controller.set_fields(fields);
    controller.close_table();
    Redirect::to("/").into_response()
}

/// Scan one tag and fill the Tag ID input from its text record
/// POST /nfc/read
async fn nfc_read(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    {
        let Ok(mut controller) = state.controller.try_lock() else {
            return busy_page(state.nfc.available()).into_response();
        };
        controller.set_fields(fields);
    }

    // The scan can wait a while; the controller stays unlocked so the
    // other buttons keep working, and a second read supersedes this one.
    let outcome = state.nfc.read_once().await;

    let mut controller = state.controller.lock().await;
    match outcome {
        Ok(scan) => match scan.text {
            None => controller.set_banner(Banner::error(MSG_NFC_NO_TEXT)),
            Some(text) if text.is_empty() => {
                controller.set_banner(Banner::info(MSG_NFC_BLANK_TEXT))
            }
            Some(text) => {
                let message = if scan.serial_number.is_empty() {
                    format!("Read text: {text}")
                } else {
                    format!("Read text: {text} (UID: {})", scan.serial_number)
                };
                controller.set_tag(text);
                controller.set_banner(Banner::info(message));
            }
        },
        Err(err) => controller.set_banner(Banner::error(format!("NFC READ failed: {err}"))),
    }
    Redirect::to("/").into_response()
}

/// Write the lot id (or, failing that, the tag input) to a tag
/// POST /nfc/write
async fn nfc_write(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    let text = {
        let Ok(mut controller) = state.controller.try_lock() else {
            return busy_page(state.nfc.available()).into_response();
        };
        controller.set_fields(fields);
        let form = controller.fields();
        let source = if form.lot.trim().is_empty() {
            form.tag.trim()
        } else {
            form.lot.trim()
        };
        if source.is_empty() {
            controller.set_banner(Banner::error(MSG_NFC_WRITE_NEEDS_LOT));
            return Redirect::to("/").into_response();
        }
        source.to_string()
    };

    let result = state.nfc.write_text(&text).await;

    let mut controller = state.controller.lock().await;
    match result {
        Ok(()) => controller.set_banner(Banner::info(MSG_NFC_WRITE_OK)),
        Err(err) => controller.set_banner(Banner::error(format!("NFC WRITE failed: {err}"))),
    }
    Redirect::to("/").into_response()
}

/// Blank a tag's text record
/// POST /nfc/erase
async fn nfc_erase(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Response {
    {
        let Ok(mut controller) = state.controller.try_lock() else {
            return busy_page(state.nfc.available()).into_response();
        };
        controller.set_fields(fields);
    }

    let result = state.nfc.write_text("").await;

    let mut controller = state.controller.lock().await;
    match result {
        Ok(()) => controller.set_banner(Banner::info(MSG_NFC_ERASE_OK)),
        Err(err) => controller.set_banner(Banner::error(format!("NFC ERASE failed: {err}"))),
    }
    Redirect::to("/").into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    status: String,
    service: String,
    version: String,
    timestamp: String,
    cached_rows: usize,
    table_refreshed_at: Option<String>,
    nfc_available: bool,
    upstream: UpstreamStatus,
}

#[derive(Serialize)]
struct UpstreamStatus {
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint with an upstream probe
/// GET /api/health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (cached_rows, refreshed, api) = {
        let controller = state.controller.lock().await;
        (
            controller.cache().len(),
            controller.cache().refreshed_at_utc(),
            controller.api().clone(),
        )
    };

    let upstream = match api.version().await {
        Ok(version) => UpstreamStatus {
            reachable: true,
            version: Some(version),
            error: None,
        },
        Err(err) => UpstreamStatus {
            reachable: false,
            version: None,
            error: Some(err.to_string()),
        },
    };

    Json(HealthResponse {
        success: true,
        status: if upstream.reachable {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        service: "tag-station".to_string(),
        version: VERSION.to_string(),
        timestamp: now_in(state.display_tz).to_rfc3339(),
        cached_rows,
        table_refreshed_at: refreshed.map(|at| display_stamp(at, state.display_tz)),
        nfc_available: state.nfc.available(),
        upstream,
    })
}

#[derive(Serialize)]
struct TagsResponse {
    rows: Vec<TagRow>,
    updated: Option<String>,
    refreshed_at: Option<String>,
}

/// Cached tags table as JSON
/// GET /api/tags
async fn get_tags(State(state): State<AppState>) -> Json<TagsResponse> {
    let controller = state.controller.lock().await;
    let snapshot = controller.cache().snapshot();
    Json(TagsResponse {
        rows: snapshot.rows,
        updated: snapshot.updated,
        refreshed_at: controller
            .cache()
            .refreshed_at_utc()
            .map(|at| display_stamp(at, state.display_tz)),
    })
}
