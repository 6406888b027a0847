use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cache::TagCache;
use crate::constants::{
    MSG_DEREGISTER_OFF, MSG_EDITING, MSG_FOUND, MSG_MISSING_LOT, MSG_MISSING_PRODUCT,
    MSG_MISSING_TAG, MSG_NOTHING_SELECTED, MSG_NOT_FOUND, MSG_QTY_BLANK, MSG_QTY_NOT_NUMERIC,
};
use crate::models::form::{normalize_tag, parse_qty, Banner, FormFields, FormPhase, QtyField};
use crate::models::tag::{SeedReceipt, TagRow};

/// Station behavior switches. Both ship as environment configuration so
/// one build covers the stations that differ only in these.
#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    pub offer_deregister: bool,
    pub close_after_save: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            offer_deregister: true,
            close_after_save: false,
        }
    }
}

/// The lookup/register/deregister state machine.
///
/// One instance per station, behind an async mutex; every HTTP event first
/// echoes the posted form fields here, then dispatches exactly one
/// transition. Network traffic happens only where an operation calls for
/// it; validation failures never leave the process.
pub struct TagController {
    api: ApiClient,
    cache: TagCache,
    config: ControllerConfig,
    phase: FormPhase,
    fields: FormFields,
    selected: Option<TagRow>,
    banner: Option<Banner>,
    table_open: bool,
    table_status: String,
}

impl TagController {
    pub fn new(api: ApiClient, cache: TagCache, config: ControllerConfig) -> Self {
        Self {
            api,
            cache,
            config,
            phase: FormPhase::Hidden,
            fields: FormFields::default(),
            selected: None,
            banner: None,
            table_open: false,
            table_status: String::new(),
        }
    }

    /// Echo what the browser posted so the next render shows exactly what
    /// the operator last saw.
    pub fn set_fields(&mut self, fields: FormFields) {
        self.fields = fields;
    }

    /// Overwrite the tag input, e.g. from a completed NFC read.
    pub fn set_tag(&mut self, tag: String) {
        self.fields.tag = tag;
    }

    pub fn set_banner(&mut self, banner: Banner) {
        self.banner = Some(banner);
    }

    /// Look the tag input up in the cached table.
    pub async fn lookup(&mut self) {
        self.banner = None;
        let tag = normalize_tag(&self.fields.tag).to_string();
        if tag.is_empty() {
            self.phase = FormPhase::Hidden;
            self.selected = None;
            self.banner = Some(Banner::error(MSG_MISSING_TAG));
            return;
        }

        if let Err(err) = self.cache.ensure_fresh(&self.api).await {
            self.banner = Some(Banner::error(err.to_string()));
            return;
        }

        match self.cache.find(&tag).cloned() {
            None => {
                info!("🔍 Tag '{}' not in table, offering registration", tag);
                self.fields.lot.clear();
                self.fields.qty.clear();
                self.fields.product.clear();
                self.selected = None;
                self.phase = FormPhase::NotFound;
                self.banner = Some(Banner::info(MSG_NOT_FOUND));
            }
            Some(row) => {
                info!("✅ Tag '{}' found (lot {})", tag, row.lot_id);
                self.fields.lot = row.lot_id.clone();
                self.fields.qty = row.lot_qty.clone();
                self.fields.product = row.product_name.clone();
                self.selected = Some(row);
                self.phase = FormPhase::FoundView;
                self.banner = Some(Banner::info(MSG_FOUND));
            }
        }
    }

    /// The register-panel button: Register, Edit or Save depending on
    /// where the machine is. Switching into edit makes no network calls.
    pub async fn primary(&mut self) {
        self.banner = None;
        match self.phase {
            FormPhase::Hidden => {
                self.banner = Some(Banner::error(MSG_NOTHING_SELECTED));
            }
            FormPhase::FoundView => {
                self.phase = FormPhase::FoundEdit;
                self.banner = Some(Banner::info(MSG_EDITING));
            }
            FormPhase::NotFound | FormPhase::FoundEdit => self.save().await,
        }
    }

    async fn save(&mut self) {
        let tag = normalize_tag(&self.fields.tag).to_string();
        let lot = self.fields.lot.trim().to_string();
        let product = self.fields.product.trim().to_string();

        if tag.is_empty() {
            self.banner = Some(Banner::error(MSG_MISSING_TAG));
            return;
        }
        if lot.is_empty() {
            self.banner = Some(Banner::error(MSG_MISSING_LOT));
            return;
        }
        if product.is_empty() {
            self.banner = Some(Banner::error(MSG_MISSING_PRODUCT));
            return;
        }
        let qty = match parse_qty(&self.fields.qty) {
            QtyField::Invalid => {
                self.banner = Some(Banner::error(MSG_QTY_NOT_NUMERIC));
                return;
            }
            QtyField::Blank => {
                self.banner = Some(Banner::error(MSG_QTY_BLANK));
                return;
            }
            QtyField::Whole(v) => v,
        };

        // Updates address the tab that actually backs the row; a create
        // seeds a tab named after the lot.
        let sheet = match (self.phase, &self.selected) {
            (FormPhase::FoundEdit, Some(row)) if !row.sheet.trim().is_empty() => row.sheet.clone(),
            _ => lot.clone(),
        };

        let receipt = match self.api.tag_seed(&sheet, &lot, &tag, &product, qty).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.banner = Some(Banner::error(err.to_string()));
                return;
            }
        };
        info!("✅ Seeded tag '{}' on sheet '{}'", tag, sheet);

        let qty_str = qty.to_string();
        let banner = registered_banner(&receipt, &sheet, &lot, &tag, &product, &qty_str);

        // The write already succeeded; a refresh failure here must not
        // turn the operation into an error. It does leave pre-save rows
        // in the cache, so the lookup below only trusts a fresh table.
        let refreshed = match self.cache.refresh(&self.api).await {
            Ok(_) => true,
            Err(err) => {
                warn!("⚠️  Post-register table refresh failed: {}", err);
                false
            }
        };

        let cached = if refreshed {
            self.cache.find(&tag).cloned()
        } else {
            None
        };
        let row = cached.unwrap_or_else(|| TagRow {
            tag_id: or_nonempty(&receipt.tag_id, &tag).to_string(),
            lot_id: or_nonempty(&receipt.lot_id, &lot).to_string(),
            lot_qty: receipt.in_qty.clone().unwrap_or_else(|| qty_str.clone()),
            product_name: or_nonempty(&receipt.product, &product).to_string(),
            sheet: or_nonempty(&receipt.tab, &sheet).to_string(),
        });

        if self.config.close_after_save {
            self.phase = FormPhase::Hidden;
            self.selected = None;
            self.clear_panel_fields();
        } else {
            self.fields.lot = row.lot_id.clone();
            self.fields.qty = row.lot_qty.clone();
            self.fields.product = row.product_name.clone();
            self.selected = Some(row);
            self.phase = FormPhase::FoundView;
        }
        self.banner = Some(banner);
    }

    /// Remove the selected lot's row. The view asks for confirmation
    /// before this event is ever posted.
    pub async fn deregister(&mut self) {
        self.banner = None;
        if !self.config.offer_deregister {
            self.banner = Some(Banner::error(MSG_DEREGISTER_OFF));
            return;
        }
        let Some(row) = self.selected.clone() else {
            self.banner = Some(Banner::error(MSG_NOTHING_SELECTED));
            return;
        };

        let sheet = if row.sheet.trim().is_empty() {
            row.lot_id.clone()
        } else {
            row.sheet.clone()
        };

        match self.api.tag_deregister(&sheet, &row.lot_id).await {
            Err(err) => {
                self.banner = Some(Banner::error(err.to_string()));
            }
            Ok(receipt) => {
                info!("✅ Deregistered lot '{}' (sheet '{}')", row.lot_id, sheet);
                if let Err(err) = self.cache.refresh(&self.api).await {
                    warn!("⚠️  Post-deregister table refresh failed: {}", err);
                }
                let text = match receipt.note.filter(|n| !n.is_empty()) {
                    Some(note) => format!("Deregistered ✅ {note}"),
                    None => "Deregistered ✅".to_string(),
                };
                self.phase = FormPhase::Hidden;
                self.selected = None;
                self.clear_panel_fields();
                self.banner = Some(Banner::info(text));
            }
        }
    }

    /// Close the register panel and drop whatever was selected.
    pub fn cancel(&mut self) {
        self.phase = FormPhase::Hidden;
        self.selected = None;
        self.clear_panel_fields();
        self.banner = None;
    }

    /// Open the table box on a freshly fetched copy of the table.
    pub async fn view_table(&mut self) {
        self.banner = None;
        self.table_open = true;
        match self.cache.refresh(&self.api).await {
            Err(err) => {
                self.banner = Some(Banner::error(err.to_string()));
            }
            Ok(0) => {
                self.table_status = "No rows.".to_string();
            }
            Ok(n) => {
                self.table_status = match self.cache.updated() {
                    Some(updated) if !updated.is_empty() => {
                        format!("Loaded {n} rows. Updated: {updated}")
                    }
                    _ => format!("Loaded {n} rows."),
                };
            }
        }
    }

    pub fn close_table(&mut self) {
        self.table_open = false;
    }

    fn clear_panel_fields(&mut self) {
        self.fields.lot.clear();
        self.fields.qty.clear();
        self.fields.product.clear();
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<&TagRow> {
        self.selected.as_ref()
    }

    pub fn offers_deregister(&self) -> bool {
        self.config.offer_deregister
    }

    pub fn table_open(&self) -> bool {
        self.table_open
    }

    pub fn table_status(&self) -> &str {
        &self.table_status
    }

    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

fn or_nonempty<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().filter(|s| !s.is_empty()).unwrap_or(fallback)
}

/// Success banner echoing what the service wrote, falling back to the
/// submitted values field by field. The quantity falls back only when the
/// service sent nothing at all; an empty echo is shown as-is.
fn registered_banner(
    receipt: &SeedReceipt,
    sheet: &str,
    lot: &str,
    tag: &str,
    product: &str,
    qty: &str,
) -> Banner {
    Banner::info(format!(
        "Registered ✅\n\nTab: {}\nLOT_ID: {}\nTAG_ID: {}\nPRODUCT: {}\nLOT_QTY (IN): {}",
        or_nonempty(&receipt.tab, sheet),
        or_nonempty(&receipt.lot_id, lot),
        or_nonempty(&receipt.tag_id, tag),
        or_nonempty(&receipt.product, product),
        receipt.in_qty.as_deref().unwrap_or(qty),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::Query;
    use axum::response::Json;
    use axum::routing::get;
    use axum::Router;
    use serde_json::{json, Value};

    use crate::models::form::BannerTone;

    /// In-memory stand-in for the sheet service: answers `tags_table`,
    /// upserts on `tag_seed`, removes on `tag_deregister`, and records
    /// every call for assertions.
    #[derive(Default)]
    struct SheetState {
        rows: Vec<Value>,
        updated: Option<String>,
        fail_table: bool,
        table_calls: usize,
        seed_params: Vec<HashMap<String, String>>,
        deregister_params: Vec<HashMap<String, String>>,
    }

    fn sheet_row(tag: &str, lot: &str, qty: &str, product: &str, sheet: &str) -> Value {
        json!({
            "TAG_ID": tag, "LOT_ID": lot, "LOT_QTY": qty,
            "PRODUCT_NAME": product, "SHEET": sheet
        })
    }

    async fn sheet_service(initial: Vec<Value>) -> (String, Arc<Mutex<SheetState>>) {
        let state = Arc::new(Mutex::new(SheetState {
            rows: initial,
            ..SheetState::default()
        }));
        let shared = state.clone();
        let router = Router::new().route(
            "/",
            get(move |Query(q): Query<HashMap<String, String>>| {
                let state = shared.clone();
                async move {
                    let mut s = state.lock().unwrap();
                    match q.get("action").map(String::as_str) {
                        Some("tags_table") => {
                            s.table_calls += 1;
                            if s.fail_table {
                                return Json(json!({ "ok": false, "error": "table offline" }));
                            }
                            let mut body = json!({ "ok": true, "rows": s.rows });
                            if let Some(u) = &s.updated {
                                body["updated"] = json!(u);
                            }
                            Json(body)
                        }
                        Some("tag_seed") => {
                            s.seed_params.push(q.clone());
                            let tag = q.get("tag_id").cloned().unwrap_or_default();
                            let lot = q.get("lot_id").cloned().unwrap_or_default();
                            let qty = q.get("qty").cloned().unwrap_or_default();
                            let product = q.get("product").cloned().unwrap_or_default();
                            let sheet = q.get("sheet").cloned().unwrap_or_default();
                            s.rows.retain(|r| r["TAG_ID"] != json!(tag));
                            s.rows.push(sheet_row(&tag, &lot, &qty, &product, &sheet));
                            Json(json!({
                                "ok": true, "tab": sheet, "lot_id": lot,
                                "tag_id": tag, "product": product, "in_qty": qty
                            }))
                        }
                        Some("tag_deregister") => {
                            s.deregister_params.push(q.clone());
                            let lot = q.get("lot_id").cloned().unwrap_or_default();
                            s.rows.retain(|r| r["LOT_ID"] != json!(lot));
                            Json(json!({ "ok": true, "note": format!("removed {lot}") }))
                        }
                        _ => Json(json!({ "ok": true, "service": "tags" })),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}/"), state)
    }

    async fn station(initial: Vec<Value>) -> (TagController, Arc<Mutex<SheetState>>) {
        station_with(initial, ControllerConfig::default()).await
    }

    async fn station_with(
        initial: Vec<Value>,
        config: ControllerConfig,
    ) -> (TagController, Arc<Mutex<SheetState>>) {
        let (base, state) = sheet_service(initial).await;
        let api = ApiClient::new(&base, Duration::from_secs(2)).unwrap();
        (TagController::new(api, TagCache::new(None), config), state)
    }

    fn banner_text(controller: &TagController) -> &str {
        controller.banner().map(|b| b.text.as_str()).unwrap_or("")
    }

    #[tokio::test]
    async fn blank_tag_lookup_reports_missing_and_hides_the_panel() {
        let (mut ctl, state) = station(vec![]).await;
        ctl.set_fields(FormFields {
            tag: "   ".into(),
            ..FormFields::default()
        });

        ctl.lookup().await;

        assert_eq!(ctl.phase(), FormPhase::Hidden);
        assert_eq!(banner_text(&ctl), MSG_MISSING_TAG);
        assert_eq!(ctl.banner().unwrap().tone, BannerTone::Error);
        assert_eq!(state.lock().unwrap().table_calls, 0);
    }

    #[tokio::test]
    async fn first_lookup_loads_the_table_once() {
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "L-1")];
        let (mut ctl, state) = station(rows).await;

        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        assert_eq!(state.lock().unwrap().table_calls, 1);

        ctl.lookup().await;
        assert_eq!(state.lock().unwrap().table_calls, 1);
    }

    #[tokio::test]
    async fn lookup_hit_fills_fields_and_goes_read_only() {
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "TAB-1")];
        let (mut ctl, _) = station(rows).await;

        ctl.set_fields(FormFields {
            tag: " 007 ".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        assert_eq!(ctl.phase(), FormPhase::FoundView);
        assert!(!ctl.phase().fields_editable());
        assert_eq!(ctl.fields().lot, "L-1");
        assert_eq!(ctl.fields().qty, "5");
        assert_eq!(ctl.fields().product, "Flour");
        assert_eq!(banner_text(&ctl), MSG_FOUND);
        assert_eq!(ctl.selected().unwrap().sheet, "TAB-1");
    }

    #[tokio::test]
    async fn lookup_miss_clears_stale_fields_and_offers_registration() {
        let (mut ctl, _) = station(vec![sheet_row("1", "L", "1", "P", "L")]).await;

        ctl.set_fields(FormFields {
            tag: "999".into(),
            lot: "stale".into(),
            qty: "stale".into(),
            product: "stale".into(),
        });
        ctl.lookup().await;

        assert_eq!(ctl.phase(), FormPhase::NotFound);
        assert!(ctl.phase().fields_editable());
        assert_eq!(ctl.fields().lot, "");
        assert_eq!(ctl.fields().qty, "");
        assert_eq!(ctl.fields().product, "");
        assert_eq!(banner_text(&ctl), MSG_NOT_FOUND);
        assert_eq!(ctl.banner().unwrap().tone, BannerTone::Info);
    }

    #[tokio::test]
    async fn unreachable_table_surfaces_the_error_on_lookup() {
        let (mut ctl, state) = station(vec![]).await;
        state.lock().unwrap().fail_table = true;

        ctl.set_fields(FormFields {
            tag: "1".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        assert_eq!(banner_text(&ctl), "table offline");
        assert_eq!(ctl.banner().unwrap().tone, BannerTone::Error);
        assert_eq!(ctl.phase(), FormPhase::Hidden);
    }

    #[tokio::test]
    async fn edit_toggle_makes_no_network_calls() {
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "L-1")];
        let (mut ctl, state) = station(rows).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        let before = state.lock().unwrap().table_calls;

        ctl.primary().await;

        assert_eq!(ctl.phase(), FormPhase::FoundEdit);
        assert!(ctl.phase().fields_editable());
        let s = state.lock().unwrap();
        assert_eq!(s.table_calls, before);
        assert!(s.seed_params.is_empty());
    }

    #[tokio::test]
    async fn register_validation_stops_before_the_network() {
        let (mut ctl, state) = station(vec![]).await;
        ctl.set_fields(FormFields {
            tag: "42".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        assert_eq!(ctl.phase(), FormPhase::NotFound);

        // Missing lot first, then product, then the two quantity cases.
        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: " ".into(),
            qty: "1".into(),
            product: "P".into(),
        });
        ctl.primary().await;
        assert_eq!(banner_text(&ctl), MSG_MISSING_LOT);

        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-1".into(),
            qty: "1".into(),
            product: "".into(),
        });
        ctl.primary().await;
        assert_eq!(banner_text(&ctl), MSG_MISSING_PRODUCT);

        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-1".into(),
            qty: "12kg".into(),
            product: "P".into(),
        });
        ctl.primary().await;
        assert_eq!(banner_text(&ctl), MSG_QTY_NOT_NUMERIC);

        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-1".into(),
            qty: "  ".into(),
            product: "P".into(),
        });
        ctl.primary().await;
        assert_eq!(banner_text(&ctl), MSG_QTY_BLANK);

        assert!(state.lock().unwrap().seed_params.is_empty());
    }

    #[tokio::test]
    async fn register_seeds_once_then_refreshes_once() {
        let (mut ctl, state) = station(vec![]).await;
        ctl.set_fields(FormFields {
            tag: "42".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        let table_before = state.lock().unwrap().table_calls;

        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-7".into(),
            qty: "1,250.9".into(),
            product: "Sugar".into(),
        });
        ctl.primary().await;

        {
            let s = state.lock().unwrap();
            assert_eq!(s.seed_params.len(), 1);
            assert_eq!(s.table_calls, table_before + 1);
            let p = &s.seed_params[0];
            assert_eq!(p["sheet"], "L-7");
            assert_eq!(p["lot_id"], "L-7");
            assert_eq!(p["tag_id"], "42");
            assert_eq!(p["product"], "Sugar");
            assert_eq!(p["qty"], "1250");
        }

        assert_eq!(ctl.phase(), FormPhase::FoundView);
        assert!(banner_text(&ctl).starts_with("Registered ✅"));
        assert!(banner_text(&ctl).contains("LOT_QTY (IN): 1250"));
        assert_eq!(ctl.banner().unwrap().tone, BannerTone::Info);
        assert_eq!(ctl.selected().unwrap().lot_id, "L-7");
        assert_eq!(ctl.fields().qty, "1250");
    }

    #[tokio::test]
    async fn update_addresses_the_rows_backing_sheet() {
        // The tab was renamed: SHEET differs from the displayed lot id.
        let rows = vec![sheet_row("007", "L-NEW", "5", "Flour", "TAB-OLD")];
        let (mut ctl, state) = station(rows).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        ctl.primary().await;
        assert_eq!(ctl.phase(), FormPhase::FoundEdit);

        ctl.set_fields(FormFields {
            tag: "007".into(),
            lot: "L-NEW".into(),
            qty: "9".into(),
            product: "Flour".into(),
        });
        ctl.primary().await;

        let s = state.lock().unwrap();
        assert_eq!(s.seed_params.len(), 1);
        assert_eq!(s.seed_params[0]["sheet"], "TAB-OLD");
        assert_eq!(s.seed_params[0]["lot_id"], "L-NEW");
    }

    #[tokio::test]
    async fn refresh_failure_after_register_keeps_the_success() {
        let (mut ctl, state) = station(vec![]).await;
        ctl.set_fields(FormFields {
            tag: "42".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        state.lock().unwrap().fail_table = true;
        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-7".into(),
            qty: "3".into(),
            product: "Salt".into(),
        });
        ctl.primary().await;

        assert!(banner_text(&ctl).starts_with("Registered ✅"));
        assert_eq!(ctl.banner().unwrap().tone, BannerTone::Info);
        // Selection falls back to the receipt when the table is stale.
        assert_eq!(ctl.phase(), FormPhase::FoundView);
        let row = ctl.selected().unwrap();
        assert_eq!(row.tag_id, "42");
        assert_eq!(row.sheet, "L-7");
    }

    #[tokio::test]
    async fn refresh_failure_after_update_shows_the_saved_values() {
        // The cache already holds the pre-save row here; a failed refresh
        // must not let it override what was just written.
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "TAB-1")];
        let (mut ctl, state) = station(rows).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;
        ctl.primary().await;
        assert_eq!(ctl.phase(), FormPhase::FoundEdit);

        state.lock().unwrap().fail_table = true;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            lot: "L-1".into(),
            qty: "9".into(),
            product: "Flour".into(),
        });
        ctl.primary().await;

        assert!(banner_text(&ctl).contains("LOT_QTY (IN): 9"));
        assert_eq!(ctl.phase(), FormPhase::FoundView);
        assert_eq!(ctl.fields().qty, "9");
        let row = ctl.selected().unwrap();
        assert_eq!(row.lot_qty, "9");
        assert_eq!(row.sheet, "TAB-1");
    }

    #[tokio::test]
    async fn deregister_uses_the_sheet_and_resets_the_form() {
        let rows = vec![sheet_row("007", "L-NEW", "5", "Flour", "TAB-OLD")];
        let (mut ctl, state) = station(rows).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        ctl.deregister().await;

        {
            let s = state.lock().unwrap();
            assert_eq!(s.deregister_params.len(), 1);
            assert_eq!(s.deregister_params[0]["sheet"], "TAB-OLD");
            assert_eq!(s.deregister_params[0]["lot_id"], "L-NEW");
        }
        assert_eq!(ctl.phase(), FormPhase::Hidden);
        assert!(!ctl.has_selection());
        assert_eq!(ctl.fields().lot, "");
        assert!(banner_text(&ctl).starts_with("Deregistered ✅"));
        // The refreshed cache no longer holds the row.
        assert!(ctl.cache().find("007").is_none());
    }

    #[tokio::test]
    async fn deregister_without_a_selection_is_refused_locally() {
        let (mut ctl, state) = station(vec![]).await;

        ctl.deregister().await;

        assert_eq!(banner_text(&ctl), MSG_NOTHING_SELECTED);
        assert!(state.lock().unwrap().deregister_params.is_empty());
    }

    #[tokio::test]
    async fn deregister_can_be_switched_off() {
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "L-1")];
        let config = ControllerConfig {
            offer_deregister: false,
            ..ControllerConfig::default()
        };
        let (mut ctl, state) = station_with(rows, config).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        ctl.deregister().await;

        assert_eq!(banner_text(&ctl), MSG_DEREGISTER_OFF);
        assert!(state.lock().unwrap().deregister_params.is_empty());
        assert_eq!(ctl.phase(), FormPhase::FoundView);
    }

    #[tokio::test]
    async fn cancel_clears_the_panel_but_keeps_the_tag_input() {
        let rows = vec![sheet_row("007", "L-1", "5", "Flour", "L-1")];
        let (mut ctl, _) = station(rows).await;
        ctl.set_fields(FormFields {
            tag: "007".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        ctl.cancel();

        assert_eq!(ctl.phase(), FormPhase::Hidden);
        assert!(ctl.banner().is_none());
        assert!(!ctl.has_selection());
        assert_eq!(ctl.fields().tag, "007");
        assert_eq!(ctl.fields().lot, "");
    }

    #[tokio::test]
    async fn view_table_reports_count_and_update_stamp() {
        let rows = vec![
            sheet_row("1", "L-1", "5", "Flour", "L-1"),
            sheet_row("2", "L-2", "7", "Sugar", "L-2"),
        ];
        let (mut ctl, state) = station(rows).await;
        state.lock().unwrap().updated = Some("2025-01-07 10:00".into());

        ctl.view_table().await;

        assert!(ctl.table_open());
        assert_eq!(ctl.table_status(), "Loaded 2 rows. Updated: 2025-01-07 10:00");

        ctl.close_table();
        assert!(!ctl.table_open());
    }

    #[tokio::test]
    async fn view_table_without_update_stamp_and_when_empty() {
        let (mut ctl, _) = station(vec![sheet_row("1", "L", "1", "P", "L")]).await;
        ctl.view_table().await;
        assert_eq!(ctl.table_status(), "Loaded 1 rows.");

        let (mut empty, _) = station(vec![]).await;
        empty.view_table().await;
        assert_eq!(empty.table_status(), "No rows.");
    }

    #[tokio::test]
    async fn close_after_save_returns_to_the_idle_screen() {
        let config = ControllerConfig {
            close_after_save: true,
            ..ControllerConfig::default()
        };
        let (mut ctl, _) = station_with(vec![], config).await;
        ctl.set_fields(FormFields {
            tag: "42".into(),
            ..FormFields::default()
        });
        ctl.lookup().await;

        ctl.set_fields(FormFields {
            tag: "42".into(),
            lot: "L-7".into(),
            qty: "3".into(),
            product: "Salt".into(),
        });
        ctl.primary().await;

        assert_eq!(ctl.phase(), FormPhase::Hidden);
        assert!(!ctl.has_selection());
        assert_eq!(ctl.fields().lot, "");
        assert!(banner_text(&ctl).starts_with("Registered ✅"));
    }
}
