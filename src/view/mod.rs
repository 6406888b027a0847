use std::fmt::Write;

use crate::constants::{MSG_NFC_READY, MSG_NFC_UNSUPPORTED};
use crate::models::form::{Banner, BannerTone, FormFields, FormPhase};
use crate::models::tag::TagRow;

/// Everything the page needs for one render. Handlers assemble this from
/// the controller and the NFC bridge; rendering itself does no I/O.
pub struct PageModel {
    pub banner: Option<Banner>,
    pub phase: FormPhase,
    pub fields: FormFields,
    pub offer_deregister: bool,
    pub has_selection: bool,
    pub table: Option<TableModel>,
    pub nfc_available: bool,
}

pub struct TableModel {
    pub rows: Vec<TagRow>,
    pub status: String,
}

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;max-width:720px;margin:24px auto;padding:0 12px}\
.row{display:flex;gap:8px;align-items:center;margin:8px 0}\
.row label{min-width:110px}\
input{padding:6px 8px;flex:1}\
button{padding:6px 12px}\
.box{border:1px solid #ccc;border-radius:6px;padding:12px;margin:12px 0}\
.result{border:1px solid #ccc;border-radius:6px;padding:12px;margin:12px 0;white-space:pre-line}\
.result.ok{background:#f3fff3;color:#0a6b0a}\
.result.err{background:#fff2f2;color:#b00020}\
.small{color:#555;font-size:0.9em}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ddd;padding:4px 8px;text-align:left}";

/// Render the whole station page. All buttons post through the one form
/// via `formaction`, so every event round-trips all four fields.
pub fn render_page(page: &PageModel) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Tag Station</title>\n");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    html.push_str("</head>\n<body>\n<h1>Tag Station</h1>\n");
    html.push_str("<form method=\"post\" action=\"/lookup\">\n");

    lookup_row(&mut html, &page.fields);
    nfc_row(&mut html, page.nfc_available);

    if let Some(banner) = &page.banner {
        let tone = match banner.tone {
            BannerTone::Info => "ok",
            BannerTone::Error => "err",
        };
        let _ = writeln!(
            html,
            "<div id=\"result\" class=\"result {}\">{}</div>",
            tone,
            escape(&banner.text)
        );
    }

    if page.phase.panel_open() {
        register_panel(&mut html, page);
    }
    if let Some(table) = &page.table {
        table_box(&mut html, table);
    }

    html.push_str("</form>\n</body>\n</html>\n");
    html
}

fn lookup_row(html: &mut String, fields: &FormFields) {
    html.push_str("<div class=\"row\">\n");
    html.push_str("<label for=\"tag\">Tag ID</label>\n");
    let _ = writeln!(
        html,
        "<input id=\"tag\" name=\"tag\" value=\"{}\" autofocus>",
        escape(&fields.tag)
    );
    html.push_str("<button formaction=\"/lookup\">Lookup</button>\n");
    html.push_str("<button formaction=\"/table/view\">View tags table</button>\n");
    html.push_str("</div>\n");
}

fn nfc_row(html: &mut String, available: bool) {
    let disabled = if available { "" } else { " disabled" };
    html.push_str("<div class=\"row\">\n");
    let _ = writeln!(html, "<button formaction=\"/nfc/read\"{disabled}>NFC Read</button>");
    let _ = writeln!(html, "<button formaction=\"/nfc/write\"{disabled}>NFC Write</button>");
    let _ = writeln!(html, "<button formaction=\"/nfc/erase\"{disabled}>NFC Erase</button>");
    let note = if available {
        MSG_NFC_READY
    } else {
        MSG_NFC_UNSUPPORTED
    };
    let _ = writeln!(html, "<span id=\"nfcStatus\" class=\"small\">{}</span>", escape(note));
    html.push_str("</div>\n");
}

fn register_panel(html: &mut String, page: &PageModel) {
    // Read-only inputs still post their values back, unlike disabled ones.
    let readonly = if page.phase.fields_editable() {
        ""
    } else {
        " readonly"
    };
    html.push_str("<div id=\"registerBox\" class=\"box\">\n");
    for (id, label, value) in [
        ("lot", "Lot ID", &page.fields.lot),
        ("qty", "Lot Qty", &page.fields.qty),
        ("product", "Product Name", &page.fields.product),
    ] {
        html.push_str("<div class=\"row\">\n");
        let _ = writeln!(html, "<label for=\"{id}\">{label}</label>");
        let _ = writeln!(
            html,
            "<input id=\"{id}\" name=\"{id}\" value=\"{}\"{readonly}>",
            escape(value)
        );
        html.push_str("</div>\n");
    }

    html.push_str("<div class=\"row\">\n");
    if let Some(label) = page.phase.primary_label() {
        let _ = writeln!(html, "<button id=\"primary\" formaction=\"/primary\">{label}</button>");
    }
    if page.offer_deregister && page.has_selection {
        html.push_str(
            "<button id=\"deregister\" formaction=\"/deregister\" \
             onclick=\"return confirm('Deregister this lot?')\">Deregister</button>\n",
        );
    }
    html.push_str("<button id=\"cancel\" formaction=\"/cancel\">Cancel</button>\n");
    html.push_str("</div>\n</div>\n");
}

fn table_box(html: &mut String, table: &TableModel) {
    html.push_str("<div id=\"tableBox\" class=\"box\">\n");
    let _ = writeln!(
        html,
        "<div id=\"tableStatus\" class=\"small\">{}</div>",
        escape(&table.status)
    );
    html.push_str("<table id=\"table\">\n<thead><tr>");
    html.push_str("<th>TAG_ID</th><th>LOT_ID</th><th>LOT_QTY</th><th>PRODUCT_NAME</th>");
    html.push_str("</tr></thead>\n<tbody>\n");
    // Sheet order, nothing more: no sorting, paging or filtering.
    for row in &table.rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.tag_id),
            escape(&row.lot_id),
            escape(&row.lot_qty),
            escape(&row.product_name)
        );
    }
    html.push_str("</tbody>\n</table>\n");
    html.push_str("<div class=\"row\"><button formaction=\"/table/close\">Close</button></div>\n");
    html.push_str("</div>\n");
}

/// HTML-escape remote- and operator-sourced text before embedding.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
