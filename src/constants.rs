// Application Constants
// Centralized constants to avoid magic numbers

/// Default server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4410;

/// Upstream spreadsheet API defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const MAX_REDIRECTS: usize = 10;
/// Leading slice of a non-JSON body kept for diagnostics
pub const NON_JSON_PREVIEW_CHARS: usize = 180;

/// NFC bridge defaults
pub const DEFAULT_NFC_READ_TIMEOUT_SECS: u64 = 30;
pub const NFC_TEXT_LANG: &str = "en";

/// Operator-facing status messages
pub const MSG_MISSING_TAG: &str = "Missing Tag ID.";
pub const MSG_MISSING_LOT: &str = "Missing Lot ID (this will be the tab name).";
pub const MSG_MISSING_PRODUCT: &str = "Missing Product Name.";
pub const MSG_QTY_NOT_NUMERIC: &str = "Lot Qty must be a number.";
pub const MSG_QTY_BLANK: &str = "Lot Qty cannot be blank for Register.";
pub const MSG_NOT_FOUND: &str =
    "Not found. Enter Lot ID / Lot Qty / Product Name, then click Register.";
pub const MSG_FOUND: &str = "Found ✅ Loaded Lot/Qty/Product into the form.";
pub const MSG_EDITING: &str = "Editing. Change Lot/Qty/Product, then click Save.";
pub const MSG_BUSY: &str = "Another request is still in flight. Please wait.";
pub const MSG_NOTHING_SELECTED: &str = "No registered lot selected. Look up a tag first.";
pub const MSG_DEREGISTER_OFF: &str = "Deregister is not enabled on this station.";
pub const MSG_NFC_UNSUPPORTED: &str =
    "NFC not available on this station: no reader is attached.";
pub const MSG_NFC_READY: &str = "NFC reader ready.";
pub const MSG_NFC_WRITE_NEEDS_LOT: &str = "Enter a LOT (Lot ID box) before NFC Write.";
pub const MSG_NFC_NO_TEXT: &str = "Read OK, but no NDEF Text record found.";
pub const MSG_NFC_BLANK_TEXT: &str = "Read OK: (blank text).";
pub const MSG_NFC_WRITE_OK: &str = "NFC write OK. You can remove the tag.";
pub const MSG_NFC_ERASE_OK: &str = "NFC erase OK. Tag text cleared.";
