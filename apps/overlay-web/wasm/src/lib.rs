//! WASM bindings for the invisible text overlay
//!
//! This module provides a stateful, session-based API. All state is held in
//! Rust; JavaScript only handles DOM events and hands over file bytes.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { OverlaySession, readFile } from './pkg/overlay_wasm.js';
//!
//! await init();
//!
//! const session = new OverlaySession();
//! session.setText(textarea.value);
//! const file = input.files[0];
//! session.selectFile(file.name, await readFile(file));
//! if (session.canExecute()) {
//!     try { session.download(); } catch (_) { /* notification already set */ }
//! }
//! showToast(session.notification());
//! setTimeout(() => showToast(session.notification()), OverlaySession.notificationTimeoutMs());
//! ```

pub mod download;
pub mod notification;
pub mod session;
pub mod validation;

use wasm_bindgen::prelude::*;

pub use notification::{Notification, Severity};
pub use session::OverlaySession;
pub use validation::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    log_info("Overlay WASM initialized");
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Read a picked file into memory
#[wasm_bindgen(js_name = readFile)]
pub async fn read_file(file: web_sys::File) -> Result<js_sys::Uint8Array, JsValue> {
    let buffer = wasm_bindgen_futures::JsFuture::from(file.array_buffer()).await?;
    Ok(js_sys::Uint8Array::new(&buffer))
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen(js_name = quickValidate)]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    validation::quick_validate(bytes).map_err(|e| JsValue::from_str(&e))
}

/// Get PDF info without touching the session
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = validation::validate_pdf(bytes).map_err(|e| JsValue::from_str(&e))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen(js_name = getPageCount)]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    overlay_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

pub(crate) fn log_info(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    tracing::info!("{}", message);
}

pub(crate) fn log_error(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::error_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    tracing::error!("{}", message);
}
