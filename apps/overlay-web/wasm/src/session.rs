//! Stateful overlay session
//!
//! Holds everything one page visit needs (text, selected file, output name,
//! options, current notification) in Rust, so JavaScript only wires DOM
//! events to these methods.

use crate::download::{save_bytes, BrowserSaveTarget, SaveTarget};
use crate::log_error;
use crate::notification::{Notification, AUTO_HIDE_MS, PROCESSING_MESSAGE, VALIDATION_MESSAGE};
use overlay_core::{OverlayError, OverlayOptions, OverlayReport};
use wasm_bindgen::prelude::*;

/// The uploaded file
struct SelectedFile {
    name: String,
    bytes: Vec<u8>,
}

#[wasm_bindgen]
pub struct OverlaySession {
    text: String,
    file: Option<SelectedFile>,
    output_name: String,
    options: OverlayOptions,
    notification: Option<Notification>,
    last_report: Option<OverlayReport>,
}

impl Default for OverlaySession {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl OverlaySession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            text: String::new(),
            file: None,
            output_name: String::new(),
            options: OverlayOptions::default(),
            notification: None,
            last_report: None,
        }
    }

    #[wasm_bindgen(js_name = setText)]
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    #[wasm_bindgen(getter)]
    pub fn text(&self) -> String {
        self.text.clone()
    }

    /// Select the PDF to overlay, replacing any previous selection
    ///
    /// The bytes are not checked here; a bad file fails at processing time.
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&mut self, name: &str, bytes: &[u8]) {
        self.output_name = overlay_core::output_file_name(name);
        self.file = Some(SelectedFile {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        });
    }

    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> Option<String> {
        self.file.as_ref().map(|f| f.name.clone())
    }

    #[wasm_bindgen(getter, js_name = outputFileName)]
    pub fn output_file_name(&self) -> String {
        self.output_name.clone()
    }

    /// Override overlay options from a (partial) options object
    #[wasm_bindgen(js_name = setOptions)]
    pub fn set_options(&mut self, options: JsValue) -> Result<(), JsValue> {
        self.options = serde_wasm_bindgen::from_value(options)
            .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?;
        Ok(())
    }

    /// The processing button is enabled when this is true
    #[wasm_bindgen(js_name = canExecute)]
    pub fn can_execute(&self) -> bool {
        self.file.is_some() && !self.text.trim().is_empty()
    }

    /// Process and return the new PDF without saving it
    pub fn execute(&mut self) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = self
            .execute_internal(js_sys::Date::now())
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(js_sys::Uint8Array::from(bytes.as_slice()))
    }

    /// Process and save the result under `outputFileName`
    pub fn download(&mut self) -> Result<(), JsValue> {
        self.download_with(&BrowserSaveTarget, js_sys::Date::now())
            .map_err(|e| JsValue::from_str(&e))
    }

    /// The visible notification, or null
    pub fn notification(&mut self) -> Result<JsValue, JsValue> {
        match self.current_notification(js_sys::Date::now()) {
            Some(note) => serde_wasm_bindgen::to_value(note)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e))),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = dismissNotification)]
    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    #[wasm_bindgen(js_name = notificationTimeoutMs)]
    pub fn notification_timeout_ms() -> f64 {
        AUTO_HIDE_MS
    }

    /// Metrics of the last successful run, or null
    #[wasm_bindgen(js_name = lastReport)]
    pub fn last_report(&self) -> Result<JsValue, JsValue> {
        match &self.last_report {
            Some(report) => serde_wasm_bindgen::to_value(report)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e))),
            None => Ok(JsValue::NULL),
        }
    }
}

impl OverlaySession {
    fn execute_internal(&mut self, now_ms: f64) -> Result<Vec<u8>, String> {
        let bytes = self.process_current(now_ms)?;
        let message = format!("Modified PDF ready as {}", self.output_name);
        self.notification = Some(Notification::success(message, now_ms));
        Ok(bytes)
    }

    fn download_with<T: SaveTarget + ?Sized>(
        &mut self,
        target: &T,
        now_ms: f64,
    ) -> Result<(), String> {
        let bytes = self.process_current(now_ms)?;
        if let Err(e) = save_bytes(target, &bytes, &self.output_name) {
            log_error(&format!("Error saving PDF: {}", e));
            self.notification = Some(Notification::error(PROCESSING_MESSAGE, now_ms));
            return Err(e);
        }
        self.notify_saved(now_ms);
        Ok(())
    }

    /// Validate and run the pipeline; text and file are left as they were
    fn process_current(&mut self, now_ms: f64) -> Result<Vec<u8>, String> {
        let file_bytes = self.file.as_ref().map(|f| f.bytes.as_slice());
        if let Err(e) = overlay_core::validate_input(&self.text, file_bytes) {
            self.notification = Some(Notification::error(VALIDATION_MESSAGE, now_ms));
            return Err(e.to_string());
        }

        let outcome = match &self.file {
            Some(file) => overlay_core::process_with_report(&self.text, &file.bytes, &self.options),
            None => Err(OverlayError::InvalidInput("No PDF selected".into())),
        };

        match outcome {
            Ok((bytes, report)) => {
                self.last_report = Some(report);
                Ok(bytes)
            }
            Err(e) => {
                log_error(&format!("Error merging PDFs: {}", e));
                self.notification = Some(Notification::error(PROCESSING_MESSAGE, now_ms));
                Err(e.to_string())
            }
        }
    }

    fn notify_saved(&mut self, now_ms: f64) {
        let message = format!("Modified PDF saved as {}", self.output_name);
        self.notification = Some(Notification::success(message, now_ms));
    }

    /// Drops the notification once it has expired
    fn current_notification(&mut self, now_ms: f64) -> Option<&Notification> {
        if self
            .notification
            .as_ref()
            .is_some_and(|note| note.is_expired(now_ms))
        {
            self.notification = None;
        }
        self.notification.as_ref()
    }

    #[cfg(test)]
    fn set_options_json(&mut self, json: &str) -> Result<(), String> {
        self.options = OverlayOptions::from_json(json).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::testing::RecordingTarget;
    use crate::notification::Severity;
    use lopdf::{dictionary, Document, Object};
    use pretty_assertions::assert_eq;

    /// Create a valid test PDF with the specified number of pages
    fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let page_ids: Vec<Object> = (0..num_pages)
            .map(|_| {
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                }))
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => page_ids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn ready_session(num_pages: u32) -> OverlaySession {
        let mut session = OverlaySession::new();
        session.set_text("Rust\nWebAssembly");
        session.select_file("resume.pdf", &create_test_pdf(num_pages));
        session
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = OverlaySession::new();
        assert_eq!(session.text(), "");
        assert_eq!(session.file_name(), None);
        assert_eq!(session.output_file_name(), "");
        assert!(!session.can_execute());
    }

    #[test]
    fn test_select_file_sets_output_name() {
        let mut session = OverlaySession::new();
        session.select_file("resume.pdf", b"%PDF-1.7");
        assert_eq!(session.output_file_name(), "resumeUpdated.pdf");

        session.select_file("cover-letter.pdf", b"%PDF-1.7");
        assert_eq!(session.file_name().as_deref(), Some("cover-letter.pdf"));
        assert_eq!(session.output_file_name(), "cover-letterUpdated.pdf");
    }

    #[test]
    fn test_can_execute_needs_text_and_file() {
        let mut session = OverlaySession::new();
        session.set_text("   ");
        session.select_file("resume.pdf", b"%PDF-1.7");
        assert!(!session.can_execute());

        session.set_text("Rust");
        assert!(session.can_execute());
    }

    #[test]
    fn test_execute_produces_pdf_and_success_notification() {
        let mut session = ready_session(2);
        let bytes = session.execute_internal(0.0).unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 2);

        let note = session.current_notification(0.0).unwrap();
        assert_eq!(note.severity, Severity::Success);
        assert_eq!(note.message, "Modified PDF ready as resumeUpdated.pdf");

        let report = session.last_report.as_ref().unwrap();
        assert_eq!(report.page_count, 2);
        assert_eq!(report.line_count, 2);
    }

    #[test]
    fn test_empty_text_blocks_processing() {
        let target = RecordingTarget::default();
        let mut session = OverlaySession::new();
        session.select_file("resume.pdf", &create_test_pdf(1));

        assert!(session.download_with(&target, 0.0).is_err());
        let note = session.current_notification(0.0).unwrap();
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.message, VALIDATION_MESSAGE);
        assert!(target.created.borrow().is_empty());
    }

    #[test]
    fn test_missing_file_blocks_processing() {
        let mut session = OverlaySession::new();
        session.set_text("Rust");

        assert!(session.execute_internal(0.0).is_err());
        assert_eq!(
            session.current_notification(0.0).unwrap().message,
            VALIDATION_MESSAGE
        );
    }

    #[test]
    fn test_non_pdf_fails_and_keeps_state() {
        let target = RecordingTarget::default();
        let mut session = OverlaySession::new();
        session.set_text("Rust");
        session.select_file("photo.png", b"\x89PNG\r\n\x1a\n not a pdf");

        assert!(session.download_with(&target, 0.0).is_err());
        let note = session.current_notification(0.0).unwrap();
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.message, PROCESSING_MESSAGE);
        assert!(target.created.borrow().is_empty());

        assert_eq!(session.text(), "Rust");
        assert_eq!(session.file_name().as_deref(), Some("photo.png"));
        assert_eq!(session.output_file_name(), "photoUpdated.pdf");
        assert!(session.last_report.is_none());
    }

    #[test]
    fn test_download_saves_and_revokes() {
        let target = RecordingTarget::default();
        let mut session = ready_session(1);

        session.download_with(&target, 0.0).unwrap();
        assert_eq!(target.created.borrow().len(), 1);
        assert_eq!(target.triggered.borrow()[0].1, "resumeUpdated.pdf");
        assert_eq!(target.revoked.borrow().len(), 1);
        let note = session.current_notification(0.0).unwrap();
        assert_eq!(note.severity, Severity::Success);
        assert_eq!(note.message, "Modified PDF saved as resumeUpdated.pdf");
    }

    #[test]
    fn test_failed_save_reports_error_and_revokes() {
        let target = RecordingTarget {
            fail_trigger: true,
            ..Default::default()
        };
        let mut session = ready_session(1);

        assert!(session.download_with(&target, 0.0).is_err());
        assert_eq!(target.revoked.borrow().len(), 1);
        assert_eq!(
            session.current_notification(0.0).unwrap().message,
            PROCESSING_MESSAGE
        );
    }

    #[test]
    fn test_session_usable_after_failure() {
        let mut session = OverlaySession::new();
        session.set_text("Rust");
        session.select_file("bad.pdf", b"garbage");
        assert!(session.execute_internal(0.0).is_err());

        session.select_file("good.pdf", &create_test_pdf(1));
        assert!(session.execute_internal(1.0).is_ok());
        assert_eq!(
            session.current_notification(1.0).unwrap().severity,
            Severity::Success
        );
    }

    #[test]
    fn test_notification_auto_hides() {
        let mut session = ready_session(1);
        session.execute_internal(1_000.0).unwrap();

        assert!(session.current_notification(6_999.0).is_some());
        assert!(session.current_notification(7_000.0).is_none());
        assert!(session.notification.is_none());
    }

    #[test]
    fn test_dismiss_notification() {
        let mut session = ready_session(1);
        session.execute_internal(0.0).unwrap();
        session.dismiss_notification();
        assert!(session.current_notification(0.0).is_none());
    }

    #[test]
    fn test_options_apply_to_processing() {
        let mut session = ready_session(1);
        session
            .set_options_json(r#"{"sanitize_order": "WholeText"}"#)
            .unwrap();
        session.execute_internal(0.0).unwrap();
        assert_eq!(session.last_report.as_ref().unwrap().line_count, 1);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut session = OverlaySession::new();
        assert!(session.set_options_json("not json").is_err());
        assert_eq!(session.options, OverlayOptions::default());
    }
}
