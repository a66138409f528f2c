//! Client-side file save
//!
//! The bytes are wrapped in a Blob, exposed through an object URL and saved
//! by clicking a temporary `<a download>` element. The object URL lives in a
//! guard that revokes it on drop, whether or not the click succeeded.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

pub const PDF_MIME: &str = "application/pdf";

/// Where saved bytes go
pub trait SaveTarget {
    /// Expose `bytes` under a temporary URL
    fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String, String>;
    /// Start saving the resource behind `url` as `file_name`
    fn trigger(&self, url: &str, file_name: &str) -> Result<(), String>;
    /// Release a URL from `create_url`
    fn revoke(&self, url: &str);
}

/// Object URL that is revoked when dropped
struct ObjectUrl<'a, T: SaveTarget + ?Sized> {
    target: &'a T,
    url: String,
}

impl<'a, T: SaveTarget + ?Sized> ObjectUrl<'a, T> {
    fn create(target: &'a T, bytes: &[u8]) -> Result<Self, String> {
        let url = target.create_url(bytes, PDF_MIME)?;
        Ok(Self { target, url })
    }
}

impl<T: SaveTarget + ?Sized> Drop for ObjectUrl<'_, T> {
    fn drop(&mut self) {
        self.target.revoke(&self.url);
    }
}

/// Save `bytes` as a PDF named `file_name`
pub fn save_bytes<T: SaveTarget + ?Sized>(
    target: &T,
    bytes: &[u8],
    file_name: &str,
) -> Result<(), String> {
    let url = ObjectUrl::create(target, bytes)?;
    target.trigger(&url.url, file_name)
}

/// Saves through the browser's download machinery
pub struct BrowserSaveTarget;

impl SaveTarget for BrowserSaveTarget {
    fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String, String> {
        let array = js_sys::Uint8Array::from(bytes);
        let parts = js_sys::Array::of1(&array);
        let options = BlobPropertyBag::new();
        options.set_type(mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(js_error)?;
        Url::create_object_url_with_blob(&blob).map_err(js_error)
    }

    fn trigger(&self, url: &str, file_name: &str) -> Result<(), String> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| "No document available".to_string())?;
        let anchor: HtmlAnchorElement = document
            .create_element("a")
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| "Failed to create download link".to_string())?;
        anchor.set_href(url);
        anchor.set_download(file_name);
        anchor.click();
        Ok(())
    }

    fn revoke(&self, url: &str) {
        let _ = Url::revoke_object_url(url);
    }
}

fn js_error(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
