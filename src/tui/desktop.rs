//! Clipboard and browser hand-off.

use log::{info, warn};

/// Where copied text and opened links go.
pub trait Desktop {
    fn copy(&mut self, text: &str) -> Result<(), String>;
    fn open(&mut self, url: &str) -> Result<(), String>;
}

/// The system clipboard and default browser.
#[derive(Default)]
pub struct SystemDesktop {
    clipboard: Option<arboard::Clipboard>,
}

impl Desktop for SystemDesktop {
    fn copy(&mut self, text: &str) -> Result<(), String> {
        // Kept open: on X11 the contents vanish with the clipboard handle.
        if self.clipboard.is_none() {
            self.clipboard = Some(arboard::Clipboard::new().map_err(|e| e.to_string())?);
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return Err("clipboard unavailable".to_string());
        };
        clipboard.set_text(text).map_err(|e| e.to_string())?;
        info!("Copied {} bytes to the clipboard", text.len());
        Ok(())
    }

    fn open(&mut self, url: &str) -> Result<(), String> {
        webbrowser::open(url).map_err(|e| e.to_string())?;
        info!("Opened {url} in the browser");
        Ok(())
    }
}

/// Copies `text` and returns the notice to show.
pub fn copy_with_notice(desktop: &mut dyn Desktop, text: &str) -> String {
    match desktop.copy(text) {
        Ok(()) => "Copied".to_string(),
        Err(e) => {
            warn!("Clipboard copy failed: {e}");
            "Copy failed".to_string()
        }
    }
}

/// Opens `url` and returns the notice to show.
pub fn open_with_notice(desktop: &mut dyn Desktop, url: &str) -> String {
    match desktop.open(url) {
        Ok(()) => "Opened in browser".to_string(),
        Err(e) => {
            warn!("Opening {url} failed: {e}");
            "Open failed".to_string()
        }
    }
}
