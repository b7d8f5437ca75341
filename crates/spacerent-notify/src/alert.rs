//! Native alert seam.
//!
//! OS-level notification popups are a best-effort side channel: history
//! and bus delivery never depend on them. Permission is requested at most
//! once while undecided, and a denial is final until the embedder resets
//! it out-of-band.

use spacerent_core::Notification;
use tracing::{debug, info};

use crate::error::Result;

/// Alert permission as reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not yet asked.
    Default,
    Granted,
    Denied,
}

/// Host seam for native notification popups.
pub trait Alerter: Send + Sync {
    fn permission(&self) -> Permission;

    /// Prompt the user and return the decision. Only called while
    /// [`Permission::Default`].
    fn request_permission(&self) -> Permission;

    fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Resolve the permission, prompting once if still undecided.
pub fn ensure_permission(alerter: &dyn Alerter) -> Permission {
    match alerter.permission() {
        Permission::Default => alerter.request_permission(),
        decided => decided,
    }
}

/// Raise a native alert for one notification, best-effort.
pub fn raise_alert(alerter: &dyn Alerter, notification: &Notification) {
    if ensure_permission(alerter) != Permission::Granted {
        return;
    }

    if let Err(error) = alerter.show(&notification.kind, &notification.message) {
        debug!("native alert suppressed: {error}");
    }
}

/// Alerter that never shows anything, for headless embedders.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlerter;

impl Alerter for NullAlerter {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn show(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

/// Alerter that routes popups to the log stream. The default surface
/// until a real host integration is plugged in behind [`Alerter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        info!(target: "spacerent::alerts", "{title}: {body}");
        Ok(())
    }
}
