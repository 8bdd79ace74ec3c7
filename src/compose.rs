//! Capability composition
//!
//! [`compose`] turns a driver plus the capabilities it discovered during
//! construction into the single charger handle returned to callers.

use crate::api::{ChargeStatus, Charger};
use crate::capability::{Bindings, Decorated};
use crate::error::Result;
use std::sync::Arc;

/// Combine `base` with its detected `bindings`.
///
/// The result supports the baseline contract, every capability bound in
/// `bindings`, and whatever `base` implements natively. Without bindings the
/// base itself is returned, so the handle is the very same allocation.
/// Bound capability calls go straight to the bound callable; results and
/// errors pass through untouched.
pub fn compose<B>(base: Arc<B>, bindings: Bindings) -> Arc<dyn Charger>
where
    B: Charger + 'static,
{
    if bindings.is_empty() {
        return base;
    }
    Arc::new(Decorated::new(base, bindings))
}

#[async_trait::async_trait]
impl<B> Charger for Decorated<B>
where
    B: Charger + ?Sized,
{
    async fn status(&self) -> Result<ChargeStatus> {
        self.base.status().await
    }

    async fn enabled(&self) -> Result<bool> {
        self.base.enabled().await
    }

    async fn enable(&self, enable: bool) -> Result<()> {
        self.base.enable(enable).await
    }

    async fn max_current(&self, current: i64) -> Result<()> {
        self.base.max_current(current).await
    }
}
