use std::sync::Arc;

use crate::{
    configuration_store::ConfigStore,
    context::RequestContext,
    decision::{Decision, NoBarReason},
    events::{EventEmitter, NoopEventEmitter},
    sharder::Md5Sharder,
    Result,
};

/// Resolves bars for incoming widget requests.
///
/// `Resolver` ties a [`ConfigStore`] to the pure evaluation pipeline and hands impression events
/// to an [`EventEmitter`] without waiting on it.
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use announcement_bar::{DeviceType, InMemoryConfigStore, RequestContext, Resolver, Snapshot};
/// let store = Arc::new(InMemoryConfigStore::new());
/// store.set_snapshot(Snapshot::default());
/// let resolver = Resolver::new(store);
///
/// let ctx = RequestContext::new("https://shop.example/", DeviceType::Desktop);
/// let decision = resolver.resolve("unknown.myshopify.com", &ctx).unwrap();
/// assert!(!decision.is_active());
/// ```
pub struct Resolver {
    store: Arc<dyn ConfigStore + Send + Sync>,
    emitter: Arc<dyn EventEmitter + Send + Sync>,
}

impl Resolver {
    /// Create a resolver that discards events.
    pub fn new(store: Arc<dyn ConfigStore + Send + Sync>) -> Self {
        Resolver {
            store,
            emitter: Arc::new(NoopEventEmitter),
        }
    }

    /// Set the sink that receives impression events.
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter + Send + Sync>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn emitter(&self) -> &(dyn EventEmitter + Send + Sync) {
        &*self.emitter
    }

    /// Decide what `account_key`'s bar shows for `ctx`.
    ///
    /// Errors only come from the config store. Missing or unknown accounts are regular
    /// [`Decision::NoBar`] outcomes.
    pub fn resolve(&self, account_key: &str, ctx: &RequestContext) -> Result<Decision> {
        let account_key = account_key.trim();
        if account_key.is_empty() {
            return Ok(Decision::NoBar(NoBarReason::MissingAccountKey));
        }

        let Some(bar) = self
            .store
            .get_active_bar_config(account_key)
            .inspect_err(|err| {
                log::warn!(target: "announcement_bar",
                           account_key;
                           "failed to read bar configuration: {}", err);
            })?
        else {
            log::trace!(target: "announcement_bar", account_key; "no bar for account");
            return Ok(Decision::NoBar(NoBarReason::UnknownAccount));
        };

        let (decision, event) = bar.eval(ctx, &Md5Sharder);

        log::trace!(target: "announcement_bar",
                    account_key,
                    bar_id = bar.id,
                    message_id:? = decision.message().map(|m| m.id),
                    device_type:display = ctx.device_type,
                    page_url:display = ctx.page_url;
                    "resolved bar");

        if let Some(event) = event {
            if let Err(err) = self.emitter.record(event) {
                log::warn!(target: "announcement_bar",
                           account_key,
                           bar_id = bar.id;
                           "dropping impression event: {}", err);
            }
        }

        Ok(decision)
    }
}
