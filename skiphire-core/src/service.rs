//! High-level service facade combining the pricing backend with its caches.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::cache::{Cached, Clock, EntryStatus, QueryCache, SystemClock};
use crate::model::{Location, OptionId, PricingOption};
use crate::ports::{GatewayError, PricingPort};
use crate::settings::Settings;

/// Option list shared between the cache and every reader.
pub type OptionList = Arc<Vec<PricingOption>>;

/// Public entry point for loading and prefetching pricing options.
///
/// Lists are cached per [`Location`]; every list a fetch stores, including a
/// background revalidation, is also fanned out into a per-option cache so that
/// looking up one of its options later is a cache hit.
pub struct SkipHireService {
    port: Arc<dyn PricingPort>,
    lists: QueryCache<Location, OptionList>,
    items: QueryCache<OptionId, PricingOption>,
    list_stale: Duration,
    item_stale: Duration,
}

impl SkipHireService {
    /// Create a new service bound to the provided backend.
    #[must_use]
    pub fn new(port: Arc<dyn PricingPort>, settings: &Settings) -> Self {
        Self::with_clock(port, settings, Arc::new(SystemClock))
    }

    /// Create a service whose caches use `clock`.
    #[must_use]
    pub fn with_clock(port: Arc<dyn PricingPort>, settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        let items = QueryCache::with_clock(settings.cache, Arc::clone(&clock));
        let fan_out = items.clone();
        let lists = QueryCache::with_store_hook(
            settings.cache,
            clock,
            move |location: &Location, options: &OptionList| {
                debug!(%location, count = options.len(), "fanning out options");
                for option in options.iter() {
                    fan_out.set_entry(option.id, option.clone());
                }
            },
        );
        Self {
            port,
            lists,
            items,
            list_stale: settings.list_stale,
            item_stale: settings.item_stale,
        }
    }

    /// Load the options offered at `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] once the backend keeps failing after all retries.
    pub async fn options_for(&self, location: &Location) -> Result<Cached<OptionList>, GatewayError> {
        self.lists
            .get_or_fetch(
                location.clone(),
                list_fetch(Arc::clone(&self.port), location.clone()),
                self.list_stale,
            )
            .await
    }

    /// Reload the options at `location` even if the cached list is fresh.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] once the backend keeps failing after all retries.
    pub async fn refresh_options(&self, location: &Location) -> Result<Cached<OptionList>, GatewayError> {
        self.lists
            .refetch(
                location.clone(),
                list_fetch(Arc::clone(&self.port), location.clone()),
            )
            .await
    }

    /// Warm the list cache for `location` without waiting.
    pub fn prefetch_options(&self, location: &Location) {
        self.lists.prefetch(
            location.clone(),
            list_fetch(Arc::clone(&self.port), location.clone()),
            self.list_stale,
        );
    }

    /// Cached list for `location`, fresh or stale, without fetching.
    #[must_use]
    pub fn cached_options(&self, location: &Location) -> Option<OptionList> {
        self.lists.peek(location)
    }

    /// Fetch bookkeeping for the list at `location`.
    #[must_use]
    pub fn options_status(&self, location: &Location) -> Option<EntryStatus> {
        self.lists.status(location)
    }

    /// Ignore the response of any list fetch still running for `location`.
    pub fn stop_observing(&self, location: &Location) {
        self.lists.detach(location);
    }

    /// Look up one option, usually straight from the fanned-out cache.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the option is not cached and cannot be fetched.
    pub async fn option(&self, id: OptionId) -> Result<Cached<PricingOption>, GatewayError> {
        self.items
            .get_or_fetch(id, item_fetch(Arc::clone(&self.port), id), self.item_stale)
            .await
    }

    /// Warm the option cache for `id` without waiting, e.g. when a card gains focus.
    pub fn prefetch_option(&self, id: OptionId) {
        self.items
            .prefetch(id, item_fetch(Arc::clone(&self.port), id), self.item_stale);
    }

    /// Evict idle entries from both caches.
    pub fn sweep(&self) {
        self.lists.sweep();
        self.items.sweep();
    }
}

fn list_fetch(
    port: Arc<dyn PricingPort>,
    location: Location,
) -> impl Fn() -> BoxFuture<'static, Result<OptionList, GatewayError>> + Send + Sync + 'static {
    move || {
        let port = Arc::clone(&port);
        let location = location.clone();
        async move { port.pricing_options(&location).await.map(Arc::new) }.boxed()
    }
}

fn item_fetch(
    port: Arc<dyn PricingPort>,
    id: OptionId,
) -> impl Fn() -> BoxFuture<'static, Result<PricingOption, GatewayError>> + Send + Sync + 'static {
    move || {
        let port = Arc::clone(&port);
        async move { port.pricing_option(id).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::cache::{CacheState, ManualClock, RetryPolicy};

    fn pricing_option(id: u64, size: u32, price: Decimal) -> PricingOption {
        PricingOption {
            id: OptionId(id),
            size,
            hire_period_days: 14,
            transport_cost: None,
            per_tonne_cost: None,
            price_before_vat: price,
            vat: dec!(20),
            postcode: "NR32".into(),
            area: "Lowestoft".into(),
            forbidden: false,
            allowed_on_road: true,
            allows_heavy_waste: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[derive(Default)]
    struct FakePort {
        options: Vec<PricingOption>,
        fail_with: Option<GatewayError>,
        list_calls: AtomicUsize,
        item_calls: AtomicUsize,
    }

    #[async_trait]
    impl PricingPort for FakePort {
        async fn pricing_options(&self, _location: &Location) -> Result<Vec<PricingOption>, GatewayError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(self.options.clone()),
            }
        }

        async fn pricing_option(&self, id: OptionId) -> Result<PricingOption, GatewayError> {
            self.item_calls.fetch_add(1, Ordering::SeqCst);
            Ok(pricing_option(id.0, 40, dec!(999)))
        }
    }

    fn location() -> Location {
        Location::new("NR32", "Lowestoft").expect("valid location")
    }

    fn service_for(port: &Arc<FakePort>) -> SkipHireService {
        SkipHireService::new(Arc::clone(port) as Arc<dyn PricingPort>, &Settings::default())
    }

    fn fake_with_options() -> Arc<FakePort> {
        Arc::new(FakePort {
            options: vec![
                pricing_option(1, 4, dec!(278)),
                pricing_option(2, 6, dec!(305)),
                pricing_option(3, 8, dec!(375)),
            ],
            ..FakePort::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn list_is_fetched_once_and_fanned_out() {
        let port = fake_with_options();
        let service = service_for(&port);

        let first = service.options_for(&location()).await.expect("list loads");
        let second = service.options_for(&location()).await.expect("list is cached");
        assert_eq!(port.list_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.value, &second.value));

        let option = service.option(OptionId(2)).await.expect("option is cached");
        assert_eq!(option.value.size, 6);
        assert_eq!(port.item_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn totals_are_derived_from_price_and_vat() {
        let port = fake_with_options();
        let service = service_for(&port);

        let list = service.options_for(&location()).await.expect("list loads");
        for option in list.value.iter() {
            assert_eq!(
                option.total_price(),
                option.price_before_vat * (Decimal::ONE + option.vat / Decimal::ONE_HUNDRED)
            );
        }
        assert_eq!(list.value.first().map(PricingOption::total_price), Some(dec!(333.6)));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_option_falls_back_to_item_endpoint() {
        let port = fake_with_options();
        let service = service_for(&port);

        service.prefetch_option(OptionId(42));
        let option = service.option(OptionId(42)).await.expect("option loads");

        assert_eq!(option.value.size, 40);
        assert_eq!(port.item_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_always_hits_the_backend() {
        let port = fake_with_options();
        let service = service_for(&port);

        service.options_for(&location()).await.expect("list loads");
        service.refresh_options(&location()).await.expect("list reloads");

        assert_eq!(port.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.cached_options(&location()).map(|list| list.len()), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_surface_after_retries() {
        let port = Arc::new(FakePort {
            fail_with: Some(GatewayError::Remote {
                status: 500,
                message: "HTTP error! status: 500".into(),
                raw_body: String::new(),
            }),
            ..FakePort::default()
        });
        let mut settings = Settings::default();
        settings.cache.retry = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let service = SkipHireService::new(Arc::clone(&port) as Arc<dyn PricingPort>, &settings);

        let err = service.options_for(&location()).await.expect_err("backend is down");

        assert_eq!(err.status(), 500);
        assert_eq!(port.list_calls.load(Ordering::SeqCst), 3);
        let status = service.options_status(&location()).expect("entry exists");
        assert!(status.error.is_some());
    }

    /// Prices every option at `100 * n` on the n-th list request.
    #[derive(Default)]
    struct RepricingPort {
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl PricingPort for RepricingPort {
        async fn pricing_options(&self, _location: &Location) -> Result<Vec<PricingOption>, GatewayError> {
            let round = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![pricing_option(1, 4, Decimal::from(round * 100))])
        }

        async fn pricing_option(&self, id: OptionId) -> Result<PricingOption, GatewayError> {
            Err(GatewayError::Remote {
                status: 404,
                message: format!("no option {id}"),
                raw_body: String::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn revalidated_list_is_fanned_out() {
        let clock = Arc::new(ManualClock::new());
        let service = SkipHireService::with_clock(
            Arc::new(RepricingPort::default()),
            &Settings::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );

        service.options_for(&location()).await.expect("list loads");
        let item = service.option(OptionId(1)).await.expect("option is cached");
        assert_eq!(item.value.price_before_vat, dec!(100));

        clock.advance(Duration::from_secs(6 * 60));
        let stale = service.options_for(&location()).await.expect("stale list");
        assert_eq!(stale.state, CacheState::StaleRevalidating);
        while service
            .options_status(&location())
            .is_some_and(|status| status.is_fetching)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let list = service.cached_options(&location()).expect("list is cached");
        assert_eq!(list.first().map(|option| option.price_before_vat), Some(dec!(200)));
        let item = service.option(OptionId(1)).await.expect("option is cached");
        assert_eq!(item.value.price_before_vat, dec!(200));
        assert_eq!(item.state, CacheState::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hits_do_not_rewrite_items() {
        let port = fake_with_options();
        let service = service_for(&port);
        service.options_for(&location()).await.expect("list loads");

        service.prefetch_option(OptionId(2));
        let before = service.items.status(&OptionId(2)).expect("item exists");
        tokio::time::advance(Duration::from_secs(1)).await;
        service.options_for(&location()).await.expect("list is cached");
        let after = service.items.status(&OptionId(2)).expect("item exists");

        assert_eq!(before.fetched_at, after.fetched_at);
        assert_eq!(port.item_calls.load(Ordering::SeqCst), 0);
    }
}
