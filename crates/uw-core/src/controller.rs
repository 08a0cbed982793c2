//! Per-tab controller
//!
//! Owns everything a content script needs: the blacklist, its match cache,
//! the settings, the storage synchronizer and the filter guards. All methods
//! take `&self` so a shared handle can be used from concurrent event handlers;
//! no borrow is held across an await.

use std::cell::{Cell, RefCell};

use serde_json::Value;

use crate::blacklist::Blacklist;
use crate::cache::MatchCache;
use crate::guard::{FilterGuards, FilterPassToken};
use crate::matcher::Matcher;
use crate::message::{BlacklistMessage, ExtensionCommand, Message, Publisher, SaveResponse};
use crate::settings::{Settings, KEY_ENABLED};
use crate::storage::StorageArea;
use crate::sync::{BlacklistStore, SaveError, SaveReport};
use crate::term::{is_regexp_term, TermError, TermRegex};
use crate::types::{Bucket, MatchReason, ScrapedItem, Surface};

/// Follow-up work for the page glue after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    ToggleButtons(bool),
    Reload,
    /// Run the filter passes again with the new blacklist
    Refilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    /// Reply for the sender; only blacklist messages get one
    pub response: Option<SaveResponse>,
    pub directive: Option<Directive>,
}

pub struct Controller<S, L, P> {
    blacklist: RefCell<Blacklist>,
    cache: RefCell<MatchCache>,
    settings: Cell<Settings>,
    store: BlacklistStore<S, L, P>,
    guards: FilterGuards,
}

impl<S: StorageArea, L: StorageArea, P: Publisher> Controller<S, L, P> {
    pub fn new(store: BlacklistStore<S, L, P>) -> Self {
        Self {
            blacklist: RefCell::new(Blacklist::new()),
            cache: RefCell::new(MatchCache::default()),
            settings: Cell::new(Settings::default()),
            store,
            guards: FilterGuards::new(),
        }
    }

    /// Load settings and blacklist from storage.
    pub async fn init(&self) {
        let settings = self.store.load_settings().await;
        self.settings.set(settings);
        let blacklist = self.store.load().await;
        log::info!(
            "Initialized with {} blacklist entries (enabled: {})",
            blacklist.total_len(),
            settings.enabled
        );
        self.replace_all(blacklist);
    }

    pub fn store(&self) -> &BlacklistStore<S, L, P> {
        &self.store
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    pub fn set_settings(&self, settings: Settings) {
        self.settings.set(settings);
    }

    pub fn blacklist(&self) -> Blacklist {
        self.blacklist.borrow().clone()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add one term and rebuild the bucket's cache. Returns `false` when the
    /// term was already present. Invalid patterns are rejected before they
    /// reach the blacklist.
    pub fn add_term(&self, bucket: Bucket, term: &str) -> Result<bool, TermError> {
        log::trace!("invoking add_term({bucket}, {term})");
        if is_regexp_term(term) {
            TermRegex::parse(term)?;
        }
        let added = self.blacklist.borrow_mut().insert(bucket, term);
        let blacklist = self.blacklist.borrow();
        self.cache.borrow_mut().rebuild(&blacklist, bucket);
        log::debug!("Added single item and rebuilt cache for {bucket}: {term}");
        Ok(added)
    }

    /// Replace the whole blacklist and rebuild every cache.
    pub fn replace_all(&self, blacklist: Blacklist) {
        log::trace!("invoking replace_all() with {} entries", blacklist.total_len());
        self.cache.borrow_mut().rebuild_all(&blacklist);
        *self.blacklist.borrow_mut() = blacklist;
    }

    /// Persist the current blacklist. On failure the in-memory blacklist is
    /// rolled back to the last saved one.
    pub async fn save(&self) -> Result<SaveReport, SaveError> {
        let current = self.blacklist();
        match self.store.put(&current).await {
            Ok(report) => {
                if report.used_backup(&current) {
                    log::warn!("Saved the backup instead of the requested blacklist");
                    self.replace_all(report.stored.clone());
                }
                Ok(report)
            }
            Err(e) => {
                log::error!("{e}");
                self.replace_all(self.store.backup());
                Err(e)
            }
        }
    }

    /// Hide button on a card: blacklist the item's own name and save.
    pub async fn hide_item(&self, item: &ScrapedItem) -> bool {
        let (Some(bucket), name) = (item.item_type, item.own_name()) else {
            log::error!("Unable to hide item without a type: {}", item.identifier());
            return false;
        };
        if name.is_empty() {
            log::error!("Unable to hide {bucket} item without a name");
            return false;
        }

        log::info!("Adding item to blacklist: {bucket} {name}");
        self.add_and_save(bucket, name).await
    }

    /// Hide button on a tag.
    pub async fn hide_tag(&self, name: &str) -> bool {
        if name.is_empty() {
            log::error!("Unable to hide tag without a name");
            return false;
        }

        log::info!("Adding tag to blacklist: {name}");
        self.add_and_save(Bucket::Tags, name).await
    }

    /// True only when the term itself made it into storage.
    async fn add_and_save(&self, bucket: Bucket, term: &str) -> bool {
        if let Err(e) = self.add_term(bucket, term) {
            log::error!("{e}");
            return false;
        }
        let requested = self.blacklist();
        match self.save().await {
            Ok(report) => !report.used_backup(&requested),
            Err(_) => false,
        }
    }

    // =========================================================================
    // Matching
    // =========================================================================

    pub fn matches(&self, term: &str, bucket: Bucket) -> bool {
        let blacklist = self.blacklist.borrow();
        let cache = self.cache.borrow();
        Matcher::new(&blacklist, &cache).matches(term, bucket)
    }

    pub fn match_item(&self, item: &ScrapedItem) -> Option<MatchReason> {
        let blacklist = self.blacklist.borrow();
        let cache = self.cache.borrow();
        Matcher::new(&blacklist, &cache).match_item(item, &self.settings.get())
    }

    pub fn is_blacklisted_item(&self, item: &ScrapedItem) -> bool {
        self.match_item(item).is_some()
    }

    /// Claim a surface for a pass the caller drives itself.
    pub fn begin_filter_pass(&self, surface: Surface) -> Option<FilterPassToken<'_>> {
        self.guards.try_acquire(surface)
    }

    /// Indices of the items to hide, or `None` when a pass is already
    /// running on `surface`.
    pub fn filter_pass(&self, surface: Surface, items: &[ScrapedItem]) -> Option<Vec<usize>> {
        let _token = self.begin_filter_pass(surface)?;

        if !self.settings.get().enabled {
            return Some(Vec::new());
        }

        let blacklist = self.blacklist.borrow();
        let cache = self.cache.borrow();
        let matcher = Matcher::new(&blacklist, &cache);
        let settings = self.settings.get();

        let hidden: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| matcher.is_blacklisted_item(item, &settings))
            .map(|(index, _)| index)
            .collect();
        log::debug!("{surface:?} pass hides {} of {} items", hidden.len(), items.len());
        Some(hidden)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Handle a raw runtime message. Unknown shapes are logged and ignored.
    pub async fn handle_raw_message(&self, request: &Value) -> MessageOutcome {
        match serde_json::from_value::<Message>(request.clone()) {
            Ok(message) => self.handle_message(message).await,
            Err(_) => {
                log::error!("Unknown command received. The following command was ignored: {request}");
                MessageOutcome::default()
            }
        }
    }

    pub async fn handle_message(&self, message: Message) -> MessageOutcome {
        log::trace!("invoking handle_message({message:?})");

        match message {
            Message::RenderButtons { render_buttons } => {
                let mut settings = self.settings.get();
                settings.render_buttons = render_buttons;
                self.settings.set(settings);
                MessageOutcome {
                    response: None,
                    directive: Some(Directive::ToggleButtons(render_buttons)),
                }
            }
            Message::Extension { extension } => {
                let enabled = extension == ExtensionCommand::Enable;
                let mut settings = self.settings.get();
                settings.enabled = enabled;
                self.settings.set(settings);
                if let Err(e) = self.store.persist_setting(KEY_ENABLED, enabled).await {
                    log::error!("Failed to persist enabled flag: {e}");
                }
                MessageOutcome {
                    response: None,
                    directive: Some(Directive::Reload),
                }
            }
            Message::Blacklist(message) => self.handle_blacklist(message).await,
            Message::Action { action } => {
                log::warn!("Ignoring background action {action:?}");
                MessageOutcome::default()
            }
        }
    }

    async fn handle_blacklist(&self, message: BlacklistMessage) -> MessageOutcome {
        let mut response = SaveResponse {
            success: true,
            ..SaveResponse::default()
        };

        if message.is_cache_only() {
            log::info!("Synchronizing new blacklist (cache only)");
            self.replace_all(message.blacklisted_items);
            return MessageOutcome {
                response: Some(response),
                directive: None,
            };
        }

        if message.is_elected_writer() {
            log::info!("Storing new blacklist in storage");
            self.replace_all(message.blacklisted_items);
            if let Ok(report) = self.save().await {
                response.processed_save = true;
                response.switched_to_local = report.switched_to_local;
            }
        } else {
            log::info!("Ignoring request to store new blacklist (already processed by another tab), synchronizing cache");
            self.replace_all(message.blacklisted_items);
        }

        MessageOutcome {
            response: Some(response),
            directive: Some(Directive::Refilter),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::RecordingPublisher;
    use crate::settings::KEY_HIDE_RERUNS;
    use crate::storage::{MemoryStorage, StorageQuota, BLACKLIST_KEY};
    use crate::types::ItemTag;

    type TestController = Controller<MemoryStorage, MemoryStorage, RecordingPublisher>;

    fn controller() -> TestController {
        Controller::new(BlacklistStore::new(
            MemoryStorage::with_quota(StorageQuota::SYNC),
            MemoryStorage::new(),
            RecordingPublisher::new(),
        ))
    }

    fn channel(name: &str, category: &str) -> ScrapedItem {
        ScrapedItem {
            item_type: Some(Bucket::Channels),
            name: name.into(),
            category: category.into(),
            ..ScrapedItem::default()
        }
    }

    fn save_message(blacklist: Blacklist, dispatcher_index: Option<i64>) -> Message {
        Message::Blacklist(BlacklistMessage {
            blacklisted_items: blacklist,
            storage: None,
            dispatcher_index,
        })
    }

    fn channels(names: &[&str]) -> Blacklist {
        let mut blacklist = Blacklist::new();
        for name in names {
            blacklist.insert(Bucket::Channels, name);
        }
        blacklist
    }

    #[test]
    fn added_terms_match_immediately() {
        let controller = controller();
        for (bucket, term) in [
            (Bucket::Channels, "streamer"),
            (Bucket::Categories, "'Chess'"),
            (Bucket::Tags, "~drops"),
            (Bucket::Titles, "/^rerun/i"),
        ] {
            assert!(controller.add_term(bucket, term).unwrap());
        }
        assert!(!controller.add_term(Bucket::Channels, "streamer").unwrap());

        assert!(controller.matches("streamer", Bucket::Channels));
        assert!(controller.matches("Chess", Bucket::Categories));
        assert!(controller.matches("Twitch Drops", Bucket::Tags));
        assert!(controller.matches("Rerun of yesterday", Bucket::Titles));
        assert!(!controller.matches("streamer", Bucket::Categories));
    }

    #[test]
    fn filter_pass_returns_hidden_indices() {
        let controller = controller();
        controller.add_term(Bucket::Categories, "Just Chatting").unwrap();
        let items = [
            channel("a", "Chess"),
            channel("b", "Just Chatting"),
            ScrapedItem {
                title: "HUGE GIVEAWAY TODAY".into(),
                ..channel("c", "Art")
            },
        ];
        controller.add_term(Bucket::Titles, "~giveaway").unwrap();

        assert_eq!(controller.filter_pass(Surface::Directory, &items), Some(vec![1, 2]));
    }

    #[test]
    fn filter_pass_is_not_reentrant() {
        let controller = controller();
        let _running = controller.begin_filter_pass(Surface::Sidebar).unwrap();
        assert_eq!(controller.filter_pass(Surface::Sidebar, &[]), None);
        assert_eq!(controller.filter_pass(Surface::Directory, &[]), Some(vec![]));
    }

    #[test]
    fn disabled_filter_hides_nothing() {
        let controller = controller();
        controller.add_term(Bucket::Channels, "a").unwrap();
        controller.set_settings(Settings {
            enabled: false,
            ..Settings::default()
        });
        assert_eq!(controller.filter_pass(Surface::Directory, &[channel("a", "")]), Some(vec![]));
    }

    #[tokio::test]
    async fn elected_writer_saves() {
        let controller = controller();
        let outcome = controller
            .handle_message(save_message(channels(&["streamer"]), Some(0)))
            .await;

        assert_eq!(
            outcome.response,
            Some(SaveResponse {
                success: true,
                processed_save: true,
                switched_to_local: false
            })
        );
        assert_eq!(outcome.directive, Some(Directive::Refilter));
        assert_eq!(controller.store().sync_area().write_count(), 1);
        assert!(controller.matches("streamer", Bucket::Channels));
    }

    #[tokio::test]
    async fn other_tabs_only_refresh_cache() {
        let controller = controller();
        let outcome = controller
            .handle_message(save_message(channels(&["streamer"]), Some(1)))
            .await;

        assert_eq!(outcome.response.map(|r| r.processed_save), Some(false));
        assert_eq!(outcome.directive, Some(Directive::Refilter));
        assert_eq!(controller.store().sync_area().write_count(), 0);
        assert!(controller.matches("streamer", Bucket::Channels));
    }

    #[tokio::test]
    async fn cache_only_update_does_not_write_or_refilter() {
        let controller = controller();
        let outcome = controller
            .handle_raw_message(&json!({"blacklistedItems": {"channels": {"x": 1}}, "storage": false}))
            .await;

        assert_eq!(outcome.directive, None);
        assert_eq!(controller.store().sync_area().write_count(), 0);
        assert!(controller.matches("x", Bucket::Channels));
    }

    #[tokio::test]
    async fn extension_toggle_persists_and_reloads() {
        let controller = controller();
        let outcome = controller.handle_raw_message(&json!({"extension": "disable"})).await;

        assert_eq!(outcome.directive, Some(Directive::Reload));
        assert!(!controller.settings().enabled);
        assert_eq!(
            controller.store().sync_area().snapshot().get(KEY_ENABLED),
            Some(&Value::Bool(false))
        );
    }

    #[tokio::test]
    async fn render_buttons_toggles() {
        let controller = controller();
        let outcome = controller.handle_raw_message(&json!({"renderButtons": false})).await;
        assert_eq!(outcome.directive, Some(Directive::ToggleButtons(false)));
        assert!(!controller.settings().render_buttons);
    }

    #[tokio::test]
    async fn non_object_blacklist_keeps_cache() {
        let controller = controller();
        controller.add_term(Bucket::Channels, "streamer").unwrap();

        let outcome = controller.handle_raw_message(&json!({"blacklistedItems": "x"})).await;
        assert_eq!(outcome, MessageOutcome::default());
        assert!(controller.matches("streamer", Bucket::Channels));
    }

    #[tokio::test]
    async fn unknown_message_is_ignored() {
        let outcome = controller().handle_raw_message(&json!({"bogus": true})).await;
        assert_eq!(outcome, MessageOutcome::default());
    }

    #[tokio::test]
    async fn failed_save_restores_backup() {
        let controller = controller();
        controller.hide_tag("Drops").await;
        controller.store().sync_area().fail_next_write("QUOTA_BYTES quota exceeded");
        controller.store().local_area().fail_next_write("IO error");

        assert!(!controller.hide_tag("English").await);
        assert!(controller.matches("Drops", Bucket::Tags));
        assert!(!controller.matches("English", Bucket::Tags));
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected_at_entry() {
        let controller = controller();
        assert!(matches!(
            controller.add_term(Bucket::Tags, "/(/"),
            Err(TermError::InvalidPattern { .. })
        ));
        assert!(!controller.blacklist().contains_key(Bucket::Tags, "/(/"));

        controller.save().await.unwrap();
        let stored = controller.store().sync_area().snapshot();
        assert!(!stored[BLACKLIST_KEY].to_string().contains("/(/"));

        assert!(!controller.hide_tag("/(/").await);
        assert_eq!(controller.blacklist().len(Bucket::Tags), 0);
    }

    #[tokio::test]
    async fn hide_reports_failure_when_backup_was_saved() {
        let controller = controller();
        assert!(controller.hide_tag("Drops").await);
        controller
            .store()
            .sync_area()
            .fail_next_write("MAX_WRITE_OPERATIONS_PER_MINUTE quota exceeded");

        assert!(!controller.hide_tag("English").await);
        assert!(controller.matches("Drops", Bucket::Tags));
        assert!(!controller.matches("English", Bucket::Tags));
    }

    #[tokio::test]
    async fn hide_item_adds_own_name() {
        let controller = controller();
        let category = ScrapedItem {
            item_type: Some(Bucket::Categories),
            category: "Slots".into(),
            tags: vec![ItemTag::new("Gambling")],
            ..ScrapedItem::default()
        };

        assert!(controller.hide_item(&category).await);
        assert!(controller.blacklist().contains_key(Bucket::Categories, "Slots"));
        assert!(controller.store().sync_area().contains_key(BLACKLIST_KEY));
        assert!(!controller.hide_item(&ScrapedItem::default()).await);
    }

    #[tokio::test]
    async fn init_loads_settings_and_blacklist() {
        let store = BlacklistStore::new(MemoryStorage::new(), MemoryStorage::new(), RecordingPublisher::new());
        store.put(&channels(&["streamer"])).await.unwrap();
        store.persist_setting(KEY_HIDE_RERUNS, true).await.unwrap();

        let controller = Controller::new(store);
        controller.init().await;

        assert!(controller.settings().hide_reruns);
        assert!(controller.is_blacklisted_item(&channel("streamer", "")));
        assert!(controller.is_blacklisted_item(&ScrapedItem {
            rerun: true,
            ..channel("other", "")
        }));
    }
}
