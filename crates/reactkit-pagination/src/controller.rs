//! Page state for one paginated message.
//!
//! Content is split into tracks, each selected by its own reaction symbol and
//! backed by a [`PageSource`]. Pages are fetched lazily and cached per track;
//! a track's last page is discovered the first time a request runs past it.
//! Navigation mutates state immediately and funnels the outbound edit through
//! a [`Debouncer`], so a burst of reactions costs at most two edits per quiet
//! window and the last edit always reflects the latest state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use reactkit_buttons::{
    handler, ButtonHandler, ButtonOptions, ButtonTable, Debouncer, ReactionButtonManager,
    ReactionButtonsContext,
};
use reactkit_channels::{retry, ChatMessage, MessageChannel, RetryPolicy};
use reactkit_core::{ReactkitConfig, UserId};
use tracing::{debug, info, warn};

use crate::error::{PaginationError, Result};
use crate::source::PageSource;

/// Symbol of the only track of single-track content.
pub const SINGLE_TRACK: &str = "";

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub show_arrows: bool,
    pub left_arrow: String,
    pub right_arrow: String,
    /// Quiet window for coalescing edits.
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self::from_config(&ReactkitConfig::default())
    }
}

impl PageOptions {
    pub fn from_config(config: &ReactkitConfig) -> Self {
        Self {
            show_arrows: config.pagination.show_arrows,
            left_arrow: config.pagination.left_arrow.clone(),
            right_arrow: config.pagination.right_arrow.clone(),
            debounce: config.pagination.debounce(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

struct Track {
    symbol: String,
    source: Arc<dyn PageSource>,
    cache: HashMap<usize, String>,
    /// Highest index known to have content; `usize::MAX` until a missing
    /// page has been seen.
    max_page: usize,
}

struct PagerState {
    tracks: Vec<Track>,
    current_track: usize,
    current_page: usize,
    /// (track, page) of the content currently shown on the message.
    last_sent: Option<(usize, usize)>,
}

type EditOutcome = Result<bool>;

pub struct PageController {
    options: PageOptions,
    state: Mutex<PagerState>,
    message: OnceLock<Arc<dyn ChatMessage>>,
    debouncer: Debouncer<EditOutcome>,
    /// Held across render and edit so edits reach the message in order.
    edit_lock: tokio::sync::Mutex<()>,
    self_ref: Weak<PageController>,
}

impl PageController {
    /// Paginate a single source with no track buttons.
    pub fn single(source: Arc<dyn PageSource>, options: PageOptions) -> Arc<Self> {
        Self::build(
            vec![Track::new(SINGLE_TRACK.to_string(), source)],
            options,
        )
    }

    /// Paginate several tracks; the first one is shown initially.
    ///
    /// With more than one track a button per track symbol is placed, in the
    /// order given.
    pub fn with_tracks(
        tracks: Vec<(String, Arc<dyn PageSource>)>,
        options: PageOptions,
    ) -> Result<Arc<Self>> {
        if tracks.is_empty() {
            return Err(PaginationError::NoTracks);
        }
        let mut built: Vec<Track> = Vec::with_capacity(tracks.len());
        for (symbol, source) in tracks {
            if built.iter().any(|t| t.symbol == symbol) {
                return Err(PaginationError::DuplicateTrack { symbol });
            }
            built.push(Track::new(symbol, source));
        }
        Ok(Self::build(built, options))
    }

    fn build(tracks: Vec<Track>, options: PageOptions) -> Arc<Self> {
        Arc::new_cyclic(|self_ref: &Weak<PageController>| {
            let weak = self_ref.clone();
            let debouncer = Debouncer::new(options.debounce, move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(controller) => controller.edit_with_current_state().await,
                        None => Ok(false),
                    }
                }
            });
            Self {
                options,
                state: Mutex::new(PagerState {
                    tracks,
                    current_track: 0,
                    current_page: 0,
                    last_sent: None,
                }),
                message: OnceLock::new(),
                debouncer,
                edit_lock: tokio::sync::Mutex::new(()),
                self_ref: self_ref.clone(),
            }
        })
    }

    /// Current (track symbol, page index).
    pub fn current(&self) -> (String, usize) {
        let state = self.state.lock().unwrap();
        (
            state.tracks[state.current_track].symbol.clone(),
            state.current_page,
        )
    }

    pub fn track_symbols(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.tracks.iter().map(|t| t.symbol.clone()).collect()
    }

    /// Discovered last page of `symbol`, if a bound has been found yet.
    pub fn max_page(&self, symbol: &str) -> Option<usize> {
        let state = self.state.lock().unwrap();
        state
            .tracks
            .iter()
            .find(|t| t.symbol == symbol)
            .map(|t| t.max_page)
            .filter(|max| *max != usize::MAX)
    }

    pub fn is_cached(&self, symbol: &str, index: usize) -> bool {
        let state = self.state.lock().unwrap();
        state
            .tracks
            .iter()
            .any(|t| t.symbol == symbol && t.cache.contains_key(&index))
    }

    /// The posted message, once [`PageController::initialize`] has run.
    pub fn message(&self) -> Option<Arc<dyn ChatMessage>> {
        self.message.get().cloned()
    }

    /// Resolve `requested` on the current track to a page that exists and
    /// make sure it is cached.
    ///
    /// The index is clamped to the track's known bound. A missing page makes
    /// the search walk back one index at a time until content is found,
    /// tightening the bound on the way. Fails only when the track has no
    /// first page.
    pub async fn coerce_and_cache_page(&self, requested: usize) -> Result<usize> {
        let track = self.state.lock().unwrap().current_track;
        self.resolve_page(track, requested).await
    }

    async fn resolve_page(&self, track: usize, requested: usize) -> Result<usize> {
        let (mut index, source, symbol) = {
            let state = self.state.lock().unwrap();
            let t = &state.tracks[track];
            let index = requested.min(t.max_page);
            if t.cache.contains_key(&index) {
                return Ok(index);
            }
            (index, Arc::clone(&t.source), t.symbol.clone())
        };

        let mut overshot = false;
        loop {
            if let Some(content) = source.page(index).await? {
                let mut state = self.state.lock().unwrap();
                let t = &mut state.tracks[track];
                t.cache.insert(index, content);
                if overshot {
                    t.max_page = t.max_page.min(index);
                    debug!(track = %symbol, max_page = t.max_page, "page bound discovered");
                }
                return Ok(index);
            }

            if index == 0 {
                return Err(PaginationError::EmptyContent { track: symbol });
            }
            overshot = true;
            index -= 1;

            // Another task may have cached this page while we were fetching.
            let mut state = self.state.lock().unwrap();
            let t = &mut state.tracks[track];
            if t.cache.contains_key(&index) {
                t.max_page = t.max_page.min(index);
                return Ok(index);
            }
        }
    }

    /// Move `distance` pages forward (negative: backward) on the current
    /// track and schedule an edit.
    ///
    /// Returns `false` without touching anything when the move lands on the
    /// current page, e.g. at either end of the track or for a distance of 0.
    pub async fn move_page(&self, distance: isize) -> Result<bool> {
        let (track, from) = {
            let state = self.state.lock().unwrap();
            (state.current_track, state.current_page)
        };
        let requested = if distance < 0 {
            from.saturating_sub(distance.unsigned_abs())
        } else {
            from.saturating_add(distance as usize)
        };
        if requested == from {
            return Ok(false);
        }

        let target = self.resolve_page(track, requested).await?;
        {
            let mut state = self.state.lock().unwrap();
            // A track switch while we were fetching makes this move stale.
            if state.current_track != track || state.current_page == target {
                return Ok(false);
            }
            state.current_page = target;
        }

        debug!(from, to = target, "page moved");
        self.schedule_edit().await?;
        Ok(true)
    }

    /// Switch to the track bound to `symbol`, starting at its first page.
    ///
    /// Returns whether the track changed. An edit is scheduled either way;
    /// it is a no-op when the message already shows the current page.
    pub async fn move_track(&self, symbol: &str) -> Result<bool> {
        let track = {
            let state = self.state.lock().unwrap();
            let track = state
                .tracks
                .iter()
                .position(|t| t.symbol == symbol)
                .ok_or_else(|| PaginationError::UnknownTrack {
                    symbol: symbol.to_string(),
                })?;
            (track != state.current_track).then_some(track)
        };
        let Some(track) = track else {
            // Still re-render, so a message left behind by a failed edit
            // catches up.
            self.schedule_edit().await?;
            return Ok(false);
        };

        let first = self.resolve_page(track, 0).await?;
        {
            let mut state = self.state.lock().unwrap();
            state.current_track = track;
            state.current_page = first;
        }

        debug!(track = %symbol, "track switched");
        self.schedule_edit().await?;
        Ok(true)
    }

    /// Edit the message to show the current page, unless it already does.
    ///
    /// Returns whether an edit was sent. Edits run one at a time and read the
    /// current page only once it is their turn. On failure the previously
    /// shown state is restored, so a later navigation retries the edit.
    pub async fn edit_with_current_state(&self) -> Result<bool> {
        let message = self.message.get().ok_or(PaginationError::NotInitialized)?;
        let _serial = self.edit_lock.lock().await;

        let (target, previous, content) = {
            let mut state = self.state.lock().unwrap();
            let target = (state.current_track, state.current_page);
            if state.last_sent == Some(target) {
                debug!("message already shows the current page, skipping edit");
                return Ok(false);
            }
            let track = &state.tracks[target.0];
            let content = track.cache.get(&target.1).cloned().ok_or_else(|| {
                PaginationError::PageNotCached {
                    track: track.symbol.clone(),
                    index: target.1,
                }
            })?;
            let previous = state.last_sent.replace(target);
            (target, previous, content)
        };

        match retry(&self.options.retry, "edit_message", || message.edit(&content)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(message_id = %message.id(), error = %e, "page edit failed");
                let mut state = self.state.lock().unwrap();
                if state.last_sent == Some(target) {
                    state.last_sent = previous;
                }
                Err(e.into())
            }
        }
    }

    async fn schedule_edit(&self) -> Result<()> {
        match self.debouncer.exec().await {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Post the first page to `channel` and register the navigation buttons.
    ///
    /// Buttons: one per track symbol when there is more than one track, then
    /// the left and right arrows when enabled.
    pub async fn initialize(
        &self,
        channel: Arc<dyn MessageChannel>,
        allowed_users: Vec<UserId>,
        expiration: Option<Duration>,
        manager: &ReactionButtonManager,
    ) -> Result<Arc<ReactionButtonsContext>> {
        if self.message.get().is_some() {
            return Err(PaginationError::AlreadyInitialized);
        }

        let track = self.state.lock().unwrap().current_track;
        let first = self.resolve_page(track, 0).await?;
        let content = {
            let state = self.state.lock().unwrap();
            let t = &state.tracks[track];
            t.cache
                .get(&first)
                .cloned()
                .ok_or_else(|| PaginationError::PageNotCached {
                    track: t.symbol.clone(),
                    index: first,
                })?
        };

        let message = retry(&self.options.retry, "create_message", || {
            channel.create_message(&content)
        })
        .await?;
        if self.message.set(Arc::clone(&message)).is_err() {
            return Err(PaginationError::AlreadyInitialized);
        }
        {
            let mut state = self.state.lock().unwrap();
            state.current_page = first;
            state.last_sent = Some((track, first));
        }

        let buttons = self.navigation_buttons()?;
        let context = manager
            .add(
                message,
                allowed_users,
                buttons,
                ButtonOptions {
                    expiration,
                    ..ButtonOptions::default()
                },
            )
            .await?;

        info!(
            message_id = %context.message_id(),
            tracks = self.track_symbols().len(),
            "paginator posted"
        );
        Ok(context)
    }

    fn navigation_buttons(&self) -> Result<ButtonTable> {
        let mut table = ButtonTable::new();

        let symbols = self.track_symbols();
        if symbols.len() > 1 {
            for symbol in symbols {
                let weak = self.self_ref.clone();
                let target = symbol.clone();
                table.insert(
                    symbol,
                    handler(move |_event| {
                        let weak = weak.clone();
                        let target = target.clone();
                        async move {
                            if let Some(controller) = weak.upgrade() {
                                controller.move_track(&target).await?;
                            }
                            Ok(())
                        }
                    }),
                )?;
            }
        }

        if self.options.show_arrows {
            table.insert(self.options.left_arrow.clone(), self.page_button(-1))?;
            table.insert(self.options.right_arrow.clone(), self.page_button(1))?;
        }
        Ok(table)
    }

    fn page_button(&self, distance: isize) -> ButtonHandler {
        let weak = self.self_ref.clone();
        handler(move |_event| {
            let weak = weak.clone();
            async move {
                if let Some(controller) = weak.upgrade() {
                    controller.move_page(distance).await?;
                }
                Ok(())
            }
        })
    }
}

impl Track {
    fn new(symbol: String, source: Arc<dyn PageSource>) -> Self {
        Self {
            symbol,
            source,
            cache: HashMap::new(),
            max_page: usize::MAX,
        }
    }
}
