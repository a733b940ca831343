//! Playback handlers for the controller task
//!
//! **Responsibilities:**
//! - User command handling (play, stop, pause, seek, track selection)
//! - Backend event handling (position, buffering, pause flags, exits)
//! - Buffering entry: queued tracks, queued seek, display settings
//! - Segment auto-skip and next-episode autoplay/prefetch
//! - Catalog progress reporting

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use vireo_common::events::{PlaybackState, PlayerEvent, TrackKind};
use vireo_common::time::{now, seconds_to_millis};
use vireo_common::types::{EpisodeRef, MediaSegment, PlaybackReport};

use crate::backend::BackendEvent;
use crate::controller::attempt::{Attempt, PlayParams, PrefetchedEpisode, TrackSelection};
use crate::controller::core::{ControllerTask, BUFFER_PROGRESS_MS, SEGMENT_GRACE_MS};
use crate::controller::machine::PlaybackEvent;
use crate::controller::{ControllerCommand, InternalMsg};
use crate::protocol::WireValue;
use crate::trickplay::{select_resolution, HttpTileFetcher, TrickplayBuilder};

impl ControllerTask {
    pub(crate) fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Play { params, selection } => self.handle_play(params, selection),
            ControllerCommand::Stop => {
                info!("stop command received");
                self.finish_attempt(PlaybackEvent::Stop);
            }
            ControllerCommand::Pause => self.request_pause(true),
            ControllerCommand::Resume => self.request_pause(false),
            ControllerCommand::TogglePause => {
                self.backend.send_command(&["cycle", "pause"]);
            }
            ControllerCommand::Seek { position_ms } => self.handle_seek(position_ms),
            ControllerCommand::SeekRelative { delta_ms } => {
                if self.attempt.is_some() {
                    self.backend.send_typed_command(vec![
                        WireValue::from("seek"),
                        WireValue::from(delta_ms as f64 / 1000.0),
                        WireValue::from("relative"),
                    ]);
                }
            }
            ControllerCommand::SetAudioTrack { catalog_index } => {
                self.handle_set_track(TrackKind::Audio, catalog_index);
            }
            ControllerCommand::SetSubtitleTrack { catalog_index } => {
                self.handle_set_track(TrackKind::Subtitle, catalog_index);
            }
            ControllerCommand::SetVolume { volume } => {
                self.volume = volume.clamp(0.0, 100.0);
                self.shared.set_volume(self.volume);
                if self.attempt.is_some() {
                    self.backend.send_typed_command(vec![
                        WireValue::from("set_property"),
                        WireValue::from("volume"),
                        WireValue::from(self.volume),
                    ]);
                }
            }
            ControllerCommand::SetMuted { muted } => {
                self.muted = muted;
                self.shared.set_muted(muted);
                if self.attempt.is_some() {
                    self.backend.send_typed_command(vec![
                        WireValue::from("set_property"),
                        WireValue::from("mute"),
                        WireValue::from(muted),
                    ]);
                }
            }
            ControllerCommand::Retry => self.handle_retry(),
            ControllerCommand::ClearError => self.handle_clear_error(),
        }
    }

    pub(crate) fn handle_play(&mut self, params: PlayParams, selection: Option<TrackSelection>) {
        if !self.process_event(PlaybackEvent::Play) {
            warn!("play request rejected in state {}", self.state);
            return;
        }

        // A retry from Error clears the surfaced message
        if self.shared.error().is_some() {
            self.shared.set_error(None);
            self.events.emit(PlayerEvent::ErrorChanged {
                message: None,
                timestamp: now(),
            });
        }

        self.attempt_counter += 1;
        let attempt = Attempt::new(self.attempt_counter, params.clone(), selection.clone());
        info!(
            "loading '{}' from {} (attempt {})",
            params.item_id, params.url, attempt.id
        );
        self.last_request = Some((params.clone(), selection));
        self.attempt = Some(attempt);

        self.reset_shared();
        self.shared.set_item_id(Some(params.item_id.clone()));

        self.spawn_segments_fetch(self.attempt_counter, params.item_id.clone());
        self.spawn_trickplay(self.attempt_counter, params.item_id.clone());

        self.arm_load_timeout();
        if let Err(e) = self.backend.start(
            &self.settings.engine_binary,
            &self.settings.engine_args,
            &params.url,
        ) {
            self.cancel_timers();
            // The embedded backend's fatal also travels its event
            // stream, but fallback replaces that stream, so the
            // synchronous error is the one that counts.
            if self.backend.supports_embedded_video() && !self.fallback_used {
                self.fallback_to_process_backend(&e.to_string());
            } else {
                self.enter_error(Some(format!("failed to start engine: {}", e)));
            }
        }
    }

    fn handle_retry(&mut self) {
        if self.state != PlaybackState::Error {
            warn!("retry ignored outside the error state");
            return;
        }
        let Some((mut params, selection)) = self.last_request.clone() else {
            warn!("retry ignored, no pending url");
            return;
        };
        // Resume where the failed attempt left off
        if let Some(attempt) = &self.attempt {
            if attempt.position_ms > 0 {
                params.start_position_ms = attempt.position_ms;
            }
        }
        self.attempt = None;
        self.handle_play(params, selection);
    }

    fn handle_clear_error(&mut self) {
        if !self.process_event(PlaybackEvent::Recover) {
            return;
        }
        self.attempt = None;
        self.shared.set_error(None);
        self.events.emit(PlayerEvent::ErrorChanged {
            message: None,
            timestamp: now(),
        });
        self.reset_shared();
    }

    fn request_pause(&mut self, paused: bool) {
        if self.attempt.is_none() {
            debug!("pause toggle ignored, nothing playing");
            return;
        }
        self.backend.send_typed_command(vec![
            WireValue::from("set_property"),
            WireValue::from("pause"),
            WireValue::from(paused),
        ]);
    }

    fn handle_seek(&mut self, position_ms: u64) {
        match self.state {
            PlaybackState::Loading => {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.pending_seek_ms = Some(position_ms);
                }
            }
            PlaybackState::Buffering | PlaybackState::Playing | PlaybackState::Paused => {
                self.send_seek_absolute(position_ms);
            }
            _ => warn!("seek ignored in state {}", self.state),
        }
    }

    fn handle_set_track(&mut self, kind: TrackKind, catalog_index: i64) {
        let Some(attempt) = self.attempt.as_mut() else {
            warn!("{} selection ignored, nothing playing", kind);
            return;
        };
        match kind {
            TrackKind::Audio => attempt.selected_audio = Some(catalog_index),
            TrackKind::Subtitle => attempt.selected_subtitle = Some(catalog_index),
        }
        // During Loading the selection stays queued until buffering entry
        if matches!(
            self.state,
            PlaybackState::Buffering | PlaybackState::Playing | PlaybackState::Paused
        ) {
            self.apply_track_selection(kind, catalog_index);
        }
    }

    /// Resolve a catalog stream index through the track maps and command
    /// the engine. Raw catalog indices are never sent: an unmapped index
    /// skips the command and surfaces a warning instead.
    fn apply_track_selection(&mut self, kind: TrackKind, catalog_index: i64) {
        let Some(attempt) = self.attempt.as_ref() else {
            return;
        };
        match kind {
            TrackKind::Audio => match attempt.maps.resolve_audio(catalog_index) {
                Some(engine_id) => {
                    self.backend.send_typed_command(vec![
                        WireValue::from("set_property"),
                        WireValue::from("aid"),
                        WireValue::from(engine_id),
                    ]);
                    self.emit_track_changed(kind, catalog_index);
                }
                None => warn!(
                    "no engine track mapped for audio stream {}, selection skipped",
                    catalog_index
                ),
            },
            TrackKind::Subtitle => {
                if catalog_index == -1 {
                    // Explicit disable, never "auto"
                    self.backend.send_typed_command(vec![
                        WireValue::from("set_property"),
                        WireValue::from("sid"),
                        WireValue::from("no"),
                    ]);
                    self.emit_track_changed(kind, catalog_index);
                    return;
                }
                match attempt.maps.resolve_subtitle(catalog_index) {
                    Some(engine_id) => {
                        self.backend.send_typed_command(vec![
                            WireValue::from("set_property"),
                            WireValue::from("sid"),
                            WireValue::from(engine_id),
                        ]);
                        self.emit_track_changed(kind, catalog_index);
                    }
                    None => warn!(
                        "no engine track mapped for subtitle stream {}, selection skipped",
                        catalog_index
                    ),
                }
            }
        }
    }

    fn emit_track_changed(&self, kind: TrackKind, catalog_index: i64) {
        self.events.emit(PlayerEvent::TrackChanged {
            kind,
            catalog_index,
            timestamp: now(),
        });
    }

    fn send_seek_absolute(&mut self, position_ms: u64) {
        self.backend.send_typed_command(vec![
            WireValue::from("seek"),
            WireValue::from(position_ms as f64 / 1000.0),
            WireValue::from("absolute"),
        ]);
    }

    pub(crate) fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::PositionChanged(seconds) => {
                self.on_position(seconds_to_millis(seconds));
            }
            BackendEvent::DurationChanged(seconds) => {
                let duration_ms = seconds_to_millis(seconds);
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.duration_ms = duration_ms;
                }
                self.shared.set_duration_ms(duration_ms);
            }
            BackendEvent::PauseChanged(paused) => self.on_pause_flag(paused),
            BackendEvent::BufferingChanged(buffering) => self.on_buffering_flag(buffering),
            BackendEvent::AudioTrackChanged(engine_id) => {
                self.on_engine_track_changed(TrackKind::Audio, engine_id);
            }
            BackendEvent::SubtitleTrackChanged(engine_id) => {
                self.on_engine_track_changed(TrackKind::Subtitle, engine_id);
            }
            BackendEvent::VolumeChanged(volume) => self.shared.set_volume(volume),
            BackendEvent::MuteChanged(muted) => self.shared.set_muted(muted),
            BackendEvent::PlaybackEnded => {
                info!("engine reached end of media");
                self.finish_attempt(PlaybackEvent::PlaybackEnd);
            }
            BackendEvent::Exited { clean } => self.on_engine_exit(clean),
            BackendEvent::Fatal(kind) => {
                self.fallback_to_process_backend(&kind.to_string());
            }
            BackendEvent::ScriptMessage(args) => {
                debug!("engine script message: {:?}", args);
            }
        }
    }

    /// Engine process exit, clean or crashed, is handled exactly like a
    /// stop; when it interrupts Loading or Buffering it escalates to an
    /// error since the user never saw stable playback.
    fn on_engine_exit(&mut self, clean: bool) {
        if self.expected_exits > 0 {
            self.expected_exits -= 1;
            debug!("engine exit after requested stop (clean={})", clean);
            return;
        }
        info!("engine exited unexpectedly (clean={}) in state {}", clean, self.state);
        let failed_before_playback = matches!(
            self.state,
            PlaybackState::Loading | PlaybackState::Buffering
        );
        self.finish_attempt(PlaybackEvent::Stop);
        if failed_before_playback {
            self.enter_error(Some("engine exited before playback started".to_string()));
        }
    }

    fn on_pause_flag(&mut self, paused: bool) {
        self.shared.set_paused(paused);
        if paused {
            if self.process_event(PlaybackEvent::Pause) {
                self.report_paused();
            }
        } else if self.process_event(PlaybackEvent::Resume) {
            self.report_resumed();
        }
    }

    fn on_buffering_flag(&mut self, buffering: bool) {
        self.shared.set_buffering(buffering);
        if buffering {
            if self.state == PlaybackState::Playing
                && self.process_event(PlaybackEvent::BufferStart)
            {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.buffering_start_ms = Some(attempt.position_ms);
                }
                self.arm_buffer_timeout();
            }
        } else if self.state == PlaybackState::Buffering
            && self.process_event(PlaybackEvent::BufferComplete)
        {
            self.enter_playing();
        }
    }

    fn on_engine_track_changed(&mut self, kind: TrackKind, engine_id: Option<i64>) {
        let catalog_index = self.attempt.as_ref().and_then(|attempt| match kind {
            TrackKind::Audio => engine_id.and_then(|id| attempt.maps.reverse_audio(id)),
            TrackKind::Subtitle => match engine_id {
                Some(id) => attempt.maps.reverse_subtitle(id),
                None => Some(-1),
            },
        });
        match catalog_index {
            Some(catalog_index) => self.emit_track_changed(kind, catalog_index),
            None => debug!("engine selected unmapped {} track {:?}", kind, engine_id),
        }
    }

    fn on_position(&mut self, position_ms: u64) {
        let duration_ms = {
            let Some(attempt) = self.attempt.as_mut() else {
                return;
            };
            attempt.position_ms = position_ms;
            attempt.position_updates += 1;
            attempt.duration_ms
        };
        self.shared.set_position_ms(position_ms);
        self.events.emit(PlayerEvent::PositionChanged {
            position_ms,
            duration_ms,
            timestamp: now(),
        });

        match self.state {
            PlaybackState::Loading => {
                // The first position update is the load-complete signal
                if self.process_event(PlaybackEvent::LoadComplete) {
                    self.enter_buffering_after_load(position_ms);
                }
            }
            PlaybackState::Buffering => {
                // Progress resets the stall timeout
                self.arm_buffer_timeout();
                let buffering_start = self
                    .attempt
                    .as_ref()
                    .and_then(|a| a.buffering_start_ms);
                if let Some(start) = buffering_start {
                    if position_ms > start + BUFFER_PROGRESS_MS
                        && self.process_event(PlaybackEvent::BufferComplete)
                    {
                        self.enter_playing();
                    }
                }
            }
            PlaybackState::Playing => self.on_playing_position(position_ms),
            _ => {}
        }
    }

    /// Buffering entry after load: apply queued track selections and the
    /// queued seek, push display settings, report playback started.
    fn enter_buffering_after_load(&mut self, position_ms: u64) {
        self.load_deadline = None;
        self.arm_buffer_timeout();

        let (item_id, audio_sel, subtitle_sel, pending_seek, start_reported) = {
            let Some(attempt) = self.attempt.as_mut() else {
                return;
            };
            attempt.buffering_start_ms = Some(position_ms);
            (
                attempt.params.item_id.clone(),
                attempt.selected_audio,
                attempt.selected_subtitle,
                attempt.pending_seek_ms.take(),
                attempt.start_reported,
            )
        };

        self.events.emit(PlayerEvent::MediaLoaded {
            item_id,
            timestamp: now(),
        });

        // Explicit selections win over any transport-level track hint
        // baked into the stream URL; without one the engine's defaults
        // (the hint) stand.
        if let Some(catalog_index) = audio_sel {
            self.apply_track_selection(TrackKind::Audio, catalog_index);
        }
        if let Some(catalog_index) = subtitle_sel {
            self.apply_track_selection(TrackKind::Subtitle, catalog_index);
        }

        if let Some(seek_ms) = pending_seek {
            info!("executing queued seek to {}ms", seek_ms);
            self.send_seek_absolute(seek_ms);
        }

        self.backend.send_typed_command(vec![
            WireValue::from("set_property"),
            WireValue::from("volume"),
            WireValue::from(self.volume),
        ]);
        self.backend.send_typed_command(vec![
            WireValue::from("set_property"),
            WireValue::from("mute"),
            WireValue::from(self.muted),
        ]);
        self.backend.send_typed_command(vec![
            WireValue::from("set_property"),
            WireValue::from("audio-delay"),
            WireValue::from(self.audio_delay_ms as f64 / 1000.0),
        ]);

        if !start_reported {
            if let Some(attempt) = self.attempt.as_mut() {
                attempt.start_reported = true;
            }
            self.report_start();
        }
    }

    fn enter_playing(&mut self) {
        self.buffer_deadline = None;
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.buffering_start_ms = None;
        }
    }

    fn on_playing_position(&mut self, position_ms: u64) {
        // Auto-skip fires on the transition into a segment, at most once
        // per item per segment kind
        let entered = self
            .attempt
            .as_mut()
            .and_then(|a| a.segments.on_position(position_ms));
        if let Some(segment) = entered {
            if self.settings.auto_skip_enabled {
                self.skip_segment(segment);
            }
        }

        // Prefetch the next episode once past the configured percentage,
        // without blocking playback
        let prefetch = {
            let Some(attempt) = self.attempt.as_mut() else {
                return;
            };
            let duration_ms = attempt.duration_ms;
            let due = !attempt.prefetch_requested
                && duration_ms > 0
                && !attempt.params.series_id.is_empty()
                && position_ms * 100 >= duration_ms * u64::from(self.settings.prefetch_percent);
            if due {
                attempt.prefetch_requested = true;
                Some((
                    attempt.id,
                    attempt.params.series_id.clone(),
                    attempt.params.item_id.clone(),
                ))
            } else {
                None
            }
        };
        if let Some((attempt_id, series_id, item_id)) = prefetch {
            self.spawn_prefetch(attempt_id, series_id, item_id);
        }

        let updates = self
            .attempt
            .as_ref()
            .map(|a| a.position_updates)
            .unwrap_or(0);
        if updates % u64::from(self.settings.progress_report_interval.max(1)) == 0 {
            self.report_progress();
        }
    }

    fn skip_segment(&mut self, segment: MediaSegment) {
        let target_ms = segment.end_ms;
        info!("auto-skipping {} segment to {}ms", segment.kind, target_ms);
        self.send_seek_absolute(target_ms);
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.segments.mark_skipped(segment.kind);
        }
        self.events.emit(PlayerEvent::SegmentSkipped {
            kind: segment.kind,
            target_ms,
            timestamp: now(),
        });
    }

    // ---- async results -------------------------------------------------

    pub(crate) fn handle_internal(&mut self, message: InternalMsg) {
        match message {
            InternalMsg::SegmentsResolved { attempt_id, segments } => {
                let candidate = {
                    let Some(attempt) = self.attempt.as_mut() else {
                        return;
                    };
                    if attempt.id != attempt_id {
                        debug!("discarding segments for stale attempt {}", attempt_id);
                        return;
                    }
                    debug!("{} media segments loaded", segments.len());
                    let position_ms = attempt.position_ms;
                    attempt
                        .segments
                        .set_segments(segments, position_ms, SEGMENT_GRACE_MS)
                };
                // Late-arriving segments still skip once, inside the grace
                // window
                if let Some(segment) = candidate {
                    if self.state == PlaybackState::Playing && self.settings.auto_skip_enabled {
                        self.skip_segment(segment);
                    }
                }
            }
            InternalMsg::TrickplayBuilt { attempt_id, index } => {
                match self.attempt.as_ref() {
                    Some(attempt) if attempt.id == attempt_id => {
                        let item_id = attempt.params.item_id.clone();
                        let frame_count = index.frame_count();
                        self.shared.set_trickplay(Some(index));
                        self.events.emit(PlayerEvent::TrickplayReady {
                            item_id,
                            frame_count,
                            timestamp: now(),
                        });
                    }
                    _ => {
                        debug!("discarding trickplay blob for stale attempt {}", attempt_id);
                        let _ = std::fs::remove_file(index.file_path());
                    }
                }
            }
            InternalMsg::TrickplayFailed { attempt_id, message } => {
                // Soft feature: previews stay off for this item
                warn!("trickplay unavailable (attempt {}): {}", attempt_id, message);
            }
            InternalMsg::PrefetchResolved { attempt_id, prefetched } => {
                let Some(attempt) = self.attempt.as_mut() else {
                    return;
                };
                if attempt.id != attempt_id {
                    debug!("discarding prefetch for stale attempt {}", attempt_id);
                    return;
                }
                debug!(
                    "prefetched next episode: {:?}",
                    prefetched.episode.as_ref().map(|e| &e.item_id)
                );
                attempt.prefetched = Some(prefetched);
            }
            InternalMsg::NextEpisodeResolved { for_item_id, episode } => {
                let Some(context) = self.pending_autoplay.as_ref() else {
                    debug!("next-episode result with no autoplay context");
                    return;
                };
                if context.item_id != for_item_id {
                    debug!("discarding next-episode result for stale item {}", for_item_id);
                    return;
                }
                match episode {
                    Some(episode) => self.start_next_episode(episode),
                    None => {
                        info!("no next unplayed episode, autoplay finished");
                        self.pending_autoplay = None;
                    }
                }
            }
            InternalMsg::NextStreamResolved { episode, url } => {
                let Some(context) = self.pending_autoplay.take() else {
                    debug!("stream url resolved after autoplay context was cleared");
                    return;
                };
                self.events.emit(PlayerEvent::NextItemStarted {
                    item_id: episode.item_id.clone(),
                    timestamp: now(),
                });
                let params = PlayParams {
                    url,
                    item_id: episode.item_id,
                    start_position_ms: 0,
                    series_id: episode.series_id,
                    season_id: episode.season_id,
                    library_id: context.library_id.clone(),
                    framerate: context.framerate,
                    is_hdr: context.is_hdr,
                };
                // Track choices carry over; maps for the new item arrive
                // with the engine's enumeration, unmapped picks are
                // skipped with a warning
                let selection = TrackSelection {
                    audio_index: context.audio_index,
                    subtitle_index: context.subtitle_index,
                    audio_map: Vec::new(),
                    subtitle_map: Vec::new(),
                };
                self.handle_play(params, Some(selection));
            }
        }
    }

    // ---- autoplay ------------------------------------------------------

    /// On threshold-met teardown: consume a valid prefetched result
    /// immediately, otherwise issue a fresh lookup.
    pub(crate) fn resolve_next_episode(&mut self, attempt: &Attempt) {
        let series_id = attempt.params.series_id.clone();
        let item_id = attempt.params.item_id.clone();

        match attempt.prefetched.as_ref() {
            Some(prefetched) if prefetched.matches(&series_id, &item_id) => {
                match prefetched.episode.clone() {
                    Some(episode) => {
                        info!("consuming prefetched next episode {}", episode.item_id);
                        self.start_next_episode(episode);
                    }
                    None => {
                        info!("prefetch found no next episode, autoplay finished");
                        self.pending_autoplay = None;
                    }
                }
            }
            stale => {
                if stale.is_some() {
                    debug!("prefetched episode is stale, issuing a fresh lookup");
                }
                let catalog = Arc::clone(&self.catalog);
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    match catalog.next_unplayed_episode(&series_id, &item_id).await {
                        Ok(episode) => {
                            let _ = internal_tx.send(InternalMsg::NextEpisodeResolved {
                                for_item_id: item_id,
                                episode,
                            });
                        }
                        Err(e) => {
                            warn!("next-episode lookup failed: {}", e);
                            let _ = internal_tx.send(InternalMsg::NextEpisodeResolved {
                                for_item_id: item_id,
                                episode: None,
                            });
                        }
                    }
                });
            }
        }
    }

    fn start_next_episode(&mut self, episode: EpisodeRef) {
        let catalog = Arc::clone(&self.catalog);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            match catalog.stream_url(&episode.item_id).await {
                Ok(url) => {
                    let _ = internal_tx.send(InternalMsg::NextStreamResolved { episode, url });
                }
                Err(e) => warn!("stream url lookup failed for {}: {}", episode.item_id, e),
            }
        });
    }

    // ---- metadata fetches ----------------------------------------------

    fn spawn_segments_fetch(&self, attempt_id: u64, item_id: String) {
        let catalog = Arc::clone(&self.catalog);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            match catalog.media_segments(&item_id).await {
                Ok(segments) => {
                    let _ = internal_tx.send(InternalMsg::SegmentsResolved { attempt_id, segments });
                }
                Err(e) => warn!("segment lookup failed for {}: {}", item_id, e),
            }
        });
    }

    fn spawn_trickplay(&self, attempt_id: u64, item_id: String) {
        let catalog = Arc::clone(&self.catalog);
        let internal_tx = self.internal_tx.clone();
        let preferred_width = self.settings.preferred_trickplay_width;
        let http = self.http.clone();
        tokio::spawn(async move {
            let available = match catalog.trickplay_info(&item_id).await {
                Ok(available) => available,
                Err(e) => {
                    warn!("trickplay info lookup failed for {}: {}", item_id, e);
                    return;
                }
            };
            let Some(info) = select_resolution(&available, preferred_width) else {
                debug!("no trickplay offered for {}", item_id);
                return;
            };
            let tile_urls: Vec<String> = (0..info.sheet_count())
                .map(|tile_index| catalog.trickplay_tile_url(&item_id, info.width, tile_index))
                .collect();
            let output = std::env::temp_dir().join(format!("vireo-trickplay-{}.bin", Uuid::new_v4()));
            let builder = TrickplayBuilder::new(Arc::new(HttpTileFetcher::new(http)));
            let message = match builder.build(info, &tile_urls, &output).await {
                Ok(index) => InternalMsg::TrickplayBuilt { attempt_id, index },
                Err(e) => InternalMsg::TrickplayFailed {
                    attempt_id,
                    message: e.to_string(),
                },
            };
            let _ = internal_tx.send(message);
        });
    }

    fn spawn_prefetch(&self, attempt_id: u64, series_id: String, item_id: String) {
        let catalog = Arc::clone(&self.catalog);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            match catalog.next_unplayed_episode(&series_id, &item_id).await {
                Ok(episode) => {
                    let _ = internal_tx.send(InternalMsg::PrefetchResolved {
                        attempt_id,
                        prefetched: PrefetchedEpisode {
                            series_id,
                            for_item_id: item_id,
                            episode,
                        },
                    });
                }
                Err(e) => warn!("next-episode prefetch failed: {}", e),
            }
        });
    }

    // ---- catalog reporting ---------------------------------------------

    fn playback_report(&self) -> Option<PlaybackReport> {
        self.attempt.as_ref().map(|attempt| PlaybackReport {
            item_id: attempt.params.item_id.clone(),
            position_ms: attempt.position_ms,
            paused: self.shared.is_paused(),
        })
    }

    fn report_start(&self) {
        let Some(report) = self.playback_report() else { return };
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(e) = catalog.report_start(report).await {
                warn!("start report failed: {}", e);
            }
        });
    }

    fn report_progress(&self) {
        let Some(report) = self.playback_report() else { return };
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(e) = catalog.report_progress(report).await {
                warn!("progress report failed: {}", e);
            }
        });
    }

    fn report_paused(&self) {
        let Some(report) = self.playback_report() else { return };
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(e) = catalog.report_paused(report).await {
                warn!("pause report failed: {}", e);
            }
        });
    }

    fn report_resumed(&self) {
        let Some(report) = self.playback_report() else { return };
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(e) = catalog.report_resumed(report).await {
                warn!("resume report failed: {}", e);
            }
        });
    }
}
