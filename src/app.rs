use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::item::ItemKind;
use crate::runtime::{Event, TimerFire, Timers};
use crate::session::{InputOutcome, Phase, Session};
use crate::storage::SnapshotDb;

/// Hosts one session in the terminal: keys, timers and persistence.
#[derive(Debug)]
pub struct App<K: ItemKind> {
    session: Session<K>,
    timers: Timers,
    store: Option<SnapshotDb>,
    rng: StdRng,
    notice: Option<String>,
    should_quit: bool,
}

impl<K: ItemKind> App<K> {
    pub fn new(session: Session<K>) -> Self {
        Self {
            session,
            timers: Timers::new(),
            store: None,
            rng: StdRng::from_entropy(),
            notice: None,
            should_quit: false,
        }
    }

    /// Persist to `store`, first restoring whatever it holds for this game kind.
    pub fn with_store(mut self, store: SnapshotDb) -> Self {
        let kind = self.session.kind().kind();
        match store.load(kind) {
            Ok(Some(snapshot)) => {
                self.session.restore(snapshot);
                log::info!(
                    "restored {kind} session with {} records",
                    self.session.history().len()
                );
            }
            Ok(None) => {}
            Err(e) => log::warn!("ignoring unreadable {kind} snapshot: {e}"),
        }
        self.store = Some(store);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn session(&self) -> &Session<K> {
        &self.session
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Apply one runner event, then fire any timers due at `now`.
    pub fn handle(&mut self, event: Event, now: Instant) {
        if let Event::Key(key) = event {
            if self.on_key(key) {
                self.persist();
            }
        }
        self.advance(now);
    }

    /// Fire due timers and re-arm them for the current phase.
    pub fn advance(&mut self, now: Instant) {
        self.timers
            .sync(self.session.phase(), self.session.timer_remaining(), now);

        let mut countdown_fired = false;
        for fire in self.timers.due(now) {
            match fire {
                TimerFire::Countdown => {
                    self.session.tick();
                    countdown_fired = true;
                }
                TimerFire::MemorizeElapsed => self.session.tick_memorize_elapsed(),
                TimerFire::GuessElapsed => self.session.tick_guess_elapsed(),
            }
        }

        if countdown_fired {
            self.timers
                .sync(self.session.phase(), self.session.timer_remaining(), now);
            self.persist();
        }
    }

    /// Stop all timers and write the final state.
    pub fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.persist();
    }

    /// Returns true when session state changed.
    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return false;
        }
        self.notice = None;

        match (self.session.phase(), key.code) {
            (Phase::Ready | Phase::Result, KeyCode::Enter) => self.start_round(),
            (Phase::Showing, KeyCode::Enter) => {
                self.session.hide_now();
                true
            }
            (Phase::Input, KeyCode::Enter) => {
                let provided = self.session.kind().submission(self.session.input());
                self.session.verify_input(provided).is_some()
            }
            (Phase::Ready, KeyCode::Esc) => {
                self.should_quit = true;
                false
            }
            (_, KeyCode::Esc) => {
                self.session.reset();
                true
            }
            (Phase::Input, KeyCode::Char(c)) if is_plain(key.modifiers) => {
                let mut buffer = self.session.input().to_string();
                buffer.push(c);
                self.on_input(&buffer)
            }
            (Phase::Input, KeyCode::Backspace) => {
                let mut buffer = self.session.input().to_string();
                buffer.pop();
                self.on_input(&buffer)
            }
            (Phase::Input, _) => false,
            (_, KeyCode::Char('q')) => {
                self.should_quit = true;
                false
            }
            _ => false,
        }
    }

    fn start_round(&mut self) -> bool {
        if !self.session.can_start() {
            self.notice = Some("nothing to memorize: the dictionary is empty".to_string());
            log::warn!("cannot start a {} round", self.session.kind().kind());
            return false;
        }
        self.session.new_round(&mut self.rng);
        true
    }

    fn on_input(&mut self, buffer: &str) -> bool {
        match self.session.set_input(buffer) {
            InputOutcome::Ignored | InputOutcome::Unchanged => false,
            InputOutcome::Pending { .. } => true,
            InputOutcome::Rejected(score) => {
                self.notice = Some(format!(
                    "{}/{} correct, keep going",
                    score.correct, score.total
                ));
                true
            }
            InputOutcome::Verified(_) => true,
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let kind = self.session.kind().kind();
        if let Err(e) = store.save(kind, &self.session.snapshot()) {
            log::warn!("failed to save {kind} session: {e}");
        }
    }
}

/// Keys typed as text: no modifier other than shift.
fn is_plain(modifiers: KeyModifiers) -> bool {
    modifiers.difference(KeyModifiers::SHIFT).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{DigitPairs, GameKind, Words};
    use crate::runtime::COUNTDOWN_INTERVAL;
    use crate::session::RoundConfig;
    use std::time::Duration;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn pairs_app(memorize_seconds: u32) -> App<DigitPairs> {
        let config = RoundConfig {
            item_count: 2,
            layout: 5,
            memorize_seconds,
            timer_enabled: true,
        };
        App::new(Session::new(DigitPairs, config)).with_rng(StdRng::seed_from_u64(3))
    }

    fn type_str<K: ItemKind>(app: &mut App<K>, text: &str, now: Instant) {
        for c in text.chars() {
            app.handle(key(KeyCode::Char(c)), now);
        }
    }

    #[test]
    fn enter_starts_then_hides() {
        let now = Instant::now();
        let mut app = pairs_app(8);

        app.handle(key(KeyCode::Enter), now);
        assert_eq!(app.session().phase(), Phase::Showing);
        assert_eq!(app.session().items().len(), 2);

        app.handle(key(KeyCode::Enter), now);
        assert_eq!(app.session().phase(), Phase::Input);
    }

    #[test]
    fn countdown_drives_phase_change() {
        let start = Instant::now();
        let mut app = pairs_app(2);
        app.handle(key(KeyCode::Enter), start);

        let mut now = start;
        for _ in 0..2 {
            now += COUNTDOWN_INTERVAL;
            app.handle(Event::Tick, now);
        }

        assert_eq!(app.session().phase(), Phase::Input);
        assert_eq!(app.session().memorize_elapsed_ms(), 2000);

        app.handle(Event::Tick, now + Duration::from_millis(300));
        assert_eq!(app.session().guess_elapsed_ms(), 300);
    }

    #[test]
    fn typing_the_items_verifies() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        let answer = app.session().items().concat();
        type_str(&mut app, &answer, now);

        assert_eq!(app.session().phase(), Phase::Result);
        assert_eq!(app.session().result().unwrap().score.percent, 100);
    }

    #[test]
    fn wrong_answer_keeps_input_and_backspace_edits() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        let items = app.session().items().to_vec();
        let wrong = if items[1] == "00" { "01" } else { "00" };
        type_str(&mut app, &format!("{}{}", items[0], wrong), now);

        assert_eq!(app.session().phase(), Phase::Input);
        assert!(app.notice().is_some());
        assert_eq!(app.session().history().records()[0].attempts.len(), 1);

        app.handle(key(KeyCode::Backspace), now);
        app.handle(key(KeyCode::Backspace), now);
        type_str(&mut app, &items[1], now);

        assert_eq!(app.session().phase(), Phase::Result);
        assert_eq!(app.session().history().records()[0].attempts.len(), 2);
    }

    #[test]
    fn enter_in_input_submits_partial_answer() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        let first = app.session().items()[0].clone();
        type_str(&mut app, &first, now);
        app.handle(key(KeyCode::Enter), now);

        let result = app.session().result().unwrap();
        assert_eq!(result.score.correct, 1);
        assert_eq!(result.score.total, 2);
    }

    #[test]
    fn esc_resets_then_quits() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);

        app.handle(key(KeyCode::Esc), now);
        assert_eq!(app.session().phase(), Phase::Ready);
        assert!(app.session().history().is_empty());
        assert!(!app.should_quit());

        app.handle(key(KeyCode::Esc), now);
        assert!(app.should_quit());
    }

    #[test]
    fn q_is_typed_text_during_input() {
        let kind = Words::new(vec!["queen".into(), "quiet".into()]);
        let config = RoundConfig {
            item_count: 1,
            layout: 1,
            memorize_seconds: 5,
            timer_enabled: false,
        };
        let now = Instant::now();
        let mut app = App::new(Session::new(kind, config)).with_rng(StdRng::seed_from_u64(1));
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        app.handle(key(KeyCode::Char('q')), now);
        assert!(!app.should_quit());
        assert_eq!(app.session().input(), "q");
    }

    #[test]
    fn modified_chars_are_not_typed() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        app.handle(
            Event::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)),
            now,
        );
        app.handle(Event::Key(KeyEvent::new(KeyCode::Char('1'), KeyModifiers::ALT)), now);
        app.handle(
            Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            now,
        );
        assert_eq!(app.session().input(), "");
        assert!(!app.should_quit());

        app.handle(Event::Key(KeyEvent::new(KeyCode::Char('4'), KeyModifiers::SHIFT)), now);
        assert_eq!(app.session().input(), "4");
    }

    #[test]
    fn ctrl_c_quits_from_any_phase() {
        let now = Instant::now();
        let mut app = pairs_app(8);
        app.handle(key(KeyCode::Enter), now);
        app.handle(key(KeyCode::Enter), now);

        app.handle(
            Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            now,
        );
        assert!(app.should_quit());
    }

    #[test]
    fn empty_dictionary_cannot_start() {
        let now = Instant::now();
        let mut app = App::new(Session::new(Words::default(), RoundConfig::default()));

        app.handle(key(KeyCode::Enter), now);

        assert_eq!(app.session().phase(), Phase::Ready);
        assert!(app.notice().is_some());
    }

    #[test]
    fn store_roundtrip_resumes_round() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let now = Instant::now();

        let items = {
            let mut app = pairs_app(8).with_store(SnapshotDb::open(&path).unwrap());
            app.handle(key(KeyCode::Enter), now);
            app.shutdown();
            app.session().items().to_vec()
        };

        let app = pairs_app(8).with_store(SnapshotDb::open(&path).unwrap());
        assert_eq!(app.session().phase(), Phase::Showing);
        assert_eq!(app.session().items(), items.as_slice());

        let db = SnapshotDb::open(&path).unwrap();
        assert!(db.load(GameKind::Pairs).unwrap().is_some());
        assert!(db.load(GameKind::Words).unwrap().is_none());
    }
}
