use chrono::Utc;
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use rekall::{
    app::App,
    config::{
        Config, ConfigStore, FileConfigStore, CHUNK_SIZE, COLUMNS, MEMORIZE_SECONDS, PAIRS_COUNT,
        WORDS_COUNT,
    },
    dictionary::Dictionary,
    export,
    history::{GameRecord, History, Outcome},
    item::{DigitPairs, GameKind, ItemKind, Words},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    scoring::HighScore,
    session::{RoundConfig, Session},
    storage::SnapshotDb,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use time_humanize::{Accuracy, HumanTime, Tense};

const TICK_RATE_MS: u64 = 100;

/// memorize digit pairs or words, then recall them
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "A terminal memory trainer. Memorize a grid of digit pairs or words, recall them from memory, and track every attempt."
)]
pub struct Cli {
    /// state database (default: ~/.local/state/rekall/state.db)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file (default: the platform config dir)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// memorize two-digit numbers
    Pairs(PairsArgs),
    /// memorize words from a dictionary
    Words(WordsArgs),
    /// list past games
    History {
        /// only this game
        #[clap(short, long, value_enum)]
        kind: Option<GameKind>,

        /// case-insensitive filter on items, answers or start date
        #[clap(short, long)]
        query: Option<String>,

        /// keep games that were (not) solved in some attempt
        #[clap(long, value_enum, default_value_t = Outcome::All)]
        outcome: Outcome,
    },
    /// write the attempts of matching games as CSV
    Export {
        #[clap(short, long, value_enum, default_value_t = GameKind::Pairs)]
        kind: GameKind,

        /// output file (default: stdout)
        #[clap(short, long)]
        out: Option<PathBuf>,

        /// case-insensitive filter on items, answers or start date
        #[clap(short, long)]
        query: Option<String>,

        /// keep games that were (not) solved in some attempt
        #[clap(long, value_enum, default_value_t = Outcome::All)]
        outcome: Outcome,
    },
    /// delete game history (high scores are kept)
    Clear {
        /// only this game
        #[clap(short, long, value_enum)]
        kind: Option<GameKind>,

        /// drop everything stored, high score and unfinished round included
        #[clap(long)]
        all: bool,
    },
    /// show or update the saved settings
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct PairsArgs {
    /// number of pairs (1-50)
    #[clap(short = 'n', long)]
    count: Option<String>,

    /// pairs per row (1-10)
    #[clap(long)]
    chunk_size: Option<String>,

    /// seconds to memorize (5-120)
    #[clap(short, long)]
    seconds: Option<String>,

    /// hide the items only when enter is pressed
    #[clap(long)]
    no_timer: bool,
}

#[derive(Args, Debug, Default)]
pub struct WordsArgs {
    /// number of words (1-100)
    #[clap(short = 'n', long)]
    count: Option<String>,

    /// columns to lay the words out in (1-10)
    #[clap(long)]
    columns: Option<String>,

    /// seconds to memorize (5-120)
    #[clap(short, long)]
    seconds: Option<String>,

    /// hide the items only when enter is pressed
    #[clap(long)]
    no_timer: bool,

    /// bundled dictionary name or a word-list file
    #[clap(short, long)]
    dictionary: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    #[clap(long)]
    pairs_count: Option<String>,
    #[clap(long)]
    chunk_size: Option<String>,
    #[clap(long)]
    pairs_seconds: Option<String>,
    #[clap(long)]
    pairs_timer: Option<bool>,
    #[clap(long)]
    words_count: Option<String>,
    #[clap(long)]
    columns: Option<String>,
    #[clap(long)]
    words_seconds: Option<String>,
    #[clap(long)]
    words_timer: Option<bool>,
    #[clap(long)]
    dictionary: Option<String>,
}

fn seconds(current: u32, text: Option<&str>) -> u32 {
    MEMORIZE_SECONDS.apply(current as usize, text) as u32
}

impl PairsArgs {
    fn round_config(&self, cfg: &Config) -> RoundConfig {
        let pairs = &cfg.pairs;
        RoundConfig {
            item_count: PAIRS_COUNT.apply(pairs.pairs_count, self.count.as_deref()),
            layout: CHUNK_SIZE.apply(pairs.chunk_size, self.chunk_size.as_deref()),
            memorize_seconds: seconds(pairs.memorize_seconds, self.seconds.as_deref()),
            timer_enabled: pairs.timer_enabled && !self.no_timer,
        }
    }
}

impl WordsArgs {
    fn round_config(&self, cfg: &Config) -> RoundConfig {
        let words = &cfg.words;
        RoundConfig {
            item_count: WORDS_COUNT.apply(words.words_count, self.count.as_deref()),
            layout: COLUMNS.apply(words.columns, self.columns.as_deref()),
            memorize_seconds: seconds(words.memorize_seconds, self.seconds.as_deref()),
            timer_enabled: words.timer_enabled && !self.no_timer,
        }
    }
}

impl ConfigArgs {
    fn is_empty(&self) -> bool {
        self.pairs_count.is_none()
            && self.chunk_size.is_none()
            && self.pairs_seconds.is_none()
            && self.pairs_timer.is_none()
            && self.words_count.is_none()
            && self.columns.is_none()
            && self.words_seconds.is_none()
            && self.words_timer.is_none()
            && self.dictionary.is_none()
    }

    fn apply(&self, cfg: &mut Config) {
        let pairs = &mut cfg.pairs;
        pairs.pairs_count = PAIRS_COUNT.apply(pairs.pairs_count, self.pairs_count.as_deref());
        pairs.chunk_size = CHUNK_SIZE.apply(pairs.chunk_size, self.chunk_size.as_deref());
        pairs.memorize_seconds = seconds(pairs.memorize_seconds, self.pairs_seconds.as_deref());
        pairs.timer_enabled = self.pairs_timer.unwrap_or(pairs.timer_enabled);

        let words = &mut cfg.words;
        words.words_count = WORDS_COUNT.apply(words.words_count, self.words_count.as_deref());
        words.columns = COLUMNS.apply(words.columns, self.columns.as_deref());
        words.memorize_seconds = seconds(words.memorize_seconds, self.words_seconds.as_deref());
        words.timer_enabled = self.words_timer.unwrap_or(words.timer_enabled);
        if let Some(dictionary) = &self.dictionary {
            words.dictionary = dictionary.clone();
        }
    }
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn open_db(&self) -> rekall::Result<SnapshotDb> {
        match &self.db {
            Some(path) => SnapshotDb::open(path),
            None => SnapshotDb::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let cfg = cli.config_store().load();

    match &cli.command {
        Command::Pairs(args) => {
            let session = Session::new(DigitPairs, cfg.pairs.round_config());
            play(&cli, session, args.round_config(&cfg))
        }
        Command::Words(args) => {
            let selector = args.dictionary.as_deref().unwrap_or(&cfg.words.dictionary);
            let kind = Words::new(Dictionary::resolve(selector).into_words());
            let session = Session::new(kind, cfg.words.round_config());
            play(&cli, session, args.round_config(&cfg))
        }
        Command::History {
            kind,
            query,
            outcome,
        } => {
            let db = cli.open_db()?;
            for kind in kinds(*kind) {
                print_history(&db, kind, query.as_deref().unwrap_or(""), *outcome)?;
            }
            Ok(())
        }
        Command::Export {
            kind,
            out,
            query,
            outcome,
        } => {
            let db = cli.open_db()?;
            let (history, _) = load_history(&db, *kind)?;
            let records: Vec<GameRecord> = history
                .filter(*outcome, query.as_deref().unwrap_or(""))
                .cloned()
                .collect();
            let count = match out {
                Some(path) => export::export_to_path(path, *kind, &records)?,
                None => export::write_csv(io::stdout().lock(), *kind, &records)?,
            };
            eprintln!("{count} attempts exported");
            Ok(())
        }
        Command::Clear { kind, all } => {
            let db = cli.open_db()?;
            for kind in kinds(*kind) {
                if *all {
                    if db.clear(kind)? {
                        println!("{kind} state removed");
                    }
                    continue;
                }
                match kind {
                    GameKind::Pairs => clear_history(&db, DigitPairs)?,
                    GameKind::Words => clear_history(&db, Words::default())?,
                }
                println!("{kind} history cleared");
            }
            Ok(())
        }
        Command::Config(args) => {
            let store = cli.config_store();
            let mut cfg = cfg;
            if !args.is_empty() {
                args.apply(&mut cfg);
                store.save(&cfg)?;
            }
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn kinds(kind: Option<GameKind>) -> Vec<GameKind> {
    kind.map_or_else(|| vec![GameKind::Pairs, GameKind::Words], |k| vec![k])
}

/// Play in the terminal with `round` as this run's settings.
fn play<K: ItemKind>(
    cli: &Cli,
    mut session: Session<K>,
    round: RoundConfig,
) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    session.load_config(round);
    let mut app = App::new(session).with_store(cli.open_db()?);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, K: ItemKind>(
    terminal: &mut Terminal<B>,
    app: &mut App<K>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    while !app.should_quit() {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        let event = runner.step();
        app.handle(event, Instant::now());
    }

    Ok(())
}

fn load_history(
    db: &SnapshotDb,
    kind: GameKind,
) -> rekall::Result<(History, Option<HighScore>)> {
    let snapshot = db.load(kind)?.unwrap_or_default();
    let history = History::from_persisted(snapshot.history, Utc::now());
    Ok((history, snapshot.high_score))
}

fn clear_history<K: ItemKind>(db: &SnapshotDb, kind: K) -> rekall::Result<()> {
    let game = kind.kind();
    let Some(snapshot) = db.load(game)? else {
        return Ok(());
    };
    let mut session = Session::new(kind, RoundConfig::default());
    session.restore(snapshot);
    session.clear_history();
    db.save(game, &session.snapshot())
}

fn ago(date: chrono::DateTime<Utc>) -> String {
    let elapsed = (Utc::now() - date).to_std().unwrap_or_default();
    HumanTime::from(elapsed).to_text_en(Accuracy::Rough, Tense::Past)
}

/// One mark per item: `+` if some attempt got it right, `-` if none did.
fn solved_marks(record: &GameRecord) -> String {
    record
        .solved_positions()
        .into_iter()
        .map(|solved| if solved { '+' } else { '-' })
        .collect()
}

fn print_history(
    db: &SnapshotDb,
    kind: GameKind,
    query: &str,
    outcome: Outcome,
) -> rekall::Result<()> {
    let (history, high_score) = load_history(db, kind)?;
    let records: Vec<&GameRecord> = history.filter(outcome, query).collect();

    match db.saved_at(kind)? {
        Some(saved) => println!("== {kind} == (saved {})", ago(saved)),
        None => println!("== {kind} =="),
    }
    for record in &records {
        let last = record
            .latest_attempt()
            .map(|a| a.score())
            .map_or_else(String::new, |s| format!("last {}/{}", s.correct, s.total));
        println!(
            "{}  {:<16} {:>2} attempts  best {:>3}%  {:<9} [{}]{}  {}",
            record.id,
            ago(record.start_date),
            record.attempts.len(),
            record.best_percent(),
            last,
            solved_marks(record),
            if record.completed { "" } else { " (open)" },
            record.items.join(" "),
        );
    }

    let summary = history.summary();
    println!(
        "{} of {} games shown, {} attempts, {} completed, mean {:.0}%",
        records.len(),
        summary.games,
        summary.attempts,
        summary.completed,
        summary.mean_percent.unwrap_or(0.0),
    );
    if let Some(hs) = high_score {
        println!(
            "high score {}% ({}/{}) {}",
            hs.percent,
            hs.correct,
            hs.total,
            ago(hs.date)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_tick_rate_constant() {
        assert_eq!(TICK_RATE_MS, 100);
    }

    #[test]
    fn test_cli_pairs_overrides() {
        let cli = Cli::try_parse_from(["rekall", "pairs", "-n", "12", "--seconds", "300"]).unwrap();
        let Command::Pairs(args) = cli.command else {
            panic!("expected pairs");
        };
        let round = args.round_config(&Config::default());

        assert_eq!(round.item_count, 12);
        assert_eq!(round.layout, 5);
        assert_eq!(round.memorize_seconds, 120);
        assert!(round.timer_enabled);
    }

    #[test]
    fn test_cli_words_no_timer_and_bad_count() {
        let cli = Cli::try_parse_from(["rekall", "words", "-n", "lots", "--no-timer"]).unwrap();
        let Command::Words(args) = cli.command else {
            panic!("expected words");
        };
        let round = args.round_config(&Config::default());

        assert_eq!(round.item_count, 1);
        assert_eq!(round.layout, 1);
        assert!(!round.timer_enabled);
    }

    #[test]
    fn test_cli_global_paths() {
        let cli =
            Cli::try_parse_from(["rekall", "history", "--db", "/tmp/x.db", "-k", "words"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert_matches!(
            cli.command,
            Command::History {
                kind: Some(GameKind::Words),
                query: None,
                outcome: Outcome::All,
            }
        );
    }

    #[test]
    fn test_cli_outcome_filters() {
        let cli = Cli::try_parse_from(["rekall", "history", "--outcome", "fail"]).unwrap();
        assert_matches!(
            cli.command,
            Command::History {
                outcome: Outcome::Fail,
                ..
            }
        );

        let cli = Cli::try_parse_from([
            "rekall", "export", "-q", "12", "--outcome", "success", "-o", "x.csv",
        ])
        .unwrap();
        assert_matches!(
            cli.command,
            Command::Export {
                query: Some(q),
                outcome: Outcome::Success,
                ..
            } if q == "12"
        );
        assert!(Cli::try_parse_from(["rekall", "history", "--outcome", "maybe"]).is_err());
    }

    #[test]
    fn test_solved_marks() {
        let mut record = GameRecord::new(1, Utc::now(), vec!["12".into(), "34".into()], 2, 8);
        assert_eq!(solved_marks(&record), "--");

        record.push_attempt(rekall::history::Attempt {
            id: 2,
            date: Utc::now(),
            provided: vec!["00".into(), "34".into()],
            correct: 1,
            total: 2,
            percent: 50,
            memorize_elapsed_ms: 0,
            guess_elapsed_ms: 0,
        });
        assert_eq!(solved_marks(&record), "-+");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["rekall"]).is_err());
    }

    #[test]
    fn test_config_args_apply() {
        let args = ConfigArgs {
            pairs_count: Some("70".into()),
            words_timer: Some(false),
            dictionary: Some("spanish".into()),
            ..ConfigArgs::default()
        };
        assert!(!args.is_empty());

        let mut cfg = Config::default();
        args.apply(&mut cfg);

        assert_eq!(cfg.pairs.pairs_count, 50);
        assert_eq!(cfg.pairs.chunk_size, 5);
        assert!(!cfg.words.timer_enabled);
        assert_eq!(cfg.words.dictionary, "spanish");
        assert!(ConfigArgs::default().is_empty());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(kinds(None), vec![GameKind::Pairs, GameKind::Words]);
        assert_eq!(kinds(Some(GameKind::Words)), vec![GameKind::Words]);
    }
}
