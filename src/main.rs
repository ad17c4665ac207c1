mod app;
mod error;
mod logs;
mod model;
mod msg;
mod plugin;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{Result, bail};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use app::App;
use model::config::AppConfig;
use msg::Msg;

fn main() -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = data_dir_arg()? {
        config = config.with_data_dir(&dir);
    }

    // Initialize logging to file (never stdout, which is the shell)
    let log_dir = config.data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "cypherpunk.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(config.general.log_filter.as_str())
        .init();

    tracing::info!(data_dir = %log_dir.display(), "cypherpunk starting");

    let watch = config.general.watch_state.then(|| config.state_path());
    let app = App::new(config)?;

    if let Err(e) = run(app, watch) {
        tracing::error!("shell stopped: {e:?}");
        eprintln!("cypherpunk error: {e:?}");
    }

    tracing::info!("cypherpunk stopped");
    Ok(())
}

fn data_dir_arg() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => match args.next() {
                Some(dir) => return Ok(Some(PathBuf::from(dir))),
                None => bail!("--data-dir needs a path"),
            },
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(None)
}

fn run(mut app: App, watch: Option<PathBuf>) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();

    // Input thread: one command per stdin line, Quit on EOF
    let tx_input = tx.clone();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx_input.send(Msg::Command(line)).is_err() {
                return;
            }
        }
        let _ = tx_input.send(Msg::Quit);
    });

    // State watcher thread: picks up edits made by another process
    if let Some(state_path) = watch {
        spawn_state_watcher(state_path, tx.clone());
    }
    drop(tx);

    let mut stdout = io::stdout();
    flush_notifications(&mut app, &mut stdout, true)?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        let mut prompt = matches!(first, Msg::Command(_));
        app.update(first);

        while let Ok(msg) = rx.try_recv() {
            prompt |= matches!(msg, Msg::Command(_));
            app.update(msg);
        }

        if app.should_quit {
            flush_notifications(&mut app, &mut stdout, false)?;
            break;
        }

        flush_notifications(&mut app, &mut stdout, prompt)?;
    }

    Ok(())
}

fn flush_notifications(app: &mut App, out: &mut impl Write, prompt: bool) -> Result<()> {
    let notes = app.take_notifications();
    for note in &notes {
        writeln!(out, "{note}")?;
    }
    if prompt || !notes.is_empty() {
        write!(out, "> ")?;
    }
    out.flush()?;
    Ok(())
}

fn spawn_state_watcher(state_path: PathBuf, tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        // The state file is replaced by rename, so watch its directory.
        let Some(dir) = state_path.parent().map(Path::to_path_buf) else {
            return;
        };
        if let Err(err) = std::fs::create_dir_all(&dir) {
            tracing::warn!("failed to create state directory {}: {err}", dir.display());
            return;
        }

        let tx_watch = tx.clone();
        let mut watcher: RecommendedWatcher =
            match notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        for path in event.paths {
                            if tx_watch.send(Msg::StateChanged(path)).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("state watcher error: {err}");
                }
            }) {
                Ok(w) => w,
                Err(err) => {
                    tracing::warn!("failed to initialize state watcher: {err}");
                    return;
                }
            };

        if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            tracing::warn!("failed to watch {}: {err}", dir.display());
            return;
        }

        loop {
            thread::park();
        }
    });
}
