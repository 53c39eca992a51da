use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use signal_desk::api::{DemoApi, FallbackApi, HttpApi};
use signal_desk::board::{BotPanel, ChannelBook, NewSignal, SettingsForm, SignalBoard};
use signal_desk::config::ENV_WORKING_DIR;
use signal_desk::lock::TimeOfDay;
use signal_desk::notify::NotificationCenter;
use signal_desk::poll;
use signal_desk::report::{self, ReportFilter};
use signal_desk::schedule::{self, TradeDuration, DEFAULT_MARTINGALE_LEVELS};
use signal_desk::types::{BotId, ChannelId, Direction, MessageId, NewChannel, SignalPatch, TradeResult};
use signal_desk::{Clock, DeskApi, DeskConfig, EditLockPolicy, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "desk", about = "Trading-signal desk")]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "SIGNAL_DESK_API_URL")]
    api_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "SIGNAL_DESK_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Serve built-in sample data instead of calling the backend.
    #[arg(long)]
    demo: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Today's pending/processing signals with their edit locks.
    Signals {
        /// Show every signal instead of today's live ones.
        #[arg(long)]
        all: bool,
    },
    /// Lock state of one signal as of now.
    Locks { id: i64 },
    /// Follow locks and trading status until Ctrl-C.
    Watch,
    /// Add a signal by hand.
    Add {
        pair: String,
        entry_time: String,
        #[arg(long, default_value = "BUY")]
        direction: String,
        #[arg(long, default_value_t = 25.0)]
        amount: f64,
        #[arg(long, default_value = "5 minutes")]
        duration: String,
    },
    /// Add a signal from channel message text (read from stdin when omitted).
    AddText {
        text: Option<String>,
        #[arg(long, default_value_t = 25.0)]
        amount: f64,
    },
    /// Edit fields of a signal; locked fields are refused.
    Edit {
        id: i64,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        entry_time: Option<String>,
        #[arg(long)]
        direction: Option<String>,
        #[arg(long)]
        duration: Option<String>,
        /// Comma-separated stakes, entry first.
        #[arg(long, value_delimiter = ',')]
        amounts: Option<Vec<f64>>,
    },
    Delete { id: i64 },
    Bots,
    StartBot {
        id: String,
        #[arg(long, env = ENV_WORKING_DIR)]
        working_dir: Option<String>,
    },
    StopBot { id: String },
    Channels,
    ChannelAdd { chat_id: String, name: String },
    ChannelToggle { id: i64 },
    ChannelDelete { id: i64 },
    /// Kill-switch status.
    Status,
    StopTrading,
    ResumeTrading,
    Settings {
        /// Reset to defaults (keeping the current balance) and save.
        #[arg(long)]
        reset: bool,
    },
    /// Result statistics, optionally exported to CSV.
    Report {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        result: Option<String>,
        /// Write the rows to this directory as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Martingale times for an entry time and duration.
    Schedule {
        entry_time: String,
        #[arg(default_value = "5 minutes")]
        duration: String,
    },
    /// Stake ladder for a base amount at a payout.
    Stake {
        base_amount: f64,
        #[arg(default_value_t = 80.0)]
        payout: f64,
    },
    Health,
}

#[derive(Serialize)]
struct LockRow<'a> {
    message_id: MessageId,
    pair: &'a str,
    entry_time: &'a str,
    status: String,
    locks: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_direction(raw: &str) -> anyhow::Result<Direction> {
    raw.parse().map_err(|e: String| anyhow!(e))
}

fn print_toasts(notices: &NotificationCenter) {
    for toast in notices.drain_toasts() {
        eprintln!("{}", toast.notice);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut cfg = DeskConfig::from_env().context("reading SIGNAL_DESK_* environment")?;
    if let Some(url) = args.api_url {
        cfg.api_url = url;
    }
    if let Some(secs) = args.timeout {
        cfg.timeout = Duration::from_secs(secs);
    }
    cfg.demo |= args.demo;
    cfg.validate().context("invalid configuration")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notices = Arc::new(NotificationCenter::new(clock.clone()));
    let api: Arc<dyn DeskApi> = if cfg.demo {
        tracing::info!("demo mode, backend not contacted");
        Arc::new(DemoApi::new(clock.clone()))
    } else {
        let http = HttpApi::from_config(&cfg)
            .with_context(|| format!("building client for {}", cfg.api_url))?;
        Arc::new(FallbackApi::new(http, DemoApi::new(clock.clone()), notices.clone()))
    };
    let policy = EditLockPolicy::with_buffer_secs(cfg.edit_lock_buffer_secs);

    let result = run(args.cmd, &cfg, api, clock, notices.clone(), policy).await;
    print_toasts(&notices);
    result
}

async fn run(
    cmd: Cmd,
    cfg: &DeskConfig,
    api: Arc<dyn DeskApi>,
    clock: Arc<dyn Clock>,
    notices: Arc<NotificationCenter>,
    policy: EditLockPolicy,
) -> anyhow::Result<()> {
    let board = || SignalBoard::with_policy(api.clone(), clock.clone(), notices.clone(), policy);

    match cmd {
        Cmd::Signals { all } => {
            let mut board = board();
            board.load().await.context("loading signals")?;
            let now = board.now();
            let rows = if all { board.all() } else { board.live() };
            let rows: Vec<LockRow<'_>> = rows
                .iter()
                .map(|s| LockRow {
                    message_id: s.message_id,
                    pair: &s.pair,
                    entry_time: &s.entry_time,
                    status: s.status.to_string(),
                    locks: policy.evaluate(now, s).to_string(),
                })
                .collect();
            print_json(&rows)?;
            print_json(&board.stats())?;
        }
        Cmd::Locks { id } => {
            let id = MessageId(id);
            let mut board = board();
            board.load().await.context("loading signals")?;
            let perms = board
                .permissions(id)
                .ok_or_else(|| anyhow!("signal {id} not found"))?;
            print_json(&perms)?;
        }
        Cmd::Watch => {
            let mut board = board();
            let settings = api.base_settings().await.context("loading settings")?;
            board.set_min_payout(settings.min_payout_percent);
            board.load().await.context("loading signals")?;
            let (_ticker, mut now_rx) = poll::spawn_ticker(clock.clone(), cfg.lock_tick);
            let (_status, mut status_rx) =
                poll::spawn_status_poll(api.clone(), notices.clone(), cfg.status_poll);
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    changed = now_rx.changed() => {
                        if changed.is_err() { break; }
                        let now = *now_rx.borrow_and_update();
                        for (id, state) in board.refresh_locks(now) {
                            tracing::debug!(message_id = %id, %state, "lock");
                        }
                    }
                    changed = status_rx.changed() => {
                        if changed.is_err() { break; }
                        let snapshot = status_rx.borrow_and_update().clone();
                        if let Err(err) = board.load().await {
                            tracing::warn!(%err, "signal refresh failed");
                        }
                        if let Some(trading) = &snapshot.trading {
                            println!(
                                "profit {:.2} / target {:.2}, trading {}",
                                trading.today_profit,
                                trading.daily_profit_target,
                                if trading.trading_allowed { "allowed" } else { "stopped" },
                            );
                        }
                    }
                }
                print_toasts(&notices);
            }
        }
        Cmd::Add {
            pair,
            entry_time,
            direction,
            amount,
            duration,
        } => {
            let form = NewSignal {
                pair,
                base_amount: amount,
                entry_time,
                direction: parse_direction(&direction)?,
                trade_duration: duration,
            };
            let mut board = board();
            let signal = board.add(&form).await.context("adding signal")?;
            print_json(&signal)?;
        }
        Cmd::AddText { text, amount } => {
            let text = match text {
                Some(text) => text,
                None => std::io::read_to_string(std::io::stdin()).context("reading stdin")?,
            };
            let mut board = board();
            let signal = board
                .add_text(&text, amount)
                .await
                .context("adding signal from text")?;
            print_json(&signal)?;
        }
        Cmd::Edit {
            id,
            pair,
            amount,
            entry_time,
            direction,
            duration,
            amounts,
        } => {
            let patch = SignalPatch {
                pair,
                base_amount: amount,
                entry_time,
                direction: direction.as_deref().map(parse_direction).transpose()?,
                trade_duration: duration,
                martingale_amounts: amounts,
                is_available_martingale_level: None,
            };
            let mut board = board();
            board.load().await.context("loading signals")?;
            let updated = board
                .update(MessageId(id), patch)
                .await
                .with_context(|| format!("editing signal {id}"))?;
            print_json(&updated)?;
        }
        Cmd::Delete { id } => {
            let mut board = board();
            board.load().await.context("loading signals")?;
            board
                .remove(MessageId(id))
                .await
                .with_context(|| format!("deleting signal {id}"))?;
        }
        Cmd::Bots => {
            let mut panel = BotPanel::new(api, notices, cfg.working_dir.clone());
            panel.load().await.context("loading bots")?;
            print_json(&panel.rows())?;
        }
        Cmd::StartBot { id, working_dir } => {
            let dir = working_dir.or_else(|| cfg.working_dir.clone());
            let mut panel = BotPanel::new(api, notices, dir);
            let reply = panel.start(&BotId(id)).await.context("starting bot")?;
            print_json(&reply)?;
        }
        Cmd::StopBot { id } => {
            let mut panel = BotPanel::new(api, notices, cfg.working_dir.clone());
            let reply = panel.stop(&BotId(id)).await.context("stopping bot")?;
            print_json(&reply)?;
        }
        Cmd::Channels => {
            let mut book = ChannelBook::new(api, notices);
            print_json(&book.load().await.context("loading channels")?)?;
        }
        Cmd::ChannelAdd { chat_id, name } => {
            let mut book = ChannelBook::new(api, notices);
            book.load().await.context("loading channels")?;
            let created = book
                .add(NewChannel::telegram(chat_id, name))
                .await
                .context("adding channel")?;
            print_json(&created)?;
        }
        Cmd::ChannelToggle { id } => {
            let mut book = ChannelBook::new(api, notices);
            book.load().await.context("loading channels")?;
            let status = book.toggle(ChannelId(id)).await.context("toggling channel")?;
            print_json(&status)?;
        }
        Cmd::ChannelDelete { id } => {
            let mut book = ChannelBook::new(api, notices);
            book.delete(ChannelId(id)).await.context("deleting channel")?;
        }
        Cmd::Status => {
            let form = SettingsForm::new(api, notices);
            print_json(&form.trading_status().await.context("fetching trading status")?)?;
        }
        Cmd::StopTrading => {
            let form = SettingsForm::new(api, notices);
            print_json(&form.stop_trading().await.context("stopping trading")?)?;
        }
        Cmd::ResumeTrading => {
            let form = SettingsForm::new(api, notices);
            print_json(&form.resume_trading().await.context("resuming trading")?)?;
        }
        Cmd::Settings { reset } => {
            let mut form = SettingsForm::new(api, notices);
            form.load().await.context("loading settings")?;
            if reset {
                form.reset_to_defaults();
                form.save().await.context("saving settings")?;
            }
            print_json(form.draft())?;
        }
        Cmd::Report {
            from,
            to,
            pair,
            result,
            csv,
        } => {
            let result = result
                .as_deref()
                .map(|r| r.parse::<TradeResult>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let filter = ReportFilter {
                from,
                to,
                pair,
                result,
            };
            let rows = api.results(&filter).await.context("fetching results")?;
            let rows = filter.apply(&rows);
            print_json(&report::ReportStats::compute(rows.iter().copied()))?;
            print_json(&report::outcome_breakdown(rows.iter().copied()))?;
            if let Some(dir) = csv {
                let path = dir.join(report::report_file_name(&filter, clock.today()));
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                let file = report::write_csv(file, rows.iter().copied())
                    .with_context(|| format!("writing {}", path.display()))?;
                file.sync_all()
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("{}", path.display());
            }
        }
        Cmd::Schedule {
            entry_time,
            duration,
        } => {
            let entry = TimeOfDay::parse(&entry_time)
                .ok_or_else(|| anyhow!("entry time {entry_time:?} is not HH:MM"))?;
            let duration: TradeDuration = duration.parse()?;
            let times = schedule::martingale_times(entry, duration, DEFAULT_MARTINGALE_LEVELS);
            print_json(&serde_json::json!({
                "entry_time": entry.to_string(),
                "end_time": schedule::trade_end_time(entry, duration),
                "martingale_times": times,
            }))?;
        }
        Cmd::Stake {
            base_amount,
            payout,
        } => {
            let ladder = schedule::stake_ladder(base_amount, payout, DEFAULT_MARTINGALE_LEVELS)?;
            print_json(&ladder)?;
        }
        Cmd::Health => {
            print_json(&api.health().await.context("backend health check")?)?;
        }
    }
    Ok(())
}
