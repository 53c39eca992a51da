mod common;

use chrono::NaiveDate;
use common::{day, settled, signal};
use pretty_assertions::assert_eq;
use signal_desk::report::{
    self, daily_series, export_csv, outcome_breakdown, BoardStats, DailyPoint, Outcome,
    OutcomeSlice, ReportFilter, ReportStats,
};
use signal_desk::types::{Signal, TradeResult};

fn fixture() -> Vec<Signal> {
    vec![
        settled(1, "2025-07-27 09:00:00", "EUR/USD", TradeResult::Win, 20.0),
        settled(2, "2025-07-28 10:00:00", "GBP/USD", TradeResult::Loss, -100.0),
        settled(3, "2025-07-28 11:00:00", "GBP/USD", TradeResult::Win, 35.5),
        signal(4),
    ]
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
}

#[test]
fn headline_stats() {
    let rows = fixture();
    let stats = ReportStats::compute(&rows);
    assert_eq!(stats.total_trades, 4);
    assert_eq!(stats.completed_trades, 3);
    assert!((stats.win_rate - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.total_profit, -44.5);
    assert_eq!(stats.avg_payout, 80.0);
    // EUR/USD and GBP/USD tie on two each; the first seen wins.
    assert_eq!(stats.most_traded_pair, "EUR/USD");
    assert_eq!(stats.biggest_win, 35.5);
}

#[test]
fn empty_stats() {
    let stats = ReportStats::compute(&[]);
    assert_eq!(stats.most_traded_pair, "N/A");
    assert_eq!(stats.win_rate, 0.0);
    assert_eq!(stats.avg_payout, 0.0);
}

#[test]
fn filters_are_inclusive_days() {
    let rows = fixture();
    let filter = ReportFilter {
        from: Some(date(28)),
        to: Some(date(28)),
        ..Default::default()
    };
    let ids: Vec<i64> = filter.apply(&rows).iter().map(|s| s.message_id.0).collect();
    assert_eq!(ids, vec![2, 3]);

    let wins = ReportFilter {
        result: Some(TradeResult::Win),
        ..Default::default()
    };
    let ids: Vec<i64> = wins.apply(&rows).iter().map(|s| s.message_id.0).collect();
    assert_eq!(ids, vec![1, 3]);

    let pair = ReportFilter {
        pair: Some("GBP/USD".into()),
        from: Some(date(28)),
        ..Default::default()
    };
    assert_eq!(pair.apply(&rows).len(), 2);
}

#[test]
fn charts() {
    let rows = fixture();
    assert_eq!(
        daily_series(&rows),
        vec![
            DailyPoint {
                date: "2025-07-27".into(),
                profit: 20.0,
                trades: 1
            },
            DailyPoint {
                date: "2025-07-28".into(),
                profit: -64.5,
                trades: 2
            },
            DailyPoint {
                date: "2025-07-29".into(),
                profit: 0.0,
                trades: 1
            },
        ]
    );
    assert_eq!(
        outcome_breakdown(&rows),
        vec![
            OutcomeSlice {
                outcome: Outcome::Wins,
                count: 2
            },
            OutcomeSlice {
                outcome: Outcome::Losses,
                count: 1
            },
            OutcomeSlice {
                outcome: Outcome::Pending,
                count: 1
            },
        ]
    );
}

#[test]
fn board_counters() {
    let stats = BoardStats::compute(&fixture());
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.wins, 2);
    assert_eq!(stats.losses, 1);
    assert!((stats.win_rate - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn csv_quotes_every_cell() {
    let mut rows = fixture();
    rows[2].pair = "GBP\"USD".into();
    let csv = export_csv(&rows[1..3]);
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(
        lines,
        vec![
            r#""ID","Date","Pair","Direction","Amount","Result","Profit","Status""#,
            r#""2","2025-07-28 10:00:00","GBP/USD","BUY","25","loss","-100","completed""#,
            r#""3","2025-07-28 11:00:00","GBP""USD","BUY","25","win","35.5","completed""#,
        ]
    );
    assert!(!csv.ends_with('\n'));
}

#[test]
fn written_file_ends_each_row() {
    let rows = fixture();
    let buf = report::write_csv(Vec::new(), &rows[..1]).unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        "\"ID\",\"Date\",\"Pair\",\"Direction\",\"Amount\",\"Result\",\"Profit\",\"Status\"\n\
         \"1\",\"2025-07-27 09:00:00\",\"EUR/USD\",\"BUY\",\"25\",\"win\",\"20\",\"completed\"\n"
    );
}

#[derive(Debug)]
struct DiskFull;

impl std::io::Write for DiskFull {
    fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn write_errors_reach_the_caller() {
    let rows = fixture();
    let err = report::write_csv(DiskFull, &rows).unwrap_err();
    assert!(err.to_string().contains("no space left"), "{err}");
}

#[test]
fn report_file_names() {
    let ranged = ReportFilter {
        from: Some(date(28)),
        to: Some(date(29)),
        ..Default::default()
    };
    assert_eq!(
        report::report_file_name(&ranged, day()),
        "trading_report_2025-07-28_to_2025-07-29_2025-07-29.csv"
    );

    let open_ended = ReportFilter {
        from: Some(date(28)),
        ..Default::default()
    };
    assert_eq!(
        report::report_file_name(&open_ended, day()),
        "trading_report_2025-07-29.csv"
    );
}
