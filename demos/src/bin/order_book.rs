//! Terminal Order Book
//!
//! Showcases: live book_ui_1 feed, price grouping, toggle/kill/reset
//!
//! Run: cargo run --bin order_book
//!
//! Type a command and press Enter:
//!   t        toggle between PI_XBTUSD and PI_ETHUSD
//!   g        cycle grouping, or `g 2.5` to pick one
//!   k        kill the feed (fault injection)
//!   r        reset the feed after a failure
//!   q        quit
//!
//! ORDER_FEED_ENDPOINT, ORDER_FEED_PRODUCT and ORDER_FEED_FLUSH_MS override the
//! defaults; RUST_LOG controls logging (written to stderr).

use colored::*;
use orderfeed_types::GroupingIncrement;
use orderfeed_ws::{BookContent, BookView, FeedConfig, GroupedLevel, OrderBookSession};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const ROWS: usize = 12;
const BAR_WIDTH: usize = 24;

#[derive(Debug, PartialEq)]
enum Action {
    Toggle,
    Group(Option<String>),
    Kill,
    Reset,
    Quit,
    Unknown(String),
}

fn parse_action(line: &str) -> Option<Action> {
    let mut parts = line.split_whitespace();
    let action = match parts.next()? {
        "t" | "toggle" => Action::Toggle,
        "g" | "group" => Action::Group(parts.next().map(str::to_string)),
        "k" | "kill" => Action::Kill,
        "r" | "reset" => Action::Reset,
        "q" | "quit" | "exit" => Action::Quit,
        other => Action::Unknown(other.to_string()),
    };
    Some(action)
}

/// Format with thousands separators and a fixed number of decimals
fn with_separators(value: Decimal, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac_part) => format!("{sign}{grouped}.{frac_part}"),
        None => format!("{sign}{grouped}"),
    }
}

fn depth_bar(level: &GroupedLevel, max_total: Decimal) -> usize {
    (level.depth_fraction(max_total) * Decimal::from(BAR_WIDTH as u64))
        .round()
        .to_usize()
        .unwrap_or(0)
        .min(BAR_WIDTH)
}

fn print_row(level: &GroupedLevel, max_total: Decimal, is_bid: bool) {
    let bar_len = depth_bar(level, max_total);
    let bar = "█".repeat(bar_len);
    let padding = " ".repeat(BAR_WIDTH - bar_len);
    let price = with_separators(level.price, 2);

    println!(
        "  {:>14}  {:>12}  {:>12}  {}{}",
        if is_bid { price.green() } else { price.red() },
        with_separators(level.size, 0),
        with_separators(level.total, 0),
        if is_bid { bar.green() } else { bar.red() },
        padding,
    );
}

fn render(view: &BookView, message: Option<&str>) {
    // Clear screen
    print!("\x1B[2J\x1B[H");

    println!("{}", "═".repeat(70).cyan());
    println!(
        "  {}{}",
        format!("{:<48}", view.title()).cyan().bold(),
        view.grouping.label().white()
    );
    println!("{}", "═".repeat(70).cyan());
    println!();

    match &view.content {
        BookContent::Failed(failure) => {
            println!("  {}", failure.to_string().red().bold());
            println!("  {}", format!("({:?}: {})", failure.kind, failure.detail).dimmed());
        }
        BookContent::Book(book) => {
            println!(
                "  {:>14}  {:>12}  {:>12}",
                "PRICE".white().bold(),
                "SIZE".white().bold(),
                "TOTAL".white().bold()
            );
            println!("  {}", "─".repeat(66));

            let max_total = book.max_total();
            for level in book.asks.iter().take(ROWS).rev() {
                print_row(level, max_total, false);
            }

            let spread = match book.spread() {
                Some(spread) => format!("Spread: {}", with_separators(spread, 2)),
                None => "Waiting for book...".to_string(),
            };
            println!("  {:>14}  {}", "", spread.yellow());

            for level in book.bids.iter().take(ROWS) {
                print_row(level, max_total, true);
            }
        }
    }

    println!();
    let options: Vec<String> = view.grouping_options.iter().map(|g| g.to_string()).collect();
    let fault_action = if view.is_failed() {
        "[r] Reset Feed".yellow()
    } else {
        "[k] Kill Feed".red()
    };
    println!(
        "  {}  {}  {}  {}",
        "[t] Toggle Feed".cyan(),
        format!("[g] Group ({})", options.join(" / ")).cyan(),
        fault_action,
        "[q] Quit".dimmed()
    );
    if let Some(message) = message {
        println!("  {}", message.yellow());
    }
    println!("  {} {}", "Updated:".dimmed(), chrono::Local::now().format("%H:%M:%S%.3f"));
}

fn next_grouping(session: &OrderBookSession) -> GroupingIncrement {
    let options = session.product().grouping_options();
    let current = options.iter().position(|g| *g == session.grouping());
    match current {
        Some(i) => options[(i + 1) % options.len()],
        None => session.product().default_grouping(),
    }
}

async fn handle_action(session: &mut OrderBookSession, action: Action) -> Option<String> {
    match action {
        Action::Toggle => match session.toggle_feed() {
            Ok(product) => Some(format!("Switched to {}", product)),
            Err(e) => Some(e.to_string()),
        },
        Action::Group(value) => {
            let grouping = match value {
                Some(value) => match value.parse::<GroupingIncrement>() {
                    Ok(grouping) => grouping,
                    Err(e) => return Some(e.to_string()),
                },
                None => next_grouping(session),
            };
            session.set_grouping(grouping).err().map(|e| e.to_string())
        }
        Action::Kill => {
            if session.is_in_error_state() {
                Some("Feed already failed; press r to reset".to_string())
            } else {
                session.kill_feed();
                None
            }
        }
        Action::Reset => match session.reset_feed().await {
            Ok(()) => Some("Feed reset".to_string()),
            Err(e) => Some(e.to_string()),
        },
        Action::Quit => None,
        Action::Unknown(command) => Some(format!("Unknown command: {}", command)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = FeedConfig::from_env()?;
    let mut ticker = tokio::time::interval(config.flush_interval);
    let mut session = OrderBookSession::new(config);

    // A forced error shows the fallback; nothing else to do here
    let _ = session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut message: Option<String> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => render(&session.view(), message.as_deref()),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_action(&line) {
                    Some(Action::Quit) => break,
                    Some(action) => message = handle_action(&mut session, action).await,
                    None => {}
                }
                render(&session.view(), message.as_deref());
            }
        }
    }

    session.stop().await;
    println!("{}", "Order book closed".dimmed());
    Ok(())
}
