//! Presentation adapters.
//!
//! A [`Presenter`] receives immutable [`ViewSnapshot`]s and owns all output.
//! The terminal presenter renders incrementally: it remembers what it has
//! already printed and only writes what changed since the last snapshot.

use std::collections::HashMap;
use std::io::{self, Write};

use serde_json::Value;

use crate::history::{Citation, Exchange, ExchangeId, ExchangeState};
use crate::state::{Health, ViewSnapshot};

/// Placeholder shown while an exchange is pending.
pub const THINKING: &str = "Thinking…";

pub trait Presenter {
    fn render(&mut self, snapshot: &ViewSnapshot) -> io::Result<()>;

    /// Show the whole conversation again.
    fn replay(&mut self, snapshot: &ViewSnapshot) -> io::Result<()> {
        self.render(snapshot)
    }
}

/// Line-oriented presenter for terminals and pipes.
pub struct TerminalPresenter<W: Write> {
    out: W,
    printed: HashMap<ExchangeId, ExchangeState>,
    health: Option<Health>,
    stats: Option<Value>,
    upload_status: Option<String>,
    last_notice: u64,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashMap::new(),
            health: None,
            stats: None,
            upload_status: None,
            last_notice: 0,
        }
    }

    fn render_exchange(&mut self, exchange: &Exchange) -> io::Result<()> {
        let state = exchange.state();
        match self.printed.get(&exchange.id()) {
            Some(printed) if *printed == state => return Ok(()),
            Some(_) => {}
            None => writeln!(self.out, "you> {}", exchange.question())?,
        }
        write_reply(&mut self.out, exchange)?;

        self.printed.insert(exchange.id(), state);
        Ok(())
    }
}

fn write_reply(out: &mut impl Write, exchange: &Exchange) -> io::Result<()> {
    match exchange.answer() {
        Some(answer) if exchange.state().is_terminal() => {
            let mut lines = answer.lines();
            let first = lines.next().unwrap_or_default();
            writeln!(out, "copilot> {first}")?;
            for line in lines {
                writeln!(out, "         {line}")?;
            }
            if !exchange.sources().is_empty() {
                writeln!(out, "  sources: {}", source_line(exchange.sources()))?;
            }
            Ok(())
        }
        _ => writeln!(out, "copilot> {THINKING}"),
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render(&mut self, snapshot: &ViewSnapshot) -> io::Result<()> {
        if self.health != Some(snapshot.health) {
            // Unknown means never checked; nothing to report yet.
            if snapshot.health != Health::Unknown {
                writeln!(self.out, "[health] {}", snapshot.health)?;
            }
            self.health = Some(snapshot.health);
        }

        if snapshot.stats.is_some() && self.stats != snapshot.stats {
            if let Some(stats) = &snapshot.stats {
                let pretty = serde_json::to_string_pretty(stats).map_err(io::Error::other)?;
                writeln!(self.out, "[stats] {pretty}")?;
            }
            self.stats = snapshot.stats.clone();
        }

        if self.upload_status != snapshot.upload_status {
            if let Some(status) = &snapshot.upload_status {
                writeln!(self.out, "[upload] {status}")?;
            }
            self.upload_status = snapshot.upload_status.clone();
        }

        for exchange in &snapshot.exchanges {
            self.render_exchange(exchange)?;
        }
        // Forget evicted exchanges so the map stays bounded.
        self.printed
            .retain(|id, _| snapshot.exchanges.iter().any(|e| e.id() == *id));

        let seen = self.last_notice;
        for notice in snapshot.notices.iter().filter(|n| n.id > seen) {
            writeln!(self.out, "[{}] {}", notice.severity, notice.message)?;
            self.last_notice = notice.id;
        }

        self.out.flush()
    }

    /// Reprint every retained exchange. Status lines and notices are left alone.
    fn replay(&mut self, snapshot: &ViewSnapshot) -> io::Result<()> {
        for exchange in &snapshot.exchanges {
            writeln!(self.out, "you> {}", exchange.question())?;
            write_reply(&mut self.out, exchange)?;
            self.printed.insert(exchange.id(), exchange.state());
        }
        self.out.flush()
    }
}

/// Presenter that writes every snapshot as pretty JSON.
pub struct JsonPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn render(&mut self, snapshot: &ViewSnapshot) -> io::Result<()> {
        let json = serde_json::to_string_pretty(snapshot).map_err(io::Error::other)?;
        writeln!(self.out, "{json}")?;
        self.out.flush()
    }
}

/// `[#label score] name` chips, space separated.
pub fn source_line(sources: &[Citation]) -> String {
    sources
        .iter()
        .map(|citation| {
            let chip = format!("[#{} {}]", citation.label, citation.score_label());
            match &citation.source_name {
                Some(name) => format!("{chip} {name}"),
                None => chip,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
