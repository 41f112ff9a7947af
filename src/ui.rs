use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use nft_mint_session::{
    ActionKind,
    Role,
    SessionState,
    SessionUpdate,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhitelistOp {
    Add,
    Remove,
    Check,
}

impl WhitelistOp {
    fn title(self) -> &'static str {
        match self {
            WhitelistOp::Add => "Add to Whitelist",
            WhitelistOp::Remove => "Remove from Whitelist",
            WhitelistOp::Check => "Check Whitelist",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Connect,
    Disconnect,
    SwitchAccount,
    LockWallet,
    Refresh,
    Mint(u64),
    TogglePublicMint,
    ToggleWhitelistMint,
    Whitelist(WhitelistOp, String),
}

/// Static facts about the session shown alongside each update.
pub struct Header<'a> {
    pub network: &'a str,
    pub contract_id: &'a str,
    pub accounts: usize,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    MintModal {
        amount: u64,
    },
    AddressModal {
        op: WhitelistOp,
        input: String,
    },
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Forward terminal events from a blocking reader thread so the app loop can
/// `select!` on them next to network work.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while let Ok(ev) = event::read() {
            if tx.send(ev).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(rx: &mut InputEventReceiver) -> Result<Event> {
    rx.recv()
        .await
        .ok_or_else(|| eyre!("terminal input stream closed"))
}

pub fn draw(state: &mut UiState, header: &Header<'_>, update: &SessionUpdate) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, header, update))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(key) = event else {
        return match event {
            Event::Resize(..) => Some(UserEvent::Redraw),
            _ => None,
        };
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::Normal => normal_key(state, key),
        Mode::MintModal { amount } => match key.code {
            KeyCode::Esc => close(state),
            KeyCode::Enter => {
                let amount = *amount;
                state.mode = Mode::Normal;
                Some(UserEvent::Mint(amount))
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('+') => {
                *amount = amount.saturating_add(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('-') => {
                *amount = amount.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                *amount /= 10;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                let d = c.to_digit(10)?;
                *amount = amount.saturating_mul(10).saturating_add(u64::from(d));
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::AddressModal { op, input } => match key.code {
            KeyCode::Esc => close(state),
            KeyCode::Enter => {
                let event = UserEvent::Whitelist(*op, input.trim().to_string());
                state.mode = Mode::Normal;
                Some(event)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_hexdigit() || c == 'x' || c == 'X' => {
                if input.len() < 66 {
                    input.push(c);
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => close(state),
            _ => None,
        },
    }
}

fn close(state: &mut UiState) -> Option<UserEvent> {
    state.mode = Mode::Normal;
    Some(UserEvent::Redraw)
}

fn open(state: &mut UiState, mode: Mode) -> Option<UserEvent> {
    state.mode = mode;
    Some(UserEvent::Redraw)
}

fn normal_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    let address_modal = |op| Mode::AddressModal {
        op,
        input: String::from("0x"),
    };
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => open(state, Mode::QuitModal),
        KeyCode::Char('c') => Some(UserEvent::Connect),
        KeyCode::Char('d') => Some(UserEvent::Disconnect),
        KeyCode::Char('s') => Some(UserEvent::SwitchAccount),
        KeyCode::Char('l') => Some(UserEvent::LockWallet),
        KeyCode::Char('f') => Some(UserEvent::Refresh),
        KeyCode::Char('m') => open(state, Mode::MintModal { amount: 1 }),
        KeyCode::Char('p') => Some(UserEvent::TogglePublicMint),
        KeyCode::Char('w') => Some(UserEvent::ToggleWhitelistMint),
        KeyCode::Char('a') => open(state, address_modal(WhitelistOp::Add)),
        KeyCode::Char('r') => open(state, address_modal(WhitelistOp::Remove)),
        KeyCode::Char('i') => open(state, address_modal(WhitelistOp::Check)),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, header: &Header<'_>, update: &SessionUpdate) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // wallet
            Constraint::Length(4), // collection
            Constraint::Min(5),    // pending
            Constraint::Length(5), // status
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], header, update);
    draw_collection_panel(f, chunks[1], update);
    draw_pending_panel(f, chunks[2], update);
    draw_status_panel(f, chunks[3], update);
    draw_help(f, chunks[4], update);
    draw_modals(f, state);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, header: &Header<'_>, update: &SessionUpdate) {
    let account = match &update.identity {
        Some(identity) => format!("{} (chain {})", identity.address.short(), identity.chain_id),
        None => String::from("not connected"),
    };
    let state = match update.state {
        SessionState::Disconnected => "Disconnected",
        SessionState::Connecting => "Connecting",
        SessionState::Connected => "Connected",
        SessionState::Submitting => "Submitting",
        SessionState::Confirming => "Confirming",
    };
    let lines = vec![
        Line::from(format!(
            "Account: {account} | Role: {} | {state}",
            update.role
        )),
        Line::from(format!(
            "Network: {} | Contract: {} | Unlocked accounts: {}",
            header.network, header.contract_id, header.accounts
        )),
    ];
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn open_closed(open: bool) -> Span<'static> {
    if open {
        Span::styled("open", Style::default().fg(Color::Green))
    } else {
        Span::styled("closed", Style::default().fg(Color::DarkGray))
    }
}

fn draw_collection_panel(f: &mut Frame, area: Rect, update: &SessionUpdate) {
    let lines = match &update.snapshot {
        Some(snap) => vec![
            Line::from(format!(
                "Minted: {} / {} | Remaining: {}",
                snap.total_minted(),
                snap.max_supply(),
                snap.remaining()
            )),
            Line::from(vec![
                Span::raw("Public mint: "),
                open_closed(snap.public_mint_open()),
                Span::raw(" | Whitelist mint: "),
                open_closed(snap.whitelist_mint_open()),
            ]),
        ],
        None => vec![Line::from("No contract state loaded")],
    };
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Collection"));
    f.render_widget(widget, area);
}

fn draw_pending_panel(f: &mut Frame, area: Rect, update: &SessionUpdate) {
    let mut lines: Vec<Line> = Vec::new();
    for kind in &update.busy {
        match update.pending.iter().find(|p| p.kind == *kind) {
            Some(tx) => lines.push(Line::from(format!(
                "{} {:<24} {} confirming",
                tx.submitted_at.format("%H:%M:%S"),
                tx.kind.to_string(),
                tx.hash_preview()
            ))),
            None => lines.push(Line::from(format!(
                "         {:<24} waiting for signature",
                kind.to_string()
            ))),
        }
    }
    if lines.is_empty() {
        lines.push(Line::from("No transactions in flight"));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Transactions"));
    f.render_widget(widget, area);
}

fn draw_status_panel(f: &mut Frame, area: Rect, update: &SessionUpdate) {
    let widget = match &update.last_error {
        None => Paragraph::new(if update.status.trim().is_empty() {
            "Ready".to_string()
        } else {
            update.status.clone()
        })
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(Style::default().fg(Color::Green)),
        Some(err) => {
            let hint = if err.is_observability_failure() {
                " (press f to retry)"
            } else {
                ""
            };
            Paragraph::new(format!("{}{hint}", update.status))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Error"))
                .style(Style::default().fg(Color::Red))
        }
    };
    f.render_widget(widget, area);
}

fn key_hint(label: &'static str, kind: ActionKind, update: &SessionUpdate) -> Span<'static> {
    if update.busy.contains(&kind) {
        Span::styled(label, Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(label)
    }
}

fn draw_help(f: &mut Frame, area: Rect, update: &SessionUpdate) {
    let mut spans = vec![Span::raw(
        "c connect | d disconnect | s switch | l lock | f refresh | ",
    )];
    spans.push(key_hint("m mint", ActionKind::Mint, update));
    spans.push(Span::raw(" | i check"));
    if update.role == Role::Owner {
        spans.push(Span::raw(" | "));
        spans.push(key_hint("p public", ActionKind::TogglePublicMint, update));
        spans.push(Span::raw(" | "));
        spans.push(key_hint("w whitelist", ActionKind::ToggleWhitelistMint, update));
        spans.push(Span::raw(" | "));
        spans.push(key_hint("a add", ActionKind::AddToWhitelist, update));
        spans.push(Span::raw(" | "));
        spans.push(key_hint("r remove", ActionKind::RemoveFromWhitelist, update));
    }
    spans.push(Span::raw(" | q quit"));
    let help = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    let (title, body, w, h) = match &state.mode {
        Mode::Normal => return,
        Mode::MintModal { amount } => (
            "Mint",
            format!("Amount: {amount}\nEnter=confirm Esc=cancel +/- or digits to edit"),
            40,
            30,
        ),
        Mode::AddressModal { op, input } => (
            op.title(),
            format!("Address: {input}\nEnter=confirm Esc=cancel"),
            80,
            25,
        ),
        Mode::QuitModal => ("Confirm Quit", String::from("Quit? (Y/N)"), 40, 20),
    };
    let area = centered_rect(w, h, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(body).wrap(Wrap { trim: false }), block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_keys(state: &mut UiState, keys: &str) -> Option<UserEvent> {
        let mut last = None;
        for c in keys.chars() {
            last = interpret_event(state, press(KeyCode::Char(c)));
        }
        last
    }

    #[test]
    fn interpret_event__mint_modal_collects_digits() {
        // given
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char('m')));

        // when
        interpret_event(&mut state, press(KeyCode::Backspace));
        type_keys(&mut state, "12");
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(event, Some(UserEvent::Mint(12)));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__mint_modal_can_submit_zero() {
        // given
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char('m')));

        // when
        interpret_event(&mut state, press(KeyCode::Down));
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(event, Some(UserEvent::Mint(0)));
    }

    #[test]
    fn interpret_event__address_modal_yields_typed_address() {
        // given
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char('a')));
        let hex = "ab".repeat(32);

        // when
        type_keys(&mut state, &hex);
        type_keys(&mut state, "zz");
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(
            event,
            Some(UserEvent::Whitelist(WhitelistOp::Add, format!("0x{hex}")))
        );
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        // given
        let mut state = UiState::default();

        // when
        let first = interpret_event(&mut state, press(KeyCode::Char('q')));
        let cancel = interpret_event(&mut state, press(KeyCode::Char('n')));
        interpret_event(&mut state, press(KeyCode::Char('q')));
        let confirm = interpret_event(&mut state, press(KeyCode::Char('y')));

        // then
        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(cancel, Some(UserEvent::Redraw));
        assert_eq!(confirm, Some(UserEvent::Quit));
    }

    #[test]
    fn interpret_event__ignores_key_release() {
        // given
        let mut state = UiState::default();
        let mut release = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;

        // when
        let event = interpret_event(&mut state, Event::Key(release));

        // then
        assert_eq!(event, None);
    }
}
