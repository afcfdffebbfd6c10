mod app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::{truncate, AppState, ConnectionStatus, DetailView};
use listing_assist::config::{AssistConfig, HTTP_TIMEOUT_SECS};
use listing_assist::fill::{FillOptions, HttpImageSource};
use listing_assist::messaging::{send_with_reinject, ContentScript, PageTransport, Request};
use listing_assist::page::{HostPage, WebDriverPage};
use listing_assist::popup::{self, Notice, Tone};

type Browser = PageTransport<WebDriverPage, HttpImageSource>;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = match AssistConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // The terminal belongs to the UI; logs only go to a file.
    if let Some(path) = &cfg.log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(level))
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(cfg.api_url.clone());

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(if app.products.is_empty() { None } else { Some(0) });

    let mut browser: Option<Browser> = None;
    let result = run_loop(&mut terminal, &mut app, &client, &cfg, &mut browser, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(b) = browser.take() {
        if let Err(e) = b.into_script().into_page().close().await {
            warn!("closing the browser session failed: {e}");
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    cfg: &AssistConfig,
    browser: &mut Option<Browser>,
    table_state: &mut TableState,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                app.refresh(client).await;
                let keep = table_state.selected().filter(|i| *i < app.products.len());
                table_state.select(keep.or(if app.products.is_empty() { None } else { Some(0) }));
                app.detail = DetailView::Images;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = app.products.len().saturating_sub(1);
                let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                table_state.select(Some(next));
                app.detail = DetailView::Images;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let prev = table_state.selected().map_or(0, |i| i.saturating_sub(1));
                table_state.select(Some(prev));
                app.detail = DetailView::Images;
            }
            KeyCode::Enter | KeyCode::Char('f') => {
                let Some(product) = app.product(table_state.selected()).cloned() else {
                    app.notice = Some(Notice::error("select a product first"));
                    continue;
                };
                app.notice = Some(Notice::info(format!(
                    "filling the form with {}…",
                    popup::display_name(&product)
                )));
                terminal.draw(|f| render(f, app, table_state))?;
                info!(product_id = %product.id, "sending product to the listing page");
                deliver(app, browser, cfg, Request::FillForm { product }).await;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                app.notice = Some(Notice::info("scanning the listing form…"));
                terminal.draw(|f| render(f, app, table_state))?;
                deliver(app, browser, cfg, Request::ScanForm {}).await;
            }
            KeyCode::Char('o') | KeyCode::Char('O') => match session(browser, cfg).await {
                Ok(b) => {
                    app.browser_connected = true;
                    if let Err(e) = b.script().page().goto(&cfg.host_page_prefix).await {
                        app.notice = Some(Notice::error(e.to_string()));
                    }
                }
                Err(n) => app.notice = Some(n),
            },
            _ => {}
        }
    }
}

/// Starts the WebDriver session on first use.
async fn session<'a>(slot: &'a mut Option<Browser>, cfg: &AssistConfig) -> Result<&'a mut Browser, Notice> {
    if slot.is_none() {
        let page = WebDriverPage::connect(&cfg.webdriver_url)
            .await
            .map_err(|e| Notice::error(format!("cannot start the browser session: {e}")))?;
        let images = HttpImageSource::new().map_err(|e| Notice::error(e.to_string()))?;
        let options = FillOptions { settle: cfg.settle_delay, now: None };
        *slot = Some(PageTransport::new(ContentScript::new(page, images, options)));
    }
    slot.as_mut()
        .ok_or_else(|| Notice::error("browser session unavailable"))
}

async fn deliver(app: &mut AppState, slot: &mut Option<Browser>, cfg: &AssistConfig, request: Request) {
    let browser = match session(slot, cfg).await {
        Ok(b) => b,
        Err(n) => {
            app.notice = Some(n);
            return;
        }
    };
    app.browser_connected = true;

    let url = browser.script().page().url().await.ok();
    if let Err(n) = popup::check_host_tab(url.as_deref(), &cfg.host_page_prefix) {
        app.notice = Some(n);
        return;
    }

    let result = send_with_reinject(browser, &request, cfg.reinject_delay).await;
    app.apply_delivery(result);
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // notice
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, table_state, chunks[1]);
    render_notice(f, app, chunks[2]);
    render_footer(f, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● dashboard".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };
    let (browser_text, browser_color) = if app.browser_connected {
        ("● browser", Color::Green)
    } else {
        ("○ browser", Color::DarkGray)
    };

    let title_spans = vec![
        Span::styled(
            " Listing Assistant  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(browser_text, Style::default().fg(browser_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} unlisted", app.products.len()),
            Style::default().fg(Color::White),
        ),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, table_state: &mut TableState, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_products_table(f, app, table_state, halves[0]);
    match &app.detail {
        DetailView::Images => render_images(f, app, table_state.selected(), halves[1]),
        DetailView::Scan { url, elements } => render_scan(f, url, elements, halves[1]),
    }
}

fn pane(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    Row::new(cells).height(1)
}

fn render_products_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .products
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let images = if p.images.is_empty() {
                "—".to_string()
            } else {
                p.images.len().to_string()
            };
            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(popup::display_name(p), 30)),
                Cell::from(popup::product_meta(p)).style(Style::default().fg(Color::Green)),
                Cell::from(images).style(Style::default().fg(Color::Cyan)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(24),
            Constraint::Length(4),
        ],
    )
    .header(header_row(&["#", "Product", "Price · Condition", "Img"]))
    .block(pane(" UNLISTED PRODUCTS "))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn render_images(f: &mut Frame, app: &AppState, selected: Option<usize>, area: Rect) {
    let lines: Vec<Line> = match app.product(selected) {
        None => vec![Line::from(Span::styled(
            "no product selected",
            Style::default().fg(Color::DarkGray),
        ))],
        Some(p) if p.images.is_empty() => vec![Line::from(Span::styled(
            "no images",
            Style::default().fg(Color::DarkGray),
        ))],
        Some(p) => p
            .images
            .iter()
            .enumerate()
            .map(|(i, url)| {
                Line::from(vec![
                    Span::styled(format!("{:>2} ", i + 1), Style::default().fg(Color::DarkGray)),
                    Span::raw(url.as_str()),
                ])
            })
            .collect(),
    };
    f.render_widget(Paragraph::new(lines).block(pane(" IMAGE URLS ")), area);
}

fn render_scan(f: &mut Frame, url: &str, elements: &[listing_assist::page::ScannedElement], area: Rect) {
    let rows: Vec<Row> = elements
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(e.tag.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(e.input_type.clone()),
                Cell::from(truncate(&e.name, 20)).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(&e.id, 20)),
                Cell::from(e.label.clone()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let title = format!(" FORM SCAN {} ", truncate(url, 40));
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Tag", "Type", "Name", "Id", "Label"]))
    .block(pane(&title));

    f.render_widget(table, area);
}

fn render_notice(f: &mut Frame, app: &AppState, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let color = match notice.tone {
        Tone::Info => Color::White,
        Tone::Success => Color::Green,
        Tone::Error => Color::Red,
    };
    f.render_widget(
        Paragraph::new(Span::styled(format!(" {}", notice.text), Style::default().fg(color))),
        area,
    );
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select  "),
        Span::styled("[enter] ", Style::default().fg(Color::Yellow)),
        Span::raw("fill form  "),
        Span::styled("[s] ", Style::default().fg(Color::Yellow)),
        Span::raw("scan form  "),
        Span::styled("[o] ", Style::default().fg(Color::Yellow)),
        Span::raw("open listing site"),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
