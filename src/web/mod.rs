// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web dashboard and JSON API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::classifier::CategoryScores;
use crate::report::category_counts;
use crate::session::Session;
use crate::store::DocumentRecord;
use crate::{DocsortError, Result};

/// Shared application state; actions are serialized through the lock
pub struct AppState {
    pub session: Mutex<Session>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(index_page))
        .route("/documents/:filename", get(document_page))
        .route("/search", get(search_page))
        // Actions
        .route("/analyze", post(analyze_action))
        .route("/correct", post(correct_action))
        .route("/organize", post(organize_action))
        // API endpoints
        .route("/api/results", get(api_get_results))
        .route("/api/results/:filename", get(api_get_result))
        .route("/api/categories", get(api_get_categories))
        .route("/api/search", get(api_search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for DocsortError {
    fn into_response(self) -> Response {
        let status = match &self {
            DocsortError::UnknownDocument(_) => StatusCode::NOT_FOUND,
            DocsortError::InvalidCategory(_) | DocsortError::Config(_) => StatusCode::BAD_REQUEST,
            DocsortError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Request failed: {}", self);
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

// === Page Handlers ===

async fn index_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_index(&session, None))
}

async fn document_page(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Html<String>> {
    let session = state.session.lock().await;
    let record = session.record(&filename)?;
    Ok(Html(render_document_page(&filename, record, &session.categories())))
}

async fn search_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Html<String> {
    let selected = selected_categories(params);
    let session = state.session.lock().await;
    let hits = session.search(&selected);
    Html(render_search_page(&selected, &hits, &session.categories()))
}

// === Action Handlers ===

#[derive(Deserialize)]
struct AnalyzeForm {
    threshold: f64,
}

async fn analyze_action(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AnalyzeForm>,
) -> Result<Html<String>> {
    let mut session = state.session.lock().await;
    let report = session.run_analysis(form.threshold).await?;
    let notice = format!(
        "Analyzed {} documents ({} unknown, {} failed) at threshold {:.2}.",
        report.analyzed, report.unknown, report.failed, form.threshold
    );
    Ok(Html(render_index(&session, Some(&notice))))
}

#[derive(Deserialize)]
struct CorrectForm {
    filename: String,
    category: String,
}

async fn correct_action(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CorrectForm>,
) -> Result<Html<String>> {
    let mut session = state.session.lock().await;
    session.correct(&form.filename, &form.category)?;
    let notice = format!("{} is now filed under {}.", form.filename, form.category);
    Ok(Html(render_index(&session, Some(&notice))))
}

#[derive(Deserialize)]
struct OrganizeForm {
    dry_run: Option<String>,
}

async fn organize_action(
    State(state): State<Arc<AppState>>,
    Form(form): Form<OrganizeForm>,
) -> Result<Html<String>> {
    let session = state.session.lock().await;
    let dry_run = form.dry_run.is_some();
    let report = session.organize(dry_run)?;

    let verb = if dry_run { "Would move" } else { "Moved" };
    let notice = format!(
        "{} {} documents, skipped {} no longer at their recorded path.",
        verb,
        report.moved.len(),
        report.skipped.len()
    );
    Ok(Html(render_index(&session, Some(&notice))))
}

// === API Handlers ===

async fn api_get_results(State(state): State<Arc<AppState>>) -> Json<crate::store::Results> {
    let session = state.session.lock().await;
    Json(session.results().clone())
}

async fn api_get_result(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<DocumentRecord>> {
    let session = state.session.lock().await;
    Ok(Json(session.record(&filename)?.clone()))
}

#[derive(Serialize)]
struct CategoryCount {
    name: String,
    documents: usize,
}

async fn api_get_categories(State(state): State<Arc<AppState>>) -> Json<Vec<CategoryCount>> {
    let session = state.session.lock().await;
    let counts = category_counts(session.results(), &session.categories())
        .into_iter()
        .map(|(name, documents)| CategoryCount { name, documents })
        .collect();
    Json(counts)
}

#[derive(Serialize)]
struct SearchHit {
    filename: String,
    #[serde(flatten)]
    record: DocumentRecord,
}

async fn api_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Vec<SearchHit>> {
    let selected = selected_categories(params);
    let session = state.session.lock().await;
    let hits = session
        .search(&selected)
        .into_iter()
        .map(|(filename, record)| SearchHit {
            filename: filename.to_string(),
            record: record.clone(),
        })
        .collect();
    Json(hits)
}

/// Repeated `category=` query parameters
fn selected_categories(params: Vec<(String, String)>) -> Vec<String> {
    params
        .into_iter()
        .filter(|(key, _)| key == "category")
        .map(|(_, value)| value)
        .collect()
}

// === Template Rendering ===

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a filename for use in a path segment
fn encode_segment(text: &str) -> String {
    let mut out = String::new();
    for b in text.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn base_template(title: &str, content: &str) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - docsort</title>
    <style>
        :root {{
            --bg-primary: #f5f3ee;
            --bg-card: #ffffff;
            --text-primary: #222222;
            --text-secondary: #666666;
            --accent: #2b6cb0;
            --bar: #38a169;
            --border: #dddddd;
        }}
        * {{ box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            margin: 0;
        }}
        .container {{ max-width: 1100px; margin: 0 auto; padding: 20px; }}
        nav {{ background: var(--accent); padding: 12px 20px; }}
        nav a {{ color: white; text-decoration: none; font-weight: bold; }}
        .card {{
            background: var(--bg-card);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 16px 20px;
            margin-bottom: 20px;
        }}
        .notice {{ border-left: 4px solid var(--bar); }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 8px; text-align: left; border-bottom: 1px solid var(--border); }}
        th {{ color: var(--text-secondary); font-weight: 500; }}
        .score {{ color: var(--text-secondary); }}
        .bar-row {{ display: grid; grid-template-columns: 220px 1fr 60px; gap: 10px; align-items: center; margin: 6px 0; }}
        .bar {{ background: var(--bg-primary); height: 14px; border-radius: 3px; overflow: hidden; }}
        .bar-fill {{ background: var(--bar); height: 100%; }}
        .checks label {{ display: inline-block; margin-right: 14px; }}
    </style>
</head>
<body>
    <nav><a href="/">docsort</a></nav>
    <main class="container">
        {}
    </main>
</body>
</html>"#, escape_html(title), content)
}

fn render_categories_cell(scores: &CategoryScores) -> String {
    scores
        .iter()
        .map(|(label, score)| {
            format!(r#"{} <span class="score">({:.2})</span>"#, escape_html(label), score)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_results_table<'a>(rows: impl IntoIterator<Item = (&'a str, &'a DocumentRecord)>) -> String {
    let rows: String = rows
        .into_iter()
        .map(|(name, record)| {
            format!(
                r#"<tr><td><a href="/documents/{}">{}</a></td><td>{}</td></tr>"#,
                encode_segment(name),
                escape_html(name),
                render_categories_cell(&record.categories)
            )
        })
        .collect();

    if rows.is_empty() {
        return "<p>No documents yet.</p>".to_string();
    }

    format!(
        r#"<table>
            <tr><th>Document</th><th>Categories</th></tr>
            {}
        </table>"#,
        rows
    )
}

fn render_category_checks(categories: &[String], selected: &[String]) -> String {
    categories
        .iter()
        .map(|c| {
            let checked = if selected.contains(c) { " checked" } else { "" };
            format!(
                r#"<label><input type="checkbox" name="category" value="{0}"{1}> {0}</label>"#,
                escape_html(c),
                checked
            )
        })
        .collect()
}

fn render_index(session: &Session, notice: Option<&str>) -> String {
    let notice_html = notice
        .map(|n| format!(r#"<div class="card notice">{}</div>"#, escape_html(n)))
        .unwrap_or_default();
    let threshold = session.config().classifier.threshold;

    let content = format!(r#"
        <h1>Documents</h1>
        {}
        <div class="card">
            <h2>Analyze</h2>
            <form method="post" action="/analyze">
                <label>Threshold
                    <input type="range" name="threshold" min="0" max="1" step="0.05" value="{:.2}"
                        oninput="this.nextElementSibling.value = Number(this.value).toFixed(2)">
                    <output>{:.2}</output>
                </label>
                <button type="submit">Run analysis</button>
            </form>
        </div>
        <div class="card">
            <h2>Results</h2>
            {}
        </div>
        <div class="card">
            <h2>Search by category</h2>
            <form method="get" action="/search" class="checks">
                {}
                <button type="submit">Search</button>
            </form>
        </div>
        <div class="card">
            <h2>Organize</h2>
            <p>Move each document still in {} into its dominant category under {}.</p>
            <form method="post" action="/organize">
                <label><input type="checkbox" name="dry_run" value="1"> Dry run</label>
                <button type="submit">Organize files</button>
            </form>
        </div>
    "#,
        notice_html,
        threshold,
        threshold,
        render_results_table(session.results().iter()),
        render_category_checks(&session.categories(), &[]),
        escape_html(&session.config().source_dir),
        escape_html(&session.config().dest_dir),
    );

    base_template("Documents", &content)
}

fn render_document_page(filename: &str, record: &DocumentRecord, categories: &[String]) -> String {
    let bars: String = record
        .categories
        .sorted_desc()
        .into_iter()
        .map(|(label, score)| {
            let pct = (score.clamp(0.0, 1.0) * 100.0).round() as u32;
            format!(
                r#"<div class="bar-row"><span>{}</span><div class="bar"><div class="bar-fill" style="width: {}%"></div></div><span>{:.2}</span></div>"#,
                escape_html(label),
                pct,
                score
            )
        })
        .collect();

    let dominant = record.dominant_category().unwrap_or_default();
    let options: String = categories
        .iter()
        .map(|c| {
            let selected = if c == dominant { " selected" } else { "" };
            format!(r#"<option value="{0}"{1}>{0}</option>"#, escape_html(c), selected)
        })
        .collect();

    let content = format!(r#"
        <h1>{}</h1>
        <div class="card">
            <h2>Scores</h2>
            {}
            <p class="score">Path: {}</p>
        </div>
        <div class="card">
            <h2>Correct</h2>
            <form method="post" action="/correct">
                <input type="hidden" name="filename" value="{}">
                <select name="category">{}</select>
                <button type="submit">Save</button>
            </form>
        </div>
    "#,
        escape_html(filename),
        bars,
        escape_html(&record.path.to_string_lossy()),
        escape_html(filename),
        options,
    );

    base_template(filename, &content)
}

fn render_search_page(selected: &[String], hits: &[(&str, &DocumentRecord)], categories: &[String]) -> String {
    let content = format!(r#"
        <h1>Search</h1>
        <div class="card">
            <form method="get" action="/search" class="checks">
                {}
                <button type="submit">Search</button>
            </form>
        </div>
        <div class="card">
            <h2>{} documents</h2>
            {}
        </div>
    "#,
        render_category_checks(categories, selected),
        hits.len(),
        render_results_table(hits.iter().copied()),
    );

    base_template("Search", &content)
}

/// Start the web server for an opened session
pub async fn start_server(session: Session) -> Result<()> {
    let addr = format!("{}:{}", session.config().web.host, session.config().web.port);
    let state = Arc::new(AppState::new(session));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web UI available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| DocsortError::Server(e.to_string()))?;

    Ok(())
}
