//! Test fixtures and fake implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_ladder::challenge::PageFetcher;
use bridge_ladder::error::{LadderError, Result};
use bridge_ladder::types::{BoardResult, MatchReport, ScoringMethod};
use reqwest::Url;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const TRUSTED_HOST: &str = "webutil.bridgebase.com";

pub fn matchlink(id: u32) -> String {
    format!("https://{}/v2/mh_friend.php?id={}", TRUSTED_HOST, id)
}

/// Page fetcher serving a fixed document and counting every fetch
#[derive(Debug)]
pub struct CountingFetcher {
    document: Option<String>,
    fetches: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl CountingFetcher {
    pub fn serving(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            fetches: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// A fetcher whose every fetch fails
    pub fn failing() -> Self {
        Self {
            document: None,
            fetches: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.urls.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for CountingFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        match &self.document {
            Some(document) => Ok(document.clone()),
            None => Err(LadderError::FetchFailed {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }
            .into()),
        }
    }
}

pub fn board(
    number: u32,
    hero_match_score: Option<f64>,
    villain_match_score: Option<f64>,
) -> BoardResult {
    BoardResult {
        number,
        hero_play_record: format!("handviewer.html?lin=pn|north|md|{}|", number),
        hero_contract_result: "4S N =".to_string(),
        hero_raw_score: 620,
        hero_match_score,
        villain_play_record: format!("handviewer.html?lin=pn|south|md|{}|", number),
        villain_contract_result: "4S N -1".to_string(),
        villain_raw_score: -100,
        villain_match_score,
    }
}

pub fn sample_report() -> MatchReport {
    MatchReport {
        scoring_method: ScoringMethod::Imps,
        hero_id: "north_star".to_string(),
        villain_id: "south_paw".to_string(),
        boards: vec![
            board(1, Some(12.0), None),
            board(2, None, Some(3.0)),
            board(3, None, None),
        ],
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn score(value: Option<f64>, method: ScoringMethod) -> String {
    match (value, method) {
        (None, _) => String::new(),
        (Some(value), ScoringMethod::Imps) => format!("{}", value as i64),
        (Some(value), ScoringMethod::MatchPoints) => format!("{}", value),
    }
}

/// Render a report the way the results host lays out a friend challenge page
pub fn render_report(report: &MatchReport) -> String {
    let mut rows = String::new();
    for (index, board) in report.boards.iter().enumerate() {
        let parity = if index % 2 == 0 { "odd" } else { "even" };
        rows.push_str(&format!(
            concat!(
                "<tr class=\"{parity}\">\n",
                "  <td>{number}</td>\n",
                "  <td><a href=\"{hero_play}\" target=\"_blank\">{hero_contract}</a></td>\n",
                "  <td>{hero_raw}</td>\n",
                "  <td><b>{hero_score}</b></td>\n",
                "  <td>{villain_score}</td>\n",
                "  <td><a href=\"{villain_play}\" target=\"_blank\">{villain_contract}</a></td>\n",
                "  <td>{villain_raw}</td>\n",
                "</tr>\n"
            ),
            parity = parity,
            number = board.number,
            hero_play = escape(&board.hero_play_record),
            hero_contract = escape(&board.hero_contract_result),
            hero_raw = board.hero_raw_score,
            hero_score = score(board.hero_match_score, report.scoring_method),
            villain_score = score(board.villain_match_score, report.scoring_method),
            villain_play = escape(&board.villain_play_record),
            villain_contract = escape(&board.villain_contract_result),
            villain_raw = board.villain_raw_score,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Friend challenge</title>
  <script>var total = 1 < 2;</script>
</head>
<body>
  <div class="bbo_content">
    <div class="handrecords">
      <h1><span class="username">{hero}</span> vs <span class="username">{villain}</span></h1>
      <p class="final_score">Final score ({method})</p>
      <table class="body">
        <tr><th>Board</th><th>{hero}</th><th>Score</th><th>IMPs</th><th>IMPs</th><th>{villain}</th><th>Score</th></tr>
{rows}      </table>
      <br>
    </div>
  </div>
</body>
</html>
"#,
        hero = escape(&report.hero_id),
        villain = escape(&report.villain_id),
        method = report.scoring_method,
        rows = rows,
    )
}
