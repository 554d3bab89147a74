//! Friend challenge results parser
//!
//! Consumes the markup event stream of a results page and tracks a single
//! context label per open element. Only a handful of labelled regions carry
//! data: the results container, its alternating board rows and their cells,
//! the two user name spans and the final score span.

use crate::challenge::markup::{is_void_element, MarkupEvent, MarkupTokenizer};
use crate::error::{LadderError, Result};
use crate::types::{BoardResult, CompetitorId, MatchReport, ScoringMethod};
use crate::utils::normalize_whitespace;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

const CONTAINER_CLASS: &str = "handrecords";
const ODD_ROW_CLASS: &str = "odd";
const EVEN_ROW_CLASS: &str = "even";
const DISPLAY_NAME_CLASS: &str = "username";
const FINAL_SCORE_CLASS: &str = "final_score";

/// Which side of the table a column belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Hero,
    Villain,
}

/// Meaning of one value of a board row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    BoardNumber,
    PlayRecord(Side),
    ContractResult(Side),
    RawScore(Side),
    MatchScore(Side),
}

impl ColumnRole {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnRole::BoardNumber | ColumnRole::RawScore(_) | ColumnRole::MatchScore(_)
        )
    }
}

/// Layout of a board row: the board number followed by eight board columns.
/// A cell holding a play record link yields two values, the link target and
/// then the contract result text.
pub const BOARD_COLUMNS: [ColumnRole; 9] = [
    ColumnRole::BoardNumber,
    ColumnRole::PlayRecord(Side::Hero),
    ColumnRole::ContractResult(Side::Hero),
    ColumnRole::RawScore(Side::Hero),
    ColumnRole::MatchScore(Side::Hero),
    ColumnRole::MatchScore(Side::Villain),
    ColumnRole::PlayRecord(Side::Villain),
    ColumnRole::ContractResult(Side::Villain),
    ColumnRole::RawScore(Side::Villain),
];

/// Board columns expected after the board number
pub const EXPECTED_BOARD_COLUMNS: usize = BOARD_COLUMNS.len() - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowParity {
    Odd,
    Even,
}

/// Context label of an open element, innermost recognized marker wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Outside,
    Container,
    Row(RowParity),
    Cell,
    DisplayName,
    FinalScore,
}

impl Context {
    /// Context of a newly opened element nested in `self`
    fn refine(self, event: &MarkupEvent, name: &str) -> Context {
        match self {
            Context::Outside if event.has_class(CONTAINER_CLASS) => Context::Container,
            Context::Container => {
                if event.has_class(ODD_ROW_CLASS) {
                    Context::Row(RowParity::Odd)
                } else if event.has_class(EVEN_ROW_CLASS) {
                    Context::Row(RowParity::Even)
                } else if event.has_class(DISPLAY_NAME_CLASS) {
                    Context::DisplayName
                } else if event.has_class(FINAL_SCORE_CLASS) {
                    Context::FinalScore
                } else {
                    self
                }
            }
            Context::Row(_) if name == "td" => Context::Cell,
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    context: Context,
    /// Whether this element introduced its context rather than inheriting it
    opens: bool,
}

/// Typed value of one board row column
#[derive(Debug, Clone, PartialEq)]
enum ColumnValue {
    Text(String),
    Integer(i64),
    Score(Option<f64>),
}

fn scoring_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([^()]+)\)").expect("scoring token pattern is valid"))
}

/// Stateful parser fed one markup event at a time
#[derive(Debug, Default)]
pub struct ChallengeParser {
    stack: Vec<Frame>,
    saw_container: bool,
    /// Display names in order of appearance: hero first, then villain
    names: Vec<CompetitorId>,
    scoring_method: Option<ScoringMethod>,
    name_buffer: String,
    cell_text: Option<String>,
    row: Vec<ColumnValue>,
    boards: Vec<BoardResult>,
}

impl ChallengeParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Context {
        self.stack
            .last()
            .map(|frame| frame.context)
            .unwrap_or(Context::Outside)
    }

    /// Feed one event into the state machine
    pub fn feed(&mut self, event: MarkupEvent) -> Result<()> {
        match &event {
            MarkupEvent::StartTag {
                name, self_closing, ..
            } => self.open(&event, name, *self_closing),
            MarkupEvent::EndTag { .. } => self.close(),
            MarkupEvent::Text(text) => self.text(text),
        }
    }

    fn open(&mut self, event: &MarkupEvent, name: &str, self_closing: bool) -> Result<()> {
        let parent = self.current();
        let context = parent.refine(event, name);

        if context == Context::Cell && name == "a" {
            let target = event.attribute("href").unwrap_or_default().to_string();
            self.push_value(target)?;
        }

        if self_closing || is_void_element(name) {
            return Ok(());
        }

        let opens = context != parent;
        match context {
            Context::Container if opens => self.saw_container = true,
            Context::Row(_) if opens => self.row.clear(),
            Context::Cell if opens => self.cell_text = None,
            Context::DisplayName if opens => self.name_buffer.clear(),
            _ => {}
        }
        self.stack.push(Frame { context, opens });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Stray closing tags are tolerated
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        if !frame.opens {
            return Ok(());
        }

        match frame.context {
            Context::Cell => {
                let value = self.cell_text.take().unwrap_or_default();
                self.push_value(value)
            }
            Context::Row(_) => self.finish_row(),
            Context::DisplayName => {
                let name = normalize_whitespace(&self.name_buffer);
                self.name_buffer.clear();
                if !name.is_empty() {
                    self.names.push(name);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        match self.current() {
            Context::DisplayName => self.name_buffer.push_str(text),
            Context::FinalScore => {
                let tokens: Vec<&str> = scoring_token_pattern()
                    .captures_iter(text)
                    .filter_map(|captures| captures.get(1))
                    .map(|token| token.as_str())
                    .collect();
                if tokens.is_empty() {
                    return Ok(());
                }
                let method = tokens
                    .iter()
                    .find_map(|token| ScoringMethod::from_token(token))
                    .ok_or_else(|| {
                        LadderError::malformed(format!(
                            "unrecognized scoring method '{}'",
                            tokens.join("', '")
                        ))
                    })?;
                if self.scoring_method.is_none() {
                    self.scoring_method = Some(method);
                }
            }
            Context::Cell => {
                // Contract codes are opaque: only the ends are trimmed
                let trimmed = text.trim();
                if self.cell_text.is_none() && !trimmed.is_empty() {
                    self.cell_text = Some(trimmed.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Append one value to the open row, typed by its column role
    fn push_value(&mut self, raw: String) -> Result<()> {
        let position = self.row.len();
        let board = self.boards.len() + 1;
        let role = *BOARD_COLUMNS.get(position).ok_or_else(|| {
            LadderError::malformed(format!(
                "row {} has more than {} board columns",
                board, EXPECTED_BOARD_COLUMNS
            ))
        })?;

        let value = match role {
            ColumnRole::BoardNumber => {
                let number = raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                    LadderError::malformed(format!("row {}: invalid board number '{}'", board, raw))
                })?;
                ColumnValue::Integer(i64::from(number))
            }
            ColumnRole::RawScore(_) if raw.is_empty() => ColumnValue::Integer(0),
            ColumnRole::RawScore(_) => {
                let score = raw.parse::<i32>().map_err(|_| {
                    LadderError::malformed(format!("row {}: invalid score '{}'", board, raw))
                })?;
                ColumnValue::Integer(i64::from(score))
            }
            ColumnRole::MatchScore(_) if raw.is_empty() => ColumnValue::Score(None),
            ColumnRole::MatchScore(_) => {
                let method = self.scoring_method.ok_or_else(|| {
                    LadderError::malformed("board rows appear before the scoring method")
                })?;
                let score = match method {
                    ScoringMethod::Imps => raw.parse::<i32>().map(f64::from).ok(),
                    ScoringMethod::MatchPoints => {
                        raw.parse::<f64>().ok().filter(|value| value.is_finite())
                    }
                };
                let score = score.ok_or_else(|| {
                    LadderError::malformed(format!(
                        "row {}: invalid {} score '{}'",
                        board, method, raw
                    ))
                })?;
                ColumnValue::Score(Some(score))
            }
            ColumnRole::PlayRecord(_) | ColumnRole::ContractResult(_) => ColumnValue::Text(raw),
        };

        debug_assert_eq!(role.is_numeric(), !matches!(value, ColumnValue::Text(_)));
        self.row.push(value);
        Ok(())
    }

    fn finish_row(&mut self) -> Result<()> {
        let values = std::mem::take(&mut self.row);
        let board = self.boards.len() + 1;
        if self.scoring_method.is_none() {
            return Err(
                LadderError::malformed("board rows appear before the scoring method").into(),
            );
        }
        if values.len() != BOARD_COLUMNS.len() {
            return Err(LadderError::malformed(format!(
                "row {} has {} board columns, expected {}",
                board,
                values.len().saturating_sub(1),
                EXPECTED_BOARD_COLUMNS
            ))
            .into());
        }

        let mut result = BoardResult {
            number: 0,
            hero_play_record: String::new(),
            hero_contract_result: String::new(),
            hero_raw_score: 0,
            hero_match_score: None,
            villain_play_record: String::new(),
            villain_contract_result: String::new(),
            villain_raw_score: 0,
            villain_match_score: None,
        };
        for (role, value) in BOARD_COLUMNS.iter().zip(values) {
            match (role, value) {
                (ColumnRole::BoardNumber, ColumnValue::Integer(n)) => result.number = n as u32,
                (ColumnRole::PlayRecord(Side::Hero), ColumnValue::Text(t)) => {
                    result.hero_play_record = t
                }
                (ColumnRole::PlayRecord(Side::Villain), ColumnValue::Text(t)) => {
                    result.villain_play_record = t
                }
                (ColumnRole::ContractResult(Side::Hero), ColumnValue::Text(t)) => {
                    result.hero_contract_result = t
                }
                (ColumnRole::ContractResult(Side::Villain), ColumnValue::Text(t)) => {
                    result.villain_contract_result = t
                }
                (ColumnRole::RawScore(Side::Hero), ColumnValue::Integer(n)) => {
                    result.hero_raw_score = n as i32
                }
                (ColumnRole::RawScore(Side::Villain), ColumnValue::Integer(n)) => {
                    result.villain_raw_score = n as i32
                }
                (ColumnRole::MatchScore(Side::Hero), ColumnValue::Score(s)) => {
                    result.hero_match_score = s
                }
                (ColumnRole::MatchScore(Side::Villain), ColumnValue::Score(s)) => {
                    result.villain_match_score = s
                }
                (role, value) => {
                    return Err(LadderError::InternalError {
                        message: format!("column {:?} holds {:?}", role, value),
                    }
                    .into())
                }
            }
        }

        debug!(
            board = result.number,
            hero = %result.hero_contract_result,
            villain = %result.villain_contract_result,
            "parsed board row"
        );
        self.boards.push(result);
        Ok(())
    }

    /// Close out the document and build the report
    pub fn finish(mut self) -> Result<MatchReport> {
        if !self.saw_container {
            return Err(LadderError::malformed("no results container found").into());
        }
        // A row still open at end of input never closed properly
        self.row.clear();

        let mut names = std::mem::take(&mut self.names).into_iter();
        let hero_id = names
            .next()
            .ok_or_else(|| LadderError::malformed("hero name is missing"))?;
        let villain_id = names
            .next()
            .ok_or_else(|| LadderError::malformed("villain name is missing"))?;
        let scoring_method = self
            .scoring_method
            .ok_or_else(|| LadderError::malformed("scoring method is missing"))?;

        if self.boards.is_empty() {
            return Err(LadderError::malformed("no board rows found").into());
        }
        let mut seen = HashSet::new();
        for board in &self.boards {
            if !seen.insert(board.number) {
                return Err(
                    LadderError::malformed(format!("board {} appears twice", board.number)).into(),
                );
            }
        }
        self.boards.sort_by_key(|board| board.number);

        Ok(MatchReport {
            scoring_method,
            hero_id,
            villain_id,
            boards: self.boards,
        })
    }
}

/// Parse a complete results page into a match report
pub fn parse_challenge(document: &str) -> Result<MatchReport> {
    let mut parser = ChallengeParser::new();
    for event in MarkupTokenizer::new(document) {
        parser.feed(event)?;
    }
    let report = parser.finish()?;
    debug!(
        hero = %report.hero_id,
        villain = %report.villain_id,
        boards = report.boards.len(),
        "parsed friend challenge"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ladder_error;

    fn row(class: &str, number: &str, hero: [&str; 4], villain: [&str; 4]) -> String {
        format!(
            r#"<tr class="{class}"><td>{number}</td><td><a href="{}">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td><a href="{}">{}</a></td><td>{}</td></tr>"#,
            hero[0], hero[1], hero[2], hero[3], villain[3], villain[0], villain[1], villain[2],
        )
    }

    fn document(rows: &[String]) -> String {
        format!(
            r#"<html><body><div class="handrecords">
<span class="username">alice</span> vs <span class="username">bob</span>
<span class="final_score">Final (IMPs)</span>
<table><tr><th>Board</th><th>alice</th></tr>{}</table>
</div></body></html>"#,
            rows.concat()
        )
    }

    fn malformed(result: Result<MatchReport>) -> String {
        let error = result.unwrap_err();
        match ladder_error(&error) {
            Some(LadderError::MalformedDocument { reason }) => reason.clone(),
            other => panic!("expected malformed document, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_rows_and_metadata() {
        let doc = document(&[
            row("odd", "1", ["lin1a", "4S=", "420", "10"], ["lin1b", "4S-1", "-50", ""]),
            row("even", "2", ["lin2a", "3NT+1", "-430", ""], ["lin2b", "3NT+1", "430", "0"]),
        ]);
        let report = parse_challenge(&doc).unwrap();

        assert_eq!(report.hero_id, "alice");
        assert_eq!(report.villain_id, "bob");
        assert_eq!(report.scoring_method, ScoringMethod::Imps);
        assert_eq!(report.boards.len(), 2);

        let first = &report.boards[0];
        assert_eq!(first.number, 1);
        assert_eq!(first.hero_play_record, "lin1a");
        assert_eq!(first.hero_contract_result, "4S=");
        assert_eq!(first.hero_raw_score, 420);
        assert_eq!(first.hero_match_score, Some(10.0));
        assert_eq!(first.villain_match_score, None);
        assert_eq!(first.villain_play_record, "lin1b");
        assert_eq!(first.villain_contract_result, "4S-1");
        assert_eq!(first.villain_raw_score, -50);

        assert_eq!(report.boards[1].villain_match_score, Some(0.0));
        assert_eq!(report.boards[1].hero_raw_score, -430);
    }

    #[test]
    fn test_nested_formatting_keeps_first_text() {
        let doc = document(&[
            r#"<tr class="odd"><td><b>1</b><i>ignored</i></td><td><a href="l1"><span>2H</span>=</a></td><td>110</td><td>3</td><td></td><td><a href="l2">2H-1</a></td><td>-100</td></tr>"#
                .to_string(),
        ]);
        let report = parse_challenge(&doc).unwrap();
        assert_eq!(report.boards[0].number, 1);
        assert_eq!(report.boards[0].hero_contract_result, "2H");
        assert_eq!(report.boards[0].hero_match_score, Some(3.0));
    }

    #[test]
    fn test_contract_text_kept_verbatim_inside() {
        let doc = document(&[row(
            "odd",
            "1",
            ["a", "3NT&nbsp;=", "400", "2"],
            ["b", "  4S  N  -1 ", "-50", ""],
        )]);
        let report = parse_challenge(&doc).unwrap();
        assert_eq!(report.boards[0].hero_contract_result, "3NT\u{a0}=");
        assert_eq!(report.boards[0].villain_contract_result, "4S  N  -1");
    }

    #[test]
    fn test_boards_sorted_by_number() {
        let doc = document(&[
            row("odd", "3", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""]),
            row("even", "1", ["c", "2S=", "110", ""], ["d", "2S=", "110", ""]),
        ]);
        let report = parse_challenge(&doc).unwrap();
        let numbers: Vec<u32> = report.boards.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_match_points_allow_fractions() {
        let doc = document(&[row(
            "odd",
            "1",
            ["a", "1NT=", "90", "62.5"],
            ["b", "1NT=", "90", "37.5"],
        )])
        .replace("(IMPs)", "(MPs)");
        let report = parse_challenge(&doc).unwrap();
        assert_eq!(report.scoring_method, ScoringMethod::MatchPoints);
        assert_eq!(report.boards[0].hero_match_score, Some(62.5));
    }

    #[test]
    fn test_fractional_imps_rejected() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "2.5"], ["b", "1NT=", "90", ""])]);
        assert!(malformed(parse_challenge(&doc)).contains("invalid IMPs score"));
    }

    #[test]
    fn test_missing_container() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])])
            .replace("handrecords", "scores");
        assert!(malformed(parse_challenge(&doc)).contains("container"));
    }

    #[test]
    fn test_short_row_rejected() {
        let doc = document(&[
            r#"<tr class="odd"><td>1</td><td><a href="x">4S=</a></td><td>420</td></tr>"#
                .to_string(),
        ]);
        assert!(malformed(parse_challenge(&doc)).contains("expected 8"));
    }

    #[test]
    fn test_long_row_rejected() {
        let long = row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])
            .replace("</tr>", "<td>extra</td></tr>");
        assert!(malformed(parse_challenge(&document(&[long]))).contains("more than 8"));
    }

    #[test]
    fn test_non_numeric_score_rejected() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "ninety", "1"], ["b", "1NT=", "90", ""])]);
        assert!(malformed(parse_challenge(&doc)).contains("invalid score"));
    }

    #[test]
    fn test_unknown_scoring_method_rejected() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])])
            .replace("(IMPs)", "(BAM)");
        assert!(malformed(parse_challenge(&doc)).contains("BAM"));
    }

    #[test]
    fn test_absent_scoring_method_rejected() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])])
            .replace("Final (IMPs)", "Final");
        assert!(malformed(parse_challenge(&doc)).contains("scoring method"));
    }

    #[test]
    fn test_duplicate_board_rejected() {
        let doc = document(&[
            row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""]),
            row("even", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""]),
        ]);
        assert!(malformed(parse_challenge(&doc)).contains("twice"));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(malformed(parse_challenge(&document(&[]))).contains("no board rows"));
    }

    #[test]
    fn test_stray_closing_tags_tolerated() {
        let doc = format!(
            "</td></tr></div>{}</span></div></body>",
            document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])])
        );
        let report = parse_challenge(&doc).unwrap();
        assert_eq!(report.boards.len(), 1);
    }

    #[test]
    fn test_void_elements_do_not_shift_context() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])
            .replace("<td>90</td>", "<td>90<br></td>")])
        .replace("<table>", "<hr><table>");
        let report = parse_challenge(&doc).unwrap();
        assert_eq!(report.boards[0].hero_raw_score, 90);
    }

    #[test]
    fn test_unfinished_trailing_row_discarded() {
        let doc = document(&[row("odd", "1", ["a", "1NT=", "90", "1"], ["b", "1NT=", "90", ""])]);
        let truncated = format!(
            "{}<div class=\"handrecords\"><tr class=\"even\"><td>2</td>",
            doc.replace("</div></body></html>", "")
        );
        let report = parse_challenge(&truncated).unwrap();
        assert_eq!(report.boards.len(), 1);
    }

    #[test]
    fn test_context_refinement() {
        let row_tag = MarkupEvent::StartTag {
            name: "tr".to_string(),
            attributes: vec![("class".to_string(), "even".to_string())],
            self_closing: false,
        };
        assert_eq!(
            Context::Container.refine(&row_tag, "tr"),
            Context::Row(RowParity::Even)
        );
        assert_eq!(Context::Outside.refine(&row_tag, "tr"), Context::Outside);
        assert_eq!(
            Context::Row(RowParity::Odd).refine(&row_tag, "td"),
            Context::Cell
        );
        assert_eq!(Context::Cell.refine(&row_tag, "span"), Context::Cell);
    }

    #[test]
    fn test_column_table_roles() {
        let numeric = BOARD_COLUMNS.iter().filter(|role| role.is_numeric()).count();
        assert_eq!(numeric, 5);
        assert_eq!(EXPECTED_BOARD_COLUMNS, 8);
    }
}
