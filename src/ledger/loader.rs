//! Loader for plain-text ledgers
//!
//! Each file is parsed on its own with `beancount_parser_lima`. `include`
//! lines are followed here rather than by the parser so that every span the
//! parser hands back refers to exactly one file; they are blanked out before
//! parsing without moving any other byte. Transactions remember the lines
//! they were read from so that they can later be rewritten in place.

use beancount_parser_lima::{
    self as parser, BeancountParser, BeancountSources, ParseError, ParseSuccess, Span, Spanned,
};
use bigdecimal::BigDecimal;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::format::quoted;
use crate::persistence::span_digest;
use crate::types::*;
use crate::utils::validation::parse_date;

const INCLUDE: &str = "include";

/// Everything read from a ledger and the files it includes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    /// Transactions, each file in order, included files after their includer
    pub entries: Vec<LedgerEntry>,
    /// Options, accounts, tags and links
    pub summary: LedgerSummary,
    /// Every file read, root first
    pub files: Vec<PathBuf>,
}

impl LedgerSnapshot {
    /// Load the ledger rooted at `path`, following includes
    pub fn load(path: &Path) -> ImportResult<Self> {
        LedgerLoader::default().load(path)
    }

    /// Parse ledger text as if it had been read from `path`
    ///
    /// Includes are still resolved relative to `path`.
    pub fn parse(path: &Path, text: &str) -> ImportResult<Self> {
        let mut loader = LedgerLoader::default();
        loader.snapshot.files.push(path.to_path_buf());
        loader.parse_source(path, text)?;
        Ok(loader.snapshot)
    }
}

/// Stateful loader; one instance per load
#[derive(Debug, Default)]
pub struct LedgerLoader {
    snapshot: LedgerSnapshot,
    visited: HashSet<PathBuf>,
}

impl LedgerLoader {
    /// Load the root file and everything it includes
    pub fn load(mut self, path: &Path) -> ImportResult<LedgerSnapshot> {
        self.load_file(path)?;
        tracing::debug!(
            path = %path.display(),
            entries = self.snapshot.entries.len(),
            files = self.snapshot.files.len(),
            "loaded ledger"
        );
        Ok(self.snapshot)
    }

    fn load_file(&mut self, path: &Path) -> ImportResult<()> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ImportError::InputNotFound(path.to_path_buf()),
            _ => ImportError::Io(e),
        })?;

        if !self.visited.insert(canonical(path)) {
            tracing::warn!(path = %path.display(), "skipping repeated include");
            return Ok(());
        }
        self.snapshot.files.push(path.to_path_buf());
        self.parse_source(path, &text)
    }

    fn parse_source(&mut self, path: &Path, text: &str) -> ImportResult<()> {
        let (masked, includes) = split_includes(text);
        let source = SourceText::new(text);
        let sources = BeancountSources::from(masked.as_str());
        let parser = BeancountParser::new(&sources);

        match parser.parse() {
            Ok(ParseSuccess {
                directives,
                options,
                warnings,
                ..
            }) => {
                if !warnings.is_empty() {
                    let report = ReportBuffer::default();
                    sources.write_errors_or_warnings(report.writer(), warnings)?;
                    tracing::warn!(path = %path.display(), "{}", report.into_string());
                }

                let summary = &mut self.snapshot.summary;
                if summary.title.is_none() {
                    summary.title = options.title().map(|title| title.item().to_string());
                }
                if summary.default_currency.is_none() {
                    summary.default_currency =
                        options.operating_currency().next().map(|cur| cur.to_string());
                }

                for directive in &directives {
                    self.directive(path, &source, directive)?;
                }
            }

            Err(ParseError { errors, warnings }) => {
                let count = errors.len();
                let report = ReportBuffer::default();
                sources.write_errors_or_warnings(report.writer(), errors)?;
                sources.write_errors_or_warnings(report.writer(), warnings)?;
                return Err(ImportError::Parse {
                    path: path.to_path_buf(),
                    line: None,
                    message: format!("{} error(s)\n{}", count, report.into_string().trim_end()),
                });
            }
        }

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for include in includes {
            self.load_file(&base.join(include))?;
        }
        Ok(())
    }

    fn directive(
        &mut self,
        path: &Path,
        source: &SourceText,
        directive: &Spanned<parser::Directive<'_>>,
    ) -> ImportResult<()> {
        use parser::DirectiveVariant::*;

        match directive.variant() {
            Open(open) => {
                let account: &str = open.account().item().as_ref();
                self.snapshot.summary.accounts.insert(account.to_string());

                let accid = parser::Key::try_from(ACCID_KEY)
                    .ok()
                    .and_then(|key| directive.metadata().key_value(key))
                    .map(|value| meta_text(value.item()));
                if let Some(accid) = accid {
                    self.snapshot
                        .summary
                        .account_ids
                        .insert(accid, account.to_string());
                }
                Ok(())
            }
            Transaction(transaction) => {
                let Some(entry) = read_transaction(path, source, directive, transaction)? else {
                    return Ok(());
                };
                let summary = &mut self.snapshot.summary;
                summary.tags.extend(entry.tags.iter().cloned());
                summary.links.extend(entry.links.iter().cloned());
                self.snapshot.entries.push(entry);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A posting whose amount may still need interpolating
struct RawPosting {
    posting: Posting,
    amount: Option<(BigDecimal, String)>,
    lines: LineRange,
}

fn read_transaction(
    path: &Path,
    source: &SourceText,
    directive: &Spanned<parser::Directive<'_>>,
    transaction: &parser::Transaction<'_>,
) -> ImportResult<Option<LedgerEntry>> {
    let lines = source.range(directive.span());

    let flag = match transaction.flag().to_string().as_str() {
        "*" => Flag::Complete,
        "!" => Flag::Incomplete,
        other => {
            tracing::warn!(
                path = %path.display(),
                line = lines.first,
                flag = other,
                "skipping transaction with unsupported flag"
            );
            return Ok(None);
        }
    };
    let date = parse_date(&directive.date().to_string())
        .map_err(|e| parse_error(path, lines.first, e.to_string()))?;

    let mut entry = LedgerEntry::new(date, flag, transaction.payee().map(|p| p.to_string()));
    entry.narration = transaction.narration().map(|n| n.to_string());

    let metadata = directive.metadata();
    for tag in metadata.tags() {
        let tag: &str = tag.item().as_ref();
        entry.tags.insert(tag.to_string());
    }
    for link in metadata.links() {
        let link: &str = link.item().as_ref();
        entry.links.insert(link.to_string());
    }
    for (key, value) in metadata.key_values() {
        let key = key.to_string();
        match key.as_str() {
            ACCOUNT_KEY => entry.meta.account = Some(meta_text(value.item())),
            ID_KEY => entry.meta.id = Some(meta_text(value.item())),
            _ => entry.meta.extra.push((key, meta_syntax(value.item()))),
        }
    }
    entry.meta.extra.sort();

    let mut postings = Vec::new();
    for posting in transaction.postings() {
        postings.push(read_posting(path, source, posting)?);
    }
    let ranges = postings.iter().map(|p| p.lines).collect();
    entry.postings = interpolate(path, lines.first, postings)?;

    entry.meta.location = Some(SourceLocation {
        filename: path.to_path_buf(),
        lineno: lines.first,
        line_count: lines.last - lines.first + 1,
        digest: span_digest(source.lines(lines)),
        postings: ranges,
    });

    Ok(Some(entry))
}

fn read_posting(
    path: &Path,
    source: &SourceText,
    posting: &Spanned<parser::Posting<'_>>,
) -> ImportResult<RawPosting> {
    let lines = source.range(posting.span());
    let account: &str = posting.account().item().as_ref();

    let mut leg = Posting::new(account.to_string(), BigDecimal::from(0), String::new());
    leg.flag = posting
        .flag()
        .and_then(|flag| flag.to_string().chars().next());
    leg.annotation = annotation(source.line(lines.first));

    for (key, value) in posting.metadata().key_values() {
        let key = key.to_string();
        if key == REC_KEY {
            leg.meta.rec = Some(meta_text(value.item()));
        } else {
            leg.meta.extra.push((key, meta_syntax(value.item())));
        }
    }
    leg.meta.extra.sort();

    let amount = match (posting.amount(), posting.currency()) {
        (Some(amount), Some(currency)) => {
            let number = BigDecimal::from_str(&amount.value().to_string())
                .map_err(|e| parse_error(path, lines.first, e.to_string()))?;
            Some((number, currency.to_string()))
        }
        (Some(_), None) => {
            return Err(parse_error(
                path,
                lines.first,
                format!("posting on {} has no currency", account),
            ))
        }
        (None, _) => None,
    };

    Ok(RawPosting {
        posting: leg,
        amount,
        lines,
    })
}

/// Fill in the single posting written without an amount
fn interpolate(path: &Path, lineno: usize, raw: Vec<RawPosting>) -> ImportResult<Vec<Posting>> {
    let elided = raw.iter().filter(|p| p.amount.is_none()).count();
    if elided > 1 {
        return Err(parse_error(
            path,
            lineno,
            "more than one posting without an amount".to_string(),
        ));
    }

    let mut currencies: Vec<&str> = raw
        .iter()
        .filter_map(|p| p.amount.as_ref().map(|(_, c)| c.as_str()))
        .collect();
    currencies.sort_unstable();
    currencies.dedup();
    let residual: BigDecimal = raw
        .iter()
        .filter_map(|p| p.amount.as_ref().map(|(n, _)| n))
        .sum();

    let fill = if elided == 1 {
        match currencies.as_slice() {
            [currency] => Some((-residual, currency.to_string())),
            _ => {
                let line = raw
                    .iter()
                    .find(|p| p.amount.is_none())
                    .map_or(lineno, |p| p.lines.first);
                return Err(parse_error(
                    path,
                    line,
                    "cannot infer the missing amount".to_string(),
                ));
            }
        }
    } else {
        None
    };

    Ok(raw
        .into_iter()
        .map(|p| {
            let mut posting = p.posting;
            let (amount, currency) = p.amount.or_else(|| fill.clone()).unwrap_or_default();
            posting.amount = amount;
            posting.currency = currency;
            posting
        })
        .collect())
}

/// Metadata value as plain text: strings unquoted, anything else as written
fn meta_text(value: &parser::MetaValue<'_>) -> String {
    match value {
        parser::MetaValue::Simple(parser::SimpleValue::String(s)) => s.to_string(),
        other => other.to_string(),
    }
}

/// Metadata value in ledger syntax
fn meta_syntax(value: &parser::MetaValue<'_>) -> String {
    match value {
        parser::MetaValue::Simple(parser::SimpleValue::String(s)) => quoted(s),
        other => other.to_string(),
    }
}

/// Cost and price annotation of a posting line, as written
fn annotation(line: &str) -> Option<String> {
    let body = line.split(';').next().unwrap_or_default().trim_end();
    body.find(['{', '@']).map(|at| body[at..].to_string())
}

/// Blank out `include` lines, keeping every other byte where it was
fn split_includes(text: &str) -> (String, Vec<PathBuf>) {
    let mut masked = String::with_capacity(text.len());
    let mut includes = Vec::new();

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        match include_target(body) {
            Some(target) => {
                includes.push(PathBuf::from(target));
                masked.extend(std::iter::repeat(' ').take(body.len()));
                masked.push_str(&line[body.len()..]);
            }
            None => masked.push_str(line),
        }
    }

    (masked, includes)
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(INCLUDE)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('"')?;
    rest.split_once('"').map(|(target, _)| target)
}

/// Line lookup for byte offsets into one source file
struct SourceText<'t> {
    lines: Vec<&'t str>,
    starts: Vec<usize>,
}

impl<'t> SourceText<'t> {
    fn new(text: &'t str) -> Self {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let starts = lines
            .iter()
            .scan(0, |offset, line| {
                let start = *offset;
                *offset += line.len();
                Some(start)
            })
            .collect();
        Self { lines, starts }
    }

    /// 0-based line holding byte `offset`
    fn line_index(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// Lines covered by `span`, without trailing blank lines
    fn range(&self, span: &Span) -> LineRange {
        let first = self.line_index(span.start);
        let mut last = self.line_index(span.end.saturating_sub(1).max(span.start));
        while last > first && self.lines[last].trim().is_empty() {
            last -= 1;
        }
        LineRange {
            first: first + 1,
            last: last + 1,
        }
    }

    /// Text of 1-based line `lineno`, empty past the end
    fn line(&self, lineno: usize) -> &'t str {
        self.lines
            .get(lineno.saturating_sub(1))
            .copied()
            .unwrap_or_default()
    }

    fn lines(&self, range: LineRange) -> &[&'t str] {
        let end = range.last.min(self.lines.len());
        &self.lines[range.first.saturating_sub(1).min(end)..end]
    }
}

/// Collects parser reports, which are only written to `Copy` writers
#[derive(Debug, Default)]
struct ReportBuffer(RefCell<Vec<u8>>);

impl ReportBuffer {
    fn writer(&self) -> ReportWriter<'_> {
        ReportWriter(&self.0)
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.0.into_inner()).into_owned()
    }
}

#[derive(Debug, Clone, Copy)]
struct ReportWriter<'a>(&'a RefCell<Vec<u8>>);

impl Write for ReportWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn parse_error(path: &Path, line: usize, message: String) -> ImportError {
    ImportError::Parse {
        path: path.to_path_buf(),
        line: Some(line),
        message,
    }
}

/// Canonical form of a path for identity comparisons
pub(crate) fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
