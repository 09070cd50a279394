//! OFX bank and credit-card statements
//!
//! OFX 1.x is SGML with optional end tags and OFX 2.x is XML. Both carry the
//! same element tree below `<OFX>`, so the header is skipped and the body is
//! read with one SGML parser.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::traits::*;
use crate::types::*;

#[derive(Deserialize, Debug)]
struct Document {
    bankmsgsrsv1: Option<BankMsgsRsV1>,
    creditcardmsgsrsv1: Option<CreditCardMsgsRsV1>,
}

#[derive(Deserialize, Debug)]
struct BankMsgsRsV1 {
    stmttrnrs: StmtTrnRs,
}

#[derive(Deserialize, Debug)]
struct CreditCardMsgsRsV1 {
    ccstmttrnrs: CcStmtTrnRs,
}

#[derive(Deserialize, Debug)]
struct StmtTrnRs {
    stmtrs: StmtRs,
}

#[derive(Deserialize, Debug)]
struct CcStmtTrnRs {
    ccstmtrs: CcStmtRs,
}

#[derive(Deserialize, Debug)]
struct StmtRs {
    curdef: Option<String>,
    bankacctfrom: AcctFrom,
    banktranlist: Option<BankTranList>,
}

#[derive(Deserialize, Debug)]
struct CcStmtRs {
    curdef: Option<String>,
    ccacctfrom: AcctFrom,
    banktranlist: Option<BankTranList>,
}

#[derive(Deserialize, Debug)]
struct AcctFrom {
    acctid: String,
}

#[derive(Deserialize, Debug)]
struct BankTranList {
    #[serde(rename = "stmttrn", default)]
    stmttrns: Vec<StmtTrn>,
}

#[derive(Deserialize, Debug)]
struct StmtTrn {
    dtposted: String,
    trnamt: String,
    fitid: String,
    name: Option<String>,
    memo: Option<String>,
}

/// Reads `.ofx`/`.qfx` statement files
#[derive(Debug, Clone, Copy, Default)]
pub struct OfxReader;

impl OfxReader {
    pub fn new() -> Self {
        Self
    }

    /// Parse statement text already in memory; `path` is used for errors
    pub fn parse(&self, path: &Path, content: &str) -> ImportResult<Statement> {
        let start = content
            .to_ascii_uppercase()
            .find("<OFX>")
            .ok_or_else(|| parse_error(path, 1, "no <OFX> element found"))?;
        let line = content[..start].matches('\n').count() + 1;
        let body = &content[start..];

        let sgml = sgmlish::Parser::builder()
            .lowercase_names()
            .expand_entities(|entity| match entity {
                "lt" => Some("<"),
                "gt" => Some(">"),
                "amp" => Some("&"),
                "nbsp" => Some(" "),
                _ => None,
            })
            .parse(body)
            .map_err(|e| parse_error(path, line, &e.to_string()))?;
        let sgml = sgmlish::transforms::normalize_end_tags(sgml)
            .map_err(|e| parse_error(path, line, &e.to_string()))?;
        let doc = sgmlish::from_fragment::<Document>(sgml)
            .map_err(|e| parse_error(path, line, &e.to_string()))?;

        let (account_id, currency, list) = match doc {
            Document {
                bankmsgsrsv1:
                    Some(BankMsgsRsV1 {
                        stmttrnrs:
                            StmtTrnRs {
                                stmtrs:
                                    StmtRs {
                                        curdef,
                                        bankacctfrom: AcctFrom { acctid },
                                        banktranlist,
                                    },
                            },
                    }),
                creditcardmsgsrsv1: None,
            } => (acctid, curdef, banktranlist),
            Document {
                bankmsgsrsv1: None,
                creditcardmsgsrsv1:
                    Some(CreditCardMsgsRsV1 {
                        ccstmttrnrs:
                            CcStmtTrnRs {
                                ccstmtrs:
                                    CcStmtRs {
                                        curdef,
                                        ccacctfrom: AcctFrom { acctid },
                                        banktranlist,
                                    },
                            },
                    }),
            } => (acctid, curdef, banktranlist),
            _ => {
                return Err(parse_error(
                    path,
                    line,
                    "expected exactly one bank or credit card statement",
                ))
            }
        };

        let transactions = list
            .map(|l| l.stmttrns)
            .unwrap_or_default()
            .into_iter()
            .map(|trn| transaction(path, line, trn))
            .collect::<ImportResult<Vec<_>>>()?;

        tracing::debug!(
            path = %path.display(),
            account = %account_id,
            transactions = transactions.len(),
            "parsed OFX statement"
        );
        Ok(Statement {
            account_id: account_id.trim().to_string(),
            currency: currency.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            transactions,
        })
    }
}

impl StatementReader for OfxReader {
    fn read(&self, path: &Path) -> ImportResult<Statement> {
        if !path.is_file() {
            return Err(ImportError::InputNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        self.parse(path, &content)
    }
}

fn transaction(path: &Path, line: usize, trn: StmtTrn) -> ImportResult<TransactionRecord> {
    let date = trn
        .dtposted
        .trim()
        .get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .ok_or_else(|| {
            parse_error(path, line, &format!("bad DTPOSTED '{}' in {}", trn.dtposted, trn.fitid))
        })?;

    let raw = trn.trnamt.trim();
    let normalized = if raw.contains('.') {
        raw.to_string()
    } else {
        raw.replace(',', ".")
    };
    let amount = BigDecimal::from_str(&normalized).map_err(|_| {
        parse_error(path, line, &format!("bad TRNAMT '{}' in {}", trn.trnamt, trn.fitid))
    })?;

    let payee = [trn.name, trn.memo]
        .into_iter()
        .flatten()
        .map(|p| p.trim().to_string())
        .find(|p| !p.is_empty())
        .unwrap_or_default();

    Ok(TransactionRecord::new(
        trn.fitid.trim().to_string(),
        date,
        payee,
        amount,
    ))
}

fn parse_error(path: &Path, line: usize, message: &str) -> ImportError {
    ImportError::Parse {
        path: path.to_path_buf(),
        line: Some(line),
        message: message.to_string(),
    }
}
