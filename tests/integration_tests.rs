//! Integration tests for bean-import

use bean_import::{
    run_import, ImportConfig, ImportError, ImportResult, ImportStats, Importer, LedgerSnapshot,
    OfxReader, PendingResolver, Prompter, Question, ReconcileTarget, Reply, ScriptedPrompter,
    Statement, StatementReader, TransactionRecord,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;

fn ofx(transactions: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::new();
    for (fitid, posted, name, amount) in transactions {
        body.push_str(&format!(
            "<STMTTRN>\n<TRNTYPE>OTHER\n<DTPOSTED>{}\n<TRNAMT>{}\n<FITID>{}\n<NAME>{}\n</STMTTRN>\n",
            posted, amount, fitid, name
        ));
    }
    format!(
        "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n\
         <CURDEF>USD\n<BANKACCTFROM>\n<ACCTID>12345678\n</BANKACCTFROM>\n<BANKTRANLIST>\n{}\
         </BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n",
        body
    )
}

fn record(id: &str, day: u32, payee: &str, amount: &str) -> TransactionRecord {
    TransactionRecord::new(
        id.to_string(),
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        payee.to_string(),
        BigDecimal::from_str(amount).unwrap(),
    )
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(ledger: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.bean"), ledger).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn ledger(&self) -> String {
        fs::read_to_string(self.path("main.bean")).unwrap()
    }

    fn config(&self) -> ImportConfig {
        ImportConfig::new(self.path("bank.ofx"), self.path("main.bean"))
            .with_payees(self.path("payees.json"))
            .with_default_currency_only(true)
    }
}

/// Scripted answers; someone else breaks the ledger while question `at` waits
struct LedgerBreaker {
    script: ScriptedPrompter,
    ledger: PathBuf,
    at: usize,
}

impl Prompter for LedgerBreaker {
    fn ask(&mut self, question: &Question) -> ImportResult<Reply> {
        if self.script.asked.len() == self.at {
            let text = fs::read_to_string(&self.ledger).unwrap();
            fs::write(&self.ledger, text.replace("2024-03-08", "2024-13-08")).unwrap();
        }
        self.script.ask(question)
    }

    fn say(&mut self, message: &str) {
        self.script.say(message);
    }

    fn warn(&mut self, message: &str) {
        self.script.warn(message);
    }
}

const CHECKING_LEDGER: &str = r#"option "operating_currency" "USD"

2024-01-01 open Assets:Checking USD
  accid: "12345678"
2024-01-01 open Expenses:Shopping
2024-01-01 open Expenses:Food

2024-03-08 * "Grocer" "Weekly shop"
  Expenses:Food  20.00 USD
  Assets:Checking  -20.00 USD
"#;

#[test]
fn test_complete_import_workflow() {
    let ws = Workspace::new(CHECKING_LEDGER);
    fs::write(
        ws.path("bank.ofx"),
        ofx(&[
            ("1001", "20240305", "ACME", "-42.50"),
            ("1002", "20240308120000", "GROCER", "-20.00"),
        ]),
    )
    .unwrap();
    let config = ws.config().with_output(ws.path("main.bean"));

    let prompter = ScriptedPrompter::new([
        // 1001: insert, rename the payee, one posting for the full amount
        "i",
        "Acme Corp",
        "Expenses:Shopping",
        "",
        "s",
        // 1002: reconcile against the existing entry, keep the payee
        "r",
        "",
        "",
        "s",
    ]);

    let report = run_import(&config, &OfxReader::new(), prompter).unwrap();

    assert_eq!(
        report.stats,
        ImportStats {
            reconciled: 1,
            inserted: 1,
            skipped: 0,
            failed: 0
        }
    );
    assert!(report.output.is_none());
    assert_eq!(
        ws.ledger(),
        r#"option "operating_currency" "USD"

2024-01-01 open Assets:Checking USD
  accid: "12345678"
2024-01-01 open Expenses:Shopping
2024-01-01 open Expenses:Food

2024-03-08 * "Grocer" "Weekly shop"
  Expenses:Food  20.00 USD
  Assets:Checking  -20.00 USD
    rec: "1002"

2024-03-05 * "Acme Corp" ""
  Expenses:Shopping  42.50 USD
  Assets:Checking  -42.50 USD
    rec: "1001"
"#
    );
    assert_eq!(
        fs::read_to_string(ws.path("payees.json")).unwrap(),
        "{\n    \"ACME\": \"Acme Corp\"\n}\n"
    );

    // every committed entry balances against its bank amount
    let snapshot = LedgerSnapshot::load(&ws.path("main.bean")).unwrap();
    for entry in &snapshot.entries {
        assert!(entry.is_balanced());
    }
    assert_eq!(
        snapshot.entries[1].positive_total(),
        BigDecimal::from_str("42.50").unwrap()
    );
}

#[test]
fn test_committed_records_are_never_pending_again() {
    let ws = Workspace::new(CHECKING_LEDGER);
    fs::write(
        ws.path("bank.ofx"),
        ofx(&[("1001", "20240305", "ACME", "-42.50")]),
    )
    .unwrap();
    let config = ws.config().with_output(ws.path("main.bean"));

    let first = ScriptedPrompter::new(["i", "", "Expenses:Shopping", "", "s"]);
    let report = run_import(&config, &OfxReader::new(), first).unwrap();
    assert_eq!(report.stats.inserted, 1);

    let statement = OfxReader::new().read(&ws.path("bank.ofx")).unwrap();
    let mut importer =
        Importer::from_config(&config, &statement, ScriptedPrompter::new(Vec::<String>::new()))
            .unwrap();
    let stats = importer.run(&statement.transactions).unwrap();

    assert_eq!(stats, ImportStats::default());
    assert_eq!(
        importer.prompter().warned,
        vec!["No pending transactions found".to_string()]
    );

    let target = ReconcileTarget::new("Assets:Checking");
    let resolver = PendingResolver::new(&target);
    let snapshot = LedgerSnapshot::load(&ws.path("main.bean")).unwrap();
    assert!(resolver
        .resolve(&statement.transactions, &snapshot.entries)
        .is_empty());
}

#[test]
fn test_reload_after_span_grows() {
    let ws = Workspace::new(
        r#"option "operating_currency" "USD"

2024-03-01 * "Shop" "One"
  Expenses:Food  10.00 USD
  Assets:Checking  -10.00 USD

2024-03-02 * "Shop" "Two"
  Expenses:Food  5.00 USD
  Assets:Checking  -5.00 USD
"#,
    );
    let statement = Statement {
        account_id: "999".to_string(),
        currency: None,
        transactions: vec![
            record("2001", 1, "Shop", "-10.00"),
            record("2002", 2, "Shop", "-5.00"),
        ],
    };
    let config = ws.config().with_account("Assets:Checking");
    let prompter = ScriptedPrompter::new([
        // 2001: reconcile, then split the entry over two expense accounts
        "r",
        "",
        "",
        "o",
        "Expenses:Food",
        "6",
        "Expenses:Home",
        "",
        "s",
        // 2002: plain reconcile of the entry that moved down two lines
        "r",
        "",
        "",
        "s",
    ]);

    let mut importer = Importer::from_config(&config, &statement, prompter).unwrap();
    let stats = importer.run(&statement.transactions).unwrap();

    assert_eq!(stats.reconciled, 2);
    assert_eq!(importer.index().generation(), 1);
    assert_eq!(
        ws.ledger(),
        r#"option "operating_currency" "USD"

2024-03-01 * "Shop" "One"
  Expenses:Food  6.00 USD
  Expenses:Home  4.00 USD
  Assets:Checking  -10.00 USD
    rec: "2001"

2024-03-02 * "Shop" "Two"
  Expenses:Food  5.00 USD
  Assets:Checking  -5.00 USD
    rec: "2002"
"#
    );
}

#[test]
fn test_out_of_band_edit_fails_only_that_record() {
    let ws = Workspace::new(CHECKING_LEDGER);
    let statement = Statement {
        account_id: "12345678".to_string(),
        currency: Some("USD".to_string()),
        transactions: vec![
            record("1002", 8, "GROCER", "-20.00"),
            record("1003", 9, "CAFE", "-3.00"),
        ],
    };
    let prompter = ScriptedPrompter::new(["r", "", "", "s", "s"]);
    let mut importer = Importer::from_config(&ws.config(), &statement, prompter).unwrap();

    let edited = ws.ledger().replace("Weekly shop", "Edited elsewhere");
    fs::write(ws.path("main.bean"), &edited).unwrap();

    let stats = importer.run(&statement.transactions).unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(ws.ledger(), edited);
    assert!(importer
        .prompter()
        .warned
        .iter()
        .any(|w| w.starts_with("1002 left unresolved")));
}

#[test]
fn test_reconcile_keeps_comments() {
    let ledger = r#"option "operating_currency" "USD"

2024-03-08 * "Diner"
  ; receipt in drawer 4
  Expenses:Food  10.00 USD ; lunch with Bob
  Assets:Checking
"#;
    let ws = Workspace::new(ledger);
    let statement = Statement {
        account_id: "999".to_string(),
        currency: None,
        transactions: vec![record("1001", 8, "DINER", "-10.00")],
    };
    let config = ws.config().with_account("Assets:Checking");
    let prompter = ScriptedPrompter::new(["r", "", "", "s"]);

    let mut importer = Importer::from_config(&config, &statement, prompter).unwrap();
    let stats = importer.run(&statement.transactions).unwrap();

    assert_eq!(stats.reconciled, 1);
    assert_eq!(ws.ledger(), format!("{}    rec: \"1001\"\n", ledger));
}

#[test]
fn test_refused_write_reloads_before_next_record() {
    let ledger = r#"option "operating_currency" "USD"

2024-03-01 * "Shop" "One"
  Expenses:Food  10.00 USD
  Assets:Checking  -10.00 USD

2024-03-02 * "Shop" "Two"
  Expenses:Food  5.00 USD
  Assets:Checking  -5.00 USD
"#;
    let ws = Workspace::new(ledger);
    let statement = Statement {
        account_id: "999".to_string(),
        currency: None,
        transactions: vec![
            record("2001", 1, "Shop", "-10.00"),
            record("2002", 2, "Shop", "-5.00"),
        ],
    };
    let config = ws.config().with_account("Assets:Checking");
    let prompter = ScriptedPrompter::new(["r", "", "", "s", "r", "", "", "s"]);
    let mut importer = Importer::from_config(&config, &statement, prompter).unwrap();

    let shifted = format!("; header\n{}", ledger);
    fs::write(ws.path("main.bean"), &shifted).unwrap();

    let stats = importer.run(&statement.transactions).unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.reconciled, 1);
    assert_eq!(importer.index().generation(), 1);
    assert!(importer
        .prompter()
        .warned
        .iter()
        .any(|w| w.starts_with("2001 left unresolved")));
    assert_eq!(
        ws.ledger(),
        format!("{}    rec: \"2002\"\n", shifted)
    );
}

#[test]
fn test_interrupted_run_keeps_buffered_entries() {
    let ws = Workspace::new(CHECKING_LEDGER);
    fs::write(
        ws.path("bank.ofx"),
        ofx(&[
            ("1001", "20240305", "ACME", "-42.50"),
            ("1002", "20240308", "GROCER", "-20.00"),
            ("1003", "20240309", "CAFE", "-3.00"),
        ]),
    )
    .unwrap();
    let prompter = LedgerBreaker {
        script: ScriptedPrompter::new([
            // 1001: insert into the buffer
            "i",
            "",
            "Expenses:Shopping",
            "",
            "s",
            // 1002: the ledger breaks while choosing the entry
            "r",
            "",
            "",
            "s",
        ]),
        ledger: ws.path("main.bean"),
        at: 7,
    };

    match run_import(&ws.config(), &OfxReader::new(), prompter) {
        Err(ImportError::Interrupted { error, output }) => {
            assert!(matches!(*error, ImportError::Parse { .. }));
            assert!(error.is_fatal());
            let output = output.unwrap();
            assert!(output.contains("2024-03-05 * \"ACME\" \"\""));
            assert!(output.contains("rec: \"1001\""));
        }
        _ => panic!("expected an interrupted run"),
    }
}

#[test]
fn test_buffered_output_and_period() {
    let ws = Workspace::new(CHECKING_LEDGER);
    fs::write(
        ws.path("bank.ofx"),
        ofx(&[
            ("0900", "20240228", "OLD", "-1.00"),
            ("1001", "20240305", "ACME", "15"),
        ]),
    )
    .unwrap();
    let config = ws.config().with_period("2024-03".parse().unwrap());
    let prompter = ScriptedPrompter::new(["i", "", "Income:Refunds", "", "s"]);

    let report = run_import(&config, &OfxReader::new(), prompter).unwrap();

    assert_eq!(report.stats.inserted, 1);
    assert_eq!(
        report.output.as_deref(),
        Some(
            "\n2024-03-05 * \"ACME\" \"\"\n\
             \x20 Income:Refunds  -15.00 USD\n\
             \x20 Assets:Checking  15.00 USD\n\
             \x20   rec: \"1001\"\n"
        )
    );
    assert_eq!(ws.ledger(), CHECKING_LEDGER);
}

#[test]
fn test_fatal_configuration_errors() {
    let ws = Workspace::new(CHECKING_LEDGER);

    let err = run_import(&ws.config(), &OfxReader::new(), ScriptedPrompter::default()).unwrap_err();
    assert!(matches!(err, ImportError::InputNotFound(ref p) if p == &ws.path("bank.ofx")));

    let statement = Statement {
        account_id: "55555555".to_string(),
        currency: None,
        transactions: vec![record("1", 1, "A", "-1")],
    };
    let err = Importer::from_config(&ws.config(), &statement, ScriptedPrompter::default())
        .err()
        .unwrap();
    assert!(matches!(err, ImportError::Config(_)));

    fs::write(ws.path("broken.bean"), "2024-13-01 * \"Bad date\"\n").unwrap();
    let err = LedgerSnapshot::load(&ws.path("broken.bean")).unwrap_err();
    assert!(matches!(err, ImportError::Parse { .. }));
    assert!(err.is_fatal());
}
