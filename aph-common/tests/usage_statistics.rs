mod common;

use aph_common::catalogue::Catalogue;
use aph_common::invoker::ToolInvoker;
use aph_common::plan::compile;
use aph_common::stages::{Invocation, StageScope};
use aph_common::stats::{
    self, MERGED_REPORT_FILE, SymbolCounts, SymbolKey, THIRD_PARTY_FILE, aggregate,
    collect_reports,
};
use aph_common::testing::LocalFixtureProvider;
use aph_common::types::{Platform, RunMode};
use aph_common::{ExecutionEngine, RunConfig, test_log};
use common::{Workspace, init_test_logging};
use std::fs;
use std::path::{Path, PathBuf};

const CATALOGUE: &str = r#"{
    "tests": [
        {"name": "Wallet", "repo": "https://example.com/wallet.git", "path": "applet", "jckit": "222",
         "subtests": [{"executable": "credit", "input": "00"}]},
        {"name": "Loyalty", "repo": "https://example.com/loyalty.git", "path": "applet", "jckit": "222",
         "subtests": [{"executable": "debit", "input": "00"}]},
        {"name": "Legacy", "archive": "https://example.com/legacy.zip", "path": "src", "jckit": "222",
         "linux": false,
         "subtests": [{"executable": "x", "input": "00"}]}
    ]
}"#;

const WALLET_REPORT: &str = "\
# package/outer type,type,member,frequency
pkg,Foo,,3
pkg,Foo,,1
pkg,Foo,,2
javacard.framework,Util,\"arrayCopy(byte[],short,byte[],short,short)\",4
javacard.framework,APDU,getBuffer(),1
com.wallet,Helper,,1
";

const LOYALTY_REPORT: &str = "\
# CSV generated in permissive mode! Some imports or types could not be resolved.
# Please, do a rerun with a complete class path.
#
# package/outer type,type,member,frequency
pkg,Foo,,1
javacard.framework,ISO7816,SW_NO_ERROR,2
javacard.framework,APDU,getBuffer(),7
";

fn write_manifests(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("constants-in.txt"),
        "# javacard.framework.ISO7816\nSW_NO_ERROR\nSW_UNKNOWN\n",
    )
    .unwrap();
    fs::write(dir.join("types-in.txt"), "# pkg\nFoo\nBar\n").unwrap();
    fs::write(
        dir.join("methods-in.txt"),
        "# javacard.framework.APDU\ngetBuffer()\n\n# javacard.framework.Util\narrayCopy(byte[],short,byte[],short,short)\n",
    )
    .unwrap();
}

fn write_report(stats_dir: &Path, slug: &str, text: &str) {
    let workdir = stats_dir.join(format!("{slug}_stats_abc123"));
    fs::create_dir_all(&workdir).unwrap();
    fs::write(workdir.join(stats::merge::USAGE_REPORT_FILE), text).unwrap();
}

struct StatsFixture {
    ws: Workspace,
    stats_dir: PathBuf,
    manifests: PathBuf,
}

fn fixture() -> StatsFixture {
    let ws = Workspace::new();
    let stats_dir = ws.path().join("stats_out");
    let manifests = ws.path().join("manifests");
    write_manifests(&manifests);
    write_report(&stats_dir, "Wallet", WALLET_REPORT);
    write_report(&stats_dir, "Loyalty", LOYALTY_REPORT);
    StatsFixture {
        ws,
        stats_dir,
        manifests,
    }
}

#[test]
fn test_type_used_by_two_projects_counts_two() {
    init_test_logging();
    let fx = fixture();
    let catalogue = Catalogue::from_json_str(CATALOGUE).unwrap();
    let reports = collect_reports(&catalogue.tests, &fx.stats_dir, Platform::Linux).unwrap();
    let (merged, summary) = stats::merge_reports(&reports);

    let counts = SymbolCounts::from_merged(&merged);
    assert_eq!(counts.get(&SymbolKey::of_type("pkg", "Foo")), 2);
    assert_eq!(
        counts.get(&SymbolKey::of_member("javacard.framework", "APDU", "getBuffer()")),
        2
    );
    assert_eq!(summary.projects, 3);
    assert_eq!(summary.disabled, 1);
    assert_eq!(summary.incomplete, vec!["Loyalty".to_string()]);
}

#[test]
fn test_tables_and_third_party_leftovers() {
    init_test_logging();
    let fx = fixture();
    let out = fx.ws.path().join("tables");
    let catalogue = Catalogue::from_json_str(CATALOGUE).unwrap();
    let reports = collect_reports(&catalogue.tests, &fx.stats_dir, Platform::Linux).unwrap();

    let summary = aggregate(&reports, &fx.manifests, &out).unwrap();
    test_log!("aggregate summary: {summary:?}");

    let types = fs::read_to_string(out.join("types.txt")).unwrap();
    assert_eq!(
        types,
        "# Number of projects that use the given symbol\n\n# pkg\nFoo - 2\nBar - 0\n"
    );
    let methods = fs::read_to_string(out.join("methods.txt")).unwrap();
    assert!(methods.contains("# javacard.framework.APDU\ngetBuffer() - 2\n"));
    assert!(methods.contains("arrayCopy(byte[],short,byte[],short,short) - 1\n"));
    let constants = fs::read_to_string(out.join("constants.txt")).unwrap();
    assert!(constants.contains("SW_NO_ERROR - 1\nSW_UNKNOWN - 0\n"));

    let third_party = fs::read_to_string(out.join(THIRD_PARTY_FILE)).unwrap();
    assert_eq!(
        third_party,
        "# Number of projects that use the given symbol\n\
         # package,type[,member] - count\n\n\
         com.wallet,Helper - 1\n"
    );
    assert_eq!(summary.third_party, 1);
    assert_eq!(summary.symbols, 5);

    let merged = fs::read_to_string(out.join(MERGED_REPORT_FILE)).unwrap();
    assert!(merged.contains("# Applet: Legacy\n# Archive: https://example.com/legacy.zip\n# Path: src\n\ndisabled on Linux\n"));
}

#[test]
fn test_aggregation_is_idempotent() {
    init_test_logging();
    let fx = fixture();
    let catalogue = Catalogue::from_json_str(CATALOGUE).unwrap();
    let reports = collect_reports(&catalogue.tests, &fx.stats_dir, Platform::Linux).unwrap();

    let first = fx.ws.path().join("first");
    let second = fx.ws.path().join("second");
    let a = aggregate(&reports, &fx.manifests, &first).unwrap();
    let b = aggregate(&reports, &fx.manifests, &second).unwrap();
    assert_eq!(a, b);

    for name in [
        MERGED_REPORT_FILE,
        "constants.txt",
        "types.txt",
        "methods.txt",
        THIRD_PARTY_FILE,
    ] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap(),
            "{name} differs between runs"
        );
    }
}

/// Fake profiler that writes a usage report into the unit's working directory.
struct ReportingInvoker {
    report: &'static str,
}

impl ToolInvoker for ReportingInvoker {
    fn invoke(&mut self, invocation: &Invocation) -> aph_common::Result<i32> {
        assert_eq!(invocation.scope, StageScope::Unbounded);
        let workdir = invocation
            .args
            .windows(2)
            .find(|pair| pair[0] == "--work-dir")
            .map(|pair| PathBuf::from(&pair[1]))
            .expect("statistics invocation carries a work dir");
        fs::write(workdir.join(stats::merge::USAGE_REPORT_FILE), self.report)?;
        Ok(0)
    }
}

#[test]
fn test_statistics_run_feeds_the_aggregator() {
    init_test_logging();
    let ws = Workspace::new();
    ws.add_applet("Wallet", "applet");
    ws.add_applet("Loyalty", "applet");
    let stats_dir = ws.path().join("stats_out");
    let manifests = ws.path().join("manifests");
    write_manifests(&manifests);

    let catalogue = Catalogue::from_json_str(CATALOGUE).unwrap();
    let config = RunConfig::new(RunMode::Stats)
        .with_platform(Platform::Linux)
        .with_output_dir(&stats_dir)
        .validate()
        .unwrap();
    let plan = compile(&catalogue, &config).unwrap();
    assert_eq!(plan.units.len(), 2);

    let mut engine = ExecutionEngine::new(
        &config,
        &ws.layout,
        ws.path(),
        ReportingInvoker {
            report: "pkg,Foo,,1\npkg,Foo,,1\n",
        },
        LocalFixtureProvider::new(&ws.sources),
    );
    let report = engine.run(&plan).unwrap();
    assert_eq!(report.units_succeeded, 2);

    let reports = collect_reports(&catalogue.tests, &stats_dir, Platform::Linux).unwrap();
    let summary = aggregate(&reports, &manifests, &ws.path().join("tables")).unwrap();
    assert!(summary.merge.missing.is_empty());
    let types = fs::read_to_string(ws.path().join("tables").join("types.txt")).unwrap();
    assert!(types.contains("Foo - 2\n"));
}
