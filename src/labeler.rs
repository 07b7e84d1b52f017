use log::{debug, info, warn};

use labeling_core::consensus::{good_records, summarize};
use labeling_core::tally::scores;
use labeling_core::*;
use snafu::{prelude::*, Snafu};

use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::labeler::config_reader::*;
use crate::labeler::io_store::JsonFileStore;

mod config_reader;
mod io_csv;
mod io_store;
mod terminal;

/// Environment variable that marks the machine of the operator of the campaign.
pub const OPERATOR_ENV: &str = "KLABEL_OPERATOR";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LabelerError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile { source: io::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile { source: io::Error, path: String },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error opening the CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error writing the CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("{source}"))]
    Labeling { source: LabelingError },
    #[snafu(display("Error while talking to the terminal"))]
    Terminal { source: io::Error },
    #[snafu(display("The setting {name} is missing (use the command line or the config file)"))]
    MissingSetting { name: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type LabelerResult<T> = Result<T, LabelerError>;

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn load_config(args: &Args) -> LabelerResult<LabelerConfig> {
    let mut config = match &args.config {
        Some(p) => read_config(p)?,
        None => LabelerConfig::default(),
    };
    if let Some(s) = &args.store {
        config.store_file = Some(s.clone());
    }
    debug!("load_config: {:?}", config);
    Ok(config)
}

fn required(value: Option<String>, name: &str) -> LabelerResult<String> {
    value.context(MissingSettingSnafu { name })
}

fn open_store(config: &LabelerConfig) -> LabelerResult<JsonFileStore> {
    let path = required(config.store_file.clone(), "storeFile")?;
    JsonFileStore::open(&path)
}

pub fn run(args: &Args) -> LabelerResult<()> {
    let config = load_config(args)?;
    match args.command.clone() {
        Command::Label { data, user } => {
            let data_file = required(data.or(config.data_file.clone()), "dataFile")?;
            let user = user.or(config.user_id.clone()).map(UserId);
            run_label(&data_file, user, &mut open_store(&config)?)
        }
        Command::Vote { num_items } => {
            let n = num_items.or(config.num_items).unwrap_or(DEFAULT_NUM_ITEMS);
            run_vote(n, &mut open_store(&config)?)
        }
        Command::Rank {
            num_items,
            top,
            reference,
        } => {
            let n = num_items.or(config.num_items).unwrap_or(DEFAULT_NUM_ITEMS);
            let top_k = top.or(config.top_k).unwrap_or(DEFAULT_TOP_K);
            let store = open_store(&config)?;
            let js = build_ranking_js(&store, n, top_k)?;
            print_and_check(&js, reference)
        }
        Command::Consensus {
            data,
            out,
            threshold,
            launch_date,
            reference,
        } => {
            let data_file = required(data.or(config.data_file.clone()), "dataFile")?;
            let store = open_store(&config)?;
            let threshold = match threshold {
                Some(raw) => Threshold::parse(&raw).context(LabelingSnafu {})?,
                None => store.read_threshold().context(LabelingSnafu {})?,
            };
            let js = run_consensus(
                &data_file,
                &store,
                threshold,
                launch_date.or(config.launch_date.clone()).as_deref(),
                out.or(config.output_file.clone()).as_deref(),
            )?;
            print_and_check(&js, reference)
        }
        Command::Threshold { set } => {
            let mut store = open_store(&config)?;
            let is_operator = std::env::var_os(OPERATOR_ENV).is_some();
            let t = run_threshold(&mut store, set.as_deref(), is_operator)?;
            println!("threshold: {}", t.value());
            Ok(())
        }
    }
}

fn run_label(data_file: &str, user: Option<UserId>, store: &mut JsonFileStore) -> LabelerResult<()> {
    let records = io_csv::read_records(data_file)?;
    info!("Loaded {} records from {:?}", records.len(), data_file);
    if user.is_none() {
        warn!("No user identity: the decisions will not be stored");
    }
    let mut session = LabelingSession::resume(records, user, &*store).context(LabelingSnafu {})?;
    let mut rng = rand::thread_rng();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let n = terminal::run_labeling(
        &mut session,
        store,
        &mut rng,
        &mut input,
        &mut output,
        now_millis,
    )?;
    info!("Session ended after {} decisions", n);
    Ok(())
}

fn run_vote(num_items: u32, store: &mut JsonFileStore) -> LabelerResult<()> {
    let mut rng = rand::thread_rng();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let n = terminal::run_voting(store, num_items, &mut rng, &mut input, &mut output)?;
    info!("Session ended after {} votes", n);
    Ok(())
}

/// The ranking of the catalogue, in JSON.
fn build_ranking_js<S: VoteStore + ?Sized>(
    store: &S,
    num_items: u32,
    top_k: usize,
) -> LabelerResult<JSValue> {
    let matrix = store.score_matrix().context(LabelingSnafu {})?;
    let totals = scores(&matrix, num_items);
    let top: Vec<JSValue> = rank(&matrix, num_items, top_k)
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            json!({
                "rank": idx + 1,
                "item": item_name(*id),
                "wins": totals[(id.0 - 1) as usize].1,
            })
        })
        .collect();
    Ok(json!({ "numItems": num_items, "top": top }))
}

/// Catalogue items are Messier objects.
pub fn item_name(id: ItemId) -> String {
    format!("M{}", id.0)
}

fn run_consensus<S: LabelStore + ?Sized>(
    data_file: &str,
    store: &S,
    threshold: Threshold,
    launch_date: Option<&str>,
    out: Option<&str>,
) -> LabelerResult<JSValue> {
    info!(
        "Analysing labels of {:?} with threshold {} (launch date {:?})",
        data_file,
        threshold.value(),
        launch_date
    );
    let records = io_csv::read_records(data_file)?;
    let labels = store.all_labels().context(LabelingSnafu {})?;
    if labels.is_empty() {
        warn!("No labels found in the store");
    }
    let grouped = consensus_by_record(&labels, threshold, launch_date);
    let good = good_records(&records, &grouped);
    if let Some(path) = out {
        if good.is_empty() {
            warn!("No good entries found, not writing {:?}", path);
        } else {
            io_csv::write_good_records(path, &good)?;
            info!("Saved {} good entries to {:?}", good.len(), path);
        }
    }
    let summary = summarize(&grouped, good.len(), threshold);
    Ok(summary_js(&summary))
}

fn summary_js(s: &AnalysisSummary) -> JSValue {
    json!({
        "threshold": s.threshold.value(),
        "analysed": s.analysed,
        "good": s.good,
        "bad": s.bad,
        "averageGoodPercent": s.average_good_fraction.map(|f| format!("{:.1}", f * 100.0)),
    })
}

/// Prints the threshold, or replaces it when `set` is given.
///
/// Replacing is only accepted on the operator machine. This is not an access
/// control: anyone can set the variable.
fn run_threshold<S: ThresholdStore + ?Sized>(
    store: &mut S,
    set: Option<&str>,
    is_operator: bool,
) -> LabelerResult<Threshold> {
    match set {
        None => store.read_threshold().context(LabelingSnafu {}),
        Some(_) if !is_operator => {
            whatever!(
                "Threshold updates are only available on the operator machine (set {})",
                OPERATOR_ENV
            )
        }
        Some(raw) => match update_threshold(store, raw) {
            Ok(t) => Ok(t),
            Err(e) => {
                eprintln!("Invalid threshold {:?}, the threshold was not changed", raw);
                Err(e).context(LabelingSnafu {})
            }
        },
    }
}

fn print_and_check(js: &JSValue, reference: Option<String>) -> LabelerResult<()> {
    let pretty_js = serde_json::to_string_pretty(js).context(SerializingJsonSnafu {})?;
    println!("{}", pretty_js);

    // The reference output, if provided for comparison
    if let Some(ref_p) = reference {
        let ref_js = read_reference(&ref_p)?;
        let pretty_ref = serde_json::to_string_pretty(&ref_js).context(SerializingJsonSnafu {})?;
        if pretty_ref != pretty_js {
            warn!("Found differences with the reference {:?}", ref_p);
            print_diff(pretty_ref.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between the output and the reference")
        }
    }
    Ok(())
}

pub fn resolve_path(root: &Path, p: &str) -> String {
    let path = Path::new(p);
    if path.is_absolute() {
        p.to_string()
    } else {
        root.join(path).display().to_string()
    }
}
