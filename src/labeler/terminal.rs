// Line-oriented labeling and voting loops.

use std::io::{BufRead, Write};

use labeling_core::tally::{check_item, choose_pair};
use labeling_core::*;
use rand::Rng;

use crate::labeler::*;

pub const RECYCLE_NOTICE: &str = "All entries labeled once. Recycling for continued labeling.";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Answer<T> {
    Pick(T),
    Quit,
    Unknown,
}

fn read_answer<R: BufRead>(input: &mut R) -> LabelerResult<Option<String>> {
    let mut line = String::new();
    let n = input.read_line(&mut line).context(TerminalSnafu {})?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

// Left is bad, right is good.
fn parse_label(s: &str) -> Answer<LabelValue> {
    match s {
        "g" | "good" | "d" | "right" => Answer::Pick(LabelValue::Good),
        "b" | "bad" | "a" | "left" => Answer::Pick(LabelValue::Bad),
        "q" | "quit" => Answer::Quit,
        _ => Answer::Unknown,
    }
}

fn parse_side(s: &str) -> Answer<usize> {
    match s {
        "1" | "a" | "left" => Answer::Pick(0),
        "2" | "d" | "right" => Answer::Pick(1),
        "q" | "quit" => Answer::Quit,
        _ => Answer::Unknown,
    }
}

/// A short textual rendition of a record.
pub fn describe(record: &Record) -> String {
    let finite: Vec<f64> = record.data.iter().cloned().filter(|x| x.is_finite()).collect();
    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut s = format!("{}\n  {} points", record.key(), record.data.len());
    if !finite.is_empty() {
        s.push_str(&format!(", min {:.3}, max {:.3}", min, max));
    }
    if finite.len() < record.data.len() {
        s.push_str(&format!(", {} missing", record.data.len() - finite.len()));
    }
    if record.lat.is_some() && record.lon.is_some() {
        s.push_str(", with geolocation trace");
    }
    s
}

/// Runs labeling rounds until the user quits or the input ends.
///
/// Returns the number of decisions made.
pub fn run_labeling<S, G, R, W, C>(
    session: &mut LabelingSession,
    store: &mut S,
    rng: &mut G,
    input: &mut R,
    output: &mut W,
    clock: C,
) -> LabelerResult<usize>
where
    S: LabelStore + ?Sized,
    G: Rng + ?Sized,
    R: BufRead,
    W: Write,
    C: Fn() -> i64,
{
    let mut decisions = 0;
    loop {
        let round = session.start_round(rng).context(LabelingSnafu {})?;
        let text = describe(round.record);
        if round.recycled {
            write!(output, "{} Press Enter to continue. ", RECYCLE_NOTICE).context(TerminalSnafu {})?;
            output.flush().context(TerminalSnafu {})?;
            if read_answer(input)?.is_none() {
                break;
            }
        }
        writeln!(output, "{}", text).context(TerminalSnafu {})?;
        write!(output, "[b]ad / [g]ood / [q]uit > ").context(TerminalSnafu {})?;
        output.flush().context(TerminalSnafu {})?;

        let answer = match read_answer(input)? {
            Some(s) => parse_label(&s),
            None => break,
        };
        match answer {
            Answer::Pick(label) => {
                session
                    .decide(label, store, clock())
                    .context(LabelingSnafu {})?;
                decisions += 1;
            }
            Answer::Quit => break,
            Answer::Unknown => {
                // The same record is shown again.
                writeln!(output, "Unknown answer").context(TerminalSnafu {})?;
            }
        }
    }
    Ok(decisions)
}

/// Runs pairwise comparisons until the user quits or the input ends.
///
/// Returns the number of votes stored.
pub fn run_voting<S, G, R, W>(
    store: &mut S,
    num_items: u32,
    rng: &mut G,
    input: &mut R,
    output: &mut W,
) -> LabelerResult<usize>
where
    S: VoteStore + ?Sized,
    G: Rng + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut votes = 0;
    let mut pair = choose_pair(rng, num_items).context(LabelingSnafu {})?;
    loop {
        let (left, right) = pair;
        check_item(left, num_items).context(LabelingSnafu {})?;
        check_item(right, num_items).context(LabelingSnafu {})?;
        writeln!(output, "[1] {}    [2] {}", item_name(left), item_name(right))
            .context(TerminalSnafu {})?;
        write!(output, "Which one do you prefer? [1/2/q] > ").context(TerminalSnafu {})?;
        output.flush().context(TerminalSnafu {})?;

        let answer = match read_answer(input)? {
            Some(s) => parse_side(&s),
            None => break,
        };
        let (winner, loser) = match answer {
            Answer::Pick(0) => (left, right),
            Answer::Pick(_) => (right, left),
            Answer::Quit => break,
            Answer::Unknown => {
                writeln!(output, "Unknown answer").context(TerminalSnafu {})?;
                continue;
            }
        };
        record_win(store, winner, loser).context(LabelingSnafu {})?;
        votes += 1;
        pair = choose_pair(rng, num_items).context(LabelingSnafu {})?;
    }
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                day: "d1".to_string(),
                station: format!("S{}", i),
                satellite: "G01".to_string(),
                data: vec![1.0, f64::NAN, 3.0],
                lat: Some(vec![45.0]),
                lon: Some(vec![-78.0]),
            })
            .collect()
    }

    #[test]
    fn labeling_loop_with_recycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(records(2), Some(UserId("anna".to_string())));
        // Two decisions, an unknown answer, the recycle notice, one more decision.
        let mut input = Cursor::new("g\nwhat\nleft\n\nb\nq\n");
        let mut output: Vec<u8> = Vec::new();
        let n = run_labeling(&mut session, &mut store, &mut rng, &mut input, &mut output, || 7)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(store.len(), 3);
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches(RECYCLE_NOTICE).count(), 1);
        assert!(text.contains("Unknown answer"));
        assert!(text.contains("3 points, min 1.000, max 3.000, 1 missing, with geolocation trace"));
        let labels = store.all_labels().unwrap();
        assert_eq!(labels[0].label, LabelValue::Good);
        assert_eq!(labels[1].label, LabelValue::Bad);
        assert_eq!(labels[2].label, LabelValue::Bad);
        assert!(labels.iter().all(|l| l.timestamp == 7));
    }

    #[test]
    fn labeling_stops_at_end_of_input() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(records(3), None);
        let mut input = Cursor::new("g\n");
        let mut output: Vec<u8> = Vec::new();
        let n = run_labeling(&mut session, &mut store, &mut rng, &mut input, &mut output, || 0)
            .unwrap();
        assert_eq!(n, 1);
        // No identity: nothing stored.
        assert!(store.is_empty());
    }

    #[test]
    fn empty_records_are_reported() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(Vec::new(), None);
        let mut input = Cursor::new("g\n");
        let mut output: Vec<u8> = Vec::new();
        let err = run_labeling(&mut session, &mut store, &mut rng, &mut input, &mut output, || 0)
            .unwrap_err();
        assert!(matches!(
            err,
            LabelerError::Labeling {
                source: LabelingError::EmptyRecordSet
            }
        ));
    }

    #[test]
    fn voting_loop() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut store = MemoryStore::new();
        let mut input = Cursor::new("1\n2\n?\na\nq\n");
        let mut output: Vec<u8> = Vec::new();
        let n = run_voting(&mut store, 5, &mut rng, &mut input, &mut output).unwrap();
        assert_eq!(n, 3);
        let m = store.score_matrix().unwrap();
        let total: u64 = labeling_core::tally::scores(&m, 5).iter().map(|(_, s)| *s).sum();
        assert_eq!(total, 3);
        assert!(String::from_utf8(output).unwrap().contains("Unknown answer"));
    }

    #[test]
    fn voting_needs_two_items() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut store = MemoryStore::new();
        let mut input = Cursor::new("1\n");
        let mut output: Vec<u8> = Vec::new();
        assert!(run_voting(&mut store, 1, &mut rng, &mut input, &mut output).is_err());
    }
}
