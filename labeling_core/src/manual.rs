/*!

This is the long-form manual for `labeling_core` and `klabel`.

## Records

Records are read from a CSV file with a header line. Each line holds the day,
the station and the satellite, followed by one to three bracketed arrays of
numbers: the data, then optionally the latitudes and the longitudes.

```text
day,station,satellite,data,lat,lon
01/16/2025 07:00:00,ALGO,G07,"[1.2, 1.3, NaN, 1.5]","[45.9, 45.9]","[-78.1, -78.1]"
```

The arrays may be quoted or not. `NaN` is accepted inside an array. An array
that cannot be read is treated as empty, and a record without data is not
offered for labeling.

A record is identified by its day, station and satellite. Two lines with the
same triple are the same record.

## The store file

Labels, the consensus threshold and the pairwise votes are kept in one JSON
file that mirrors the tree of the realtime database used by the web version:

```json
{
  "labels": {
    "-6b86b273ff34fce19d6": {
      "userId": "anna", "day": "01/16/2025 07:00:00", "station": "ALGO",
      "satellite": "G07", "label": "good", "timestamp": 1737010980000
    }
  },
  "config": { "threshold": 0.6 },
  "votes": { "12": { "init": 0, "31": 2 } }
}
```

Under `votes`, the outer key is the winner and the inner keys are the losers.
The `init` entry is created the first time an item wins and carries no count.

A label whose value is neither `good` nor `bad` is ignored with a warning: it
does not count toward the total of its record, so it never shifts a verdict.
Older label entries that only carry an `entryKey` (`day|station|satellite`) are
still read.

Several `klabel` sessions can share one store file. Each change takes an
exclusive lock on `<store>.lock` next to the file, re-reads the file, applies
itself and writes the file back. A change that cannot be written is not kept.

## Commands

* `klabel label` shows records one at a time. Answer `g` (or `d`, right) for
  good and `b` (or `a`, left) for bad, `q` to stop. When every record was
  labeled once during the session, a notice is shown and the records are
  offered again.
* `klabel vote` shows two catalogue items. Answer `1` or `2` (or `a` / `d`).
* `klabel rank` prints the items with the most wins. Items with the same
  number of wins are listed by increasing number.
* `klabel consensus` computes the verdict of every labeled record and writes
  the good records to a CSV file with the extra columns `consensus_percent`,
  `total_labels` and `good_labels`.
* `klabel threshold` prints the threshold. With `--set`, it replaces it; this
  is only accepted when the `KLABEL_OPERATOR` environment variable is set.
  This check is a convenience to avoid mistakes, not an access control.

## Configuration

All the commands accept `--config` with a JSON file:

```json
{
  "dataFile": "real_data_with_latlon.csv",
  "storeFile": "store.json",
  "userId": "anna",
  "launchDate": "01/16/2025",
  "numItems": 110,
  "topK": 3,
  "outputFile": "good_data_entries.csv"
}
```

Relative paths are resolved from the directory of the configuration file.
Command line flags take precedence over the file.

`launchDate` is used by `consensus`: labels whose day only holds a time
(`07:03:00`) are attached to this date.

*/
