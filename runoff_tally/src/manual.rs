/*!

This is the long-form manual for `runoff_tally` and `irvcount`.

## Input format

Every ballot export is a CSV file (`.csv` extension, LF or CRLF line endings) laid out as
follows, for an election with N candidates:

| ballot_num | cand. 1 .. N | no endorsement | cand. 1 .. N | no endorsement |
|------------|--------------|----------------|--------------|----------------|
| 1          | x            |                |              | x              |
| 2          |              | x              | x            |                |
| 3          |              |                |              |                |

* The first row is the header. The first half (round 1) and the second half (runoff)
  must carry exactly the same labels.
* Every other row starts with a ballot number, which must be numeric and not zero.
  A blank line has no ballot number, so it is rejected as well.
* A mark is any non-empty cell. What the cell contains does not matter: `x`, `1` and
  `yes` are all the same mark.
* The first row without any mark (row 3 above) ends the ballots. All the rows after it
  must be empty too, otherwise the file is rejected.

## Redundant exports

The same ballots may be exported several times, for instance by two independent
scanners. All the exports are given in order, and the last one is the reference. Each
other export is compared to it ballot by ballot, matching the rows from the end of the
files. Nothing is counted unless all the exports agree.

Note that when two exports do not contain the same number of ballots, no ballot is
compared: the exports are reported as different, with zero differing rows.

## Round 1

Each ballot may mark up to one candidate per seat. A ballot marking more candidates
than seats is rejected, and so is the whole count. Each mark counts for its candidate.
A ballot without any candidate mark counts for "no endorsement".

## Runoff decision

A runoff happens when there are more candidates than seats + 1, and no entry of the
round 1 tally reaches 60% of the ballots (the threshold can be configured). The entry
"no endorsement" is taken into account: a large share of blank ballots also prevents
the runoff.

## Runoff

The runoff half of each ballot may mark at most one candidate.

1. The candidates with the lowest round 1 count are eliminated, all the tied ones at the
   same time, until at most seats + 1 candidates are left. Ties may eliminate more
   candidates than strictly required.
2. All the marks for eliminated candidates are removed, in both halves of the ballots.
3. The runoff mark is added to the round 1 marks of a ballot when the ballot had voted
   for an eliminated candidate, or when it has fewer marks left than seats.
4. The ballots are counted again, with the same rules as round 1.

## Command line

```bash
irvcount --config election_config.json
irvcount --input scan_a.csv --input scan_b.csv --candidates 3 --seats 1
```

The summary is written in JSON format to the standard output, or to the file given with
`--out`. With `--reference`, the summary is compared to an expected summary and the
differences are printed.

The configuration file:

```json
{
  "outputSettings": { "contestName": "School board" },
  "ballotFiles": [ { "filePath": "scan_a.csv" }, { "filePath": "scan_b.csv" } ],
  "rules": { "numCandidates": 3, "numSeats": 1, "runoffThreshold": 60.0 }
}
```

Paths are relative to the configuration file.
*/
