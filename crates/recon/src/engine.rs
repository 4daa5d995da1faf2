use std::collections::HashSet;

use colsync_table::{Cell, HeaderIndex, Table};

use crate::error::ReconError;
use crate::index::{build_index, SourceIndex};
use crate::mask::is_shadow;
use crate::model::{
    AuditOutcome, MismatchEntry, Mode, Outcome, ReconOptions, ReconReport, Selection,
    TargetColumn, UpdateOutcome,
};
use crate::report;

/// Run a reconciliation. Fails fast on unresolved columns or a bad row
/// range; otherwise a single pass over the target rows.
pub fn run(
    job_name: &str,
    mode: Mode,
    target: &Table,
    source: &Table,
    selection: &Selection,
    options: &ReconOptions,
) -> Result<ReconReport, ReconError> {
    let outcome = match mode {
        Mode::Update => Outcome::Update(reconcile_update(target, source, selection, options)?),
        Mode::Audit => Outcome::Audit(reconcile_audit(target, source, selection, options)?),
    };
    Ok(report::assemble(job_name, mode, outcome))
}

// ---------------------------------------------------------------------------
// Selection + range resolution (fail fast, before any row is touched)
// ---------------------------------------------------------------------------

struct ResolvedSelection {
    target_key: usize,
    /// None = synthesize a new column after the key.
    target_value: Option<usize>,
    source_key: usize,
    source_value: usize,
}

fn resolve_selection(
    mode: Mode,
    target: &Table,
    source: &Table,
    selection: &Selection,
) -> Result<ResolvedSelection, ReconError> {
    let target_headers = HeaderIndex::new(&target.headers);
    let source_headers = HeaderIndex::new(&source.headers);

    let resolve = |idx: &HeaderIndex, table: &'static str, name: &str| {
        idx.get(name).ok_or_else(|| ReconError::UnknownColumn {
            table,
            column: name.to_string(),
        })
    };

    let target_key = resolve(&target_headers, "target", &selection.target_key)?;
    let target_value = match &selection.target_value {
        TargetColumn::Existing(name) => Some(resolve(&target_headers, "target", name)?),
        TargetColumn::CreateAfterKey => {
            if mode == Mode::Audit {
                return Err(ReconError::CreateColumnInAudit);
            }
            None
        }
    };
    let source_key = resolve(&source_headers, "source", &selection.source_key)?;
    let source_value = resolve(&source_headers, "source", &selection.source_value)?;

    Ok(ResolvedSelection {
        target_key,
        target_value,
        source_key,
        source_value,
    })
}

/// Validate the optional 1-based row range and return it as a half-open
/// 0-based index range over the data rows.
fn resolve_row_range(options: &ReconOptions, rows: usize) -> Result<(usize, usize), ReconError> {
    match options.row_range {
        None => Ok((0, rows)),
        Some(range) => {
            if range.start < 1 || range.end < range.start || range.end > rows {
                return Err(ReconError::InvalidRowRange {
                    start: range.start,
                    end: range.end,
                    rows,
                });
            }
            Ok((range.start - 1, range.end))
        }
    }
}

// ---------------------------------------------------------------------------
// New-column synthesis
// ---------------------------------------------------------------------------

/// Pick a column name that does not collide with any existing header:
/// `"{base} (updated)"`, then `"{base} (updated) 1"`, and so on.
fn unique_column_name(headers: &[String], base: &str) -> String {
    let candidate = format!("{base} (updated)");
    if !headers.iter().any(|h| *h == candidate) {
        return candidate;
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base} (updated) {counter}");
        if !headers.iter().any(|h| *h == candidate) {
            return candidate;
        }
        counter += 1;
    }
}

// ---------------------------------------------------------------------------
// Per-row steps (pure; the walk just folds these)
// ---------------------------------------------------------------------------

struct UpdateStep {
    /// Key found in the source index, if any.
    found: Option<Cell>,
    /// Value to place in the target cell (set idempotently even on equality).
    write: Option<Cell>,
    /// Whether the write changes the stored value.
    changed: bool,
}

fn update_step(
    row: &[Cell],
    row_idx: usize,
    key_col: usize,
    target_col: usize,
    target: &Table,
    index: &SourceIndex,
    skip_if_filled: bool,
) -> UpdateStep {
    let skipped = UpdateStep { found: None, write: None, changed: false };

    if is_shadow(row_idx, key_col, &target.merged) || is_shadow(row_idx, target_col, &target.merged)
    {
        return skipped;
    }

    let key = &row[key_col];
    let Some(value) = index.get(key) else {
        return skipped;
    };

    if skip_if_filled && !row[target_col].is_blank() {
        return UpdateStep { found: Some(key.clone()), write: None, changed: false };
    }

    UpdateStep {
        found: Some(key.clone()),
        changed: row[target_col] != *value,
        write: Some(value.clone()),
    }
}

enum AuditStep {
    Skipped,
    Match { key: Cell },
    Mismatch { entry: MismatchEntry },
}

fn audit_step(
    row: &[Cell],
    row_idx: usize,
    key_col: usize,
    value_col: usize,
    target: &Table,
    index: &SourceIndex,
) -> AuditStep {
    if is_shadow(row_idx, key_col, &target.merged) || is_shadow(row_idx, value_col, &target.merged)
    {
        return AuditStep::Skipped;
    }

    let key = &row[key_col];
    let Some(source_value) = index.get(key) else {
        return AuditStep::Skipped;
    };

    if row[value_col] == *source_value {
        AuditStep::Match { key: key.clone() }
    } else {
        AuditStep::Mismatch {
            entry: MismatchEntry {
                key: key.clone(),
                target_value: row[value_col].clone(),
                source_value: source_value.clone(),
                row: row.to_vec(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Reconcilers
// ---------------------------------------------------------------------------

pub fn reconcile_update(
    target: &Table,
    source: &Table,
    selection: &Selection,
    options: &ReconOptions,
) -> Result<UpdateOutcome, ReconError> {
    let resolved = resolve_selection(Mode::Update, target, source, selection)?;
    let (start, end) = resolve_row_range(options, target.rows.len())?;

    let mut out = target.clone();
    let target_col = match resolved.target_value {
        Some(col) => col,
        None => {
            let name = unique_column_name(&out.headers, &selection.target_key);
            let at = resolved.target_key + 1;
            out.insert_column(at, name);
            at
        }
    };

    let index = build_index(source, resolved.source_key, resolved.source_value);

    let mut writes = 0usize;
    let mut found: HashSet<Cell> = HashSet::new();

    for i in start..end {
        let step = update_step(
            &out.rows[i],
            i,
            resolved.target_key,
            target_col,
            &out,
            &index,
            options.skip_if_filled,
        );
        if let Some(key) = step.found {
            found.insert(key);
        }
        if step.changed {
            writes += 1;
        }
        if let Some(value) = step.write {
            out.rows[i][target_col] = value;
        }
    }

    let not_found_keys = index
        .keys()
        .iter()
        .filter(|k| !found.contains(k))
        .cloned()
        .collect();

    Ok(UpdateOutcome { writes, not_found_keys, table: out })
}

pub fn reconcile_audit(
    target: &Table,
    source: &Table,
    selection: &Selection,
    options: &ReconOptions,
) -> Result<AuditOutcome, ReconError> {
    let resolved = resolve_selection(Mode::Audit, target, source, selection)?;
    let (start, end) = resolve_row_range(options, target.rows.len())?;

    // resolve_selection rejects the create sentinel in audit mode
    let value_col = resolved.target_value.ok_or(ReconError::CreateColumnInAudit)?;

    let index = build_index(source, resolved.source_key, resolved.source_value);

    let mut matches = 0usize;
    let mut mismatched: Vec<MismatchEntry> = Vec::new();
    let mut found: HashSet<Cell> = HashSet::new();

    for i in start..end {
        match audit_step(
            &target.rows[i],
            i,
            resolved.target_key,
            value_col,
            target,
            &index,
        ) {
            AuditStep::Skipped => {}
            AuditStep::Match { key } => {
                matches += 1;
                found.insert(key);
            }
            AuditStep::Mismatch { entry } => {
                found.insert(entry.key.clone());
                mismatched.push(entry);
            }
        }
    }

    let not_found_keys: Vec<Cell> = index
        .keys()
        .iter()
        .filter(|k| !found.contains(k))
        .cloned()
        .collect();

    Ok(AuditOutcome {
        matches,
        mismatches: mismatched.len(),
        not_found_keys,
        mismatched,
        headers: target.headers.clone(),
        target_column: match &selection.target_value {
            TargetColumn::Existing(name) => name.clone(),
            TargetColumn::CreateAfterKey => String::new(),
        },
        source_column: selection.source_value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowRange;
    use colsync_table::MergedRange;

    fn table(name: &str, headers: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        let mut t = Table::new(name, headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row);
        }
        t
    }

    fn selection(target_value: TargetColumn) -> Selection {
        Selection {
            target_key: "id".into(),
            target_value,
            source_key: "id".into(),
            source_value: "v".into(),
        }
    }

    fn scenario_tables() -> (Table, Table) {
        // A = [{id:1, val:null}, {id:2, val:"x"}]
        let a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::Empty],
                vec![Cell::number(2.0), Cell::text("x")],
            ],
        );
        // B = [{id:1, v:"a"}, {id:2, v:"x"}]
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("a")],
                vec![Cell::number(2.0), Cell::text("x")],
            ],
        );
        (a, b)
    }

    #[test]
    fn update_writes_only_changed_cells() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.writes, 1); // id=1 changes Empty -> "a"; id=2 already "x"
        assert!(out.not_found_keys.is_empty());
        assert_eq!(out.table.rows[0][1], Cell::text("a"));
        assert_eq!(out.table.rows[1][1], Cell::text("x"));
    }

    #[test]
    fn update_is_idempotent() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::Existing("val".into()));
        let opts = ReconOptions::default();
        let once = reconcile_update(&a, &b, &sel, &opts).unwrap();
        let twice = reconcile_update(&once.table, &b, &sel, &opts).unwrap();
        assert_eq!(twice.writes, 0);
        assert_eq!(twice.table.rows, once.table.rows);
    }

    #[test]
    fn audit_reports_matches_and_mismatches() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.matches, 1);
        assert_eq!(out.mismatches, 1);
        assert!(out.not_found_keys.is_empty());
        assert_eq!(out.mismatched.len(), 1);
        assert_eq!(out.mismatched[0].key, Cell::number(1.0));
        assert_eq!(out.mismatched[0].target_value, Cell::Empty);
        assert_eq!(out.mismatched[0].source_value, Cell::text("a"));
        assert_eq!(out.mismatched[0].row, a.rows[0]);
        assert_eq!(out.target_column, "val");
        assert_eq!(out.source_column, "v");
    }

    #[test]
    fn audit_equality_is_strict() {
        // Number 5 in the target vs text "5" in the source: a mismatch
        let a = table("a", &["id", "val"], vec![vec![Cell::number(1.0), Cell::number(5.0)]]);
        let b = table("b", &["id", "v"], vec![vec![Cell::number(1.0), Cell::text("5")]]);
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.matches, 0);
        assert_eq!(out.mismatches, 1);
    }

    #[test]
    fn duplicate_source_key_last_write_wins() {
        let a = table("a", &["id", "val"], vec![vec![Cell::number(1.0), Cell::Empty]]);
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("a")],
                vec![Cell::number(1.0), Cell::text("b")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.table.rows[0][1], Cell::text("b"));
    }

    #[test]
    fn shadow_target_rows_stay_untouched() {
        // Merge covers the val column at sheet rows 2..=3; data row 2 is the shadow
        let mut a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::Empty],
                vec![Cell::number(2.0), Cell::text("merged")],
                vec![Cell::number(3.0), Cell::Empty],
            ],
        );
        a.merged.push(MergedRange::new(2, 1, 3, 1));
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(2.0), Cell::text("new")],
                vec![Cell::number(3.0), Cell::text("new")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();

        // Row 1 is the primary cell: written. Row 2 is the shadow: untouched,
        // and its key never counts as found.
        assert_eq!(out.table.rows[1][1], Cell::text("new"));
        assert_eq!(out.table.rows[2], a.rows[2]);
        assert_eq!(out.not_found_keys, vec![Cell::number(3.0)]);
        assert_eq!(out.writes, 1);
    }

    #[test]
    fn shadow_rows_excluded_from_audit_counts() {
        let mut a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::text("x")],
                vec![Cell::number(2.0), Cell::Empty],
            ],
        );
        // Merge covers sheet rows 1..=2 of val: data row 0 is the primary,
        // data row 1 is the shadow
        a.merged.push(MergedRange::new(1, 1, 2, 1));
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("x")],
                vec![Cell::number(2.0), Cell::text("y")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.matches, 1);
        assert_eq!(out.mismatches, 0);
        assert_eq!(out.not_found_keys, vec![Cell::number(2.0)]);
    }

    #[test]
    fn create_column_inserts_after_key() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::CreateAfterKey);
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.table.headers, vec!["id", "id (updated)", "val"]);
        assert_eq!(out.table.rows[0][1], Cell::text("a"));
        assert_eq!(out.table.rows[1][1], Cell::text("x"));
        // the original value column is untouched
        assert_eq!(out.table.rows[0][2], Cell::Empty);
        assert_eq!(out.writes, 2);
    }

    #[test]
    fn create_column_disambiguates_name() {
        let a = table(
            "a",
            &["id", "id (updated)", "val"],
            vec![vec![Cell::number(1.0), Cell::text("old"), Cell::Empty]],
        );
        let b = table("b", &["id", "v"], vec![vec![Cell::number(1.0), Cell::text("new")]]);
        let sel = selection(TargetColumn::CreateAfterKey);
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(
            out.table.headers,
            vec!["id", "id (updated) 1", "id (updated)", "val"]
        );
        assert_eq!(out.table.rows[0][1], Cell::text("new"));
    }

    #[test]
    fn create_column_shifts_merged_and_validation_ranges() {
        let mut a = table(
            "a",
            &["id", "val"],
            vec![vec![Cell::number(1.0), Cell::Empty]],
        );
        a.merged.push(MergedRange::new(0, 1, 0, 1));
        let b = table("b", &["id", "v"], vec![vec![Cell::number(1.0), Cell::text("a")]]);
        let sel = selection(TargetColumn::CreateAfterKey);
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.table.merged[0].start_col, 2);
        assert_eq!(out.table.merged[0].end_col, 2);
    }

    #[test]
    fn not_found_keys_distinct_in_source_order() {
        let a = table("a", &["id", "val"], vec![vec![Cell::number(1.0), Cell::Empty]]);
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(9.0), Cell::text("x")],
                vec![Cell::number(1.0), Cell::text("a")],
                vec![Cell::number(9.0), Cell::text("y")],
                vec![Cell::number(7.0), Cell::text("z")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let out = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(out.not_found_keys, vec![Cell::number(9.0), Cell::number(7.0)]);
    }

    #[test]
    fn empty_target_reports_all_source_keys_missing() {
        let a = table("a", &["id", "val"], vec![]);
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("a")],
                vec![Cell::number(2.0), Cell::text("b")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let update = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(update.writes, 0);
        assert_eq!(update.not_found_keys.len(), 2);

        let audit = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(audit.matches + audit.mismatches, 0);
        assert_eq!(audit.not_found_keys.len(), 2);
    }

    #[test]
    fn row_range_limits_the_walk() {
        let a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::Empty],
                vec![Cell::number(2.0), Cell::Empty],
                vec![Cell::number(3.0), Cell::Empty],
            ],
        );
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("a")],
                vec![Cell::number(2.0), Cell::text("b")],
                vec![Cell::number(3.0), Cell::text("c")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let opts = ReconOptions {
            row_range: Some(RowRange { start: 2, end: 2 }),
            ..Default::default()
        };
        let out = reconcile_update(&a, &b, &sel, &opts).unwrap();
        assert_eq!(out.writes, 1);
        assert_eq!(out.table.rows[0][1], Cell::Empty);
        assert_eq!(out.table.rows[1][1], Cell::text("b"));
        assert_eq!(out.table.rows[2][1], Cell::Empty);
        // out-of-range keys were never found
        assert_eq!(
            out.not_found_keys,
            vec![Cell::number(1.0), Cell::number(3.0)]
        );
    }

    #[test]
    fn invalid_row_range_fails_fast() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::Existing("val".into()));
        for (start, end) in [(0, 1), (2, 1), (1, 3)] {
            let opts = ReconOptions {
                row_range: Some(RowRange { start, end }),
                ..Default::default()
            };
            let err = reconcile_update(&a, &b, &sel, &opts).unwrap_err();
            assert!(matches!(err, ReconError::InvalidRowRange { .. }), "{start}..{end}");
        }
    }

    #[test]
    fn unknown_column_fails_fast() {
        let (a, b) = scenario_tables();
        let sel = Selection {
            target_key: "nope".into(),
            target_value: TargetColumn::Existing("val".into()),
            source_key: "id".into(),
            source_value: "v".into(),
        };
        let err = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ReconError::UnknownColumn { table: "target", column: "nope".into() }
        );
    }

    #[test]
    fn create_column_rejected_in_audit() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::CreateAfterKey);
        let err = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap_err();
        assert_eq!(err, ReconError::CreateColumnInAudit);
    }

    #[test]
    fn skip_if_filled_preserves_existing_data() {
        let a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::text("keep")],
                vec![Cell::number(2.0), Cell::Empty],
            ],
        );
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("clobber")],
                vec![Cell::number(2.0), Cell::text("fill")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let opts = ReconOptions { skip_if_filled: true, ..Default::default() };
        let out = reconcile_update(&a, &b, &sel, &opts).unwrap();
        assert_eq!(out.table.rows[0][1], Cell::text("keep"));
        assert_eq!(out.table.rows[1][1], Cell::text("fill"));
        assert_eq!(out.writes, 1);
        // the skipped key still counts as found
        assert!(out.not_found_keys.is_empty());
    }

    #[test]
    fn audit_mismatch_set_equals_update_write_set() {
        // Audit symmetry: with no shadows, matches + mismatches covers every
        // target row whose key is indexed, and the mismatched keys are
        // exactly the keys update mode would rewrite.
        let a = table(
            "a",
            &["id", "val"],
            vec![
                vec![Cell::number(1.0), Cell::text("same")],
                vec![Cell::number(2.0), Cell::text("stale")],
                vec![Cell::number(3.0), Cell::Empty],
                vec![Cell::number(99.0), Cell::text("orphan")],
            ],
        );
        let b = table(
            "b",
            &["id", "v"],
            vec![
                vec![Cell::number(1.0), Cell::text("same")],
                vec![Cell::number(2.0), Cell::text("fresh")],
                vec![Cell::number(3.0), Cell::text("filled")],
            ],
        );
        let sel = selection(TargetColumn::Existing("val".into()));
        let audit = reconcile_audit(&a, &b, &sel, &ReconOptions::default()).unwrap();
        let update = reconcile_update(&a, &b, &sel, &ReconOptions::default()).unwrap();

        assert_eq!(audit.matches + audit.mismatches, 3);
        assert_eq!(audit.mismatches, update.writes);
        let mismatch_keys: Vec<&Cell> = audit.mismatched.iter().map(|m| &m.key).collect();
        assert_eq!(mismatch_keys, vec![&Cell::number(2.0), &Cell::number(3.0)]);
    }

    #[test]
    fn run_stamps_meta() {
        let (a, b) = scenario_tables();
        let sel = selection(TargetColumn::Existing("val".into()));
        let report = run("nightly", Mode::Update, &a, &b, &sel, &ReconOptions::default()).unwrap();
        assert_eq!(report.meta.job_name, "nightly");
        assert_eq!(report.meta.mode, Mode::Update);
        assert_eq!(report.meta.engine_version, env!("CARGO_PKG_VERSION"));
        assert!(report.as_update().is_some());
    }
}
