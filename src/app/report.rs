use crate::retention::{ResolvedSchema, RunMode, RunReport, Verification};
use crate::ui::style;

const SAMPLE_SHOWN: usize = 10;

pub fn render_run_report(report: &RunReport) -> String {
    let title = match report.mode {
        RunMode::Live => "keepsweep run",
        RunMode::DryRun => "keepsweep plan (dry run, nothing deleted)",
    };
    let mut lines = vec![
        format!("◆ {}", style::header(title)),
        String::new(),
        format!("  schema      {}", report.schema_version),
        format!("  keep        {}", report.keep.join(", ")),
        format!(
            "  started     {}",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        String::new(),
        format!(
            "  principals  {} total, {} kept, {} to delete",
            report.census.total,
            report.census.kept_present,
            style::danger(report.census.to_delete)
        ),
    ];

    let shown = report.census.sample.len().min(SAMPLE_SHOWN);
    for id in &report.census.sample[..shown] {
        lines.push(format!("    ✗ {id}"));
    }
    let unshown = report.census.to_delete.saturating_sub(shown as u64);
    if unshown > 0 {
        lines.push(style::dim(format!("    ... and {unshown} more")));
    }

    for (tier, count) in &report.retained {
        lines.push(format!("  {tier:<11} {count} retained"));
    }
    for tier in &report.membership_fallbacks {
        lines.push(style::warning(format!(
            "  ⚠ {tier}: membership missing, every entity treated as unreferenced"
        )));
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {}", style::header("Skipped")));
        for mismatch in &report.skipped {
            lines.push(style::warning(format!("    ⚠ {mismatch}")));
        }
    }

    lines.push(String::new());
    let verb = match report.mode {
        RunMode::Live => "deleted",
        RunMode::DryRun => "would delete",
    };
    lines.push(format!("  {}", style::header("Steps")));
    for step in &report.steps {
        let rows = if step.rows > 0 {
            style::danger(step.rows)
        } else {
            style::dim(step.rows)
        };
        lines.push(format!(
            "    {:>3}. [{}] {}.{} {verb} {rows}",
            step.step,
            step.phase,
            style::value(&step.table),
            step.column
        ));
    }
    lines.push(format!("  total       {} rows {verb}", report.total_rows()));

    if let Some(verification) = &report.verification {
        lines.push(String::new());
        lines.push(render_verification(verification));
    }

    lines.join("\n")
}

pub fn render_verification(verification: &Verification) -> String {
    let mut lines = vec![format!("  {}", style::header("Verification"))];
    if verification.is_clean() {
        lines.push(style::success("    ✓ store matches the keep set"));
    } else {
        for warning in &verification.warnings {
            lines.push(style::warning(format!("    ⚠ {warning}")));
        }
    }

    let snapshot = &verification.snapshot;
    lines.push(format!("    principals remaining: {}", snapshot.principals.len()));
    for row in &snapshot.principals {
        let status = row
            .status
            .iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        if status.is_empty() {
            lines.push(format!("      {}", row.id));
        } else {
            lines.push(format!("      {} {}", row.id, style::dim(status)));
        }
    }
    for (tier, rows) in &snapshot.entities {
        lines.push(format!("    {tier} entities remaining: {rows}"));
    }
    for (table, rows) in &snapshot.content {
        lines.push(format!("    {} rows remaining: {rows}", style::value(table)));
    }
    lines.join("\n")
}

pub fn render_schema(schema: &ResolvedSchema) -> String {
    let mut lines = vec![
        format!("◆ {}", style::header("keepsweep inspect")),
        String::new(),
        format!("  schema      {}", schema.version),
        format!(
            "  principal   {}.{}",
            style::value(&schema.principal.table),
            schema.principal.column
        ),
    ];
    if !schema.principal.status_columns.is_empty() {
        lines.push(format!(
            "  status      {}",
            schema.principal.status_columns.join(", ")
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "  {} ({})",
        style::header("Owned by principal"),
        schema.owned.len()
    ));
    for spec in &schema.owned {
        lines.push(format!("    ✓ {}.{}", style::value(&spec.table), spec.column));
    }

    for tier in &schema.tiers {
        lines.push(String::new());
        lines.push(format!(
            "  {} (owned by {})",
            style::header(format!("Tier {}", tier.name)),
            tier.parent
        ));
        match &tier.entity {
            Some(entity) => lines.push(format!(
                "    ✓ entity      {}.{}",
                style::value(&entity.table),
                entity.column
            )),
            None => lines.push(style::warning("    ⚠ entity      absent")),
        }
        match &tier.membership {
            Some(membership) => lines.push(format!(
                "    ✓ membership  {}({}, {})",
                style::value(&membership.table),
                membership.entity_column,
                membership.owner_column
            )),
            None => lines.push(style::warning(format!(
                "    ⚠ membership  {} absent",
                tier.membership_table
            ))),
        }
        for spec in &tier.content {
            lines.push(format!(
                "    ✓ content     {}.{}",
                style::value(&spec.table),
                spec.column
            ));
        }
    }

    if !schema.skipped.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "  {} ({})",
            style::header("Skipped"),
            schema.skipped.len()
        ));
        for mismatch in &schema.skipped {
            lines.push(style::warning(format!("    ✗ {mismatch}")));
        }
    }

    lines.join("\n")
}
