//! Probe output parsing and type assignment.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::placeholder::{PlaceholderId, PlaceholderSet};

/// One probe record: `{"id": "L:C", "type": "<class 'int'>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeReport
{
    pub id: PlaceholderId,
    #[serde(rename = "type")]
    pub datatype: String,
}

/// Parse every stdout line that is exactly a probe record.
///
/// Anything else the program printed is skipped. Exact duplicates
/// (the same occurrence run in a loop) are kept once, in first-seen
/// order.
pub fn parse_reports(stdout: &str) -> Vec<TypeReport>
{
    let mut seen: IndexSet<TypeReport> = IndexSet::new();
    let mut skipped = 0usize;

    for line in stdout.lines()
    {
        let line = line.trim();
        if !line.starts_with('{')
        {
            skipped += usize::from(!line.is_empty());
            continue;
        }

        match serde_json::from_str::<TypeReport>(line)
        {
            Ok(report) =>
            {
                seen.insert(report);
            }
            Err(_) => skipped += 1,
        }
    }

    debug!(records = seen.len(), skipped, "probe output parsed");
    seen.into_iter()
        .collect()
}

/// Attach reported types to placeholders.
///
/// Several distinct types for one occurrence are joined with `|`
/// in first-seen order. Returns how many placeholders got a type.
pub fn assign_types(
    set: &mut PlaceholderSet,
    reports: &[TypeReport],
) -> usize
{
    let mut by_id: IndexMap<&PlaceholderId, Vec<&str>> = IndexMap::new();
    for r in reports
    {
        let types = by_id
            .entry(&r.id)
            .or_default();
        if !types.contains(&r.datatype.as_str())
        {
            types.push(&r.datatype);
        }
    }

    let mut assigned = 0;
    for (id, types) in by_id
    {
        match set.get_mut(id)
        {
            Some(p) =>
            {
                p.datatype = Some(types.join("|"));
                assigned += 1;
            }
            None => warn!(%id, "probe reported an unknown placeholder"),
        }
    }

    assigned
}
