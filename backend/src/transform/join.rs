//! Cross-attachment of fields from one record set onto another.
//!
//! Two flavors:
//! - [`attach_by_key`] - hash join on a hierarchy key. Preferred.
//! - [`attach_by_position`] - i-th source row onto i-th target row, for
//!   sets that carry no shared key. Lengths are checked.

use std::collections::HashMap;

use super::grouper::GroupKey;
use crate::error::{TransformError, TransformResult};
use crate::logs::log_warning;
use crate::models::Record;

/// Copy `fields` from `source[i]` onto `target[i]`.
///
/// Fields absent from a source row are left untouched on the target.
pub fn attach_by_position(target: &mut [Record], source: &[Record], fields: &[&str]) -> TransformResult<()> {
    if target.len() != source.len() {
        return Err(TransformError::Misaligned {
            target: target.len(),
            source_len: source.len(),
        });
    }
    for (t, s) in target.iter_mut().zip(source) {
        copy_fields(t, s, fields);
    }
    Ok(())
}

/// Copy `fields` from the source row whose `source_key` equals each target
/// row's `target_key`.
///
/// Every target key must match exactly one source row. Source rows that no
/// target asks for are ignored, as are source rows whose key is missing
/// (malformed table lines). The target is only modified once every row has
/// been matched.
pub fn attach_by_key(
    target: &mut [Record],
    target_key: &str,
    source: &[Record],
    source_key: &str,
    fields: &[&str],
) -> TransformResult<()> {
    let mut index: HashMap<GroupKey, usize> = HashMap::with_capacity(source.len());
    let mut skipped = 0usize;
    for (row, record) in source.iter().enumerate() {
        let Some(value) = record.get(source_key) else {
            skipped += 1;
            continue;
        };
        let Some(key) = GroupKey::of(value) else {
            skipped += 1;
            continue;
        };
        if index.insert(key, row).is_some() {
            return Err(TransformError::DuplicateKey {
                field: source_key.to_string(),
                key: value.to_string(),
            });
        }
    }
    if skipped > 0 {
        log_warning(format!("Skipped {} rows without a {} key", skipped, source_key));
    }

    let matches = target
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let value = record.get(target_key).ok_or_else(|| TransformError::MissingField {
                field: target_key.to_string(),
                row,
            })?;
            GroupKey::of(value)
                .and_then(|key| index.get(&key).copied())
                .ok_or_else(|| TransformError::UnmatchedKey {
                    field: target_key.to_string(),
                    key: value.to_string(),
                })
        })
        .collect::<TransformResult<Vec<usize>>>()?;

    for (record, matched) in target.iter_mut().zip(matches) {
        copy_fields(record, &source[matched], fields);
    }
    Ok(())
}

fn copy_fields(target: &mut Record, source: &Record, fields: &[&str]) {
    for field in fields {
        if let Some(value) = source.get(field) {
            target.set(*field, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{global_kp_id, Field, RecordSet};
    use crate::transform::{Pipeline, SortKey};

    #[test]
    fn test_attach_by_position_checks_length() {
        let mut target = vec![Record::new().with("a", 1), Record::new().with("a", 2)];
        let source = vec![Record::new().with("b", 10)];
        let err = attach_by_position(&mut target, &source, &["b"]).unwrap_err();
        assert!(matches!(err, TransformError::Misaligned { target: 2, source_len: 1 }));

        let source = vec![Record::new().with("b", 10), Record::new().with("b", 20)];
        attach_by_position(&mut target, &source, &["b"]).unwrap();
        assert_eq!(target[1].get("b"), Some(&Field::Int(20)));
    }

    #[test]
    fn test_attach_by_key_errors() {
        let source = vec![Record::new().with("id", 1).with("v", 5), Record::new().with("id", 1).with("v", 6)];
        let mut target = vec![Record::new().with("id", 1)];
        let err = attach_by_key(&mut target, "id", &source, "id", &["v"]).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateKey { .. }));

        let source = vec![Record::new().with("id", 2).with("v", 5)];
        let err = attach_by_key(&mut target, "id", &source, "id", &["v"]).unwrap_err();
        assert!(matches!(err, TransformError::UnmatchedKey { .. }));
    }

    #[test]
    fn test_attach_by_key_skips_keyless_source_rows() {
        let source = vec![
            Record::new().with("id", 1).with("v", 5),
            Record::new().with("id", Field::Missing).with("v", 9),
            Record::new().with("v", 7),
        ];
        let mut target = vec![Record::new().with("id", 1)];
        attach_by_key(&mut target, "id", &source, "id", &["v"]).unwrap();
        assert_eq!(target[0].get("v"), Some(&Field::Int(5)));
    }

    #[test]
    fn test_attach_by_key_unmatched_leaves_target_untouched() {
        let source = vec![Record::new().with("id", 1).with("v", 5)];
        let mut target = vec![Record::new().with("id", 1), Record::new().with("id", 2)];
        let before = target.clone();
        let err = attach_by_key(&mut target, "id", &source, "id", &["v"]).unwrap_err();
        assert!(matches!(err, TransformError::UnmatchedKey { .. }));
        assert_eq!(target, before);
    }

    /// 4 PEs with 2 KPs each. The router table arrives in local-id form and
    /// is remapped to global KP ids, then sorted descending like the KP
    /// statistics. Every KP must receive the router count of its own id.
    #[test]
    fn test_router_counts_follow_global_kp_id() {
        let num_kp = 2;
        let routers = [1, 0, 1, 0, 1, 0, 1, 0];

        let mut table: RecordSet = Vec::new();
        for pe in 0..4i64 {
            for local in 0..num_kp {
                let global = global_kp_id(pe, local, num_kp) as usize;
                table.push(
                    Record::new()
                        .with("PE_ID", pe)
                        .with("KP_ID", local)
                        .with("routers_per_kp", routers[global]),
                );
            }
        }
        let table = Pipeline::new()
            .derive(move |r, _| {
                let pe = r.get("PE_ID").and_then(Field::as_i64).unwrap_or_default();
                let local = r.get("KP_ID").and_then(Field::as_i64).unwrap_or_default();
                r.set("KP_ID", global_kp_id(pe, local, num_kp));
            })
            .sort_by([SortKey::desc("KP_ID")])
            .apply(&table)
            .unwrap();

        let mut kps: RecordSet = (0..8).map(|i| Record::new().with("KP_ID", i)).collect();
        attach_by_key(&mut kps, "KP_ID", &table, "KP_ID", &["routers_per_kp"]).unwrap();

        for (i, kp) in kps.iter().enumerate() {
            assert_eq!(kp.number("routers_per_kp"), Some(routers[i] as f64), "KP {}", i);
        }

        // Positional attachment agrees once both sides share the sort order.
        let mut sorted_kps = Pipeline::new()
            .sort_by([SortKey::desc("KP_ID")])
            .apply(&(0..8).map(|i| Record::new().with("KP_ID", i)).collect::<RecordSet>())
            .unwrap();
        attach_by_position(&mut sorted_kps, &table, &["routers_per_kp"]).unwrap();
        for kp in &sorted_kps {
            let id = kp.number("KP_ID").unwrap() as usize;
            assert_eq!(kp.number("routers_per_kp"), Some(routers[id] as f64));
        }
    }
}
