//! Record inheritance and root selection
//!
//! A record may extend a named top-level record through `parent`. Resolution
//! never mutates the schema: it clones the (resolved) parent and merges the
//! child onto the clone. Fields of the parent that share an `id` with a field
//! of the child are replaced in place, other children are appended, and every
//! scalar attribute left unset on the child is inherited.

use super::error::{BindingError, Result};
use super::schema::{BindingConfig, Fragment, Record};
use std::borrow::Cow;

/// Resolve a record against its ancestors
///
/// Returns the record itself (borrowed) when it has no parent.
pub fn resolve<'a>(record: &'a Record, fragments: &[Fragment]) -> Result<Cow<'a, Record>> {
    resolve_chain(record, fragments, &mut Vec::new())
}

fn resolve_chain<'a>(
    record: &'a Record,
    fragments: &[Fragment],
    chain: &mut Vec<String>,
) -> Result<Cow<'a, Record>> {
    let parent_name = match record.parent.as_deref() {
        None => return Ok(Cow::Borrowed(record)),
        Some(name) => name,
    };

    let label = || {
        record
            .name
            .clone()
            .unwrap_or_else(|| record.to_string())
    };

    if chain.iter().any(|seen| seen == parent_name) {
        return Err(BindingError::Resolution {
            record: label(),
            parent: parent_name.to_string(),
        });
    }

    let parent = fragments
        .iter()
        .filter_map(Fragment::as_record)
        .find(|candidate| candidate.name.as_deref() == Some(parent_name))
        .ok_or_else(|| BindingError::Resolution {
            record: label(),
            parent: parent_name.to_string(),
        })?;

    chain.push(parent_name.to_string());
    let resolved_parent = resolve_chain(parent, fragments, chain)?;
    chain.pop();

    Ok(Cow::Owned(merge(resolved_parent.into_owned(), record)))
}

/// Merge `child` onto a clone of its resolved parent
fn merge(mut merged: Record, child: &Record) -> Record {
    for fragment in &child.children {
        let overridden = match fragment {
            Fragment::Field(field) => field.id.as_deref().and_then(|id| {
                merged.children.iter_mut().find(|existing| {
                    existing
                        .as_field()
                        .and_then(|f| f.id.as_deref())
                        .is_some_and(|existing_id| existing_id == id)
                })
            }),
            Fragment::Record(_) => None,
        };
        match overridden {
            Some(slot) => *slot = fragment.clone(),
            None => merged.children.push(fragment.clone()),
        }
    }

    let parent_attrs = std::mem::take(&mut merged.attrs);
    let attrs = &child.attrs;
    merged.attrs.separator = attrs.separator.clone().or(parent_attrs.separator);
    merged.attrs.separator_length = attrs.separator_length.or(parent_attrs.separator_length);
    merged.attrs.map = attrs.map.clone().or(parent_attrs.map);
    merged.attrs.length = attrs.length.or(parent_attrs.length);
    merged.attrs.max_length = attrs.max_length.or(parent_attrs.max_length);
    merged.attrs.min_length = attrs.min_length.or(parent_attrs.min_length);
    merged.attrs.description = attrs.description.clone().or(parent_attrs.description);

    merged.min_occurs = child.min_occurs.or(merged.min_occurs);
    merged.max_occurs = child.max_occurs.or(merged.max_occurs);
    merged.allow_partial = child.allow_partial.or(merged.allow_partial);
    merged.complex_type = child.complex_type.clone().or(merged.complex_type);
    merged.name = child.name.clone();
    merged.parent = None;
    merged
}

/// Resolve a record and, depth first, every record nested in it
pub fn resolve_tree(record: &Record, fragments: &[Fragment]) -> Result<Record> {
    resolve_tree_inner(record, fragments, &mut Vec::new())
}

fn resolve_tree_inner(
    record: &Record,
    fragments: &[Fragment],
    expanding: &mut Vec<String>,
) -> Result<Record> {
    if let Some(parent) = record.parent.as_deref() {
        // a nested record extending one of its own enclosing records never terminates
        if expanding.iter().any(|name| name == parent) {
            return Err(BindingError::Resolution {
                record: record.name.clone().unwrap_or_else(|| record.to_string()),
                parent: parent.to_string(),
            });
        }
    }

    let mut resolved = resolve(record, fragments)?.into_owned();
    let pushed: Vec<String> = record
        .parent
        .iter()
        .chain(record.name.iter())
        .cloned()
        .collect();
    let depth = expanding.len();
    expanding.extend(pushed);

    for child in resolved.children.iter_mut() {
        if let Fragment::Record(nested) = child {
            *nested = resolve_tree_inner(nested, fragments, expanding)?;
        }
    }

    expanding.truncate(depth);
    Ok(resolved)
}

/// Build the resolved root record of a binding
///
/// The root is a structural record described as "Binding Root" holding either
/// all top-level children or only the record selected by name.
pub fn select_root(config: &BindingConfig) -> Result<Record> {
    let mut root = Record::new().description("Binding Root");
    match config.record.as_deref() {
        Some(name) => {
            let record = config.find_record(name).ok_or_else(|| {
                BindingError::schema(format!("No binding found with the name: {}", name))
            })?;
            root.children.push(Fragment::Record(record.clone()));
        }
        None => root.children = config.children.clone(),
    }
    resolve_tree(&root, &config.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::schema::Field;

    fn templates() -> Vec<Fragment> {
        vec![
            Record::new()
                .named("line")
                .separator("\\n")
                .max_occurs(0)
                .child(Field::new().id("kind").fixed("L").separator(";"))
                .child(Field::new().id("value").map("value").can_end())
                .into(),
            Record::new()
                .named("detail")
                .extends("line")
                .map("details")
                .child(Field::new().id("kind").fixed("D").separator(";"))
                .into(),
        ]
    }

    #[test]
    fn test_resolve_without_parent_is_identity() {
        let record = Record::new().map("a").child(Field::new().map("b"));
        let resolved = resolve(&record, &[]).unwrap();
        assert!(matches!(resolved, Cow::Borrowed(_)));
        assert_eq!(*resolved, record);
    }

    #[test]
    fn test_resolve_overrides_by_id() {
        let fragments = templates();
        let detail = fragments[1].as_record().unwrap();
        let resolved = resolve(detail, &fragments).unwrap();

        assert_eq!(resolved.children.len(), 2);
        let kind = resolved.children[0].as_field().unwrap();
        assert_eq!(kind.fixed.as_deref(), Some("D"));
        assert_eq!(resolved.children[1].map(), Some("value"));

        // inherited from the parent
        assert_eq!(resolved.attrs.separator.as_deref(), Some("\\n"));
        assert_eq!(resolved.max_occurs, Some(0));
        // kept from the child
        assert_eq!(resolved.attrs.map.as_deref(), Some("details"));
        assert_eq!(resolved.name.as_deref(), Some("detail"));
        assert!(resolved.parent.is_none());
    }

    #[test]
    fn test_resolve_does_not_mutate_parent() {
        let fragments = templates();
        let detail = fragments[1].as_record().unwrap();
        let _ = resolve(detail, &fragments).unwrap();
        let line = fragments[0].as_record().unwrap();
        assert_eq!(line.children[0].as_field().unwrap().fixed.as_deref(), Some("L"));
        assert!(line.attrs.map.is_none());
    }

    #[test]
    fn test_resolve_appends_new_children() {
        let fragments = templates();
        let extra = Record::new()
            .extends("line")
            .child(Field::new().map("extra"));
        let resolved = resolve(&extra, &fragments).unwrap();
        assert_eq!(resolved.children.len(), 3);
        assert_eq!(resolved.children[2].map(), Some("extra"));
    }

    #[test]
    fn test_missing_parent() {
        let orphan = Record::new().named("orphan").extends("nobody");
        let err = resolve(&orphan, &[]).unwrap_err();
        assert!(matches!(err, BindingError::Resolution { ref parent, .. } if parent == "nobody"));
    }

    #[test]
    fn test_cyclic_parent() {
        let fragments: Vec<Fragment> = vec![
            Record::new().named("a").extends("b").into(),
            Record::new().named("b").extends("a").into(),
        ];
        let a = fragments[0].as_record().unwrap();
        assert!(matches!(
            resolve(a, &fragments),
            Err(BindingError::Resolution { .. })
        ));
    }

    #[test]
    fn test_resolve_tree_nested() {
        let fragments = templates();
        let root = Record::new().child(
            Record::new()
                .map("section")
                .child(Record::new().extends("detail")),
        );
        let resolved = resolve_tree(&root, &fragments).unwrap();
        let section = resolved.children[0].as_record().unwrap();
        let detail = section.children[0].as_record().unwrap();
        assert!(detail.parent.is_none());
        assert_eq!(detail.attrs.map.as_deref(), Some("details"));
        assert_eq!(detail.children.len(), 2);
    }

    #[test]
    fn test_resolve_tree_self_nesting_fails() {
        let fragments: Vec<Fragment> = vec![Record::new()
            .named("loop")
            .child(Record::new().extends("loop"))
            .into()];
        let root = fragments[0].as_record().unwrap();
        assert!(matches!(
            resolve_tree(root, &fragments),
            Err(BindingError::Resolution { .. })
        ));
    }

    #[test]
    fn test_select_root() {
        let config = BindingConfig {
            children: templates(),
            record: Some("detail".to_string()),
            ..BindingConfig::default()
        };
        let root = select_root(&config).unwrap();
        assert_eq!(root.attrs.description.as_deref(), Some("Binding Root"));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].map(), Some("details"));

        let missing = BindingConfig {
            record: Some("nothing".to_string()),
            ..BindingConfig::default()
        };
        assert!(matches!(select_root(&missing), Err(BindingError::Schema(_))));
    }
}
